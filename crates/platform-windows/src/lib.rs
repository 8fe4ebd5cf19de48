//! Platform-windows crate: Windows host bindings for the thread watcher.
//!
//! Implements the `self-protect` OS seams (thread handle duplication, the
//! extended system handle query, parent/image lookups) on kernel32 and
//! ntdll, plus SeDebugPrivilege management. Non-Windows builds compile to
//! stubs that fail or return nothing.

pub mod handles;
#[cfg(target_os = "windows")]
mod ntdll;
pub mod privilege;
pub mod process;

use std::io;

use self_protect::{
    HandleTableSource, ProcessInspector, QueryOutcome, RawHandleValue, ThreadHandleSource,
};

pub use privilege::{debug_privilege_enabled, enable_debug_privilege, PrivilegeError};

/// The live Windows host.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsPlatform;

impl WindowsPlatform {
    pub fn new() -> Self {
        Self
    }
}

impl ThreadHandleSource for WindowsPlatform {
    fn current_process_id(&self) -> u32 {
        std::process::id()
    }

    fn current_thread_pseudo_handle(&self) -> RawHandleValue {
        handles::current_thread_pseudo_handle()
    }

    fn duplicate_same_access(&self, source: RawHandleValue) -> io::Result<RawHandleValue> {
        handles::duplicate_same_access(source)
    }

    fn close_handle(&self, handle: RawHandleValue) -> io::Result<()> {
        handles::close_handle(handle)
    }
}

impl HandleTableSource for WindowsPlatform {
    fn query_handle_table(&self, buffer: &mut [u8]) -> QueryOutcome {
        handles::query_extended_handle_table(buffer)
    }
}

impl ProcessInspector for WindowsPlatform {
    fn parent_of(&self, pid: u32) -> Option<u32> {
        process::read_ppid(pid)
    }

    fn image_path(&self, pid: u32) -> Option<String> {
        process::query_image_path(pid)
    }
}

pub fn platform_name() -> &'static str {
    "windows"
}
