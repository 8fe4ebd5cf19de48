//! Seams between the detector and the operating system.
//!
//! `platform-windows` implements these against kernel32/ntdll. Tests drive
//! the detector through in-memory fakes.

use std::io;

/// Raw handle value as stored in a handle table, widened to 64 bits.
pub type RawHandleValue = u64;

/// Outcome of a single handle-table query into a caller-supplied buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    Complete { written: usize },
    LengthMismatch { required: usize },
    Failed { status: i32 },
}

pub trait ThreadHandleSource {
    fn current_process_id(&self) -> u32;

    /// Self-referential handle of the calling thread. Never owned.
    fn current_thread_pseudo_handle(&self) -> RawHandleValue;

    /// Duplicate `source` within the current process keeping the same access.
    fn duplicate_same_access(&self, source: RawHandleValue) -> io::Result<RawHandleValue>;

    fn close_handle(&self, handle: RawHandleValue) -> io::Result<()>;
}

pub trait HandleTableSource {
    /// Query the extended system handle table into `buffer`.
    fn query_handle_table(&self, buffer: &mut [u8]) -> QueryOutcome;
}

pub trait ProcessInspector {
    /// Recorded parent pid, or `None` when the process cannot be opened or
    /// queried.
    fn parent_of(&self, pid: u32) -> Option<u32>;

    fn image_path(&self, pid: u32) -> Option<String> {
        let _ = pid;
        None
    }
}

/// Everything the engine needs from the host.
pub trait Platform: ThreadHandleSource + HandleTableSource + ProcessInspector {}

impl<T> Platform for T where T: ThreadHandleSource + HandleTableSource + ProcessInspector {}
