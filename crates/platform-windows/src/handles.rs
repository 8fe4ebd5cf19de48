//! Thread handle duplication and the extended system handle query.

use std::io;

use self_protect::{QueryOutcome, RawHandleValue};

/// `STATUS_NOT_IMPLEMENTED`, reported by the query on non-Windows builds.
pub const STATUS_NOT_IMPLEMENTED: i32 = 0xC000_0002_u32 as i32;

pub fn current_thread_pseudo_handle() -> RawHandleValue {
    #[cfg(target_os = "windows")]
    {
        use windows_sys::Win32::System::Threading::GetCurrentThread;
        // SAFETY: GetCurrentThread has no preconditions and returns a constant.
        let pseudo = unsafe { GetCurrentThread() };
        pseudo as usize as RawHandleValue
    }
    #[cfg(not(target_os = "windows"))]
    {
        0
    }
}

/// Duplicate `source` into the current process with `DUPLICATE_SAME_ACCESS`.
pub fn duplicate_same_access(source: RawHandleValue) -> io::Result<RawHandleValue> {
    #[cfg(target_os = "windows")]
    {
        duplicate_same_access_windows(source)
    }
    #[cfg(not(target_os = "windows"))]
    {
        let _ = source;
        tracing::warn!("thread handle duplication is unsupported on non-Windows");
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "thread handle duplication requires Windows",
        ))
    }
}

pub fn close_handle(handle: RawHandleValue) -> io::Result<()> {
    #[cfg(target_os = "windows")]
    {
        use windows_sys::Win32::Foundation::{CloseHandle, HANDLE};
        // SAFETY: callers only pass handles they own and close them once.
        let ok = unsafe { CloseHandle(handle as usize as HANDLE) };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
    #[cfg(not(target_os = "windows"))]
    {
        let _ = handle;
        Ok(())
    }
}

/// One `NtQuerySystemInformation(SystemExtendedHandleInformation)` call.
pub fn query_extended_handle_table(buffer: &mut [u8]) -> QueryOutcome {
    #[cfg(target_os = "windows")]
    {
        query_extended_handle_table_windows(buffer)
    }
    #[cfg(not(target_os = "windows"))]
    {
        let _ = buffer;
        tracing::warn!("system handle enumeration is a stub on non-Windows");
        QueryOutcome::Failed {
            status: STATUS_NOT_IMPLEMENTED,
        }
    }
}

#[cfg(target_os = "windows")]
fn duplicate_same_access_windows(source: RawHandleValue) -> io::Result<RawHandleValue> {
    use windows_sys::Win32::Foundation::{DuplicateHandle, DUPLICATE_SAME_ACCESS, HANDLE};
    use windows_sys::Win32::System::Threading::GetCurrentProcess;

    // SAFETY: GetCurrentProcess returns a pseudo-handle that needs no release.
    let process = unsafe { GetCurrentProcess() };
    let mut duplicated: HANDLE = 0 as _;
    // SAFETY: both process handles refer to the current process and the
    // target pointer is a valid local.
    let ok = unsafe {
        DuplicateHandle(
            process,
            source as usize as HANDLE,
            process,
            &mut duplicated,
            0,
            0,
            DUPLICATE_SAME_ACCESS,
        )
    };
    if ok == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(duplicated as usize as RawHandleValue)
}

#[cfg(target_os = "windows")]
fn query_extended_handle_table_windows(buffer: &mut [u8]) -> QueryOutcome {
    use crate::ntdll::{nt_success, NtQuerySystemInformation, STATUS_INFO_LENGTH_MISMATCH};
    use self_protect::SYSTEM_EXTENDED_HANDLE_INFORMATION;

    let length = u32::try_from(buffer.len()).unwrap_or(u32::MAX);
    let mut return_length: u32 = 0;
    // SAFETY: the kernel writes at most `length` bytes into `buffer`, which
    // stays borrowed for the duration of this synchronous call.
    let status = unsafe {
        NtQuerySystemInformation(
            SYSTEM_EXTENDED_HANDLE_INFORMATION,
            buffer.as_mut_ptr().cast(),
            length,
            &mut return_length,
        )
    };

    if status == STATUS_INFO_LENGTH_MISMATCH {
        return QueryOutcome::LengthMismatch {
            required: return_length as usize,
        };
    }
    if !nt_success(status) {
        return QueryOutcome::Failed { status };
    }
    QueryOutcome::Complete {
        written: return_length as usize,
    }
}
