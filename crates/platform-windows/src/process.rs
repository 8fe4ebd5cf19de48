//! Process introspection via NtQueryInformationProcess / QueryFullProcessImageNameW.
//!
//! On non-Windows builds, returns empty results so the crate compiles.

/// Wide-char capacity used for image path queries.
#[cfg(target_os = "windows")]
const IMAGE_PATH_CAPACITY: usize = 32_768;

/// Read the recorded parent PID from `PROCESS_BASIC_INFORMATION`.
pub fn read_ppid(pid: u32) -> Option<u32> {
    #[cfg(target_os = "windows")]
    {
        read_ppid_windows(pid)
    }
    #[cfg(not(target_os = "windows"))]
    {
        let _ = pid;
        None
    }
}

/// Full Win32 path of the executable backing `pid`.
pub fn query_image_path(pid: u32) -> Option<String> {
    #[cfg(target_os = "windows")]
    {
        query_image_path_windows(pid)
    }
    #[cfg(not(target_os = "windows"))]
    {
        let _ = pid;
        tracing::warn!(pid, "query_image_path is a stub on non-Windows");
        None
    }
}

// ── Windows implementations ────────────────────────────────────────────

#[cfg(target_os = "windows")]
struct ProcessHandle(windows_sys::Win32::Foundation::HANDLE);

#[cfg(target_os = "windows")]
impl ProcessHandle {
    fn open_limited(pid: u32) -> Option<Self> {
        use windows_sys::Win32::System::Threading::{
            OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION,
        };

        // SAFETY: OpenProcess has no memory preconditions; a null return is
        // handled below.
        let handle = unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid) };
        if handle as usize == 0 {
            tracing::debug!(
                pid,
                error = %std::io::Error::last_os_error(),
                "open process for query failed"
            );
            return None;
        }
        Some(Self(handle))
    }
}

#[cfg(target_os = "windows")]
impl Drop for ProcessHandle {
    fn drop(&mut self) {
        // SAFETY: the handle came from OpenProcess and is closed only here.
        unsafe {
            windows_sys::Win32::Foundation::CloseHandle(self.0);
        }
    }
}

#[cfg(target_os = "windows")]
fn read_ppid_windows(pid: u32) -> Option<u32> {
    use crate::ntdll::{
        nt_success, NtQueryInformationProcess, ProcessBasicInformation,
        PROCESS_BASIC_INFORMATION_CLASS,
    };

    let process = ProcessHandle::open_limited(pid)?;
    // SAFETY: ProcessBasicInformation is plain old data; all-zero is valid.
    let mut info: ProcessBasicInformation = unsafe { std::mem::zeroed() };
    let mut return_length: u32 = 0;
    // SAFETY: `info` is a correctly sized, writable PROCESS_BASIC_INFORMATION.
    let status = unsafe {
        NtQueryInformationProcess(
            process.0,
            PROCESS_BASIC_INFORMATION_CLASS,
            std::ptr::from_mut(&mut info).cast(),
            std::mem::size_of::<ProcessBasicInformation>() as u32,
            &mut return_length,
        )
    };
    if !nt_success(status) {
        tracing::debug!(pid, status = format_args!("0x{:08X}", status), "process basic information query failed");
        return None;
    }

    u32::try_from(info.inherited_from_unique_process_id).ok()
}

#[cfg(target_os = "windows")]
fn query_image_path_windows(pid: u32) -> Option<String> {
    use windows_sys::Win32::System::Threading::{QueryFullProcessImageNameW, PROCESS_NAME_WIN32};

    let process = ProcessHandle::open_limited(pid)?;
    let mut buffer = vec![0u16; IMAGE_PATH_CAPACITY];
    let mut size = buffer.len() as u32;
    // SAFETY: `size` holds the capacity of `buffer` in wide chars.
    let ok = unsafe {
        QueryFullProcessImageNameW(process.0, PROCESS_NAME_WIN32, buffer.as_mut_ptr(), &mut size)
    };
    if ok == 0 {
        return None;
    }
    let len = (size as usize).min(buffer.len());
    Some(String::from_utf16_lossy(&buffer[..len]))
}
