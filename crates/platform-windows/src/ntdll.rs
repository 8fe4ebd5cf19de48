//! Native API entry points and structures not covered by `windows-sys`.

use std::ffi::c_void;

use windows_sys::Win32::Foundation::HANDLE;

pub(crate) const STATUS_INFO_LENGTH_MISMATCH: i32 = 0xC000_0004_u32 as i32;

/// `ProcessBasicInformation` class for `NtQueryInformationProcess`.
pub(crate) const PROCESS_BASIC_INFORMATION_CLASS: u32 = 0;

/// `PROCESS_BASIC_INFORMATION`.
#[repr(C)]
pub(crate) struct ProcessBasicInformation {
    pub exit_status: i32,
    pub peb_base_address: *mut c_void,
    pub affinity_mask: usize,
    pub base_priority: i32,
    pub unique_process_id: usize,
    pub inherited_from_unique_process_id: usize,
}

pub(crate) fn nt_success(status: i32) -> bool {
    status >= 0
}

#[link(name = "ntdll")]
extern "system" {
    pub(crate) fn NtQuerySystemInformation(
        system_information_class: u32,
        system_information: *mut c_void,
        system_information_length: u32,
        return_length: *mut u32,
    ) -> i32;

    pub(crate) fn NtQueryInformationProcess(
        process_handle: HANDLE,
        process_information_class: u32,
        process_information: *mut c_void,
        process_information_length: u32,
        return_length: *mut u32,
    ) -> i32;
}
