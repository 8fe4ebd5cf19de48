//! SeDebugPrivilege management for the current process token.
//!
//! The debug privilege lets the watcher open processes outside its own
//! session and process tree for parent and image queries.

use std::io;

pub const SE_DEBUG_PRIVILEGE: &str = "SeDebugPrivilege";

#[derive(thiserror::Error, Debug)]
pub enum PrivilegeError {
    #[error("failed opening process token: {0}")]
    OpenToken(#[source] io::Error),

    #[error("failed looking up privilege {name}: {source}")]
    Lookup {
        name: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("failed adjusting token privileges: {0}")]
    Adjust(#[source] io::Error),

    #[error("token does not hold privilege {0}")]
    NotAssigned(&'static str),

    #[error("failed checking token privilege: {0}")]
    Check(#[source] io::Error),

    #[error("privilege management requires Windows")]
    Unsupported,
}

/// Enable `SeDebugPrivilege` on the current process token.
pub fn enable_debug_privilege() -> Result<(), PrivilegeError> {
    #[cfg(target_os = "windows")]
    {
        windows_impl::set_privilege(SE_DEBUG_PRIVILEGE, true)
    }
    #[cfg(not(target_os = "windows"))]
    {
        Err(PrivilegeError::Unsupported)
    }
}

/// Whether `SeDebugPrivilege` is currently enabled on the process token.
pub fn debug_privilege_enabled() -> Result<bool, PrivilegeError> {
    #[cfg(target_os = "windows")]
    {
        windows_impl::check_privilege(SE_DEBUG_PRIVILEGE)
    }
    #[cfg(not(target_os = "windows"))]
    {
        Err(PrivilegeError::Unsupported)
    }
}

#[cfg(target_os = "windows")]
mod windows_impl {
    use std::io;

    use windows_sys::Win32::Foundation::{
        CloseHandle, GetLastError, ERROR_NOT_ALL_ASSIGNED, HANDLE, LUID,
    };
    use windows_sys::Win32::Security::{
        AdjustTokenPrivileges, LookupPrivilegeValueW, PrivilegeCheck, LUID_AND_ATTRIBUTES,
        PRIVILEGE_SET, PRIVILEGE_SET_ALL_NECESSARY, SE_PRIVILEGE_ENABLED, TOKEN_ADJUST_PRIVILEGES,
        TOKEN_PRIVILEGES, TOKEN_QUERY,
    };
    use windows_sys::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};

    use super::PrivilegeError;

    struct Token(HANDLE);

    impl Token {
        fn open_current() -> Result<Self, PrivilegeError> {
            let mut token: HANDLE = 0 as _;
            // SAFETY: the pseudo process handle needs no release and `token`
            // is a valid out pointer.
            let ok = unsafe {
                OpenProcessToken(
                    GetCurrentProcess(),
                    TOKEN_ADJUST_PRIVILEGES | TOKEN_QUERY,
                    &mut token,
                )
            };
            if ok == 0 {
                return Err(PrivilegeError::OpenToken(io::Error::last_os_error()));
            }
            Ok(Self(token))
        }
    }

    impl Drop for Token {
        fn drop(&mut self) {
            // SAFETY: the token handle is owned and closed only here.
            unsafe {
                CloseHandle(self.0);
            }
        }
    }

    fn wide(name: &str) -> Vec<u16> {
        name.encode_utf16().chain(std::iter::once(0)).collect()
    }

    fn lookup(name: &'static str) -> Result<LUID, PrivilegeError> {
        let wide_name = wide(name);
        // SAFETY: LUID is plain old data; all-zero is valid.
        let mut luid: LUID = unsafe { std::mem::zeroed() };
        // SAFETY: `wide_name` is NUL-terminated and outlives the call.
        let ok = unsafe { LookupPrivilegeValueW(std::ptr::null(), wide_name.as_ptr(), &mut luid) };
        if ok == 0 {
            return Err(PrivilegeError::Lookup {
                name,
                source: io::Error::last_os_error(),
            });
        }
        Ok(luid)
    }

    pub(super) fn set_privilege(name: &'static str, enable: bool) -> Result<(), PrivilegeError> {
        let token = Token::open_current()?;
        let luid = lookup(name)?;

        let privileges = TOKEN_PRIVILEGES {
            PrivilegeCount: 1,
            Privileges: [LUID_AND_ATTRIBUTES {
                Luid: luid,
                Attributes: if enable { SE_PRIVILEGE_ENABLED } else { 0 },
            }],
        };
        // SAFETY: `privileges` is a fully initialised TOKEN_PRIVILEGES and the
        // previous-state outputs are not requested.
        let ok = unsafe {
            AdjustTokenPrivileges(
                token.0,
                0,
                &privileges,
                std::mem::size_of::<TOKEN_PRIVILEGES>() as u32,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
            )
        };
        if ok == 0 {
            return Err(PrivilegeError::Adjust(io::Error::last_os_error()));
        }
        // AdjustTokenPrivileges succeeds even when nothing was assigned.
        // SAFETY: GetLastError has no preconditions.
        if unsafe { GetLastError() } == ERROR_NOT_ALL_ASSIGNED {
            return Err(PrivilegeError::NotAssigned(name));
        }

        tracing::debug!(privilege = name, enable, "token privilege adjusted");
        Ok(())
    }

    pub(super) fn check_privilege(name: &'static str) -> Result<bool, PrivilegeError> {
        let token = Token::open_current()?;
        let luid = lookup(name)?;

        let mut required = PRIVILEGE_SET {
            PrivilegeCount: 1,
            Control: PRIVILEGE_SET_ALL_NECESSARY,
            Privilege: [LUID_AND_ATTRIBUTES {
                Luid: luid,
                Attributes: SE_PRIVILEGE_ENABLED,
            }],
        };
        let mut granted = 0;
        // SAFETY: `required` and `granted` are valid for the call.
        let ok = unsafe { PrivilegeCheck(token.0, &mut required, &mut granted) };
        if ok == 0 {
            return Err(PrivilegeError::Check(io::Error::last_os_error()));
        }
        Ok(granted != 0)
    }
}
