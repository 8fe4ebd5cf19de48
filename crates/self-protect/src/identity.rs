use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::DetectorError;
use crate::native::{RawHandleValue, ThreadHandleSource};

/// The calling thread's pseudo-handle and the real handle duplicated from it.
///
/// The real handle is owned by this value and closed exactly once on drop.
/// It refers to the thread that called [`ThreadHandleIdentity::resolve`],
/// regardless of which thread later scans with it.
pub struct ThreadHandleIdentity<S: ThreadHandleSource> {
    source: Arc<S>,
    pseudo_handle: RawHandleValue,
    real_handle: RawHandleValue,
}

impl<S: ThreadHandleSource> ThreadHandleIdentity<S> {
    pub fn resolve(source: Arc<S>) -> Result<Self, DetectorError> {
        let pseudo_handle = source.current_thread_pseudo_handle();
        let real_handle = source
            .duplicate_same_access(pseudo_handle)
            .map_err(DetectorError::HandleDuplication)?;

        debug!(
            pseudo_handle = format_args!("{:#x}", pseudo_handle),
            real_handle = format_args!("{:#x}", real_handle),
            "current thread handle duplicated"
        );

        Ok(Self {
            source,
            pseudo_handle,
            real_handle,
        })
    }

    pub fn pseudo_handle(&self) -> RawHandleValue {
        self.pseudo_handle
    }

    pub fn real_handle(&self) -> RawHandleValue {
        self.real_handle
    }
}

impl<S: ThreadHandleSource> Drop for ThreadHandleIdentity<S> {
    fn drop(&mut self) {
        if let Err(err) = self.source.close_handle(self.real_handle) {
            warn!(
                real_handle = format_args!("{:#x}", self.real_handle),
                error = %err,
                "failed closing duplicated thread handle"
            );
        }
    }
}

impl<S: ThreadHandleSource> fmt::Debug for ThreadHandleIdentity<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadHandleIdentity")
            .field("pseudo_handle", &format_args!("{:#x}", self.pseudo_handle))
            .field("real_handle", &format_args!("{:#x}", self.real_handle))
            .finish()
    }
}
