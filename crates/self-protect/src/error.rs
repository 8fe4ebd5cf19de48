use std::io;

#[derive(thiserror::Error, Debug)]
pub enum DetectorError {
    #[error("failed duplicating current thread pseudo-handle: {0}")]
    HandleDuplication(#[source] io::Error),

    #[error("handle snapshot buffer allocation of {requested} bytes failed")]
    BufferAllocation { requested: usize },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("handle snapshot buffer allocation of {requested} bytes failed")]
    Allocation { requested: usize },

    #[error("system handle query failed with status 0x{status:08X}")]
    QueryFailed { status: i32 },
}

impl SnapshotError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Allocation { .. } => "snapshot_allocation_failed",
            Self::QueryFailed { .. } => "snapshot_query_failed",
        }
    }
}
