mod ancestry;
mod engine;
mod error;
mod identity;
mod native;
mod scanner;
mod snapshot;

pub use ancestry::{ProcessAncestryChain, ProcessAncestryResolver, MAX_ANCESTRY_DEPTH};
pub use engine::{ExternalHolder, QueryFailure, ScanConfig, ThreadWatchEngine, WatchReport};
pub use error::{DetectorError, SnapshotError};
pub use identity::ThreadHandleIdentity;
pub use native::{
    HandleTableSource, Platform, ProcessInspector, QueryOutcome, RawHandleValue,
    ThreadHandleSource,
};
pub use scanner::{
    DetectionResult, HandleOwnershipScanner, ObservedHolder, ObserverPolicy, ScanOutcome,
    RESERVED_SYSTEM_PID_FLOOR,
};
pub use snapshot::{
    query_handle_snapshot, HandleRecordLayout, HandleSnapshot, SystemHandleRecord,
    INITIAL_QUERY_BUFFER_BYTES, SYSTEM_EXTENDED_HANDLE_INFORMATION,
};
