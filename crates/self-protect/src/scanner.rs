use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ancestry::{ProcessAncestryChain, ProcessAncestryResolver, MAX_ANCESTRY_DEPTH};
use crate::error::{DetectorError, SnapshotError};
use crate::native::{HandleTableSource, ProcessInspector, RawHandleValue};
use crate::snapshot::{query_handle_snapshot, HandleRecordLayout, HandleSnapshot};

/// Idle (0) through System (4) are never treated as observers.
pub const RESERVED_SYSTEM_PID_FLOOR: u32 = 4;

/// Which pid must clear the observer floor for a holder to be reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObserverPolicy {
    /// The holder's top-level ancestor must be above the floor.
    #[default]
    TopLevelAncestor,
    /// The holder itself must be above the floor.
    ImmediateHolder,
}

impl ObserverPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TopLevelAncestor => "top_level_ancestor",
            Self::ImmediateHolder => "immediate_holder",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "top_level_ancestor" | "ancestor" => Some(Self::TopLevelAncestor),
            "immediate_holder" | "holder" => Some(Self::ImmediateHolder),
            _ => None,
        }
    }
}

/// Verdict of a single scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DetectionResult {
    pub externally_opened: bool,
    /// Surviving holder pids in snapshot order. A process holding several
    /// matching slots appears once per slot.
    pub owner_pids: Vec<u32>,
    /// Matching slots owned by other processes, before the observer policy.
    pub match_count: usize,
}

impl DetectionResult {
    /// `owner_pids` with repeats removed, keeping first-seen order.
    pub fn unique_owners(&self) -> Vec<u32> {
        let mut out: Vec<u32> = Vec::with_capacity(self.owner_pids.len());
        for pid in &self.owner_pids {
            if !out.contains(pid) {
                out.push(*pid);
            }
        }
        out
    }
}

/// A process that passed the observer policy, with the chain that classified it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedHolder {
    pub pid: u32,
    pub chain: ProcessAncestryChain,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    pub result: DetectionResult,
    /// One entry per distinct holder pid, first-seen order.
    pub holders: Vec<ObservedHolder>,
    pub records_examined: usize,
    pub snapshot_attempts: u32,
    /// Terminal query failure that forced a negative verdict.
    pub query_failure: Option<SnapshotError>,
}

/// Finds other processes holding the same handle value as the real thread
/// handle.
#[derive(Debug)]
pub struct HandleOwnershipScanner<'a, P: ProcessInspector + ?Sized> {
    ancestry: ProcessAncestryResolver<'a, P>,
    policy: ObserverPolicy,
    pid_floor: u32,
}

impl<'a, P: ProcessInspector + ?Sized> HandleOwnershipScanner<'a, P> {
    pub fn new(inspector: &'a P) -> Self {
        Self {
            ancestry: ProcessAncestryResolver::new(inspector).with_max_depth(MAX_ANCESTRY_DEPTH),
            policy: ObserverPolicy::default(),
            pid_floor: RESERVED_SYSTEM_PID_FLOOR,
        }
    }

    pub fn with_policy(mut self, policy: ObserverPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_pid_floor(mut self, pid_floor: u32) -> Self {
        self.pid_floor = pid_floor;
        self
    }

    pub fn with_max_ancestry_depth(mut self, max_depth: usize) -> Self {
        self.ancestry = self.ancestry.with_max_depth(max_depth);
        self
    }

    /// Capture a snapshot from `source` and filter it.
    ///
    /// A terminal query status yields a negative verdict with
    /// `query_failure` set; only allocation failure is returned as an error.
    pub fn scan<S>(
        &self,
        source: &S,
        layout: HandleRecordLayout,
        self_pid: u32,
        real_handle: RawHandleValue,
    ) -> Result<ScanOutcome, DetectorError>
    where
        S: HandleTableSource + ?Sized,
    {
        match query_handle_snapshot(source, layout) {
            Ok(snapshot) => Ok(self.scan_snapshot(&snapshot, self_pid, real_handle)),
            Err(SnapshotError::Allocation { requested }) => {
                Err(DetectorError::BufferAllocation { requested })
            }
            Err(err) => {
                warn!(error = %err, "handle snapshot unavailable, reporting not observed");
                Ok(ScanOutcome {
                    query_failure: Some(err),
                    ..ScanOutcome::default()
                })
            }
        }
    }

    pub fn scan_snapshot(
        &self,
        snapshot: &HandleSnapshot,
        self_pid: u32,
        real_handle: RawHandleValue,
    ) -> ScanOutcome {
        let mut outcome = ScanOutcome {
            records_examined: snapshot.len(),
            snapshot_attempts: snapshot.attempts(),
            ..ScanOutcome::default()
        };
        let mut verdicts: HashMap<u32, Option<ProcessAncestryChain>> = HashMap::new();

        for record in snapshot {
            if record.handle_value != real_handle || record.owning_pid == u64::from(self_pid) {
                continue;
            }
            outcome.result.match_count += 1;

            let Ok(holder) = u32::try_from(record.owning_pid) else {
                debug!(owning_pid = record.owning_pid, "skipping holder with out-of-range pid");
                continue;
            };

            let verdict = verdicts
                .entry(holder)
                .or_insert_with(|| self.classify(holder));
            let Some(chain) = verdict else {
                continue;
            };

            if !outcome.holders.iter().any(|seen| seen.pid == holder) {
                outcome.holders.push(ObservedHolder {
                    pid: holder,
                    chain: chain.clone(),
                });
            }
            outcome.result.owner_pids.push(holder);
            outcome.result.externally_opened = true;
        }

        outcome
    }

    /// Ancestry chain of `holder` if it counts as an observer under the
    /// active policy.
    pub fn classify(&self, holder: u32) -> Option<ProcessAncestryChain> {
        let chain = self.ancestry.chain_of(holder);
        let subject = match self.policy {
            ObserverPolicy::TopLevelAncestor => chain.top_level_ancestor(),
            ObserverPolicy::ImmediateHolder => holder,
        };

        if subject > self.pid_floor {
            Some(chain)
        } else {
            debug!(
                holder,
                subject,
                policy = self.policy.as_str(),
                "holder below observer pid floor"
            );
            None
        }
    }
}
