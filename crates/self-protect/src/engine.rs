use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ancestry::MAX_ANCESTRY_DEPTH;
use crate::error::{DetectorError, SnapshotError};
use crate::identity::ThreadHandleIdentity;
use crate::native::Platform;
use crate::scanner::{
    DetectionResult, HandleOwnershipScanner, ObserverPolicy, RESERVED_SYSTEM_PID_FLOOR,
};
use crate::snapshot::HandleRecordLayout;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    pub observer_policy: ObserverPolicy,
    pub observer_pid_floor: u32,
    pub max_ancestry_depth: usize,
    pub resolve_image_paths: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            observer_policy: ObserverPolicy::TopLevelAncestor,
            observer_pid_floor: RESERVED_SYSTEM_PID_FLOOR,
            max_ancestry_depth: MAX_ANCESTRY_DEPTH,
            resolve_image_paths: true,
        }
    }
}

impl ScanConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(policy) = std::env::var("THREADWATCH_OBSERVER_POLICY")
            .ok()
            .and_then(|raw| ObserverPolicy::parse(&raw))
        {
            self.observer_policy = policy;
        }
        self.observer_pid_floor = env_u32("THREADWATCH_OBSERVER_PID_FLOOR", self.observer_pid_floor);
        self.max_ancestry_depth =
            env_usize("THREADWATCH_MAX_ANCESTRY_DEPTH", self.max_ancestry_depth);
        self.resolve_image_paths =
            env_bool("THREADWATCH_RESOLVE_IMAGE_PATHS", self.resolve_image_paths);
    }
}

/// A process reported as holding the current thread's handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalHolder {
    pub pid: u32,
    pub top_level_ancestor: u32,
    pub ancestry: Vec<u32>,
    pub image_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueryFailure {
    pub status: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WatchReport {
    pub result: DetectionResult,
    pub holders: Vec<ExternalHolder>,
    pub records_examined: usize,
    pub snapshot_attempts: u32,
    pub query_failure: Option<QueryFailure>,
}

impl WatchReport {
    pub fn detected(&self) -> bool {
        self.result.externally_opened
    }

    pub fn is_clean(&self) -> bool {
        !self.detected()
    }

    pub fn summary(&self) -> String {
        if let Some(failure) = self.query_failure {
            return format!(
                "handle snapshot unavailable (status=0x{:08X}); not observed",
                failure.status
            );
        }
        if !self.detected() {
            return "not observed".to_string();
        }

        let holders = self
            .holders
            .iter()
            .map(|holder| match holder.image_path.as_deref() {
                Some(path) => format!(
                    "pid={} ancestor={} image={}",
                    holder.pid, holder.top_level_ancestor, path
                ),
                None => format!("pid={} ancestor={}", holder.pid, holder.top_level_ancestor),
            })
            .collect::<Vec<_>>()
            .join("; ");
        format!(
            "opened by external process ({} matching handles): {}",
            self.result.match_count,
            holders
        )
    }
}

/// Detects external holders of the current thread's handle.
///
/// The real handle is duplicated once at construction and released when the
/// engine is dropped.
#[derive(Debug)]
pub struct ThreadWatchEngine<P: Platform> {
    platform: Arc<P>,
    identity: ThreadHandleIdentity<P>,
    config: ScanConfig,
    layout: HandleRecordLayout,
    self_pid: u32,
}

impl<P: Platform> ThreadWatchEngine<P> {
    pub fn from_env(platform: Arc<P>) -> Result<Self, DetectorError> {
        Self::new(platform, ScanConfig::from_env())
    }

    pub fn new(platform: Arc<P>, config: ScanConfig) -> Result<Self, DetectorError> {
        let identity = ThreadHandleIdentity::resolve(Arc::clone(&platform))?;
        let self_pid = platform.current_process_id();
        debug!(
            self_pid,
            policy = config.observer_policy.as_str(),
            "thread watch engine initialized"
        );
        Ok(Self {
            platform,
            identity,
            config,
            layout: HandleRecordLayout::native(),
            self_pid,
        })
    }

    pub fn with_layout(mut self, layout: HandleRecordLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn identity(&self) -> &ThreadHandleIdentity<P> {
        &self.identity
    }

    pub fn self_pid(&self) -> u32 {
        self.self_pid
    }

    fn scanner(&self) -> HandleOwnershipScanner<'_, P> {
        HandleOwnershipScanner::new(self.platform.as_ref())
            .with_policy(self.config.observer_policy)
            .with_pid_floor(self.config.observer_pid_floor)
            .with_max_ancestry_depth(self.config.max_ancestry_depth)
    }

    pub fn scan(&self) -> Result<DetectionResult, DetectorError> {
        Ok(self.evaluate()?.result)
    }

    pub fn evaluate(&self) -> Result<WatchReport, DetectorError> {
        let outcome = self.scanner().scan(
            self.platform.as_ref(),
            self.layout,
            self.self_pid,
            self.identity.real_handle(),
        )?;

        let holders = outcome
            .holders
            .into_iter()
            .map(|holder| ExternalHolder {
                pid: holder.pid,
                top_level_ancestor: holder.chain.top_level_ancestor(),
                ancestry: holder.chain.ancestors().to_vec(),
                image_path: if self.config.resolve_image_paths {
                    self.platform.image_path(holder.pid)
                } else {
                    None
                },
            })
            .collect::<Vec<_>>();

        let report = WatchReport {
            result: outcome.result,
            holders,
            records_examined: outcome.records_examined,
            snapshot_attempts: outcome.snapshot_attempts,
            query_failure: outcome.query_failure.and_then(|err| match err {
                SnapshotError::QueryFailed { status } => Some(QueryFailure { status }),
                SnapshotError::Allocation { .. } => None,
            }),
        };

        if report.detected() {
            warn!(
                owners = ?report.result.unique_owners(),
                matches = report.result.match_count,
                "current thread handle opened by external process"
            );
        }
        Ok(report)
    }
}

fn env_u32(name: &str, default: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|raw| raw.trim().parse::<u32>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|raw| raw.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => matches!(
            raw.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "enabled" | "on"
        ),
        _ => default,
    }
}
