use self_protect::ScanConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub poll_interval_secs: u64,
    pub scan_timeout_secs: u64,
    /// Stop after this many cycles; 0 runs until interrupted.
    pub max_cycles: u64,
    pub output: OutputFormat,
    pub enable_debug_privilege: bool,
    pub require_debug_privilege: bool,
    pub scan: ScanConfig,
}
