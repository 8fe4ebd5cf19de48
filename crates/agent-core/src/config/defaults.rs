use self_protect::ScanConfig;

use super::constants::{DEFAULT_POLL_INTERVAL_SECS, DEFAULT_SCAN_TIMEOUT_SECS};
use super::types::{OutputFormat, WatchConfig};

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            scan_timeout_secs: DEFAULT_SCAN_TIMEOUT_SECS,
            max_cycles: 0,
            output: OutputFormat::Text,
            enable_debug_privilege: true,
            require_debug_privilege: false,
            scan: ScanConfig::default(),
        }
    }
}
