use tracing::warn;

use super::types::WatchConfig;
use super::util::{env_non_empty, env_u64, parse_bool, parse_output};

impl WatchConfig {
    pub(super) fn apply_env_overrides(&mut self) {
        self.apply_env_watch();
        self.apply_env_privilege();
        self.scan.apply_env_overrides();
    }

    fn apply_env_watch(&mut self) {
        if let Some(v) = env_u64("THREADWATCH_POLL_INTERVAL_SECS") {
            self.poll_interval_secs = v;
        }
        if let Some(v) = env_u64("THREADWATCH_SCAN_TIMEOUT_SECS") {
            self.scan_timeout_secs = v;
        }
        if let Some(v) = env_u64("THREADWATCH_MAX_CYCLES") {
            self.max_cycles = v;
        }
        if let Some(v) = env_non_empty("THREADWATCH_OUTPUT") {
            match parse_output(&v) {
                Some(output) => self.output = output,
                None => warn!(value = %v, "ignoring unknown THREADWATCH_OUTPUT"),
            }
        }
    }

    fn apply_env_privilege(&mut self) {
        if let Some(v) = env_non_empty("THREADWATCH_ENABLE_DEBUG_PRIVILEGE") {
            self.enable_debug_privilege = parse_bool(&v);
        }
        if let Some(v) = env_non_empty("THREADWATCH_REQUIRE_DEBUG_PRIVILEGE") {
            self.require_debug_privilege = parse_bool(&v);
        }
    }
}
