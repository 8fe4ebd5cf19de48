use anyhow::Result;

use super::types::WatchConfig;

impl WatchConfig {
    pub fn load() -> Result<Self> {
        let mut cfg = Self::default();
        cfg.apply_file_config()?;
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn scan_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.scan_timeout_secs.max(1))
    }
}
