use anyhow::{Context, Result};
use self_protect::ObserverPolicy;
use serde::Deserialize;

use super::paths::resolve_config_path;
use super::types::WatchConfig;
use super::util::{non_empty, parse_output};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    watch: Option<FileWatchConfig>,
    privilege: Option<FilePrivilegeConfig>,
    scan: Option<FileScanConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileWatchConfig {
    poll_interval_secs: Option<u64>,
    scan_timeout_secs: Option<u64>,
    max_cycles: Option<u64>,
    output: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FilePrivilegeConfig {
    enable_debug: Option<bool>,
    require_debug: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileScanConfig {
    observer_policy: Option<ObserverPolicy>,
    observer_pid_floor: Option<u32>,
    max_ancestry_depth: Option<usize>,
    resolve_image_paths: Option<bool>,
}

impl WatchConfig {
    pub(super) fn apply_file_config(&mut self) -> Result<bool> {
        let Some(path) = resolve_config_path()? else {
            return Ok(false);
        };

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed reading config file {}", path.display()))?;
        self.apply_file_text(&raw)
            .with_context(|| format!("failed parsing TOML config {}", path.display()))?;
        Ok(true)
    }

    pub(super) fn apply_file_text(&mut self, raw: &str) -> Result<()> {
        let file_cfg: FileConfig = toml::from_str(raw)?;
        self.apply_file_watch(file_cfg.watch)?;
        self.apply_file_privilege(file_cfg.privilege);
        self.apply_file_scan(file_cfg.scan);
        Ok(())
    }

    fn apply_file_watch(&mut self, watch: Option<FileWatchConfig>) -> Result<()> {
        let Some(watch) = watch else {
            return Ok(());
        };

        if let Some(v) = watch.poll_interval_secs {
            self.poll_interval_secs = v;
        }
        if let Some(v) = watch.scan_timeout_secs {
            self.scan_timeout_secs = v;
        }
        if let Some(v) = watch.max_cycles {
            self.max_cycles = v;
        }
        if let Some(v) = non_empty(watch.output) {
            self.output = parse_output(&v)
                .with_context(|| format!("unknown output format '{}'", v.trim()))?;
        }
        Ok(())
    }

    fn apply_file_privilege(&mut self, privilege: Option<FilePrivilegeConfig>) {
        let Some(privilege) = privilege else {
            return;
        };
        if let Some(v) = privilege.enable_debug {
            self.enable_debug_privilege = v;
        }
        if let Some(v) = privilege.require_debug {
            self.require_debug_privilege = v;
        }
    }

    fn apply_file_scan(&mut self, scan: Option<FileScanConfig>) {
        let Some(scan) = scan else {
            return;
        };
        if let Some(v) = scan.observer_policy {
            self.scan.observer_policy = v;
        }
        if let Some(v) = scan.observer_pid_floor {
            self.scan.observer_pid_floor = v;
        }
        if let Some(v) = scan.max_ancestry_depth {
            self.scan.max_ancestry_depth = v;
        }
        if let Some(v) = scan.resolve_image_paths {
            self.scan.resolve_image_paths = v;
        }
    }
}
