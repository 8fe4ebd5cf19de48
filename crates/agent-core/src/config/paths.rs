use std::path::{Path, PathBuf};

use anyhow::Result;

use super::constants::WATCH_CONFIG_CANDIDATES;

pub(super) fn resolve_config_path() -> Result<Option<PathBuf>> {
    resolve_path_from_env_or_candidates("THREADWATCH_CONFIG", &WATCH_CONFIG_CANDIDATES)
}

fn resolve_path_from_env_or_candidates(
    env_var: &str,
    candidates: &[&str],
) -> Result<Option<PathBuf>> {
    if let Ok(p) = std::env::var(env_var) {
        let p = p.trim();
        if !p.is_empty() {
            let path = PathBuf::from(p);
            if !path.exists() {
                anyhow::bail!("configured {} does not exist: {}", env_var, path.display());
            }
            return Ok(Some(path));
        }
    }

    Ok(candidates
        .iter()
        .map(Path::new)
        .find(|path| path.exists())
        .map(Path::to_path_buf))
}
