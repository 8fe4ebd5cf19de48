mod config;
mod report;
mod watch;

use std::sync::Arc;

use anyhow::{Context, Result};
use platform_windows::{debug_privilege_enabled, enable_debug_privilege, WindowsPlatform};
use self_protect::ThreadWatchEngine;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::WatchConfig;
use report::render_report;
use watch::{CycleOutcome, ScanWorker};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let config = WatchConfig::load()?;
    prepare_debug_privilege(&config)?;

    // The watched thread is the one that builds the engine.
    let engine = Arc::new(
        ThreadWatchEngine::new(Arc::new(WindowsPlatform::new()), config.scan.clone())
            .context("failed initializing thread watch engine")?,
    );

    info!(
        pid = engine.self_pid(),
        platform = platform_windows::platform_name(),
        policy = config.scan.observer_policy.as_str(),
        interval_secs = config.poll_interval().as_secs(),
        "threadwatch agent started"
    );

    let mut worker = ScanWorker::new(Arc::clone(&engine), config.scan_timeout());
    let mut ticker = tokio::time::interval(config.poll_interval());
    let mut cycle: u64 = 0;
    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
            _ = ticker.tick() => {
                cycle += 1;
                match worker.run_cycle().await {
                    CycleOutcome::Report(report) => {
                        println!("{}", render_report(&report, cycle, unix_now(), config.output)?);
                    }
                    CycleOutcome::TimedOut => {
                        warn!(cycle, timeout_secs = config.scan_timeout().as_secs(), "scan timed out, result discarded");
                    }
                    CycleOutcome::Skipped => {
                        warn!(cycle, "previous scan still running, cycle skipped");
                    }
                    CycleOutcome::WorkerFailed(detail) => {
                        warn!(cycle, detail = %detail, "scan worker failed");
                    }
                    CycleOutcome::Failed(err) => {
                        return Err(err).context("thread watch scan failed");
                    }
                }
                if config.max_cycles > 0 && cycle >= config.max_cycles {
                    break;
                }
            }
        }
    }

    info!(cycles = cycle, "threadwatch agent stopped");
    Ok(())
}

fn prepare_debug_privilege(config: &WatchConfig) -> Result<()> {
    if !config.enable_debug_privilege {
        return Ok(());
    }

    match enable_debug_privilege() {
        Ok(()) => {
            let confirmed = debug_privilege_enabled().unwrap_or(false);
            info!(confirmed, "debug privilege enabled");
        }
        Err(err) if config.require_debug_privilege => {
            return Err(err).context("failed enabling SeDebugPrivilege");
        }
        Err(err) => {
            warn!(error = %err, "continuing without debug privilege; holders in other sessions may be missed");
        }
    }
    Ok(())
}

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
