use anyhow::Result;
use self_protect::WatchReport;
use serde::Serialize;

use crate::config::OutputFormat;

#[derive(Debug, Serialize)]
struct CycleRecord<'a> {
    cycle: u64,
    observed_at_unix: i64,
    #[serde(flatten)]
    report: &'a WatchReport,
}

pub fn render_report(
    report: &WatchReport,
    cycle: u64,
    observed_at_unix: i64,
    format: OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(&CycleRecord {
            cycle,
            observed_at_unix,
            report,
        })?),
        OutputFormat::Text => {
            let marker = if report.detected() { "DETECTED " } else { "" };
            Ok(format!("[cycle {}] {}{}", cycle, marker, report.summary()))
        }
    }
}
