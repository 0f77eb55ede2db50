use crate::model::RunSummary;
use anyhow::Context;
use std::path::{Path, PathBuf};

pub const RESULT_PREFIX: &str = "results_";

/// `results_<YYYYmmdd_HHMMSS>.json`; lexical order is chronological order.
pub fn result_file_name(at: chrono::DateTime<chrono::Local>) -> String {
    format!("{}{}.json", RESULT_PREFIX, at.format("%Y%m%d_%H%M%S"))
}

pub fn is_result_file_name(name: &str) -> bool {
    name.starts_with(RESULT_PREFIX) && name.ends_with(".json")
}

pub fn write_summary(summary: &RunSummary, output_dir: &Path) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    let path = output_dir.join(result_file_name(chrono::Local::now()));
    let body = serde_json::to_string_pretty(summary).context("failed to encode run summary")?;
    std::fs::write(&path, body)
        .with_context(|| format!("failed to write {}", path.display()))?;

    tracing::info!(event = "summary_written", path = %path.display(), total = summary.summary.total);
    Ok(path)
}

pub fn read_summary(path: &Path) -> anyhow::Result<RunSummary> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).context("failed to parse run summary JSON")
}
