use csv::Writer;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::output::report::{Report, VerdictRecord};
use crate::utils::ensure_dir;

pub const METRICS_JSON: &str = "bot_metrics.json";
pub const METRICS_CSV: &str = "bot_metrics.csv";

pub fn report_file_name(report: &Report) -> String {
    format!("bot_test_report_{}.json", report.generated_at.format("%Y%m%d_%H%M%S"))
}

/// Full report as pretty JSON under a timestamped name.
pub fn write_report(dir: &Path, report: &Report) -> anyhow::Result<PathBuf> {
    ensure_dir(dir)?;
    let path = dir.join(report_file_name(report));
    fs::write(&path, serde_json::to_string_pretty(report)?)?;
    Ok(path)
}

pub fn write_metrics_json(dir: &Path, records: &[VerdictRecord]) -> anyhow::Result<PathBuf> {
    ensure_dir(dir)?;
    let path = dir.join(METRICS_JSON);
    fs::write(&path, serde_json::to_string_pretty(records)?)?;
    Ok(path)
}

pub fn write_metrics_csv(dir: &Path, records: &[VerdictRecord]) -> anyhow::Result<PathBuf> {
    ensure_dir(dir)?;
    let path = dir.join(METRICS_CSV);
    let mut w = Writer::from_writer(File::create(&path)?);
    w.write_record(["test", "category", "timestamp", "status_code", "response_time", "success", "message"])?;
    for r in records {
        w.write_record(&[
            r.test.clone(),
            r.category.label().to_string(),
            r.timestamp.to_rfc3339(),
            r.status_code.to_string(),
            format!("{:.4}", r.response_time),
            r.success.to_string(),
            r.message.clone(),
        ])?;
    }
    w.flush()?;
    Ok(path)
}

/// All local artifacts: report, metrics JSON, metrics CSV.
pub fn write_all(dir: &Path, report: &Report) -> anyhow::Result<Vec<PathBuf>> {
    let records = report.records();
    Ok(vec![
        write_report(dir, report)?,
        write_metrics_json(dir, &records)?,
        write_metrics_csv(dir, &records)?,
    ])
}
