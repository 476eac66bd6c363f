pub mod ingest;
pub mod report;
pub mod writer;

pub use report::{AlertSummary, CategorySummary, LatencyStats, Report, ReportBuilder, Summary, VerdictRecord};
pub use writer::{write_all, write_metrics_csv, write_metrics_json, write_report};
