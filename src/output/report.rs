use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::scan::{Alert, ScanRecord};
use crate::scoring::{Category, Verdict};

/// Latency figures in seconds, over outcomes that got a response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub samples: usize,
    pub min: f64,
    pub avg: f64,
    pub max: f64,
    pub p50: f64,
    pub p95: f64,
}

impl LatencyStats {
    pub fn from_samples(mut samples: Vec<f64>) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        samples.sort_by(|a, b| a.total_cmp(b));
        let n = samples.len();
        let sum: f64 = samples.iter().sum();
        Self {
            samples: n,
            min: samples[0],
            avg: sum / n as f64,
            max: samples[n - 1],
            p50: percentile(&samples, 50.0),
            p95: percentile(&samples, 95.0),
        }
    }
}

/// Nearest-rank percentile of an ascending, non-empty slice.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let rank = ((pct / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub pass_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub pass_rate: f64,
    pub transport_failures: usize,
    pub status_histogram: BTreeMap<u16, usize>,
    pub latency: LatencyStats,
    pub categories: BTreeMap<Category, CategorySummary>,
}

impl Summary {
    pub fn from_verdicts(verdicts: &[Verdict]) -> Self {
        let mut summary = Summary { total: verdicts.len(), ..Default::default() };
        let mut latencies = Vec::with_capacity(verdicts.len());

        for v in verdicts {
            let cat = summary.categories.entry(v.category).or_default();
            cat.total += 1;
            if v.passed {
                summary.passed += 1;
                cat.passed += 1;
            } else {
                summary.failed += 1;
                cat.failed += 1;
            }
            *summary.status_histogram.entry(v.outcome.status).or_insert(0) += 1;
            if v.outcome.is_transport_failure() {
                summary.transport_failures += 1;
            } else {
                latencies.push(v.outcome.latency_secs);
            }
        }

        summary.pass_rate = rate(summary.passed, summary.total);
        for cat in summary.categories.values_mut() {
            cat.pass_rate = rate(cat.passed, cat.total);
        }
        summary.latency = LatencyStats::from_samples(latencies);
        summary
    }
}

fn rate(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertSummary {
    pub total: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub informational: usize,
    pub top: Vec<Alert>,
}

impl AlertSummary {
    pub fn from_alerts(alerts: &[Alert]) -> Self {
        let count = |risk: &str| alerts.iter().filter(|a| a.risk.eq_ignore_ascii_case(risk)).count();
        let mut ranked: Vec<&Alert> = alerts.iter().collect();
        ranked.sort_by_key(|a| risk_rank(&a.risk));
        Self {
            total: alerts.len(),
            high: count("High"),
            medium: count("Medium"),
            low: count("Low"),
            informational: count("Informational"),
            top: ranked.into_iter().take(5).cloned().collect(),
        }
    }
}

fn risk_rank(risk: &str) -> u8 {
    match risk.to_ascii_lowercase().as_str() {
        "high" => 0,
        "medium" => 1,
        "low" => 2,
        _ => 3,
    }
}

/// Flat per-verdict record, the shape the ingestion endpoint and metrics file use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictRecord {
    pub test: String,
    pub category: Category,
    pub timestamp: DateTime<Utc>,
    pub status_code: u16,
    pub response_time: f64,
    pub success: bool,
    pub message: String,
}

/// Everything observed during one run. Built once by [`ReportBuilder::build`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub target: String,
    pub summary: Summary,
    pub verdicts: Vec<Verdict>,
    pub scans: Vec<ScanRecord>,
    pub scanner_version: Option<String>,
    pub alerts: AlertSummary,
}

impl Report {
    pub fn verdicts_in(&self, category: Category) -> impl Iterator<Item = &Verdict> {
        self.verdicts.iter().filter(move |v| v.category == category)
    }

    pub fn records(&self) -> Vec<VerdictRecord> {
        self.verdicts
            .iter()
            .map(|v| VerdictRecord {
                test: v.outcome.spec.name.clone(),
                category: v.category,
                timestamp: self.generated_at,
                status_code: v.outcome.status,
                response_time: v.outcome.latency_secs,
                success: v.passed,
                message: v.note.clone(),
            })
            .collect()
    }

    pub fn print_summary(&self) {
        let s = &self.summary;
        println!("\n{}", "=".repeat(60));
        println!("          BOT PROTECTION VERIFICATION REPORT");
        println!("{}", "=".repeat(60));
        println!("\n[*] Target: {}", self.target);
        println!("    Total Tests: {}", s.total);
        println!("    Passed:      {}", s.passed);
        println!("    Failed:      {}", s.failed);
        println!("    Pass Rate:   {:.1}%", s.pass_rate * 100.0);

        if !s.categories.is_empty() {
            println!("\n[*] Categories:");
            for (cat, c) in &s.categories {
                let mark = if c.failed == 0 { "[+]" } else { "[!]" };
                println!("    {} {:<18} {}/{} ({:.0}%)", mark, cat.label(), c.passed, c.total, c.pass_rate * 100.0);
            }
        }

        println!("\n[*] Status Code Distribution:");
        for (status, count) in &s.status_histogram {
            let label = match *status {
                0 => "transport failure",
                200..=299 => "success",
                400..=499 => "client error",
                500..=599 => "server error",
                _ => "other",
            };
            println!("    {}: {} ({})", status, count, label);
        }

        if s.latency.samples > 0 {
            println!("\n[*] Response Times:");
            println!("    Average: {:.3}s", s.latency.avg);
            println!("    Min:     {:.3}s", s.latency.min);
            println!("    Max:     {:.3}s", s.latency.max);
            println!("    p95:     {:.3}s", s.latency.p95);
        }

        for scan in &self.scans {
            println!(
                "\n[*] {} scan {}: {} after {} polls, {} URLs",
                scan.handle.kind,
                scan.handle.scan_id,
                scan.handle.status.label(),
                scan.handle.polls,
                scan.results.len()
            );
        }

        if self.alerts.total > 0 {
            let a = &self.alerts;
            println!("\n[*] Scanner Alerts: {} (High {}, Medium {}, Low {}, Info {})", a.total, a.high, a.medium, a.low, a.informational);
            for alert in &a.top {
                println!("    - {} ({} risk)", alert.alert, alert.risk);
            }
        }
        println!("{}", "=".repeat(60));
    }
}

/// Collects verdicts and scan records; consumed by `build`.
#[derive(Debug, Default)]
pub struct ReportBuilder {
    target: String,
    verdicts: Vec<Verdict>,
    scans: Vec<ScanRecord>,
    alerts: Vec<Alert>,
    scanner_version: Option<String>,
}

impl ReportBuilder {
    pub fn new(target: impl Into<String>) -> Self {
        Self { target: target.into(), ..Default::default() }
    }

    pub fn add_verdicts(&mut self, verdicts: impl IntoIterator<Item = Verdict>) {
        self.verdicts.extend(verdicts);
    }

    pub fn add_scan(&mut self, record: ScanRecord) {
        self.scans.push(record);
    }

    pub fn set_alerts(&mut self, alerts: Vec<Alert>) {
        self.alerts = alerts;
    }

    pub fn set_scanner_version(&mut self, version: String) {
        self.scanner_version = Some(version);
    }

    pub fn verdict_count(&self) -> usize {
        self.verdicts.len()
    }

    pub fn build(self) -> Report {
        Report {
            generated_at: Utc::now(),
            summary: Summary::from_verdicts(&self.verdicts),
            alerts: AlertSummary::from_alerts(&self.alerts),
            target: self.target,
            verdicts: self.verdicts,
            scans: self.scans,
            scanner_version: self.scanner_version,
        }
    }
}
