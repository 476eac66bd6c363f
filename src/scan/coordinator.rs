use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use super::{ScanKind, ScannerApi};
use crate::error::ScanError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum ScanStatus {
    Pending,
    Running { progress: u8 },
    Completed,
    TimedOut,
}

impl ScanStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ScanStatus::Completed | ScanStatus::TimedOut)
    }

    pub fn label(self) -> &'static str {
        match self {
            ScanStatus::Pending => "pending",
            ScanStatus::Running { .. } => "running",
            ScanStatus::Completed => "completed",
            ScanStatus::TimedOut => "timed-out",
        }
    }
}

/// A launched scan. Its status only moves through polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanHandle {
    pub scan_id: String,
    pub kind: ScanKind,
    pub started_at: DateTime<Utc>,
    pub status: ScanStatus,
    pub polls: u32,
    #[serde(skip)]
    launched: Option<Instant>,
}

impl ScanHandle {
    fn new(scan_id: String, kind: ScanKind) -> Self {
        Self {
            scan_id,
            kind,
            started_at: Utc::now(),
            status: ScanStatus::Pending,
            polls: 0,
            launched: Some(Instant::now()),
        }
    }

    /// Time since launch. Handles read back from JSON have no monotonic
    /// start and fall back to `started_at`.
    pub fn elapsed(&self) -> Duration {
        match self.launched {
            Some(t) => t.elapsed(),
            None => (Utc::now() - self.started_at).to_std().unwrap_or_default(),
        }
    }
}

/// Poll cadence and wall-clock ceiling for one scan kind.
#[derive(Debug, Clone, Copy)]
pub struct ScanPolicy {
    pub interval: Duration,
    /// None polls until the scanner reports 100%.
    pub ceiling: Option<Duration>,
}

impl ScanPolicy {
    pub fn for_kind(kind: ScanKind) -> Self {
        Self { interval: kind.default_interval(), ceiling: Some(Duration::from_secs(600)) }
    }
}

/// A scan in a terminal state plus whatever it discovered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub handle: ScanHandle,
    pub results: Vec<String>,
}

impl ScanRecord {
    pub fn new(handle: ScanHandle, results: Vec<String>) -> Result<Self, ScanError> {
        if !handle.status.is_terminal() {
            return Err(ScanError::NotCompleted { scan_id: handle.scan_id, state: handle.status.label() });
        }
        Ok(Self { handle, results })
    }
}

/// Launches scans and polls them one at a time on the calling task.
pub struct ScanCoordinator<A: ScannerApi> {
    api: A,
    spider: ScanPolicy,
    active: ScanPolicy,
    show_progress: bool,
}

impl<A: ScannerApi> ScanCoordinator<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            spider: ScanPolicy::for_kind(ScanKind::Spider),
            active: ScanPolicy::for_kind(ScanKind::Active),
            show_progress: false,
        }
    }

    pub fn with_policy(mut self, kind: ScanKind, policy: ScanPolicy) -> Self {
        match kind {
            ScanKind::Spider => self.spider = policy,
            ScanKind::Active => self.active = policy,
        }
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn policy(&self, kind: ScanKind) -> ScanPolicy {
        match kind {
            ScanKind::Spider => self.spider,
            ScanKind::Active => self.active,
        }
    }

    pub async fn launch(&self, kind: ScanKind, target: &str) -> Result<ScanHandle, ScanError> {
        let scan_id = self
            .api
            .start_scan(kind, target)
            .await
            .map_err(|e| ScanError::Launch(e.to_string()))?;
        tracing::info!(%kind, scan_id = %scan_id, url = %target, "scan launched");
        Ok(ScanHandle::new(scan_id, kind))
    }

    /// One status read. Terminal handles are returned as-is with no remote call.
    pub async fn poll(&self, handle: &mut ScanHandle) -> ScanStatus {
        if handle.status.is_terminal() {
            return handle.status;
        }
        if let Some(ceiling) = self.policy(handle.kind).ceiling {
            if handle.elapsed() > ceiling {
                tracing::warn!(kind = %handle.kind, scan_id = %handle.scan_id, elapsed = ?handle.elapsed(), "scan ceiling reached, abandoning");
                handle.status = ScanStatus::TimedOut;
                return handle.status;
            }
        }

        handle.polls += 1;
        match self.api.scan_status(handle.kind, &handle.scan_id).await {
            Ok(progress) if progress >= 100 => handle.status = ScanStatus::Completed,
            Ok(progress) => handle.status = ScanStatus::Running { progress },
            Err(e) => {
                tracing::warn!(kind = %handle.kind, scan_id = %handle.scan_id, error = %e, "status poll failed");
            }
        }
        handle.status
    }

    /// Poll until completed, the ceiling passes, or `cancel` fires.
    pub async fn await_completion(&self, handle: &mut ScanHandle, cancel: &CancellationToken) -> ScanStatus {
        let interval = self.policy(handle.kind).interval;
        let bar = self.progress_bar(handle);

        loop {
            let status = self.poll(handle).await;
            if let ScanStatus::Running { progress } = status {
                bar.set_position(u64::from(progress));
            }
            if status.is_terminal() {
                break;
            }
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::warn!(kind = %handle.kind, scan_id = %handle.scan_id, "scan polling cancelled");
                    handle.status = ScanStatus::TimedOut;
                    break;
                }
                _ = sleep(interval) => {}
            }
        }

        if handle.status == ScanStatus::Completed {
            bar.set_position(100);
        }
        bar.finish_and_clear();
        handle.status
    }

    /// Results of a completed scan; spider scans return discovered URLs, active scans none.
    pub async fn fetch_results(&self, handle: &ScanHandle) -> Result<Vec<String>, ScanError> {
        if handle.status != ScanStatus::Completed {
            return Err(ScanError::NotCompleted { scan_id: handle.scan_id.clone(), state: handle.status.label() });
        }
        match handle.kind {
            ScanKind::Spider => self.api.spider_results(&handle.scan_id).await,
            ScanKind::Active => Ok(Vec::new()),
        }
    }

    /// Launch, wait, fetch. Only a failed launch is an error.
    pub async fn run(&self, kind: ScanKind, target: &str, cancel: &CancellationToken) -> Result<ScanRecord, ScanError> {
        let mut handle = self.launch(kind, target).await?;
        let status = self.await_completion(&mut handle, cancel).await;
        let results = match status {
            ScanStatus::Completed => match self.fetch_results(&handle).await {
                Ok(results) => results,
                Err(e) => {
                    tracing::warn!(%kind, error = %e, "fetching scan results failed");
                    Vec::new()
                }
            },
            _ => Vec::new(),
        };
        tracing::info!(%kind, status = status.label(), polls = handle.polls, results = results.len(), "scan finished");
        ScanRecord::new(handle, results)
    }

    fn progress_bar(&self, handle: &ScanHandle) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template("{msg} [{bar:40}] {pos}% ({elapsed})")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar.set_message(format!("{} scan {}", handle.kind, handle.scan_id));
        bar
    }
}
