//! The ordered verification run: liveness gate, request phases, scanner phase,
//! then report, artifacts and ingestion.

use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::HarnessConfig;
use crate::error::{HarnessError, IngestError};
use crate::http_client::{create_api_client, ClientOptions};
use crate::output::{ingest, write_all, Report, ReportBuilder};
use crate::probe::{Executor, Mode, Outcome};
use crate::scan::{ScanCoordinator, ScanKind, ScanPolicy, ScannerApi, ZapClient};
use crate::scoring::{classify, classify_all, Category, Verdict};
use crate::traffic::{concurrent_health, BehaviorProfile, RequestSpec, TrafficGenerator};

/// Request phases after the liveness gate, in run order.
pub const PHASES: [BehaviorProfile; 13] = [
    BehaviorProfile::SuspiciousAgents,
    BehaviorProfile::HeadlessAgents,
    BehaviorProfile::SqlInjection,
    BehaviorProfile::QueryProbes,
    BehaviorProfile::ConcurrentHealth,
    BehaviorProfile::PostVariants,
    BehaviorProfile::HeaderSpoofing,
    BehaviorProfile::Session,
    BehaviorProfile::AdminAccess,
    BehaviorProfile::RapidFire,
    BehaviorProfile::NormalBrowsing,
    BehaviorProfile::BotBehavior,
    BehaviorProfile::Mixed,
];

pub struct Suite {
    config: HarnessConfig,
    executor: Executor,
    generator: TrafficGenerator,
    builder: ReportBuilder,
    cancel: CancellationToken,
    show_progress: bool,
}

impl Suite {
    pub fn new(config: HarnessConfig, cancel: CancellationToken) -> anyhow::Result<Self> {
        let proxy = if config.scanner.proxy_target { config.scanner.url.clone() } else { None };
        if let Some(p) = &proxy {
            tracing::info!(proxy = %p, "routing target traffic through scanner proxy");
        }
        let opts = ClientOptions { timeout: config.request_timeout(), proxy };
        let executor = Executor::new(&config.target, opts, config.session_mode)?;
        let generator = TrafficGenerator::new(config.burst_size, config.load_requests);
        let builder = ReportBuilder::new(config.target.clone());
        Ok(Self { config, executor, generator, builder, cancel, show_progress: false })
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// `GET /health` must answer 200 or nothing else runs.
    pub async fn check_liveness(&mut self) -> Result<(), HarnessError> {
        let specs = self.generator.generate(BehaviorProfile::Connectivity);
        let timeout = Duration::from_secs(self.config.liveness_timeout_secs);
        let mut reason = None;
        for spec in specs {
            let outcome = self.executor.dispatch_one(spec, Some(timeout)).await;
            if outcome.status != 200 {
                reason = Some(match &outcome.error {
                    Some(e) => e.clone(),
                    None => format!("health check returned {}", outcome.status),
                });
            }
            self.builder.add_verdicts([classify(outcome, Category::Connectivity)]);
        }
        match reason {
            Some(reason) => Err(HarnessError::TargetUnreachable { url: self.config.target.clone(), reason }),
            None => {
                println!("[+] Target {} is alive", self.config.target);
                Ok(())
            }
        }
    }

    fn mode_for(&self, profile: BehaviorProfile) -> Mode {
        use BehaviorProfile as P;
        match profile {
            P::SuspiciousAgents | P::HeadlessAgents | P::PostVariants => Mode::Sequential { delay: self.config.agent_delay() },
            P::SqlInjection | P::QueryProbes | P::HeaderSpoofing | P::AdminAccess | P::Session => {
                Mode::Sequential { delay: self.config.probe_delay() }
            }
            P::RapidFire => Mode::Sequential { delay: Duration::ZERO },
            P::ConcurrentHealth => Mode::Pool { workers: self.config.pool_workers },
            P::Connectivity | P::NormalBrowsing | P::BotBehavior | P::Mixed => Mode::Sequential { delay: Duration::from_millis(100) },
        }
    }

    async fn outcomes_for(&self, profile: BehaviorProfile) -> Vec<Outcome> {
        if profile == BehaviorProfile::ConcurrentHealth {
            return self
                .executor
                .run_pool(self.config.pool_workers, self.config.requests_per_worker, concurrent_health)
                .await;
        }
        let specs: Vec<RequestSpec> = self.generator.generate(profile);
        self.executor.run(specs, self.mode_for(profile)).await
    }

    /// Generate, dispatch and classify one profile. One verdict per generated request.
    pub async fn run_profile(&self, profile: BehaviorProfile) -> Vec<Verdict> {
        let outcomes = self.outcomes_for(profile).await;
        let verdicts = classify_all(outcomes);

        if profile == BehaviorProfile::Session {
            let cookies = self.executor.cookie_count();
            println!("[*] Session holds {} cookie(s)", cookies);
            tracing::info!(cookies, "session cookies after follow-up request");
        }

        let passed = verdicts.iter().filter(|v| v.passed).count();
        let mark = if passed == verdicts.len() { "[+]" } else { "[!]" };
        println!("{} {:<18} {}/{} passed", mark, profile.name(), passed, verdicts.len());
        tracing::info!(%profile, passed, total = verdicts.len(), "phase complete");
        verdicts
    }

    /// Every request phase in order. Stops early, keeping what ran, if cancelled.
    pub async fn run_phases(&mut self) {
        for profile in PHASES {
            if self.cancel.is_cancelled() {
                tracing::warn!(%profile, "cancelled, skipping remaining phases");
                break;
            }
            let verdicts = self.run_profile(profile).await;
            self.builder.add_verdicts(verdicts);
        }
        let (sent, failures) = self.executor.get_stats();
        tracing::info!(sent, transport_failures = failures, "request phases finished");
    }

    /// Version check, fresh session, spider, optional active scan, alerts.
    /// Every failure here is logged and skipped.
    pub async fn run_scanner(&mut self) {
        let Some(url) = self.config.scanner.url.clone() else {
            tracing::debug!("no scanner configured, skipping scan phase");
            return;
        };
        let client = match create_api_client(Duration::from_secs(30)) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "could not build scanner client");
                return;
            }
        };
        let api = ZapClient::new(client, &url, self.config.scanner.api_key.clone());
        self.scan_with(api).await;
    }

    pub async fn scan_with<A: ScannerApi>(&mut self, api: A) {
        let sc = self.config.scanner.clone();
        match api.version().await {
            Ok(version) => {
                println!("[+] Scanner reachable (version {})", version);
                self.builder.set_scanner_version(version);
            }
            Err(e) => {
                println!("[!] Scanner not reachable, skipping scan phase");
                tracing::warn!(error = %e, "scanner version check failed");
                return;
            }
        }
        if let Err(e) = api.new_session(&sc.session_name).await {
            tracing::warn!(error = %e, "could not start a fresh scanner session");
        }

        let coordinator = ScanCoordinator::new(api)
            .with_policy(
                ScanKind::Spider,
                ScanPolicy {
                    interval: Duration::from_secs(sc.spider_interval_secs),
                    ceiling: sc.spider_timeout_secs.map(Duration::from_secs),
                },
            )
            .with_policy(
                ScanKind::Active,
                ScanPolicy {
                    interval: Duration::from_secs(sc.active_interval_secs),
                    ceiling: sc.active_timeout_secs.map(Duration::from_secs),
                },
            )
            .with_progress(self.show_progress);

        let mut kinds = vec![ScanKind::Spider];
        if sc.run_active {
            kinds.push(ScanKind::Active);
        }
        for kind in kinds {
            if self.cancel.is_cancelled() {
                break;
            }
            match coordinator.run(kind, &self.config.target, &self.cancel).await {
                Ok(record) => self.builder.add_scan(record),
                Err(e) => {
                    println!("[!] {} scan could not be started", kind);
                    tracing::warn!(%kind, error = %e, "scan skipped");
                }
            }
        }

        match coordinator.api().alerts(&self.config.target).await {
            Ok(alerts) => self.builder.set_alerts(alerts),
            Err(e) => tracing::warn!(error = %e, "could not fetch scanner alerts"),
        }
    }

    /// Build the report, print it, write artifacts, then submit records.
    pub async fn finish(self) -> anyhow::Result<(Report, Vec<PathBuf>)> {
        let report = self.builder.build();
        report.print_summary();

        let files = write_all(&PathBuf::from(&self.config.out_dir), &report)?;
        for f in &files {
            println!("[*] Wrote {}", f.display());
        }

        if self.config.ingest {
            submit_records(&self.config, &report).await;
        }
        Ok((report, files))
    }

    /// Full run: liveness gate, request phases, scanner phase, report.
    pub async fn run_all(mut self) -> anyhow::Result<(Report, Vec<PathBuf>)> {
        self.check_liveness().await?;
        self.run_phases().await;
        if !self.cancel.is_cancelled() {
            self.run_scanner().await;
        }
        self.finish().await
    }
}

async fn submit_records(config: &HarnessConfig, report: &Report) {
    let client = match create_api_client(config.request_timeout()) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(error = %e, "could not build ingestion client");
            return;
        }
    };
    let target = match url::Url::parse(&config.target) {
        Ok(u) => u,
        Err(e) => {
            tracing::warn!(error = %e, "bad target url, skipping ingestion");
            return;
        }
    };
    match ingest::submit(&client, &target, config.admin_api_key.as_deref(), &report.records()).await {
        Ok(()) => println!("[+] Metrics submitted to {}", ingest::INGEST_PATH),
        Err(IngestError::MissingKey) => {
            tracing::warn!("no admin API key configured, skipping metrics ingestion");
        }
        Err(e) => {
            println!("[!] Metrics ingestion failed, local report kept");
            tracing::warn!(error = %e, "metrics ingestion failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_cover_every_profile_but_liveness() {
        for profile in BehaviorProfile::ALL {
            let in_phases = PHASES.contains(&profile);
            assert_eq!(in_phases, profile != BehaviorProfile::Connectivity, "{}", profile);
        }
    }

    #[test]
    fn burst_runs_without_delay() {
        let suite = Suite::new(HarnessConfig::default(), CancellationToken::new()).unwrap();
        assert!(matches!(suite.mode_for(BehaviorProfile::RapidFire), Mode::Sequential { delay } if delay.is_zero()));
        assert!(matches!(suite.mode_for(BehaviorProfile::ConcurrentHealth), Mode::Pool { workers: 10 }));
    }
}
