use std::collections::HashSet;
use std::time::Duration;

use bot_probe::config::{HarnessConfig, SessionMode};
use bot_probe::error::{HarnessError, IngestError};
use bot_probe::http_client::{create_api_client, ClientOptions};
use bot_probe::output::{ingest, Report};
use bot_probe::probe::{Executor, Mode};
use bot_probe::scoring::{classify_all, Category};
use bot_probe::suite::Suite;
use bot_probe::traffic::{concurrent_health, BehaviorProfile, TrafficGenerator};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn executor(server: &MockServer) -> Executor {
    let opts = ClientOptions { timeout: Duration::from_secs(5), proxy: None };
    Executor::new(&server.uri(), opts, SessionMode::Isolated).unwrap()
}

fn quick_config(target: String, out_dir: &std::path::Path) -> HarnessConfig {
    HarnessConfig {
        target,
        out_dir: out_dir.to_string_lossy().into_owned(),
        agent_delay_ms: 0,
        probe_delay_ms: 0,
        pool_workers: 2,
        requests_per_worker: 2,
        burst_size: 3,
        load_requests: 3,
        ingest: false,
        ..Default::default()
    }
}

#[tokio::test]
async fn pool_of_ten_by_five_yields_fifty_unique_outcomes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .expect(50)
        .mount(&server)
        .await;

    let outcomes = executor(&server).run_pool(10, 5, concurrent_health).await;
    assert_eq!(outcomes.len(), 50);

    let slots: HashSet<(usize, usize)> = outcomes
        .iter()
        .map(|o| {
            let tag = o.worker.unwrap();
            (tag.worker_id, tag.request_id)
        })
        .collect();
    assert_eq!(slots.len(), 50);
    assert!(slots.iter().all(|(w, r)| *w < 10 && *r < 5));

    let verdicts = classify_all(outcomes);
    assert!(verdicts.iter().all(|v| v.passed && v.category == Category::ConcurrentLoad));
}

#[tokio::test]
async fn burst_passes_once_limiter_answers_429() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(5)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(429))
        .with_priority(2)
        .mount(&server)
        .await;

    let specs = TrafficGenerator::default().generate(BehaviorProfile::RapidFire);
    assert_eq!(specs.len(), 15);
    let outcomes = executor(&server).run(specs, Mode::Sequential { delay: Duration::ZERO }).await;
    assert_eq!(outcomes[4].status, 401);
    assert_eq!(outcomes[5].status, 429);

    let verdicts = classify_all(outcomes);
    assert_eq!(verdicts.len(), 15);
    assert!(verdicts.iter().all(|v| v.passed && v.category == Category::RateLimit));
    assert!(verdicts[0].note.contains("request 6 of 15"), "{}", verdicts[0].note);
}

#[tokio::test]
async fn burst_without_429_fails_every_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let specs = TrafficGenerator::new(15, 20).generate(BehaviorProfile::RapidFire);
    let outcomes = executor(&server).run(specs, Mode::Sequential { delay: Duration::ZERO }).await;
    let verdicts = classify_all(outcomes);
    assert_eq!(verdicts.len(), 15);
    assert!(verdicts.iter().all(|v| !v.passed));
}

#[tokio::test]
async fn headless_agents_must_be_blocked() {
    let blocking = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/products"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&blocking)
        .await;
    let open = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/products"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&open)
        .await;

    let generator = TrafficGenerator::default();
    let mode = Mode::Sequential { delay: Duration::ZERO };

    let blocked = classify_all(executor(&blocking).run(generator.generate(BehaviorProfile::HeadlessAgents), mode).await);
    assert!(!blocked.is_empty());
    assert!(blocked.iter().all(|v| v.category == Category::HeadlessBot && v.passed));

    let allowed = classify_all(executor(&open).run(generator.generate(BehaviorProfile::HeadlessAgents), mode).await);
    assert!(allowed.iter().all(|v| !v.passed));
}

#[tokio::test]
async fn injection_answered_with_200_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/products"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let specs = TrafficGenerator::default().generate(BehaviorProfile::SqlInjection);
    let count = specs.len();
    let verdicts = classify_all(executor(&server).run(specs, Mode::Sequential { delay: Duration::ZERO }).await);
    assert_eq!(verdicts.len(), count);
    assert!(verdicts.iter().all(|v| v.category == Category::Injection && !v.passed));

    let tautology = verdicts
        .iter()
        .find(|v| v.outcome.spec.query.iter().any(|(_, val)| val == "1' OR '1'='1"))
        .expect("tautology payload is in the catalog");
    assert_eq!(tautology.outcome.status, 200);
}

#[tokio::test]
async fn injection_rejected_with_404_passes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/products"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let specs = TrafficGenerator::default().generate(BehaviorProfile::QueryProbes);
    let verdicts = classify_all(executor(&server).run(specs, Mode::Sequential { delay: Duration::ZERO }).await);
    assert!(verdicts.iter().all(|v| v.passed));
}

#[tokio::test]
async fn unhealthy_target_aborts_the_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let mut suite = Suite::new(quick_config(server.uri(), tmp.path()), CancellationToken::new()).unwrap();
    match suite.check_liveness().await {
        Err(HarnessError::TargetUnreachable { reason, .. }) => assert!(reason.contains("503")),
        other => panic!("expected TargetUnreachable, got {:?}", other),
    }
}

#[tokio::test]
async fn unreachable_target_aborts_the_run() {
    let tmp = tempfile::tempdir().unwrap();
    let suite = Suite::new(quick_config("http://127.0.0.1:9".into(), tmp.path()), CancellationToken::new()).unwrap();
    let err = suite.run_all().await.unwrap_err();
    assert!(err.downcast_ref::<HarnessError>().is_some());
    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn full_run_writes_consistent_artifacts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/products"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .with_priority(10)
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let suite = Suite::new(quick_config(server.uri(), tmp.path()), CancellationToken::new()).unwrap();
    let (report, files) = suite.run_all().await.unwrap();

    assert_eq!(files.len(), 3);
    assert!(files.iter().all(|f| f.exists()));
    assert!(tmp.path().join("bot_metrics.json").exists());
    assert!(tmp.path().join("bot_metrics.csv").exists());

    let s = &report.summary;
    assert_eq!(s.total, s.passed + s.failed);
    assert_eq!(s.status_histogram.values().sum::<usize>(), s.total);
    assert_eq!(report.verdicts_in(Category::ConcurrentLoad).count(), 4);
    assert_eq!(report.verdicts_in(Category::RateLimit).count(), 3);
    assert!(report.verdicts_in(Category::RateLimit).all(|v| v.passed));
    assert_eq!(report.verdicts_in(Category::Session).count(), 2);

    let report_file = files.iter().find(|f| f.to_string_lossy().contains("bot_test_report_")).unwrap();
    let parsed: Report = serde_json::from_str(&std::fs::read_to_string(report_file).unwrap()).unwrap();
    assert_eq!(parsed.summary.total, s.total);
    assert_eq!(parsed.summary.passed, s.passed);
    assert_eq!(parsed.summary.status_histogram, s.status_histogram);
    assert_eq!(parsed.verdicts.len(), s.total);

    let csv_rows = std::fs::read_to_string(tmp.path().join("bot_metrics.csv")).unwrap().lines().count();
    assert_eq!(csv_rows, s.total + 1);
}

#[tokio::test]
async fn target_mounted_under_a_path_prefix() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/shop/health"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/shop/api/admin/bot-metrics/ingest"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let target = format!("{}/shop", server.uri());
    let opts = ClientOptions { timeout: Duration::from_secs(5), proxy: None };
    let exec = Executor::new(&target, opts, SessionMode::Isolated).unwrap();
    let specs = TrafficGenerator::default().generate(BehaviorProfile::Connectivity);
    let outcomes = exec.run(specs, Mode::Sequential { delay: Duration::ZERO }).await;
    assert_eq!(outcomes[0].status, 200);

    let client = create_api_client(Duration::from_secs(5)).unwrap();
    let target = url::Url::parse(&target).unwrap();
    ingest::submit(&client, &target, Some("local-test-key"), &[]).await.unwrap();
}

#[tokio::test]
async fn ingestion_sends_admin_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ingest::INGEST_PATH))
        .and(header(ingest::ADMIN_KEY_HEADER, "local-test-key"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_api_client(Duration::from_secs(5)).unwrap();
    let target = url::Url::parse(&server.uri()).unwrap();
    ingest::submit(&client, &target, Some("local-test-key"), &[]).await.unwrap();
}

#[tokio::test]
async fn ingestion_rejection_is_reported_not_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ingest::INGEST_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let client = create_api_client(Duration::from_secs(5)).unwrap();
    let target = url::Url::parse(&server.uri()).unwrap();
    match ingest::submit(&client, &target, Some("wrong"), &[]).await {
        Err(IngestError::Rejected { status, body }) => {
            assert_eq!(status, 401);
            assert_eq!(body, "bad key");
        }
        other => panic!("expected rejection, got {:?}", other),
    }
    assert!(matches!(ingest::submit(&client, &target, None, &[]).await, Err(IngestError::MissingKey)));
}
