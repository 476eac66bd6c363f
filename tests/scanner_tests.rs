use std::time::Duration;

use bot_probe::config::HarnessConfig;
use bot_probe::error::ScanError;
use bot_probe::http_client::create_api_client;
use bot_probe::scan::{ScanCoordinator, ScanKind, ScanPolicy, ScanStatus, ScannerApi, ZapClient};
use bot_probe::suite::Suite;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_json(server: &MockServer, endpoint: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/JSON/{}/", endpoint)))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn zap(server: &MockServer, key: Option<&str>) -> ZapClient {
    let client = create_api_client(Duration::from_secs(5)).unwrap();
    ZapClient::new(client, &server.uri(), key.map(str::to_string))
}

fn fast() -> ScanPolicy {
    ScanPolicy { interval: Duration::from_millis(10), ceiling: Some(Duration::from_secs(5)) }
}

#[tokio::test]
async fn zap_fields_arrive_as_strings() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/JSON/core/view/version/"))
        .and(query_param("apikey", "zap-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "2.14.0"})))
        .expect(1)
        .mount(&server)
        .await;
    mount_json(&server, "spider/action/scan", json!({"scan": "3"})).await;
    mount_json(&server, "spider/view/status", json!({"status": "42"})).await;

    let api = zap(&server, Some("zap-key"));
    assert_eq!(api.version().await.unwrap(), "2.14.0");
    assert_eq!(api.start_scan(ScanKind::Spider, "http://target").await.unwrap(), "3");
    assert_eq!(api.scan_status(ScanKind::Spider, "3").await.unwrap(), 42);
}

#[tokio::test]
async fn spider_scan_completes_and_collects_urls() {
    let server = MockServer::start().await;
    mount_json(&server, "spider/action/scan", json!({"scan": "0"})).await;
    Mock::given(method("GET"))
        .and(path("/JSON/spider/view/status/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "50"})))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_json(&server, "spider/view/status", json!({"status": "100"})).await;
    mount_json(&server, "spider/view/results", json!({"results": ["http://target/", "http://target/api/products"]})).await;

    let coordinator = ScanCoordinator::new(zap(&server, None)).with_policy(ScanKind::Spider, fast());
    let record = coordinator.run(ScanKind::Spider, "http://target", &CancellationToken::new()).await.unwrap();

    assert_eq!(record.handle.status, ScanStatus::Completed);
    assert_eq!(record.handle.polls, 3);
    assert_eq!(record.results, vec!["http://target/", "http://target/api/products"]);
}

#[tokio::test]
async fn rejected_launch_is_a_launch_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/JSON/ascan/action/scan/"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let coordinator = ScanCoordinator::new(zap(&server, None));
    let err = coordinator.run(ScanKind::Active, "http://target", &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, ScanError::Launch(_)), "{:?}", err);
}

#[tokio::test]
async fn cancelled_scan_stops_polling() {
    let server = MockServer::start().await;
    mount_json(&server, "ascan/action/scan", json!({"scan": "9"})).await;
    mount_json(&server, "ascan/view/status", json!({"status": "10"})).await;

    let coordinator = ScanCoordinator::new(zap(&server, None))
        .with_policy(ScanKind::Active, ScanPolicy { interval: Duration::from_millis(20), ceiling: None });
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let record = coordinator.run(ScanKind::Active, "http://target", &cancel).await.unwrap();
    assert_eq!(record.handle.status, ScanStatus::TimedOut);
    assert!(record.results.is_empty());
}

#[tokio::test]
async fn scanner_phase_lands_in_report() {
    let server = MockServer::start().await;
    mount_json(&server, "core/view/version", json!({"version": "2.14.0"})).await;
    mount_json(&server, "core/action/newSession", json!({"Result": "OK"})).await;
    mount_json(&server, "spider/action/scan", json!({"scan": "1"})).await;
    mount_json(&server, "spider/view/status", json!({"status": "100"})).await;
    mount_json(&server, "spider/view/results", json!({"results": ["http://target/"]})).await;
    mount_json(
        &server,
        "core/view/alerts",
        json!({"alerts": [
            {"alert": "SQL Injection", "risk": "High", "url": "http://target/api/products", "confidence": "Medium"},
            {"alert": "Cookie No HttpOnly Flag", "risk": "Low", "url": "http://target/", "confidence": "Medium"}
        ]}),
    )
    .await;

    let tmp = tempfile::tempdir().unwrap();
    let mut config = HarnessConfig {
        target: "http://target".into(),
        out_dir: tmp.path().to_string_lossy().into_owned(),
        ingest: false,
        ..Default::default()
    };
    config.scanner.url = Some(server.uri());
    config.scanner.spider_interval_secs = 0;

    let mut suite = Suite::new(config, CancellationToken::new()).unwrap();
    suite.run_scanner().await;
    let (report, _) = suite.finish().await.unwrap();

    assert_eq!(report.scanner_version.as_deref(), Some("2.14.0"));
    assert_eq!(report.scans.len(), 1);
    assert_eq!(report.scans[0].results.len(), 1);
    assert_eq!(report.alerts.total, 2);
    assert_eq!(report.alerts.high, 1);
    assert_eq!(report.alerts.top[0].alert, "SQL Injection");
    assert_eq!(report.summary.total, 0);
}
