use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ScanKind;
use crate::error::ScanError;

/// One alert raised by the scanner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(default)]
    pub alert: String,
    #[serde(default)]
    pub risk: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub confidence: String,
}

/// Remote scanner operations the harness relies on.
#[async_trait]
pub trait ScannerApi: Send + Sync {
    async fn version(&self) -> Result<String, ScanError>;
    async fn new_session(&self, name: &str) -> Result<(), ScanError>;
    /// Starts a scan and returns its id.
    async fn start_scan(&self, kind: ScanKind, target: &str) -> Result<String, ScanError>;
    /// Progress in percent, 0 to 100.
    async fn scan_status(&self, kind: ScanKind, scan_id: &str) -> Result<u8, ScanError>;
    async fn spider_results(&self, scan_id: &str) -> Result<Vec<String>, ScanError>;
    async fn alerts(&self, base_url: &str) -> Result<Vec<Alert>, ScanError>;
}

/// OWASP ZAP JSON API client.
pub struct ZapClient {
    client: Client,
    base: String,
    api_key: Option<String>,
}

impl ZapClient {
    pub fn new(client: Client, base: &str, api_key: Option<String>) -> Self {
        Self { client, base: base.trim_end_matches('/').to_string(), api_key }
    }

    /// Base URL of the scanner, which doubles as its intercepting proxy.
    pub fn base(&self) -> &str {
        &self.base
    }

    async fn call(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Value, ScanError> {
        let url = format!("{}/JSON/{}/", self.base, endpoint);
        let mut query: Vec<(&str, &str)> = params.to_vec();
        if let Some(key) = &self.api_key {
            query.push(("apikey", key.as_str()));
        }
        let resp = self.client.get(&url).query(&query).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ScanError::Status { endpoint: endpoint.to_string(), status: status.as_u16() });
        }
        Ok(resp.json::<Value>().await?)
    }
}

/// ZAP encodes most scalars as strings; accept either form.
fn field_as_string(v: &Value, endpoint: &str, field: &'static str) -> Result<String, ScanError> {
    match v.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(ScanError::MissingField { endpoint: endpoint.to_string(), field }),
    }
}

#[async_trait]
impl ScannerApi for ZapClient {
    async fn version(&self) -> Result<String, ScanError> {
        let endpoint = "core/view/version";
        let v = self.call(endpoint, &[]).await?;
        field_as_string(&v, endpoint, "version")
    }

    async fn new_session(&self, name: &str) -> Result<(), ScanError> {
        self.call("core/action/newSession", &[("name", name), ("overwrite", "true")]).await?;
        Ok(())
    }

    async fn start_scan(&self, kind: ScanKind, target: &str) -> Result<String, ScanError> {
        let endpoint = format!("{}/action/scan", kind.api_prefix());
        let v = self.call(&endpoint, &[("url", target), ("recurse", "true")]).await?;
        field_as_string(&v, &endpoint, "scan")
    }

    async fn scan_status(&self, kind: ScanKind, scan_id: &str) -> Result<u8, ScanError> {
        let endpoint = format!("{}/view/status", kind.api_prefix());
        let v = self.call(&endpoint, &[("scanId", scan_id)]).await?;
        let raw = field_as_string(&v, &endpoint, "status")?;
        raw.trim()
            .parse::<u8>()
            .map(|p| p.min(100))
            .map_err(|_| ScanError::MissingField { endpoint, field: "status" })
    }

    async fn spider_results(&self, scan_id: &str) -> Result<Vec<String>, ScanError> {
        let endpoint = "spider/view/results";
        let v = self.call(endpoint, &[("scanId", scan_id)]).await?;
        let results = v
            .get("results")
            .and_then(Value::as_array)
            .ok_or_else(|| ScanError::MissingField { endpoint: endpoint.to_string(), field: "results" })?;
        Ok(results.iter().filter_map(|u| u.as_str().map(str::to_string)).collect())
    }

    async fn alerts(&self, base_url: &str) -> Result<Vec<Alert>, ScanError> {
        let endpoint = "core/view/alerts";
        let mut v = self.call(endpoint, &[("baseurl", base_url)]).await?;
        let alerts = v
            .get_mut("alerts")
            .map(Value::take)
            .ok_or_else(|| ScanError::MissingField { endpoint: endpoint.to_string(), field: "alerts" })?;
        serde_json::from_value(alerts)
            .map_err(|_| ScanError::MissingField { endpoint: endpoint.to_string(), field: "alerts" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_string_or_number_fields() {
        assert_eq!(field_as_string(&json!({"scan": "3"}), "x", "scan").unwrap(), "3");
        assert_eq!(field_as_string(&json!({"scan": 3}), "x", "scan").unwrap(), "3");
        assert!(field_as_string(&json!({"status": "1"}), "x", "scan").is_err());
    }
}
