use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::HarnessError;

pub const ADMIN_KEY_ENV: &str = "BOT_PROBE_ADMIN_KEY";
pub const ZAP_KEY_ENV: &str = "BOT_PROBE_ZAP_API_KEY";

/// How worker tasks share HTTP sessions (and so cookie jars).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SessionMode {
    /// One client per worker, no cookie sharing.
    #[default]
    Isolated,
    /// One client for everyone; reqwest's jar is internally locked.
    Shared,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub target: String,
    pub out_dir: String,
    pub request_timeout_secs: u64,
    pub liveness_timeout_secs: u64,
    /// Pause between user-agent and POST probes.
    pub agent_delay_ms: u64,
    /// Pause between injection and header probes.
    pub probe_delay_ms: u64,
    pub pool_workers: usize,
    pub requests_per_worker: usize,
    pub burst_size: usize,
    pub load_requests: usize,
    pub session_mode: SessionMode,
    pub admin_api_key: Option<String>,
    pub ingest: bool,
    pub scanner: ScannerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Base URL of the ZAP API, e.g. http://127.0.0.1:8080. None disables the scanner phase.
    pub url: Option<String>,
    pub api_key: Option<String>,
    /// Route target traffic through the scanner's proxy.
    pub proxy_target: bool,
    pub session_name: String,
    pub spider_interval_secs: u64,
    pub active_interval_secs: u64,
    pub spider_timeout_secs: Option<u64>,
    pub active_timeout_secs: Option<u64>,
    pub run_active: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            target: "http://localhost:5000".to_string(),
            out_dir: "./results".to_string(),
            request_timeout_secs: 10,
            liveness_timeout_secs: 5,
            agent_delay_ms: 500,
            probe_delay_ms: 300,
            pool_workers: 10,
            requests_per_worker: 5,
            burst_size: 15,
            load_requests: 20,
            session_mode: SessionMode::Isolated,
            admin_api_key: None,
            ingest: true,
            scanner: ScannerConfig::default(),
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            proxy_target: false,
            session_name: "bot_probe".to_string(),
            spider_interval_secs: 2,
            active_interval_secs: 5,
            spider_timeout_secs: Some(600),
            active_timeout_secs: Some(600),
            run_active: false,
        }
    }
}

impl HarnessConfig {
    /// Defaults, overlaid by an optional JSON file, overlaid by environment.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut cfg = match path {
            Some(p) => {
                let data = std::fs::read_to_string(p)?;
                serde_json::from_str(&data)
                    .map_err(|e| HarnessError::Config(format!("{}: {}", p.display(), e)))?
            }
            None => Self::default(),
        };
        cfg.apply_env();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(ADMIN_KEY_ENV) {
            if !key.is_empty() {
                self.admin_api_key = Some(key);
            }
        }
        if let Ok(key) = std::env::var(ZAP_KEY_ENV) {
            if !key.is_empty() {
                self.scanner.api_key = Some(key);
            }
        }
    }

    pub fn validate(&self) -> Result<(), HarnessError> {
        if url::Url::parse(&self.target).is_err() {
            return Err(HarnessError::Config(format!("target '{}' is not a URL", self.target)));
        }
        if self.pool_workers == 0 {
            return Err(HarnessError::Config("pool_workers must be at least 1".into()));
        }
        if let Some(scanner) = &self.scanner.url {
            if url::Url::parse(scanner).is_err() {
                return Err(HarnessError::Config(format!("scanner url '{}' is not a URL", scanner)));
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn agent_delay(&self) -> Duration {
        Duration::from_millis(self.agent_delay_ms)
    }

    pub fn probe_delay(&self) -> Duration {
        Duration::from_millis(self.probe_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: HarnessConfig =
            serde_json::from_str(r#"{"target":"http://10.0.0.5:8000","scanner":{"run_active":true}}"#).unwrap();
        assert_eq!(cfg.target, "http://10.0.0.5:8000");
        assert_eq!(cfg.burst_size, 15);
        assert!(cfg.scanner.run_active);
        assert_eq!(cfg.scanner.spider_interval_secs, 2);
        assert_eq!(cfg.session_mode, SessionMode::Isolated);
    }

    #[test]
    fn rejects_bad_target() {
        let cfg = HarnessConfig { target: "not a url".into(), ..Default::default() };
        assert!(cfg.validate().is_err());
    }
}
