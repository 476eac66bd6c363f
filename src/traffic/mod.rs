//! Request descriptions for each behavior profile.
//!
//! Profiles are fixed catalogs. The only randomness is the "organic" user agent
//! picked for load profiles and the search term of normal browsing; neither
//! changes how a response is classified.

pub mod catalog;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::HarnessError;
use crate::utils::truncate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_reqwest(self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum RequestBody {
    Json(Value),
    /// Sent verbatim; used for malformed JSON.
    Raw(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BehaviorProfile {
    Connectivity,
    SuspiciousAgents,
    HeadlessAgents,
    SqlInjection,
    QueryProbes,
    HeaderSpoofing,
    PostVariants,
    RapidFire,
    AdminAccess,
    Session,
    NormalBrowsing,
    BotBehavior,
    Mixed,
    ConcurrentHealth,
}

impl BehaviorProfile {
    pub const ALL: [BehaviorProfile; 14] = [
        BehaviorProfile::Connectivity,
        BehaviorProfile::SuspiciousAgents,
        BehaviorProfile::HeadlessAgents,
        BehaviorProfile::SqlInjection,
        BehaviorProfile::QueryProbes,
        BehaviorProfile::HeaderSpoofing,
        BehaviorProfile::PostVariants,
        BehaviorProfile::RapidFire,
        BehaviorProfile::AdminAccess,
        BehaviorProfile::Session,
        BehaviorProfile::NormalBrowsing,
        BehaviorProfile::BotBehavior,
        BehaviorProfile::Mixed,
        BehaviorProfile::ConcurrentHealth,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BehaviorProfile::Connectivity => "connectivity",
            BehaviorProfile::SuspiciousAgents => "suspicious-agents",
            BehaviorProfile::HeadlessAgents => "headless-agents",
            BehaviorProfile::SqlInjection => "sql-injection",
            BehaviorProfile::QueryProbes => "query-probes",
            BehaviorProfile::HeaderSpoofing => "header-spoofing",
            BehaviorProfile::PostVariants => "post-variants",
            BehaviorProfile::RapidFire => "rapid-fire",
            BehaviorProfile::AdminAccess => "admin-access",
            BehaviorProfile::Session => "session",
            BehaviorProfile::NormalBrowsing => "normal-browsing",
            BehaviorProfile::BotBehavior => "bot-behavior",
            BehaviorProfile::Mixed => "mixed",
            BehaviorProfile::ConcurrentHealth => "concurrent-health",
        }
    }
}

impl fmt::Display for BehaviorProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BehaviorProfile {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        BehaviorProfile::ALL
            .iter()
            .copied()
            .find(|p| p.name() == wanted)
            .ok_or_else(|| HarnessError::UnknownProfile(s.to_string()))
    }
}

/// One request to be dispatched. Built once, then moved into the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSpec {
    pub name: String,
    pub method: HttpMethod,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    pub profile: BehaviorProfile,
}

impl RequestSpec {
    pub fn get(name: impl Into<String>, path: impl Into<String>, profile: BehaviorProfile) -> Self {
        Self::new(name, HttpMethod::Get, path, profile)
    }

    pub fn post(name: impl Into<String>, path: impl Into<String>, profile: BehaviorProfile) -> Self {
        Self::new(name, HttpMethod::Post, path, profile)
    }

    fn new(name: impl Into<String>, method: HttpMethod, path: impl Into<String>, profile: BehaviorProfile) -> Self {
        Self {
            name: name.into(),
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            profile,
        }
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.push((key.to_string(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    pub fn raw(mut self, body: impl Into<String>) -> Self {
        self.body = Some(RequestBody::Raw(body.into()));
        self
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("user-agent"))
            .map(|(_, v)| v.as_str())
    }
}

/// Builds request sequences for named profiles.
#[derive(Debug, Clone)]
pub struct TrafficGenerator {
    /// Login attempts in a rapid-fire burst.
    pub burst_size: usize,
    /// Requests per load profile.
    pub load_requests: usize,
}

impl Default for TrafficGenerator {
    fn default() -> Self {
        Self { burst_size: 15, load_requests: 20 }
    }
}

impl TrafficGenerator {
    pub fn new(burst_size: usize, load_requests: usize) -> Self {
        Self { burst_size, load_requests }
    }

    pub fn generate(&self, profile: BehaviorProfile) -> Vec<RequestSpec> {
        use BehaviorProfile as P;
        match profile {
            P::Connectivity => vec![RequestSpec::get("Basic Health Check", "/health", profile)],
            P::SuspiciousAgents => catalog::SUSPICIOUS_AGENTS
                .iter()
                .map(|ua| {
                    RequestSpec::get(format!("Suspicious User Agent: {}", abbreviate(ua)), "/", profile)
                        .header("User-Agent", *ua)
                })
                .collect(),
            P::HeadlessAgents => catalog::HEADLESS_AGENTS
                .iter()
                .map(|ua| {
                    RequestSpec::get(format!("Headless Browser: {}", abbreviate(ua)), "/api/products", profile)
                        .header("User-Agent", *ua)
                })
                .collect(),
            P::SqlInjection => catalog::SQL_INJECTION_PAYLOADS
                .iter()
                .map(|payload| {
                    RequestSpec::get(format!("SQL Injection: {}", abbreviate(payload)), "/api/products", profile)
                        .query("id", *payload)
                })
                .collect(),
            P::QueryProbes => catalog::QUERY_PROBES
                .iter()
                .map(|(label, param, payload)| {
                    RequestSpec::get(*label, "/api/products", profile).query(param, *payload)
                })
                .collect(),
            P::HeaderSpoofing => catalog::SPOOFED_HEADERS
                .iter()
                .map(|(key, value)| {
                    RequestSpec::get(format!("Header Manipulation: {}: {}", key, abbreviate(value)), "/", profile)
                        .header(key, *value)
                })
                .collect(),
            P::PostVariants => post_variants(),
            P::RapidFire => (1..=self.burst_size)
                .map(|i| {
                    RequestSpec::post(format!("Login Burst {}/{}", i, self.burst_size), "/api/auth/login", profile)
                        .header("User-Agent", catalog::BURST_AGENT)
                        .json(json!({ "emailAddress": catalog::BURST_EMAIL, "passWord": catalog::BURST_PASSWORD }))
                })
                .collect(),
            P::AdminAccess => catalog::ADMIN_PATHS
                .iter()
                .map(|path| RequestSpec::get(format!("Admin Access: {}", path), *path, profile))
                .collect(),
            P::Session => vec![
                RequestSpec::get("Session Establish", "/", profile).header(catalog::TEST_MARKER_HEADER, "true"),
                RequestSpec::get("Session Follow-up", "/health", profile).header(catalog::TEST_MARKER_HEADER, "true"),
            ],
            P::NormalBrowsing => self.organic(profile, catalog::NORMAL_BROWSING_MIX),
            P::BotBehavior => self.organic(profile, catalog::BOT_BEHAVIOR_MIX),
            P::Mixed => self.organic(profile, catalog::MIXED_MIX),
            P::ConcurrentHealth => (0..self.load_requests)
                .map(|i| concurrent_health(0, i))
                .collect(),
        }
    }

    /// Weighted path mix under a single browser identity, cycled to `load_requests`.
    fn organic(&self, profile: BehaviorProfile, mix: &[&str]) -> Vec<RequestSpec> {
        let mut rng = rand::thread_rng();
        let agent = catalog::BROWSER_AGENTS.choose(&mut rng).copied().unwrap_or(catalog::BROWSER_AGENTS[0]);
        mix.iter()
            .cycle()
            .take(self.load_requests)
            .enumerate()
            .map(|(i, path)| {
                let spec = if *path == catalog::SEARCH_MARKER {
                    let term = catalog::SEARCH_TERMS.choose(&mut rng).copied().unwrap_or("laptop");
                    RequestSpec::get(format!("{} #{} search", profile, i + 1), "/api/products", profile)
                        .query("search", term)
                } else {
                    RequestSpec::get(format!("{} #{} {}", profile, i + 1, path), *path, profile)
                };
                spec.header("User-Agent", agent)
            })
            .collect()
    }
}

/// Spec for one pool request, named after its worker slot.
pub fn concurrent_health(worker_id: usize, request_id: usize) -> RequestSpec {
    RequestSpec::get(
        format!("Thread {}, Request {}", worker_id, request_id),
        "/health",
        BehaviorProfile::ConcurrentHealth,
    )
}

fn post_variants() -> Vec<RequestSpec> {
    let profile = BehaviorProfile::PostVariants;
    let path = "/api/bot-protection/test";
    let now = chrono::Utc::now().to_rfc3339();
    vec![
        RequestSpec::post("Normal JSON POST", path, profile)
            .header(catalog::TEST_MARKER_HEADER, "true")
            .json(json!({ "test": "data", "timestamp": now })),
        RequestSpec::post("Large JSON POST", path, profile)
            .header(catalog::TEST_MARKER_HEADER, "true")
            .json(json!({ "test": "x".repeat(1000), "large_field": "y".repeat(5000) })),
        RequestSpec::post("Malformed JSON POST", path, profile)
            .header("Content-Type", "application/json")
            .raw(r#"{"invalid": json}"#),
        RequestSpec::post("Oversized JSON POST", path, profile).json(json!({ "data": "x".repeat(10_000) })),
    ]
}

fn abbreviate(s: &str) -> String {
    truncate(s, 30)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_sizes() {
        let gen = TrafficGenerator::default();
        assert_eq!(gen.generate(BehaviorProfile::SuspiciousAgents).len(), 8);
        assert_eq!(gen.generate(BehaviorProfile::SqlInjection).len(), 9);
        assert_eq!(gen.generate(BehaviorProfile::HeaderSpoofing).len(), 8);
        assert_eq!(gen.generate(BehaviorProfile::RapidFire).len(), 15);
        assert_eq!(gen.generate(BehaviorProfile::NormalBrowsing).len(), 20);
    }

    #[test]
    fn profile_names_round_trip() {
        for p in BehaviorProfile::ALL {
            assert_eq!(p.name().parse::<BehaviorProfile>().unwrap(), p);
        }
        assert_eq!("Rapid_Fire".parse::<BehaviorProfile>().unwrap(), BehaviorProfile::RapidFire);
        assert!("teleport".parse::<BehaviorProfile>().is_err());
    }

    #[test]
    fn burst_uses_one_identity() {
        let specs = TrafficGenerator::new(5, 0).generate(BehaviorProfile::RapidFire);
        let bodies: Vec<_> = specs.iter().map(|s| s.body.clone()).collect();
        assert!(bodies.windows(2).all(|w| w[0] == w[1]));
        assert!(specs.iter().all(|s| s.user_agent() == Some(catalog::BURST_AGENT)));
    }

    #[test]
    fn organic_profile_keeps_one_agent() {
        let specs = TrafficGenerator::default().generate(BehaviorProfile::Mixed);
        let first = specs[0].user_agent().unwrap().to_string();
        assert!(catalog::BROWSER_AGENTS.contains(&first.as_str()));
        assert!(specs.iter().all(|s| s.user_agent() == Some(first.as_str())));
    }

    #[test]
    fn malformed_post_is_raw() {
        let specs = TrafficGenerator::default().generate(BehaviorProfile::PostVariants);
        let malformed = specs.iter().find(|s| s.name == "Malformed JSON POST").unwrap();
        assert!(matches!(malformed.body, Some(RequestBody::Raw(_))));
    }
}
