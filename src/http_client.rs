use reqwest::cookie::Jar;
use reqwest::{Client, ClientBuilder, Proxy};
use std::sync::Arc;
use std::time::Duration;

/// Default identity for requests whose spec carries no User-Agent.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Settings shared by every client the harness builds.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub timeout: Duration,
    /// Route traffic through this proxy (the scanner's intercepting proxy).
    pub proxy: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(10), proxy: None }
    }
}

fn base_builder(opts: &ClientOptions) -> anyhow::Result<ClientBuilder> {
    let mut builder = ClientBuilder::new()
        .pool_max_idle_per_host(16)
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .tcp_nodelay(true)
        .timeout(opts.timeout)
        .connect_timeout(Duration::from_secs(5))
        .gzip(true)
        .brotli(true)
        .use_rustls_tls()
        // Redirects would hide the blocking status we are classifying.
        .redirect(reqwest::redirect::Policy::none())
        .user_agent(DEFAULT_USER_AGENT)
        // Targets are local test deployments, often with self-signed certs.
        .danger_accept_invalid_certs(true);
    if let Some(proxy) = &opts.proxy {
        builder = builder.proxy(Proxy::all(proxy)?);
    }
    Ok(builder)
}

/// Client with its own cookie jar: one logical browser session.
pub fn create_session_client(opts: &ClientOptions) -> anyhow::Result<Client> {
    Ok(base_builder(opts)?.cookie_store(true).build()?)
}

/// Client bound to a caller-owned jar so several clients can share cookies.
pub fn create_shared_jar_client(opts: &ClientOptions, jar: Arc<Jar>) -> anyhow::Result<Client> {
    Ok(base_builder(opts)?.cookie_provider(jar).build()?)
}

/// Cookie-less client for control-plane calls (scanner API, ingestion).
pub fn create_api_client(timeout: Duration) -> anyhow::Result<Client> {
    Ok(ClientBuilder::new()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(5))
        .use_rustls_tls()
        .danger_accept_invalid_certs(true)
        .build()?)
}
