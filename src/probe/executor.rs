use futures::stream::{FuturesUnordered, StreamExt};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use url::Url;

use crate::config::SessionMode;
use crate::http_client::{create_session_client, create_shared_jar_client, ClientOptions};
use crate::traffic::{RequestBody, RequestSpec};
use crate::utils::endpoint_url;

/// Position of a pooled request: which worker sent it, and its index within that worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerTag {
    pub worker_id: usize,
    pub request_id: usize,
}

/// Result of dispatching one RequestSpec. `status` is 0 when no response arrived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub spec: RequestSpec,
    pub status: u16,
    pub latency_secs: f64,
    pub error: Option<String>,
    pub worker: Option<WorkerTag>,
}

impl Outcome {
    pub fn is_transport_failure(&self) -> bool {
        self.status == 0
    }

    fn response(spec: RequestSpec, status: u16, latency: Duration, worker: Option<WorkerTag>) -> Self {
        Self { spec, status, latency_secs: latency.as_secs_f64(), error: None, worker }
    }

    fn transport_failure(spec: RequestSpec, latency: Duration, error: String, worker: Option<WorkerTag>) -> Self {
        Self { spec, status: 0, latency_secs: latency.as_secs_f64(), error: Some(error), worker }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Mode {
    /// One request at a time, pausing `delay` between requests.
    Sequential { delay: Duration },
    /// Contiguous slices of the input run on `workers` parallel tasks.
    Pool { workers: usize },
}

/// Dispatches request specs against one target.
pub struct Executor {
    base: Url,
    opts: ClientOptions,
    session_mode: SessionMode,
    jar: Arc<Jar>,
    session: Client,
    dispatched: Arc<AtomicUsize>,
    transport_failures: Arc<AtomicUsize>,
}

impl Executor {
    pub fn new(target: &str, opts: ClientOptions, session_mode: SessionMode) -> anyhow::Result<Self> {
        let base = Url::parse(target)?;
        let jar = Arc::new(Jar::default());
        let session = create_shared_jar_client(&opts, jar.clone())?;
        Ok(Self {
            base,
            opts,
            session_mode,
            jar,
            session,
            dispatched: Arc::new(AtomicUsize::new(0)),
            transport_failures: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Cookies the control session currently holds for the target.
    pub fn cookie_count(&self) -> usize {
        self.jar
            .cookies(&self.base)
            .and_then(|v| v.to_str().ok().map(|s| s.split(';').filter(|c| !c.trim().is_empty()).count()))
            .unwrap_or(0)
    }

    /// (requests dispatched, transport failures) since construction.
    pub fn get_stats(&self) -> (usize, usize) {
        (
            self.dispatched.load(Ordering::Relaxed),
            self.transport_failures.load(Ordering::Relaxed),
        )
    }

    /// One outcome per spec, returned in input order.
    pub async fn run(&self, specs: Vec<RequestSpec>, mode: Mode) -> Vec<Outcome> {
        match mode {
            Mode::Sequential { delay } => self.run_sequential(specs, delay).await,
            Mode::Pool { workers } => self.run_pooled(specs, workers).await,
        }
    }

    /// `num_threads` workers each sending `requests_per_thread` specs built by `make_spec(worker, request)`.
    pub async fn run_pool<F>(&self, num_threads: usize, requests_per_thread: usize, make_spec: F) -> Vec<Outcome>
    where
        F: Fn(usize, usize) -> RequestSpec,
    {
        let specs = (0..num_threads)
            .flat_map(|t| (0..requests_per_thread).map(move |r| (t, r)))
            .map(|(t, r)| make_spec(t, r))
            .collect();
        self.run_pooled(specs, num_threads).await
    }

    /// Single request on the control session with an optional per-request timeout.
    pub async fn dispatch_one(&self, spec: RequestSpec, timeout: Option<Duration>) -> Outcome {
        dispatch(&self.session, &self.base, spec, None, timeout, &self.dispatched, &self.transport_failures).await
    }

    async fn run_sequential(&self, specs: Vec<RequestSpec>, delay: Duration) -> Vec<Outcome> {
        let mut outcomes = Vec::with_capacity(specs.len());
        for (i, spec) in specs.into_iter().enumerate() {
            if i > 0 && !delay.is_zero() {
                sleep(delay).await;
            }
            let outcome = self.dispatch_one(spec, None).await;
            tracing::debug!(name = %outcome.spec.name, status = outcome.status, latency = outcome.latency_secs, "dispatched");
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn run_pooled(&self, specs: Vec<RequestSpec>, workers: usize) -> Vec<Outcome> {
        let total = specs.len();
        if total == 0 {
            return Vec::new();
        }
        let workers = workers.clamp(1, total);
        let chunk = total.div_ceil(workers);

        let mut slices: Vec<Vec<(usize, RequestSpec)>> = (0..workers).map(|_| Vec::with_capacity(chunk)).collect();
        for (idx, spec) in specs.into_iter().enumerate() {
            slices[idx / chunk].push((idx, spec));
        }

        let mut handles = Vec::with_capacity(workers);
        let mut backups = Vec::with_capacity(workers);
        for (worker_id, slice) in slices.into_iter().enumerate() {
            if slice.is_empty() {
                continue;
            }
            backups.push((worker_id, slice.clone()));
            let client = self.worker_client(worker_id);
            let base = self.base.clone();
            let dispatched = self.dispatched.clone();
            let failures = self.transport_failures.clone();
            handles.push(tokio::spawn(async move {
                let mut done = Vec::with_capacity(slice.len());
                for (request_id, (idx, spec)) in slice.into_iter().enumerate() {
                    let tag = WorkerTag { worker_id, request_id };
                    let outcome = dispatch(&client, &base, spec, Some(tag), None, &dispatched, &failures).await;
                    done.push((idx, outcome));
                }
                done
            }));
        }

        let indexed = join_workers(handles, backups, &self.transport_failures).await;
        debug_assert_eq!(indexed.len(), total);
        indexed.into_iter().map(|(_, o)| o).collect()
    }

    fn worker_client(&self, worker_id: usize) -> Client {
        match self.session_mode {
            SessionMode::Shared => self.session.clone(),
            SessionMode::Isolated => match create_session_client(&self.opts) {
                Ok(client) => client,
                Err(e) => {
                    tracing::warn!(worker_id, error = %e, "falling back to shared session");
                    self.session.clone()
                }
            },
        }
    }
}

type Slice = Vec<(usize, RequestSpec)>;

/// Collect every worker's outcomes, sorted by input index. A worker that
/// panicked yields one status-0 outcome per spec of its slice.
async fn join_workers(
    handles: Vec<JoinHandle<Vec<(usize, Outcome)>>>,
    backups: Vec<(usize, Slice)>,
    failures: &AtomicUsize,
) -> Vec<(usize, Outcome)> {
    let mut futures: FuturesUnordered<_> = handles
        .into_iter()
        .zip(backups)
        .map(|(handle, (worker_id, slice))| async move { (worker_id, slice, handle.await) })
        .collect();

    let mut indexed = Vec::new();
    while let Some((worker_id, slice, joined)) = futures.next().await {
        match joined {
            Ok(done) => indexed.extend(done),
            Err(e) => {
                tracing::error!(worker_id, error = %e, lost = slice.len(), "worker task failed");
                failures.fetch_add(slice.len(), Ordering::Relaxed);
                let message = format!("worker task failed: {}", e);
                indexed.extend(slice.into_iter().enumerate().map(|(request_id, (idx, spec))| {
                    let tag = WorkerTag { worker_id, request_id };
                    (idx, Outcome::transport_failure(spec, Duration::ZERO, message.clone(), Some(tag)))
                }));
            }
        }
    }
    indexed.sort_by_key(|(idx, _)| *idx);
    indexed
}

async fn dispatch(
    client: &Client,
    base: &Url,
    spec: RequestSpec,
    worker: Option<WorkerTag>,
    timeout: Option<Duration>,
    dispatched: &AtomicUsize,
    failures: &AtomicUsize,
) -> Outcome {
    dispatched.fetch_add(1, Ordering::Relaxed);
    let start = Instant::now();

    let url = endpoint_url(base, &spec.path);
    let mut req = client.request(spec.method.as_reqwest(), url);
    if !spec.query.is_empty() {
        req = req.query(&spec.query);
    }
    for (key, value) in &spec.headers {
        req = req.header(key.as_str(), value.as_str());
    }
    match &spec.body {
        Some(RequestBody::Json(v)) => req = req.json(v),
        Some(RequestBody::Raw(s)) => req = req.body(s.clone()),
        None => {}
    }
    if let Some(t) = timeout {
        req = req.timeout(t);
    }

    match req.send().await {
        Ok(resp) => {
            let status = resp.status().as_u16();
            // Drain the body so latency covers the full response.
            if let Err(e) = resp.bytes().await {
                tracing::debug!(name = %spec.name, error = %e, "body read failed");
            }
            Outcome::response(spec, status, start.elapsed(), worker)
        }
        Err(e) => {
            failures.fetch_add(1, Ordering::Relaxed);
            let message = describe_error(&e);
            tracing::debug!(name = %spec.name, error = %message, "transport failure");
            Outcome::transport_failure(spec, start.elapsed(), message, worker)
        }
    }
}

/// Error text including every source in the chain.
fn describe_error(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
