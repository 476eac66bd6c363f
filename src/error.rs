use thiserror::Error;

/// Conditions that abort the whole run.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("target {url} is not reachable: {reason}")]
    TargetUnreachable { url: String, reason: String },

    #[error("unknown behavior profile '{0}'")]
    UnknownProfile(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Failures talking to the remote scanner.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("scan launch failed: {0}")]
    Launch(String),

    #[error("scanner returned HTTP {status} for {endpoint}")]
    Status { endpoint: String, status: u16 },

    #[error("scanner response for {endpoint} is missing field '{field}'")]
    MissingField { endpoint: String, field: &'static str },

    #[error("scan {scan_id} is {state}, not completed")]
    NotCompleted { scan_id: String, state: &'static str },

    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

/// Failures submitting verdict records to the ingestion endpoint.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("no admin API key configured")]
    MissingKey,

    #[error("ingestion rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}
