pub mod config;
pub mod error;
pub mod http_client;
pub mod output;
pub mod probe;
pub mod scan;
pub mod scoring;
pub mod suite;
pub mod traffic;
pub mod utils;

pub use crate::config::HarnessConfig;
pub use crate::error::{HarnessError, IngestError, ScanError};
