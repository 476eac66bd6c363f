//! Remote scan orchestration (spider and active scans) over the ZAP JSON API.

pub mod coordinator;
pub mod zap;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub use coordinator::{ScanCoordinator, ScanHandle, ScanPolicy, ScanRecord, ScanStatus};
pub use zap::{Alert, ScannerApi, ZapClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanKind {
    Spider,
    Active,
}

impl ScanKind {
    pub fn api_prefix(self) -> &'static str {
        match self {
            ScanKind::Spider => "spider",
            ScanKind::Active => "ascan",
        }
    }

    pub fn default_interval(self) -> Duration {
        match self {
            ScanKind::Spider => Duration::from_secs(2),
            ScanKind::Active => Duration::from_secs(5),
        }
    }
}

impl fmt::Display for ScanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanKind::Spider => f.write_str("spider"),
            ScanKind::Active => f.write_str("active"),
        }
    }
}
