use reqwest::Client;
use url::Url;

use crate::error::IngestError;
use crate::output::report::VerdictRecord;
use crate::utils::endpoint_url;

pub const INGEST_PATH: &str = "/api/admin/bot-metrics/ingest";
pub const ADMIN_KEY_HEADER: &str = "X-Admin-API-Key";

/// POST verdict records to the target's ingestion endpoint.
///
/// The endpoint authenticates with a single static shared key. That key is
/// read from configuration only and never logged.
pub async fn submit(client: &Client, target: &Url, api_key: Option<&str>, records: &[VerdictRecord]) -> Result<(), IngestError> {
    let key = api_key.filter(|k| !k.is_empty()).ok_or(IngestError::MissingKey)?;
    let url = endpoint_url(target, INGEST_PATH);

    let resp = client
        .post(url)
        .header(ADMIN_KEY_HEADER, key)
        .json(records)
        .send()
        .await?;

    let status = resp.status();
    if status != reqwest::StatusCode::OK {
        let body = resp.text().await.unwrap_or_default();
        return Err(IngestError::Rejected { status: status.as_u16(), body });
    }
    tracing::info!(records = records.len(), "verdict records ingested");
    Ok(())
}
