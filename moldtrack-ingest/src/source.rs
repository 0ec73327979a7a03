//! Dataset payload loading
//!
//! The dataset arrives as one JSON object or an array of objects, from a
//! local path, a `file://` URI, or an HTTP(S) URL. Remote fetches try a
//! browser-profile request first (the dataset host rejects bare clients),
//! then fall back to a plain request before giving up.

use moldtrack_common::{Error, Result};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Compiled default dataset location; overridden by `DATASET_URL` or the
/// `--url` CLI flag
pub const DEFAULT_DATASET_URL: &str = "https://datasets.moldtrack.io/line/dataset.json";

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolve the dataset source: CLI flag > `DATASET_URL` env > default
pub fn resolve_source(cli_url: Option<&str>) -> String {
    if let Some(url) = cli_url {
        return url.to_string();
    }
    std::env::var("DATASET_URL").unwrap_or_else(|_| DEFAULT_DATASET_URL.to_string())
}

/// Load the JSON payload from a path, `file://` URI, or HTTP(S) URL
pub async fn load_payload(source: &str) -> Result<Value> {
    if let Some(path) = source.strip_prefix("file://") {
        return read_file(Path::new(path));
    }
    if Path::new(source).is_file() {
        return read_file(Path::new(source));
    }
    fetch_http(source).await
}

/// Split the payload into individual records: an array yields its
/// elements, a single object yields itself.
pub fn extract_records(payload: Value) -> Result<Vec<Value>> {
    match payload {
        Value::Array(records) => Ok(records),
        Value::Object(_) => Ok(vec![payload]),
        other => Err(Error::Normalization(format!(
            "unsupported payload type: {}",
            type_name(&other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn read_file(path: &Path) -> Result<Value> {
    info!("Reading dataset from {}", path.display());
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| Error::Normalization(format!("dataset is not valid JSON: {}", e)))
}

async fn fetch_http(url: &str) -> Result<Value> {
    info!("Fetching dataset from {}", url);

    let first = fetch_with_browser_profile(url).await;
    let first_err = match first {
        Ok(payload) => return Ok(payload),
        Err(err) => err,
    };
    warn!("Primary fetch failed ({}), retrying with plain client", first_err);

    match fetch_plain(url).await {
        Ok(payload) => Ok(payload),
        Err(second_err) => Err(Error::Fetch(format!(
            "{}: {}; fallback: {}",
            url, first_err, second_err
        ))),
    }
}

async fn fetch_with_browser_profile(url: &str) -> std::result::Result<Value, reqwest::Error> {
    let client = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
    client
        .get(url)
        .header(
            reqwest::header::USER_AGENT,
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64)",
        )
        .header(reqwest::header::ACCEPT, "application/json, text/plain, */*")
        .header(reqwest::header::REFERER, "/")
        .send()
        .await?
        .error_for_status()?
        .json()
        .await
}

async fn fetch_plain(url: &str) -> std::result::Result<Value, reqwest::Error> {
    let client = reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .user_agent(concat!("moldtrack-ingest/", env!("CARGO_PKG_VERSION")))
        .build()?;
    client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await
}
