//! OpenCelliD target client
//!
//! Uploads cellular measurements as a CSV file through the multipart
//! `uploadCsv` endpoint. Wi-Fi records are not accepted by OpenCelliD.

use async_trait::async_trait;
use regex::Regex;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;

use super::client::{build_http_client, classify_status, classify_transport_error, TargetClient};
use super::outcome::UploadOutcome;
use crate::error::{Error, Result};
use crate::models::{RecordBatch, RecordKind, SurveyRecord, UploadTarget};

/// Default measurement upload endpoint
pub const DEFAULT_ENDPOINT: &str = "https://opencellid.org/measure/uploadCsv";

/// Application identifier sent with every upload
pub const APP_ID: &str = concat!("towersync ", env!("CARGO_PKG_VERSION"));

const CSV_CONTENT_TYPE: &str = "text/csv; charset=UTF-8";

/// OpenCelliD client configuration (`[opencellid]` section)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenCelliDConfig {
    /// Whether uploads to OpenCelliD are enabled; off until a key is set
    pub enabled: bool,
    /// Upload endpoint URL
    pub endpoint: String,
    /// Personal API key
    pub api_key: Option<String>,
    /// Upload with the shared anonymous key instead of the personal key
    pub anonymous: bool,
    /// Shared key used in anonymous mode
    pub anonymous_key: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OpenCelliDConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            anonymous: false,
            anonymous_key: None,
            timeout_secs: 60,
        }
    }
}

impl OpenCelliDConfig {
    /// Create a configuration posting to the given endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Enable uploads with the personal API key
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.enabled = true;
        self.api_key = Some(key.into());
        self
    }

    /// Enable anonymous uploads with the given shared key
    pub fn with_anonymous_key(mut self, key: impl Into<String>) -> Self {
        self.enabled = true;
        self.anonymous = true;
        self.anonymous_key = Some(key.into());
        self
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// The key sent in the `key` form field
    pub fn effective_key(&self) -> Option<&str> {
        if self.anonymous {
            self.anonymous_key.as_deref()
        } else {
            self.api_key.as_deref()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.endpoint)
            .map_err(|e| Error::config(format!("Invalid OpenCelliD endpoint: {e}")))?;

        if self.timeout_secs == 0 {
            return Err(Error::config("OpenCelliD timeout must be greater than 0"));
        }

        if !self.enabled {
            return Ok(());
        }

        match self.effective_key() {
            None if self.anonymous => Err(Error::config(
                "Anonymous OpenCelliD upload requires an anonymous_key",
            )),
            None => Err(Error::config("OpenCelliD upload requires an api_key")),
            Some(_) if self.anonymous => Ok(()),
            Some(key) if is_valid_api_key(key) => Ok(()),
            Some(_) => Err(Error::config("OpenCelliD api_key is not a valid key")),
        }
    }
}

/// Check the shape of an OpenCelliD API key
///
/// Keys are either a lowercase UUID or `pk.` followed by 32 hex digits.
pub fn is_valid_api_key(key: &str) -> bool {
    static KEY_RE: OnceLock<Regex> = OnceLock::new();

    let re = KEY_RE.get_or_init(|| {
        Regex::new(
            r"^(?:[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}|pk\.[0-9a-f]{32})$",
        )
        .expect("Invalid regex pattern")
    });

    re.is_match(key)
}

/// One line of the uploaded CSV; field names are the CSV header
#[derive(Debug, Default, Serialize)]
struct MeasurementRow {
    mcc: Option<i32>,
    mnc: Option<i32>,
    lac: Option<i32>,
    cellid: Option<i64>,
    lon: f64,
    lat: f64,
    signal: Option<f32>,
    measured_at: Option<i64>,
    rating: i32,
    speed: Option<f32>,
    direction: Option<f32>,
    act: &'static str,
    ta: Option<i32>,
    psc: Option<i32>,
    tac: Option<i32>,
    pci: Option<i32>,
    sid: Option<i32>,
    nid: Option<i32>,
    bid: Option<i32>,
}

impl MeasurementRow {
    fn from_record(record: &SurveyRecord) -> Option<Self> {
        let header = record.header();
        let base = Self {
            lon: header.longitude,
            lat: header.latitude,
            measured_at: header.captured_at_millis(),
            rating: header.accuracy,
            speed: header.speed,
            ..Default::default()
        };

        let row = match record {
            SurveyRecord::Gsm(r) => Self {
                mcc: r.mcc,
                mnc: r.mnc,
                lac: r.lac,
                cellid: r.ci.map(i64::from),
                signal: r.signal_strength,
                act: "GSM",
                ta: r.ta,
                ..base
            },
            SurveyRecord::Umts(r) => Self {
                mcc: r.mcc,
                mnc: r.mnc,
                lac: r.lac,
                cellid: r.cid.map(i64::from),
                signal: r.rscp.or(r.signal_strength),
                act: "UMTS",
                psc: r.psc,
                ..base
            },
            SurveyRecord::Lte(r) => Self {
                mcc: r.mcc,
                mnc: r.mnc,
                lac: r.tac,
                cellid: r.eci.map(i64::from),
                signal: r.rsrp,
                act: "LTE",
                ta: r.ta,
                tac: r.tac,
                pci: r.pci,
                ..base
            },
            SurveyRecord::Nr(r) => Self {
                mcc: r.mcc,
                mnc: r.mnc,
                lac: r.tac,
                cellid: r.nci,
                signal: r.ss_rsrp,
                act: "NR",
                ta: r.ta,
                tac: r.tac,
                pci: r.pci,
                ..base
            },
            SurveyRecord::Cdma(r) => Self {
                mnc: r.sid,
                lac: r.nid,
                cellid: r.bsid.map(i64::from),
                signal: r.signal_strength,
                act: "CDMA",
                sid: r.sid,
                nid: r.nid,
                bid: r.bsid,
                ..base
            },
            SurveyRecord::Wifi(_) => return None,
        };

        Some(row)
    }
}

/// Encode a batch as the OpenCelliD measurement CSV
///
/// Records OpenCelliD cannot represent are skipped.
pub fn encode_csv(batch: &RecordBatch) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut rows = batch.iter_records().filter_map(MeasurementRow::from_record).peekable();
    if rows.peek().is_none() {
        writer.write_record(CSV_HEADER)?;
    }
    for row in rows {
        writer.serialize(row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| Error::with_source("Failed to flush CSV buffer", e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| Error::with_source("CSV output is not UTF-8", e))
}

const CSV_HEADER: [&str; 19] = [
    "mcc",
    "mnc",
    "lac",
    "cellid",
    "lon",
    "lat",
    "signal",
    "measured_at",
    "rating",
    "speed",
    "direction",
    "act",
    "ta",
    "psc",
    "tac",
    "pci",
    "sid",
    "nid",
    "bid",
];

/// Interpret the body of an HTTP 200 response
///
/// OpenCelliD reports some rejections with a 200 status and an error text.
fn classify_body(body: &str) -> UploadOutcome {
    let trimmed = body.trim_start();
    let lower = trimmed.to_lowercase();

    if lower.contains("invalid api key") || lower.contains("invalid token") {
        UploadOutcome::InvalidCredential
    } else if trimmed.starts_with("Err") {
        UploadOutcome::InvalidData
    } else {
        UploadOutcome::Success
    }
}

/// OpenCelliD upload client
///
/// # Example
///
/// ```rust,ignore
/// use towersync::upload::opencellid::{OpenCelliDClient, OpenCelliDConfig};
///
/// let config = OpenCelliDConfig::default().with_api_key("pk.0123456789abcdef0123456789abcdef");
/// let client = OpenCelliDClient::new(config)?;
/// let outcome = client.send(&batch).await;
/// ```
pub struct OpenCelliDClient {
    config: OpenCelliDConfig,
    client: Client,
}

impl OpenCelliDClient {
    /// Create a new client
    pub fn new(config: OpenCelliDConfig) -> Result<Self> {
        config.validate()?;
        let client = build_http_client(Duration::from_secs(config.timeout_secs))?;
        Ok(Self { config, client })
    }

    /// Get the endpoint URL
    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    fn build_form(&self, csv: String) -> Result<Form> {
        let file_name = format!(
            "towersync_measurements_{}.csv",
            chrono::Utc::now().timestamp_millis()
        );
        let file = Part::text(csv)
            .file_name(file_name)
            .mime_str(CSV_CONTENT_TYPE)?;

        Ok(Form::new()
            .text("key", self.config.effective_key().unwrap_or_default().to_string())
            .text("appId", APP_ID)
            .part("datafile", file))
    }
}

#[async_trait]
impl TargetClient for OpenCelliDClient {
    fn target(&self) -> UploadTarget {
        UploadTarget::OpenCelliD
    }

    fn supports(&self, kind: RecordKind) -> bool {
        kind.is_cellular()
    }

    async fn send(&self, batch: &RecordBatch) -> UploadOutcome {
        let form = match encode_csv(batch).and_then(|csv| self.build_form(csv)) {
            Ok(form) => form,
            Err(e) => {
                tracing::error!(kind = batch.kind.as_str(), error = %e, "Failed to encode OpenCelliD upload");
                return UploadOutcome::Failure;
            }
        };

        let response = match self
            .client
            .post(&self.config.endpoint)
            .multipart(form)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "OpenCelliD request failed");
                return classify_transport_error(&e);
            }
        };

        let status = response.status();
        let outcome = classify_status(status.as_u16());
        if !outcome.is_success() {
            tracing::warn!(status = status.as_u16(), outcome = %outcome, "OpenCelliD rejected upload");
            return outcome;
        }

        match response.text().await {
            Ok(body) => {
                let outcome = classify_body(&body);
                tracing::debug!(
                    kind = batch.kind.as_str(),
                    records = batch.len(),
                    outcome = %outcome,
                    response = %body.trim(),
                    "OpenCelliD response"
                );
                outcome
            }
            Err(e) => classify_transport_error(&e),
        }
    }
}
