//! BeaconDB target client
//!
//! This module submits observations to BeaconDB through the Geosubmit v2 JSON
//! API. Every record becomes one report item carrying the device position and
//! a single cell tower or Wi-Fi access point.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::client::{build_http_client, classify_status, classify_transport_error, TargetClient};
use super::outcome::UploadOutcome;
use crate::error::{Error, Result};
use crate::models::{RecordBatch, RecordKind, SurveyHeader, SurveyRecord, UploadTarget};

/// Default Geosubmit endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api.beacondb.net/v2/geosubmit";

/// BeaconDB client configuration (`[beacondb]` section)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeaconDbConfig {
    /// Whether uploads to BeaconDB are enabled
    pub enabled: bool,
    /// Geosubmit endpoint URL
    pub endpoint: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for BeaconDbConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: 60,
        }
    }
}

impl BeaconDbConfig {
    /// Create a configuration posting to the given endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.endpoint)
            .map_err(|e| Error::config(format!("Invalid BeaconDB endpoint: {e}")))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(Error::config("BeaconDB endpoint must be http or https"));
        }

        if self.timeout_secs == 0 {
            return Err(Error::config("BeaconDB timeout must be greater than 0"));
        }

        Ok(())
    }
}

/// Geosubmit request body
#[derive(Debug, Serialize)]
pub struct GeosubmitRequest {
    pub items: Vec<GeosubmitItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeosubmitItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    pub position: Position,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cell_towers: Vec<CellTower>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub wifi_access_points: Vec<WifiAccessPoint>,
}

#[derive(Debug, Serialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: i32,
    pub altitude: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f32>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellTower {
    pub radio_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_country_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_network_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_area_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cell_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_scrambling_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal_strength: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing_advance: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serving: Option<u8>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WifiAccessPoint {
    pub mac_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal_strength: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal_to_noise_ratio: Option<f32>,
}

fn position(header: &SurveyHeader) -> Position {
    Position {
        latitude: header.latitude,
        longitude: header.longitude,
        accuracy: header.accuracy,
        altitude: header.altitude,
        speed: header.speed,
    }
}

fn serving(flag: Option<bool>) -> Option<u8> {
    flag.map(u8::from)
}

fn cell_tower(record: &SurveyRecord) -> Option<CellTower> {
    let tower = match record {
        SurveyRecord::Gsm(r) => CellTower {
            radio_type: "gsm",
            mobile_country_code: r.mcc,
            mobile_network_code: r.mnc,
            location_area_code: r.lac,
            cell_id: r.ci.map(i64::from),
            signal_strength: r.signal_strength,
            timing_advance: r.ta,
            serving: serving(r.serving_cell),
            ..Default::default()
        },
        SurveyRecord::Umts(r) => CellTower {
            radio_type: "wcdma",
            mobile_country_code: r.mcc,
            mobile_network_code: r.mnc,
            location_area_code: r.lac,
            cell_id: r.cid.map(i64::from),
            primary_scrambling_code: r.psc,
            signal_strength: r.rscp,
            serving: serving(r.serving_cell),
            ..Default::default()
        },
        SurveyRecord::Lte(r) => CellTower {
            radio_type: "lte",
            mobile_country_code: r.mcc,
            mobile_network_code: r.mnc,
            location_area_code: r.tac,
            cell_id: r.eci.map(i64::from),
            primary_scrambling_code: r.pci,
            signal_strength: r.rsrp,
            timing_advance: r.ta,
            serving: serving(r.serving_cell),
        },
        SurveyRecord::Nr(r) => CellTower {
            radio_type: "nr",
            mobile_country_code: r.mcc,
            mobile_network_code: r.mnc,
            location_area_code: r.tac,
            cell_id: r.nci,
            primary_scrambling_code: r.pci,
            signal_strength: r.ss_rsrp,
            timing_advance: r.ta,
            serving: serving(r.serving_cell),
        },
        SurveyRecord::Cdma(_) | SurveyRecord::Wifi(_) => return None,
    };
    Some(tower)
}

fn wifi_access_point(record: &SurveyRecord) -> Option<WifiAccessPoint> {
    match record {
        SurveyRecord::Wifi(r) => Some(WifiAccessPoint {
            mac_address: r.bssid.clone(),
            ssid: r.ssid.clone(),
            frequency: r.frequency_mhz,
            channel: r.channel,
            signal_strength: r.signal_strength,
            signal_to_noise_ratio: r.snr,
        }),
        _ => None,
    }
}

/// Build the Geosubmit request for a batch
///
/// Records BeaconDB cannot represent are skipped.
pub fn build_request(batch: &RecordBatch) -> GeosubmitRequest {
    let items = batch
        .iter_records()
        .filter_map(|record| {
            let cell_towers: Vec<_> = cell_tower(record).into_iter().collect();
            let wifi_access_points: Vec<_> = wifi_access_point(record).into_iter().collect();
            if cell_towers.is_empty() && wifi_access_points.is_empty() {
                return None;
            }

            Some(GeosubmitItem {
                timestamp: record.header().captured_at_millis(),
                position: position(record.header()),
                cell_towers,
                wifi_access_points,
            })
        })
        .collect();

    GeosubmitRequest { items }
}

/// BeaconDB upload client
///
/// # Example
///
/// ```rust,ignore
/// use towersync::upload::beacondb::{BeaconDbClient, BeaconDbConfig};
///
/// let client = BeaconDbClient::new(BeaconDbConfig::default().with_timeout(30))?;
/// let outcome = client.send(&batch).await;
/// ```
pub struct BeaconDbClient {
    config: BeaconDbConfig,
    client: Client,
}

impl BeaconDbClient {
    /// Create a new client
    pub fn new(config: BeaconDbConfig) -> Result<Self> {
        config.validate()?;
        let client = build_http_client(Duration::from_secs(config.timeout_secs))?;
        Ok(Self { config, client })
    }

    /// Get the endpoint URL
    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }
}

#[async_trait]
impl TargetClient for BeaconDbClient {
    fn target(&self) -> UploadTarget {
        UploadTarget::BeaconDb
    }

    fn supports(&self, kind: RecordKind) -> bool {
        kind != RecordKind::Cdma
    }

    async fn send(&self, batch: &RecordBatch) -> UploadOutcome {
        let payload = build_request(batch);

        let response = match self
            .client
            .post(&self.config.endpoint)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "BeaconDB request failed");
                return classify_transport_error(&e);
            }
        };

        let status = response.status().as_u16();
        let outcome = classify_status(status);
        tracing::debug!(
            kind = batch.kind.as_str(),
            items = payload.items.len(),
            status,
            outcome = %outcome,
            "BeaconDB response"
        );
        outcome
    }
}
