// Core data structures for survey records and upload targets

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Row identity of a stored record within its kind table
pub type RecordId = i64;

/// Kind of radio observation; each kind lives in its own table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Gsm,
    Cdma,
    Umts,
    Lte,
    Nr,
    Wifi,
}

impl RecordKind {
    /// All kinds, in the order a batch step processes them
    pub const ALL: [RecordKind; 6] = [
        RecordKind::Nr,
        RecordKind::Lte,
        RecordKind::Umts,
        RecordKind::Cdma,
        RecordKind::Gsm,
        RecordKind::Wifi,
    ];

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gsm => "gsm",
            Self::Cdma => "cdma",
            Self::Umts => "umts",
            Self::Lte => "lte",
            Self::Nr => "nr",
            Self::Wifi => "wifi",
        }
    }

    /// Name of the SQLite table holding this kind
    pub fn table_name(&self) -> &'static str {
        match self {
            Self::Gsm => "gsm_survey_records",
            Self::Cdma => "cdma_survey_records",
            Self::Umts => "umts_survey_records",
            Self::Lte => "lte_survey_records",
            Self::Nr => "nr_survey_records",
            Self::Wifi => "wifi_survey_records",
        }
    }

    /// Whether this kind describes a cell tower observation
    pub fn is_cellular(&self) -> bool {
        !matches!(self, Self::Wifi)
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gsm" => Ok(Self::Gsm),
            "cdma" => Ok(Self::Cdma),
            "umts" | "wcdma" => Ok(Self::Umts),
            "lte" => Ok(Self::Lte),
            "nr" | "5g" => Ok(Self::Nr),
            "wifi" | "wi-fi" => Ok(Self::Wifi),
            _ => Err(format!("Unknown record kind: {s}")),
        }
    }
}

/// External registry that records are delivered to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadTarget {
    OpenCelliD,
    BeaconDb,
}

impl UploadTarget {
    /// Every configured target
    pub const ALL: [UploadTarget; 2] = [UploadTarget::OpenCelliD, UploadTarget::BeaconDb];

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenCelliD => "opencellid",
            Self::BeaconDb => "beacondb",
        }
    }

    /// Human-readable registry name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::OpenCelliD => "OpenCelliD",
            Self::BeaconDb => "BeaconDB",
        }
    }

    /// Delivery flag column present on every record table
    pub fn flag_column(&self) -> &'static str {
        match self {
            Self::OpenCelliD => "ocid_uploaded",
            Self::BeaconDb => "beacondb_uploaded",
        }
    }
}

impl fmt::Display for UploadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Per-target delivery flags of one stored record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryFlags {
    pub opencellid: bool,
    pub beacondb: bool,
}

impl DeliveryFlags {
    /// Whether the record has been accepted by the target
    pub fn is_delivered(&self, target: UploadTarget) -> bool {
        match target {
            UploadTarget::OpenCelliD => self.opencellid,
            UploadTarget::BeaconDb => self.beacondb,
        }
    }

    /// Record acceptance by the target. Flags never revert.
    pub fn mark(&mut self, target: UploadTarget) {
        match target {
            UploadTarget::OpenCelliD => self.opencellid = true,
            UploadTarget::BeaconDb => self.beacondb = true,
        }
    }

    /// True once every target has accepted the record
    pub fn all_delivered(&self) -> bool {
        UploadTarget::ALL.iter().all(|t| self.is_delivered(*t))
    }
}

/// Fields shared by every observation kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyHeader {
    pub device_serial_number: String,
    pub device_name: String,
    /// Capture time as RFC 3339 text, as reported by the device
    pub device_time: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f32,
    #[serde(default)]
    pub mission_id: Option<String>,
    #[serde(default)]
    pub record_number: i32,
    pub accuracy: i32,
    #[serde(default)]
    pub speed: Option<f32>,
}

impl SurveyHeader {
    /// Parse the device capture time
    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.device_time)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Capture time in epoch milliseconds, if the device time parses
    pub fn captured_at_millis(&self) -> Option<i64> {
        self.captured_at().map(|dt| dt.timestamp_millis())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GsmRecord {
    #[serde(flatten)]
    pub header: SurveyHeader,
    #[serde(default)]
    pub group_number: i32,
    pub mcc: Option<i32>,
    pub mnc: Option<i32>,
    pub lac: Option<i32>,
    pub ci: Option<i32>,
    pub arfcn: Option<i32>,
    pub bsic: Option<i32>,
    pub signal_strength: Option<f32>,
    pub ta: Option<i32>,
    pub serving_cell: Option<bool>,
    pub provider: Option<String>,
    pub slot: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CdmaRecord {
    #[serde(flatten)]
    pub header: SurveyHeader,
    #[serde(default)]
    pub group_number: i32,
    pub sid: Option<i32>,
    pub nid: Option<i32>,
    pub zone: Option<i32>,
    pub bsid: Option<i32>,
    pub channel: Option<i32>,
    pub pn_offset: Option<i32>,
    pub signal_strength: Option<f32>,
    pub ecio: Option<f32>,
    pub serving_cell: Option<bool>,
    pub provider: Option<String>,
    pub slot: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UmtsRecord {
    #[serde(flatten)]
    pub header: SurveyHeader,
    #[serde(default)]
    pub group_number: i32,
    pub mcc: Option<i32>,
    pub mnc: Option<i32>,
    pub lac: Option<i32>,
    pub cid: Option<i32>,
    pub uarfcn: Option<i32>,
    pub psc: Option<i32>,
    pub rscp: Option<f32>,
    pub signal_strength: Option<f32>,
    pub ecno: Option<f32>,
    pub serving_cell: Option<bool>,
    pub provider: Option<String>,
    pub slot: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LteRecord {
    #[serde(flatten)]
    pub header: SurveyHeader,
    #[serde(default)]
    pub group_number: i32,
    pub mcc: Option<i32>,
    pub mnc: Option<i32>,
    pub tac: Option<i32>,
    pub eci: Option<i32>,
    pub earfcn: Option<i32>,
    pub pci: Option<i32>,
    pub rsrp: Option<f32>,
    pub rsrq: Option<f32>,
    pub ta: Option<i32>,
    pub serving_cell: Option<bool>,
    pub lte_bandwidth: Option<String>,
    pub provider: Option<String>,
    pub signal_strength: Option<f32>,
    pub cqi: Option<i32>,
    pub slot: Option<i32>,
    pub snr: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NrRecord {
    #[serde(flatten)]
    pub header: SurveyHeader,
    #[serde(default)]
    pub group_number: i32,
    pub mcc: Option<i32>,
    pub mnc: Option<i32>,
    pub tac: Option<i32>,
    pub nci: Option<i64>,
    pub narfcn: Option<i32>,
    pub pci: Option<i32>,
    pub ss_rsrp: Option<f32>,
    pub ss_rsrq: Option<f32>,
    pub ss_sinr: Option<f32>,
    pub csi_rsrp: Option<f32>,
    pub csi_rsrq: Option<f32>,
    pub csi_sinr: Option<f32>,
    pub ta: Option<i32>,
    pub serving_cell: Option<bool>,
    pub provider: Option<String>,
    pub slot: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WifiRecord {
    #[serde(flatten)]
    pub header: SurveyHeader,
    pub bssid: String,
    pub ssid: Option<String>,
    pub source_address: Option<String>,
    pub destination_address: Option<String>,
    pub beacon_interval: Option<i32>,
    pub service_set_type: Option<String>,
    pub encryption_type: Option<String>,
    pub channel: Option<i32>,
    pub frequency_mhz: Option<i32>,
    pub signal_strength: Option<f32>,
    pub snr: Option<f32>,
    pub wps: Option<bool>,
    pub passpoint: Option<bool>,
    pub bandwidth: Option<String>,
    pub node_type: Option<String>,
    pub standard: Option<String>,
}

/// One radio observation, immutable once captured
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SurveyRecord {
    Gsm(GsmRecord),
    Cdma(CdmaRecord),
    Umts(UmtsRecord),
    Lte(LteRecord),
    Nr(NrRecord),
    Wifi(WifiRecord),
}

impl SurveyRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Gsm(_) => RecordKind::Gsm,
            Self::Cdma(_) => RecordKind::Cdma,
            Self::Umts(_) => RecordKind::Umts,
            Self::Lte(_) => RecordKind::Lte,
            Self::Nr(_) => RecordKind::Nr,
            Self::Wifi(_) => RecordKind::Wifi,
        }
    }

    pub fn header(&self) -> &SurveyHeader {
        match self {
            Self::Gsm(r) => &r.header,
            Self::Cdma(r) => &r.header,
            Self::Umts(r) => &r.header,
            Self::Lte(r) => &r.header,
            Self::Nr(r) => &r.header,
            Self::Wifi(r) => &r.header,
        }
    }
}

/// A record as persisted: row id, delivery flags and the observation itself
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: RecordId,
    pub flags: DeliveryFlags,
    pub record: SurveyRecord,
}

/// Records of a single kind handed to a target client in one send
#[derive(Debug, Clone)]
pub struct RecordBatch {
    pub kind: RecordKind,
    pub records: Vec<StoredRecord>,
}

impl RecordBatch {
    pub fn new(kind: RecordKind, records: Vec<StoredRecord>) -> Self {
        Self { kind, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Row ids in batch order
    pub fn ids(&self) -> Vec<RecordId> {
        self.records.iter().map(|r| r.id).collect()
    }

    /// Sub-batch of the records the target has not accepted yet
    pub fn pending_for(&self, target: UploadTarget) -> RecordBatch {
        RecordBatch {
            kind: self.kind,
            records: self
                .records
                .iter()
                .filter(|r| !r.flags.is_delivered(target))
                .cloned()
                .collect(),
        }
    }

    /// Iterate over the observations without row metadata
    pub fn iter_records(&self) -> impl Iterator<Item = &SurveyRecord> {
        self.records.iter().map(|r| &r.record)
    }
}
