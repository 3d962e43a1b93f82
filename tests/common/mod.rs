//! Common test utilities

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use towersync::error::Result;
use towersync::models::{
    CdmaRecord, GsmRecord, LteRecord, NrRecord, RecordBatch, RecordId, RecordKind, StoredRecord,
    SurveyHeader, SurveyRecord, UploadTarget, WifiRecord,
};
use towersync::storage::{PendingSummary, RecordStore, TargetSelector};
use towersync::upload::{TargetClient, UploadOutcome};

/// Create a survey header with default values
pub fn create_header(n: i32) -> SurveyHeader {
    SurveyHeader {
        device_serial_number: "test-device".to_string(),
        device_name: "Test Phone".to_string(),
        device_time: "2024-05-01T12:00:00Z".to_string(),
        latitude: 39.7392,
        longitude: -104.9903,
        altitude: 1609.0,
        mission_id: Some("mission-1".to_string()),
        record_number: n,
        accuracy: 8,
        speed: Some(2.5),
    }
}

pub fn create_gsm(n: i32) -> SurveyRecord {
    SurveyRecord::Gsm(GsmRecord {
        header: create_header(n),
        group_number: n,
        mcc: Some(310),
        mnc: Some(260),
        lac: Some(10),
        ci: Some(1000 + n),
        arfcn: None,
        bsic: None,
        signal_strength: Some(-75.0),
        ta: None,
        serving_cell: Some(true),
        provider: None,
        slot: None,
    })
}

pub fn create_lte(n: i32) -> SurveyRecord {
    SurveyRecord::Lte(LteRecord {
        header: create_header(n),
        group_number: n,
        mcc: Some(310),
        mnc: Some(410),
        tac: Some(20),
        eci: Some(200_000 + n),
        earfcn: Some(850),
        pci: Some(12),
        rsrp: Some(-101.0),
        rsrq: Some(-9.0),
        ta: Some(1),
        serving_cell: Some(true),
        lte_bandwidth: None,
        provider: None,
        signal_strength: None,
        cqi: None,
        slot: None,
        snr: None,
    })
}

pub fn create_nr(n: i32) -> SurveyRecord {
    SurveyRecord::Nr(NrRecord {
        header: create_header(n),
        group_number: n,
        mcc: Some(310),
        mnc: Some(260),
        tac: Some(30),
        nci: Some(68_719_476_735 - i64::from(n)),
        narfcn: Some(520_110),
        pci: Some(400),
        ss_rsrp: Some(-88.0),
        ss_rsrq: None,
        ss_sinr: None,
        csi_rsrp: None,
        csi_rsrq: None,
        csi_sinr: None,
        ta: None,
        serving_cell: Some(false),
        provider: None,
        slot: None,
    })
}

pub fn create_cdma(n: i32) -> SurveyRecord {
    SurveyRecord::Cdma(CdmaRecord {
        header: create_header(n),
        group_number: n,
        sid: Some(4139),
        nid: Some(1),
        zone: None,
        bsid: Some(300 + n),
        channel: None,
        pn_offset: None,
        signal_strength: Some(-90.0),
        ecio: None,
        serving_cell: Some(true),
        provider: None,
        slot: None,
    })
}

pub fn create_wifi(n: i32) -> SurveyRecord {
    SurveyRecord::Wifi(WifiRecord {
        header: create_header(n),
        bssid: format!("02:00:00:00:00:{:02x}", n % 256),
        ssid: Some("test-net".to_string()),
        source_address: None,
        destination_address: None,
        beacon_interval: None,
        service_set_type: None,
        encryption_type: None,
        channel: Some(36),
        frequency_mhz: Some(5180),
        signal_strength: Some(-55.0),
        snr: None,
        wps: None,
        passpoint: None,
        bandwidth: None,
        node_type: None,
        standard: None,
    })
}

/// Batch of stored records with sequential ids and no flags set
pub fn create_batch(kind: RecordKind, records: Vec<SurveyRecord>) -> RecordBatch {
    RecordBatch::new(
        kind,
        records
            .into_iter()
            .enumerate()
            .map(|(i, record)| StoredRecord {
                id: i as RecordId + 1,
                flags: Default::default(),
                record,
            })
            .collect(),
    )
}

/// Target client that records what it is sent and replies with scripted outcomes
pub struct RecordingClient {
    target: UploadTarget,
    outcomes: Mutex<VecDeque<UploadOutcome>>,
    fallback: UploadOutcome,
    delay: Option<Duration>,
    sent: Mutex<Vec<(RecordKind, Vec<RecordId>)>>,
}

impl RecordingClient {
    /// Client that always answers with `outcome`
    pub fn new(target: UploadTarget, outcome: UploadOutcome) -> Arc<Self> {
        Self::scripted(target, Vec::new(), outcome)
    }

    /// Client that answers with `outcomes` in order, then `fallback`
    pub fn scripted(
        target: UploadTarget,
        outcomes: Vec<UploadOutcome>,
        fallback: UploadOutcome,
    ) -> Arc<Self> {
        Arc::new(Self {
            target,
            outcomes: Mutex::new(outcomes.into()),
            fallback,
            delay: None,
            sent: Mutex::new(Vec::new()),
        })
    }

    /// Client that sleeps before answering
    pub fn slow(target: UploadTarget, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            target,
            outcomes: Mutex::new(VecDeque::new()),
            fallback: UploadOutcome::Success,
            delay: Some(delay),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Ids of every record this client was sent, in send order
    pub fn sent_ids(&self) -> Vec<RecordId> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect()
    }

    pub fn sent_kinds(&self) -> Vec<RecordKind> {
        self.sent.lock().unwrap().iter().map(|(k, _)| *k).collect()
    }
}

#[async_trait]
impl TargetClient for RecordingClient {
    fn target(&self) -> UploadTarget {
        self.target
    }

    fn supports(&self, kind: RecordKind) -> bool {
        match self.target {
            UploadTarget::OpenCelliD => kind.is_cellular(),
            UploadTarget::BeaconDb => kind != RecordKind::Cdma,
        }
    }

    async fn send(&self, batch: &RecordBatch) -> UploadOutcome {
        self.sent.lock().unwrap().push((batch.kind, batch.ids()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback)
    }
}

/// Store wrapper counting fetches per kind and the size of each fetch
pub struct CountingStore<S> {
    inner: S,
    fetches: Mutex<Vec<(RecordKind, usize)>>,
    pub mark_calls: AtomicUsize,
}

impl<S: RecordStore> CountingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fetches: Mutex::new(Vec::new()),
            mark_calls: AtomicUsize::new(0),
        }
    }

    /// Sizes of every non-empty fetch of `kind`, in order
    pub fn fetch_sizes(&self, kind: RecordKind) -> Vec<usize> {
        self.fetches
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, n)| *k == kind && *n > 0)
            .map(|(_, n)| *n)
            .collect()
    }
}

impl<S: RecordStore> RecordStore for CountingStore<S> {
    fn count_pending(&self, selector: TargetSelector) -> Result<usize> {
        self.inner.count_pending(selector)
    }

    fn fetch_pending(
        &self,
        kind: RecordKind,
        selector: TargetSelector,
        limit: usize,
    ) -> Result<Vec<StoredRecord>> {
        let records = self.inner.fetch_pending(kind, selector, limit)?;
        self.fetches.lock().unwrap().push((kind, records.len()));
        Ok(records)
    }

    fn mark_delivered(&self, target: UploadTarget, kind: RecordKind, ids: &[RecordId]) -> Result<()> {
        self.mark_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.mark_delivered(target, kind, ids)
    }

    fn insert(&self, records: &[SurveyRecord]) -> Result<Vec<RecordId>> {
        self.inner.insert(records)
    }

    fn pending_summary(&self) -> Result<PendingSummary> {
        self.inner.pending_summary()
    }

    fn purge_delivered(&self) -> Result<usize> {
        self.inner.purge_delivered()
    }
}
