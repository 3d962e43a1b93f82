//! Upload coordinator scenarios against an in-memory record store

mod common;

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use common::{
    create_cdma, create_gsm, create_lte, create_nr, create_wifi, CountingStore, RecordingClient,
};
use towersync::error::{Error, ErrorCategory, Result};
use towersync::models::{RecordId, RecordKind, StoredRecord, SurveyRecord, UploadTarget};
use towersync::storage::{PendingSummary, RecordStore, SqliteRecordStore, TargetSelector};
use towersync::upload::{
    ChannelProgress, Disposition, FnProgress, UploadConfig, UploadCoordinator, UploadOutcome,
};

fn seeded_store(records: Vec<SurveyRecord>) -> Arc<SqliteRecordStore> {
    let store = Arc::new(SqliteRecordStore::in_memory().unwrap());
    store.insert(&records).unwrap();
    store
}

fn pending(store: &dyn RecordStore, target: UploadTarget) -> usize {
    store.count_pending(TargetSelector::Target(target)).unwrap()
}

#[tokio::test]
async fn test_empty_backlog_makes_no_calls() {
    let store = seeded_store(Vec::new());
    let ocid = RecordingClient::new(UploadTarget::OpenCelliD, UploadOutcome::Success);
    let beacon = RecordingClient::new(UploadTarget::BeaconDb, UploadOutcome::Success);
    let (progress, mut rx) = ChannelProgress::channel();

    let coordinator = UploadCoordinator::new(store)
        .with_client(ocid.clone())
        .with_client(beacon.clone())
        .with_progress(Arc::new(progress));

    let report = coordinator
        .run(&UploadConfig::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.disposition, Disposition::Succeeded);
    assert_eq!(report.results.get(UploadTarget::OpenCelliD), UploadOutcome::NoData);
    assert_eq!(report.results.get(UploadTarget::BeaconDb), UploadOutcome::NoData);
    assert_eq!(report.batches_planned, 0);
    assert_eq!(ocid.calls(), 0);
    assert_eq!(beacon.calls(), 0);
    assert_eq!(rx.try_recv().unwrap().fraction, 1.0);
}

#[tokio::test]
async fn test_batch_windowing() {
    let sqlite = SqliteRecordStore::in_memory().unwrap();
    sqlite
        .insert(&(0..250).map(create_gsm).collect::<Vec<_>>())
        .unwrap();
    let store = Arc::new(CountingStore::new(sqlite));

    let ocid = RecordingClient::new(UploadTarget::OpenCelliD, UploadOutcome::Success);
    let beacon = RecordingClient::new(UploadTarget::BeaconDb, UploadOutcome::Success);
    let (progress, mut rx) = ChannelProgress::channel();

    let coordinator = UploadCoordinator::new(store.clone())
        .with_client(ocid.clone())
        .with_client(beacon.clone())
        .with_progress(Arc::new(progress));

    let config = UploadConfig::builder().batch_size(100).build().unwrap();
    let report = coordinator
        .run(&config, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.disposition, Disposition::Succeeded);
    assert_eq!(report.batches_planned, 3);
    assert_eq!(report.batches_completed, 3);
    assert_eq!(store.fetch_sizes(RecordKind::Gsm), vec![100, 100, 50]);
    assert_eq!(store.count_pending(TargetSelector::Any).unwrap(), 0);
    assert_eq!(report.delivered_to(UploadTarget::OpenCelliD), 250);
    assert_eq!(report.delivered_to(UploadTarget::BeaconDb), 250);
    assert_eq!(ocid.calls(), 3);

    let fractions: Vec<f64> = std::iter::from_fn(|| rx.try_recv().ok())
        .map(|u| u.fraction)
        .collect();
    assert_eq!(fractions.len(), 3);
    assert!((fractions[2] - 1.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_cancellation_after_second_batch() {
    let store = seeded_store((0..50).map(create_gsm).collect());
    let ocid = RecordingClient::new(UploadTarget::OpenCelliD, UploadOutcome::Success);
    let beacon = RecordingClient::new(UploadTarget::BeaconDb, UploadOutcome::Success);

    let token = CancellationToken::new();
    let trigger = token.clone();
    let progress = FnProgress(move |fraction: f64, _: &str| {
        if fraction >= 0.4 {
            trigger.cancel();
        }
    });

    let coordinator = UploadCoordinator::new(store.clone())
        .with_client(ocid.clone())
        .with_client(beacon.clone())
        .with_progress(Arc::new(progress));

    let config = UploadConfig::builder().batch_size(10).build().unwrap();
    let report = coordinator.run(&config, &token).await.unwrap();

    assert_eq!(report.disposition, Disposition::Cancelled);
    assert!(report
        .results
        .iter()
        .all(|(_, outcome)| outcome == UploadOutcome::Cancelled));
    assert_eq!(report.batches_planned, 5);
    assert_eq!(report.batches_completed, 2);
    assert_eq!(ocid.calls(), 2);
    assert_eq!(pending(store.as_ref(), UploadTarget::OpenCelliD), 30);
    assert_eq!(pending(store.as_ref(), UploadTarget::BeaconDb), 30);

    let flagged: Vec<RecordId> = ocid.sent_ids();
    assert_eq!(flagged, (1..=20).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_cancellation_while_sending_discards_step_results() {
    let store = seeded_store((0..5).map(create_gsm).collect());
    let ocid = RecordingClient::slow(UploadTarget::OpenCelliD, Duration::from_secs(5));
    let beacon = RecordingClient::new(UploadTarget::BeaconDb, UploadOutcome::Success);

    let coordinator = UploadCoordinator::new(store.clone())
        .with_client(ocid.clone())
        .with_client(beacon.clone());

    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let report = coordinator.run(&UploadConfig::default(), &token).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(report.disposition, Disposition::Cancelled);
    assert!(report
        .results
        .iter()
        .all(|(_, outcome)| outcome == UploadOutcome::Cancelled));
    assert_eq!(report.batches_completed, 0);
    assert_eq!(ocid.calls(), 1);
    assert_eq!(beacon.calls(), 1);
    // BeaconDB answered before the cancel, but its step was abandoned
    assert_eq!(pending(store.as_ref(), UploadTarget::BeaconDb), 5);
    assert_eq!(pending(store.as_ref(), UploadTarget::OpenCelliD), 5);
    assert_eq!(report.delivered_to(UploadTarget::BeaconDb), 0);
}

#[tokio::test]
async fn test_disabled_target_counts_as_delivered() {
    let store = seeded_store((0..5).map(create_lte).collect());
    let ocid = RecordingClient::new(UploadTarget::OpenCelliD, UploadOutcome::Success);
    let beacon = RecordingClient::new(UploadTarget::BeaconDb, UploadOutcome::Success);

    let coordinator = UploadCoordinator::new(store.clone())
        .with_client(ocid.clone())
        .with_client(beacon.clone());

    let config = UploadConfig::builder()
        .target_enabled(UploadTarget::BeaconDb, false)
        .build()
        .unwrap();
    let report = coordinator
        .run(&config, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.disposition, Disposition::Succeeded);
    assert_eq!(beacon.calls(), 0);
    assert_eq!(ocid.calls(), 1);
    assert_eq!(store.count_pending(TargetSelector::Any).unwrap(), 0);
    assert_eq!(store.purge_delivered().unwrap(), 5);
}

#[tokio::test]
async fn test_partial_failure_resumes_only_failed_target() {
    let store = seeded_store((0..3).map(create_gsm).collect());

    let ocid = RecordingClient::new(UploadTarget::OpenCelliD, UploadOutcome::ServerError);
    let beacon = RecordingClient::new(UploadTarget::BeaconDb, UploadOutcome::Success);
    let coordinator = UploadCoordinator::new(store.clone())
        .with_client(ocid.clone())
        .with_client(beacon.clone());

    let report = coordinator
        .run(&UploadConfig::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.disposition, Disposition::Retrying);
    assert_eq!(
        report.results.get(UploadTarget::OpenCelliD),
        UploadOutcome::ServerError
    );
    assert_eq!(report.results.get(UploadTarget::BeaconDb), UploadOutcome::Success);
    assert_eq!(pending(store.as_ref(), UploadTarget::OpenCelliD), 3);
    assert_eq!(pending(store.as_ref(), UploadTarget::BeaconDb), 0);
    assert_eq!(store.purge_delivered().unwrap(), 0);

    // Second run: OpenCelliD recovers, BeaconDB must not see the records again
    let ocid = RecordingClient::new(UploadTarget::OpenCelliD, UploadOutcome::Success);
    let beacon = RecordingClient::new(UploadTarget::BeaconDb, UploadOutcome::Success);
    let coordinator = UploadCoordinator::new(store.clone())
        .with_client(ocid.clone())
        .with_client(beacon.clone());

    let report = coordinator
        .run(&UploadConfig::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.disposition, Disposition::Succeeded);
    assert_eq!(ocid.sent_ids(), vec![1, 2, 3]);
    assert_eq!(beacon.calls(), 0);
    assert_eq!(report.delivered_to(UploadTarget::BeaconDb), 0);
    assert_eq!(store.purge_delivered().unwrap(), 3);
}

#[tokio::test]
async fn test_send_timeout_is_connection_error() {
    let store = seeded_store(vec![create_lte(1)]);
    let ocid = RecordingClient::slow(UploadTarget::OpenCelliD, Duration::from_millis(500));
    let beacon = RecordingClient::new(UploadTarget::BeaconDb, UploadOutcome::Success);

    let coordinator = UploadCoordinator::new(store.clone())
        .with_client(ocid.clone())
        .with_client(beacon);

    let config = UploadConfig::builder()
        .send_timeout(Duration::from_millis(20))
        .retry_enabled(false)
        .build()
        .unwrap();
    let report = coordinator
        .run(&config, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.disposition, Disposition::Failed);
    assert_eq!(
        report.results.get(UploadTarget::OpenCelliD),
        UploadOutcome::ConnectionError
    );
    assert_eq!(pending(store.as_ref(), UploadTarget::OpenCelliD), 1);
    assert_eq!(pending(store.as_ref(), UploadTarget::BeaconDb), 0);
}

#[tokio::test]
async fn test_kinds_follow_processing_order() {
    let store = seeded_store(vec![
        create_gsm(1),
        create_wifi(2),
        create_lte(3),
        create_nr(4),
        create_cdma(5),
    ]);
    let ocid = RecordingClient::new(UploadTarget::OpenCelliD, UploadOutcome::Success);
    let beacon = RecordingClient::new(UploadTarget::BeaconDb, UploadOutcome::Success);

    let coordinator = UploadCoordinator::new(store.clone())
        .with_client(ocid.clone())
        .with_client(beacon.clone());

    let report = coordinator
        .run(&UploadConfig::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.disposition, Disposition::Succeeded);
    assert_eq!(
        ocid.sent_kinds(),
        vec![RecordKind::Nr, RecordKind::Lte, RecordKind::Cdma, RecordKind::Gsm]
    );
    assert_eq!(
        beacon.sent_kinds(),
        vec![RecordKind::Nr, RecordKind::Lte, RecordKind::Gsm, RecordKind::Wifi]
    );
    // Unsupported kinds are flagged without a send
    assert_eq!(store.count_pending(TargetSelector::Any).unwrap(), 0);
}

#[tokio::test]
async fn test_invalid_credential_stops_run_without_flags() {
    let store = seeded_store((0..30).map(create_gsm).collect());
    let ocid = RecordingClient::new(UploadTarget::OpenCelliD, UploadOutcome::InvalidCredential);
    let beacon = RecordingClient::new(UploadTarget::BeaconDb, UploadOutcome::Success);

    let coordinator = UploadCoordinator::new(store.clone())
        .with_client(ocid.clone())
        .with_client(beacon.clone());

    let config = UploadConfig::builder().batch_size(10).build().unwrap();
    let report = coordinator
        .run(&config, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.disposition, Disposition::Retrying);
    assert_eq!(report.batches_completed, 1);
    assert_eq!(ocid.calls(), 1);
    assert_eq!(pending(store.as_ref(), UploadTarget::OpenCelliD), 30);
    assert_eq!(pending(store.as_ref(), UploadTarget::BeaconDb), 20);
}

/// Store whose reads always fail
struct BrokenStore;

impl RecordStore for BrokenStore {
    fn count_pending(&self, _selector: TargetSelector) -> Result<usize> {
        Ok(3)
    }

    fn fetch_pending(
        &self,
        _kind: RecordKind,
        _selector: TargetSelector,
        _limit: usize,
    ) -> Result<Vec<StoredRecord>> {
        Err(Error::from(rusqlite::Error::InvalidQuery))
    }

    fn mark_delivered(&self, _: UploadTarget, _: RecordKind, _: &[RecordId]) -> Result<()> {
        Ok(())
    }

    fn insert(&self, _records: &[SurveyRecord]) -> Result<Vec<RecordId>> {
        Ok(Vec::new())
    }

    fn pending_summary(&self) -> Result<PendingSummary> {
        Ok(PendingSummary::default())
    }

    fn purge_delivered(&self) -> Result<usize> {
        Ok(0)
    }
}

#[tokio::test]
async fn test_storage_error_aborts_run() {
    let ocid = RecordingClient::new(UploadTarget::OpenCelliD, UploadOutcome::Success);
    let beacon = RecordingClient::new(UploadTarget::BeaconDb, UploadOutcome::Success);
    let coordinator = UploadCoordinator::new(Arc::new(BrokenStore))
        .with_client(ocid.clone())
        .with_client(beacon);

    let err = coordinator
        .run(&UploadConfig::default(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Storage);
    assert_eq!(ocid.calls(), 0);
}
