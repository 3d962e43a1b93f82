//! OpenCelliD client tests against a mock HTTP server

mod common;

use common::{create_batch, create_cdma, create_gsm, create_lte};
use towersync::models::RecordKind;
use towersync::upload::client::USER_AGENT;
use towersync::upload::{OpenCelliDClient, OpenCelliDConfig, TargetClient, UploadOutcome};
use wiremock::matchers::{body_string_contains, header, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_KEY: &str = "pk.0123456789abcdef0123456789abcdef";

fn client_for(server: &MockServer) -> OpenCelliDClient {
    let config =
        OpenCelliDConfig::new(format!("{}/measure/uploadCsv", server.uri())).with_api_key(API_KEY);
    OpenCelliDClient::new(config).unwrap()
}

async fn respond_with(template: ResponseTemplate) -> UploadOutcome {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/measure/uploadCsv"))
        .respond_with(template)
        .mount(&server)
        .await;

    let batch = create_batch(RecordKind::Gsm, vec![create_gsm(1)]);
    client_for(&server).send(&batch).await
}

#[tokio::test]
async fn test_upload_posts_multipart_csv() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/measure/uploadCsv"))
        .and(header("user-agent", USER_AGENT))
        .and(header_regex("content-type", "^multipart/form-data"))
        .and(body_string_contains("name=\"key\""))
        .and(body_string_contains(API_KEY))
        .and(body_string_contains("name=\"appId\""))
        .and(body_string_contains("name=\"datafile\""))
        .and(body_string_contains("towersync_measurements_"))
        .and(body_string_contains("mcc,mnc,lac,cellid"))
        .and(body_string_contains("200001"))
        .respond_with(ResponseTemplate::new(200).set_body_string("0,OK"))
        .expect(1)
        .mount(&server)
        .await;

    let batch = create_batch(RecordKind::Lte, vec![create_lte(1)]);
    let outcome = client_for(&server).send(&batch).await;

    assert_eq!(outcome, UploadOutcome::Success);
}

#[tokio::test]
async fn test_anonymous_upload_uses_shared_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("shared-anonymous-key"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let config = OpenCelliDConfig::new(format!("{}/measure/uploadCsv", server.uri()))
        .with_anonymous_key("shared-anonymous-key");
    let client = OpenCelliDClient::new(config).unwrap();

    let batch = create_batch(RecordKind::Cdma, vec![create_cdma(1)]);
    assert_eq!(client.send(&batch).await, UploadOutcome::Success);
}

#[tokio::test]
async fn test_status_mapping() {
    let cases = [
        (401, UploadOutcome::InvalidCredential),
        (403, UploadOutcome::PermissionDenied),
        (429, UploadOutcome::LimitExceeded),
        (400, UploadOutcome::InvalidData),
        (500, UploadOutcome::ServerError),
        (503, UploadOutcome::ServerError),
    ];

    for (status, expected) in cases {
        let outcome = respond_with(ResponseTemplate::new(status)).await;
        assert_eq!(outcome, expected, "status {status}");
    }
}

#[tokio::test]
async fn test_error_body_on_success_status() {
    let outcome =
        respond_with(ResponseTemplate::new(200).set_body_string("Err: invalid api key")).await;
    assert_eq!(outcome, UploadOutcome::InvalidCredential);

    let outcome =
        respond_with(ResponseTemplate::new(200).set_body_string("Err: malformed csv row 2")).await;
    assert_eq!(outcome, UploadOutcome::InvalidData);
}

/// Address of a port that was free a moment ago and has no listener
fn unused_endpoint() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    format!("http://127.0.0.1:{port}")
}

#[tokio::test]
async fn test_unreachable_server_is_connection_error() {
    let client = OpenCelliDClient::new(
        OpenCelliDConfig::new(format!("{}/measure/uploadCsv", unused_endpoint())).with_api_key(API_KEY),
    )
    .unwrap();

    let batch = create_batch(RecordKind::Gsm, vec![create_gsm(1)]);
    assert_eq!(client.send(&batch).await, UploadOutcome::ConnectionError);
}

#[tokio::test]
async fn test_client_rejects_wifi() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    assert!(client.supports(RecordKind::Nr));
    assert!(client.supports(RecordKind::Cdma));
    assert!(!client.supports(RecordKind::Wifi));
}

#[test]
fn test_enabled_client_requires_key() {
    let mut config = OpenCelliDConfig::new("http://localhost/measure/uploadCsv");
    config.enabled = true;
    assert!(OpenCelliDClient::new(config).is_err());
}
