use ecrypt::password::random_org::{HttpTransport, generate_random_org_password};
use ecrypt::{CryptError, CryptoConfig, Engine};
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport(server: &MockServer) -> HttpTransport {
    HttpTransport::with_url(format!("{}/json-rpc/1/invoke", server.uri()))
}

fn result_body(data: &[&str]) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "result": {
            "random": { "data": data, "completionTime": "2024-05-01 10:00:00Z" },
            "bitsUsed": 8 * data.len(),
            "bitsLeft": 249_000,
            "requestsLeft": 998,
            "advisoryDelay": 0
        },
        "id": 679
    })
}

#[tokio::test]
async fn sends_generate_integers_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/json-rpc/1/invoke"))
        .and(body_partial_json(serde_json::json!({
            "jsonrpc": "2.0",
            "method": "generateIntegers",
            "params": { "apiKey": "test-key", "n": 3, "min": 0, "max": 255, "replacement": false, "base": 16 },
            "id": 679
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(result_body(&["1f", "a", "c3"])))
        .expect(1)
        .mount(&server)
        .await;

    let pw = generate_random_org_password(&transport(&server), 6, "test-key")
        .await
        .unwrap();
    assert_eq!(pw.as_str(), "1f0ac3");
}

#[tokio::test]
async fn http_error_status_is_remote_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = generate_random_org_password(&transport(&server), 8, "k")
        .await
        .unwrap_err();
    match err {
        CryptError::RemoteServiceError { message, .. } => assert!(message.contains("503")),
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn malformed_body_is_remote_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    assert!(matches!(
        generate_random_org_password(&transport(&server), 8, "k").await,
        Err(CryptError::RemoteServiceError { source: Some(_), .. })
    ));
}

#[tokio::test]
async fn unreachable_service_is_remote_error() {
    let transport = HttpTransport::with_url("http://127.0.0.1:9/invoke");

    assert!(matches!(
        generate_random_org_password(&transport, 8, "k").await,
        Err(CryptError::RemoteServiceError { .. })
    ));
}

#[tokio::test]
async fn engine_uses_injected_transport() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(result_body(&["00", "ff"])))
        .mount(&server)
        .await;

    let engine = Engine::with_transport(
        CryptoConfig::with_data_dir(std::env::temp_dir().join("ecrypt-random-org")),
        Arc::new(transport(&server)),
    );

    let pw = engine.generate_random_org_password(3, "k").await.unwrap();
    assert_eq!(pw.as_str(), "00f");
}

#[tokio::test]
async fn slow_service_hits_request_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(result_body(&["00"]))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let transport = transport(&server).with_timeout(Duration::from_millis(200));
    let started = Instant::now();

    assert!(matches!(
        generate_random_org_password(&transport, 2, "k").await,
        Err(CryptError::RemoteServiceError { source: Some(_), .. })
    ));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn cancelling_a_stalled_request_resolves_cancelled() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(result_body(&["00"]))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let engine = Engine::with_transport(
        CryptoConfig::with_data_dir(std::env::temp_dir().join("ecrypt-random-org")),
        Arc::new(transport(&server)),
    );
    let op = engine.generate_random_org_password(2, "k");
    let token = op.cancel_token();
    let started = Instant::now();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
    });

    assert!(matches!(op.await, Err(CryptError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(5));
}
