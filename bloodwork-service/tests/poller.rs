use bloodwork_service::client::{Outcome, PollError, StatusPoller};
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn poller(server: &MockServer) -> StatusPoller {
    StatusPoller::new(server.uri(), "user-1".to_string())
        .with_interval(Duration::from_millis(10))
        .with_timeout(Duration::from_millis(500))
}

fn status_body(status: &str, progress: u8) -> serde_json::Value {
    json!({
        "document_id": "doc-1",
        "status": status,
        "progress": progress,
        "current_phase": "ai_extraction",
        "current_message": "working",
        "details": {}
    })
}

#[tokio::test]
async fn completed_status_ends_polling() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/documents/doc-1/status"))
        .and(header("X-User-ID", "user-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body("completed", 100)))
        .mount(&server)
        .await;

    let outcome = poller(&server)
        .poll_document("doc-1", &CancellationToken::new())
        .await
        .unwrap();

    match outcome {
        Outcome::Completed(view) => assert_eq!(view.progress, 100),
        other => panic!("expected completed, got {:?}", other),
    }
}

#[tokio::test]
async fn server_reported_failure_is_an_outcome_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/documents/doc-1/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body("failed", 100)))
        .mount(&server)
        .await;

    let outcome = poller(&server)
        .poll_document("doc-1", &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(outcome, Outcome::Failed(_)));
}

#[tokio::test]
async fn non_terminal_status_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/documents/doc-1/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body("processing", 40)))
        .mount(&server)
        .await;

    let err = poller(&server)
        .with_timeout(Duration::from_millis(100))
        .poll_document("doc-1", &CancellationToken::new())
        .await
        .unwrap_err();

    // Timeout is distinct from a server-reported failure.
    assert!(matches!(err, PollError::TimedOut(_)));
}

#[tokio::test]
async fn transient_transport_failures_are_tolerated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/documents/doc-1/status"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/documents/doc-1/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body("completed", 100)))
        .mount(&server)
        .await;

    let outcome = poller(&server)
        .poll_document("doc-1", &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(outcome, Outcome::Completed(_)));
}

#[tokio::test]
async fn persistent_transport_failure_surfaces() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/documents/doc-1/status"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = poller(&server)
        .poll_document("doc-1", &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        PollError::Transport { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected transport error, got {:?}", other),
    }
}

#[tokio::test]
async fn hung_requests_count_as_transport_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/documents/doc-1/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(status_body("processing", 40))
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let err = poller(&server)
        .with_request_timeout(Duration::from_millis(50))
        .poll_document("doc-1", &CancellationToken::new())
        .await
        .unwrap_err();

    // The per-request timeout trips well before the wall-clock deadline.
    match err {
        PollError::Transport { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected transport error, got {:?}", other),
    }
}

#[tokio::test]
async fn cancellation_stops_polling_without_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/documents/doc-1/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body("processing", 40)))
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        trigger.cancel();
    });

    let outcome = poller(&server)
        .with_timeout(Duration::from_secs(10))
        .poll_document("doc-1", &cancel)
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Cancelled);
}
