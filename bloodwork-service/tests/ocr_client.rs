use bloodwork_service::extract::{ExtractError, OcrClient, TextExtractor};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn extractor(server: &MockServer) -> TextExtractor {
    TextExtractor::new(OcrClient::new(server.uri(), "test-key".to_string()))
}

#[tokio::test]
async fn image_extraction_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/parse/image"))
        .and(header("apikey", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ParsedResults": [{
                "ParsedText": "Vitamin D: 32 ng/mL (30-100)",
                "FileParseExitCode": 1
            }],
            "IsErroredOnProcessing": false
        })))
        .mount(&server)
        .await;

    let out = extractor(&server)
        .extract(b"fake image bytes", "image/png")
        .await
        .unwrap();

    assert!(out.text.contains("Vitamin D"));
    assert_eq!(out.confidence, 0.8);
}

#[tokio::test]
async fn partial_parse_lowers_confidence() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/parse/image"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ParsedResults": [{
                "ParsedText": "smudged panel",
                "FileParseExitCode": 3
            }],
            "IsErroredOnProcessing": false
        })))
        .mount(&server)
        .await;

    let out = extractor(&server)
        .extract(b"fake image bytes", "image/jpeg")
        .await
        .unwrap();

    assert_eq!(out.confidence, 0.6);
}

#[tokio::test]
async fn ocr_service_error_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/parse/image"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ParsedResults": [],
            "IsErroredOnProcessing": true,
            "ErrorMessage": ["file unreadable"]
        })))
        .mount(&server)
        .await;

    let err = extractor(&server)
        .extract(b"fake image bytes", "image/png")
        .await
        .unwrap_err();

    assert!(matches!(err, ExtractError::Ocr(_)));
}

#[tokio::test]
async fn http_error_status_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/parse/image"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = extractor(&server)
        .extract(b"fake image bytes", "image/png")
        .await
        .unwrap_err();

    assert!(matches!(err, ExtractError::Ocr(_)));
}

#[tokio::test]
async fn empty_ocr_text_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/parse/image"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ParsedResults": [{
                "ParsedText": "   ",
                "FileParseExitCode": 1
            }],
            "IsErroredOnProcessing": false
        })))
        .mount(&server)
        .await;

    let err = extractor(&server)
        .extract(b"fake image bytes", "image/png")
        .await
        .unwrap_err();

    assert!(matches!(err, ExtractError::EmptyText));
}
