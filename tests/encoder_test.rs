//! Wiremock integration tests for HttpEncoder.
//!
//! These tests verify the multipart upload and the success/failure rules
//! for encode responses.

use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

use clickmask::encoder::{HttpEncoder, HttpEncoderConfig};
use clickmask::{ClickmaskError, EmbeddingEncoder, ImageSize};

const ENCODE_PATH: &str = "/api/sam2/encode";

/// Matches requests without an Authorization header.
struct NoAuthHeader;

impl Match for NoAuthHeader {
    fn matches(&self, request: &Request) -> bool {
        !request.headers.contains_key("authorization")
    }
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    image::RgbaImage::new(width, height)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

async fn mount(server: &MockServer, template: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path(ENCODE_PATH))
        .respond_with(template)
        .mount(server)
        .await;
}

#[tokio::test]
async fn array_embedding_success() {
    let server = MockServer::start().await;
    mount(
        &server,
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "embeddingData": [0.0, 0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5],
            "shape": [1, 2, 2, 2],
            "imageSize": { "width": 640, "height": 480 }
        })),
    )
    .await;

    let encoder = HttpEncoder::with_base_url(server.uri());
    let embedding = encoder.encode(png(2, 3)).await.expect("encode should succeed");

    assert_eq!(embedding.shape(), &[1, 2, 2, 2]);
    assert_eq!(embedding.len(), 8);
    assert!((embedding.data()[3] - 1.5).abs() < 1e-6);
    // The server's declared size wins over the uploaded header.
    assert_eq!(embedding.image_size(), ImageSize::new(640, 480));
}

#[tokio::test]
async fn base64_embedding_success() {
    let server = MockServer::start().await;
    let values = [0.25f32, -1.0, 4.0, 8.5];
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    mount(
        &server,
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "embeddingData": STANDARD.encode(bytes),
            "shape": [1, 1, 2, 2],
            "imageSize": { "width": 10, "height": 10 }
        })),
    )
    .await;

    let encoder = HttpEncoder::with_base_url(server.uri());
    let embedding = encoder.encode(png(10, 10)).await.unwrap();
    assert_eq!(embedding.data(), &values);
}

#[tokio::test]
async fn missing_image_size_falls_back_to_upload_header() {
    let server = MockServer::start().await;
    mount(
        &server,
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "embeddingData": [1.0, 2.0],
            "shape": [1, 2]
        })),
    )
    .await;

    let encoder = HttpEncoder::with_base_url(server.uri());
    let embedding = encoder.encode(png(7, 5)).await.unwrap();
    assert_eq!(embedding.image_size(), ImageSize::new(7, 5));
}

#[tokio::test]
async fn missing_image_size_without_readable_upload_is_malformed() {
    let server = MockServer::start().await;
    mount(
        &server,
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "embeddingData": [1.0],
            "shape": [1]
        })),
    )
    .await;

    let encoder = HttpEncoder::with_base_url(server.uri());
    let err = encoder.encode(b"not an image".to_vec()).await.unwrap_err();
    assert!(matches!(err, ClickmaskError::MalformedResponse(_)), "got {err:?}");
}

#[tokio::test]
async fn success_false_is_api_error_even_on_200() {
    let server = MockServer::start().await;
    mount(
        &server,
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": false,
            "error": "Image too large"
        })),
    )
    .await;

    let encoder = HttpEncoder::with_base_url(server.uri());
    match encoder.encode(png(2, 2)).await.unwrap_err() {
        ClickmaskError::Api { status, message } => {
            assert_eq!(status, 200);
            assert_eq!(message, "Image too large");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn server_error_body_is_reported() {
    let server = MockServer::start().await;
    mount(
        &server,
        ResponseTemplate::new(500).set_body_json(serde_json::json!({
            "success": false,
            "error": "Encoder crashed"
        })),
    )
    .await;

    let encoder = HttpEncoder::with_base_url(server.uri());
    let err = encoder.encode(png(2, 2)).await.unwrap_err();
    assert!(err.is_terminal());
    match err {
        ClickmaskError::Api { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "Encoder crashed");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn non_json_error_uses_status_message() {
    let server = MockServer::start().await;
    mount(
        &server,
        ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"),
    )
    .await;

    let encoder = HttpEncoder::with_base_url(server.uri());
    match encoder.encode(png(2, 2)).await.unwrap_err() {
        ClickmaskError::Api { status, message } => {
            assert_eq!(status, 502);
            assert!(message.contains("502"), "message was {message}");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_embedding_data_is_malformed() {
    let server = MockServer::start().await;
    mount(
        &server,
        ResponseTemplate::new(200).set_body_json(serde_json::json!({ "success": true })),
    )
    .await;

    let encoder = HttpEncoder::with_base_url(server.uri());
    let err = encoder.encode(png(2, 2)).await.unwrap_err();
    assert!(matches!(err, ClickmaskError::MalformedResponse(_)));
}

#[tokio::test]
async fn empty_embedding_data_is_malformed() {
    let server = MockServer::start().await;
    mount(
        &server,
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "embeddingData": [],
            "imageSize": { "width": 2, "height": 2 }
        })),
    )
    .await;

    let encoder = HttpEncoder::with_base_url(server.uri());
    let err = encoder.encode(png(2, 2)).await.unwrap_err();
    assert!(matches!(err, ClickmaskError::MalformedResponse(_)));
}

#[tokio::test]
async fn shape_mismatch_is_malformed() {
    let server = MockServer::start().await;
    mount(
        &server,
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "embeddingData": [1.0, 2.0, 3.0],
            "shape": [1, 2, 2],
            "imageSize": { "width": 2, "height": 2 }
        })),
    )
    .await;

    let encoder = HttpEncoder::with_base_url(server.uri());
    let err = encoder.encode(png(2, 2)).await.unwrap_err();
    assert!(matches!(err, ClickmaskError::MalformedResponse(_)));
}

#[tokio::test]
async fn overflowing_shape_is_malformed() {
    let server = MockServer::start().await;
    mount(
        &server,
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "embeddingData": [1.0, 2.0],
            "shape": [4294967296u64, 4294967296u64, 2],
            "imageSize": { "width": 2, "height": 2 }
        })),
    )
    .await;

    let encoder = HttpEncoder::with_base_url(server.uri());
    let err = encoder.encode(png(2, 2)).await.unwrap_err();
    assert!(matches!(err, ClickmaskError::MalformedResponse(_)), "got {err:?}");
}

#[tokio::test]
async fn uploads_image_field_with_bearer_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/encode"))
        .and(header("Authorization", "Bearer test-key"))
        .and(body_string_contains("name=\"image\""))
        .and(body_string_contains("filename=\"image.bin\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "embeddingData": [1.0],
            "shape": [1],
            "imageSize": { "width": 1, "height": 1 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = HttpEncoderConfig::new(server.uri())
        .path("/encode")
        .api_key("test-key");
    let encoder = HttpEncoder::new(config);
    encoder
        .encode(b"plain bytes".to_vec())
        .await
        .expect("encode should succeed");
}

#[tokio::test]
async fn keyless_encoder_sends_no_auth_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENCODE_PATH))
        .and(NoAuthHeader)
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "embeddingData": [1.0],
            "shape": [1],
            "imageSize": { "width": 1, "height": 1 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let encoder = HttpEncoder::with_base_url(server.uri());
    encoder.encode(png(1, 1)).await.expect("encode should succeed");
}

#[tokio::test]
async fn unreachable_server_is_http_error() {
    let encoder = HttpEncoder::with_base_url("http://127.0.0.1:1");
    let err = encoder.encode(png(1, 1)).await.unwrap_err();
    assert!(matches!(err, ClickmaskError::Http(_)), "got {err:?}");
    assert!(err.is_terminal());
}
