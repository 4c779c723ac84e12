// tests/api_http.rs
//
// HTTP boundary tests via a cached offline Router (tokio::sync::OnceCell),
// exercised with tower's `oneshot`.

use axum::{
    body::{to_bytes, Body},
    http::Request,
};
use http::StatusCode;
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tower::ServiceExt; // for `oneshot`

use phish_risk_analyzer::api::{create_router, AppState};

static ROUTER: OnceCell<axum::Router> = OnceCell::const_new();

async fn test_app() -> axum::Router {
    ROUTER
        .get_or_init(|| async { create_router(AppState::offline()) })
        .await
        .clone()
}

async fn post_json(uri: &str, body: Value) -> (StatusCode, Value) {
    let router = test_app().await;
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let resp = router.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), 256 * 1024).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn health_answers_ok() {
    let router = test_app().await;
    let resp = router
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = to_bytes(resp.into_body(), 1024).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn empty_text_is_a_client_error() {
    let (status, body) = post_json("/analyze", json!({"text": ""})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn scam_message_comes_back_suspicious() {
    let (status, body) = post_json(
        "/analyze",
        json!({"text": "URGENT! Verify your bank OTP 123456 now!!!"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["final_risk"], "Suspicious");
    assert_eq!(body["source"], "message_only");
    assert_eq!(body["final_score"], json!(0.613));
    assert_eq!(body["scam_type"], "credential_harvesting");
    assert!(body["explanation"].as_array().is_some_and(|a| !a.is_empty()));
    assert!(body["url_analysis"].is_null());
    assert_eq!(body["message_analysis"]["model_probability"], json!(0.5));
}

#[tokio::test]
async fn text_with_url_fuses_both_channels() {
    let (status, body) = post_json(
        "/analyze",
        json!({"text": "URGENT! Verify your bank OTP 123456 now!!! http://secure-login.xyz/verify"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "message+url");
    assert!(!body["message_analysis"].is_null());
    assert!(!body["url_analysis"].is_null());
    assert_eq!(body["url_analysis"]["channel"], "url");
}

#[tokio::test]
async fn invalid_base64_image_is_a_client_error() {
    let (status, body) = post_json("/analyze-qr", json!({"image_base64": "@@not-base64@@"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn undecodable_qr_yields_the_no_qr_shape() {
    // Valid base64, but the offline decoder never decodes anything.
    let (status, body) = post_json("/analyze-qr", json!({"image_base64": "aGVsbG8="})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["final_risk"], "Unknown");
    assert_eq!(body["scam_type"], "no_qr");
    assert!(body["decoded_data"].is_null());
}

#[tokio::test]
async fn home_reports_backend_status() {
    let router = test_app().await;
    let resp = router
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = to_bytes(resp.into_body(), 1024).await.unwrap();
    let v: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(v["status"], "Backend running successfully");
}
