//! Router tests driven through `tower::ServiceExt::oneshot`.

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use doccache_api::routes::items::{CountResponse, ListItemsResponse};
use doccache_api::{create_api_router, AppState, ApiError, ErrorCode};
use doccache_storage::{CacheStore, RawKey, StoreConfig};
use doccache_test_utils::fixtures::sample_operation_status;
use tower::ServiceExt;

async fn test_app() -> (Router, CacheStore) {
    let store = CacheStore::open_with_config(StoreConfig::default())
        .await
        .expect("open store");
    (create_api_router(AppState::new(store.clone())), store)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Option<String>, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
        .await
        .expect("router is infallible");

    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body")
        .to_vec();
    (status, content_type, body)
}

#[tokio::test]
async fn ping_returns_pong() {
    let (app, _store) = test_app().await;
    let (status, _, body) = get(app, "/health/ping").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"pong");
}

#[tokio::test]
async fn readiness_reports_entry_count() {
    let (app, store) = test_app().await;
    store.set(b"one").expect("set");

    let (status, _, body) = get(app, "/health/ready").await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_slice(&body).expect("json body");
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["details"]["store"]["entries"], 1);
}

#[tokio::test]
async fn list_items_is_sorted_with_count() {
    let (app, store) = test_app().await;
    for i in 0..3 {
        store.set(format!("v{}", i).as_bytes()).expect("set");
    }

    let (status, _, body) = get(app, "/items").await;
    assert_eq!(status, StatusCode::OK);

    let listed: ListItemsResponse = serde_json::from_slice(&body).expect("json body");
    assert_eq!(listed.count, 3);
    let mut sorted = listed.keys.clone();
    sorted.sort();
    assert_eq!(listed.keys, sorted);
}

#[tokio::test]
async fn get_item_serves_json_documents_as_json() {
    let (app, store) = test_app().await;
    let status_doc = sample_operation_status("status-1", "op-1");
    let key = store.set_struct(&status_doc).expect("set_struct");

    let (status, content_type, body) = get(app, &format!("/items/{}", key)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/json"));

    let json: serde_json::Value = serde_json::from_slice(&body).expect("json body");
    assert_eq!(json["operationId"], "op-1");
}

#[tokio::test]
async fn get_item_serves_binary_as_octet_stream() {
    let (app, store) = test_app().await;
    let key = store.set(&[0xff, 0x00, 0xfe]).expect("set");

    let (status, content_type, body) = get(app, &format!("/items/{}", key)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/octet-stream"));
    assert_eq!(body, vec![0xff, 0x00, 0xfe]);
}

#[tokio::test]
async fn unknown_and_malformed_keys_are_404() {
    let (app, _store) = test_app().await;
    let never_issued = RawKey::generate().expect("entropy").encode();

    for uri in [format!("/items/{}", never_issued), "/items/lowercase".to_string()] {
        let (status, _, body) = get(app.clone(), &uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let err: ApiError = serde_json::from_slice(&body).expect("error body");
        assert_eq!(err.code, ErrorCode::KeyNotFound);
    }
}

#[tokio::test]
async fn deleted_key_disappears_from_routes() {
    let (app, store) = test_app().await;
    let key = store.set(b"short lived").expect("set");
    store.delete(&key).expect("delete");

    let (status, _, _) = get(app.clone(), &format!("/items/{}", key)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, _, body) = get(app, "/count").await;
    let count: CountResponse = serde_json::from_slice(&body).expect("json body");
    assert_eq!(count.count, 0);
}
