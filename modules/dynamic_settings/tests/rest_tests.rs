//! REST API tests driving the router in-process

mod common;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use common::{print_json, print_test_header, seed, TestStore};
use dynamic_settings::contract::ValueType;
use dynamic_settings::{Config, SettingsServiceModule};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn setup() -> (Arc<TestStore>, Router) {
    let store = Arc::new(TestStore::new());
    let module = SettingsServiceModule::with_store(Config::default(), store.clone());
    (store, module.router())
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    send(router, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn post(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(router, request).await
}

#[tokio::test]
async fn test_update_then_read_back() {
    print_test_header(
        "test_update_then_read_back",
        &["POST /settings commits a batch that GET endpoints then return"],
    );

    let (_store, router) = setup();
    let (status, body) = post(
        &router,
        "/settings",
        json!({
            "settings": [
                {"key": "timeout_ms", "value_type": "integer", "value": 30},
                {"key": "feature.beta", "value_type": "boolean", "value": true}
            ],
            "changed_by": "ops"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));

    let (status, body) = get(&router, "/setting?key=timeout_ms").await;
    print_json("setting", &body);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["key"], "timeout_ms");
    assert_eq!(body["value"], 30);
    assert_eq!(body["value_type"], "integer");
    assert!(body.get("deleted").is_none());

    let (status, body) = get(&router, "/settings").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    let keys: Vec<&str> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["key"].as_str().unwrap())
        .collect();
    assert_eq!(keys, vec!["feature.beta", "timeout_ms"]);
}

#[tokio::test]
async fn test_invalid_batch_returns_422_with_errors() {
    let (store, router) = setup();
    seed(&*store, "a", ValueType::Integer, "1").await;

    let (status, body) = post(
        &router,
        "/settings",
        json!({"settings": [
            {"key": "a", "value": 2},
            {"key": "b", "value_type": "integer", "value": "abc"}
        ]}),
    )
    .await;
    print_json("response", &body);
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert_eq!(body["errors"]["b"], json!(["value must be an integer"]));
    assert!(body["errors"].get("a").is_none());

    let (_, body) = get(&router, "/setting?key=a").await;
    assert_eq!(body["value"], 1);
}

#[tokio::test]
async fn test_unknown_attribute_is_bad_request() {
    let (_store, router) = setup();
    let (status, body) = post(
        &router,
        "/settings",
        json!({"settings": [{"key": "a", "value": 1, "colour": "red"}]}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
    assert_eq!(body["title"], "Unknown Attribute");

    let (_, body) = get(&router, "/settings").await;
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn test_missing_setting_is_not_found() {
    let (_store, router) = setup();
    let (status, body) = get(&router, "/setting?key=nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);

    let (status, _) = get(&router, "/setting/history?key=nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_history_endpoint_pages() {
    print_test_header(
        "test_history_endpoint_pages",
        &["GET /setting/history returns one page with cursors"],
    );

    let (_store, router) = setup();
    for value in ["one", "two", "three"] {
        let (status, _) = post(
            &router,
            "/settings",
            json!({"settings": [{"key": "motd", "value": value}]}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = get(&router, "/setting/history?key=motd&limit=2").await;
    print_json("page", &body);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["setting"]["value"], "three");
    let values: Vec<&str> = body["histories"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["value"].as_str().unwrap())
        .collect();
    assert_eq!(values, vec!["three", "two"]);
    assert!(body["previous_page_params"].is_null());
    assert_eq!(body["next_page_params"]["offset"], 2);

    let (_, body) = get(&router, "/setting/history?key=motd&limit=2&offset=2").await;
    assert_eq!(body["histories"].as_array().unwrap().len(), 1);
    assert_eq!(body["previous_page_params"]["offset"], 0);
    assert!(body["next_page_params"].is_null());
}

#[tokio::test]
async fn test_polling_endpoints() {
    let (store, router) = setup();

    let (status, body) = get(&router, "/last_updated_at").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["last_updated_at"].is_null());

    seed(&*store, "a", ValueType::String, "x").await;
    let (_, body) = get(&router, "/last_updated_at").await;
    assert!(body["last_updated_at"].is_string());

    let (status, body) = get(&router, "/updated_since?time=2000-01-01T00:00:00Z").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);

    let (status, body) = get(&router, "/updated_since?time=yesterday").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["title"], "Invalid Time");
}

#[tokio::test]
async fn test_storage_outage_is_service_unavailable() {
    let (store, router) = setup();
    store.set_fail_reads(true);

    let (status, body) = get(&router, "/settings").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], 503);
    assert_eq!(body["detail"], "Settings storage is temporarily unavailable");
}
