use super::server::{router, ApiServerBuilder, ApiState};
use crate::assistant::KeywordAssistant;
use crate::config::AurasafeConfig;
use crate::emergency::{EmergencyFlow, Services};
use crate::events::EventBus;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn test_state() -> ApiState {
    let config = AurasafeConfig::default();
    let services = Services::builder(EventBus::new(64)).build();
    let flow = EmergencyFlow::new(Arc::new(services), &config.countdown, &config.capture);

    ApiState::new(Arc::new(flow)).with_assistant(Arc::new(KeywordAssistant::new(Duration::ZERO)))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health_reports_idle_and_seeded_contacts() {
    let app = router(test_state());

    let (status, body) = send(&app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["emergency"], "idle");
    assert_eq!(body["contacts"], 4);
}

#[tokio::test]
async fn test_press_twice_conflicts_then_cancel() {
    let app = router(test_state());

    let (status, body) = send(&app, Method::POST, "/emergency/press", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let event_id = body["event_id"].as_str().unwrap().to_string();
    assert_eq!(body["countdown_seconds"], 5);

    let (status, body) = send(&app, Method::POST, "/emergency/press", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Invalid state: emergency already in progress");

    let (_, body) = send(&app, Method::GET, "/emergency", None).await;
    assert_eq!(body["countdown"]["status"], "armed");
    assert_eq!(body["current"]["id"], event_id.as_str());

    let (status, body) = send(&app, Method::POST, "/emergency/cancel", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cancelled"], true);
    assert_eq!(body["last_event"]["status"], "cancelled");

    let (_, body) = send(&app, Method::POST, "/emergency/cancel", None).await;
    assert_eq!(body["cancelled"], false);
}

#[tokio::test]
async fn test_contacts_add_list_and_remove() {
    let app = router(test_state());

    let (status, created) = send(
        &app,
        Method::POST,
        "/contacts",
        Some(json!({ "name": "Priya", "phone": "+1 555 0100", "priority": "high" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["name"], "Priya");
    assert!(created["email"].is_null());

    let (_, contacts) = send(&app, Method::GET, "/contacts", None).await;
    assert_eq!(contacts.as_array().unwrap().len(), 5);

    let (status, body) = send(
        &app,
        Method::POST,
        "/contacts",
        Some(json!({ "name": "  ", "phone": "123" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("name"));

    let uri = format!("/contacts/{}", created["id"].as_str().unwrap());
    let (status, _) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_incident_submission_requires_description() {
    let app = router(test_state());

    let (status, _) = send(
        &app,
        Method::POST,
        "/incidents",
        Some(json!({ "incident_type": "suspicious", "description": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, report) = send(
        &app,
        Method::POST,
        "/incidents",
        Some(json!({
            "incident_type": "suspicious",
            "description": "Suspicious man following me",
            "location": "Main St",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(report["incident_type"], "suspicious");
    assert_eq!(report["share_with_community"], true);
    assert_eq!(report["evidence"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_assistant_replies_and_rejects_blank_messages() {
    let app = router(test_state());

    let (status, body) = send(
        &app,
        Method::POST,
        "/assistant",
        Some(json!({ "message": "I feel unsafe walking home" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"]["sender"], "assistant");
    assert!(!body["reply"]["text"].as_str().unwrap().is_empty());

    let (status, _) = send(&app, Method::POST, "/assistant", Some(json!({ "message": "" }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_risk_score_is_within_bounds() {
    let app = router(test_state());

    let (status, body) = send(&app, Method::GET, "/risk", None).await;

    assert_eq!(status, StatusCode::OK);
    let score = body["assessment"]["score"].as_f64().unwrap();
    assert!((0.3..=1.3).contains(&score));
    assert_ne!(body["assessment"]["level"], "high");
    assert_eq!(body["assessment"]["factors"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_server_builder_requires_config_and_flow() {
    assert!(ApiServerBuilder::new().build().is_err());

    let state = test_state();
    let server = ApiServerBuilder::new()
        .config(AurasafeConfig::default().api)
        .flow(Arc::clone(&state.flow))
        .build()
        .unwrap();

    assert_eq!(server.address(), "127.0.0.1:8080");
}
