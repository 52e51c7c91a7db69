//! API integration tests
//!
//! Drives the router directly with `tower::ServiceExt::oneshot`; no socket
//! is bound.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use xdr_server::config::Config;
use xdr_server::{create_router, AppState};

fn app() -> Router {
    create_router(AppState::new(Config::default()))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn sample_rule() -> Value {
    json!({
        "name": "Suspicious login burst",
        "priority": 7.0,
        "conditions": [
            {"field": "auth.result", "operator": "equals", "value": "failure", "weight": 5.0},
            {"field": "auth.attempts", "operator": "greater", "value": 10, "weight": 3.0}
        ],
        "actions": [
            {"type": "alert", "target": "soc"}
        ]
    })
}

#[tokio::test]
async fn health_check() {
    let (status, body) = send(app(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn engine_overview_reports_simulated_event_volume() {
    let (status, body) = send(app(), get("/api/v1/xdr/detection-engine")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let total_events = body["data"]["metrics"]["totalEvents"]
        .as_u64()
        .expect("totalEvents should be a number");
    assert!((5000..15000).contains(&total_events));
    assert!(body["metadata"]["timestamp"].is_string());
}

#[tokio::test]
async fn create_rule_returns_id_and_stores_enabled_rule() {
    let app = app();

    let (status, body) = send(
        app.clone(),
        json_request(
            "POST",
            "/api/v1/xdr/detection-engine?action=rule",
            sample_rule(),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let id = body["data"]["id"].as_str().expect("id in response").to_string();

    let (status, body) = send(app, get("/api/v1/xdr/detection-engine?action=rules")).await;
    assert_eq!(status, StatusCode::OK);
    let rules = body["data"].as_array().unwrap();
    let created = rules.iter().find(|r| r["id"] == id.as_str()).unwrap();
    assert_eq!(created["enabled"], true);
    assert_eq!(created["name"], "Suspicious login burst");
}

#[tokio::test]
async fn create_rule_without_conditions_is_rejected() {
    let body = json!({"name": "empty", "priority": 5.0, "conditions": []});
    let (status, response) = send(
        app(),
        json_request("POST", "/api/v1/xdr/detection-engine?action=rule", body),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(response["error"].is_string());
    assert_eq!(response["status"], 400);
}

#[tokio::test]
async fn indicator_round_trip_includes_enrichment() {
    let app = app();

    let (status, body) = send(
        app.clone(),
        json_request(
            "POST",
            "/api/v1/xdr/detection-engine?action=indicator",
            json!({
                "type": "ip",
                "value": "198.51.100.77",
                "confidence": 0.9,
                "severity": "high",
                "source": "osint",
                "tags": ["c2"]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["value"], "198.51.100.77");
    assert!(body["data"]["context"]["geolocation"].is_string());
    assert!(body["data"]["context"]["firstSeen"].is_string());

    let (status, body) = send(app, get("/api/v1/xdr/detection-engine?action=indicators")).await;
    assert_eq!(status, StatusCode::OK);
    let indicators = body["data"].as_array().unwrap();
    assert!(indicators.iter().any(|i| i["value"] == "198.51.100.77"));
}

#[tokio::test]
async fn indicator_confidence_out_of_range_is_rejected() {
    let (status, _) = send(
        app(),
        json_request(
            "POST",
            "/api/v1/xdr/detection-engine?action=indicator",
            json!({
                "type": "ip",
                "value": "198.51.100.1",
                "confidence": 1.5,
                "severity": "low",
                "source": "osint"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn evaluate_event_matches_created_rule() {
    let app = app();

    let (_, body) = send(
        app.clone(),
        json_request(
            "POST",
            "/api/v1/xdr/detection-engine?action=rule",
            sample_rule(),
        ),
    )
    .await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        app,
        json_request(
            "POST",
            "/api/v1/xdr/detection-engine?action=evaluate",
            json!({"auth": {"result": "failure", "attempts": 25}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let matched = body["data"]["matchedRules"].as_array().unwrap();
    assert!(matched.iter().any(|m| m["id"] == id.as_str()));
    assert!(body["data"]["actionsDispatched"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn disable_rule_via_put() {
    let app = app();

    let (_, body) = send(
        app.clone(),
        json_request(
            "POST",
            "/api/v1/xdr/detection-engine?action=rule",
            sample_rule(),
        ),
    )
    .await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        app,
        json_request(
            "PUT",
            &format!("/api/v1/xdr/detection-engine?action=rule&id={}", id),
            json!({"enabled": false}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["enabled"], false);
}

#[tokio::test]
async fn delete_rule_then_404_on_second_delete() {
    let app = app();

    let (_, body) = send(
        app.clone(),
        json_request(
            "POST",
            "/api/v1/xdr/detection-engine?action=rule",
            sample_rule(),
        ),
    )
    .await;
    let id = body["data"]["id"].as_str().unwrap().to_string();
    let uri = format!("/api/v1/xdr/detection-engine?action=rule&id={}", id);

    let delete = |uri: String| {
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    };

    let (status, body) = send(app.clone(), delete(uri.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deleted"], true);

    let (status, _) = send(app, delete(uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_action_is_rejected() {
    let (status, body) = send(app(), get("/api/v1/xdr/detection-engine?action=bogus")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("bogus"));
}

#[tokio::test]
async fn put_without_id_is_rejected() {
    let (status, _) = send(
        app(),
        json_request(
            "PUT",
            "/api/v1/xdr/detection-engine?action=correlation-status",
            json!({"status": "resolved"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn correlation_appears_after_indicator_burst() {
    let app = app();

    for i in 0..3 {
        let (status, _) = send(
            app.clone(),
            json_request(
                "POST",
                "/api/v1/xdr/detection-engine?action=indicator",
                json!({
                    "type": "domain",
                    "value": format!("bad{}.example.com", i),
                    "confidence": 0.7,
                    "severity": "medium",
                    "source": "feed"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) =
        send(app, get("/api/v1/xdr/detection-engine?action=correlations")).await;
    assert_eq!(status, StatusCode::OK);
    let correlations = body["data"].as_array().unwrap();
    assert!(!correlations.is_empty());
    assert_eq!(correlations[0]["status"], "active");
}

#[tokio::test]
async fn risk_endpoint_requires_known_entity() {
    let app = app();

    let (status, _) = send(
        app.clone(),
        get("/api/v1/xdr/detection-engine?action=risk&entity=unknown-host"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        app.clone(),
        json_request(
            "POST",
            "/api/v1/xdr/detection-engine?action=observe",
            json!({
                "entityId": "host-9",
                "entityType": "host",
                "metrics": {"cpu": 12.5, "network": 2048.0}
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        app,
        get("/api/v1/xdr/detection-engine?action=risk&entity=host-9"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let score = body["data"]["riskScore"].as_f64().unwrap();
    assert!((0.0..=100.0).contains(&score));
}

#[tokio::test]
async fn network_flow_ingest_and_topology() {
    let app = app();

    let (status, body) = send(
        app.clone(),
        json_request(
            "POST",
            "/api/v1/xdr/network?action=flow",
            json!({
                "sourceIp": "10.0.0.5",
                "destIp": "10.0.0.9",
                "sourcePort": 51000,
                "destPort": 443,
                "protocol": "tcp",
                "bytesSent": 4096,
                "bytesReceived": 1024,
                "packets": 12
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["id"].is_string());

    let (status, body) = send(app.clone(), get("/api/v1/xdr/network?action=topology")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["nodes"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["edges"].as_array().unwrap().len(), 1);

    let (status, body) = send(app, get("/api/v1/xdr/network")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["metrics"]["flows"], 1);
}

#[tokio::test]
async fn lateral_movement_detected_after_admin_fanout() {
    let app = app();

    for target in ["10.0.1.1", "10.0.1.2", "10.0.1.3"] {
        let (status, _) = send(
            app.clone(),
            json_request(
                "POST",
                "/api/v1/xdr/network?action=flow",
                json!({
                    "sourceIp": "10.0.0.5",
                    "destIp": target,
                    "sourcePort": 51000,
                    "destPort": 445,
                    "protocol": "tcp",
                    "bytesSent": 512,
                    "bytesReceived": 256,
                    "packets": 4
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(app, get("/api/v1/xdr/network?action=lateral-movement")).await;
    assert_eq!(status, StatusCode::OK);
    let findings = body["data"].as_array().unwrap();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0]["mitreTechnique"], "T1021.002");
    assert_eq!(findings[0]["sourceHost"], "10.0.0.5");
}
