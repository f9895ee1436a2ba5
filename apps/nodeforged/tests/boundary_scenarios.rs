use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use nodeforged::state::AppState;
use nodeforge_store::StoreClient;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn test_state() -> AppState {
    let store = StoreClient::connect(":memory:", None).await.unwrap();
    AppState::new(
        store,
        "test-signing-key".to_string(),
        Some("admin-secret".to_string()),
        Duration::from_secs(3600),
        Duration::from_secs(120),
        Duration::from_secs(3600),
    )
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn register_then_login_succeeds() {
    let router = nodeforged::routes::build(test_state().await);

    let register_body = json!({
        "id": "n1", "name": "N1", "ipAddress": "192.168.1.10", "hardwareFingerprint": "HW1"
    });

    let response = router
        .clone()
        .oneshot(json_request("POST", "/api/auth/register", None, register_body.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["nodeId"], "n1");
    assert!(body["token"].is_string());

    // Duplicate registration conflicts.
    let response = router
        .clone()
        .oneshot(json_request("POST", "/api/auth/register", None, register_body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Login with the right fingerprint succeeds.
    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({"nodeId": "n1", "hardwareFingerprint": "HW1"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // Login with the wrong fingerprint is unauthorized.
    let response = router
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({"nodeId": "n1", "hardwareFingerprint": "WRONG"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invalid_inputs_are_rejected() {
    let router = nodeforged::routes::build(test_state().await);

    let cases = [
        json!({"id": "", "name": "N1", "ipAddress": "192.168.1.10", "hardwareFingerprint": "HW1"}),
        json!({"id": "n2", "name": "N2", "ipAddress": "999.999.999.999", "hardwareFingerprint": "HW1"}),
        json!({"id": "test@node#123!", "name": "N3", "ipAddress": "192.168.1.10", "hardwareFingerprint": "HW1"}),
    ];

    for body in cases {
        let response = router
            .clone()
            .oneshot(json_request("POST", "/api/auth/register", None, body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

async fn register_and_login(router: &axum::Router, id: &str) -> String {
    router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/register",
            None,
            json!({"id": id, "name": id, "ipAddress": "10.0.0.1", "hardwareFingerprint": "HW"}),
        ))
        .await
        .unwrap();

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({"nodeId": id, "hardwareFingerprint": "HW"}),
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn lock_contention_then_release_and_reacquire() {
    let router = nodeforged::routes::build(test_state().await);
    let token_a = register_and_login(&router, "node-a").await;
    let token_b = register_and_login(&router, "node-b").await;

    let acquire = |path: &str, node: &str, token: String| {
        let router = router.clone();
        let body = json!({"filePath": path, "nodeId": node});
        async move {
            router
                .oneshot(json_request("POST", "/api/filelocks/acquire", Some(&token), body))
                .await
                .unwrap()
        }
    };

    let response = acquire("Y:\\Data\\Shot01", "node-a", token_a.clone()).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = acquire("y:/data/shot01/", "node-b", token_b.clone()).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/filelocks/release",
            Some(&token_a),
            json!({"filePath": "Y:\\Data\\Shot01", "nodeId": "node-a"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = acquire("y:/data/shot01/", "node-b", token_b).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn concurrent_job_update_exactly_one_wins() {
    let router = nodeforged::routes::build(test_state().await);
    let token = register_and_login(&router, "node-a").await;

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/tasks",
            Some(&token),
            json!({"name": "pack-shard", "type": "render_thumbnails"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let job = body_json(response).await;
    let id = job["id"].as_i64().unwrap();

    let response = router
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/tasks/{id}"),
            Some(&token),
            json!({"status": "running", "rowVersion": 0}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let running = body_json(response).await;
    let row_version = running["row_version"].as_i64().unwrap();

    let first = router
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/tasks/{id}"),
            Some(&token),
            json!({"status": "completed", "rowVersion": row_version}),
        ))
        .await
        .unwrap();
    let second = router
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/tasks/{id}"),
            Some(&token),
            json!({"status": "completed", "rowVersion": row_version}),
        ))
        .await
        .unwrap();

    let statuses = [first.status(), second.status()];
    assert!(statuses.contains(&StatusCode::OK));
    assert!(statuses.contains(&StatusCode::CONFLICT));
}

#[tokio::test]
async fn assigning_a_job_to_an_unknown_node_is_rejected() {
    let router = nodeforged::routes::build(test_state().await);
    let token = register_and_login(&router, "node-a").await;

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/tasks",
            Some(&token),
            json!({"name": "pack-shard", "type": "render_thumbnails"}),
        ))
        .await
        .unwrap();
    let job = body_json(response).await;
    let id = job["id"].as_i64().unwrap();

    let response = router
        .oneshot(json_request(
            "PUT",
            &format!("/api/tasks/{id}"),
            Some(&token),
            json!({"assignedNodeId": "node-ghost"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn assigning_a_job_to_a_registered_node_sets_assigned_node_id() {
    let router = nodeforged::routes::build(test_state().await);
    let token = register_and_login(&router, "node-a").await;
    register_and_login(&router, "node-b").await;

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/tasks",
            Some(&token),
            json!({"name": "pack-shard", "type": "render_thumbnails"}),
        ))
        .await
        .unwrap();
    let job = body_json(response).await;
    let id = job["id"].as_i64().unwrap();

    let response = router
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/tasks/{id}"),
            Some(&token),
            json!({"assignedNodeId": "node-b"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await;
    assert_eq!(updated["assigned_node_id"], "node-b");

    let response = router
        .oneshot(json_request("GET", &format!("/api/tasks/{id}"), Some(&token), Value::Null))
        .await
        .unwrap();
    let job = body_json(response).await;
    assert_eq!(job["assigned_node_id"], "node-b");
}

#[tokio::test]
async fn folder_rollup_drives_job_completion() {
    let router = nodeforged::routes::build(test_state().await);
    let token = register_and_login(&router, "node-a").await;

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/tasks",
            Some(&token),
            json!({"name": "compress-volume", "type": "volume_compression"}),
        ))
        .await
        .unwrap();
    let job = body_json(response).await;
    let job_id = job["id"].as_i64().unwrap();

    for (path, name) in [("/f1", "f1"), ("/f2", "f2")] {
        let response = router
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/api/tasks/{job_id}/folders"),
                Some(&token),
                json!({"folderPath": path, "folderName": name}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = router
        .clone()
        .oneshot(json_request(
            "GET",
            &format!("/api/tasks/{job_id}/folders"),
            Some(&token),
            Value::Null,
        ))
        .await
        .unwrap();
    let folders = body_json(response).await;
    let folder_ids: Vec<i64> = folders.as_array().unwrap().iter().map(|f| f["id"].as_i64().unwrap()).collect();

    for folder_id in &folder_ids {
        let response = router
            .clone()
            .oneshot(json_request(
                "PUT",
                &format!("/api/folders/{folder_id}"),
                Some(&token),
                json!({"status": "completed", "progress": 1.0}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = router
        .clone()
        .oneshot(json_request("GET", &format!("/api/tasks/{job_id}"), Some(&token), Value::Null))
        .await
        .unwrap();
    let job = body_json(response).await;
    assert_eq!(job["status"], "completed");
}
