//! Integration tests for the org chart backend.

use std::sync::Arc;

use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::config::Config;
use crate::db::{init_database, Repository};
use crate::{create_router, AppState};

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_psk(Some("test-api-key".to_string())).await
    }

    async fn with_psk(psk: Option<String>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        // Initialize database
        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let repo = Arc::new(Repository::new(pool));

        // Create config
        let config = Config {
            api_psk: psk.clone(),
            db_path,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            default_depth_window: 3,
        };

        let state = AppState {
            repo,
            config: Arc::new(config),
        };

        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        let mut client_builder = Client::builder();
        if let Some(key) = psk {
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert("x-api-key", key.parse().unwrap());
            client_builder = client_builder.default_headers(headers);
        }

        TestFixture {
            client: client_builder.build().unwrap(),
            base_url,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Create a seat through the API, returning its id.
    async fn create_seat(&self, title: &str, supervisor_seat_id: Option<&str>) -> String {
        let mut body = json!({
            "position": { "title": title, "roles": [] }
        });
        if let Some(supervisor) = supervisor_seat_id {
            body["supervisorSeatId"] = json!(supervisor);
        }

        let resp = self
            .client
            .post(self.url("/api/seats"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200, "seat creation failed for {}", title);
        let body: Value = resp.json().await.unwrap();
        body["data"]["id"].as_str().unwrap().to_string()
    }

    /// Seats A -> (B, C), B -> D. Returns (a, b, c, d).
    async fn seed_sample_forest(&self) -> (String, String, String, String) {
        let a = self.create_seat("CEO", None).await;
        let b = self.create_seat("CTO", Some(&a)).await;
        let c = self.create_seat("CFO", Some(&a)).await;
        let d = self.create_seat("Engineering Lead", Some(&b)).await;
        (a, b, c, d)
    }

    async fn get_tree(&self, query: &str) -> Value {
        let resp = self
            .client
            .get(self.url(&format!("/api/tree{}", query)))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        resp.json().await.unwrap()
    }
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_auth_missing_psk() {
    let fixture = TestFixture::new().await;

    // Request without API key
    let client = Client::new();
    let resp = client
        .get(fixture.url("/api/datastore"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_auth_invalid_psk() {
    let fixture = TestFixture::new().await;

    let client = Client::new();
    let resp = client
        .get(fixture.url("/api/datastore"))
        .header("x-api-key", "wrong-key")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_auth_disabled_without_psk() {
    let fixture = TestFixture::with_psk(None).await;

    let resp = fixture
        .client
        .get(fixture.url("/api/datastore"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_datastore_get() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/api/datastore"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert!(body["data"]["schemaVersion"].is_number());
    assert!(body["data"]["revisionId"].is_number());
    assert!(body["data"]["seats"].is_array());
    assert!(body["data"]["members"].is_array());
}

#[tokio::test]
async fn test_datastore_revision_increments_on_mutation() {
    let fixture = TestFixture::new().await;

    let before: Value = fixture
        .client
        .get(fixture.url("/api/datastore/revision"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    fixture.create_seat("CEO", None).await;

    let after: Value = fixture
        .client
        .get(fixture.url("/api/datastore/revision"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(after["data"]["revisionId"].as_i64() > before["data"]["revisionId"].as_i64());
}

#[tokio::test]
async fn test_member_crud() {
    let fixture = TestFixture::new().await;

    // Create member
    let create_resp = fixture
        .client
        .post(fixture.url("/api/members"))
        .json(&json!({
            "displayName": "Test User",
            "email": "test@example.com",
            "active": true,
            "admin": true
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(create_resp.status(), 200);
    let create_body: Value = create_resp.json().await.unwrap();
    assert_eq!(create_body["success"], true);
    let member_id = create_body["data"]["id"].as_str().unwrap();
    assert_eq!(create_body["data"]["displayName"], "Test User");
    assert_eq!(create_body["data"]["admin"], true);

    // Update member
    let update_resp = fixture
        .client
        .put(fixture.url(&format!("/api/members/{}", member_id)))
        .json(&json!({
            "displayName": "Updated User",
            "expectedVersion": 1
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(update_resp.status(), 200);
    let update_body: Value = update_resp.json().await.unwrap();
    assert_eq!(update_body["data"]["displayName"], "Updated User");
    assert_eq!(update_body["data"]["version"], 2);

    // List members
    let list_resp = fixture
        .client
        .get(fixture.url("/api/members"))
        .send()
        .await
        .unwrap();
    let list_body: Value = list_resp.json().await.unwrap();
    assert_eq!(list_body["data"].as_array().unwrap().len(), 1);

    // Delete member
    let delete_resp = fixture
        .client
        .delete(fixture.url(&format!("/api/members/{}", member_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(delete_resp.status(), 200);

    // Gone
    let get_resp = fixture
        .client
        .get(fixture.url(&format!("/api/members/{}", member_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(get_resp.status(), 404);
}

#[tokio::test]
async fn test_member_version_conflict() {
    let fixture = TestFixture::new().await;

    let create_body: Value = fixture
        .client
        .post(fixture.url("/api/members"))
        .json(&json!({ "displayName": "Someone" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let member_id = create_body["data"]["id"].as_str().unwrap();

    let resp = fixture
        .client
        .put(fixture.url(&format!("/api/members/{}", member_id)))
        .json(&json!({ "displayName": "Other", "expectedVersion": 7 }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VERSION_MISMATCH");
    assert_eq!(body["error"]["details"]["currentVersion"], 1);
}

#[tokio::test]
async fn test_role_crud() {
    let fixture = TestFixture::new().await;

    let create_body: Value = fixture
        .client
        .post(fixture.url("/api/roles"))
        .json(&json!({ "name": "Integrator", "description": "Runs the weekly meeting" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(create_body["success"], true);
    let role_id = create_body["data"]["id"].as_str().unwrap();
    assert_eq!(create_body["data"]["name"], "Integrator");

    let update_body: Value = fixture
        .client
        .put(fixture.url(&format!("/api/roles/{}", role_id)))
        .json(&json!({ "name": "Visionary", "expectedVersion": 1 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(update_body["data"]["name"], "Visionary");
    assert_eq!(update_body["data"]["version"], 2);

    let delete_resp = fixture
        .client
        .delete(fixture.url(&format!("/api/roles/{}", role_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(delete_resp.status(), 200);

    let list_body: Value = fixture
        .client
        .get(fixture.url("/api/roles"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(list_body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_role_name_rejected() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/roles"))
        .json(&json!({ "name": "  " }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_seat_crud() {
    let fixture = TestFixture::new().await;

    let a = fixture.create_seat("CEO", None).await;
    let b = fixture.create_seat("CTO", Some(&a)).await;

    // The supervisor's report list was updated in the same transaction
    let a_body: Value = fixture
        .client
        .get(fixture.url(&format!("/api/seats/{}", a)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(a_body["data"]["directReportIds"], json!([b.clone()]));

    // Edit position and members
    let update_body: Value = fixture
        .client
        .put(fixture.url(&format!("/api/seats/{}", b)))
        .json(&json!({
            "position": { "title": "VP Engineering", "roles": ["LT Member"] },
            "memberIds": ["m1"]
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(update_body["data"]["position"]["title"], "VP Engineering");
    assert_eq!(update_body["data"]["memberIds"], json!(["m1"]));

    // Leaf seats delete without a reassignment target
    let delete_resp = fixture
        .client
        .delete(fixture.url(&format!("/api/seats/{}", b)))
        .send()
        .await
        .unwrap();
    assert_eq!(delete_resp.status(), 200);

    let a_body: Value = fixture
        .client
        .get(fixture.url(&format!("/api/seats/{}", a)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(a_body["data"]["directReportIds"], json!([]));
}

#[tokio::test]
async fn test_create_seat_under_unknown_supervisor_rejected() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/seats"))
        .json(&json!({ "supervisorSeatId": "no-such-seat" }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);

    // The failed transaction must not have left a seat behind
    let list_body: Value = fixture
        .client
        .get(fixture.url("/api/seats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(list_body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_tree_depth_window() {
    let fixture = TestFixture::new().await;
    let (a, b, c, _d) = fixture.seed_sample_forest().await;

    let body = fixture.get_tree("?levels=2").await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["levels"], 2);
    assert_eq!(body["data"]["maxDepth"], 3);
    assert_eq!(body["data"]["roots"], json!([a.clone()]));

    let mut visible: Vec<String> = body["data"]["visibleSeatIds"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    visible.sort();
    let mut expected = vec![a.clone(), b.clone(), c.clone()];
    expected.sort();
    assert_eq!(visible, expected);

    // Depth window: expanded iff depth < level
    assert_eq!(body["data"]["expanded"][&a], true);
    assert_eq!(body["data"]["expanded"][&b], false);

    // Derived supervisor back-reference
    assert!(body["data"]["nodes"][&a]["supervisorId"].is_null());
    assert_eq!(body["data"]["nodes"][&b]["supervisorId"], json!(a));
}

#[tokio::test]
async fn test_tree_clamps_oversized_level() {
    let fixture = TestFixture::new().await;
    fixture.seed_sample_forest().await;

    let body = fixture.get_tree("?levels=99").await;
    assert_eq!(body["data"]["levels"], 3);
    assert_eq!(
        body["data"]["visibleSeatIds"].as_array().unwrap().len(),
        4
    );
}

#[tokio::test]
async fn test_tree_permissions_by_viewer() {
    let fixture = TestFixture::new().await;
    let (_a, b, c, d) = fixture.seed_sample_forest().await;

    let admin_body: Value = fixture
        .client
        .post(fixture.url("/api/members"))
        .json(&json!({ "displayName": "Admin", "admin": true }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let admin_id = admin_body["data"]["id"].as_str().unwrap().to_string();

    let user_body: Value = fixture
        .client
        .post(fixture.url("/api/members"))
        .json(&json!({ "displayName": "Lead" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let user_id = user_body["data"]["id"].as_str().unwrap().to_string();

    // The regular user occupies seat B
    fixture
        .client
        .put(fixture.url(&format!("/api/seats/{}", b)))
        .json(&json!({ "memberIds": [user_id.clone()] }))
        .send()
        .await
        .unwrap();

    // Admin sees full capabilities everywhere
    let body = fixture.get_tree(&format!("?userId={}", admin_id)).await;
    assert_eq!(body["data"]["nodes"][&d]["permissions"]["canDelete"], true);
    assert_eq!(body["data"]["nodes"][&c]["permissions"]["canEditTitle"], true);

    // The occupant manages the subtree below B, but not B's own supervisor link
    let body = fixture.get_tree(&format!("?userId={}", user_id)).await;
    assert_eq!(body["data"]["nodes"][&d]["permissions"]["canDelete"], true);
    assert_eq!(
        body["data"]["nodes"][&b]["permissions"]["canEditSupervisor"],
        false
    );
    assert_eq!(body["data"]["nodes"][&c]["permissions"]["canEditTitle"], false);

    // Anonymous viewers get nothing
    let body = fixture.get_tree("").await;
    assert_eq!(body["data"]["nodes"][&d]["permissions"]["canDelete"], false);
}

#[tokio::test]
async fn test_reparent_flow() {
    let fixture = TestFixture::new().await;
    let (a, _b, c, d) = fixture.seed_sample_forest().await;

    // Move D from B to C
    let resp = fixture
        .client
        .put(fixture.url(&format!("/api/seats/{}/supervisor", d)))
        .json(&json!({ "supervisorSeatId": c.clone() }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["focusSeatId"], json!(d.clone()));
    // New ancestor chain, root first, so the client can reveal the move
    assert_eq!(body["data"]["expandSeatIds"], json!([a, c.clone()]));

    let tree = fixture.get_tree("").await;
    assert_eq!(tree["data"]["nodes"][&d]["supervisorId"], json!(c));
}

#[tokio::test]
async fn test_reparent_to_current_supervisor_is_noop() {
    let fixture = TestFixture::new().await;
    let (_a, b, _c, d) = fixture.seed_sample_forest().await;

    let before: Value = fixture
        .client
        .get(fixture.url("/api/datastore/revision"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let resp = fixture
        .client
        .put(fixture.url(&format!("/api/seats/{}/supervisor", d)))
        .json(&json!({ "supervisorSeatId": b }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let after: Value = fixture
        .client
        .get(fixture.url("/api/datastore/revision"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // Nothing was written
    assert_eq!(
        before["data"]["revisionId"].as_i64(),
        after["data"]["revisionId"].as_i64()
    );
}

#[tokio::test]
async fn test_reparent_under_own_descendant_rejected() {
    let fixture = TestFixture::new().await;
    let (a, _b, _c, d) = fixture.seed_sample_forest().await;

    let resp = fixture
        .client
        .put(fixture.url(&format!("/api/seats/{}/supervisor", a)))
        .json(&json!({ "supervisorSeatId": d }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_reparent_detaches_into_new_root() {
    let fixture = TestFixture::new().await;
    let (a, b, _c, _d) = fixture.seed_sample_forest().await;

    let resp = fixture
        .client
        .put(fixture.url(&format!("/api/seats/{}/supervisor", b)))
        .json(&json!({ "supervisorSeatId": null }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let tree = fixture.get_tree("").await;
    let mut roots: Vec<String> = tree["data"]["roots"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    roots.sort();
    let mut expected = vec![a, b];
    expected.sort();
    assert_eq!(roots, expected);
}

#[tokio::test]
async fn test_supervisor_candidates_exclude_subtree() {
    let fixture = TestFixture::new().await;
    let (a, b, c, _d) = fixture.seed_sample_forest().await;

    let body: Value = fixture
        .client
        .get(fixture.url(&format!("/api/seats/{}/supervisor-candidates", b)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let mut candidates: Vec<String> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|seat| seat["id"].as_str().unwrap().to_string())
        .collect();
    candidates.sort();
    let mut expected = vec![a, c];
    expected.sort();
    assert_eq!(candidates, expected);
}

#[tokio::test]
async fn test_delete_seat_with_reports_requires_reassignment() {
    let fixture = TestFixture::new().await;
    let (a, b, c, d) = fixture.seed_sample_forest().await;

    // No target: refused
    let resp = fixture
        .client
        .delete(fixture.url(&format!("/api/seats/{}", b)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    // Target inside the subtree: refused
    let resp = fixture
        .client
        .delete(fixture.url(&format!("/api/seats/{}?reassignTo={}", b, d)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Valid target: the orphaned report moves to A
    let resp = fixture
        .client
        .delete(fixture.url(&format!("/api/seats/{}?reassignTo={}", b, a)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let tree = fixture.get_tree("").await;
    assert_eq!(tree["data"]["nodes"][&d]["supervisorId"], json!(a.clone()));
    assert!(tree["data"]["nodes"][&b].is_null());

    let mut below_a: Vec<String> = tree["data"]["nodes"][&a]["directReportIds"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    below_a.sort();
    let mut expected = vec![c, d];
    expected.sort();
    assert_eq!(below_a, expected);
}
