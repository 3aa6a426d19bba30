use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{header, HeaderValue, StatusCode};
use axum_test::TestServer;
use divergent_flow::api::middleware::CorsPolicy;
use divergent_flow::api::{create_router, AppState};
use divergent_flow::app::{build_dispatcher, Services};
use divergent_flow::models::*;
use divergent_flow::projection::{projection_key, ProjectionWriter, Projector, RedisProjection};
use serde_json::{json, Value};

fn server_with(services: Services) -> TestServer {
    let dispatcher = build_dispatcher(&services).expect("Failed to build dispatcher");
    let cors = CorsPolicy::new(&["http://localhost:5173", "https://*.vercel.app"]).layer();
    let app = create_router(AppState::new(dispatcher), cors);
    TestServer::new(app).expect("Failed to create test server")
}

fn setup() -> TestServer {
    server_with(Services::in_memory())
}

async fn create_capture(server: &TestServer, text: &str) -> Capture {
    server
        .post("/api/captures")
        .json(&json!({ "text": text }))
        .await
        .json::<Capture>()
}

mod captures {
    use super::*;

    #[tokio::test]
    async fn list_is_empty_initially() {
        let server = setup();

        let response = server.get("/api/captures").await;

        response.assert_status_ok();
        let captures: Vec<Capture> = response.json();
        assert!(captures.is_empty());
    }

    #[tokio::test]
    async fn long_text_is_created() {
        let server = setup();
        let text = "a".repeat(4001);

        let response = server
            .post("/api/captures")
            .json(&json!({ "text": text }))
            .await;

        response.assert_status(StatusCode::CREATED);
        assert_eq!(response.json::<Capture>().text, text);
    }

    #[tokio::test]
    async fn create_returns_201_with_generated_fields_and_location() {
        let server = setup();

        let response = server
            .post("/api/captures")
            .json(&json!({ "text": "hello" }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let capture: Capture = response.json();
        assert!(!capture.id.is_empty());
        assert_eq!(capture.text, "hello");
        assert!(capture.created_at > 0);
        assert!(capture.inferred_type.is_none());
        assert!(capture.type_confidence.is_none());

        let location = response.header(header::LOCATION);
        assert_eq!(location, format!("/api/captures/{}", capture.id).as_str());
    }

    #[tokio::test]
    async fn created_capture_can_be_fetched() {
        let server = setup();
        let created = create_capture(&server, "hello").await;

        let response = server.get(&format!("/api/captures/{}", created.id)).await;

        response.assert_status_ok();
        assert_eq!(response.json::<Capture>(), created);
    }

    #[tokio::test]
    async fn response_uses_camel_case_fields() {
        let server = setup();

        let body: Value = server
            .post("/api/captures")
            .json(&json!({ "text": "call mum", "inferredType": "reminder", "typeConfidence": 80 }))
            .await
            .json();

        assert_eq!(body["inferredType"], "reminder");
        assert_eq!(body["typeConfidence"], 80.0);
        assert!(body["createdAt"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn list_keeps_insertion_order() {
        let server = setup();
        create_capture(&server, "first").await;
        create_capture(&server, "second").await;
        create_capture(&server, "third").await;

        let captures: Vec<Capture> = server.get("/api/captures").await.json();

        let texts: Vec<_> = captures.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn get_unknown_id_is_404_with_empty_body() {
        let server = setup();

        let response = server.get("/api/captures/does-not-exist").await;

        response.assert_status_not_found();
        assert!(response.text().is_empty());
    }

    #[tokio::test]
    async fn update_replaces_text_and_keeps_identity() {
        let server = setup();
        let created = create_capture(&server, "draft").await;

        let response = server
            .put(&format!("/api/captures/{}", created.id))
            .json(&json!({ "text": "final" }))
            .await;

        response.assert_status_ok();
        let updated: Capture = response.json();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.text, "final");

        let fetched: Capture = server
            .get(&format!("/api/captures/{}", created.id))
            .await
            .json();
        assert_eq!(fetched, updated);
    }

    #[tokio::test]
    async fn update_keeps_classification_when_omitted() {
        let server = setup();
        let created: Capture = server
            .post("/api/captures")
            .json(&json!({ "text": "buy milk", "inferredType": "action", "typeConfidence": 50 }))
            .await
            .json();

        let updated: Capture = server
            .put(&format!("/api/captures/{}", created.id))
            .json(&json!({ "text": "buy oat milk" }))
            .await
            .json();

        assert_eq!(updated.inferred_type.as_deref(), Some("action"));
        assert_eq!(updated.type_confidence, Some(50.0));
    }

    #[tokio::test]
    async fn update_unknown_id_is_404_and_changes_nothing() {
        let server = setup();
        create_capture(&server, "keep me").await;

        let response = server
            .put("/api/captures/does-not-exist")
            .json(&json!({ "text": "new" }))
            .await;

        response.assert_status_not_found();
        let captures: Vec<Capture> = server.get("/api/captures").await.json();
        assert_eq!(captures.len(), 1);
        assert_eq!(captures[0].text, "keep me");
    }

    #[tokio::test]
    async fn delete_returns_204_then_404() {
        let server = setup();
        let created = create_capture(&server, "temporary").await;
        let path = format!("/api/captures/{}", created.id);

        let response = server.delete(&path).await;
        response.assert_status(StatusCode::NO_CONTENT);
        assert!(response.text().is_empty());

        server.get(&path).await.assert_status_not_found();
        server.delete(&path).await.assert_status_not_found();
    }
}

mod validation {
    use super::*;

    #[tokio::test]
    async fn empty_text_is_rejected_with_problem_body() {
        let server = setup();

        let response = server
            .post("/api/captures")
            .json(&json!({ "text": "" }))
            .await;

        response.assert_status_bad_request();
        let body: Value = response.json();
        assert_eq!(
            body,
            json!({
                "title": "Validation failed",
                "status": 400,
                "errors": { "Text": ["Text is required"] }
            })
        );
    }

    #[tokio::test]
    async fn missing_text_is_reported_like_empty_text() {
        let server = setup();

        let response = server.post("/api/captures").json(&json!({})).await;

        response.assert_status_bad_request();
        let body: Value = response.json();
        assert_eq!(body["errors"]["Text"], json!(["Text is required"]));
    }

    #[tokio::test]
    async fn every_failing_field_is_reported() {
        let server = setup();

        let response = server
            .post("/api/captures")
            .json(&json!({ "text": "   ", "typeConfidence": -1 }))
            .await;

        response.assert_status_bad_request();
        let body: Value = response.json();
        let errors = body["errors"].as_object().unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors["Text"], json!(["Text is required"]));
        assert_eq!(
            errors["TypeConfidence"],
            json!(["TypeConfidence must be between 0 and 100"])
        );
    }

    #[tokio::test]
    async fn rejected_create_stores_nothing() {
        let server = setup();

        server
            .post("/api/captures")
            .json(&json!({ "text": "" }))
            .await
            .assert_status_bad_request();

        let captures: Vec<Capture> = server.get("/api/captures").await.json();
        assert!(captures.is_empty());
    }

    #[tokio::test]
    async fn update_with_empty_text_is_rejected_before_lookup() {
        let server = setup();

        let response = server
            .put("/api/captures/does-not-exist")
            .json(&json!({ "text": "" }))
            .await;

        response.assert_status_bad_request();
    }

    #[tokio::test]
    async fn malformed_json_never_reaches_dispatch() {
        let server = setup();

        let response = server
            .post("/api/captures")
            .content_type("application/json")
            .bytes("{not json".into())
            .await;

        assert!(response.status_code().is_client_error());
        assert_ne!(response.status_code(), StatusCode::CREATED);
    }
}

mod items {
    use super::*;

    #[tokio::test]
    async fn items_and_captures_are_the_same_entity() {
        let server = setup();

        let response = server
            .post("/api/items")
            .json(&json!({ "text": "via items" }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let item: Capture = response.json();

        let capture: Capture = server
            .get(&format!("/api/captures/{}", item.id))
            .await
            .json();
        assert_eq!(capture, item);

        server
            .delete(&format!("/api/items/{}", item.id))
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .get(&format!("/api/captures/{}", item.id))
            .await
            .assert_status_not_found();
    }
}

mod collections {
    use super::*;

    #[tokio::test]
    async fn crud_round_trip() {
        let server = setup();
        let capture = create_capture(&server, "milk").await;

        let response = server
            .post("/api/collections")
            .json(&json!({ "name": "Errands", "itemIds": [capture.id] }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let created: Collection = response.json();
        assert_eq!(created.name, "Errands");
        assert_eq!(created.item_ids, vec![capture.id.clone()]);
        assert_eq!(
            response.header(header::LOCATION),
            format!("/api/collections/{}", created.id).as_str()
        );

        let path = format!("/api/collections/{}", created.id);
        let renamed: Collection = server
            .put(&path)
            .json(&json!({ "name": "Weekend" }))
            .await
            .json();
        assert_eq!(renamed.name, "Weekend");
        assert_eq!(renamed.item_ids, created.item_ids);
        assert_eq!(renamed.created_at, created.created_at);

        let all: Vec<Collection> = server.get("/api/collections").await.json();
        assert_eq!(all, vec![renamed]);

        server.delete(&path).await.assert_status(StatusCode::NO_CONTENT);
        server.get(&path).await.assert_status_not_found();
    }

    #[tokio::test]
    async fn blank_name_is_rejected() {
        let server = setup();

        let response = server
            .post("/api/collections")
            .json(&json!({ "name": " " }))
            .await;

        response.assert_status_bad_request();
        let body: Value = response.json();
        assert_eq!(body["errors"]["Name"], json!(["Name is required"]));
    }

    #[tokio::test]
    async fn update_unknown_collection_is_404() {
        let server = setup();

        server
            .put("/api/collections/nope")
            .json(&json!({ "name": "Anything" }))
            .await
            .assert_status_not_found();
    }
}

mod type_inference {
    use super::*;

    #[tokio::test]
    async fn infer_returns_fixed_classification() {
        let server = setup();

        let response = server
            .post("/api/type-inference/infer")
            .json(&json!({ "text": "buy milk" }))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body, json!({ "inferredType": "action", "confidence": 50.0 }));
    }

    #[tokio::test]
    async fn infer_empty_text_is_400() {
        let server = setup();

        let response = server
            .post("/api/type-inference/infer")
            .json(&json!({ "text": "" }))
            .await;

        response.assert_status_bad_request();
        let body: Value = response.json();
        assert_eq!(body["errors"]["Text"], json!(["Text is required"]));
    }

    #[tokio::test]
    async fn confirm_accepts_complete_correction_with_empty_body() {
        let server = setup();

        let response = server
            .post("/api/type-inference/confirm")
            .json(&json!({
                "text": "buy milk",
                "inferredType": "action",
                "inferredConfidence": 50.0,
                "confirmedType": "reminder"
            }))
            .await;

        response.assert_status_ok();
        assert!(response.text().is_empty());
    }

    #[tokio::test]
    async fn confirm_rejects_out_of_range_confidence() {
        let server = setup();

        let response = server
            .post("/api/type-inference/confirm")
            .json(&json!({
                "text": "buy milk",
                "inferredType": "action",
                "inferredConfidence": 150.0,
                "confirmedType": "reminder"
            }))
            .await;

        response.assert_status_bad_request();
        let body: Value = response.json();
        assert_eq!(
            body["errors"],
            json!({ "InferredConfidence": ["InferredConfidence must be between 0 and 100"] })
        );
    }

    #[tokio::test]
    async fn confirm_does_not_create_captures() {
        let server = setup();

        server
            .post("/api/type-inference/confirm")
            .json(&json!({
                "text": "buy milk",
                "inferredType": "action",
                "inferredConfidence": 50.0,
                "confirmedType": "note"
            }))
            .await
            .assert_status_ok();

        let captures: Vec<Capture> = server.get("/api/captures").await.json();
        assert!(captures.is_empty());
    }
}

mod projection {
    use super::*;

    /// Never finishes a write.
    struct Stalled;

    #[async_trait]
    impl ProjectionWriter for Stalled {
        async fn sync_capture(&self, _capture: &Capture) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        async fn sync_collection(&self, _collection: &Collection) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        async fn forget(&self, _kind: &'static str, _id: &str) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
    }

    /// Mirrors the remote store in a map. Every `SET` is slow.
    #[derive(Default)]
    struct SlowMirror {
        entries: std::sync::Mutex<std::collections::HashMap<String, String>>,
    }

    #[async_trait]
    impl ProjectionWriter for SlowMirror {
        async fn sync_capture(&self, capture: &Capture) {
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.entries
                .lock()
                .unwrap()
                .insert(projection_key("capture", &capture.id), capture.text.clone());
        }
        async fn sync_collection(&self, collection: &Collection) {
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.entries.lock().unwrap().insert(
                projection_key("collection", &collection.id),
                collection.name.clone(),
            );
        }
        async fn forget(&self, kind: &'static str, id: &str) {
            self.entries.lock().unwrap().remove(&projection_key(kind, id));
        }
    }

    #[tokio::test]
    async fn deleted_capture_does_not_linger_in_the_projection() {
        let mirror = Arc::new(SlowMirror::default());
        let projector = Projector::new(mirror.clone());
        let server = server_with(Services::in_memory().with_projector(projector.clone()));

        let capture = create_capture(&server, "hello").await;
        server
            .delete(&format!("/api/captures/{}", capture.id))
            .await
            .assert_status(StatusCode::NO_CONTENT);
        projector.flush().await;

        assert!(mirror.entries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn projection_ends_with_the_latest_revision() {
        let mirror = Arc::new(SlowMirror::default());
        let projector = Projector::new(mirror.clone());
        let server = server_with(Services::in_memory().with_projector(projector.clone()));

        let capture = create_capture(&server, "draft").await;
        let path = format!("/api/captures/{}", capture.id);
        server
            .put(&path)
            .json(&json!({ "text": "final" }))
            .await
            .assert_status_ok();
        let collection: Collection = server
            .post("/api/collections")
            .json(&json!({ "name": "Errands", "itemIds": [capture.id] }))
            .await
            .json();
        server
            .delete(&format!("/api/collections/{}", collection.id))
            .await
            .assert_status(StatusCode::NO_CONTENT);
        projector.flush().await;

        let entries = mirror.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[&projection_key("capture", &capture.id)], "final");
    }

    #[tokio::test]
    async fn unreachable_remote_store_does_not_change_outcomes() {
        let redis = RedisProjection::new("http://127.0.0.1:9", "token");
        let server =
            server_with(Services::in_memory().with_projector(Projector::new(Arc::new(redis))));

        let response = server
            .post("/api/captures")
            .json(&json!({ "text": "still saved" }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let capture: Capture = response.json();

        let path = format!("/api/captures/{}", capture.id);
        server
            .put(&path)
            .json(&json!({ "text": "still updated" }))
            .await
            .assert_status_ok();
        server.delete(&path).await.assert_status(StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn responses_do_not_wait_for_the_projection() {
        let server =
            server_with(Services::in_memory().with_projector(Projector::new(Arc::new(Stalled))));

        let response = tokio::time::timeout(
            Duration::from_secs(5),
            server
                .post("/api/captures")
                .json(&json!({ "text": "fast" }))
                .into_future(),
        )
        .await
        .expect("create waited on the projection");

        response.assert_status(StatusCode::CREATED);
    }
}

mod cors {
    use super::*;

    #[tokio::test]
    async fn allowed_preview_origin_is_echoed() {
        let server = setup();

        let response = server
            .get("/api/health")
            .add_header(
                header::ORIGIN,
                HeaderValue::from_static("https://flow-git-feature.vercel.app"),
            )
            .await;

        response.assert_status_ok();
        assert_eq!(
            response.header(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            "https://flow-git-feature.vercel.app"
        );
    }

    #[tokio::test]
    async fn unknown_origin_gets_no_allow_header() {
        let server = setup();

        let response = server
            .get("/api/health")
            .add_header(header::ORIGIN, HeaderValue::from_static("https://evil.example"))
            .await;

        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }
}

mod health {
    use super::*;

    #[tokio::test]
    async fn reports_ok() {
        let server = setup();

        let response = server.get("/api/health").await;

        response.assert_status_ok();
        response.assert_json(&json!({ "status": "ok" }));
    }
}
