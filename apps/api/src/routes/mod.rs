pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::matching::handlers as matching;
use crate::mcp::handlers as mcp;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // MCP loop
        .route(
            "/api/v1/mcp",
            post(mcp::handle_mcp).options(mcp::handle_preflight),
        )
        // Direct scoring
        .route("/api/v1/fit-score", post(matching::handle_fit_score))
        .route("/api/v1/gaps", post(matching::handle_gaps))
        .route("/api/v1/batch-score", post(matching::handle_batch_score))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::LoopSettings;
    use crate::fakes::{FakeLlm, FakeStore};
    use crate::models::talent::RequirementKind;
    use crate::session::MemorySessionStore;

    fn app(store: Arc<FakeStore>) -> Router {
        let llm = Arc::new(FakeLlm::scripted(
            None,
            Some(r#"{"message": "Here is what I found."}"#),
        ));
        let state = AppState::new(
            store,
            llm,
            Arc::new(MemorySessionStore::new()),
            LoopSettings::default(),
        );
        build_router(state)
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(Arc::new(FakeStore::default()))
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["service"], "talent-api");
    }

    #[tokio::test]
    async fn test_candidate_without_profile_is_400_and_touches_nothing() {
        let store = Arc::new(FakeStore::default());
        let response = app(store.clone())
            .oneshot(post_json("/api/v1/mcp", r#"{"mode": "candidate"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["errorCode"], "VALIDATION_ERROR");
        assert!(body["data"]["chatResponse"]["message"].is_string());
        assert_eq!(store.call_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_body_is_validation_error() {
        let response = app(Arc::new(FakeStore::default()))
            .oneshot(post_json("/api/v1/mcp", r#"{"mode": "#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["errorCode"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_preflight_is_bare_200() {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/v1/mcp")
            .body(Body::empty())
            .unwrap();
        let response = app(Arc::new(FakeStore::default()))
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_general_mode_round_trip() {
        let response = app(Arc::new(FakeStore::default()))
            .oneshot(post_json(
                "/api/v1/mcp",
                r#"{"mode": "general", "context": {"lastMessage": "hello"}}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["mode"], "general");
        assert_eq!(body["data"]["chatResponse"]["message"], "Here is what I found.");
        assert_eq!(body["data"]["nextActions"][0]["type"], "clarifying_question");
    }

    #[tokio::test]
    async fn test_fit_score_endpoint() {
        let mut store = FakeStore::default();
        store.add_requirement("r1", RequirementKind::Skill, "sql", "Data", "Adept");
        store.add_level("p1", RequirementKind::Skill, "sql", "Adept");
        store.add_similarity("p1", "r1", 0.5);

        let response = app(Arc::new(store))
            .oneshot(post_json(
                "/api/v1/fit-score",
                r#"{"profileId": "p1", "roleId": "r1"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        // 40 + 30 + 15
        assert_eq!(body["score"], 85);
        assert_eq!(body["summary"], "Excellent fit");
    }

    #[tokio::test]
    async fn test_gaps_endpoint_requires_both_ids() {
        let response = app(Arc::new(FakeStore::default()))
            .oneshot(post_json("/api/v1/gaps", r#"{"profileId": "p1"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_batch_score_endpoint_caps_pool() {
        let candidates: Vec<String> = (1..=20).map(|i| format!("p{i}")).collect();
        let body = json!({
            "anchorType": "role",
            "anchorId": "r1",
            "candidateIds": candidates,
            "maxConcurrent": 5,
            "maxCandidates": 10
        });
        let response = app(Arc::new(FakeStore::default()))
            .oneshot(post_json("/api/v1/batch-score", &body.to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["results"].as_array().unwrap().len(), 10);
        assert_eq!(body["failed"], 0);
    }
}
