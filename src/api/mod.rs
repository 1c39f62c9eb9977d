//! REST API
//!
//! - `GET /health`: index size and model
//! - `POST /ask`: ranked cases for a free-text problem description

mod ask;
mod error;
mod health;

pub use ask::AskResponse;

use axum::Router;
use casebook_search::RetrievalEngine;
use std::sync::Arc;

/// Shared, read-only state for request handlers
pub struct AppContext {
    pub engine: RetrievalEngine,
    /// Match count used when a request omits `top_k`
    pub default_top_k: i64,
}

impl AppContext {
    pub fn new(engine: RetrievalEngine, default_top_k: i64) -> Self {
        Self {
            engine,
            default_top_k,
        }
    }
}

/// Create the API router
pub fn api_router(context: Arc<AppContext>) -> Router {
    Router::new()
        .merge(health::health_routes())
        .merge(ask::ask_routes())
        .with_state(context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use casebook_cases::Case;
    use casebook_search::{EmbeddingMatrix, EmbeddingProvider, Index, IndexRecord};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    /// Returns one preset vector, or fails when none is set
    struct StubEmbedder {
        vector: Option<Vec<f32>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for StubEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> casebook_search::Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.vector {
                Some(v) => Ok(texts.iter().map(|_| v.clone()).collect()),
                None => Err(casebook_search::Error::Embedding("connection refused".into())),
            }
        }

        fn dimensions(&self) -> Option<usize> {
            Some(2)
        }

        fn name(&self) -> &str {
            "stub"
        }

        fn model(&self) -> &str {
            "stub-model"
        }
    }

    fn printer_case() -> Case {
        let mut case = Case::new("PRN-001")
            .with_title("Printer jams")
            .with_summary("Paper jams on every print");
        case.triage_questions = vec!["Which tray?".to_string()];
        case.evidence_to_collect = vec!["Printer log".to_string()];
        case.resolution_steps = vec!["Clear the feed path".to_string()];
        case.owner_team = Some("facilities".to_string());
        case.severity = Some(json!("low"));
        case
    }

    fn setup(vector: Option<Vec<f32>>) -> (Router, Arc<StubEmbedder>) {
        let records = vec![
            IndexRecord::from_case(printer_case()),
            IndexRecord::from_case(Case::new("VPN-001").with_title("VPN drops")),
        ];
        let matrix = EmbeddingMatrix::from_rows(vec![vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        let index = Index::new(records, matrix, Some("stub-model".to_string())).unwrap();

        let provider = Arc::new(StubEmbedder {
            vector,
            calls: AtomicUsize::new(0),
        });
        let engine = RetrievalEngine::new(index, provider.clone());
        let router = api_router(Arc::new(AppContext::new(engine, 1)));
        (router, provider)
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn ask(body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/ask")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (router, _) = setup(Some(vec![1.0, 0.0]));
        let request = Request::get("/health").body(Body::empty()).unwrap();
        let (status, body) = send(router, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": true, "cases": 2, "model": "stub-model"}));
    }

    #[tokio::test]
    async fn test_ask_returns_best_match() {
        let (router, provider) = setup(Some(vec![1.0, 0.0]));
        let (status, body) = send(router, ask(r#"{"query": "  printer jam  "}"#)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["query"], "printer jam");
        assert_eq!(body["top_k"], 1);
        let matches = body["matches"].as_array().unwrap();
        assert_eq!(matches.len(), 1);

        let best = &matches[0];
        assert_eq!(best["id"], "PRN-001");
        assert_eq!(best["title"], "Printer jams");
        assert!((best["score"].as_f64().unwrap() - 1.0).abs() < 1e-6);
        assert_eq!(best["problem_summary"], "Paper jams on every print");
        assert_eq!(best["owner_team"], "facilities");
        assert_eq!(best["severity"], "low");
        assert_eq!(
            best["recommended_next"],
            json!({
                "triage_questions": ["Which tray?"],
                "evidence_to_collect": ["Printer log"],
                "resolution_steps": ["Clear the feed path"],
            })
        );
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ask_clamps_top_k() {
        let (router, _) = setup(Some(vec![0.0, 1.0]));
        let (status, body) = send(router, ask(r#"{"query": "vpn", "top_k": "50"}"#)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["top_k"], 10);
        let ids: Vec<&str> = body["matches"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["VPN-001", "PRN-001"]);
    }

    #[tokio::test]
    async fn test_empty_query_skips_embedding() {
        let (router, provider) = setup(None);
        let (status, body) = send(router, ask(r#"{"query": "   ", "top_k": 3}"#)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["matches"], json!([]));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let (router, _) = setup(Some(vec![1.0, 0.0]));
        let (status, body) = send(router, ask(r#"{"query": "#)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
        assert_eq!(body["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_missing_query_is_bad_request() {
        let (router, _) = setup(Some(vec![1.0, 0.0]));
        let (status, body) = send(router, ask(r#"{"top_k": 2}"#)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_invalid_top_k_is_validation_error() {
        let (router, provider) = setup(Some(vec![1.0, 0.0]));
        let (status, body) = send(router, ask(r#"{"query": "printer", "top_k": "lots"}"#)).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["ok"], false);
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_embedding_failure_is_service_unavailable() {
        let (router, _) = setup(None);
        let (status, body) = send(router, ask(r#"{"query": "printer"}"#)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            body,
            json!({"ok": false, "error": "embedding service unavailable", "code": "EMBEDDING_UNAVAILABLE"})
        );
    }

    #[tokio::test]
    async fn test_cors_allows_configured_origin_only() {
        let (router, _) = setup(Some(vec![1.0, 0.0]));
        let router = router.layer(crate::server::cors_layer(&[
            "http://localhost:5500".to_string()
        ]));

        let preflight = |origin: &str| {
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/ask")
                .header(header::ORIGIN, origin)
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap()
        };

        let allowed = router
            .clone()
            .oneshot(preflight("http://localhost:5500"))
            .await
            .unwrap();
        assert_eq!(
            allowed.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:5500"
        );

        let denied = router.oneshot(preflight("http://evil.example")).await.unwrap();
        assert!(!denied
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[tokio::test]
    async fn test_cors_wildcard_allows_any_origin() {
        let (router, _) = setup(Some(vec![1.0, 0.0]));
        let router = router.layer(crate::server::cors_layer(&["*".to_string()]));

        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/ask")
            .header(header::ORIGIN, "http://anywhere.example")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }
}
