//! JSON HTTP API.
//!
//! Lets a browser front end upload rows, then ask questions about them.
//! The server holds one [`Pipeline`]; each `POST /ingest` replaces its index
//! as a whole.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (version, index readiness) |
//! | `POST` | `/ingest` | Build the index from `{headers, rows}` or `{csv}` |
//! | `POST` | `/retrieve` | Top-k rows for `{query, top_k?}` |
//! | `POST` | `/ask` | Answer `{query}`; credential from `Authorization: Bearer` |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "index_not_ready", "message": "no index has been built yet; ingest rows first" } }
//! ```

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

use csv_rag_core::error::RagError;
use csv_rag_core::models::{Answer, IngestSummary, RetrievalResult, Table};
use csv_rag_core::pipeline::Pipeline;
use csv_rag_core::retrieve::RetrievalParams;

use crate::ask::{ask_with_retry, build_pipeline};
use crate::config::Config;
use crate::table::read_csv;

#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
    max_retries: u32,
}

/// Starts the HTTP server on `[server].bind`. Runs until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pipeline = Arc::new(build_pipeline(config)?);
    let app = router(pipeline, config.generation.max_retries);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "csvrag server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the router around an existing pipeline.
pub fn router(pipeline: Arc<Pipeline>, max_retries: u32) -> Router {
    let state = AppState {
        pipeline,
        max_retries,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/ingest", post(handle_ingest))
        .route("/retrieve", post(handle_retrieve))
        .route("/ask", post(handle_ask))
        .layer(cors)
        .with_state(state)
}

// ============ Error handling ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl AppError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request".to_string(),
            message: message.into(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::bad_request(rejection.body_text())
    }
}

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        let status = match &err {
            RagError::EmptyCorpus
            | RagError::EmptyQuery
            | RagError::NoColumnsSelected
            | RagError::UnknownColumn(_)
            | RagError::InvalidTopK => StatusCode::BAD_REQUEST,
            RagError::IndexNotReady => StatusCode::CONFLICT,
            RagError::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
            RagError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            RagError::GenerationTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            RagError::GenerationFailed { .. } => StatusCode::BAD_GATEWAY,
            RagError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            RagError::EmbedderMismatch { .. }
            | RagError::EmbeddingDimensionMismatch { .. }
            | RagError::DuplicateDocumentId(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = %self.code, message = %self.message, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

// ============ Handlers ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    ready: bool,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        ready: state.pipeline.is_ready(),
    })
}

#[derive(Deserialize)]
struct IngestRequest {
    /// Raw CSV text; alternative to `headers` + `rows`.
    #[serde(default)]
    csv: Option<String>,
    #[serde(default)]
    headers: Vec<String>,
    #[serde(default)]
    rows: Vec<Vec<String>>,
    /// Columns to index; all columns when omitted.
    #[serde(default)]
    columns: Option<Vec<String>>,
}

async fn handle_ingest(
    State(state): State<AppState>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<Json<IngestSummary>, AppError> {
    let Json(req) = payload?;
    let table = match req.csv {
        Some(text) => read_csv(text.as_bytes())
            .map_err(|e| AppError::bad_request(format!("invalid CSV: {:#}", e)))?,
        None => Table::new(req.headers, req.rows),
    };
    let columns = req.columns.unwrap_or_else(|| table.headers.clone());

    let summary = state.pipeline.ingest(&table, &columns).await?;
    tracing::info!(documents = summary.documents, model = %summary.model, "index rebuilt");
    Ok(Json(summary))
}

#[derive(Deserialize)]
struct RetrieveRequest {
    query: String,
    #[serde(default)]
    top_k: Option<usize>,
}

async fn handle_retrieve(
    State(state): State<AppState>,
    payload: Result<Json<RetrieveRequest>, JsonRejection>,
) -> Result<Json<RetrievalResult>, AppError> {
    let Json(req) = payload?;
    let params = RetrievalParams {
        top_k: req.top_k.unwrap_or(state.pipeline.params().top_k),
        ..*state.pipeline.params()
    };
    let result = state.pipeline.retrieve_with(&req.query, &params).await?;
    Ok(Json(result))
}

#[derive(Deserialize)]
struct AskRequest {
    query: String,
}

async fn handle_ask(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<Answer>, AppError> {
    let Json(req) = payload?;
    let credential = bearer_token(&headers).ok_or_else(|| AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "missing_credential".to_string(),
        message: "Authorization: Bearer <api key> is required".to_string(),
    })?;

    let answer = ask_with_retry(
        &state.pipeline,
        &req.query,
        &credential,
        state.max_retries,
        Duration::from_secs(1),
    )
    .await?;
    Ok(Json(answer))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use csv_rag_core::embedding::Embedder;
    use csv_rag_core::generate::{ChatMessage, CompletionClient};

    /// Embeds by counting a few keywords, enough to rank the test rows.
    struct KeywordEmbedder;

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        fn model_name(&self) -> &str {
            "keywords"
        }
        fn dims(&self) -> usize {
            3
        }
        async fn embed(&self, texts: &[String]) -> csv_rag_core::Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let t = t.to_lowercase();
                    vec![
                        t.matches("fruit").count() as f32 + 0.1,
                        t.matches("yellow").count() as f32,
                        t.matches("vehicle").count() as f32,
                    ]
                })
                .collect())
        }
    }

    struct EchoCompletion;

    #[async_trait]
    impl CompletionClient for EchoCompletion {
        fn model_name(&self) -> &str {
            "echo"
        }
        async fn complete(
            &self,
            messages: &[ChatMessage],
            credential: &str,
        ) -> csv_rag_core::Result<String> {
            if credential != "good" {
                return Err(RagError::AuthenticationFailed("401".into()));
            }
            Ok(messages[1].content.clone())
        }
    }

    async fn spawn_app() -> String {
        let pipeline = Arc::new(Pipeline::new(
            Arc::new(KeywordEmbedder),
            Arc::new(EchoCompletion),
        ));
        let app = router(pipeline, 0);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_ask_before_ingest_is_conflict() {
        let base = spawn_app().await;
        let resp = reqwest::Client::new()
            .post(format!("{}/ask", base))
            .bearer_auth("good")
            .json(&serde_json::json!({"query": "what is yellow?"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 409);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "index_not_ready");
    }

    #[tokio::test]
    async fn test_ingest_then_ask_and_retrieve() {
        let base = spawn_app().await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{}/ingest", base))
            .json(&serde_json::json!({
                "csv": "name,color,kind\napple,red,fruit\ncar,blue,vehicle\nbanana,yellow,fruit\n"
            }))
            .send()
            .await
            .unwrap();
        assert!(resp.status().is_success());
        let summary: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(summary["documents"], 3);

        let health: serde_json::Value = client
            .get(format!("{}/health", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["ready"], true);

        let hits: serde_json::Value = client
            .post(format!("{}/retrieve", base))
            .json(&serde_json::json!({"query": "yellow fruit", "top_k": 2}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let hits = hits["hits"].as_array().unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0]["document"]["id"], 2);

        let answer: serde_json::Value = client
            .post(format!("{}/ask", base))
            .bearer_auth("good")
            .json(&serde_json::json!({"query": "yellow fruit"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let text = answer["text"].as_str().unwrap();
        assert!(text.contains("Question: yellow fruit"));
        assert!(text.contains("banana | yellow | fruit"));
    }

    #[tokio::test]
    async fn test_ask_error_statuses() {
        let base = spawn_app().await;
        let client = reqwest::Client::new();
        client
            .post(format!("{}/ingest", base))
            .json(&serde_json::json!({
                "headers": ["name"],
                "rows": [["banana"]]
            }))
            .send()
            .await
            .unwrap();

        let missing = client
            .post(format!("{}/ask", base))
            .json(&serde_json::json!({"query": "x"}))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status().as_u16(), 401);

        let bad_key = client
            .post(format!("{}/ask", base))
            .bearer_auth("bad")
            .json(&serde_json::json!({"query": "x"}))
            .send()
            .await
            .unwrap();
        assert_eq!(bad_key.status().as_u16(), 401);
        let body: serde_json::Value = bad_key.json().await.unwrap();
        assert_eq!(body["error"]["code"], "authentication_failed");

        let empty = client
            .post(format!("{}/ask", base))
            .bearer_auth("good")
            .json(&serde_json::json!({"query": "  "}))
            .send()
            .await
            .unwrap();
        assert_eq!(empty.status().as_u16(), 400);
    }

    #[tokio::test]
    async fn test_ingest_empty_rows_is_bad_request() {
        let base = spawn_app().await;
        let resp = reqwest::Client::new()
            .post(format!("{}/ingest", base))
            .json(&serde_json::json!({"headers": ["a"], "rows": []}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 400);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "empty_corpus");
    }

    #[tokio::test]
    async fn test_malformed_bodies_use_error_envelope() {
        let base = spawn_app().await;
        let client = reqwest::Client::new();

        let syntax = client
            .post(format!("{}/retrieve", base))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(syntax.status().as_u16(), 400);
        let body: serde_json::Value = syntax.json().await.unwrap();
        assert_eq!(body["error"]["code"], "bad_request");
        assert!(body["error"]["message"].is_string());

        let missing_field = client
            .post(format!("{}/ask", base))
            .bearer_auth("good")
            .json(&serde_json::json!({"question": "x"}))
            .send()
            .await
            .unwrap();
        assert_eq!(missing_field.status().as_u16(), 400);
        let body: serde_json::Value = missing_field.json().await.unwrap();
        assert_eq!(body["error"]["code"], "bad_request");

        let no_content_type = client
            .post(format!("{}/ingest", base))
            .body(r#"{"csv": "a\n1\n"}"#)
            .send()
            .await
            .unwrap();
        assert_eq!(no_content_type.status().as_u16(), 400);
        let body: serde_json::Value = no_content_type.json().await.unwrap();
        assert_eq!(body["error"]["code"], "bad_request");
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, "Bearer  sk-1 ".parse().unwrap());
        assert_eq!(bearer_token(&headers).as_deref(), Some("sk-1"));
        headers.insert(AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
    }
}
