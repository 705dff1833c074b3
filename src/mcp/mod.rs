//! JSON tool-call HTTP endpoint layer: one POST endpoint that dispatches by
//! `name`, matching what a thin wrapper process (not this crate's concern)
//! would translate to/from whatever protocol a given client speaks.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::engine::Engine;

const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "codetrace";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Clone)]
struct AppState {
    engine: Arc<Engine>,
}

pub fn router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/mcp", post(handle_mcp))
        .route("/health", axum::routing::get(health))
        .with_state(AppState { engine })
}

pub async fn serve(engine: Arc<Engine>, port: u16) -> anyhow::Result<()> {
    let router = router(engine);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "mcp server listening");
    axum::serve(listener, router).await?;
    Ok(())
}

#[derive(Deserialize)]
struct McpRequest {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Deserialize)]
struct ToolCallArgs {
    name: String,
    #[serde(default)]
    arguments: Value,
}

struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }
    fn not_found(message: impl Into<String>) -> Self {
        Self { status: StatusCode::NOT_FOUND, message: message.into() }
    }
    fn internal(message: impl Into<String>) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, message: message.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": { "message": self.message } }))).into_response()
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "version": SERVER_VERSION }))
}

async fn handle_mcp(
    State(state): State<AppState>,
    Json(request): Json<McpRequest>,
) -> Result<Json<Value>, ApiError> {
    match request.name.as_str() {
        "initialize" => Ok(Json(initialize_response())),
        "tools/list" => Ok(Json(tools_list_response())),
        "health" => Ok(Json(json!({ "status": "ok", "version": SERVER_VERSION }))),
        "tools/call" => {
            let call: ToolCallArgs = serde_json::from_value(request.arguments)
                .map_err(|e| ApiError::bad_request(format!("malformed tools/call body: {e}")))?;
            let result = dispatch_tool(&state.engine, &call.name, call.arguments).await?;
            Ok(Json(json!({
                "content": [{ "type": "text", "text": result.to_string() }]
            })))
        }
        other => Err(ApiError::not_found(format!("unknown method: {other}"))),
    }
}

fn initialize_response() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "serverInfo": { "name": SERVER_NAME, "version": SERVER_VERSION },
        "capabilities": { "tools": { "listChanged": false } },
    })
}

fn tools_list_response() -> Value {
    json!({
        "tools": [
            {
                "name": "index_repository",
                "description": "Index a repository: walk its files, parse code elements, build retrieval indexes.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "repo_path": { "type": "string" },
                        "force": { "type": "boolean", "default": false },
                        "no_embeddings": { "type": "boolean", "default": false },
                    },
                    "required": ["repo_path"],
                },
            },
            {
                "name": "query_codebase",
                "description": "Ask a natural-language question about the indexed repository.",
                "inputSchema": {
                    "type": "object",
                    "properties": { "question": { "type": "string" } },
                    "required": ["question"],
                },
            },
            {
                "name": "search_code",
                "description": "Run a hybrid BM25/vector search over indexed code elements.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "query": { "type": "string" },
                        "top_k": { "type": "integer", "default": 10 },
                    },
                    "required": ["query"],
                },
            },
        ]
    })
}

async fn dispatch_tool(engine: &Engine, name: &str, arguments: Value) -> Result<Value, ApiError> {
    match name {
        "index_repository" => {
            #[derive(Deserialize)]
            struct Args {
                repo_path: String,
                #[serde(default)]
                force: bool,
                #[serde(default)]
                no_embeddings: bool,
            }
            let args: Args = serde_json::from_value(arguments)
                .map_err(|e| ApiError::bad_request(format!("index_repository: {e}")))?;
            let result = engine
                .index(std::path::Path::new(&args.repo_path), args.force, args.no_embeddings)
                .await
                .map_err(|e| ApiError::internal(e.to_string()))?;
            serde_json::to_value(result).map_err(|e| ApiError::internal(e.to_string()))
        }
        "query_codebase" => {
            #[derive(Deserialize)]
            struct Args {
                question: String,
            }
            let args: Args = serde_json::from_value(arguments)
                .map_err(|e| ApiError::bad_request(format!("query_codebase: {e}")))?;
            let result =
                engine.query(&args.question).await.map_err(|e| ApiError::internal(e.to_string()))?;
            serde_json::to_value(result).map_err(|e| ApiError::internal(e.to_string()))
        }
        "search_code" => {
            #[derive(Deserialize)]
            struct Args {
                query: String,
                #[serde(default = "default_top_k")]
                top_k: usize,
            }
            fn default_top_k() -> usize {
                10
            }
            let args: Args = serde_json::from_value(arguments)
                .map_err(|e| ApiError::bad_request(format!("search_code: {e}")))?;
            let result = engine
                .search(&args.query, args.top_k)
                .await
                .map_err(|e| ApiError::internal(e.to_string()))?;
            serde_json::to_value(result).map_err(|e| ApiError::internal(e.to_string()))
        }
        other => Err(ApiError::not_found(format!("unknown tool: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_engine() -> Arc<Engine> {
        Arc::new(Engine::new(EngineConfig::default(), None, None))
    }

    #[tokio::test]
    async fn health_endpoint_reports_ok() {
        let app = router(test_engine());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn tools_call_with_unknown_tool_is_404() {
        let app = router(test_engine());
        let body = json!({ "name": "tools/call", "arguments": { "name": "nope", "arguments": {} } });
        let request = Request::builder()
            .method("POST")
            .uri("/mcp")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_method_is_404() {
        let app = router(test_engine());
        let body = json!({ "name": "not-a-method" });
        let request = Request::builder()
            .method("POST")
            .uri("/mcp")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn initialize_reports_protocol_version() {
        let app = router(test_engine());
        let body = json!({ "name": "initialize" });
        let request = Request::builder()
            .method("POST")
            .uri("/mcp")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
