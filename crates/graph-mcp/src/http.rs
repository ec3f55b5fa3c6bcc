//! HTTP surface.
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `GET /health` | liveness and the active authentication method |
//! | `GET /status` | credential validation, run on demand |
//! | `GET /tools` | tool definitions |
//! | `POST /call-tool` | `{name, arguments}` tool call |
//! | `POST /mcp` | MCP JSON-RPC |

use crate::config::ServerConfig;
use crate::server::{McpServer, McpServerError};
use crate::status::{StatusReport, StatusService};
use crate::tenant::TenantInspector;
use crate::tools::{all_tools, GraphBackend};
use crate::types::{
    McpError, McpRequest, McpResponse, RequestId, ToolCall, ToolDefinition, ToolResult,
};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use graph_auth::{AuthenticationResolver, CredentialValidator};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// MCP server with registered tools
    pub server: Arc<McpServer>,
    /// Credential status service
    pub status: Arc<StatusService>,
}

impl AppState {
    /// Resolve the credential and register every tool. Performs no network I/O.
    pub async fn from_config(config: &ServerConfig) -> Self {
        let connector = config.connector();
        let resolver = AuthenticationResolver::new(connector.credential_options());
        let resolved = resolver.resolve(&config.credentials);
        let policy = Arc::new(config.security.policy());

        let backend = Arc::new(GraphBackend::from_resolved(&resolved, &connector));
        let inspector = Arc::new(TenantInspector::new(
            backend.directory.clone(),
            policy.clone(),
        ));
        let validator = CredentialValidator::new(Arc::new(connector), config.validator.clone());
        let status = Arc::new(StatusService::new(
            validator,
            config.credentials.clone(),
            resolved.method,
        ));

        let corporate_tenants = policy.corporate_tenant_count();
        let server = Arc::new(McpServer::graph(policy, resolved.tenant_id.clone()));
        server
            .register_tools(all_tools(backend, status.clone(), inspector))
            .await;
        info!(method = %resolved.method, corporate_tenants, "MCP server ready");

        Self { server, status }
    }
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/tools", get(list_tools))
        .route("/call-tool", post(call_tool))
        .route("/mcp", post(mcp))
        .with_state(state)
}

/// Tool call failure rendered as an HTTP error.
struct ToolCallError(McpServerError);

impl IntoResponse for ToolCallError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            McpServerError::ToolNotFound(_) => StatusCode::NOT_FOUND,
            McpServerError::InvalidParams(_) => StatusCode::BAD_REQUEST,
            McpServerError::ConfirmationRequired { .. } => StatusCode::CONFLICT,
            McpServerError::ExecutionError(_) | McpServerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(self.0.to_mcp_error())).into_response()
    }
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": state.server.info().name,
        "version": state.server.info().version,
        "authenticationMethod": state.status.method(),
        "timestamp": Utc::now().to_rfc3339()
    }))
}

async fn status(State(state): State<AppState>) -> Json<StatusReport> {
    Json(state.status.check().await)
}

async fn list_tools(State(state): State<AppState>) -> Json<Vec<ToolDefinition>> {
    Json(state.server.list_tools().await)
}

async fn call_tool(
    State(state): State<AppState>,
    Json(call): Json<ToolCall>,
) -> Result<Json<ToolResult>, ToolCallError> {
    debug!(tool = %call.name, "HTTP tool call");
    let context = state.server.default_context();
    state
        .server
        .call_tool(&call.name, call.arguments, &context)
        .await
        .map(Json)
        .map_err(ToolCallError)
}

/// JSON-RPC endpoint. The body is parsed by hand so malformed JSON gets a
/// JSON-RPC parse error instead of an HTTP rejection.
async fn mcp(State(state): State<AppState>, body: String) -> Json<McpResponse> {
    let value: serde_json::Value = match serde_json::from_str(&body) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Malformed JSON-RPC body");
            return Json(McpResponse::error(RequestId::Null, McpError::parse_error()));
        }
    };

    let id = value
        .get("id")
        .cloned()
        .and_then(|id| serde_json::from_value::<RequestId>(id).ok())
        .unwrap_or_default();

    match serde_json::from_value::<McpRequest>(value) {
        Ok(request) => Json(state.server.handle_request(request).await),
        Err(_) => Json(McpResponse::error(id, McpError::invalid_request())),
    }
}
