//! Admin MCP tools
//!
//! Read-only diagnostics: which credential the server runs with, whether it
//! validates, and what the tenant safety policy says about an operation.

use super::GraphBackend;
use crate::server::{McpServerError, McpServerResult, Tool, ToolContext};
use crate::status::StatusService;
use crate::tenant::TenantInspector;
use crate::types::{GraphArea, ToolDefinition, ToolResult};
use async_trait::async_trait;
use graph_auth::OperationKind;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::instrument;

fn to_result<T: serde::Serialize>(value: &T) -> McpServerResult<ToolResult> {
    serde_json::to_value(value)
        .map(ToolResult::json)
        .map_err(|e| McpServerError::Internal(e.to_string()))
}

/// Tool reporting the resolved authentication method.
pub struct AuthInfoTool {
    backend: Arc<GraphBackend>,
}

impl AuthInfoTool {
    /// Create the tool.
    pub fn new(backend: Arc<GraphBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for AuthInfoTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "graph_auth_info",
            "Show the authentication method and tenant the server uses",
        )
        .with_area(GraphArea::Diagnostics)
    }

    async fn execute(&self, _args: Value, _context: &ToolContext) -> McpServerResult<ToolResult> {
        Ok(ToolResult::json(json!({
            "authenticationMethod": self.backend.method,
            "isConfigured": !self.backend.is_demo(),
            "tenantId": self.backend.tenant_id,
            "message": self.backend.auth_info()
        })))
    }
}

/// Tool running credential validation on demand.
pub struct CredentialStatusTool {
    status: Arc<StatusService>,
}

impl CredentialStatusTool {
    /// Create the tool.
    pub fn new(status: Arc<StatusService>) -> Self {
        Self { status }
    }
}

#[async_trait]
impl Tool for CredentialStatusTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "graph_credential_status",
            "Validate the configured Azure AD credentials and suggest fixes",
        )
        .with_area(GraphArea::Diagnostics)
        .with_permissions(["Application.Read.All", "User.Read.All"])
    }

    #[instrument(skip(self, _args, _context), fields(tool = "graph_credential_status"))]
    async fn execute(&self, _args: Value, _context: &ToolContext) -> McpServerResult<ToolResult> {
        let report = self.status.check().await;
        to_result(&report)
    }
}

/// Tool checking the tenant before a high-risk operation.
pub struct TenantCheckTool {
    inspector: Arc<TenantInspector>,
}

impl TenantCheckTool {
    /// Create the tool.
    pub fn new(inspector: Arc<TenantInspector>) -> Self {
        Self { inspector }
    }
}

#[derive(Debug, Deserialize)]
struct TenantCheckParams {
    operation: String,
}

#[async_trait]
impl Tool for TenantCheckTool {
    fn definition(&self) -> ToolDefinition {
        let operations: Vec<&str> = OperationKind::all().iter().map(|op| op.as_str()).collect();

        ToolDefinition::new(
            "graph_tenant_check",
            "Check whether an operation on the current tenant needs confirmation",
        )
        .with_area(GraphArea::Diagnostics)
        .with_schema(json!({
            "type": "object",
            "properties": {
                "operation": {
                    "type": "string",
                    "description": "Operation to check",
                    "examples": operations
                }
            },
            "required": ["operation"]
        }))
        .with_permissions(["Organization.Read.All"])
    }

    #[instrument(skip(self, args, _context), fields(tool = "graph_tenant_check"))]
    async fn execute(&self, args: Value, _context: &ToolContext) -> McpServerResult<ToolResult> {
        let params: TenantCheckParams = serde_json::from_value(args)
            .map_err(|e| McpServerError::InvalidParams(e.to_string()))?;

        let check = self
            .inspector
            .validate_for_operation(params.operation.trim())
            .await;
        to_result(&check)
    }
}

/// All admin tools.
pub fn admin_tools(
    backend: Arc<GraphBackend>,
    status: Arc<StatusService>,
    inspector: Arc<TenantInspector>,
) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(AuthInfoTool::new(backend)),
        Arc::new(CredentialStatusTool::new(status)),
        Arc::new(TenantCheckTool::new(inspector)),
    ]
}
