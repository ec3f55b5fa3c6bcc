//! MCP server implementation
//!
//! This module provides the MCP server that exposes Microsoft Graph tools
//! and enforces the tenant confirmation policy before any mutating tool runs.

use crate::types::*;
use async_trait::async_trait;
use graph_auth::{OperationKind, TenantPolicy};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

/// MCP server error types.
#[derive(Debug, Error)]
pub enum McpServerError {
    /// Tool not found
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Tool execution failed
    #[error("Tool execution failed: {0}")]
    ExecutionError(String),

    /// Invalid parameters
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// Mutating call on a tenant that needs explicit confirmation
    #[error("Operation '{operation}' on tenant {tenant_id} requires explicit confirmation; retry with \"confirm\": true")]
    ConfirmationRequired {
        /// Tool name
        tool: String,
        /// Operation kind
        operation: OperationKind,
        /// Target tenant
        tenant_id: String,
    },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl McpServerError {
    /// JSON-RPC error code for this error.
    pub fn code(&self) -> i32 {
        match self {
            McpServerError::ToolNotFound(_) | McpServerError::InvalidParams(_) => {
                McpError::INVALID_PARAMS
            }
            McpServerError::ConfirmationRequired { .. } => McpError::CONFIRMATION_REQUIRED,
            McpServerError::ExecutionError(_) | McpServerError::Internal(_) => {
                McpError::INTERNAL_ERROR
            }
        }
    }

    /// Convert into a JSON-RPC error object.
    pub fn to_mcp_error(&self) -> McpError {
        let error = McpError::new(self.code(), self.to_string());
        match self {
            McpServerError::ConfirmationRequired {
                tool,
                operation,
                tenant_id,
            } => error.with_data(serde_json::json!({
                "tool": tool,
                "operation": operation,
                "tenantId": tenant_id,
            })),
            _ => error,
        }
    }
}

/// Result type for MCP server operations.
pub type McpServerResult<T> = Result<T, McpServerError>;

/// Trait for tool implementations.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool definition.
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with given arguments.
    async fn execute(
        &self,
        args: serde_json::Value,
        context: &ToolContext,
    ) -> McpServerResult<ToolResult>;
}

/// Context for tool execution.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Tenant the call targets
    pub tenant_id: Option<String>,

    /// Caller already confirmed high-risk operations
    pub confirmed: bool,

    /// Request correlation ID
    pub correlation_id: String,
}

impl ToolContext {
    /// Create an empty context with a fresh correlation ID.
    pub fn empty() -> Self {
        Self {
            tenant_id: None,
            confirmed: false,
            correlation_id: uuid::Uuid::now_v7().to_string(),
        }
    }

    /// Target a tenant.
    pub fn with_tenant(mut self, tenant_id: Option<String>) -> Self {
        self.tenant_id = tenant_id;
        self
    }

    /// Mark high-risk operations as confirmed.
    pub fn confirmed(mut self) -> Self {
        self.confirmed = true;
        self
    }
}

/// Whether the arguments carry `"confirm": true`.
fn confirmed_in_args(args: &serde_json::Value) -> bool {
    args.get("confirm")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false)
}

/// MCP server for Microsoft Graph.
pub struct McpServer {
    /// Name and version
    info: ServerInfo,

    /// Registered tools
    tools: Arc<RwLock<HashMap<String, Arc<dyn Tool>>>>,

    /// Tenant confirmation policy
    policy: Arc<TenantPolicy>,

    /// Tenant of the resolved credential
    tenant_id: Option<String>,
}

impl McpServer {
    /// Create a new MCP server.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        policy: Arc<TenantPolicy>,
        tenant_id: Option<String>,
    ) -> Self {
        Self {
            info: ServerInfo {
                name: name.into(),
                version: version.into(),
            },
            tools: Arc::new(RwLock::new(HashMap::new())),
            policy,
            tenant_id,
        }
    }

    /// Create with the default server identity.
    pub fn graph(policy: Arc<TenantPolicy>, tenant_id: Option<String>) -> Self {
        Self::new("darbot-graph-mcp", env!("CARGO_PKG_VERSION"), policy, tenant_id)
    }

    /// Register a tool.
    pub async fn register_tool(&self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name;
        let mut tools = self.tools.write().await;
        tools.insert(name, tool);
    }

    /// Register multiple tools.
    pub async fn register_tools(&self, tools: Vec<Arc<dyn Tool>>) {
        for tool in tools {
            self.register_tool(tool).await;
        }
    }

    /// Get all tool definitions, sorted by name.
    pub async fn list_tools(&self) -> Vec<ToolDefinition> {
        let tools = self.tools.read().await;
        let mut definitions: Vec<_> = tools.values().map(|t| t.definition()).collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Context for a call against the configured tenant.
    pub fn default_context(&self) -> ToolContext {
        ToolContext::empty().with_tenant(self.tenant_id.clone())
    }

    /// Execute a tool.
    #[instrument(skip(self, arguments, context), fields(correlation_id = %context.correlation_id))]
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
        context: &ToolContext,
    ) -> McpServerResult<ToolResult> {
        let tool = {
            let tools = self.tools.read().await;
            tools
                .get(name)
                .cloned()
                .ok_or_else(|| McpServerError::ToolNotFound(name.to_string()))?
        };

        if let Some(operation) = tool.definition().operation {
            let tenant_id = context
                .tenant_id
                .as_deref()
                .or(self.tenant_id.as_deref())
                .unwrap_or_default();

            if self.policy.requires_confirmation(tenant_id, operation.as_str())
                && !context.confirmed
                && !confirmed_in_args(&arguments)
            {
                warn!(tool = name, %operation, tenant_id, "Blocked unconfirmed high-risk operation");
                return Err(McpServerError::ConfirmationRequired {
                    tool: name.to_string(),
                    operation,
                    tenant_id: tenant_id.to_string(),
                });
            }
        }

        debug!(tool = name, "Executing tool");
        tool.execute(arguments, context).await
    }

    /// Handle an MCP request.
    pub async fn handle_request(&self, request: McpRequest) -> McpResponse {
        match request.method.as_str() {
            "initialize" => self.handle_initialize(request.id),
            "tools/list" => self.handle_tools_list(request.id).await,
            "tools/call" => self.handle_tools_call(request.id, request.params).await,
            _ => McpResponse::error(request.id, McpError::method_not_found(&request.method)),
        }
    }

    fn handle_initialize(&self, id: RequestId) -> McpResponse {
        McpResponse::success(
            id,
            serde_json::json!({
                "protocolVersion": "2024-11-05",
                "capabilities": { "tools": { "listChanged": false } },
                "serverInfo": self.info
            }),
        )
    }

    async fn handle_tools_list(&self, id: RequestId) -> McpResponse {
        let tools = self.list_tools().await;
        McpResponse::success(id, serde_json::json!({ "tools": tools }))
    }

    async fn handle_tools_call(
        &self,
        id: RequestId,
        params: Option<serde_json::Value>,
    ) -> McpResponse {
        let params = match params {
            Some(p) => p,
            None => return McpResponse::error(id, McpError::invalid_params("Missing params")),
        };

        let call: ToolCall = match serde_json::from_value(params) {
            Ok(c) => c,
            Err(e) => return McpResponse::error(id, McpError::invalid_params(e.to_string())),
        };

        let context = self.default_context();

        match self.call_tool(&call.name, call.arguments, &context).await {
            Ok(result) => match serde_json::to_value(result) {
                Ok(value) => McpResponse::success(id, value),
                Err(e) => McpResponse::error(id, McpError::internal_error(e.to_string())),
            },
            Err(e) => McpResponse::error(id, e.to_mcp_error()),
        }
    }

    /// Get server info.
    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// Tenant of the resolved credential.
    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }
}
