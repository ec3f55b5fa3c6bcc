//! # Graph MCP
//!
//! This crate provides an MCP (Model Context Protocol) server for Microsoft Graph,
//! built on the credential core in `graph-auth`.
//!
//! ## Overview
//!
//! The graph-mcp crate handles:
//! - **Tools**: Graph tool definitions and execution, with demo payloads when
//!   no real credential is configured
//! - **Tenant safety**: a confirmation guard in front of every mutating tool
//! - **Status**: on-demand credential validation with remediation suggestions
//! - **JSON-RPC**: MCP protocol implementation
//! - **HTTP**: the routes the server binary exposes
//!
//! ## MCP Protocol
//!
//! Supported methods:
//! - `initialize`: Initialize the MCP session
//! - `tools/list`: List available tools
//! - `tools/call`: Execute a tool
//!
//! Any other method is answered with `-32601`.
//!
//! ## Available Tools
//!
//! | Tool | Operation |
//! |------|-----------|
//! | `graph_users_list` | |
//! | `graph_users_create` | `user-create` |
//! | `graph_groups_create` | `group-create` |
//! | `graph_apps_list` | |
//! | `graph_apps_create` | `app-create` |
//! | `graph_auth_info` | |
//! | `graph_credential_status` | |
//! | `graph_tenant_check` | |
//!
//! A tool with an operation on a corporate tenant (or on any tenant when
//! `Security:RequireConfirmationForAllMutations` is set) fails with
//! [`McpServerError::ConfirmationRequired`] unless the call carries
//! `"confirm": true`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use graph_mcp::{AppState, McpRequest, ServerConfig};
//!
//! async fn handle(json: &str) -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::from_process()?;
//!     let state = AppState::from_config(&config).await;
//!
//!     let request: McpRequest = serde_json::from_str(json)?;
//!     let response = state.server.handle_request(request).await;
//!     println!("{}", serde_json::to_string(&response)?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod http;
pub mod server;
pub mod status;
pub mod tenant;
pub mod tools;
pub mod types;

// Re-export main types
pub use config::ServerConfig;
pub use http::{router, AppState};
pub use server::{McpServer, McpServerError, McpServerResult, Tool, ToolContext};
pub use status::{StatusReport, StatusService};
pub use tenant::{TenantCheck, TenantInfo, TenantInspector};
pub use types::{
    ContentBlock, GraphArea, McpError, McpRequest, McpResponse, RequestId, ServerInfo, ToolCall,
    ToolDefinition, ToolResult,
};

// Re-export tool collections
pub use tools::{admin_tools, all_tools, directory_tools, GraphBackend};
