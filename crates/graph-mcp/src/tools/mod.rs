//! Microsoft Graph MCP tools
//!
//! Directory tools for users, groups and app registrations, plus admin
//! tools that report on authentication and tenant safety.

pub mod admin;
pub mod directory;

pub use admin::*;
pub use directory::*;

use crate::server::Tool;
use crate::status::StatusService;
use crate::tenant::TenantInspector;
use graph_auth::{AuthenticationMethod, DirectoryClient, GraphConnector, ResolvedAuthentication};
use std::sync::Arc;

/// Directory access shared by every tool.
#[derive(Clone)]
pub struct GraphBackend {
    /// Resolved authentication method
    pub method: AuthenticationMethod,

    /// Tenant of the resolved credential
    pub tenant_id: Option<String>,

    /// Directory client bound to the resolved credential
    pub directory: Arc<dyn DirectoryClient>,
}

impl GraphBackend {
    /// Bind a directory client to the resolved credential.
    pub fn from_resolved(resolved: &ResolvedAuthentication, connector: &GraphConnector) -> Self {
        Self {
            method: resolved.method,
            tenant_id: resolved.tenant_id.clone(),
            directory: Arc::new(connector.client_for(resolved.credential.clone())),
        }
    }

    /// Serve canned demo payloads instead of calling Graph.
    pub fn is_demo(&self) -> bool {
        !self.method.is_configured()
    }

    /// Short description of the authentication state.
    pub fn auth_info(&self) -> String {
        if self.is_demo() {
            "No authentication configured".to_string()
        } else {
            format!("Authentication configured: {}", self.method)
        }
    }
}

/// Get all available MCP tools.
///
/// - Users: list and create
/// - Groups: create
/// - Applications: list and create
/// - Diagnostics: authentication info, credential status and tenant check
pub fn all_tools(
    backend: Arc<GraphBackend>,
    status: Arc<StatusService>,
    inspector: Arc<TenantInspector>,
) -> Vec<Arc<dyn Tool>> {
    let mut tools = Vec::new();

    // Directory tools (5)
    tools.extend(directory_tools(backend.clone()));

    // Admin tools (3)
    tools.extend(admin_tools(backend, status, inspector));

    tools
}
