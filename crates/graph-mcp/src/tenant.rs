//! Tenant inspection ahead of mutating operations.
//!
//! Reads the organization record of the signed-in tenant and applies the
//! [`TenantPolicy`]. Any failure to reach the directory yields a safe demo
//! result: never corporate, never asking for confirmation.

use chrono::{DateTime, Utc};
use graph_auth::{DirectoryClient, DirectoryResult, OperationKind, TenantPolicy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Tenant ID reported when the directory is unreachable.
pub const DEMO_TENANT_ID: &str = "demo-tenant-id";

/// Organization record of the current tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantInfo {
    /// Tenant ID
    pub id: String,
    /// Organization display name
    pub display_name: String,
    /// Tenant type, e.g. `AAD`
    pub tenant_type: String,
    /// On the corporate allowlist
    pub is_corporate: bool,
    /// When the record was read
    pub validation_time: DateTime<Utc>,
}

impl TenantInfo {
    fn demo() -> Self {
        Self {
            id: DEMO_TENANT_ID.to_string(),
            display_name: "Demo Mode".to_string(),
            tenant_type: "Demo".to_string(),
            is_corporate: false,
            validation_time: Utc::now(),
        }
    }
}

/// Outcome of checking a tenant for an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantCheck {
    /// The check completed
    pub is_valid: bool,
    /// The tenant is on the corporate allowlist
    pub is_corporate: bool,
    /// The operation needs explicit confirmation
    pub requires_confirmation: bool,
    /// Tenant ID
    pub tenant_id: String,
    /// Organization display name
    pub tenant_name: String,
    /// Warning for corporate tenants
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// Messages to show the operator
    pub security_messages: Vec<String>,
}

fn string_field(value: &serde_json::Value, name: &str, fallback: &str) -> String {
    value
        .get(name)
        .and_then(serde_json::Value::as_str)
        .unwrap_or(fallback)
        .to_string()
}

/// Reads tenant details and applies the confirmation policy.
#[derive(Clone)]
pub struct TenantInspector {
    directory: Arc<dyn DirectoryClient>,
    policy: Arc<TenantPolicy>,
}

impl TenantInspector {
    /// Create an inspector.
    pub fn new(directory: Arc<dyn DirectoryClient>, policy: Arc<TenantPolicy>) -> Self {
        Self { directory, policy }
    }

    /// The confirmation policy in use.
    pub fn policy(&self) -> &TenantPolicy {
        &self.policy
    }

    async fn fetch_tenant(&self) -> DirectoryResult<Option<TenantInfo>> {
        let Some(org) = self.directory.organization().await? else {
            return Ok(None);
        };

        let id = string_field(&org, "id", "unknown");

        Ok(Some(TenantInfo {
            is_corporate: self.policy.is_high_sensitivity_tenant(&id),
            display_name: string_field(&org, "displayName", "Unknown Organization"),
            tenant_type: string_field(&org, "tenantType", "Unknown"),
            id,
            validation_time: Utc::now(),
        }))
    }

    /// Current tenant, or the demo record when the directory is unreachable.
    #[instrument(skip(self))]
    pub async fn current_tenant(&self) -> TenantInfo {
        match self.fetch_tenant().await {
            Ok(Some(tenant)) => tenant,
            Ok(None) => {
                warn!("Directory returned no organization record, operating in demo mode");
                TenantInfo::demo()
            }
            Err(e) => {
                warn!(error = %e, "Could not retrieve tenant information, operating in demo mode");
                TenantInfo::demo()
            }
        }
    }

    /// Check the current tenant before running `operation`.
    #[instrument(skip(self))]
    pub async fn validate_for_operation(&self, operation: &str) -> TenantCheck {
        let tenant = match self.fetch_tenant().await {
            Ok(Some(tenant)) => tenant,
            Ok(None) => return Self::demo_check(),
            Err(e) => {
                warn!(error = %e, operation, "Failed to validate tenant, operating in demo mode");
                return Self::demo_check();
            }
        };

        let requires_confirmation = self.policy.requires_confirmation(&tenant.id, operation);
        let mut messages = Vec::new();
        let mut warning = None;

        if tenant.is_corporate {
            messages.push("CORPORATE TENANT DETECTED".to_string());
            messages.push(format!(
                "Operating in corporate tenant: {}",
                tenant.display_name
            ));
            warning = Some(
                "This operation will affect a CORPORATE production environment. Exercise extreme caution."
                    .to_string(),
            );
        }

        if requires_confirmation {
            messages.push("CONFIRMATION REQUIRED".to_string());
            messages.push(format!(
                "High-risk operation '{}' requires explicit confirmation",
                operation
            ));
        }

        if OperationKind::parse(operation).is_some() {
            messages.push(format!("High-risk operation: {}", operation));
        }

        info!(
            operation,
            tenant_id = %tenant.id,
            tenant_name = %tenant.display_name,
            "Tenant validation completed"
        );

        TenantCheck {
            is_valid: true,
            is_corporate: tenant.is_corporate,
            requires_confirmation,
            tenant_id: tenant.id,
            tenant_name: tenant.display_name,
            warning,
            security_messages: messages,
        }
    }

    fn demo_check() -> TenantCheck {
        TenantCheck {
            is_valid: true,
            is_corporate: false,
            requires_confirmation: false,
            tenant_id: DEMO_TENANT_ID.to_string(),
            tenant_name: "Demo Mode (No Azure AD Connection)".to_string(),
            warning: None,
            security_messages: vec!["Demo Mode - No real tenant validation".to_string()],
        }
    }
}
