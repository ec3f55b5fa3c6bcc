//! Tenant safety rules
//!
//! Pure predicates over static configuration: GUID format, placeholder
//! detection, and the corporate tenant policy consulted before mutating
//! operations. Nothing in this module performs I/O.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;

/// The all-zero GUID used by unconfigured templates and the demo credential.
pub const ZERO_GUID: &str = "00000000-0000-0000-0000-000000000000";

/// Literal client secret shipped in configuration templates.
pub const PLACEHOLDER_SECRET: &str = "placeholder-secret";

/// Marker of an unresolved editor input prompt, e.g. `${input:tenantId}`.
pub const INPUT_PROMPT_MARKER: &str = "${input:";

/// Microsoft corporate tenant, always treated as high-sensitivity.
pub const MICROSOFT_CORPORATE_TENANT: &str = "72f988bf-86f1-41af-91ab-2d7cd011db47";

/// Syntactically valid GUIDs that must never be accepted as a real tenant.
const PLACEHOLDER_TENANTS: &[&str] = &[
    ZERO_GUID,
    "11111111-1111-1111-1111-111111111111",
    "ffffffff-ffff-ffff-ffff-ffffffffffff",
    "12345678-1234-1234-1234-123456789012",
];

fn guid_regex() -> &'static Regex {
    static GUID: OnceLock<Regex> = OnceLock::new();
    GUID.get_or_init(|| {
        Regex::new(
            r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
        )
        .expect("static GUID pattern")
    })
}

/// Check the 8-4-4-4-12 hex GUID shape. Braces, whitespace and the
/// hyphenless form are rejected.
pub fn is_valid_guid(value: &str) -> bool {
    guid_regex().is_match(value)
}

/// Whether a tenant ID is one of the known placeholder values.
pub fn is_placeholder_tenant(tenant_id: &str) -> bool {
    let tenant_id = tenant_id.trim();
    PLACEHOLDER_TENANTS
        .iter()
        .any(|p| p.eq_ignore_ascii_case(tenant_id))
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

/// Whether the triple looks like real, deliberately configured credentials.
///
/// GUID format is not checked here so that a malformed tenant is reported
/// as invalid rather than silently treated as demo mode.
pub fn are_credentials_configured(
    tenant_id: Option<&str>,
    client_id: Option<&str>,
    client_secret: Option<&str>,
) -> bool {
    if is_blank(tenant_id) || is_blank(client_id) || is_blank(client_secret) {
        return false;
    }
    let tenant_id = tenant_id.unwrap_or_default();
    let client_id = client_id.unwrap_or_default();
    let client_secret = client_secret.unwrap_or_default();

    !is_placeholder_tenant(tenant_id)
        && !client_id.trim().eq_ignore_ascii_case(ZERO_GUID)
        && client_secret != PLACEHOLDER_SECRET
}

/// Whether any field still contains an unresolved `${input:...}` prompt.
pub fn is_vscode_input_prompt(
    tenant_id: Option<&str>,
    client_id: Option<&str>,
    client_secret: Option<&str>,
) -> bool {
    [tenant_id, client_id, client_secret]
        .into_iter()
        .flatten()
        .any(|v| v.contains(INPUT_PROMPT_MARKER))
}

/// Mutating operations that count as high risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    /// Create an application registration.
    AppCreate,
    /// Create a user.
    UserCreate,
    /// Create a group.
    GroupCreate,
    /// Assign a directory role.
    RoleAssign,
    /// Grant an API permission.
    PermissionGrant,
}

impl OperationKind {
    /// All high-risk operations.
    pub fn all() -> &'static [OperationKind] {
        &[
            OperationKind::AppCreate,
            OperationKind::UserCreate,
            OperationKind::GroupCreate,
            OperationKind::RoleAssign,
            OperationKind::PermissionGrant,
        ]
    }

    /// Wire name of the operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::AppCreate => "app-create",
            OperationKind::UserCreate => "user-create",
            OperationKind::GroupCreate => "group-create",
            OperationKind::RoleAssign => "role-assign",
            OperationKind::PermissionGrant => "permission-grant",
        }
    }

    /// Parse an operation name. Unknown names are not high risk.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "app-create" => Some(OperationKind::AppCreate),
            "user-create" => Some(OperationKind::UserCreate),
            "group-create" => Some(OperationKind::GroupCreate),
            "role-assign" => Some(OperationKind::RoleAssign),
            "permission-grant" => Some(OperationKind::PermissionGrant),
            _ => None,
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Corporate tenant allowlist and confirmation policy.
///
/// Loaded once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct TenantPolicy {
    corporate_tenants: HashSet<String>,
    require_confirmation_for_all: bool,
}

impl Default for TenantPolicy {
    fn default() -> Self {
        Self::new(Vec::<String>::new(), false)
    }
}

impl TenantPolicy {
    /// Build a policy from additional corporate tenant IDs. The Microsoft
    /// corporate tenant is always included.
    pub fn new<I, S>(corporate_tenants: I, require_confirmation_for_all: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set: HashSet<String> = corporate_tenants
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        set.insert(MICROSOFT_CORPORATE_TENANT.to_string());

        Self {
            corporate_tenants: set,
            require_confirmation_for_all,
        }
    }

    /// Whether every listed operation needs confirmation regardless of tenant.
    pub fn require_confirmation_for_all(&self) -> bool {
        self.require_confirmation_for_all
    }

    /// Number of tenants in the allowlist.
    pub fn corporate_tenant_count(&self) -> usize {
        self.corporate_tenants.len()
    }

    /// Membership test against the corporate allowlist.
    pub fn is_high_sensitivity_tenant(&self, tenant_id: &str) -> bool {
        let tenant_id = tenant_id.trim();
        !tenant_id.is_empty() && self.corporate_tenants.contains(&tenant_id.to_lowercase())
    }

    /// Whether an operation on this tenant needs explicit confirmation.
    pub fn requires_confirmation(&self, tenant_id: &str, operation: &str) -> bool {
        if self.is_high_sensitivity_tenant(tenant_id) && OperationKind::parse(operation).is_some()
        {
            return true;
        }
        self.require_confirmation_for_all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TENANT: &str = "6b104499-c49f-45dc-b3a2-df95efd6eeb4";
    const CLIENT: &str = "0f3c1a2b-4d5e-4f60-8a9b-0c1d2e3f4a5b";
    const SECRET: &str = "s3cr3t-value-123";

    #[test]
    fn test_valid_guid() {
        assert!(is_valid_guid(TENANT));
        assert!(is_valid_guid("ABCDEF12-3456-7890-ABCD-EF1234567890"));
        assert!(is_valid_guid("abcdef12-3456-7890-abcd-ef1234567890"));
    }

    #[test]
    fn test_invalid_guid() {
        assert!(!is_valid_guid(""));
        assert!(!is_valid_guid("not-a-guid"));
        assert!(!is_valid_guid("6b104499c49f45dcb3a2df95efd6eeb4"));
        assert!(!is_valid_guid("6b104499-c49f-45dc-b3a2-df95efd6eeb"));
        assert!(!is_valid_guid("6b10449-9c49f-45dc-b3a2-df95efd6eeb4"));
        assert!(!is_valid_guid("6b104499-c49f-45dc-b3a2-df95efd6eeg4"));
        assert!(!is_valid_guid("{6b104499-c49f-45dc-b3a2-df95efd6eeb4}"));
        assert!(!is_valid_guid(" 6b104499-c49f-45dc-b3a2-df95efd6eeb4"));
    }

    #[test]
    fn test_placeholder_tenants() {
        assert!(is_placeholder_tenant(ZERO_GUID));
        assert!(is_placeholder_tenant("FFFFFFFF-FFFF-FFFF-FFFF-FFFFFFFFFFFF"));
        assert!(is_placeholder_tenant("11111111-1111-1111-1111-111111111111"));
        assert!(is_placeholder_tenant("12345678-1234-1234-1234-123456789012"));
        assert!(!is_placeholder_tenant(TENANT));
    }

    #[test]
    fn test_credentials_configured() {
        assert!(are_credentials_configured(Some(TENANT), Some(CLIENT), Some(SECRET)));
    }

    #[test]
    fn test_credentials_not_configured_when_any_field_flips() {
        let cases = [
            (None, Some(CLIENT), Some(SECRET)),
            (Some(""), Some(CLIENT), Some(SECRET)),
            (Some("   "), Some(CLIENT), Some(SECRET)),
            (Some(ZERO_GUID), Some(CLIENT), Some(SECRET)),
            (Some(TENANT), None, Some(SECRET)),
            (Some(TENANT), Some(ZERO_GUID), Some(SECRET)),
            (Some(TENANT), Some(CLIENT), Some("")),
            (Some(TENANT), Some(CLIENT), Some(PLACEHOLDER_SECRET)),
        ];
        for (t, c, s) in cases {
            assert!(!are_credentials_configured(t, c, s), "{t:?} {c:?} {s:?}");
        }
    }

    #[test]
    fn test_input_prompt_detection() {
        assert!(is_vscode_input_prompt(Some("${input:tenantId}"), None, None));
        assert!(is_vscode_input_prompt(Some(TENANT), Some(CLIENT), Some("${input:secret}")));
        assert!(!is_vscode_input_prompt(None, None, None));
        assert!(!is_vscode_input_prompt(Some(""), Some(""), Some("")));
        assert!(!is_vscode_input_prompt(Some(TENANT), Some(CLIENT), Some(SECRET)));
        assert!(!is_vscode_input_prompt(Some("${env:TENANT}"), None, None));
    }

    #[test]
    fn test_operation_kind_parse() {
        assert_eq!(OperationKind::parse("app-create"), Some(OperationKind::AppCreate));
        assert_eq!(OperationKind::parse("ROLE-ASSIGN"), Some(OperationKind::RoleAssign));
        assert_eq!(OperationKind::parse("read-only-op"), None);
        for op in OperationKind::all() {
            assert_eq!(OperationKind::parse(op.as_str()), Some(*op));
        }
    }

    #[test]
    fn test_corporate_tenant() {
        let policy = TenantPolicy::default();
        assert!(policy.is_high_sensitivity_tenant(MICROSOFT_CORPORATE_TENANT));
        assert!(policy.is_high_sensitivity_tenant("72F988BF-86F1-41AF-91AB-2D7CD011DB47"));
        assert!(!policy.is_high_sensitivity_tenant(TENANT));
        assert!(!policy.is_high_sensitivity_tenant(""));
    }

    #[test]
    fn test_configured_corporate_tenants() {
        let policy = TenantPolicy::new(vec![TENANT.to_uppercase(), "  ".to_string()], false);
        assert!(policy.is_high_sensitivity_tenant(TENANT));
        assert_eq!(policy.corporate_tenant_count(), 2);
    }

    #[test]
    fn test_requires_confirmation() {
        let policy = TenantPolicy::default();
        assert!(policy.requires_confirmation(MICROSOFT_CORPORATE_TENANT, "app-create"));
        assert!(!policy.requires_confirmation(MICROSOFT_CORPORATE_TENANT, "read-only-op"));
        assert!(!policy.requires_confirmation(TENANT, "app-create"));
    }

    #[test]
    fn test_requires_confirmation_global_flag() {
        let policy = TenantPolicy::new(Vec::<String>::new(), true);
        assert!(policy.requires_confirmation(TENANT, "app-create"));
        assert!(policy.requires_confirmation(TENANT, "user-create"));
    }
}
