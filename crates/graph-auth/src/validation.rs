//! Credential validation.
//!
//! [`CredentialValidator::validate`] runs a fixed sequence of checks over a
//! tenant/client/secret triple and stops at the first one that decides the
//! outcome:
//!
//! 1. unresolved `${input:...}` prompt tokens
//! 2. missing or placeholder values (demo mode)
//! 3. tenant ID format
//! 4. client ID format
//! 5. client secret format
//! 6. a live "list one application" call
//! 7. optionally, a "list one user" call to surface permission gaps
//!
//! Every failure becomes a [`ValidationVerdict`]; nothing is retried.

use crate::config::CredentialConfig;
use crate::directory::DirectoryConnector;
use crate::error::DirectoryError;
use crate::safety::{
    are_credentials_configured, is_placeholder_tenant, is_valid_guid, is_vscode_input_prompt,
    PLACEHOLDER_SECRET, ZERO_GUID,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Default minimum plausible client secret length.
pub const DEFAULT_MIN_SECRET_LENGTH: usize = 10;

/// Outcome class of a validation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValidationMode {
    /// Credentials not configured; canned responses only.
    Demo,
    /// Credentials authenticated against the directory.
    Production,
    /// A value has the wrong format.
    Invalid,
    /// The identity provider rejected the credential.
    AuthenticationFailed,
    /// Authenticated, but the application lacks permissions.
    InsufficientPermissions,
    /// Network failure, timeout or unexpected response.
    UnknownError,
    /// Unresolved editor input prompt in the configuration.
    #[serde(rename = "VSCodeInputPrompt")]
    VsCodeInputPrompt,
}

impl ValidationMode {
    /// Name of the mode, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationMode::Demo => "Demo",
            ValidationMode::Production => "Production",
            ValidationMode::Invalid => "Invalid",
            ValidationMode::AuthenticationFailed => "AuthenticationFailed",
            ValidationMode::InsufficientPermissions => "InsufficientPermissions",
            ValidationMode::UnknownError => "UnknownError",
            ValidationMode::VsCodeInputPrompt => "VSCodeInputPrompt",
        }
    }
}

impl std::fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationItem {
    /// Whether the check passed.
    pub is_valid: bool,
    /// Short description.
    pub message: String,
    /// Extra context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ValidationItem {
    fn pass(message: impl Into<String>) -> Self {
        Self {
            is_valid: true,
            message: message.into(),
            details: None,
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Result of one validation pass. Read-only once returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationVerdict {
    is_valid: bool,
    mode: ValidationMode,
    message: String,
    details: Vec<String>,
    suggestions: Vec<String>,
    validation_items: Vec<ValidationItem>,
}

impl ValidationVerdict {
    /// Whether the credentials are usable.
    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    /// Outcome class.
    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    /// Headline message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Ordered details.
    pub fn details(&self) -> &[String] {
        &self.details
    }

    /// Ordered remediation steps.
    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    /// Checks that ran, in order.
    pub fn items(&self) -> &[ValidationItem] {
        &self.validation_items
    }

    /// Human-readable summary: passed checks, failed checks, then
    /// suggestions.
    pub fn summary(&self) -> String {
        let mut lines: Vec<String> = Vec::new();

        for item in self.validation_items.iter().filter(|i| i.is_valid) {
            lines.push(format!("✓ {}", item.message));
        }
        for item in self.validation_items.iter().filter(|i| !i.is_valid) {
            lines.push(format!("✗ {}", item.message));
        }

        if !self.suggestions.is_empty() {
            lines.push(String::new());
            lines.push("Suggestions:".to_string());
            for suggestion in &self.suggestions {
                lines.push(format!("  • {}", suggestion));
            }
        }

        lines.join("\n")
    }
}

/// Accumulates checks until a branch decides the outcome.
#[derive(Default)]
struct VerdictBuilder {
    details: Vec<String>,
    suggestions: Vec<String>,
    items: Vec<ValidationItem>,
}

impl VerdictBuilder {
    fn item(&mut self, item: ValidationItem) -> &mut Self {
        self.items.push(item);
        self
    }

    fn detail(&mut self, detail: impl Into<String>) -> &mut Self {
        self.details.push(detail.into());
        self
    }

    fn suggest<I, S>(&mut self, suggestions: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suggestions.extend(suggestions.into_iter().map(Into::into));
        self
    }

    fn finish(&mut self, mode: ValidationMode, message: impl Into<String>) -> ValidationVerdict {
        ValidationVerdict {
            is_valid: mode == ValidationMode::Production,
            mode,
            message: message.into(),
            details: std::mem::take(&mut self.details),
            suggestions: std::mem::take(&mut self.suggestions),
            validation_items: std::mem::take(&mut self.items),
        }
    }
}

/// How a failed secondary permission probe affects the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionPolicy {
    /// Record the gap and add suggestions; the verdict stays valid.
    #[default]
    Lenient,
    /// A permission gap makes the verdict `InsufficientPermissions`.
    Strict,
}

/// Validator settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorConfig {
    /// Reject shorter secrets. `None` disables the check.
    pub min_secret_length: Option<usize>,
    /// Run the secondary "list one user" probe.
    pub check_permissions: bool,
    /// Effect of a failed secondary probe.
    pub permission_policy: PermissionPolicy,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            min_secret_length: Some(DEFAULT_MIN_SECRET_LENGTH),
            check_permissions: true,
            permission_policy: PermissionPolicy::Lenient,
        }
    }
}

const AUTH_FALLBACK_SUGGESTIONS: [&str; 3] = [
    "Verify your Azure AD app registration settings",
    "Ensure the client secret has not expired",
    "Check that the app has required API permissions and admin consent",
];

const UNKNOWN_ERROR_SUGGESTIONS: [&str; 3] = [
    "Check network connectivity to Microsoft Graph API",
    "Verify firewall settings allow HTTPS traffic to graph.microsoft.com",
    "Review application logs for detailed error information",
];

const PERMISSION_SUGGESTIONS: [&str; 3] = [
    "Grant additional Graph API permissions in Azure portal",
    "Ensure admin consent is provided for application permissions",
    "Common MCP server permissions needed: User.Read.All, Group.Read.All, Mail.Send, Calendars.ReadWrite",
];

/// Targeted remediation for known identity provider error codes.
fn authentication_suggestions(error_text: &str) -> Vec<&'static str> {
    if error_text.contains("AADSTS7000215") {
        vec!["Invalid client secret provided. Generate a new client secret in Azure Portal"]
    } else if error_text.contains("AADSTS700016") {
        vec!["Application not found in tenant. Verify the Client ID is correct"]
    } else if error_text.contains("AADSTS90002") {
        vec!["Tenant not found. Verify the Tenant ID is correct"]
    } else {
        AUTH_FALLBACK_SUGGESTIONS.to_vec()
    }
}

fn missing_fields(
    tenant_id: Option<&str>,
    client_id: Option<&str>,
    client_secret: Option<&str>,
) -> Vec<&'static str> {
    [
        ("TenantId", tenant_id),
        ("ClientId", client_id),
        ("ClientSecret", client_secret),
    ]
    .into_iter()
    .filter(|(_, v)| v.map_or(true, |v| v.trim().is_empty()))
    .map(|(name, _)| name)
    .collect()
}

/// Decides whether a credential triple is safe and functional.
#[derive(Clone)]
pub struct CredentialValidator {
    connector: Arc<dyn DirectoryConnector>,
    config: ValidatorConfig,
}

impl CredentialValidator {
    /// Create a validator.
    pub fn new(connector: Arc<dyn DirectoryConnector>, config: ValidatorConfig) -> Self {
        Self { connector, config }
    }

    /// Validator settings.
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validate the client secret triple of a configuration snapshot.
    pub async fn validate_config(&self, config: &CredentialConfig) -> ValidationVerdict {
        self.validate(
            config.tenant_id.as_deref(),
            config.client_id.as_deref(),
            config.client_secret.as_deref(),
        )
        .await
    }

    /// Run the check sequence. Never fails; every outcome is a verdict.
    #[instrument(skip(self, client_secret))]
    pub async fn validate(
        &self,
        tenant_id: Option<&str>,
        client_id: Option<&str>,
        client_secret: Option<&str>,
    ) -> ValidationVerdict {
        let mut verdict = VerdictBuilder::default();

        if is_vscode_input_prompt(tenant_id, client_id, client_secret) {
            warn!("VS Code input prompt configuration detected in credentials");
            return verdict
                .item(ValidationItem::fail(
                    "Configuration contains unresolved VS Code input prompts",
                ))
                .detail("Configuration contains VS Code input prompt variables (${input:...})")
                .suggest([
                    "This configuration is for VS Code MCP installation with user prompts",
                    "Use direct credential values in appsettings.json for server-side deployment",
                    "For VS Code, use the one-click installation buttons in the README",
                ])
                .finish(
                    ValidationMode::VsCodeInputPrompt,
                    "VS Code input prompt configuration detected",
                );
        }

        if !are_credentials_configured(tenant_id, client_id, client_secret) {
            let missing = missing_fields(tenant_id, client_id, client_secret);
            let item = if missing.is_empty() {
                ValidationItem::fail("Azure AD configuration contains placeholder values")
                    .with_details(placeholder_detail(tenant_id, client_id, client_secret))
            } else {
                ValidationItem::fail(format!(
                    "Missing Azure AD configuration: {}",
                    missing.join(", ")
                ))
            };
            info!("Credential validation: running in demo mode");
            return verdict
                .item(item)
                .suggest([
                    "Configure Azure AD credentials in appsettings.json or environment variables to access real Microsoft 365 data",
                    "See documentation for Azure AD app registration steps",
                ])
                .finish(
                    ValidationMode::Demo,
                    "Azure AD credentials not configured - running in demo mode",
                );
        }
        verdict.item(ValidationItem::pass("Azure AD configuration present"));

        let tenant_id = tenant_id.unwrap_or_default();
        let client_id = client_id.unwrap_or_default();
        let client_secret = client_secret.unwrap_or_default();

        if !is_valid_guid(tenant_id) {
            error!(tenant_id, "Credential validation failed: invalid tenant ID format");
            return verdict
                .item(
                    ValidationItem::fail("Tenant ID format invalid - must be a valid GUID")
                        .with_details(format!("Provided value: {}", tenant_id)),
                )
                .detail(format!("Tenant ID '{}' is not a valid GUID format", tenant_id))
                .suggest([
                    "Tenant ID must be in GUID format (e.g., 12345678-1234-1234-1234-123456789012)",
                    "Find your Tenant ID in Azure Portal > Azure Active Directory > Overview",
                ])
                .finish(ValidationMode::Invalid, "Invalid Azure AD Tenant ID format");
        }
        verdict.item(ValidationItem::pass("Tenant ID format valid"));

        if !is_valid_guid(client_id) {
            error!(client_id, "Credential validation failed: invalid client ID format");
            return verdict
                .item(
                    ValidationItem::fail("Client ID format invalid - must be a valid GUID")
                        .with_details(format!("Provided value: {}", client_id)),
                )
                .detail(format!("Client ID '{}' is not a valid GUID format", client_id))
                .suggest([
                    "Client ID must be in GUID format (e.g., 12345678-1234-1234-1234-123456789012)",
                    "Find your Client ID in Azure Portal > Azure Active Directory > App registrations > [Your App] > Overview",
                ])
                .finish(ValidationMode::Invalid, "Invalid Azure AD Client ID format");
        }
        verdict.item(ValidationItem::pass("Client ID format valid"));

        if let Some(min) = self.config.min_secret_length.filter(|m| *m > 0) {
            if client_secret.chars().count() < min {
                error!(min, "Credential validation failed: client secret too short");
                return verdict
                    .item(ValidationItem::fail(format!(
                        "Client secret appears to be too short (should be at least {} characters)",
                        min
                    )))
                    .detail(format!(
                        "Client Secret is shorter than {} characters",
                        min
                    ))
                    .suggest([
                        "Copy the full client secret value, not the secret ID",
                        "Generate a new client secret in Azure Portal > Azure Active Directory > App registrations > [Your App] > Certificates & secrets",
                    ])
                    .finish(ValidationMode::Invalid, "Azure AD Client Secret is too short");
            }
        }
        verdict.item(ValidationItem::pass("Client secret format valid"));

        info!(tenant_id, client_id, "Testing Azure AD authentication");
        let directory = self.connector.connect(tenant_id, client_id, client_secret);

        if let Err(e) = directory.list_applications(1).await {
            return Self::probe_failure(verdict, e);
        }

        verdict
            .item(
                ValidationItem::pass("Authentication successful")
                    .with_details("Microsoft Graph API access confirmed"),
            )
            .detail(format!("Successfully authenticated with tenant: {}", tenant_id))
            .detail("Microsoft Graph API access confirmed");

        if self.config.check_permissions {
            match directory.list_users(1).await {
                Ok(_) => {
                    verdict.item(
                        ValidationItem::pass("Graph API permissions verified")
                            .with_details("Successfully accessed user directory"),
                    );
                }
                Err(e) if e.is_forbidden() || e.is_authentication_failure() => {
                    warn!(error = %e, "Secondary permission probe was refused");
                    verdict
                        .item(ValidationItem::fail("Insufficient Graph API permissions").with_details(
                            "The application needs User.Read.All permission or admin consent is required",
                        ))
                        .suggest(PERMISSION_SUGGESTIONS);

                    if self.config.permission_policy == PermissionPolicy::Strict {
                        return verdict
                            .detail(format!("Graph API error: {}", e))
                            .finish(
                                ValidationMode::InsufficientPermissions,
                                "Azure AD authentication succeeded but insufficient permissions",
                            );
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Secondary permission probe failed");
                    verdict
                        .item(
                            ValidationItem::fail("Unable to test Graph API permissions")
                                .with_details(e.to_string()),
                        )
                        .suggest(["Review application logs for detailed error information"]);
                }
            }
        }

        info!("Credential validation successful");
        verdict.finish(
            ValidationMode::Production,
            "Azure AD credentials validated successfully",
        )
    }

    fn probe_failure(mut verdict: VerdictBuilder, e: DirectoryError) -> ValidationVerdict {
        if e.is_authentication_failure() {
            let text = e.to_string();
            error!(error = %text, "Azure AD authentication failed");
            return verdict
                .item(ValidationItem::fail("Authentication failed: Invalid credentials").with_details(text.clone()))
                .detail(format!("Authentication error: {}", text))
                .suggest(authentication_suggestions(&text))
                .finish(
                    ValidationMode::AuthenticationFailed,
                    "Azure AD authentication failed",
                );
        }

        if e.is_forbidden() {
            warn!(error = %e, "Authentication succeeded but insufficient Graph API permissions");
            return verdict
                .item(ValidationItem::fail("Insufficient Graph API permissions").with_details(e.to_string()))
                .detail(format!("Graph API error: {}", e))
                .suggest([
                    "Grant admin consent for required Microsoft Graph API permissions",
                    "Required permissions: Application.Read.All (for basic validation)",
                    "See documentation for complete list of required permissions",
                ])
                .finish(
                    ValidationMode::InsufficientPermissions,
                    "Azure AD authentication succeeded but insufficient permissions",
                );
        }

        error!(error = %e, "Unexpected error during credential validation");
        verdict
            .item(ValidationItem::fail("Authentication test failed").with_details(e.to_string()))
            .detail(format!("Error: {}", e))
            .suggest(UNKNOWN_ERROR_SUGGESTIONS)
            .finish(
                ValidationMode::UnknownError,
                "Unexpected error during credential validation",
            )
    }
}

fn placeholder_detail(
    tenant_id: Option<&str>,
    client_id: Option<&str>,
    client_secret: Option<&str>,
) -> String {
    let mut fields = Vec::new();
    if tenant_id.map_or(false, is_placeholder_tenant) {
        fields.push("TenantId");
    }
    if client_id.map_or(false, |c| c.trim().eq_ignore_ascii_case(ZERO_GUID)) {
        fields.push("ClientId");
    }
    if client_secret == Some(PLACEHOLDER_SECRET) {
        fields.push("ClientSecret");
    }
    format!("Placeholder values: {}", fields.join(", "))
}
