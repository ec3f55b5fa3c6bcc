//! Token credentials.
//!
//! Every authentication method resolves to a [`TokenCredential`]. Building
//! one never touches the network; I/O only happens in `get_token`.

use crate::error::CredentialError;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Default scope for Microsoft Graph application permissions.
pub const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Azure public cloud authority host.
pub const PUBLIC_CLOUD_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Azure Instance Metadata Service token endpoint.
pub const IMDS_TOKEN_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// A bearer token and its expiry.
#[derive(Clone)]
pub struct AccessToken {
    /// Bearer token.
    pub token: String,
    /// Expiry time.
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl AccessToken {
    fn expiring_in(token: String, seconds: Option<i64>) -> Self {
        Self {
            token,
            expires_at: Utc::now()
                + ChronoDuration::seconds(seconds.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS)),
        }
    }

    /// Whether the token has expired.
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Source of access tokens.
#[async_trait]
pub trait TokenCredential: Send + Sync {
    /// Short name of the credential type, used in logs.
    fn kind(&self) -> &'static str;

    /// Acquire a token for the given scope.
    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError>;
}

/// Shared settings for credentials that talk HTTP.
#[derive(Debug, Clone)]
pub struct CredentialOptions {
    /// Identity provider authority host.
    pub authority_host: String,
    /// Managed identity token endpoint.
    pub imds_endpoint: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// HTTP client.
    pub http: Client,
}

impl Default for CredentialOptions {
    fn default() -> Self {
        Self {
            authority_host: PUBLIC_CLOUD_AUTHORITY.to_string(),
            imds_endpoint: IMDS_TOKEN_ENDPOINT.to_string(),
            timeout: Duration::from_secs(5),
            http: Client::new(),
        }
    }
}

impl CredentialOptions {
    /// Override the managed identity endpoint.
    pub fn with_imds_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.imds_endpoint = endpoint.into();
        self
    }
}

/// `expires_in` arrives as a number from the token endpoint and as a
/// string from IMDS.
#[derive(Deserialize)]
#[serde(untagged)]
enum Seconds {
    Number(i64),
    Text(String),
}

impl Seconds {
    fn value(&self) -> Option<i64> {
        match self {
            Seconds::Number(n) => Some(*n),
            Seconds::Text(s) => s.parse().ok(),
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<Seconds>,
}

impl TokenResponse {
    fn into_token(self) -> AccessToken {
        let seconds = self.expires_in.as_ref().and_then(Seconds::value);
        AccessToken::expiring_in(self.access_token, seconds)
    }
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Map a Graph `.default` scope to the resource form used by the Azure CLI
/// and IMDS.
fn scope_to_resource(scope: &str) -> &str {
    scope.strip_suffix("/.default").unwrap_or(scope)
}

/// Client credentials grant with an application secret.
#[derive(Clone)]
pub struct ClientSecretCredential {
    tenant_id: String,
    client_id: String,
    client_secret: String,
    options: CredentialOptions,
}

impl std::fmt::Debug for ClientSecretCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSecretCredential")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("authority_host", &self.options.authority_host)
            .finish()
    }
}

impl ClientSecretCredential {
    /// Create a new client secret credential.
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        options: CredentialOptions,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            options,
        }
    }

    /// Tenant the credential authenticates against.
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.options.authority_host.trim_end_matches('/'),
            self.tenant_id
        )
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    fn kind(&self) -> &'static str {
        "client-secret"
    }

    #[instrument(skip(self), fields(tenant_id = %self.tenant_id, client_id = %self.client_id))]
    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        debug!("Requesting client credentials token");

        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", scope),
        ];
        let request = self.options.http.post(self.token_url()).form(&form).send();

        let response = tokio::time::timeout(self.options.timeout, request)
            .await
            .map_err(|_| CredentialError::Timeout(self.options.timeout))??;

        let status = response.status();
        if status.is_success() {
            let body: TokenResponse = response
                .json()
                .await
                .map_err(|e| CredentialError::InvalidResponse(e.to_string()))?;
            return Ok(body.into_token());
        }

        let text = response.text().await.unwrap_or_default();
        match serde_json::from_str::<TokenErrorResponse>(&text) {
            Ok(err) if status.is_client_error() => {
                let description = err.error_description.unwrap_or(err.error);
                warn!(status = status.as_u16(), "Identity provider rejected credential");
                Err(CredentialError::AuthenticationFailed(description))
            }
            _ => Err(CredentialError::InvalidResponse(format!(
                "token endpoint returned {}: {}",
                status, text
            ))),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliTokenResponse {
    access_token: String,
    #[serde(default, rename = "expires_on")]
    expires_on: Option<i64>,
}

/// Token from the signed-in Azure CLI account.
#[derive(Debug, Clone)]
pub struct AzureCliCredential {
    tenant_id: Option<String>,
    program: String,
    timeout: Duration,
}

impl AzureCliCredential {
    /// Create a credential, optionally scoped to a tenant.
    pub fn new(tenant_id: Option<String>, timeout: Duration) -> Self {
        Self {
            tenant_id: tenant_id.filter(|t| !t.is_empty()),
            program: "az".to_string(),
            timeout,
        }
    }

    #[cfg(test)]
    fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn args(&self, scope: &str) -> Vec<String> {
        let mut args = vec![
            "account".to_string(),
            "get-access-token".to_string(),
            "--output".to_string(),
            "json".to_string(),
            "--resource".to_string(),
            scope_to_resource(scope).to_string(),
        ];
        if let Some(tenant) = &self.tenant_id {
            args.push("--tenant".to_string());
            args.push(tenant.clone());
        }
        args
    }
}

#[async_trait]
impl TokenCredential for AzureCliCredential {
    fn kind(&self) -> &'static str {
        "azure-cli"
    }

    #[instrument(skip(self), fields(tenant_id = ?self.tenant_id))]
    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        debug!("Requesting token from Azure CLI");

        let mut command = tokio::process::Command::new(&self.program);
        command.args(self.args(scope)).kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Err(_) => return Err(CredentialError::Timeout(self.timeout)),
            Ok(Err(e)) => {
                return Err(CredentialError::Unavailable(format!(
                    "Azure CLI could not be started: {}",
                    e
                )))
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if stderr.contains("AADSTS") {
                return Err(CredentialError::AuthenticationFailed(stderr));
            }
            return Err(CredentialError::Unavailable(format!(
                "Azure CLI returned {}: {}",
                output.status, stderr
            )));
        }

        let body: CliTokenResponse = serde_json::from_slice(&output.stdout)
            .map_err(|e| CredentialError::InvalidResponse(e.to_string()))?;
        let expires_in = body.expires_on.map(|at| at - Utc::now().timestamp());
        Ok(AccessToken::expiring_in(body.access_token, expires_in))
    }
}

/// Token from the Azure managed identity endpoint.
#[derive(Debug, Clone)]
pub struct ManagedIdentityCredential {
    client_id: Option<String>,
    options: CredentialOptions,
}

impl ManagedIdentityCredential {
    /// Create a credential. A client ID selects a user-assigned identity.
    pub fn new(client_id: Option<String>, options: CredentialOptions) -> Self {
        Self {
            client_id: client_id.filter(|c| !c.is_empty()),
            options,
        }
    }
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    fn kind(&self) -> &'static str {
        "managed-identity"
    }

    #[instrument(skip(self), fields(client_id = ?self.client_id))]
    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        debug!("Requesting token from managed identity endpoint");

        let mut query = vec![
            ("api-version", "2018-02-01"),
            ("resource", scope_to_resource(scope)),
        ];
        if let Some(client_id) = &self.client_id {
            query.push(("client_id", client_id.as_str()));
        }

        let request = self
            .options
            .http
            .get(&self.options.imds_endpoint)
            .header("Metadata", "true")
            .query(&query)
            .send();

        let response = match tokio::time::timeout(self.options.timeout, request).await {
            Err(_) => return Err(CredentialError::Timeout(self.options.timeout)),
            Ok(Err(e)) if e.is_connect() => {
                return Err(CredentialError::Unavailable(format!(
                    "managed identity endpoint unreachable: {}",
                    e
                )))
            }
            Ok(result) => result?,
        };

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CredentialError::Unavailable(format!(
                "managed identity endpoint returned {}: {}",
                status, text
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| CredentialError::InvalidResponse(e.to_string()))?;
        Ok(body.into_token())
    }
}

/// The VS Code Azure account.
///
/// The editor keeps its refresh token in the desktop keychain, which a
/// server process has no access to, so this credential always reports
/// itself unavailable. Its place in the chain is kept so the selection
/// and diagnostics stay accurate.
#[derive(Debug, Clone)]
pub struct VsCodeCredential {
    tenant_id: Option<String>,
}

impl VsCodeCredential {
    /// Create a credential scoped to a tenant.
    pub fn new(tenant_id: Option<String>) -> Self {
        Self {
            tenant_id: tenant_id.filter(|t| !t.is_empty()),
        }
    }
}

#[async_trait]
impl TokenCredential for VsCodeCredential {
    fn kind(&self) -> &'static str {
        "vscode"
    }

    async fn get_token(&self, _scope: &str) -> Result<AccessToken, CredentialError> {
        Err(CredentialError::Unavailable(format!(
            "VS Code account token cache is not readable by the server (tenant: {}); sign in with the Azure CLI or configure a client secret",
            self.tenant_id.as_deref().unwrap_or("unspecified")
        )))
    }
}

/// Tries each credential in order and returns the first token.
///
/// An unavailable credential moves on to the next one. A credential that
/// was rejected by the identity provider stops the chain.
#[derive(Clone)]
pub struct DefaultChainCredential {
    sources: Vec<Arc<dyn TokenCredential>>,
}

impl std::fmt::Debug for DefaultChainCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.sources.iter().map(|s| s.kind()))
            .finish()
    }
}

impl DefaultChainCredential {
    /// Build a chain from explicit sources.
    pub fn new(sources: Vec<Arc<dyn TokenCredential>>) -> Self {
        Self { sources }
    }

    /// The standard non-interactive chain: managed identity, Azure CLI,
    /// then VS Code.
    pub fn standard(tenant_id: Option<String>, options: CredentialOptions) -> Self {
        Self::new(vec![
            Arc::new(ManagedIdentityCredential::new(None, options.clone())),
            Arc::new(AzureCliCredential::new(tenant_id.clone(), options.timeout)),
            Arc::new(VsCodeCredential::new(tenant_id)),
        ])
    }

    /// Credential kinds in the order they are tried.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.kind()).collect()
    }
}

#[async_trait]
impl TokenCredential for DefaultChainCredential {
    fn kind(&self) -> &'static str {
        "default-chain"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let mut failures = Vec::new();

        for source in &self.sources {
            match source.get_token(scope).await {
                Ok(token) => {
                    debug!(credential = source.kind(), "Default chain acquired token");
                    return Ok(token);
                }
                Err(e) if e.is_authentication_failure() => return Err(e),
                Err(e) => {
                    debug!(credential = source.kind(), error = %e, "Credential unavailable, trying next");
                    failures.push(format!("{}: {}", source.kind(), e));
                }
            }
        }

        Err(CredentialError::Unavailable(format!(
            "no credential in the default chain succeeded ({})",
            failures.join("; ")
        )))
    }
}

/// Placeholder credential for demo mode.
///
/// Carries the all-zero tenant and client IDs and never authenticates.
#[derive(Debug, Clone, Default)]
pub struct DemoCredential;

#[async_trait]
impl TokenCredential for DemoCredential {
    fn kind(&self) -> &'static str {
        "demo"
    }

    async fn get_token(&self, _scope: &str) -> Result<AccessToken, CredentialError> {
        Err(CredentialError::Demo)
    }
}
