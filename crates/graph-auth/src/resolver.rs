//! Authentication method selection.
//!
//! Selection is a pure function of a [`CredentialConfig`] snapshot. Rules
//! are tried in a fixed order and the first match wins:
//!
//! 1. client secret, when the triple is real and the tenant is a valid GUID
//! 2. Azure CLI, when `UseAzureCli` is set and a tenant is present
//! 3. managed identity, when `UseManagedIdentity` is set
//! 4. VS Code, when `UseVSCode` is set and a tenant is present
//! 5. default chain, when `UseDefaultChain` is set
//! 6. demo mode otherwise

use crate::config::CredentialConfig;
use crate::credential::{
    AzureCliCredential, ClientSecretCredential, CredentialOptions, DefaultChainCredential,
    DemoCredential, ManagedIdentityCredential, TokenCredential, VsCodeCredential,
};
use crate::safety::{are_credentials_configured, is_valid_guid};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How the server authenticates to Microsoft Graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthenticationMethod {
    /// Application client secret.
    #[serde(rename = "ClientSecret")]
    ClientSecret,
    /// Signed-in Azure CLI account.
    #[serde(rename = "AzureCLI")]
    AzureCli,
    /// Azure managed identity.
    #[serde(rename = "ManagedIdentity")]
    ManagedIdentity,
    /// VS Code Azure account.
    #[serde(rename = "VSCodeCredential")]
    VsCode,
    /// Non-interactive default credential chain.
    #[serde(rename = "DefaultAzure")]
    DefaultChain,
    /// Placeholder credential, canned responses only.
    #[serde(rename = "Demo")]
    Demo,
}

impl AuthenticationMethod {
    /// Display name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthenticationMethod::ClientSecret => "ClientSecret",
            AuthenticationMethod::AzureCli => "AzureCLI",
            AuthenticationMethod::ManagedIdentity => "ManagedIdentity",
            AuthenticationMethod::VsCode => "VSCodeCredential",
            AuthenticationMethod::DefaultChain => "DefaultAzure",
            AuthenticationMethod::Demo => "Demo",
        }
    }

    /// Whether real credentials are in use.
    pub fn is_configured(&self) -> bool {
        !matches!(self, AuthenticationMethod::Demo)
    }

    /// Pick the method for a configuration snapshot.
    pub fn select(config: &CredentialConfig) -> Self {
        let tenant = config.tenant();

        let client_secret_ready = are_credentials_configured(
            config.tenant_id.as_deref(),
            config.client_id.as_deref(),
            config.client_secret.as_deref(),
        ) && tenant.map_or(false, is_valid_guid);

        if client_secret_ready {
            return AuthenticationMethod::ClientSecret;
        }
        if config.use_azure_cli && tenant.is_some() {
            return AuthenticationMethod::AzureCli;
        }
        if config.use_managed_identity {
            return AuthenticationMethod::ManagedIdentity;
        }
        if config.use_vscode && tenant.is_some() {
            return AuthenticationMethod::VsCode;
        }
        if config.use_default_chain {
            return AuthenticationMethod::DefaultChain;
        }
        AuthenticationMethod::Demo
    }
}

impl std::fmt::Display for AuthenticationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of resolution: the method and a ready-to-use credential.
#[derive(Clone)]
pub struct ResolvedAuthentication {
    /// Selected method.
    pub method: AuthenticationMethod,
    /// Credential for the method.
    pub credential: Arc<dyn TokenCredential>,
    /// Tenant the credential targets, if known.
    pub tenant_id: Option<String>,
}

impl std::fmt::Debug for ResolvedAuthentication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedAuthentication")
            .field("method", &self.method)
            .field("credential", &self.credential.kind())
            .field("tenant_id", &self.tenant_id)
            .finish()
    }
}

impl ResolvedAuthentication {
    /// Whether real credentials are in use.
    pub fn is_configured(&self) -> bool {
        self.method.is_configured()
    }
}

/// Builds credentials for the selected method.
#[derive(Debug, Clone, Default)]
pub struct AuthenticationResolver {
    options: CredentialOptions,
}

impl AuthenticationResolver {
    /// Create a resolver with the given credential options.
    pub fn new(options: CredentialOptions) -> Self {
        Self { options }
    }

    /// Select a method and construct its credential. Never fails and never
    /// performs network I/O.
    pub fn resolve(&self, config: &CredentialConfig) -> ResolvedAuthentication {
        debug!("Determining authentication method");
        let method = AuthenticationMethod::select(config);
        let tenant_id = config.tenant().map(str::to_string);

        let credential: Arc<dyn TokenCredential> = match method {
            AuthenticationMethod::ClientSecret => Arc::new(ClientSecretCredential::new(
                tenant_id.clone().unwrap_or_default(),
                config.client_id.clone().unwrap_or_default(),
                config.client_secret.clone().unwrap_or_default(),
                self.options.clone(),
            )),
            AuthenticationMethod::AzureCli => Arc::new(AzureCliCredential::new(
                tenant_id.clone(),
                self.options.timeout,
            )),
            AuthenticationMethod::ManagedIdentity => Arc::new(ManagedIdentityCredential::new(
                config.user_assigned_client_id().map(str::to_string),
                self.options.clone(),
            )),
            AuthenticationMethod::VsCode => Arc::new(VsCodeCredential::new(tenant_id.clone())),
            AuthenticationMethod::DefaultChain => Arc::new(DefaultChainCredential::standard(
                tenant_id.clone(),
                self.options.clone(),
            )),
            AuthenticationMethod::Demo => Arc::new(DemoCredential),
        };

        if method.is_configured() {
            info!(method = %method, tenant_id = ?tenant_id, "Using {} authentication", method);
        } else {
            warn!("No valid authentication configuration found, using demo mode");
        }

        ResolvedAuthentication {
            method,
            credential,
            tenant_id,
        }
    }
}
