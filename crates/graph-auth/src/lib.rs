//! # Graph Auth
//!
//! Credential handling for a Microsoft Graph MCP adapter.
//!
//! ## Overview
//!
//! The graph-auth crate handles:
//! - **Configuration**: layered `Section:Key` lookup over environment variables
//!   and an `appsettings.json` style document
//! - **Resolution**: picking exactly one authentication method, in strict
//!   precedence order, and building its credential without network I/O
//! - **Validation**: format checks plus a live directory probe, folded into a
//!   `ValidationVerdict` with remediation suggestions
//! - **Tenant safety**: corporate tenant allowlist and confirmation policy for
//!   high-risk mutations
//!
//! ## Authentication Methods
//!
//! | Method | Selected when |
//! |--------|---------------|
//! | `ClientSecret` | tenant, client and secret are real and the tenant is a GUID |
//! | `AzureCLI` | `UseAzureCli` is set and a tenant is present |
//! | `ManagedIdentity` | `UseManagedIdentity` is set |
//! | `VSCodeCredential` | `UseVSCode` is set and a tenant is present |
//! | `DefaultAzure` | `UseDefaultChain` is set |
//! | `Demo` | nothing else matched |
//!
//! ## Usage
//!
//! ```rust,no_run
//! use graph_auth::{
//!     AuthenticationResolver, ConfigChain, CredentialConfig, CredentialValidator,
//!     GraphConnector, GraphEndpoints, ValidatorConfig,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! async fn check() -> Result<(), graph_auth::ConfigError> {
//!     let chain = ConfigChain::from_process("appsettings.json")?;
//!     let config = CredentialConfig::from_chain(&chain);
//!
//!     let resolved = AuthenticationResolver::default().resolve(&config);
//!     println!("Using {}", resolved.method);
//!
//!     let connector = GraphConnector::new(GraphEndpoints::default(), Duration::from_secs(5));
//!     let validator = CredentialValidator::new(Arc::new(connector), ValidatorConfig::default());
//!     let verdict = validator.validate_config(&config).await;
//!     println!("{}", verdict.summary());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod credential;
pub mod directory;
pub mod error;
pub mod resolver;
pub mod safety;
pub mod validation;

// Re-export main types
pub use config::{
    parse_flag, ConfigChain, ConfigSource, CredentialConfig, FlatEnvSource,
    HierarchicalEnvSource, JsonConfigStore, SecurityConfig,
};
pub use credential::{
    AccessToken, AzureCliCredential, ClientSecretCredential, CredentialOptions,
    DefaultChainCredential, DemoCredential, ManagedIdentityCredential, TokenCredential,
    VsCodeCredential, GRAPH_SCOPE,
};
pub use directory::{
    DirectoryClient, DirectoryConnector, GraphConnector, GraphDirectoryClient, GraphEndpoints,
};
pub use error::{ConfigError, CredentialError, DirectoryError, DirectoryResult};
pub use resolver::{AuthenticationMethod, AuthenticationResolver, ResolvedAuthentication};
pub use safety::{
    are_credentials_configured, is_valid_guid, is_vscode_input_prompt, OperationKind,
    TenantPolicy,
};
pub use validation::{
    CredentialValidator, PermissionPolicy, ValidationItem, ValidationMode, ValidationVerdict,
    ValidatorConfig,
};
