//! Server configuration.
//!
//! Everything the server reads at startup, pulled from a [`ConfigChain`]:
//!
//! | Key | Default |
//! |-----|---------|
//! | `AzureAd:Instance` | `https://login.microsoftonline.com` |
//! | `Graph:BaseUrl` | `https://graph.microsoft.com/v1.0` |
//! | `Validation:TimeoutSecs` | `5` |
//! | `Validation:MinSecretLength` | `10` (`0` disables) |
//! | `Validation:CheckPermissions` | `true` |
//! | `Validation:StrictPermissions` | `false` |
//! | `Validation:OnStartup` | `true` |
//! | `Server:BindAddress` | `127.0.0.1:5000` |

use graph_auth::config::AZURE_AD_SECTION;
use graph_auth::credential::PUBLIC_CLOUD_AUTHORITY;
use graph_auth::directory::GRAPH_V1_BASE_URL;
use graph_auth::{
    ConfigChain, ConfigError, CredentialConfig, GraphConnector, GraphEndpoints,
    PermissionPolicy, SecurityConfig, ValidatorConfig,
};
use std::net::SocketAddr;
use std::time::Duration;

/// Environment variable naming the JSON settings file.
pub const CONFIG_PATH_ENV: &str = "GRAPH_MCP_CONFIG";

/// Settings file used when [`CONFIG_PATH_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "appsettings.json";

/// Default listen address.
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:5000";

/// Default bound on every identity provider and Graph call, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

const GRAPH_SECTION: &str = "Graph";
const VALIDATION_SECTION: &str = "Validation";
const SERVER_SECTION: &str = "Server";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Azure AD credential settings.
    pub credentials: CredentialConfig,

    /// Tenant safety settings.
    pub security: SecurityConfig,

    /// Identity provider and Graph endpoints.
    pub endpoints: GraphEndpoints,

    /// Bound on every outbound call.
    pub timeout: Duration,

    /// Credential validator settings.
    pub validator: ValidatorConfig,

    /// Validate the credential once at startup.
    pub validate_on_startup: bool,

    /// HTTP listen address.
    pub bind_address: SocketAddr,
}

impl ServerConfig {
    /// Load from the process environment and the settings file named by
    /// `GRAPH_MCP_CONFIG`.
    pub fn from_process() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
        let chain = ConfigChain::from_process(path)?;
        Self::from_chain(&chain)
    }

    /// Read every setting from a chain.
    pub fn from_chain(chain: &ConfigChain) -> Result<Self, ConfigError> {
        let endpoints = GraphEndpoints {
            graph_base_url: chain
                .get(GRAPH_SECTION, "BaseUrl")
                .unwrap_or_else(|| GRAPH_V1_BASE_URL.to_string()),
            authority_host: chain
                .get(AZURE_AD_SECTION, "Instance")
                .unwrap_or_else(|| PUBLIC_CLOUD_AUTHORITY.to_string()),
        };

        let timeout_secs =
            chain.get_parsed(VALIDATION_SECTION, "TimeoutSecs", DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "Validation:TimeoutSecs".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        let min_secret_length = chain.get_parsed(
            VALIDATION_SECTION,
            "MinSecretLength",
            graph_auth::validation::DEFAULT_MIN_SECRET_LENGTH,
        );
        let permission_policy = if chain.get_flag(VALIDATION_SECTION, "StrictPermissions") {
            PermissionPolicy::Strict
        } else {
            PermissionPolicy::Lenient
        };

        let validator = ValidatorConfig {
            min_secret_length: (min_secret_length > 0).then_some(min_secret_length),
            check_permissions: chain.get_flag_or(VALIDATION_SECTION, "CheckPermissions", true),
            permission_policy,
        };

        let bind_address = match chain.get(SERVER_SECTION, "BindAddress") {
            Some(raw) => raw.parse().map_err(|e| ConfigError::InvalidValue {
                key: "Server:BindAddress".to_string(),
                message: format!("{}: {}", raw, e),
            })?,
            None => DEFAULT_BIND_ADDRESS
                .parse()
                .map_err(|e| ConfigError::InvalidValue {
                    key: "Server:BindAddress".to_string(),
                    message: format!("{}", e),
                })?,
        };

        Ok(Self {
            credentials: CredentialConfig::from_chain(chain),
            security: SecurityConfig::from_chain(chain),
            endpoints,
            timeout: Duration::from_secs(timeout_secs),
            validator,
            validate_on_startup: chain.get_flag_or(VALIDATION_SECTION, "OnStartup", true),
            bind_address,
        })
    }

    /// Connector for validation probes and directory tools.
    pub fn connector(&self) -> GraphConnector {
        GraphConnector::new(self.endpoints.clone(), self.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph_auth::JsonConfigStore;
    use serde_json::json;

    fn chain(value: serde_json::Value) -> ConfigChain {
        ConfigChain::new().with_source(JsonConfigStore::from_value(value))
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_chain(&ConfigChain::new()).unwrap();

        assert_eq!(config.bind_address.to_string(), DEFAULT_BIND_ADDRESS);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.endpoints, GraphEndpoints::default());
        assert_eq!(config.validator, ValidatorConfig::default());
        assert!(config.validate_on_startup);
        assert!(config.credentials.tenant().is_none());
    }

    #[test]
    fn test_full_settings() {
        let config = ServerConfig::from_chain(&chain(json!({
            "AzureAd": {
                "TenantId": "6b104499-c49f-45dc-b3a2-df95efd6eeb4",
                "Instance": "https://login.microsoftonline.us"
            },
            "Security": {
                "CorporateTenantIds": ["11111111-2222-3333-4444-555555555555"],
                "RequireConfirmationForAllMutations": true
            },
            "Graph": { "BaseUrl": "https://graph.microsoft.us/v1.0" },
            "Validation": {
                "TimeoutSecs": 2,
                "MinSecretLength": 0,
                "CheckPermissions": false,
                "StrictPermissions": true,
                "OnStartup": false
            },
            "Server": { "BindAddress": "0.0.0.0:8080" }
        })))
        .unwrap();

        assert_eq!(config.endpoints.authority_host, "https://login.microsoftonline.us");
        assert_eq!(config.endpoints.graph_base_url, "https://graph.microsoft.us/v1.0");
        assert_eq!(config.timeout, Duration::from_secs(2));
        assert_eq!(config.validator.min_secret_length, None);
        assert!(!config.validator.check_permissions);
        assert_eq!(config.validator.permission_policy, PermissionPolicy::Strict);
        assert!(!config.validate_on_startup);
        assert_eq!(config.bind_address.port(), 8080);
        assert!(config.security.require_confirmation_for_all_mutations);
        assert_eq!(config.security.corporate_tenant_ids.len(), 1);
    }

    #[test]
    fn test_invalid_bind_address() {
        let result = ServerConfig::from_chain(&chain(json!({
            "Server": { "BindAddress": "localhost" }
        })));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = ServerConfig::from_chain(&chain(json!({
            "Validation": { "TimeoutSecs": 0 }
        })));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_options_follow_endpoints() {
        let config = ServerConfig::from_chain(&chain(json!({
            "AzureAd": { "Instance": "http://127.0.0.1:9999" },
            "Validation": { "TimeoutSecs": 3 }
        })))
        .unwrap();

        let connector = config.connector();
        assert_eq!(connector.timeout(), Duration::from_secs(3));
        assert_eq!(connector.credential_options().authority_host, "http://127.0.0.1:9999");
    }
}
