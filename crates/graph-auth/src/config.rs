//! Layered configuration lookup.
//!
//! Values are addressed as `Section:Key` and resolved through an ordered
//! chain of sources, first non-empty hit wins:
//!
//! 1. `Section__Key` environment variables (process wrappers)
//! 2. `SECTION_KEY` environment variables, e.g. `AZURE_AD_TENANTID`
//! 3. a JSON document in the `appsettings.json` shape
//!
//! Sources take a snapshot when they are built, so a chain never observes
//! the environment changing underneath it.

use crate::error::ConfigError;
use crate::safety::{is_placeholder_tenant, is_valid_guid, TenantPolicy};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

/// Section holding Azure AD credential settings.
pub const AZURE_AD_SECTION: &str = "AzureAd";

/// Section holding tenant safety settings.
pub const SECURITY_SECTION: &str = "Security";

/// A single configuration lookup strategy.
pub trait ConfigSource: Send + Sync {
    /// Source name, used in diagnostics.
    fn name(&self) -> &str;

    /// Look up `section:key`. Empty values count as absent.
    fn lookup(&self, section: &str, key: &str) -> Option<String>;
}

/// Environment variables named `{Section}__{Key}`.
#[derive(Debug, Clone, Default)]
pub struct HierarchicalEnvSource {
    vars: HashMap<String, String>,
}

impl HierarchicalEnvSource {
    /// Snapshot the process environment.
    pub fn from_env() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Build from explicit variables.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Variable name for a key.
    pub fn var_name(section: &str, key: &str) -> String {
        format!("{}__{}", section, key)
    }
}

impl ConfigSource for HierarchicalEnvSource {
    fn name(&self) -> &str {
        "hierarchical-env"
    }

    fn lookup(&self, section: &str, key: &str) -> Option<String> {
        self.vars
            .get(&Self::var_name(section, key))
            .filter(|v| !v.is_empty())
            .cloned()
    }
}

/// Environment variables named `{SECTION_UPPER_SNAKE}_{KEYUPPER}`.
#[derive(Debug, Clone, Default)]
pub struct FlatEnvSource {
    vars: HashMap<String, String>,
}

impl FlatEnvSource {
    /// Snapshot the process environment.
    pub fn from_env() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Build from explicit variables.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Variable name for a key: `AzureAd:TenantId` becomes `AZURE_AD_TENANTID`.
    pub fn var_name(section: &str, key: &str) -> String {
        format!("{}_{}", upper_snake(section), key.to_uppercase())
    }
}

impl ConfigSource for FlatEnvSource {
    fn name(&self) -> &str {
        "flat-env"
    }

    fn lookup(&self, section: &str, key: &str) -> Option<String> {
        self.vars
            .get(&Self::var_name(section, key))
            .filter(|v| !v.is_empty())
            .cloned()
    }
}

fn upper_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for ch in name.chars() {
        if ch.is_ascii_uppercase() && prev_lower {
            out.push('_');
        }
        prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        out.push(ch.to_ascii_uppercase());
    }
    out
}

/// Structured JSON configuration store.
///
/// Section and key matching is case-insensitive. Scalars are returned as
/// strings; arrays of scalars are joined with commas.
#[derive(Debug, Clone)]
pub struct JsonConfigStore {
    root: Value,
}

impl Default for JsonConfigStore {
    fn default() -> Self {
        Self {
            root: Value::Object(Default::default()),
        }
    }
}

impl JsonConfigStore {
    /// Wrap an already parsed document.
    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    /// Parse a JSON document.
    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::from_value(serde_json::from_str(json)?))
    }

    /// Load a file. A missing file yields an empty store.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();

        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Configuration file not found, using empty store");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Unreadable {
                    path: display,
                    source,
                })
            }
        };

        Self::parse(&text).map_err(|source| ConfigError::Malformed {
            path: display,
            source,
        })
    }

    fn child<'a>(node: &'a Value, name: &str) -> Option<&'a Value> {
        node.as_object()?
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    fn render(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::Array(items) => {
                let joined = items
                    .iter()
                    .filter_map(|item| match item {
                        Value::Array(_) | Value::Object(_) | Value::Null => None,
                        scalar => Self::render(scalar),
                    })
                    .collect::<Vec<_>>()
                    .join(",");
                Some(joined)
            }
            Value::Null | Value::Object(_) => None,
        }
    }
}

impl ConfigSource for JsonConfigStore {
    fn name(&self) -> &str {
        "json-store"
    }

    fn lookup(&self, section: &str, key: &str) -> Option<String> {
        let node = Self::child(&self.root, section)?;
        let value = Self::child(node, key)?;
        Self::render(value).filter(|v| !v.is_empty())
    }
}

/// Parse a boolean flag. Accepts `true`, `yes`, `1` and `on`, ignoring case
/// and surrounding whitespace. Everything else is false.
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "true" | "yes" | "1" | "on"
    )
}

/// Ordered chain of configuration sources.
#[derive(Default)]
pub struct ConfigChain {
    sources: Vec<Box<dyn ConfigSource>>,
}

impl std::fmt::Debug for ConfigChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.sources.iter().map(|s| s.name()))
            .finish()
    }
}

impl ConfigChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source. Earlier sources take precedence.
    pub fn with_source(mut self, source: impl ConfigSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// The standard chain over the process environment and a JSON file.
    pub fn from_process(config_path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Ok(Self::new()
            .with_source(HierarchicalEnvSource::from_env())
            .with_source(FlatEnvSource::from_env())
            .with_source(JsonConfigStore::load(config_path)?))
    }

    /// Names of the sources, in lookup order.
    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Look up a value.
    pub fn get(&self, section: &str, key: &str) -> Option<String> {
        for source in &self.sources {
            if let Some(value) = source.lookup(section, key) {
                debug!(section, key, source = source.name(), "Resolved configuration value");
                return Some(value);
            }
        }
        debug!(section, key, "No configuration value found");
        None
    }

    /// Look up a boolean flag, false when absent.
    pub fn get_flag(&self, section: &str, key: &str) -> bool {
        self.get_flag_or(section, key, false)
    }

    /// Look up a boolean flag with an explicit default.
    pub fn get_flag_or(&self, section: &str, key: &str, default: bool) -> bool {
        self.get(section, key)
            .map(|v| parse_flag(&v))
            .unwrap_or(default)
    }

    /// Look up and parse a value. Unparsable values fall back to the default.
    pub fn get_parsed<T: FromStr>(&self, section: &str, key: &str, default: T) -> T {
        match self.get(section, key) {
            Some(raw) => match raw.trim().parse() {
                Ok(value) => value,
                Err(_) => {
                    warn!(section, key, value = %raw, "Ignoring unparsable configuration value");
                    default
                }
            },
            None => default,
        }
    }

    /// Look up a comma separated list.
    pub fn get_list(&self, section: &str, key: &str) -> Vec<String> {
        self.get(section, key)
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Immutable snapshot of the `AzureAd` section.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialConfig {
    /// Directory (tenant) ID.
    pub tenant_id: Option<String>,
    /// Application (client) ID.
    pub client_id: Option<String>,
    /// Client secret.
    pub client_secret: Option<String>,
    /// Use the Azure CLI login.
    pub use_azure_cli: bool,
    /// Use the managed identity endpoint.
    pub use_managed_identity: bool,
    /// Use the VS Code account.
    pub use_vscode: bool,
    /// Use the default credential chain.
    pub use_default_chain: bool,
}

impl std::fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialConfig")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("use_azure_cli", &self.use_azure_cli)
            .field("use_managed_identity", &self.use_managed_identity)
            .field("use_vscode", &self.use_vscode)
            .field("use_default_chain", &self.use_default_chain)
            .finish()
    }
}

impl CredentialConfig {
    /// Snapshot the credential settings from a chain.
    pub fn from_chain(chain: &ConfigChain) -> Self {
        Self {
            tenant_id: chain.get(AZURE_AD_SECTION, "TenantId"),
            client_id: chain.get(AZURE_AD_SECTION, "ClientId"),
            client_secret: chain.get(AZURE_AD_SECTION, "ClientSecret"),
            use_azure_cli: chain.get_flag(AZURE_AD_SECTION, "UseAzureCli"),
            use_managed_identity: chain.get_flag(AZURE_AD_SECTION, "UseManagedIdentity"),
            use_vscode: chain.get_flag(AZURE_AD_SECTION, "UseVSCode"),
            use_default_chain: chain.get_flag(AZURE_AD_SECTION, "UseDefaultChain"),
        }
    }

    /// Client secret triple with explicit values.
    pub fn client_secret(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: Some(tenant_id.into()),
            client_id: Some(client_id.into()),
            client_secret: Some(client_secret.into()),
            ..Self::default()
        }
    }

    /// Tenant ID, if present and non-empty.
    pub fn tenant(&self) -> Option<&str> {
        self.tenant_id.as_deref().filter(|t| !t.is_empty())
    }

    /// Client ID usable as a user-assigned managed identity. Placeholder and
    /// malformed values yield `None` so the system-assigned identity is used.
    pub fn user_assigned_client_id(&self) -> Option<&str> {
        self.client_id
            .as_deref()
            .map(str::trim)
            .filter(|c| is_valid_guid(c) && !is_placeholder_tenant(c))
    }
}

/// Snapshot of the `Security` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityConfig {
    /// Additional corporate tenant IDs.
    pub corporate_tenant_ids: Vec<String>,
    /// Require confirmation for every mutating operation.
    pub require_confirmation_for_all_mutations: bool,
}

impl SecurityConfig {
    /// Snapshot the security settings from a chain.
    pub fn from_chain(chain: &ConfigChain) -> Self {
        Self {
            corporate_tenant_ids: chain.get_list(SECURITY_SECTION, "CorporateTenantIds"),
            require_confirmation_for_all_mutations: chain
                .get_flag(SECURITY_SECTION, "RequireConfirmationForAllMutations"),
        }
    }

    /// Build the tenant policy.
    pub fn policy(&self) -> TenantPolicy {
        TenantPolicy::new(
            &self.corporate_tenant_ids,
            self.require_confirmation_for_all_mutations,
        )
    }
}
