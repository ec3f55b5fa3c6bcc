//! Credential status report.
//!
//! Runs the [`CredentialValidator`] on demand and shapes the verdict for the
//! status endpoint, the `graph_credential_status` tool and the startup log.

use chrono::{DateTime, Utc};
use graph_auth::{
    AuthenticationMethod, CredentialConfig, CredentialValidator, ValidationItem, ValidationMode,
    ValidationVerdict,
};
use serde::Serialize;
use tracing::{info, instrument, warn};

/// Serialized credential status.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    /// Credential is usable
    pub is_valid: bool,
    /// Validation outcome
    pub mode: ValidationMode,
    /// Method the resolver picked
    pub authentication_method: AuthenticationMethod,
    /// One-line outcome
    pub message: String,
    /// Human readable check list
    pub summary: String,
    /// Individual checks, in the order they ran
    pub validation_items: Vec<ValidationItem>,
    /// Remediation steps
    pub suggestions: Vec<String>,
    /// Diagnostic details
    pub details: Vec<String>,
    /// When the check ran
    pub checked_at: DateTime<Utc>,
}

impl StatusReport {
    /// Shape a verdict.
    pub fn from_verdict(verdict: &ValidationVerdict, method: AuthenticationMethod) -> Self {
        Self {
            is_valid: verdict.is_valid(),
            mode: verdict.mode(),
            authentication_method: method,
            message: verdict.message().to_string(),
            summary: verdict.summary(),
            validation_items: verdict.items().to_vec(),
            suggestions: verdict.suggestions().to_vec(),
            details: verdict.details().to_vec(),
            checked_at: Utc::now(),
        }
    }
}

/// Validates the configured credential on demand.
#[derive(Clone)]
pub struct StatusService {
    validator: CredentialValidator,
    credentials: CredentialConfig,
    method: AuthenticationMethod,
}

impl StatusService {
    /// Create a status service for a configuration snapshot.
    pub fn new(
        validator: CredentialValidator,
        credentials: CredentialConfig,
        method: AuthenticationMethod,
    ) -> Self {
        Self {
            validator,
            credentials,
            method,
        }
    }

    /// Method the resolver picked.
    pub fn method(&self) -> AuthenticationMethod {
        self.method
    }

    /// Validate now.
    #[instrument(skip(self), fields(method = %self.method))]
    pub async fn check(&self) -> StatusReport {
        let verdict = self.validator.validate_config(&self.credentials).await;
        StatusReport::from_verdict(&verdict, self.method)
    }

    /// Validate and log the outcome. Used once at startup.
    pub async fn check_and_log(&self) -> StatusReport {
        let report = self.check().await;

        if report.is_valid {
            info!(mode = %report.mode, "Credential validation: {}", report.message);
        } else {
            warn!(mode = %report.mode, "Credential validation: {}", report.message);
        }
        for line in report.summary.lines().filter(|l| !l.trim().is_empty()) {
            if report.is_valid {
                info!("{}", line);
            } else {
                warn!("{}", line);
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph_auth::{DirectoryClient, DirectoryConnector, ValidatorConfig};
    use std::sync::Arc;

    struct UnusedConnector;

    impl DirectoryConnector for UnusedConnector {
        fn connect(&self, _t: &str, _c: &str, _s: &str) -> Arc<dyn DirectoryClient> {
            panic!("format checks fail before any connection")
        }
    }

    fn service(credentials: CredentialConfig) -> StatusService {
        let validator =
            CredentialValidator::new(Arc::new(UnusedConnector), ValidatorConfig::default());
        StatusService::new(validator, credentials, AuthenticationMethod::Demo)
    }

    #[tokio::test]
    async fn test_demo_report() {
        let report = service(CredentialConfig::default()).check().await;

        assert!(!report.is_valid);
        assert_eq!(report.mode, ValidationMode::Demo);
        assert_eq!(report.authentication_method, AuthenticationMethod::Demo);
        assert!(report.summary.contains("Suggestions:"));
    }

    #[tokio::test]
    async fn test_report_serialization() {
        let report = service(CredentialConfig::client_secret(
            "not-a-guid",
            "12345678-1234-1234-1234-123456789012",
            "somesecret123",
        ))
        .check_and_log()
        .await;

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["isValid"], false);
        assert_eq!(json["mode"], "Invalid");
        assert_eq!(json["authenticationMethod"], "Demo");
        assert!(json["validationItems"].is_array());
        assert!(json["checkedAt"].is_string());
        assert_eq!(json["validationItems"][0]["isValid"], true);
        assert_eq!(json["validationItems"][1]["isValid"], false);
    }
}
