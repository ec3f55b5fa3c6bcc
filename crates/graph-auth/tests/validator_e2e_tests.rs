//! End-to-End tests for credential validation against a mocked identity
//! provider and Microsoft Graph.
//!
//! A single wiremock server plays both roles: the token endpoint lives at
//! `/{tenant}/oauth2/v2.0/token` and Graph at `/v1.0/...`.
//!
//! Test flows:
//! 1. Format failures never reach the network
//! 2. Successful authentication and permission probes
//! 3. Identity provider rejections with targeted remediation
//! 4. Graph authorization failures
//! 5. Timeouts and malformed responses

use graph_auth::credential::{CredentialOptions, ManagedIdentityCredential, TokenCredential};
use graph_auth::directory::{DirectoryClient, DirectoryConnector, GraphConnector, GraphEndpoints};
use graph_auth::{CredentialValidator, PermissionPolicy, ValidationMode, ValidatorConfig};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{any, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TENANT: &str = "6b104499-c49f-45dc-b3a2-df95efd6eeb4";
const CLIENT: &str = "0f3c1a2b-4d5e-4f60-8a9b-0c1d2e3f4a5b";
const SECRET: &str = "s3cr3t-value-123";

/// Test fixture providing a mock identity provider and Graph endpoint.
struct TestFixture {
    /// Mock server.
    server: MockServer,
    /// Endpoints pointing at the mock server.
    endpoints: GraphEndpoints,
}

impl TestFixture {
    /// Create a new test fixture.
    async fn new() -> Self {
        let server = MockServer::start().await;
        let endpoints = GraphEndpoints {
            graph_base_url: format!("{}/v1.0", server.uri()),
            authority_host: server.uri(),
        };
        Self { server, endpoints }
    }

    fn token_path() -> String {
        format!("/{}/oauth2/v2.0/token", TENANT)
    }

    fn connector(&self, timeout: Duration) -> GraphConnector {
        GraphConnector::new(self.endpoints.clone(), timeout)
    }

    fn validator(&self, config: ValidatorConfig) -> CredentialValidator {
        CredentialValidator::new(Arc::new(self.connector(Duration::from_secs(5))), config)
    }

    /// Mount a successful token response.
    async fn mount_token(&self) {
        Mock::given(method("POST"))
            .and(path(Self::token_path()))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains(format!("client_id={}", CLIENT)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token_type": "Bearer",
                "expires_in": 3599,
                "access_token": "test-graph-token"
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount a token rejection.
    async fn mount_token_error(&self, status: u16, error: &str, description: &str) {
        Mock::given(method("POST"))
            .and(path(Self::token_path()))
            .respond_with(ResponseTemplate::new(status).set_body_json(serde_json::json!({
                "error": error,
                "error_description": description,
                "error_codes": [90002]
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount a Graph collection response.
    async fn mount_graph(&self, collection: &str, status: u16, body: serde_json::Value, times: u64) {
        Mock::given(method("GET"))
            .and(path(format!("/v1.0/{}", collection)))
            .and(header("Authorization", "Bearer test-graph-token"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .expect(times)
            .mount(&self.server)
            .await;
    }
}

fn forbidden_body() -> serde_json::Value {
    serde_json::json!({
        "error": {
            "code": "Authorization_RequestDenied",
            "message": "Insufficient privileges to complete the operation."
        }
    })
}

// =============================================================================
// Format failures
// =============================================================================

/// Empty credentials are demo mode and never touch the network.
#[tokio::test]
async fn test_empty_credentials_demo_mode() {
    let fixture = TestFixture::new().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&fixture.server)
        .await;

    let verdict = fixture
        .validator(ValidatorConfig::default())
        .validate(Some(""), Some(""), Some(""))
        .await;

    assert_eq!(verdict.mode(), ValidationMode::Demo);
    assert!(!verdict.is_valid());
    assert!(verdict
        .suggestions()
        .iter()
        .any(|s| s.contains("Configure Azure AD credentials")));
}

/// A malformed tenant is reported as invalid before any network call.
#[tokio::test]
async fn test_malformed_tenant_invalid() {
    let fixture = TestFixture::new().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&fixture.server)
        .await;

    let verdict = fixture
        .validator(ValidatorConfig::default())
        .validate(
            Some("not-a-guid"),
            Some("12345678-1234-1234-1234-123456789012"),
            Some("somesecret123"),
        )
        .await;

    assert_eq!(verdict.mode(), ValidationMode::Invalid);
    assert!(verdict.message().contains("Tenant ID format"));
}

// =============================================================================
// Successful validation
// =============================================================================

/// Token plus both probes succeed.
#[tokio::test]
async fn test_production_credentials() {
    let fixture = TestFixture::new().await;
    fixture.mount_token().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/applications"))
        .and(query_param("$top", "1"))
        .and(header("Authorization", "Bearer test-graph-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [{"id": "app-1", "displayName": "Graph MCP"}]
        })))
        .expect(1)
        .mount(&fixture.server)
        .await;
    fixture
        .mount_graph("users", 200, serde_json::json!({"value": []}), 1)
        .await;

    let verdict = fixture
        .validator(ValidatorConfig::default())
        .validate(Some(TENANT), Some(CLIENT), Some(SECRET))
        .await;

    assert_eq!(verdict.mode(), ValidationMode::Production);
    assert!(verdict.is_valid());
    assert!(verdict.details().iter().any(|d| d.contains(TENANT)));
    assert!(verdict.summary().contains("✓ Graph API permissions verified"));
}

/// A refused user probe keeps the verdict valid by default.
#[tokio::test]
async fn test_secondary_probe_forbidden_lenient() {
    let fixture = TestFixture::new().await;
    fixture.mount_token().await;
    fixture
        .mount_graph("applications", 200, serde_json::json!({"value": []}), 1)
        .await;
    fixture.mount_graph("users", 403, forbidden_body(), 1).await;

    let verdict = fixture
        .validator(ValidatorConfig::default())
        .validate(Some(TENANT), Some(CLIENT), Some(SECRET))
        .await;

    assert_eq!(verdict.mode(), ValidationMode::Production);
    assert!(verdict.is_valid());
    assert!(verdict.summary().contains("✗ Insufficient Graph API permissions"));
    assert!(!verdict.suggestions().is_empty());
}

/// A refused user probe fails validation under the strict policy.
#[tokio::test]
async fn test_secondary_probe_forbidden_strict() {
    let fixture = TestFixture::new().await;
    fixture.mount_token().await;
    fixture
        .mount_graph("applications", 200, serde_json::json!({"value": []}), 1)
        .await;
    fixture.mount_graph("users", 403, forbidden_body(), 1).await;

    let verdict = fixture
        .validator(ValidatorConfig {
            permission_policy: PermissionPolicy::Strict,
            ..ValidatorConfig::default()
        })
        .validate(Some(TENANT), Some(CLIENT), Some(SECRET))
        .await;

    assert_eq!(verdict.mode(), ValidationMode::InsufficientPermissions);
    assert!(!verdict.is_valid());
}

// =============================================================================
// Identity provider rejections
// =============================================================================

/// Unknown tenant yields the tenant-specific suggestion.
#[tokio::test]
async fn test_tenant_not_found() {
    let fixture = TestFixture::new().await;
    fixture
        .mount_token_error(
            400,
            "invalid_request",
            "AADSTS90002: Tenant '6b104499-c49f-45dc-b3a2-df95efd6eeb4' not found. Check to make sure you have the correct tenant ID.",
        )
        .await;
    fixture
        .mount_graph("applications", 200, serde_json::json!({"value": []}), 0)
        .await;

    let verdict = fixture
        .validator(ValidatorConfig::default())
        .validate(Some(TENANT), Some(CLIENT), Some(SECRET))
        .await;

    assert_eq!(verdict.mode(), ValidationMode::AuthenticationFailed);
    assert!(!verdict.is_valid());
    assert_eq!(
        verdict.suggestions(),
        &["Tenant not found. Verify the Tenant ID is correct".to_string()]
    );
    assert!(verdict.details()[0].contains("AADSTS90002"));
}

/// Wrong secret yields the secret-specific suggestion.
#[tokio::test]
async fn test_invalid_client_secret() {
    let fixture = TestFixture::new().await;
    fixture
        .mount_token_error(
            401,
            "invalid_client",
            "AADSTS7000215: Invalid client secret provided. Ensure the secret being sent in the request is the client secret value, not the client secret ID.",
        )
        .await;

    let verdict = fixture
        .validator(ValidatorConfig::default())
        .validate(Some(TENANT), Some(CLIENT), Some(SECRET))
        .await;

    assert_eq!(verdict.mode(), ValidationMode::AuthenticationFailed);
    assert!(verdict.suggestions()[0].starts_with("Invalid client secret provided"));
}

/// Graph rejecting the token itself is an authentication failure with the
/// generic remediation list.
#[tokio::test]
async fn test_graph_rejects_token() {
    let fixture = TestFixture::new().await;
    fixture.mount_token().await;
    fixture
        .mount_graph(
            "applications",
            401,
            serde_json::json!({"error": {"code": "InvalidAuthenticationToken", "message": "Access token validation failure."}}),
            1,
        )
        .await;

    let verdict = fixture
        .validator(ValidatorConfig::default())
        .validate(Some(TENANT), Some(CLIENT), Some(SECRET))
        .await;

    assert_eq!(verdict.mode(), ValidationMode::AuthenticationFailed);
    assert_eq!(verdict.suggestions().len(), 3);
}

/// Repeating a validation against unchanged remote state yields the same mode.
#[tokio::test]
async fn test_validation_idempotent() {
    let fixture = TestFixture::new().await;
    Mock::given(method("POST"))
        .and(path(TestFixture::token_path()))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_request",
            "error_description": "AADSTS90002: Tenant not found."
        })))
        .expect(2)
        .mount(&fixture.server)
        .await;

    let validator = fixture.validator(ValidatorConfig::default());
    let first = validator.validate(Some(TENANT), Some(CLIENT), Some(SECRET)).await;
    let second = validator.validate(Some(TENANT), Some(CLIENT), Some(SECRET)).await;

    assert_eq!(first.mode(), ValidationMode::AuthenticationFailed);
    assert_eq!(first.mode(), second.mode());
}

// =============================================================================
// Authorization, timeouts, malformed responses
// =============================================================================

/// 403 on the primary probe is insufficient permissions.
#[tokio::test]
async fn test_primary_probe_forbidden() {
    let fixture = TestFixture::new().await;
    fixture.mount_token().await;
    fixture
        .mount_graph("applications", 403, forbidden_body(), 1)
        .await;
    fixture
        .mount_graph("users", 200, serde_json::json!({"value": []}), 0)
        .await;

    let verdict = fixture
        .validator(ValidatorConfig::default())
        .validate(Some(TENANT), Some(CLIENT), Some(SECRET))
        .await;

    assert_eq!(verdict.mode(), ValidationMode::InsufficientPermissions);
    assert!(verdict
        .suggestions()
        .contains(&"Grant admin consent for required Microsoft Graph API permissions".to_string()));
}

/// A hanging identity provider is cut off and reported as unknown error.
#[tokio::test]
async fn test_timeout_unknown_error() {
    let fixture = TestFixture::new().await;
    Mock::given(method("POST"))
        .and(path(TestFixture::token_path()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"access_token": "late", "expires_in": 3599}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&fixture.server)
        .await;

    let validator = CredentialValidator::new(
        Arc::new(fixture.connector(Duration::from_millis(200))),
        ValidatorConfig::default(),
    );
    let verdict = validator
        .validate(Some(TENANT), Some(CLIENT), Some(SECRET))
        .await;

    assert_eq!(verdict.mode(), ValidationMode::UnknownError);
    assert!(verdict
        .suggestions()
        .iter()
        .any(|s| s.contains("network connectivity")));
}

/// A success status with a body that is not a Graph collection.
#[tokio::test]
async fn test_malformed_graph_response() {
    let fixture = TestFixture::new().await;
    fixture.mount_token().await;
    Mock::given(method("GET"))
        .and(path("/v1.0/applications"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
        .mount(&fixture.server)
        .await;

    let verdict = fixture
        .validator(ValidatorConfig::default())
        .validate(Some(TENANT), Some(CLIENT), Some(SECRET))
        .await;

    assert_eq!(verdict.mode(), ValidationMode::UnknownError);
}

// =============================================================================
// Directory client and credentials
// =============================================================================

/// Creating an item posts JSON with the bearer token.
#[tokio::test]
async fn test_directory_create() {
    let fixture = TestFixture::new().await;
    fixture.mount_token().await;
    Mock::given(method("POST"))
        .and(path("/v1.0/groups"))
        .and(header("Authorization", "Bearer test-graph-token"))
        .and(body_string_contains("Engineering"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": "group-1",
            "displayName": "Engineering"
        })))
        .expect(1)
        .mount(&fixture.server)
        .await;

    let client = fixture
        .connector(Duration::from_secs(5))
        .connect(TENANT, CLIENT, SECRET);
    let created = client
        .create(
            "groups",
            serde_json::json!({"displayName": "Engineering", "mailEnabled": false}),
        )
        .await
        .expect("Should create group");

    assert_eq!(created["id"], "group-1");
}

/// Organization lookup returns the first record.
#[tokio::test]
async fn test_directory_organization() {
    let fixture = TestFixture::new().await;
    fixture.mount_token().await;
    fixture
        .mount_graph(
            "organization",
            200,
            serde_json::json!({"value": [{"id": TENANT, "displayName": "Contoso", "tenantType": "AAD"}]}),
            1,
        )
        .await;

    let client = fixture
        .connector(Duration::from_secs(5))
        .connect(TENANT, CLIENT, SECRET);
    let org = client
        .organization()
        .await
        .expect("Should read organization")
        .expect("Should have a record");

    assert_eq!(org["displayName"], "Contoso");
}

/// Managed identity sends the metadata header and parses string expiry.
#[tokio::test]
async fn test_managed_identity_token() {
    let fixture = TestFixture::new().await;
    Mock::given(method("GET"))
        .and(path("/metadata/identity/oauth2/token"))
        .and(header("Metadata", "true"))
        .and(query_param("resource", "https://graph.microsoft.com"))
        .and(query_param("client_id", CLIENT))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "mi-token",
            "expires_in": "86399",
            "resource": "https://graph.microsoft.com",
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&fixture.server)
        .await;

    let options = CredentialOptions::default()
        .with_imds_endpoint(format!("{}/metadata/identity/oauth2/token", fixture.server.uri()));
    let credential = ManagedIdentityCredential::new(Some(CLIENT.to_string()), options);
    let token = credential
        .get_token(graph_auth::GRAPH_SCOPE)
        .await
        .expect("Should acquire token");

    assert_eq!(token.token, "mi-token");
    assert!(!token.is_expired());
}
