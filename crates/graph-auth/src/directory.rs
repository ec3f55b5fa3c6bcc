//! Microsoft Graph directory access.
//!
//! [`DirectoryClient`] is the narrow surface the validator and the MCP
//! tools need. [`GraphDirectoryClient`] implements it over HTTP with a
//! bounded timeout on every call; tests substitute their own client.

use crate::credential::{ClientSecretCredential, CredentialOptions, TokenCredential, GRAPH_SCOPE};
use crate::error::{DirectoryError, DirectoryResult};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Microsoft Graph v1.0 endpoint.
pub const GRAPH_V1_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// Read and write access to directory collections.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// List a collection, e.g. `users`, with OData query parameters.
    async fn list(&self, collection: &str, query: &[(&str, String)]) -> DirectoryResult<Vec<Value>>;

    /// Create an item in a collection.
    async fn create(&self, collection: &str, body: Value) -> DirectoryResult<Value>;

    /// List up to `top` applications.
    async fn list_applications(&self, top: u32) -> DirectoryResult<Vec<Value>> {
        self.list("applications", &[("$top", top.to_string())]).await
    }

    /// List up to `top` users.
    async fn list_users(&self, top: u32) -> DirectoryResult<Vec<Value>> {
        self.list("users", &[("$top", top.to_string())]).await
    }

    /// The organization record of the signed-in tenant.
    async fn organization(&self) -> DirectoryResult<Option<Value>> {
        Ok(self.list("organization", &[]).await?.into_iter().next())
    }
}

/// Endpoints used to reach the identity provider and Graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphEndpoints {
    /// Graph base URL, including the API version.
    pub graph_base_url: String,
    /// Identity provider authority host.
    pub authority_host: String,
}

impl Default for GraphEndpoints {
    fn default() -> Self {
        Self {
            graph_base_url: GRAPH_V1_BASE_URL.to_string(),
            authority_host: crate::credential::PUBLIC_CLOUD_AUTHORITY.to_string(),
        }
    }
}

impl GraphEndpoints {
    /// Build a full URL for a collection.
    pub fn url(&self, collection: &str) -> String {
        let base = self.graph_base_url.trim_end_matches('/');
        let path = collection.trim_start_matches('/');
        format!("{}/{}", base, path)
    }
}

#[derive(Deserialize)]
struct GraphErrorBody {
    error: GraphErrorDetail,
}

#[derive(Deserialize)]
struct GraphErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Graph client over HTTP.
#[derive(Clone)]
pub struct GraphDirectoryClient {
    client: Client,
    credential: Arc<dyn TokenCredential>,
    endpoints: GraphEndpoints,
    timeout: Duration,
}

impl GraphDirectoryClient {
    /// Create a Graph client sharing `client`'s connection pool.
    pub fn new(
        client: Client,
        credential: Arc<dyn TokenCredential>,
        endpoints: GraphEndpoints,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            credential,
            endpoints,
            timeout,
        }
    }

    /// Token acquisition plus the request, under one timeout.
    async fn send(&self, request: RequestBuilder) -> DirectoryResult<Value> {
        tokio::time::timeout(self.timeout, self.send_authorized(request))
            .await
            .map_err(|_| DirectoryError::Timeout(self.timeout))?
    }

    async fn send_authorized(&self, request: RequestBuilder) -> DirectoryResult<Value> {
        let token = self.credential.get_token(GRAPH_SCOPE).await?;
        let response = request.bearer_auth(token.token).send().await?;
        self.handle_response(response).await
    }

    async fn handle_response(&self, response: Response) -> DirectoryResult<Value> {
        let status = response.status();

        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| DirectoryError::InvalidResponse(e.to_string()));
        }

        let text = response.text().await.unwrap_or_default();
        let (code, message) = match serde_json::from_str::<GraphErrorBody>(&text) {
            Ok(body) => (body.error.code, body.error.message),
            Err(_) => (String::new(), text),
        };
        warn!(status = status.as_u16(), code = %code, "Graph API error: {}", message);

        Err(match status.as_u16() {
            401 => DirectoryError::Authentication(message),
            403 => DirectoryError::Forbidden { code, message },
            404 => DirectoryError::NotFound(message),
            status => DirectoryError::Api { status, message },
        })
    }
}

#[async_trait]
impl DirectoryClient for GraphDirectoryClient {
    #[instrument(skip(self, query), fields(credential = self.credential.kind()))]
    async fn list(&self, collection: &str, query: &[(&str, String)]) -> DirectoryResult<Vec<Value>> {
        debug!("Listing {}", collection);

        let request = self.client.get(self.endpoints.url(collection)).query(query);
        let body = self.send(request).await?;

        match body.get("value") {
            Some(Value::Array(items)) => Ok(items.clone()),
            _ => Err(DirectoryError::InvalidResponse(format!(
                "{} response has no value array",
                collection
            ))),
        }
    }

    #[instrument(skip(self, body), fields(credential = self.credential.kind()))]
    async fn create(&self, collection: &str, body: Value) -> DirectoryResult<Value> {
        debug!("Creating item in {}", collection);

        let request = self.client.post(self.endpoints.url(collection)).json(&body);
        self.send(request).await
    }
}

/// Builds directory clients for an explicit credential triple.
pub trait DirectoryConnector: Send + Sync {
    /// Connect with a client secret credential. Must not perform I/O.
    fn connect(
        &self,
        tenant_id: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Arc<dyn DirectoryClient>;
}

/// Connector producing [`GraphDirectoryClient`]s.
#[derive(Debug, Clone)]
pub struct GraphConnector {
    endpoints: GraphEndpoints,
    timeout: Duration,
    http: Client,
}

impl GraphConnector {
    /// Create a connector.
    pub fn new(endpoints: GraphEndpoints, timeout: Duration) -> Self {
        Self {
            endpoints,
            timeout,
            http: Client::new(),
        }
    }

    /// Endpoints used by connected clients.
    pub fn endpoints(&self) -> &GraphEndpoints {
        &self.endpoints
    }

    /// Per-call timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Credential options matching this connector.
    pub fn credential_options(&self) -> CredentialOptions {
        CredentialOptions {
            authority_host: self.endpoints.authority_host.clone(),
            timeout: self.timeout,
            http: self.http.clone(),
            ..CredentialOptions::default()
        }
    }

    /// Client for an already resolved credential.
    pub fn client_for(&self, credential: Arc<dyn TokenCredential>) -> GraphDirectoryClient {
        GraphDirectoryClient::new(
            self.http.clone(),
            credential,
            self.endpoints.clone(),
            self.timeout,
        )
    }
}

impl DirectoryConnector for GraphConnector {
    fn connect(
        &self,
        tenant_id: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Arc<dyn DirectoryClient> {
        let credential = ClientSecretCredential::new(
            tenant_id,
            client_id,
            client_secret,
            self.credential_options(),
        );
        Arc::new(self.client_for(Arc::new(credential)))
    }
}
