//! Directory MCP tools
//!
//! Tools for users, groups and app registrations. With real credentials
//! they call Microsoft Graph; in demo mode they return canned payloads
//! tagged `"demo": true` and never touch the network.

use super::GraphBackend;
use crate::server::{McpServerError, McpServerResult, Tool, ToolContext};
use crate::types::{GraphArea, ToolDefinition, ToolResult};
use async_trait::async_trait;
use graph_auth::{DirectoryClient, OperationKind};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, instrument};

/// Default page size for list tools.
const DEFAULT_TOP: u32 = 10;

/// Upper bound Graph accepts for `$top`.
const MAX_TOP: u32 = 999;

fn parse_args<T: for<'de> Deserialize<'de>>(args: Value) -> McpServerResult<T> {
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args).map_err(|e| McpServerError::InvalidParams(e.to_string()))
}

fn list_query(top: Option<u32>, filter: Option<String>) -> Vec<(&'static str, String)> {
    let mut query = vec![("$top", top.unwrap_or(DEFAULT_TOP).clamp(1, MAX_TOP).to_string())];
    if let Some(filter) = filter.filter(|f| !f.trim().is_empty()) {
        query.push(("$filter", filter));
    }
    query
}

fn demo_envelope(backend: &GraphBackend, mut payload: Value) -> ToolResult {
    if let Value::Object(map) = &mut payload {
        map.insert("success".to_string(), json!(true));
        map.insert("demo".to_string(), json!(true));
        map.insert("authenticationMethod".to_string(), json!(backend.method));
        map.insert(
            "message".to_string(),
            json!(format!("Demo mode - {}", backend.auth_info())),
        );
    }
    ToolResult::json(payload)
}

fn field(item: &Value, name: &str) -> Value {
    item.get(name).cloned().unwrap_or(Value::Null)
}

/// Tool to list users.
pub struct UsersListTool {
    backend: Arc<GraphBackend>,
}

impl UsersListTool {
    /// Create the tool.
    pub fn new(backend: Arc<GraphBackend>) -> Self {
        Self { backend }
    }
}

#[derive(Debug, Deserialize)]
struct ListParams {
    #[serde(default)]
    top: Option<u32>,
    #[serde(default)]
    filter: Option<String>,
}

#[async_trait]
impl Tool for UsersListTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("graph_users_list", "List users in the directory")
            .with_area(GraphArea::Users)
            .with_schema(json!({
                "type": "object",
                "properties": {
                    "top": {
                        "type": "integer",
                        "description": "Maximum number of users to return",
                        "default": DEFAULT_TOP
                    },
                    "filter": {
                        "type": "string",
                        "description": "OData filter, e.g. startswith(displayName,'A')"
                    }
                },
                "required": []
            }))
            .with_permissions(["User.Read.All"])
    }

    #[instrument(skip(self, args, _context), fields(tool = "graph_users_list"))]
    async fn execute(&self, args: Value, _context: &ToolContext) -> McpServerResult<ToolResult> {
        let params: ListParams = parse_args(args)?;

        if self.backend.is_demo() {
            debug!("Returning demo users");
            return Ok(demo_envelope(
                &self.backend,
                json!({
                    "users": [
                        {"id": "demo-1", "displayName": "Demo User 1", "userPrincipalName": "demo1@example.com", "mail": "demo1@example.com", "jobTitle": "Developer", "department": "IT"},
                        {"id": "demo-2", "displayName": "Demo User 2", "userPrincipalName": "demo2@example.com", "mail": "demo2@example.com", "jobTitle": "Manager", "department": "IT"}
                    ]
                }),
            ));
        }

        match self
            .backend
            .directory
            .list("users", &list_query(params.top, params.filter))
            .await
        {
            Ok(users) => {
                let users: Vec<Value> = users
                    .iter()
                    .map(|u| {
                        json!({
                            "id": field(u, "id"),
                            "displayName": field(u, "displayName"),
                            "userPrincipalName": field(u, "userPrincipalName"),
                            "mail": field(u, "mail"),
                            "jobTitle": field(u, "jobTitle"),
                            "department": field(u, "department"),
                            "accountEnabled": field(u, "accountEnabled")
                        })
                    })
                    .collect();
                Ok(ToolResult::json(json!({
                    "success": true,
                    "count": users.len(),
                    "users": users
                })))
            }
            Err(e) => {
                error!("Failed to list users: {}", e);
                Ok(ToolResult::error(format!("Failed to get users: {}", e)))
            }
        }
    }
}

/// Tool to create a user.
pub struct UsersCreateTool {
    backend: Arc<GraphBackend>,
}

impl UsersCreateTool {
    /// Create the tool.
    pub fn new(backend: Arc<GraphBackend>) -> Self {
        Self { backend }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateUserParams {
    display_name: String,
    user_principal_name: String,
    #[serde(default)]
    mail_nickname: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    job_title: Option<String>,
    #[serde(default)]
    department: Option<String>,
}

#[async_trait]
impl Tool for UsersCreateTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("graph_users_create", "Create a user account")
            .with_area(GraphArea::Users)
            .with_operation(OperationKind::UserCreate)
            .with_schema(json!({
                "type": "object",
                "properties": {
                    "displayName": {"type": "string", "description": "Display name"},
                    "userPrincipalName": {"type": "string", "description": "Sign-in name, e.g. ada@contoso.com"},
                    "mailNickname": {"type": "string", "description": "Mail alias; defaults to the UPN prefix"},
                    "password": {"type": "string", "description": "Initial password, changed at first sign-in"},
                    "jobTitle": {"type": "string"},
                    "department": {"type": "string"},
                    "confirm": {"type": "boolean", "description": "Confirm a high-risk operation on a protected tenant"}
                },
                "required": ["displayName", "userPrincipalName"]
            }))
            .with_permissions(["User.ReadWrite.All"])
    }

    #[instrument(skip(self, args, _context), fields(tool = "graph_users_create"))]
    async fn execute(&self, args: Value, _context: &ToolContext) -> McpServerResult<ToolResult> {
        let params: CreateUserParams = parse_args(args)?;
        if params.display_name.trim().is_empty() || params.user_principal_name.trim().is_empty() {
            return Err(McpServerError::InvalidParams(
                "displayName and userPrincipalName are required".to_string(),
            ));
        }

        let mail_nickname = params.mail_nickname.clone().unwrap_or_else(|| {
            params
                .user_principal_name
                .split('@')
                .next()
                .unwrap_or_default()
                .to_string()
        });

        if self.backend.is_demo() {
            return Ok(demo_envelope(
                &self.backend,
                json!({
                    "userId": "demo-new-user",
                    "userPrincipalName": params.user_principal_name,
                    "mailNickname": mail_nickname
                }),
            ));
        }

        let mut body = json!({
            "accountEnabled": true,
            "displayName": params.display_name,
            "userPrincipalName": params.user_principal_name,
            "mailNickname": mail_nickname,
            "jobTitle": params.job_title,
            "department": params.department
        });
        if let Some(password) = params.password {
            body["passwordProfile"] = json!({
                "password": password,
                "forceChangePasswordNextSignIn": true
            });
        }

        match self.backend.directory.create("users", body).await {
            Ok(created) => Ok(ToolResult::json(json!({
                "success": true,
                "message": "User created successfully",
                "userId": field(&created, "id"),
                "userPrincipalName": field(&created, "userPrincipalName")
            }))),
            Err(e) => {
                error!("Failed to create user: {}", e);
                Ok(ToolResult::error(format!("Failed to create user: {}", e)))
            }
        }
    }
}

/// Tool to create a group.
pub struct GroupsCreateTool {
    backend: Arc<GraphBackend>,
}

impl GroupsCreateTool {
    /// Create the tool.
    pub fn new(backend: Arc<GraphBackend>) -> Self {
        Self { backend }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateGroupParams {
    display_name: String,
    mail_nickname: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    group_type: Option<String>,
}

#[async_trait]
impl Tool for GroupsCreateTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("graph_groups_create", "Create a security or Microsoft 365 group")
            .with_area(GraphArea::Groups)
            .with_operation(OperationKind::GroupCreate)
            .with_schema(json!({
                "type": "object",
                "properties": {
                    "displayName": {"type": "string"},
                    "mailNickname": {"type": "string"},
                    "description": {"type": "string"},
                    "groupType": {
                        "type": "string",
                        "enum": ["security", "microsoft365"],
                        "default": "security"
                    },
                    "confirm": {"type": "boolean", "description": "Confirm a high-risk operation on a protected tenant"}
                },
                "required": ["displayName", "mailNickname"]
            }))
            .with_permissions(["Group.ReadWrite.All"])
    }

    #[instrument(skip(self, args, _context), fields(tool = "graph_groups_create"))]
    async fn execute(&self, args: Value, _context: &ToolContext) -> McpServerResult<ToolResult> {
        let params: CreateGroupParams = parse_args(args)?;
        if params.display_name.trim().is_empty() || params.mail_nickname.trim().is_empty() {
            return Err(McpServerError::InvalidParams(
                "displayName and mailNickname are required".to_string(),
            ));
        }

        let unified = params
            .group_type
            .as_deref()
            .map_or(false, |t| t.eq_ignore_ascii_case("microsoft365"));

        if self.backend.is_demo() {
            return Ok(demo_envelope(
                &self.backend,
                json!({
                    "groupId": "demo-new-group",
                    "displayName": params.display_name,
                    "unified": unified
                }),
            ));
        }

        let group_types: Vec<&str> = if unified { vec!["Unified"] } else { Vec::new() };
        let body = json!({
            "displayName": params.display_name,
            "mailNickname": params.mail_nickname,
            "description": params.description,
            "groupTypes": group_types,
            "securityEnabled": true,
            "mailEnabled": unified
        });

        match self.backend.directory.create("groups", body).await {
            Ok(created) => Ok(ToolResult::json(json!({
                "success": true,
                "message": "Group created successfully",
                "groupId": field(&created, "id"),
                "displayName": field(&created, "displayName")
            }))),
            Err(e) => {
                error!("Failed to create group: {}", e);
                Ok(ToolResult::error(format!("Failed to create group: {}", e)))
            }
        }
    }
}

/// Tool to list app registrations.
pub struct AppsListTool {
    backend: Arc<GraphBackend>,
}

impl AppsListTool {
    /// Create the tool.
    pub fn new(backend: Arc<GraphBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for AppsListTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("graph_apps_list", "List app registrations")
            .with_area(GraphArea::Applications)
            .with_schema(json!({
                "type": "object",
                "properties": {
                    "top": {"type": "integer", "default": DEFAULT_TOP},
                    "filter": {"type": "string"}
                },
                "required": []
            }))
            .with_permissions(["Application.Read.All"])
    }

    #[instrument(skip(self, args, _context), fields(tool = "graph_apps_list"))]
    async fn execute(&self, args: Value, _context: &ToolContext) -> McpServerResult<ToolResult> {
        let params: ListParams = parse_args(args)?;

        if self.backend.is_demo() {
            return Ok(demo_envelope(
                &self.backend,
                json!({
                    "applications": [
                        {"id": "demo-app-1", "appId": "demo-app-id-1", "displayName": "Demo Application", "signInAudience": "AzureADMyOrg"}
                    ]
                }),
            ));
        }

        match self
            .backend
            .directory
            .list("applications", &list_query(params.top, params.filter))
            .await
        {
            Ok(apps) => {
                let apps: Vec<Value> = apps
                    .iter()
                    .map(|a| {
                        json!({
                            "id": field(a, "id"),
                            "appId": field(a, "appId"),
                            "displayName": field(a, "displayName"),
                            "signInAudience": field(a, "signInAudience"),
                            "createdDateTime": field(a, "createdDateTime")
                        })
                    })
                    .collect();
                Ok(ToolResult::json(json!({
                    "success": true,
                    "count": apps.len(),
                    "applications": apps
                })))
            }
            Err(e) => {
                error!("Failed to list applications: {}", e);
                Ok(ToolResult::error(format!("Failed to get applications: {}", e)))
            }
        }
    }
}

/// Tool to register an application.
pub struct AppsCreateTool {
    backend: Arc<GraphBackend>,
}

impl AppsCreateTool {
    /// Create the tool.
    pub fn new(backend: Arc<GraphBackend>) -> Self {
        Self { backend }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateAppParams {
    display_name: String,
    #[serde(default)]
    sign_in_audience: Option<String>,
}

#[async_trait]
impl Tool for AppsCreateTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("graph_apps_create", "Register a new application")
            .with_area(GraphArea::Applications)
            .with_operation(OperationKind::AppCreate)
            .with_schema(json!({
                "type": "object",
                "properties": {
                    "displayName": {"type": "string"},
                    "signInAudience": {
                        "type": "string",
                        "enum": ["AzureADMyOrg", "AzureADMultipleOrgs", "AzureADandPersonalMicrosoftAccount"],
                        "default": "AzureADMyOrg"
                    },
                    "confirm": {"type": "boolean", "description": "Confirm a high-risk operation on a protected tenant"}
                },
                "required": ["displayName"]
            }))
            .with_permissions(["Application.ReadWrite.All"])
    }

    #[instrument(skip(self, args, _context), fields(tool = "graph_apps_create"))]
    async fn execute(&self, args: Value, _context: &ToolContext) -> McpServerResult<ToolResult> {
        let params: CreateAppParams = parse_args(args)?;
        if params.display_name.trim().is_empty() {
            return Err(McpServerError::InvalidParams(
                "displayName is required".to_string(),
            ));
        }
        let audience = params
            .sign_in_audience
            .unwrap_or_else(|| "AzureADMyOrg".to_string());

        if self.backend.is_demo() {
            return Ok(demo_envelope(
                &self.backend,
                json!({
                    "applicationId": "demo-new-app",
                    "displayName": params.display_name,
                    "signInAudience": audience
                }),
            ));
        }

        let body = json!({
            "displayName": params.display_name,
            "signInAudience": audience
        });

        match self.backend.directory.create("applications", body).await {
            Ok(created) => Ok(ToolResult::json(json!({
                "success": true,
                "message": "Application registered successfully",
                "applicationId": field(&created, "id"),
                "appId": field(&created, "appId"),
                "displayName": field(&created, "displayName")
            }))),
            Err(e) => {
                error!("Failed to create application: {}", e);
                Ok(ToolResult::error(format!("Failed to create application: {}", e)))
            }
        }
    }
}

/// All directory tools.
pub fn directory_tools(backend: Arc<GraphBackend>) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(UsersListTool::new(backend.clone())),
        Arc::new(UsersCreateTool::new(backend.clone())),
        Arc::new(GroupsCreateTool::new(backend.clone())),
        Arc::new(AppsListTool::new(backend.clone())),
        Arc::new(AppsCreateTool::new(backend)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph_auth::{AuthenticationMethod, DirectoryError, DirectoryResult};
    use std::sync::Mutex;

    /// Records writes and serves fixed lists.
    #[derive(Default)]
    struct RecordingDirectory {
        created: Mutex<Vec<(String, Value)>>,
        fail: bool,
    }

    #[async_trait]
    impl DirectoryClient for RecordingDirectory {
        async fn list(
            &self,
            collection: &str,
            query: &[(&str, String)],
        ) -> DirectoryResult<Vec<Value>> {
            if self.fail {
                return Err(DirectoryError::Forbidden {
                    code: "Authorization_RequestDenied".to_string(),
                    message: "Insufficient privileges".to_string(),
                });
            }
            assert_eq!(query[0].0, "$top");
            Ok(vec![json!({"id": format!("{}-1", collection), "displayName": "Ada"})])
        }

        async fn create(&self, collection: &str, body: Value) -> DirectoryResult<Value> {
            self.created
                .lock()
                .unwrap()
                .push((collection.to_string(), body.clone()));
            let mut created = body;
            created["id"] = json!("new-id");
            Ok(created)
        }
    }

    fn backend(
        method: AuthenticationMethod,
        directory: Arc<RecordingDirectory>,
    ) -> Arc<GraphBackend> {
        Arc::new(GraphBackend {
            method,
            tenant_id: Some("6b104499-c49f-45dc-b3a2-df95efd6eeb4".to_string()),
            directory,
        })
    }

    fn payload(result: &ToolResult) -> Value {
        serde_json::from_str(&result.text_content()).unwrap()
    }

    #[tokio::test]
    async fn test_demo_users_list() {
        let directory = Arc::new(RecordingDirectory::default());
        let tool = UsersListTool::new(backend(AuthenticationMethod::Demo, directory));

        let result = tool.execute(Value::Null, &ToolContext::empty()).await.unwrap();
        let body = payload(&result);

        assert_eq!(body["demo"], true);
        assert_eq!(body["authenticationMethod"], "Demo");
        assert_eq!(body["users"][0]["id"], "demo-1");
        assert_eq!(body["users"][1]["userPrincipalName"], "demo2@example.com");
    }

    #[tokio::test]
    async fn test_demo_create_never_writes() {
        let directory = Arc::new(RecordingDirectory::default());
        let tool = UsersCreateTool::new(backend(AuthenticationMethod::Demo, directory.clone()));

        let result = tool
            .execute(
                json!({"displayName": "Ada", "userPrincipalName": "ada@contoso.com"}),
                &ToolContext::empty(),
            )
            .await
            .unwrap();

        assert_eq!(payload(&result)["mailNickname"], "ada");
        assert!(directory.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_configured_users_list() {
        let directory = Arc::new(RecordingDirectory::default());
        let tool = UsersListTool::new(backend(AuthenticationMethod::ClientSecret, directory));

        let result = tool
            .execute(json!({"top": 5}), &ToolContext::empty())
            .await
            .unwrap();
        let body = payload(&result);

        assert_eq!(body["count"], 1);
        assert_eq!(body["users"][0]["id"], "users-1");
        assert!(body.get("demo").is_none());
    }

    #[tokio::test]
    async fn test_configured_failure_is_tool_error() {
        let directory = Arc::new(RecordingDirectory {
            fail: true,
            ..RecordingDirectory::default()
        });
        let tool = AppsListTool::new(backend(AuthenticationMethod::ClientSecret, directory));

        let result = tool.execute(json!({}), &ToolContext::empty()).await.unwrap();
        assert!(result.is_error);
        assert!(result.text_content().starts_with("Failed to get applications"));
    }

    #[tokio::test]
    async fn test_create_user_body() {
        let directory = Arc::new(RecordingDirectory::default());
        let backend = backend(AuthenticationMethod::ClientSecret, directory.clone());
        let tool = UsersCreateTool::new(backend);

        let result = tool
            .execute(
                json!({
                    "displayName": "Ada Lovelace",
                    "userPrincipalName": "ada@contoso.com",
                    "password": "Temp#Pass1234"
                }),
                &ToolContext::empty(),
            )
            .await
            .unwrap();
        assert_eq!(payload(&result)["userId"], "new-id");

        let created = directory.created.lock().unwrap();
        let (collection, body) = &created[0];
        assert_eq!(collection, "users");
        assert_eq!(body["mailNickname"], "ada");
        assert_eq!(body["passwordProfile"]["forceChangePasswordNextSignIn"], true);
    }

    #[tokio::test]
    async fn test_create_group_types() {
        let directory = Arc::new(RecordingDirectory::default());
        let backend = backend(AuthenticationMethod::ClientSecret, directory.clone());
        let tool = GroupsCreateTool::new(backend);

        tool.execute(
            json!({"displayName": "Team", "mailNickname": "team", "groupType": "Microsoft365"}),
            &ToolContext::empty(),
        )
        .await
        .unwrap();

        let created = directory.created.lock().unwrap();
        assert_eq!(created[0].1["groupTypes"], json!(["Unified"]));
        assert_eq!(created[0].1["mailEnabled"], true);
    }

    #[tokio::test]
    async fn test_missing_required_fields() {
        let directory = Arc::new(RecordingDirectory::default());
        let tool = AppsCreateTool::new(backend(AuthenticationMethod::ClientSecret, directory));

        let result = tool.execute(json!({}), &ToolContext::empty()).await;
        assert!(matches!(result, Err(McpServerError::InvalidParams(_))));

        let result = tool
            .execute(json!({"displayName": "  "}), &ToolContext::empty())
            .await;
        assert!(matches!(result, Err(McpServerError::InvalidParams(_))));
    }

    #[test]
    fn test_list_query_bounds() {
        assert_eq!(list_query(None, None), vec![("$top", "10".to_string())]);
        assert_eq!(list_query(Some(0), None)[0].1, "1");
        assert_eq!(list_query(Some(5000), None)[0].1, "999");
        assert_eq!(list_query(Some(3), Some(" ".to_string())).len(), 1);
    }
}
