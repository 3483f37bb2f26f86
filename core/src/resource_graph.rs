use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

use crate::credential::CredentialProvider;
use crate::error::QueryError;

pub const VM_QUERY: &str =
    "Resources | where type =~ 'microsoft.compute/virtualmachines' | project name, resourceGroup, location | limit 5";

const API_VERSION: &str = "2021-03-01";

/// One virtual machine as projected out of the resource graph.
///
/// Values are carried as the service returned them; a field the row lacks is `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmRow {
    #[serde(default)]
    pub name: Value,
    #[serde(default)]
    pub resource_group: Value,
    #[serde(default)]
    pub location: Value,
}

impl VmRow {
    /// Keeps the three projected fields and drops everything else.
    pub fn project(raw: &Value) -> Self {
        let field = |key: &str| raw.get(key).cloned().unwrap_or(Value::Null);
        Self {
            name: field("name"),
            resource_group: field("resourceGroup"),
            location: field("location"),
        }
    }
}

/// Lists virtual machines in a subscription.
#[async_trait]
pub trait ResourceQuery: Send + Sync {
    async fn query_vms(&self, subscription_id: &str) -> Result<Vec<VmRow>, QueryError>;
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    data: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: Option<String>,
    message: String,
}

/// REST client for the Azure Resource Graph `resources` operation.
pub struct ResourceGraphClient {
    client: reqwest::Client,
    credential: Arc<dyn CredentialProvider>,
    endpoint: String,
}

impl ResourceGraphClient {
    pub fn new(client: reqwest::Client, credential: Arc<dyn CredentialProvider>, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        info!(endpoint = %endpoint, credential = credential.name(), "Resource Graph client ready");
        Self {
            client,
            credential,
            endpoint,
        }
    }

    fn scope(&self) -> String {
        format!("{}/.default", self.endpoint)
    }

    fn url(&self) -> String {
        format!(
            "{}/providers/Microsoft.ResourceGraph/resources?api-version={}",
            self.endpoint, API_VERSION
        )
    }
}

#[async_trait]
impl ResourceQuery for ResourceGraphClient {
    async fn query_vms(&self, subscription_id: &str) -> Result<Vec<VmRow>, QueryError> {
        // 1. Credential
        let token = self.credential.get_token(&self.scope()).await?;

        // 2. Query
        let body = json!({
            "subscriptions": [subscription_id],
            "query": VM_QUERY,
            "options": { "resultFormat": "objectArray" },
        });
        debug!(subscription = subscription_id, "Querying Resource Graph");

        let response = self
            .client
            .post(self.url())
            .bearer_auth(&token.token)
            .json(&body)
            .send()
            .await?;

        // 3. Failure body
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<ErrorResponse>(&text) {
                Ok(parsed) => {
                    debug!(code = ?parsed.error.code, "Resource Graph rejected the query");
                    QueryError::Service(parsed.error.message)
                }
                Err(_) => QueryError::Status { status, body: text },
            });
        }

        // 4. Projection
        let parsed: QueryResponse = response.json().await?;
        let rows: Vec<VmRow> = parsed.data.unwrap_or_default().iter().map(VmRow::project).collect();

        info!(subscription = subscription_id, rows = rows.len(), "Resource Graph query complete");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::AccessToken;
    use crate::error::CredentialError;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};

    struct StaticToken;

    #[async_trait]
    impl CredentialProvider for StaticToken {
        async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
            assert!(scope.ends_with("/.default"));
            Ok(AccessToken {
                token: "test-token".to_string(),
                expires_on: None,
            })
        }

        fn name(&self) -> &'static str {
            "StaticToken"
        }
    }

    struct NoIdentity;

    #[async_trait]
    impl CredentialProvider for NoIdentity {
        async fn get_token(&self, _scope: &str) -> Result<AccessToken, CredentialError> {
            Err(CredentialError::Exhausted(vec!["nothing configured".to_string()]))
        }

        fn name(&self) -> &'static str {
            "NoIdentity"
        }
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    const RESOURCES_PATH: &str = "/providers/Microsoft.ResourceGraph/resources";

    #[test]
    fn projection_drops_extra_fields() {
        let raw = json!({
            "name": "web-vm01",
            "resourceGroup": "rg-web",
            "location": "westeurope",
            "id": "/subscriptions/x/...",
            "tags": { "env": "prod" }
        });
        let value = serde_json::to_value(VmRow::project(&raw)).unwrap();
        assert_eq!(
            value,
            json!({ "name": "web-vm01", "resourceGroup": "rg-web", "location": "westeurope" })
        );
    }

    #[test]
    fn projection_marks_missing_fields_null() {
        let row = VmRow::project(&json!({ "name": "lonely" }));
        assert_eq!(row.name, "lonely");
        assert_eq!(row.resource_group, Value::Null);
        assert_eq!(row.location, Value::Null);
    }

    #[test]
    fn projection_keeps_non_string_values() {
        let raw = json!({ "name": 42, "resourceGroup": null, "location": ["a"] });
        let value = serde_json::to_value(VmRow::project(&raw)).unwrap();
        assert_eq!(value, json!({ "name": 42, "resourceGroup": null, "location": ["a"] }));
    }

    #[tokio::test]
    async fn sends_fixed_query_scoped_to_subscription() {
        let app = Router::new().route(
            RESOURCES_PATH,
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(
                    headers.get("authorization").and_then(|v| v.to_str().ok()),
                    Some("Bearer test-token")
                );
                assert_eq!(body["query"], VM_QUERY);
                assert_eq!(body["subscriptions"], json!(["sub-123"]));
                Json(json!({
                    "totalRecords": 2,
                    "count": 2,
                    "data": [
                        { "name": "a", "resourceGroup": "rg1", "location": "eastus", "id": "1" },
                        { "name": "b", "resourceGroup": "rg2", "location": "westus", "id": "2" }
                    ]
                }))
            }),
        );
        let base = serve(app).await;

        let client = ResourceGraphClient::new(reqwest::Client::new(), Arc::new(StaticToken), base);
        let rows = client.query_vms("sub-123").await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].resource_group, "rg2");
    }

    #[tokio::test]
    async fn missing_data_means_no_rows() {
        let app = Router::new().route(RESOURCES_PATH, post(|| async { Json(json!({ "count": 0 })) }));
        let base = serve(app).await;

        let client = ResourceGraphClient::new(reqwest::Client::new(), Arc::new(StaticToken), base);
        assert!(client.query_vms("sub-123").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn service_error_message_is_surfaced() {
        let app = Router::new().route(
            RESOURCES_PATH,
            post(|| async {
                (
                    StatusCode::FORBIDDEN,
                    Json(json!({
                        "error": {
                            "code": "AuthorizationFailed",
                            "message": "The client does not have authorization"
                        }
                    })),
                )
            }),
        );
        let base = serve(app).await;

        let client = ResourceGraphClient::new(reqwest::Client::new(), Arc::new(StaticToken), base);
        let err = client.query_vms("sub-123").await.unwrap_err();
        assert_eq!(err.to_string(), "The client does not have authorization");
    }

    #[tokio::test]
    async fn opaque_error_body_keeps_status() {
        let app = Router::new().route(RESOURCES_PATH, post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }));
        let base = serve(app).await;

        let client = ResourceGraphClient::new(reqwest::Client::new(), Arc::new(StaticToken), base);
        match client.query_vms("sub-123").await.unwrap_err() {
            QueryError::Status { status, body } => {
                assert_eq!(status, 502);
                assert_eq!(body, "upstream down");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn credential_failure_aborts_before_any_request() {
        let client = ResourceGraphClient::new(reqwest::Client::new(), Arc::new(NoIdentity), "http://127.0.0.1:9");
        let err = client.query_vms("sub-123").await.unwrap_err();
        assert!(matches!(err, QueryError::Credential(_)));
    }
}
