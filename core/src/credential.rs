use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::env;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

use crate::error::CredentialError;

const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";
const IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IMDS_API_VERSION: &str = "2018-02-01";
const APP_SERVICE_API_VERSION: &str = "2019-08-01";
/// Off Azure nothing answers on the metadata address; give up quickly instead of waiting on TCP.
const IMDS_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// A bearer token for one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    /// Expiry as unix seconds, when the issuer reports one.
    pub expires_on: Option<u64>,
}

/// Something that can hand out bearer tokens.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError>;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<Value>,
    #[serde(default)]
    expires_on: Option<Value>,
}

impl TokenResponse {
    fn into_token(self) -> AccessToken {
        let expires_on = self.expires_on.as_ref().and_then(as_seconds).or_else(|| {
            let lifetime = self.expires_in.as_ref().and_then(as_seconds)?;
            let now = SystemTime::now().duration_since(UNIX_EPOCH).ok()?.as_secs();
            Some(now + lifetime)
        });
        AccessToken {
            token: self.access_token,
            expires_on,
        }
    }
}

// Identity endpoints disagree on whether these are numbers or numeric strings.
fn as_seconds(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Managed identity wants a resource, not a `/.default` scope.
fn scope_to_resource(scope: &str) -> &str {
    scope.strip_suffix("/.default").unwrap_or(scope)
}

async fn send_token_request(
    source_name: &'static str,
    request: reqwest::RequestBuilder,
) -> Result<AccessToken, CredentialError> {
    let response = request.send().await.map_err(|e| CredentialError::Network {
        source_name,
        message: e.to_string(),
    })?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(CredentialError::Authentication {
            source_name,
            status,
            body,
        });
    }

    let parsed: TokenResponse = response.json().await.map_err(|e| CredentialError::Network {
        source_name,
        message: format!("malformed token response: {}", e),
    })?;
    Ok(parsed.into_token())
}

fn env_non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

// --- SERVICE PRINCIPAL ---

/// Client-credentials flow driven by `AZURE_TENANT_ID`, `AZURE_CLIENT_ID` and `AZURE_CLIENT_SECRET`.
#[derive(Clone)]
pub struct EnvironmentCredential {
    client: reqwest::Client,
    authority: String,
    tenant_id: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

impl EnvironmentCredential {
    pub fn new(
        client: reqwest::Client,
        authority: impl Into<String>,
        tenant_id: Option<String>,
        client_id: Option<String>,
        client_secret: Option<String>,
    ) -> Self {
        Self {
            client,
            authority: authority.into().trim_end_matches('/').to_string(),
            tenant_id,
            client_id,
            client_secret,
        }
    }

    pub fn from_env(client: reqwest::Client) -> Self {
        let authority = env_non_empty("AZURE_AUTHORITY_HOST").unwrap_or_else(|| DEFAULT_AUTHORITY.to_string());
        Self::new(
            client,
            authority,
            env_non_empty("AZURE_TENANT_ID"),
            env_non_empty("AZURE_CLIENT_ID"),
            env_non_empty("AZURE_CLIENT_SECRET"),
        )
    }
}

#[async_trait]
impl CredentialProvider for EnvironmentCredential {
    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let (Some(tenant_id), Some(client_id), Some(client_secret)) =
            (&self.tenant_id, &self.client_id, &self.client_secret)
        else {
            return Err(CredentialError::Unavailable {
                source_name: self.name(),
                reason: "AZURE_TENANT_ID, AZURE_CLIENT_ID and AZURE_CLIENT_SECRET must all be set".to_string(),
            });
        };

        let url = format!("{}/{}/oauth2/v2.0/token", self.authority, tenant_id);
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.as_str()),
            ("scope", scope),
        ];

        debug!(tenant = %tenant_id, "Requesting service principal token");
        send_token_request(self.name(), self.client.post(url).form(&form)).await
    }

    fn name(&self) -> &'static str {
        "EnvironmentCredential"
    }
}

// --- MANAGED IDENTITY ---

#[derive(Clone)]
enum IdentityEndpoint {
    /// App Service and Functions expose a local endpoint guarded by a shared header.
    AppService { endpoint: String, header: String },
    /// Virtual machines use the instance metadata service.
    Imds { endpoint: String, timeout: Duration },
}

/// Identity assigned to the hosting resource.
#[derive(Clone)]
pub struct ManagedIdentityCredential {
    client: reqwest::Client,
    target: IdentityEndpoint,
    client_id: Option<String>,
}

impl ManagedIdentityCredential {
    pub fn app_service(client: reqwest::Client, endpoint: impl Into<String>, header: impl Into<String>) -> Self {
        Self {
            client,
            target: IdentityEndpoint::AppService {
                endpoint: endpoint.into(),
                header: header.into(),
            },
            client_id: None,
        }
    }

    pub fn imds(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            target: IdentityEndpoint::Imds {
                endpoint: endpoint.into(),
                timeout: IMDS_PROBE_TIMEOUT,
            },
            client_id: None,
        }
    }

    /// Overrides how long the metadata service gets to answer. No effect on App Service.
    pub fn with_imds_timeout(mut self, limit: Duration) -> Self {
        if let IdentityEndpoint::Imds { timeout, .. } = &mut self.target {
            *timeout = limit;
        }
        self
    }

    /// Selects a user-assigned identity instead of the system-assigned one.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn from_env(client: reqwest::Client) -> Self {
        let credential = match (env_non_empty("IDENTITY_ENDPOINT"), env_non_empty("IDENTITY_HEADER")) {
            (Some(endpoint), Some(header)) => Self::app_service(client, endpoint, header),
            _ => Self::imds(client, IMDS_ENDPOINT),
        };
        match env_non_empty("AZURE_CLIENT_ID") {
            Some(client_id) => credential.with_client_id(client_id),
            None => credential,
        }
    }
}

#[async_trait]
impl CredentialProvider for ManagedIdentityCredential {
    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let resource = scope_to_resource(scope);

        let request = match &self.target {
            IdentityEndpoint::AppService { endpoint, header } => self
                .client
                .get(endpoint)
                .query(&[("resource", resource), ("api-version", APP_SERVICE_API_VERSION)])
                .header("X-IDENTITY-HEADER", header),
            IdentityEndpoint::Imds { endpoint, timeout } => self
                .client
                .get(endpoint)
                .query(&[("resource", resource), ("api-version", IMDS_API_VERSION)])
                .header("Metadata", "true")
                .timeout(*timeout),
        };
        let request = match &self.client_id {
            Some(client_id) => request.query(&[("client_id", client_id)]),
            None => request,
        };

        debug!(resource, "Requesting managed identity token");
        send_token_request(self.name(), request).await
    }

    fn name(&self) -> &'static str {
        "ManagedIdentityCredential"
    }
}

// --- CHAIN ---

/// Tries each source in order and returns the first token obtained.
#[derive(Clone)]
pub struct DefaultCredential {
    sources: Vec<Arc<dyn CredentialProvider>>,
}

impl DefaultCredential {
    pub fn new(sources: Vec<Arc<dyn CredentialProvider>>) -> Self {
        Self { sources }
    }

    /// Service principal from the environment first, then managed identity.
    pub fn from_env(client: reqwest::Client) -> Self {
        Self::new(vec![
            Arc::new(EnvironmentCredential::from_env(client.clone())),
            Arc::new(ManagedIdentityCredential::from_env(client)),
        ])
    }
}

#[async_trait]
impl CredentialProvider for DefaultCredential {
    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let mut failures = Vec::with_capacity(self.sources.len());

        for source in &self.sources {
            match source.get_token(scope).await {
                Ok(token) => {
                    info!(source = source.name(), "Acquired access token");
                    return Ok(token);
                }
                Err(e) => {
                    debug!(source = source.name(), error = %e, "Credential source failed");
                    failures.push(e.to_string());
                }
            }
        }

        Err(CredentialError::Exhausted(failures))
    }

    fn name(&self) -> &'static str {
        "DefaultCredential"
    }
}
