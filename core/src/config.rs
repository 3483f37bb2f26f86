use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use tracing::{info, warn};

pub const DEFAULT_RESOURCE_GRAPH_ENDPOINT: &str = "https://management.azure.com";
const DEFAULT_PORT: &str = "3000";

/// Process configuration, resolved once at startup and handed to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Subscription the security query is scoped to. `None` when unset or empty.
    pub subscription_id: Option<String>,
    pub bind: SocketAddr,
    pub resource_graph_endpoint: String,
}

impl Settings {
    /// Reads `.env` (if present) and then the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let subscription_id = non_empty(env::var("SUBSCRIPTION_ID").ok());
        if subscription_id.is_none() {
            warn!("SUBSCRIPTION_ID is not set; the security intent will report an error");
        }

        // Azure Functions custom handlers are told which port to listen on.
        let port = env::var("FUNCTIONS_CUSTOMHANDLER_PORT").unwrap_or_else(|_| DEFAULT_PORT.to_string());
        let bind_raw = env::var("OPS_BIND").unwrap_or_else(|_| format!("0.0.0.0:{}", port));
        let bind: SocketAddr = bind_raw
            .parse()
            .with_context(|| format!("OPS_BIND is not a socket address: '{}'", bind_raw))?;

        let resource_graph_endpoint = non_empty(env::var("RESOURCE_GRAPH_ENDPOINT").ok())
            .unwrap_or_else(|| DEFAULT_RESOURCE_GRAPH_ENDPOINT.to_string());

        info!(bind = %bind, endpoint = %resource_graph_endpoint, "Settings loaded");

        Ok(Self {
            subscription_id,
            bind,
            resource_graph_endpoint,
        })
    }

    pub fn with_subscription(mut self, subscription_id: impl Into<String>) -> Self {
        self.subscription_id = non_empty(Some(subscription_id.into()));
        self
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            subscription_id: None,
            bind: SocketAddr::from(([0, 0, 0, 0], 3000)),
            resource_graph_endpoint: DEFAULT_RESOURCE_GRAPH_ENDPOINT.to_string(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_subscription_counts_as_unset() {
        let settings = Settings::default().with_subscription("   ");
        assert_eq!(settings.subscription_id, None);
    }

    #[test]
    fn subscription_is_trimmed() {
        let settings = Settings::default().with_subscription(" sub-123 ");
        assert_eq!(settings.subscription_id.as_deref(), Some("sub-123"));
    }

    #[test]
    fn default_points_at_public_cloud() {
        let settings = Settings::default();
        assert_eq!(settings.resource_graph_endpoint, DEFAULT_RESOURCE_GRAPH_ENDPOINT);
        assert_eq!(settings.bind.port(), 3000);
    }
}
