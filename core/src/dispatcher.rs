use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::credential::DefaultCredential;
use crate::envelope::{Format, ResultEnvelope};
use crate::error::DispatchError;
use crate::intent::Intent;
use crate::resource_graph::{ResourceGraphClient, ResourceQuery};
use crate::samples;

pub const UNKNOWN_INTENT: &str = "Unknown intent";
pub const MISSING_SUBSCRIPTION: &str = "SUBSCRIPTION_ID not set in settings";

const HTTP_OK: u16 = 200;
const HTTP_INTERNAL_ERROR: u16 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Post => f.write_str("POST"),
        }
    }
}

/// One inbound invocation. Only POST bodies are read.
#[derive(Debug, Clone, Copy)]
pub struct OpsRequest<'a> {
    pub method: Method,
    pub body: &'a [u8],
}

impl<'a> OpsRequest<'a> {
    pub fn get() -> Self {
        Self {
            method: Method::Get,
            body: &[],
        }
    }

    pub fn post(body: &'a [u8]) -> Self {
        Self {
            method: Method::Post,
            body,
        }
    }
}

/// HTTP status plus the envelope to send back.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub envelope: ResultEnvelope,
}

/// Routes an intent to the strategy that answers it.
///
/// Holds nothing mutable, so one instance serves every concurrent request.
#[derive(Clone)]
pub struct Dispatcher {
    subscription_id: Option<String>,
    query: Arc<dyn ResourceQuery>,
}

impl Dispatcher {
    pub fn new(settings: &Settings, query: Arc<dyn ResourceQuery>) -> Self {
        Self {
            subscription_id: settings.subscription_id.clone(),
            query,
        }
    }

    /// Wires the real Resource Graph client behind the ambient credential chain.
    pub fn from_settings(settings: &Settings) -> Self {
        let http = reqwest::Client::new();
        let credential = Arc::new(DefaultCredential::from_env(http.clone()));
        let client = ResourceGraphClient::new(http, credential, settings.resource_graph_endpoint.clone());
        Self::new(settings, Arc::new(client))
    }

    /// Never fails: unexpected errors become a 500 reply carrying the error text.
    pub async fn handle(&self, request: OpsRequest<'_>) -> Reply {
        info!(method = %request.method, "Ops Copilot: processing request");

        match self.try_handle(request).await {
            Ok(envelope) => Reply {
                status: HTTP_OK,
                envelope,
            },
            Err(e) => {
                error!(error = %e, "Error in ops handler");
                Reply {
                    status: HTTP_INTERNAL_ERROR,
                    envelope: ResultEnvelope::error(e.to_string()),
                }
            }
        }
    }

    async fn try_handle(&self, request: OpsRequest<'_>) -> Result<ResultEnvelope, DispatchError> {
        let intent = match request.method {
            Method::Post => Intent::from_body(request.body)?,
            Method::Get => Intent::default(),
        };
        self.dispatch(&intent).await
    }

    pub async fn dispatch(&self, intent: &Intent) -> Result<ResultEnvelope, DispatchError> {
        match intent {
            Intent::Health => Ok(health()),
            Intent::Security => self.security().await,
            Intent::Cost => Ok(cost()),
            Intent::Unknown(raw) => {
                info!(intent = %raw, "Unknown intent requested");
                Ok(ResultEnvelope::error(UNKNOWN_INTENT))
            }
        }
    }

    async fn security(&self) -> Result<ResultEnvelope, DispatchError> {
        let Some(subscription_id) = self.subscription_id.as_deref() else {
            warn!("Security intent requested without a subscription");
            return Ok(ResultEnvelope::error(MISSING_SUBSCRIPTION));
        };

        let rows = self.query.query_vms(subscription_id).await?;
        let count = rows.len();

        Ok(ResultEnvelope::success(json!(rows), Format::Table)
            .with_count(count)
            .with_message(format!("Found {} VMs via Resource Graph", count)))
    }
}

fn health() -> ResultEnvelope {
    ResultEnvelope::success(json!(samples::vm_health()), Format::Table).with_message(samples::HEALTH_MESSAGE)
}

fn cost() -> ResultEnvelope {
    ResultEnvelope::success(json!(samples::cost_summary()), Format::Summary)
}
