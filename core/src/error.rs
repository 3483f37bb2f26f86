use thiserror::Error;

/// Failure to obtain an access token from an identity source.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The source is not configured in this environment (missing variables, no endpoint).
    #[error("{source_name} unavailable: {reason}")]
    Unavailable {
        source_name: &'static str,
        reason: String,
    },

    #[error("{source_name} token request failed: {message}")]
    Network {
        source_name: &'static str,
        message: String,
    },

    #[error("{source_name} authentication failed: HTTP {status} - {body}")]
    Authentication {
        source_name: &'static str,
        status: u16,
        body: String,
    },

    /// Every source in a chained credential failed.
    #[error("no credential source succeeded: {}", .0.join("; "))]
    Exhausted(Vec<String>),
}

/// Failure while querying the resource graph.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("resource graph request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("resource graph returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Error text reported by the service itself.
    #[error("{0}")]
    Service(String),
}

/// Unexpected failure while handling a request. Surfaces as HTTP 500.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{0}")]
    MalformedBody(#[from] serde_json::Error),

    #[error("request body is null")]
    NullBody,

    #[error(transparent)]
    Query(#[from] QueryError),
}
