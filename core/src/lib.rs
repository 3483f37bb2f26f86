//! Intent dispatch for the ops copilot endpoint: static samples for health and
//! cost, a Resource Graph query for security.

pub mod config;
pub mod credential;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod intent;
pub mod resource_graph;
pub mod samples;

pub use config::Settings;
pub use dispatcher::{Dispatcher, Method, OpsRequest, Reply};
pub use envelope::{Format, ResultEnvelope, Status};
pub use intent::Intent;
