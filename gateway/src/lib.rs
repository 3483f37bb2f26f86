mod api;

use axum::{
    body::Bytes,
    extract::State,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::OpsResponse;
use ops_core::{Dispatcher, OpsRequest};

pub const OPS_ROUTE: &str = "/api/OpsHandler";

// Application State: one dispatcher shared by every request
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }
}

/// GET and POST on the ops route; anything else is answered 405 by the router.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(OPS_ROUTE, get(ops_get).post(ops_post))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// --- HANDLERS ---

async fn health_check() -> &'static str {
    "Ops Copilot Gateway: Operational"
}

async fn ops_get(State(state): State<AppState>) -> OpsResponse {
    OpsResponse(state.dispatcher.handle(OpsRequest::get()).await)
}

// The body is taken raw so an empty or malformed payload reaches the
// dispatcher and comes back as a 500 envelope instead of an extractor rejection.
async fn ops_post(State(state): State<AppState>, body: Bytes) -> OpsResponse {
    OpsResponse(state.dispatcher.handle(OpsRequest::post(&body)).await)
}
