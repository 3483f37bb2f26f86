use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ops_core::Reply;

// Output: the envelope, sent with whatever status the dispatcher decided on
pub struct OpsResponse(pub Reply);

impl IntoResponse for OpsResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.0.envelope)).into_response()
    }
}
