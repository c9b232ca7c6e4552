//! Maps `CoreError` (and the narrow component errors that convert into it)
//! to the stable `{error_kind, message, correlation_id, detail?}` response
//! shape (§7). This is the only place in the workspace that turns a typed
//! error into an HTTP status code.

use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use errors::CoreError;
use serde_json::json;

pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl From<errors::AuthError> for ApiError {
    fn from(err: errors::AuthError) -> Self {
        Self(CoreError::from(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let correlation_id = CORRELATION_ID.try_with(Clone::clone).unwrap_or_else(|_| uuid::Uuid::new_v4().to_string());
        let body = Json(json!({
            "error_kind": self.0.kind,
            "message": self.0.message,
            "correlation_id": correlation_id,
            "detail": self.0.detail
        }));
        (status, body).into_response()
    }
}

tokio::task_local! {
    /// The id assigned to the request currently being handled by this task.
    /// A `task_local` (not a `thread_local`) because a suspended request's
    /// continuation can resume on a different worker thread.
    static CORRELATION_ID: String;
}

/// Assigns (or propagates) a correlation id for the lifetime of the request
/// task, so a deeply-nested `ApiError::into_response` can recover it without
/// threading it through every handler signature (§7).
pub async fn correlation_id_middleware(request: Request, next: Next) -> Response {
    let id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    CORRELATION_ID.scope(id, next.run(request)).await
}
