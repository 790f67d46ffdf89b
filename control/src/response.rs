use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

/// The envelope every RPC handler returns instead of a bare transport-level
/// error: business conditions (not-found, conflict, client error) are always
/// `200 OK` with `success=false` and a human-readable `error`, so the RPC
/// surface never needs the caller to distinguish "the HTTP call failed" from
/// "the operation failed".
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

use waystation_core::WaystationError;

/// Maps a core business-condition error to the right status code alongside
/// the `{success, message}` envelope. `Internal` is the only variant that
/// ever produces a 5xx — everything else is a 200 with `success=false`.
pub fn error_response(err: WaystationError) -> Response {
    let status = match &err {
        WaystationError::NotFound(_) => StatusCode::OK,
        WaystationError::Conflict(_) => StatusCode::OK,
        WaystationError::ClientError(_) => StatusCode::BAD_REQUEST,
        WaystationError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ApiResponse::<()>::error(err.message()))).into_response()
}
