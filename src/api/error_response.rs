//! HTTP error response handling for the API

use crate::error::{ApiError, Error, ToHttpStatus};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        tracing::warn!(status = status_code.as_u16(), error = %self, "Request failed");
        let api_error: ApiError = self.into();

        (status_code, Json(api_error)).into_response()
    }
}
