pub mod states;
pub mod status;

pub use states::*;
pub use status::*;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Envelope for single-object JSON responses
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
struct ErrorResponse<'a> {
    errors: &'a str,
}

pub fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(ErrorResponse { errors: message })).into_response()
}
