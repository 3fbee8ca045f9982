use axum::{
    http::header::RETRY_AFTER,
    response::{IntoResponse, Response},
    Json,
};
use hyper::StatusCode;
use serde_json::json;
use tracing::error;

use crate::services::invitation_service::InviteError;

/// Error returned by every handler and middleware.
#[derive(Debug)]
pub enum ApiError {
    Invite(InviteError),
    Unauthorized,
    BadRequest(String),
}

impl From<InviteError> for ApiError {
    fn from(err: InviteError) -> Self {
        ApiError::Invite(err)
    }
}

fn body(status: StatusCode, code: &str, message: String) -> Response {
    (status, Json(json!({ "error": code, "message": message }))).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = match self {
            ApiError::Unauthorized => {
                return body(
                    StatusCode::UNAUTHORIZED,
                    "unauthorized",
                    "A valid bearer token is required".to_string(),
                )
            }
            ApiError::BadRequest(message) => return body(StatusCode::BAD_REQUEST, "invalid_input", message),
            ApiError::Invite(err) => err,
        };

        let message = err.to_string();
        match err {
            InviteError::InvalidInput(_) => body(StatusCode::BAD_REQUEST, "invalid_input", message),
            InviteError::NotFound => body(StatusCode::NOT_FOUND, "not_found", message),
            InviteError::Expired => body(StatusCode::GONE, "expired", message),
            InviteError::AlreadyConfirmed => body(StatusCode::CONFLICT, "already_confirmed", message),
            InviteError::AlreadyDeclined => body(StatusCode::CONFLICT, "already_declined", message),
            InviteError::Forbidden => body(StatusCode::FORBIDDEN, "forbidden", message),
            InviteError::RateLimited { retry_after } => {
                let seconds = retry_after.as_secs().max(1).to_string();
                let mut response = body(StatusCode::TOO_MANY_REQUESTS, "rate_limited", message);
                if let Ok(value) = seconds.parse() {
                    response.headers_mut().insert(RETRY_AFTER, value);
                }
                response
            }
            InviteError::Internal(source) => {
                error!(error = %source, "invite storage failure");
                body(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "Something went wrong, please try again".to_string(),
                )
            }
        }
    }
}
