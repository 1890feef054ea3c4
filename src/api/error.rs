use crate::vendor::{ErrorKind, VendorError};
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Configuration(&'static str),

    #[error("{error}: {message}")]
    BadRequest {
        error: &'static str,
        message: String,
    },

    #[error("{title}: {source}")]
    Upstream {
        title: &'static str,
        #[source]
        source: VendorError,
    },
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_message: Option<&'static str>,
}

impl ApiError {
    pub fn bad_request(error: &'static str) -> Self {
        Self::BadRequest {
            error,
            message: error.to_string(),
        }
    }

    pub fn upstream(title: &'static str, source: VendorError) -> Self {
        Self::Upstream { title, source }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Upstream { source, .. } => match source.status {
                Some(status) => StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                None if source.kind == ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
                None => StatusCode::BAD_GATEWAY,
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest {
            error: "Invalid request body",
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            ApiError::Configuration(message) => ErrorBody {
                error: "Server configuration error",
                message: message.to_string(),
                status: None,
                user_message: None,
            },
            ApiError::BadRequest { error, message } => ErrorBody {
                error,
                message,
                status: None,
                user_message: None,
            },
            ApiError::Upstream { title, source } => ErrorBody {
                error: title,
                user_message: Some(source.user_message()),
                status: source.status,
                message: source.message,
            },
        };
        (status, Json(body)).into_response()
    }
}
