use axum::{
    Json,
    response::{IntoResponse, Response},
};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::{PartialSchema, ToSchema};

pub type DynError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum CommonError {
    #[error("{msg}")]
    Authorization {
        msg: String,
        #[source]
        source: Option<anyhow::Error>,
    },
    #[error("{msg}")]
    NotFound {
        msg: String,
        lookup_id: String,
        #[source]
        source: Option<anyhow::Error>,
    },
    #[error("{msg}")]
    NotImplemented { msg: String },
    #[error("{msg}")]
    InvalidRequest {
        msg: String,
        #[source]
        source: Option<anyhow::Error>,
    },
    #[error("{msg}")]
    InvalidResponse {
        msg: String,
        #[source]
        source: Option<anyhow::Error>,
    },
    #[error("{0}")]
    Unknown(#[from] anyhow::Error),
    #[error("io error: {source}")]
    IoError {
        #[from]
        #[source]
        source: std::io::Error,
    },
    #[error("url parse error: {source}")]
    UrlParseError {
        #[from]
        #[source]
        source: url::ParseError,
    },
    #[error("serde json error: {source}")]
    SerdeSerializationError {
        #[from]
        #[source]
        source: serde_json::Error,
    },
    #[error("address parse error: {source}")]
    AddrParseError {
        #[from]
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("reqwest error: {source}")]
    ReqwestError {
        #[from]
        #[source]
        source: reqwest::Error,
    },
}

impl CommonError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            CommonError::Authorization { .. } => StatusCode::FORBIDDEN,
            CommonError::NotFound { .. } => StatusCode::NOT_FOUND,
            CommonError::NotImplemented { .. } => StatusCode::NOT_IMPLEMENTED,
            CommonError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            CommonError::InvalidResponse { .. }
            | CommonError::Unknown(_)
            | CommonError::IoError { .. }
            | CommonError::UrlParseError { .. }
            | CommonError::SerdeSerializationError { .. }
            | CommonError::AddrParseError { .. }
            | CommonError::ReqwestError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ToSchema for CommonError {
    fn name() -> std::borrow::Cow<'static, str> {
        std::borrow::Cow::Borrowed("Error")
    }
}

impl PartialSchema for CommonError {
    fn schema() -> utoipa::openapi::RefOr<utoipa::openapi::schema::Schema> {
        ErrorResponse::schema()
    }
}

impl IntoResponse for CommonError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorResponse::new(status, self.to_string()));

        (status, body).into_response()
    }
}

/// Uniform error body: `{ "status", "statusCode", "message" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub status: u16,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: status.as_u16(),
            status_code: status.as_u16(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    mod unit {
        use super::super::*;

        async fn read_body(response: Response) -> ErrorResponse {
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            serde_json::from_slice(&bytes).unwrap()
        }

        #[tokio::test]
        async fn test_not_found_body_shape() {
            let response = CommonError::NotFound {
                msg: "Not found".to_string(),
                lookup_id: "u1".to_string(),
                source: None,
            }
            .into_response();

            assert_eq!(response.status(), StatusCode::NOT_FOUND);
            let body = read_body(response).await;
            assert_eq!(
                body,
                ErrorResponse {
                    status: 404,
                    status_code: 404,
                    message: "Not found".to_string(),
                }
            );
        }

        #[tokio::test]
        async fn test_unknown_error_carries_message() {
            let response =
                CommonError::Unknown(anyhow::anyhow!("boom while sending")).into_response();

            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
            let body = read_body(response).await;
            assert_eq!(body.status, 500);
            assert_eq!(body.message, "boom while sending");
        }

        #[test]
        fn test_status_code_mapping() {
            assert_eq!(
                CommonError::NotImplemented {
                    msg: "nope".to_string()
                }
                .status_code(),
                StatusCode::NOT_IMPLEMENTED
            );
            assert_eq!(
                CommonError::Authorization {
                    msg: "Not authorized".to_string(),
                    source: None,
                }
                .status_code(),
                StatusCode::FORBIDDEN
            );
            assert_eq!(
                CommonError::InvalidRequest {
                    msg: "bad".to_string(),
                    source: None,
                }
                .status_code(),
                StatusCode::BAD_REQUEST
            );
        }

        #[test]
        fn test_error_response_serializes_camel_case_status_code() {
            let json = serde_json::to_value(ErrorResponse::new(StatusCode::FORBIDDEN, "x")).unwrap();
            assert_eq!(json["statusCode"], 403);
            assert_eq!(json["status"], 403);
        }
    }
}
