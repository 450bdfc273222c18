//! Unified API error handling.
//!
//! Every handler returns `Result<_, ApiError>`. Errors are rendered in one
//! JSON envelope: `{"error": {"code", "message", "details"}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::HashMap;

use crate::db::QueryError;
use crate::reports::ExportError;

/// Field name to the messages recorded against it
pub type FieldErrors = HashMap<String, Vec<String>>;

/// Machine-readable error code, serialized in snake_case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    TooManyRequests,
    ValidationError,
    InternalError,
    DatabaseError,
}

impl ErrorCode {
    fn http_status(self) -> StatusCode {
        match self {
            ErrorCode::BadRequest | ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::InternalError | ErrorCode::DatabaseError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    error: EnvelopeBody<'a>,
}

#[derive(Serialize)]
struct EnvelopeBody<'a> {
    code: ErrorCode,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a FieldErrors>,
}

#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    message: String,
    details: Option<FieldErrors>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// 400
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    /// 401, missing or unknown credentials
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    /// 403, authenticated but lacking the role
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TooManyRequests, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// 400 carrying per-field messages. A single message becomes the headline.
    pub fn validation(errors: FieldErrors) -> Self {
        let mut messages = errors.values().flatten();
        let message = match (errors.len(), messages.next()) {
            (1, Some(first)) => first.clone(),
            (n, _) => format!("Validation failed for {} fields", n),
        };

        Self {
            code: ErrorCode::ValidationError,
            message,
            details: Some(errors),
        }
    }

    pub fn validation_field(field: &str, message: impl Into<String>) -> Self {
        Self::validation(HashMap::from([(field.to_string(), vec![message.into()])]))
    }

    fn database(err: &sqlx::Error) -> Self {
        tracing::error!("Database error: {}", err);
        Self::new(ErrorCode::DatabaseError, "A database error occurred")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let envelope = Envelope {
            error: EnvelopeBody {
                code: self.code,
                message: &self.message,
                details: self.details.as_ref(),
            },
        };
        (self.code.http_status(), Json(envelope)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => ApiError::not_found("Resource not found"),
            sqlx::Error::Database(db_err) if db_err.message().contains("UNIQUE constraint failed") => {
                ApiError::conflict("A resource with this identifier already exists")
            }
            sqlx::Error::Database(db_err)
                if db_err.message().contains("FOREIGN KEY constraint failed") =>
            {
                ApiError::bad_request("Referenced resource does not exist")
            }
            _ => ApiError::database(&err),
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::InvalidFilter(message) => ApiError::bad_request(message),
            QueryError::Database(e) => e.into(),
        }
    }
}

impl From<ExportError> for ApiError {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::UnknownFormat(_) => ApiError::validation_field("format", err.to_string()),
            ExportError::UnknownField(_) => ApiError::validation_field("fields", err.to_string()),
            other => {
                tracing::error!("Export failed: {}", other);
                ApiError::internal("Failed to encode export")
            }
        }
    }
}

/// Collects field errors across a request, then fails once with all of them
#[derive(Debug, Default)]
pub struct ValidationErrorBuilder {
    errors: FieldErrors,
}

impl ValidationErrorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) -> &mut Self {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
        self
    }

    /// Record the error from a validator, if it produced one
    pub fn check(&mut self, field: &str, result: Result<(), String>) -> &mut Self {
        if let Err(message) = result {
            self.add(field, message);
        }
        self
    }

    pub fn finish(self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::validation(self.errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use serde_json::Value;

    async fn render(err: ApiError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_status_per_code() {
        assert_eq!(ErrorCode::BadRequest.http_status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::ValidationError.http_status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::Unauthorized.http_status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::Conflict.http_status(), StatusCode::CONFLICT);
        assert_eq!(ErrorCode::TooManyRequests.http_status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ErrorCode::DatabaseError.http_status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_validation_error_single_field() {
        let err = ApiError::validation_field("name", "Name is required");
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(err.message, "Name is required");
    }

    #[test]
    fn test_validation_error_builder() {
        let mut builder = ValidationErrorBuilder::new();
        builder.add("name", "Name is required");
        builder.add("email", "Invalid email format");
        builder.check("name", Err("Name is too short".to_string()));
        builder.check("phone", Ok(()));

        let err = builder.finish().unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert!(err.message.contains("2 fields"));

        let details = err.details.unwrap();
        assert_eq!(details["name"].len(), 2);
        assert!(!details.contains_key("phone"));

        assert!(ValidationErrorBuilder::new().finish().is_ok());
    }

    #[test]
    fn test_query_error_mapping() {
        let err: ApiError = QueryError::InvalidFilter("Invalid sort field".into()).into();
        assert_eq!(err.code, ErrorCode::BadRequest);

        let err: ApiError = QueryError::Database(sqlx::Error::RowNotFound).into();
        assert_eq!(err.code, ErrorCode::NotFound);

        let err: ApiError = sqlx::Error::PoolTimedOut.into();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }

    #[tokio::test]
    async fn test_envelope_shape() {
        let (status, body) = render(ApiError::conflict("taken")).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "conflict");
        assert_eq!(body["error"]["message"], "taken");
        assert!(body["error"].get("details").is_none());

        let (status, body) = render(ApiError::validation_field("sku", "SKU is required")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "validation_error");
        assert_eq!(body["error"]["details"]["sku"][0], "SKU is required");
    }
}
