/// Error types for Community Service
///
/// `AppError` is what handlers and services return; it renders as a JSON body
/// `{"error", "code", "status", "retryable"}`. Storage adapters speak
/// [`StoreError`](crate::db::StoreError), converted here.
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use crypto_core::TokenError;

use crate::db::StoreError;
use crate::domain::likes::VoteError;
use crate::domain::thread::{AttachError, MissingNode};

/// Result type for community-service operations
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Post, comment or reply id does not resolve
    #[error("Not found: {0}")]
    NotFound(String),

    /// Authorization denied
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation failed on '{field}': {message}")]
    Validation { field: String, message: String },

    /// Missing or invalid credential
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Credential expired")]
    Expired,

    /// Optimistic concurrency mismatch; retry with fresh data
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Validation { .. } => "VALIDATION_FAILED",
            AppError::Unauthenticated(_) => "UNAUTHENTICATED",
            AppError::Expired => "EXPIRED",
            AppError::Conflict(_) => "CONFLICT",
            AppError::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            AppError::Timeout(_) => "TIMEOUT",
            AppError::Internal(_) => "INTERNAL",
        }
    }

    /// Whether the client may retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Conflict(_) | AppError::StorageUnavailable(_) | AppError::Timeout(_)
        )
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated(_) | AppError::Expired => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let mut body = serde_json::json!({
            "error": self.to_string(),
            "code": self.code(),
            "status": status.as_u16(),
            "retryable": self.is_retryable(),
        });
        if let AppError::Validation { field, .. } = self {
            body["field"] = serde_json::Value::String(field.clone());
        }

        HttpResponse::build(status).json(body)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Missing(missing) => missing.into(),
            StoreError::Conflict { post_id } => {
                AppError::Conflict(format!("post {post_id} was modified concurrently"))
            }
            StoreError::DepthExceeded => {
                AppError::validation("path", "replies cannot be nested below another reply")
            }
            StoreError::Timeout(elapsed) => {
                AppError::Timeout(format!("storage did not answer within {elapsed:?}"))
            }
            StoreError::InvalidPatch(field) => {
                AppError::validation(field, format!("'{field}' cannot be set on this node"))
            }
            StoreError::Unavailable(msg) => AppError::StorageUnavailable(msg),
            StoreError::Corrupt(msg) => AppError::Internal(msg),
        }
    }
}

impl From<MissingNode> for AppError {
    fn from(missing: MissingNode) -> Self {
        AppError::NotFound(missing.to_string())
    }
}

impl From<AttachError> for AppError {
    fn from(err: AttachError) -> Self {
        StoreError::from(err).into()
    }
}

impl From<VoteError> for AppError {
    fn from(err: VoteError) -> Self {
        match err {
            VoteError::NotAPoll(_) => AppError::validation("post_id", err.to_string()),
            VoteError::OptionOutOfRange { .. } => {
                AppError::validation("option_index", err.to_string())
            }
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AppError::Expired,
            other => AppError::Unauthenticated(other.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));

        match fields.first() {
            Some((field, errs)) => {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| "invalid value".to_string());
                AppError::validation(field.to_string(), message)
            }
            None => AppError::validation("body", errors.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(AppError::Expired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::Timeout("x".into()).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            AppError::validation("body", "empty").status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_retryable_classification() {
        assert!(AppError::Conflict("x".into()).is_retryable());
        assert!(AppError::StorageUnavailable("x".into()).is_retryable());
        assert!(!AppError::Forbidden("x".into()).is_retryable());
        assert!(!AppError::NotFound("x".into()).is_retryable());
    }

    #[test]
    fn test_store_errors_keep_their_meaning() {
        let id = Uuid::new_v4();
        let err: AppError = StoreError::Missing(MissingNode::Reply(id)).into();
        assert!(matches!(err, AppError::NotFound(msg) if msg.contains(&id.to_string())));

        let err: AppError = StoreError::DepthExceeded.into();
        assert!(matches!(err, AppError::Validation { field, .. } if field == "path"));

        let err: AppError = StoreError::Conflict { post_id: id }.into();
        assert_eq!(err.code(), "CONFLICT");
    }

    #[test]
    fn test_expired_token_is_distinct() {
        assert!(matches!(AppError::from(TokenError::Expired), AppError::Expired));
        assert!(matches!(
            AppError::from(TokenError::Invalid("bad".into())),
            AppError::Unauthenticated(_)
        ));
    }
}
