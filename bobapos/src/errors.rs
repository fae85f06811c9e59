use crate::db::errors::DbError;
use crate::types::Operation;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Authentication required but not provided
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// Employee lacks the admin flag required for the operation
    #[error("Insufficient permissions to {action} {resource}")]
    InsufficientPermissions { action: Operation, resource: String },

    /// Invalid request data or business rule violation
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// An optional feature (chat, Google login) is not configured
    #[error("{message}")]
    ServiceUnavailable { message: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),

    /// Conflict error, e.g., for unique constraint violations
    #[error("Conflict: {message}")]
    Conflict { message: String },
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::InsufficientPermissions { .. } => StatusCode::FORBIDDEN,
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } => StatusCode::CONFLICT,
                DbError::ForeignKeyViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::CheckViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::InsufficientInventory { .. } => StatusCode::BAD_REQUEST,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Conflict { .. } => StatusCode::CONFLICT,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated { message } => message.clone().unwrap_or_else(|| "Authentication required".to_string()),
            Error::InsufficientPermissions { action, resource } => {
                format!("Insufficient permissions to {action} {resource}")
            }
            Error::BadRequest { message } => message.clone(),
            Error::NotFound { resource, id } => {
                format!("{resource} with ID {id} not found")
            }
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::ServiceUnavailable { message } => message.clone(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation { .. } => unique_violation_details(db_err).0,
                DbError::ForeignKeyViolation { table, message, .. } => match table.as_deref() {
                    Some("transaction_items") if message.contains("update or delete") => {
                        "Product is referenced by recorded transactions".to_string()
                    }
                    Some("transactions") if message.contains("update or delete") => {
                        "Employee is referenced by recorded transactions".to_string()
                    }
                    _ => "Invalid reference to related resource".to_string(),
                },
                DbError::CheckViolation { .. } => "Invalid data provided".to_string(),
                DbError::InsufficientInventory {
                    product_id,
                    requested,
                    available,
                } => {
                    format!("Insufficient inventory for product {product_id}: requested {requested}, available {available}")
                }
                DbError::Other(_) => "Database error occurred".to_string(),
            },
            Error::Other(_) => "Internal server error".to_string(),
            Error::Conflict { message } => message.clone(),
        }
    }
}

/// Resource name and client message for a unique violation, keyed on the violated constraint
fn unique_violation_details(db_err: &DbError) -> (String, &'static str) {
    let DbError::UniqueViolation { constraint, table, .. } = db_err else {
        return ("Resource already exists".to_string(), "unknown");
    };

    match (table.as_deref(), constraint.as_deref()) {
        (Some("employees"), Some(c)) if c.contains("email") => {
            ("An employee with this email address already exists".to_string(), "employee")
        }
        (Some("products"), Some(c)) if c.contains("name") => ("A product with this name already exists".to_string(), "product"),
        (Some("allergens"), Some(c)) if c.contains("name") => ("An allergen with this name already exists".to_string(), "allergen"),
        _ => ("Resource already exists".to_string(), "unknown"),
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Database(DbError::Other(_)) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Database(_) => {
                tracing::warn!("Database constraint error: {}", self);
            }
            Error::Unauthenticated { .. } | Error::InsufficientPermissions { .. } => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::BadRequest { .. } | Error::NotFound { .. } => {
                tracing::debug!("Client error: {}", self);
            }
            Error::ServiceUnavailable { .. } => {
                tracing::warn!("Service unavailable: {}", self);
            }
            Error::Conflict { .. } => {
                tracing::warn!("Conflict error: {}", self);
            }
        }

        let status = self.status_code();

        match &self {
            // Unique violations get a small structured body so clients can tell which resource clashed
            Error::Database(db_err @ DbError::UniqueViolation { .. }) => {
                let (message, resource) = unique_violation_details(db_err);
                let body = serde_json::json!({
                    "message": message,
                    "resource": resource
                });

                (status, axum::response::Json(body)).into_response()
            }
            _ => {
                let user_message = self.user_message();
                (status, user_message).into_response()
            }
        }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            Error::BadRequest {
                message: "bad".to_string()
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::NotFound {
                resource: "Product".to_string(),
                id: "1".to_string()
            }
            .status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(Error::Database(DbError::NotFound).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            Error::Database(DbError::InsufficientInventory {
                product_id: 3,
                requested: 5,
                available: 2
            })
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::Database(DbError::Other(anyhow::anyhow!("connection reset"))).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            Error::InsufficientPermissions {
                action: Operation::Delete,
                resource: "employees".to_string()
            }
            .status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_internal_errors_do_not_leak() {
        let err = Error::Other(anyhow::anyhow!("password authentication failed for user \"pos\""));
        assert_eq!(err.user_message(), "Internal server error");

        let err = Error::Database(DbError::Other(anyhow::anyhow!("relation \"products\" does not exist")));
        assert_eq!(err.user_message(), "Database error occurred");
    }

    #[test]
    fn test_foreign_key_messages() {
        let err = Error::Database(DbError::ForeignKeyViolation {
            constraint: Some("transaction_items_product_id_fkey".to_string()),
            table: Some("transaction_items".to_string()),
            message: "update or delete on table \"products\" violates foreign key constraint".to_string(),
        });
        assert_eq!(err.user_message(), "Product is referenced by recorded transactions");

        let err = Error::Database(DbError::ForeignKeyViolation {
            constraint: None,
            table: Some("product_allergens".to_string()),
            message: "insert or update on table \"product_allergens\" violates foreign key constraint".to_string(),
        });
        assert_eq!(err.user_message(), "Invalid reference to related resource");
    }

    #[tokio::test]
    async fn test_unique_violation_response_is_structured() {
        let err = Error::Database(DbError::UniqueViolation {
            constraint: Some("employees_email_unique".to_string()),
            table: Some("employees".to_string()),
            message: "duplicate key value".to_string(),
            conflicting_value: Some("a@b.com".to_string()),
        });

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["resource"], "employee");
        assert_eq!(json["message"], "An employee with this email address already exists");
    }

    #[tokio::test]
    async fn test_plain_text_body_for_client_errors() {
        let response = Error::BadRequest {
            message: "Quantity must be positive".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Quantity must be positive");
    }
}
