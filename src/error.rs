use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::response::ApiResponse;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Order has no product.")]
    EmptyOrder,

    #[error("{0}")]
    Validation(String),

    #[error("Product {0} not found")]
    ProductNotFound(i32),

    #[error("Order {0} not found")]
    OrderNotFound(i32),

    #[error("No products found in category {0}")]
    CategoryEmpty(String),

    #[error("Not Found")]
    NotFound,

    #[error("{message}")]
    Conflict { code: &'static str, message: String },

    #[error("Not enough stock available for {product}: requested {requested}, available {available}")]
    InsufficientStock {
        product: String,
        requested: i32,
        available: i32,
    },

    #[error("Invalid status {0:?}")]
    InvalidStatus(String),

    #[error("{0}")]
    InvalidCredentials(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Database error")]
    DbError(#[from] sqlx::Error),

    #[error("ORM error")]
    OrmError(#[from] sea_orm::DbErr),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::EmptyOrder
            | AppError::Validation(_)
            | AppError::Conflict { .. }
            | AppError::InsufficientStock { .. }
            | AppError::InvalidStatus(_)
            | AppError::InvalidCredentials(_) => StatusCode::BAD_REQUEST,
            AppError::ProductNotFound(_)
            | AppError::OrderNotFound(_)
            | AppError::CategoryEmpty(_)
            | AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::DbError(_) | AppError::OrmError(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Machine-readable reason carried in every error body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::EmptyOrder => "empty_order",
            AppError::Validation(_) => "validation_error",
            AppError::ProductNotFound(_) => "product_not_found",
            AppError::OrderNotFound(_) => "order_not_found",
            AppError::CategoryEmpty(_) => "category_empty",
            AppError::NotFound => "not_found",
            AppError::Conflict { code, .. } => *code,
            AppError::InsufficientStock { .. } => "insufficient_stock",
            AppError::InvalidStatus(_) => "invalid_status",
            AppError::InvalidCredentials(_) => "invalid_credentials",
            AppError::Unauthorized(_) => "not_authenticated",
            AppError::Forbidden => "permission_denied",
            AppError::DbError(_) | AppError::OrmError(_) | AppError::Internal(_) => {
                "internal_error"
            }
        }
    }
}

/// Detail of a unique-index violation, if that is what `err` is.
pub fn unique_violation(err: &sea_orm::DbErr) -> Option<String> {
    match err.sql_err() {
        Some(sea_orm::SqlErr::UniqueConstraintViolation(detail)) => Some(detail),
        _ => None,
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        tracing::debug!(reason = %rejection.body_text(), "path did not match");
        AppError::NotFound
    }
}

#[derive(Serialize)]
struct ErrorData {
    error: String,
    code: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            match &self {
                AppError::DbError(source) => tracing::error!(error = ?source, "database failure"),
                AppError::OrmError(source) => tracing::error!(error = ?source, "orm failure"),
                AppError::Internal(source) => tracing::error!(error = ?source, "internal failure"),
                _ => tracing::error!(error = %self, "unexpected failure"),
            }
        }

        let message = if status.is_server_error() {
            "Internal Server Error".to_string()
        } else {
            self.to_string()
        };
        let body = ApiResponse::failure(
            message.clone(),
            ErrorData {
                error: message,
                code: self.code(),
            },
        );

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_rule_violations_are_client_errors() {
        let stock = AppError::InsufficientStock {
            product: "Pixel".into(),
            requested: 11,
            available: 10,
        };
        assert_eq!(stock.status(), StatusCode::BAD_REQUEST);
        assert_eq!(stock.code(), "insufficient_stock");

        assert_eq!(AppError::EmptyOrder.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::InvalidStatus("Processing".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn missing_entities_have_distinct_codes() {
        assert_eq!(AppError::ProductNotFound(1).code(), "product_not_found");
        assert_eq!(AppError::OrderNotFound(1).code(), "order_not_found");
        assert_eq!(
            AppError::CategoryEmpty("tablet".into()).code(),
            "category_empty"
        );
        assert_eq!(
            AppError::CategoryEmpty("tablet".into()).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn internal_errors_do_not_leak_details() {
        let err = AppError::Internal(anyhow::anyhow!("password column missing"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Internal Server Error");
    }
}
