use opentelemetry_semantic_conventions::{attribute::OTEL_STATUS_CODE, trace::ERROR_TYPE};
use rocket::http::Status;
use thiserror::Error;
use tracing::{Span, error, field, warn};

use crate::access::AccessDenial;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Access denied: {0}")]
    AccessDenied(AccessDenial),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable identifier recorded as `error.type` on the active span.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database_error",
            AppError::Authentication(_) => "authentication_error",
            AppError::Authorization(_) => "authorization_error",
            AppError::NotFound(_) => "not_found_error",
            AppError::Validation(_) => "validation_error",
            AppError::Conflict(_) => "conflict_error",
            AppError::AccessDenied(_) => "access_denied",
            AppError::Internal(_) => "internal_error",
        }
    }

    fn is_server_fault(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::Internal(_))
    }

    pub fn log_and_record(&self, ctx: &str) {
        let message = self.to_string();
        if self.is_server_fault() {
            error!(error = %message, context = %ctx, kind = self.kind(), "Request failed");
        } else {
            warn!(error = %message, context = %ctx, kind = self.kind(), "Request rejected");
        }

        let current_span = Span::current();
        if current_span.is_none() {
            return;
        }

        current_span.record("error", field::display(true));
        current_span.record(ERROR_TYPE, field::display(self.kind()));
        current_span.record("error.message", field::display(&message));
        if self.is_server_fault() {
            current_span.record(OTEL_STATUS_CODE, field::display("ERROR"));
        }
    }

    pub fn status_code(&self) -> Status {
        match self {
            AppError::Database(_) => Status::InternalServerError,
            AppError::Authentication(_) => Status::Unauthorized,
            AppError::Authorization(_) => Status::Forbidden,
            AppError::NotFound(_) => Status::NotFound,
            AppError::Validation(_) => Status::UnprocessableEntity,
            AppError::Conflict(_) => Status::Conflict,
            AppError::AccessDenied(_) => Status::Forbidden,
            AppError::Internal(_) => Status::InternalServerError,
        }
    }

    /// Message meant for direct display. Store and internal failures are
    /// reported generically; their detail only goes to the log.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Database(_) | AppError::Internal(_) => {
                "Something went wrong, please try again.".to_string()
            }
            AppError::AccessDenied(denial) => denial.message().to_string(),
            AppError::Authentication(msg)
            | AppError::Authorization(msg)
            | AppError::NotFound(msg)
            | AppError::Validation(msg)
            | AppError::Conflict(msg) => msg.clone(),
        }
    }

    pub fn to_status_with_log(&self, context: &str) -> Status {
        self.log_and_record(context);
        self.status_code()
    }

    /// Turns a unique-constraint failure into a `Conflict` carrying `message`.
    /// Any other error passes through untouched.
    pub fn on_unique_violation(self, message: &str) -> Self {
        match self {
            AppError::Database(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                AppError::Conflict(message.to_string())
            }
            other => other,
        }
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> Self {
        AppError::Internal(format!("Cryptography error: {}", error))
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        AppError::Internal(format!("Migration error: {}", error))
    }
}
