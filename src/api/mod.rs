use std::collections::HashMap;

use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub mod accounts;
pub mod admin;
pub mod catalog;

pub use accounts::*;
pub use admin::*;
pub use catalog::*;

/// The `(success, message, payload)` triple every endpoint answers with.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub errors: HashMap<String, Vec<String>>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            errors: HashMap::new(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            errors: HashMap::new(),
        }
    }
}

impl ApiResponse<()> {
    pub fn done(message: impl Into<String>) -> Self {
        Self::ok(message, ())
    }
}

pub type ApiError = Custom<Json<ApiResponse<()>>>;
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        let status = err.to_status_with_log("API request");
        Custom(status, Json(ApiResponse::failure(err.user_message())))
    }
}

pub fn respond<T>(message: impl Into<String>, data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::ok(message, data)))
}

#[get("/health")]
pub fn health() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::ok("healthy", env!("CARGO_PKG_VERSION")))
}
