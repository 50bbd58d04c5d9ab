use once_cell::sync::Lazy;
use regex::Regex;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use std::collections::{BTreeMap, HashMap};
use tracing::instrument;
use validator::Validate;

use crate::api::{ApiError, ApiResponse};
use crate::requests::{ProfileUpdate, RegistrationRequest};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap());
static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_]+$").unwrap());
static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?[0-9\s\-()]{10,15}$").unwrap());
static NATIONAL_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{7,8}$").unwrap());

pub const MIN_USERNAME_LEN: usize = 3;
pub const MIN_PASSWORD_LEN: usize = 8;

fn required_label(field: &str) -> String {
    let label = field
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ");
    format!("{} is required", label)
}

/// Every rule broken by a registration, in a stable order. Shape rules only
/// apply to fields that were supplied; a missing field yields just its
/// "is required" message.
pub fn registration_violations(data: &RegistrationRequest) -> Vec<String> {
    let mut errors = Vec::new();

    let required = [
        ("username", &data.username),
        ("email", &data.email),
        ("first_name", &data.first_name),
        ("last_name", &data.last_name),
        ("password", &data.password),
        ("phone_number", &data.phone_number),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            errors.push(required_label(field));
        }
    }

    if !data.email.is_empty() && !EMAIL_RE.is_match(&data.email) {
        errors.push("Please enter a valid email address".to_string());
    }

    if !data.username.is_empty() {
        if data.username.chars().count() < MIN_USERNAME_LEN {
            errors.push("Username must be at least 3 characters long".to_string());
        }
        if !USERNAME_RE.is_match(&data.username) {
            errors.push("Username can only contain letters, numbers, and underscores".to_string());
        }
    }

    if !data.password.is_empty() && data.password.chars().count() < MIN_PASSWORD_LEN {
        errors.push("Password must be at least 8 characters long".to_string());
    }

    if !data.phone_number.is_empty() && !PHONE_RE.is_match(&data.phone_number) {
        errors.push("Please enter a valid phone number".to_string());
    }

    if let Some(id_number) = data.id_number.as_deref().filter(|s| !s.is_empty()) {
        if !NATIONAL_ID_RE.is_match(id_number) {
            errors.push("National ID number should be 7-8 digits".to_string());
        }
    }

    errors
}

pub fn profile_violations(data: &ProfileUpdate) -> Vec<String> {
    let mut errors = Vec::new();

    if let Some(phone) = data.phone_number.as_deref().filter(|s| !s.is_empty()) {
        if !PHONE_RE.is_match(phone) {
            errors.push("Please enter a valid phone number".to_string());
        }
    }
    if let Some(name) = &data.full_name {
        if name.trim().is_empty() {
            errors.push("Full name cannot be blank".to_string());
        }
    }

    errors
}

#[derive(Debug)]
pub struct ValidationErrorWrapper(pub validator::ValidationErrors);

impl From<ValidationErrorWrapper> for ApiError {
    #[instrument]
    fn from(wrapper: ValidationErrorWrapper) -> Self {
        let errors = wrapper.0;
        // BTreeMap keeps the joined message deterministic.
        let mut ordered: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for (field, field_errors) in errors.field_errors() {
            let error_messages: Vec<String> = field_errors
                .iter()
                .map(|error| {
                    error
                        .message
                        .clone()
                        .unwrap_or_else(|| "Invalid value".into())
                        .to_string()
                })
                .collect();

            ordered.insert(field.to_string(), error_messages);
        }

        let message = ordered
            .values()
            .flatten()
            .cloned()
            .collect::<Vec<_>>()
            .join("; ");

        let mut response = ApiResponse::failure(message);
        response.errors = ordered.into_iter().collect::<HashMap<_, _>>();

        Custom(Status::UnprocessableEntity, Json(response))
    }
}

pub trait JsonValidateExt<T> {
    fn validate_custom(self) -> Result<T, ApiError>;
}

impl<T: Validate> JsonValidateExt<T> for Json<T> {
    fn validate_custom(self) -> Result<T, ApiError> {
        let inner = self.into_inner();
        inner.validate().map_err(ValidationErrorWrapper)?;
        Ok(inner)
    }
}
