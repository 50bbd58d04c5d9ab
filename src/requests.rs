use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::Role;
use crate::models::LessonType;

#[derive(Debug, Deserialize, Serialize, Validate, Clone)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Public signup: a basic account, detailed registration is separate.
#[derive(Debug, Deserialize, Serialize, Validate, Clone)]
pub struct SignupRequest {
    #[validate(length(min = 3, message = "Username must be at least 3 characters long"))]
    pub username: String,
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Full name is required"))]
    pub full_name: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters long"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords do not match."))]
    pub confirm_password: String,
    #[serde(default)]
    pub department: Option<String>,
}

/// Comprehensive registration. Field rules live in `validation::registration_violations`
/// so that every violation is reported together.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct RegistrationRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub full_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state_province: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub nationality: Option<String>,
    pub id_number: Option<String>,
    pub passport_number: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub emergency_contact_relationship: Option<String>,
    pub highest_education: Option<String>,
    pub institution_name: Option<String>,
    pub graduation_year: Option<i64>,
    pub professional_experience: Option<String>,
    pub current_position: Option<String>,
    pub organization: Option<String>,
    pub years_of_experience: Option<i64>,
    pub department: Option<String>,
    pub preferred_course_id: Option<i64>,
    pub motivation: Option<String>,
    pub how_did_you_hear: Option<String>,
}

impl RegistrationRequest {
    pub fn display_name(&self) -> String {
        match self.full_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("{} {}", self.first_name.trim(), self.last_name.trim()),
        }
    }
}

/// Self-service profile edit. Identity and role fields are not editable here.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state_province: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub nationality: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub emergency_contact_relationship: Option<String>,
    pub highest_education: Option<String>,
    pub institution_name: Option<String>,
    pub graduation_year: Option<i64>,
    pub professional_experience: Option<String>,
    pub current_position: Option<String>,
    pub organization: Option<String>,
    pub years_of_experience: Option<i64>,
    pub department: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Validate, Clone)]
pub struct AccountUpdate {
    #[validate(length(min = 3, message = "Username must be at least 3 characters long"))]
    pub username: String,
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Full name is required"))]
    pub full_name: String,
    pub role: Role,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Serialize, Validate, Clone)]
pub struct PasswordChangeRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters long"))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Serialize, Validate, Clone)]
pub struct CourseRequest {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    #[validate(length(min = 1, message = "Category is required"))]
    pub category: String,
    #[validate(length(min = 1, message = "Level is required"))]
    pub level: String,
    #[serde(default)]
    #[validate(range(min = 0, message = "Duration cannot be negative"))]
    pub duration_hours: i64,
    #[serde(default)]
    pub is_published: bool,
}

#[derive(Debug, Deserialize, Serialize, Validate, Clone)]
pub struct LessonRequest {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Content is required"))]
    pub content: String,
    #[serde(default)]
    pub lesson_type: LessonType,
    #[serde(default)]
    #[validate(range(min = 0, message = "Duration cannot be negative"))]
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub learning_objectives: Option<String>,
    #[serde(default)]
    pub additional_resources: Option<String>,
    /// Path of an already-uploaded attachment, stored as given.
    #[serde(default)]
    pub file_path: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ReorderRequest {
    pub lesson_ids: Vec<i64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BulkApproveRequest {
    pub ids: Vec<i64>,
}

#[derive(Debug, Deserialize, Serialize, Validate, Clone, Default)]
pub struct CompleteLessonRequest {
    #[serde(default)]
    #[validate(range(min = 0, message = "Time spent cannot be negative"))]
    pub time_spent: i64,
}
