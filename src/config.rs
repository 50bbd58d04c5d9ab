use rocket::figment::Figment;
use serde::Deserialize;

use crate::models::ApprovalStatus;

/// Application settings, read from Rocket's figment so `ROCKET_*` variables
/// and `Rocket.toml` both apply.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_url: String,
    /// Approval status given to accounts created through either signup path.
    pub new_account_status: ApprovalStatus,
    pub session_hours: i64,
    pub session_cleanup_interval_secs: u64,
    pub admin_username: Option<String>,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://portal.db?mode=rwc".to_string(),
            new_account_status: ApprovalStatus::Pending,
            session_hours: 8,
            session_cleanup_interval_secs: 3600,
            admin_username: None,
            admin_email: None,
            admin_password: None,
        }
    }
}

impl AppConfig {
    pub fn from_figment(figment: &Figment) -> Result<Self, rocket::figment::Error> {
        figment.extract()
    }

    /// Username, email and password of the bootstrap admin, when configured.
    pub fn bootstrap_admin(&self) -> Option<(&str, &str, &str)> {
        match (&self.admin_email, &self.admin_password) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => Some((
                self.admin_username.as_deref().unwrap_or("admin"),
                email.as_str(),
                password.as_str(),
            )),
            _ => None,
        }
    }
}
