use chrono::{Duration, Utc};
use rocket::State;
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use tracing::{info, warn};

use crate::auth::{Permission, SESSION_COOKIE, User, UserSession};
use crate::config::AppConfig;
use crate::db::{
    change_password, create_user_session, get_account, invalidate_session, list_courses, login,
    register, signup, update_profile,
};
use crate::models::{Account, ApprovalStatus, Course};
use crate::requests::{
    LoginRequest, PasswordChangeRequest, ProfileUpdate, RegistrationRequest, SignupRequest,
};
use crate::validation::JsonValidateExt;

use super::{ApiResponse, ApiResult, respond};

#[derive(Serialize, Deserialize, Debug)]
pub struct CreatedAccount {
    pub id: i64,
}

#[post("/signup", format = "json", data = "<data>")]
pub async fn api_signup(
    data: Json<SignupRequest>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> ApiResult<CreatedAccount> {
    let data = data.validate_custom()?;

    let id = signup(db, &data, config.new_account_status).await?;
    info!(account_id = id, "Account created via signup");

    respond(
        "Account created. Please sign in, then complete your registration inside the system.",
        CreatedAccount { id },
    )
}

#[post("/register", format = "json", data = "<data>")]
pub async fn api_register(
    data: Json<RegistrationRequest>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> ApiResult<CreatedAccount> {
    let data = data.into_inner();
    let id = register(db, &data, config.new_account_status).await?;

    respond(
        registration_message(&data.display_name(), config.new_account_status),
        CreatedAccount { id },
    )
}

fn registration_message(name: &str, status: ApprovalStatus) -> String {
    match status {
        ApprovalStatus::Approved => format!(
            "Registration successful for \"{}\". Your account is active; course enrollment requests still need admin approval.",
            name
        ),
        ApprovalStatus::Pending | ApprovalStatus::Rejected => format!(
            "Registration successful for \"{}\". Your account and course enrollment are pending admin approval.",
            name
        ),
    }
}

/// Published courses a new registrant can pick as their preferred course.
#[get("/register/courses")]
pub async fn api_registration_courses(db: &State<Pool<Sqlite>>) -> ApiResult<Vec<Course>> {
    let courses = list_courses(db, false).await?;
    respond("Available courses", courses)
}

#[post("/login", format = "json", data = "<login_data>")]
pub async fn api_login(
    login_data: Json<LoginRequest>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
    cookies: &CookieJar<'_>,
) -> ApiResult<Account> {
    let login_data = login_data.validate_custom()?;

    let Some(outcome) = login(db, &login_data.email, &login_data.password).await? else {
        return Err(Custom(
            Status::Unauthorized,
            Json(ApiResponse::failure("Invalid email or password.")),
        ));
    };

    let token = UserSession::generate_token();
    let expires_at = (Utc::now() + Duration::hours(config.session_hours)).naive_utc();
    create_user_session(db, outcome.account.id, &token, expires_at).await?;

    cookies.add_private(
        Cookie::build((SESSION_COOKIE, token))
            .http_only(true)
            .same_site(SameSite::Lax)
            .path("/"),
    );

    respond(outcome.message, outcome.account)
}

#[post("/logout")]
pub async fn api_logout(
    db: &State<Pool<Sqlite>>,
    cookies: &CookieJar<'_>,
) -> ApiResult<()> {
    if let Some(cookie) = cookies.get_private(SESSION_COOKIE) {
        if let Err(err) = invalidate_session(db, cookie.value()).await {
            warn!(error = %err, "Failed to invalidate session on logout");
        }
    }
    cookies.remove_private(SESSION_COOKIE);

    Ok(Json(ApiResponse::done("You have been logged out successfully.")))
}

#[get("/me")]
pub async fn api_me(user: User, db: &State<Pool<Sqlite>>) -> ApiResult<Account> {
    let account = get_account(db, user.id).await?;
    respond("Current account", account)
}

#[put("/profile", format = "json", data = "<data>")]
pub async fn api_update_profile(
    user: User,
    data: Json<ProfileUpdate>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Account> {
    user.require_permission(Permission::EditOwnProfile)?;

    update_profile(db, user.id, &data).await?;
    let account = get_account(db, user.id).await?;

    respond("Profile updated successfully", account)
}

#[post("/change-password", format = "json", data = "<data>")]
pub async fn api_change_password(
    user: User,
    data: Json<PasswordChangeRequest>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<()> {
    let data = data.validate_custom()?;

    change_password(db, user.id, &data.current_password, &data.new_password).await?;

    Ok(Json(ApiResponse::done("Password updated successfully.")))
}
