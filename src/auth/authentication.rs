use rocket::Request;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::serde::json::Json;
use sqlx::SqlitePool;

use crate::api::ApiResponse;
use crate::db::{get_account, get_session_by_token};

use super::User;

pub const SESSION_COOKIE: &str = "session_token";

#[rocket::async_trait]
impl<'r> FromRequest<'r> for User {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let auth_span = tracing::info_span!("user_auth_guard");
        let _guard = auth_span.enter();

        let token = request
            .cookies()
            .get_private(SESSION_COOKIE)
            .map(|c| c.value().to_string());

        let Some(token) = token else {
            return Outcome::Error((Status::Unauthorized, ()));
        };

        let db = match request.rocket().state::<SqlitePool>() {
            Some(pool) => pool,
            None => {
                tracing::error!("Database pool not found in managed state");
                return Outcome::Error((Status::InternalServerError, ()));
            }
        };

        let session = match get_session_by_token(db, &token).await {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(error = ?err, "Invalid session token");
                return Outcome::Error((Status::Unauthorized, ()));
            }
        };

        if !session.is_valid() {
            tracing::warn!(user_id = %session.user_id, "Session token expired");
            return Outcome::Error((Status::Unauthorized, ()));
        }

        match get_account(db, session.user_id).await {
            Ok(account) if account.is_active => {
                tracing::info!(username = %account.username, role = %account.role, "User authenticated via session token");
                Outcome::Success(User::from(account))
            }
            Ok(account) => {
                tracing::warn!(username = %account.username, "Session belongs to a deactivated account");
                Outcome::Error((Status::Unauthorized, ()))
            }
            Err(err) => {
                tracing::error!(user_id = %session.user_id, error = ?err, "Failed to fetch account for valid session");
                Outcome::Error((Status::InternalServerError, ()))
            }
        }
    }
}

#[catch(401)]
pub fn unauthorized_api(_req: &Request) -> Json<ApiResponse<()>> {
    Json(ApiResponse::failure("Authentication required"))
}

#[catch(403)]
pub fn forbidden_api(_req: &Request) -> Json<ApiResponse<()>> {
    tracing::warn!("Forbidden access attempt");
    Json(ApiResponse::failure(
        "You don't have permission to perform this action",
    ))
}

#[catch(404)]
pub fn not_found_api(_req: &Request) -> Json<ApiResponse<()>> {
    Json(ApiResponse::failure("Resource not found"))
}

#[catch(422)]
pub fn unprocessable_api(_req: &Request) -> Json<ApiResponse<()>> {
    Json(ApiResponse::failure("The request body could not be understood"))
}
