#[macro_use]
extern crate rocket;

mod access;
mod api;
mod auth;
mod config;
mod db;
mod env;
mod error;
mod models;
mod requests;
mod telemetry;
#[cfg(test)]
mod test;
mod validation;

use std::str::FromStr;
use std::sync::Mutex;

use api::*;
use auth::{forbidden_api, not_found_api, unauthorized_api, unprocessable_api};
use config::AppConfig;
use db::{clean_expired_sessions, ensure_admin};
use env::EnvFile;
use error::AppError;
use once_cell::sync::Lazy;
use rocket::fairing::AdHoc;
use rocket::{Build, Rocket, tokio};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use telemetry::{OtelGuard, TelemetryFairing, init_tracing, shutdown_telemetry};
use thiserror::Error;
use tracing::{error, info, warn};

pub static TELEMETRY_GUARD: Lazy<Mutex<Option<OtelGuard>>> = Lazy::new(|| Mutex::new(None));

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Figment(rocket::figment::Error),
    #[error("{0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Application error: {0}")]
    App(#[from] AppError),
}

impl From<rocket::figment::Error> for Error {
    fn from(value: rocket::figment::Error) -> Self {
        Error::Figment(value)
    }
}

async fn connect(config: &AppConfig) -> Result<SqlitePool, Error> {
    let options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    Ok(SqlitePoolOptions::new().connect_with(options).await?)
}

async fn prepare_database(pool: &SqlitePool, config: &AppConfig) -> Result<(), Error> {
    info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(AppError::from)?;
    info!("Migrations completed successfully");

    if let Some((username, email, password)) = config.bootstrap_admin() {
        ensure_admin(pool, username, email, password).await?;
    }

    Ok(())
}

fn spawn_session_cleanup(pool: SqlitePool, interval_secs: u64) {
    tokio::spawn(async move {
        tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;

        loop {
            match clean_expired_sessions(&pool).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Cleaned up {} expired sessions", count);
                    }
                }
                Err(e) => {
                    error!("Failed to clean expired sessions: {}", e);
                }
            }

            tokio::time::sleep(tokio::time::Duration::from_secs(interval_secs)).await;
        }
    });
}

async fn startup() -> Result<(SqlitePool, AppConfig), Error> {
    let env_files = env::load_environment();

    let guard = init_tracing();
    if let Ok(mut slot) = TELEMETRY_GUARD.lock() {
        *slot = guard;
    }

    match env_files {
        Ok(files) => {
            for file in files {
                match file {
                    EnvFile::Loaded(path) => info!("Loaded environment from: {}", path),
                    EnvFile::Missing(path) => warn!("Environment file {} not found, skipping", path),
                }
            }
        }
        Err(e) => error!("Failed to load environment files: {}", e),
    }

    let config = AppConfig::from_figment(&rocket::Config::figment())?;
    let pool = connect(&config).await?;
    prepare_database(&pool, &config).await?;

    Ok((pool, config))
}

#[launch]
async fn rocket() -> _ {
    let (pool, config) = match startup().await {
        Ok(ready) => ready,
        Err(e) => {
            error!("Startup failed: {}", e);
            panic!("Startup failed: {}", e);
        }
    };

    spawn_session_cleanup(pool.clone(), config.session_cleanup_interval_secs);

    init_rocket(pool, config).await
}

pub async fn init_rocket(pool: SqlitePool, config: AppConfig) -> Rocket<Build> {
    info!("Starting training portal");

    rocket::build()
        .manage(pool)
        .manage(config)
        .mount(
            "/api",
            routes![
                health,
                api_signup,
                api_register,
                api_registration_courses,
                api_login,
                api_logout,
                api_me,
                api_update_profile,
                api_change_password,
                api_lesson_types,
                api_list_courses,
                api_get_course,
                api_request_enrollment,
                api_course_access,
                api_list_lessons,
                api_get_lesson,
                api_complete_lesson,
                api_course_progress,
                api_my_enrollments,
            ],
        )
        .mount(
            "/api/admin",
            routes![
                api_admin_list_accounts,
                api_admin_pending_accounts,
                api_admin_update_account,
                api_admin_approve_account,
                api_admin_reject_account,
                api_admin_toggle_account,
                api_admin_deactivate_account,
                api_admin_bulk_approve_accounts,
                api_admin_list_enrollments,
                api_admin_pending_enrollments,
                api_admin_course_enrollments,
                api_admin_approve_enrollment,
                api_admin_reject_enrollment,
                api_admin_bulk_approve_enrollments,
                api_admin_list_courses,
                api_admin_create_course,
                api_admin_update_course,
                api_admin_delete_course,
                api_admin_create_lesson,
                api_admin_update_lesson,
                api_admin_delete_lesson,
                api_admin_duplicate_lesson,
                api_admin_reorder_lessons,
                api_admin_statistics,
            ],
        )
        .register(
            "/api",
            catchers![
                unauthorized_api,
                forbidden_api,
                not_found_api,
                unprocessable_api
            ],
        )
        .attach(TelemetryFairing)
        .attach(AdHoc::on_shutdown("Telemetry shutdown", |_| {
            Box::pin(async { shutdown_telemetry() })
        }))
}
