use chrono::Utc;
use serde::Serialize;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{DbLessonProgress, LessonProgress};

use super::get_account;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProgressOutcome {
    Tracked { progress: LessonProgress },
    NotTracked,
}

impl ProgressOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            ProgressOutcome::Tracked { .. } => "Module marked as completed.",
            ProgressOutcome::NotTracked => "Admin access - progress not tracked.",
        }
    }
}

/// Records a completed lesson. Admin accounts are never tracked. The stored
/// `time_spent` is replaced by the latest report, not summed.
///
/// Enrollment is not checked here; routes call the access decision first.
#[instrument(skip(pool))]
pub async fn mark_complete(
    pool: &Pool<Sqlite>,
    account_id: i64,
    lesson_id: i64,
    time_spent: i64,
) -> Result<ProgressOutcome, AppError> {
    let account = get_account(pool, account_id).await?;
    if account.role.is_privileged() {
        info!("Skipping progress tracking for admin account");
        return Ok(ProgressOutcome::NotTracked);
    }

    let lesson = sqlx::query_scalar::<_, i64>("SELECT id FROM lessons WHERE id = ?")
        .bind(lesson_id)
        .fetch_optional(pool)
        .await?;
    if lesson.is_none() {
        return Err(AppError::NotFound("Lesson not found.".to_string()));
    }

    info!("Marking lesson complete");
    sqlx::query(
        "INSERT INTO user_progress (user_id, lesson_id, completed, completed_at, time_spent)
         VALUES (?, ?, TRUE, ?, ?)
         ON CONFLICT (user_id, lesson_id) DO UPDATE SET
             completed = TRUE,
             completed_at = excluded.completed_at,
             time_spent = excluded.time_spent",
    )
    .bind(account_id)
    .bind(lesson_id)
    .bind(Utc::now().naive_utc())
    .bind(time_spent.max(0))
    .execute(pool)
    .await?;

    let progress = find_progress(pool, account_id, lesson_id)
        .await?
        .ok_or_else(|| AppError::Internal("Progress row missing after upsert".to_string()))?;

    Ok(ProgressOutcome::Tracked { progress })
}

#[instrument(skip(pool))]
pub async fn find_progress(
    pool: &Pool<Sqlite>,
    account_id: i64,
    lesson_id: i64,
) -> Result<Option<LessonProgress>, AppError> {
    let row = sqlx::query_as::<_, DbLessonProgress>(
        "SELECT l.id AS lesson_id, l.title, l.lesson_order,
                up.completed, up.completed_at, up.time_spent
         FROM user_progress up
         JOIN lessons l ON up.lesson_id = l.id
         WHERE up.user_id = ? AND up.lesson_id = ?",
    )
    .bind(account_id)
    .bind(lesson_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(LessonProgress::from))
}

/// Every lesson of the course in order, with the account's completion state.
#[instrument(skip(pool))]
pub async fn lesson_progress(
    pool: &Pool<Sqlite>,
    account_id: i64,
    course_id: i64,
) -> Result<Vec<LessonProgress>, AppError> {
    info!("Fetching lesson progress for course");
    let rows = sqlx::query_as::<_, DbLessonProgress>(
        "SELECT l.id AS lesson_id, l.title, l.lesson_order,
                up.completed, up.completed_at, up.time_spent
         FROM lessons l
         LEFT JOIN user_progress up ON l.id = up.lesson_id AND up.user_id = ?
         WHERE l.course_id = ?
         ORDER BY l.lesson_order ASC, l.id ASC",
    )
    .bind(account_id)
    .bind(course_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(LessonProgress::from).collect())
}
