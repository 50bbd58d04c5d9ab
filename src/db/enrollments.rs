use chrono::Utc;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument, warn};

use crate::error::AppError;
use crate::models::{ApprovalStatus, DbEnrollment, Enrollment};

use super::get_account;

const ENROLLMENT_SELECT: &str = "SELECT e.id, e.user_id, e.course_id, e.approval_status, e.is_active,
            e.approved_by, e.approved_at, e.enrolled_at,
            u.full_name, u.email, c.title AS course_title,
            (SELECT COUNT(*) FROM user_progress up JOIN lessons l ON up.lesson_id = l.id
              WHERE up.user_id = e.user_id AND l.course_id = e.course_id AND up.completed = TRUE)
              AS completed_lessons,
            (SELECT COUNT(*) FROM lessons l WHERE l.course_id = e.course_id) AS total_lessons
     FROM enrollments e
     JOIN users u ON e.user_id = u.id
     JOIN courses c ON e.course_id = c.id";

const PENDING_MESSAGE: &str = "Your enrollment request is already pending approval.";

fn existing_enrollment_message(status: ApprovalStatus) -> &'static str {
    match status {
        ApprovalStatus::Pending => PENDING_MESSAGE,
        ApprovalStatus::Approved => "You are already enrolled in this course.",
        ApprovalStatus::Rejected => {
            "Your previous enrollment was rejected. Please contact administrator."
        }
    }
}

#[instrument(skip(pool))]
pub async fn get_enrollment(pool: &Pool<Sqlite>, enrollment_id: i64) -> Result<Enrollment, AppError> {
    let row = sqlx::query_as::<_, DbEnrollment>(&format!("{ENROLLMENT_SELECT} WHERE e.id = ?"))
        .bind(enrollment_id)
        .fetch_optional(pool)
        .await?;

    row.map(Enrollment::from)
        .ok_or_else(|| AppError::NotFound("Enrollment not found.".to_string()))
}

#[instrument(skip(pool))]
pub async fn find_enrollment(
    pool: &Pool<Sqlite>,
    account_id: i64,
    course_id: i64,
) -> Result<Option<Enrollment>, AppError> {
    let row = sqlx::query_as::<_, DbEnrollment>(&format!(
        "{ENROLLMENT_SELECT} WHERE e.user_id = ? AND e.course_id = ?"
    ))
    .bind(account_id)
    .bind(course_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Enrollment::from))
}

/// Creates a pending enrollment for the account. Admins are turned away
/// because they already see every course.
#[instrument(skip(pool))]
pub async fn request_enrollment(
    pool: &Pool<Sqlite>,
    account_id: i64,
    course_id: i64,
) -> Result<Enrollment, AppError> {
    info!("Processing enrollment request");
    let account = get_account(pool, account_id).await?;
    if account.role.is_privileged() {
        return Err(AppError::Validation(
            "Admin users have direct access to all course content and do not need to enroll."
                .to_string(),
        ));
    }

    let published = sqlx::query_scalar::<_, bool>("SELECT is_published FROM courses WHERE id = ?")
        .bind(course_id)
        .fetch_optional(pool)
        .await?;
    if published != Some(true) {
        return Err(AppError::NotFound("Course not found.".to_string()));
    }

    if let Some(existing) = find_enrollment(pool, account_id, course_id).await? {
        return Err(AppError::Conflict(
            existing_enrollment_message(existing.approval_status).to_string(),
        ));
    }

    let res = sqlx::query(
        "INSERT INTO enrollments (user_id, course_id, approval_status, enrolled_at)
         VALUES (?, ?, 'pending', ?)",
    )
    .bind(account_id)
    .bind(course_id)
    .bind(Utc::now().naive_utc())
    .execute(pool)
    .await
    .map_err(|e| {
        let err = AppError::from(e).on_unique_violation(PENDING_MESSAGE);
        if matches!(err, AppError::Conflict(_)) {
            warn!("Concurrent duplicate enrollment request");
        }
        err
    })?;

    get_enrollment(pool, res.last_insert_rowid()).await
}

/// Enrollments for one course, admins excluded, newest first.
#[instrument(skip(pool))]
pub async fn list_course_enrollments(
    pool: &Pool<Sqlite>,
    course_id: i64,
) -> Result<Vec<Enrollment>, AppError> {
    info!("Listing course enrollments");
    let rows = sqlx::query_as::<_, DbEnrollment>(&format!(
        "{ENROLLMENT_SELECT}
         WHERE e.course_id = ? AND u.role != 'admin'
         ORDER BY e.enrolled_at DESC, e.id DESC"
    ))
    .bind(course_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Enrollment::from).collect())
}

/// All non-admin enrollments, optionally narrowed to one status.
#[instrument(skip(pool))]
pub async fn list_enrollments(
    pool: &Pool<Sqlite>,
    status: Option<ApprovalStatus>,
) -> Result<Vec<Enrollment>, AppError> {
    info!("Listing enrollments");
    let rows = match status {
        Some(status) => {
            sqlx::query_as::<_, DbEnrollment>(&format!(
                "{ENROLLMENT_SELECT}
                 WHERE u.role != 'admin' AND e.approval_status = ?
                 ORDER BY e.enrolled_at DESC, e.id DESC"
            ))
            .bind(status.as_str())
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, DbEnrollment>(&format!(
                "{ENROLLMENT_SELECT}
                 WHERE u.role != 'admin'
                 ORDER BY e.enrolled_at DESC, e.id DESC"
            ))
            .fetch_all(pool)
            .await?
        }
    };

    Ok(rows.into_iter().map(Enrollment::from).collect())
}

pub async fn list_pending_enrollments(pool: &Pool<Sqlite>) -> Result<Vec<Enrollment>, AppError> {
    list_enrollments(pool, Some(ApprovalStatus::Pending)).await
}

#[instrument(skip(pool))]
pub async fn list_account_enrollments(
    pool: &Pool<Sqlite>,
    account_id: i64,
) -> Result<Vec<Enrollment>, AppError> {
    info!("Listing enrollments for account");
    let rows = sqlx::query_as::<_, DbEnrollment>(&format!(
        "{ENROLLMENT_SELECT} WHERE e.user_id = ? ORDER BY e.enrolled_at DESC, e.id DESC"
    ))
    .bind(account_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Enrollment::from).collect())
}
