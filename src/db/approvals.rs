//! Admin review of accounts and enrollments.
//!
//! Single-item transitions are unconditional: approving a rejected item, or
//! re-approving an approved one, just rewrites the status and audit fields.
//! Bulk approval only moves items that are still pending.

use chrono::{NaiveDateTime, Utc};
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument, warn};

use crate::error::AppError;
use crate::models::{Account, ApprovalStatus, BulkOutcome, Enrollment, ItemStatus};

use super::{get_account, get_enrollment};

async fn set_account_status(
    pool: &Pool<Sqlite>,
    account_id: i64,
    admin_id: i64,
    status: ApprovalStatus,
) -> Result<Account, AppError> {
    let res = sqlx::query(
        "UPDATE users SET approval_status = ?, approved_by = ?, approved_at = ? WHERE id = ?",
    )
    .bind(status.as_str())
    .bind(admin_id)
    .bind(Utc::now().naive_utc())
    .bind(account_id)
    .execute(pool)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found.".to_string()));
    }

    get_account(pool, account_id).await
}

#[instrument(skip(pool))]
pub async fn approve_account(
    pool: &Pool<Sqlite>,
    account_id: i64,
    admin_id: i64,
) -> Result<Account, AppError> {
    info!("Approving account");
    set_account_status(pool, account_id, admin_id, ApprovalStatus::Approved).await
}

/// Rejection does not touch `is_active`; the account can still log in.
#[instrument(skip(pool))]
pub async fn reject_account(
    pool: &Pool<Sqlite>,
    account_id: i64,
    admin_id: i64,
) -> Result<Account, AppError> {
    info!("Rejecting account");
    set_account_status(pool, account_id, admin_id, ApprovalStatus::Rejected).await
}

#[instrument(skip(pool))]
pub async fn bulk_approve_accounts(
    pool: &Pool<Sqlite>,
    account_ids: &[i64],
    admin_id: i64,
) -> Result<BulkOutcome, AppError> {
    if account_ids.is_empty() {
        return Err(AppError::Validation("No users selected.".to_string()));
    }
    info!(count = account_ids.len(), "Bulk approving accounts");

    let now = Utc::now().naive_utc();
    let mut outcome = BulkOutcome::default();

    for &id in account_ids {
        match approve_pending_account(pool, id, admin_id, now).await {
            Ok((status, reason)) => outcome.record(id, status, reason),
            Err(err) => {
                warn!(account_id = id, error = %err, "Bulk account approval item failed");
                outcome.record(id, ItemStatus::Failed, "store error");
            }
        }
    }

    Ok(outcome)
}

async fn approve_pending_account(
    pool: &Pool<Sqlite>,
    account_id: i64,
    admin_id: i64,
    now: NaiveDateTime,
) -> Result<(ItemStatus, &'static str), sqlx::Error> {
    let res = sqlx::query(
        "UPDATE users SET approval_status = 'approved', approved_by = ?, approved_at = ?
         WHERE id = ? AND approval_status = 'pending'",
    )
    .bind(admin_id)
    .bind(now)
    .bind(account_id)
    .execute(pool)
    .await?;

    if res.rows_affected() > 0 {
        return Ok((ItemStatus::Approved, "approved"));
    }

    let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE id = ?")
        .bind(account_id)
        .fetch_optional(pool)
        .await?;

    Ok(match exists {
        Some(_) => (ItemStatus::Skipped, "not pending"),
        None => (ItemStatus::Failed, "not found"),
    })
}

async fn set_enrollment_status(
    pool: &Pool<Sqlite>,
    enrollment_id: i64,
    admin_id: i64,
    status: ApprovalStatus,
) -> Result<Enrollment, AppError> {
    let res = sqlx::query(
        "UPDATE enrollments SET approval_status = ?, approved_by = ?, approved_at = ? WHERE id = ?",
    )
    .bind(status.as_str())
    .bind(admin_id)
    .bind(Utc::now().naive_utc())
    .bind(enrollment_id)
    .execute(pool)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound("Enrollment not found.".to_string()));
    }

    get_enrollment(pool, enrollment_id).await
}

#[instrument(skip(pool))]
pub async fn approve_enrollment(
    pool: &Pool<Sqlite>,
    enrollment_id: i64,
    admin_id: i64,
) -> Result<Enrollment, AppError> {
    info!("Approving enrollment");
    set_enrollment_status(pool, enrollment_id, admin_id, ApprovalStatus::Approved).await
}

#[instrument(skip(pool))]
pub async fn reject_enrollment(
    pool: &Pool<Sqlite>,
    enrollment_id: i64,
    admin_id: i64,
) -> Result<Enrollment, AppError> {
    info!("Rejecting enrollment");
    set_enrollment_status(pool, enrollment_id, admin_id, ApprovalStatus::Rejected).await
}

/// Approves each pending enrollment in `enrollment_ids`. A failure on one
/// item never rolls back the others.
#[instrument(skip(pool))]
pub async fn bulk_approve_enrollments(
    pool: &Pool<Sqlite>,
    enrollment_ids: &[i64],
    admin_id: i64,
) -> Result<BulkOutcome, AppError> {
    if enrollment_ids.is_empty() {
        return Err(AppError::Validation("No enrollments selected.".to_string()));
    }
    info!(count = enrollment_ids.len(), "Bulk approving enrollments");

    let now = Utc::now().naive_utc();
    let mut outcome = BulkOutcome::default();

    for &id in enrollment_ids {
        let current = sqlx::query_scalar::<_, Option<String>>(
            "SELECT approval_status FROM enrollments WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await;

        let status = match current {
            Ok(Some(status)) => ApprovalStatus::from_db(status.as_deref()),
            Ok(None) => {
                outcome.record(id, ItemStatus::Failed, "not found");
                continue;
            }
            Err(err) => {
                warn!(enrollment_id = id, error = %err, "Bulk enrollment approval item failed");
                outcome.record(id, ItemStatus::Failed, "store error");
                continue;
            }
        };

        if status != ApprovalStatus::Pending {
            outcome.record(id, ItemStatus::Skipped, format!("already {}", status));
            continue;
        }

        let res = sqlx::query(
            "UPDATE enrollments SET approval_status = 'approved', approved_by = ?, approved_at = ?
             WHERE id = ? AND approval_status = 'pending'",
        )
        .bind(admin_id)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await;

        match res {
            Ok(done) if done.rows_affected() > 0 => {
                outcome.record(id, ItemStatus::Approved, "approved");
            }
            Ok(_) => outcome.record(id, ItemStatus::Skipped, "no longer pending"),
            Err(err) => {
                warn!(enrollment_id = id, error = %err, "Bulk enrollment approval item failed");
                outcome.record(id, ItemStatus::Failed, "store error");
            }
        }
    }

    Ok(outcome)
}
