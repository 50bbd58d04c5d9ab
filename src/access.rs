//! Decides whether an account may view a course's lessons.
//!
//! Once an enrollment row exists, the account gate is evaluated before the
//! enrollment's own status, so an approved enrollment under an unapproved
//! account is reported as an account problem.

use serde::Serialize;
use sqlx::{Pool, Sqlite};
use std::fmt;
use tracing::{info, instrument, warn};

use crate::auth::Role;
use crate::error::AppError;
use crate::models::ApprovalStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessGrant {
    Admin,
    Enrolled,
}

impl AccessGrant {
    pub fn reason(&self) -> &'static str {
        match self {
            AccessGrant::Admin => "admin access",
            AccessGrant::Enrolled => "access granted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessDenial {
    AccountNotFound,
    EnrollmentRequired,
    AccountPending,
    EnrollmentPending,
}

impl AccessDenial {
    pub fn reason(&self) -> &'static str {
        match self {
            AccessDenial::AccountNotFound => "account not found",
            AccessDenial::EnrollmentRequired => "must request enrollment first",
            AccessDenial::AccountPending => "account pending approval",
            AccessDenial::EnrollmentPending => "enrollment pending approval",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            AccessDenial::AccountNotFound => "User not found",
            AccessDenial::EnrollmentRequired => {
                "Please request enrollment in this course first to access the modules"
            }
            AccessDenial::AccountPending => {
                "Your account is pending admin approval. You'll gain access once approved"
            }
            AccessDenial::EnrollmentPending => {
                "Your enrollment request is being reviewed by the administrator. You'll gain access to course modules once approved"
            }
        }
    }
}

impl fmt::Display for AccessDenial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

pub type AccessDecision = Result<AccessGrant, AccessDenial>;

/// The two account facts the decision reads.
#[derive(Debug, Clone, Copy)]
pub struct AccountGate {
    pub role: Role,
    pub approval_status: ApprovalStatus,
}

pub fn decide(account: Option<AccountGate>, enrollment: Option<ApprovalStatus>) -> AccessDecision {
    let account = account.ok_or(AccessDenial::AccountNotFound)?;

    if account.role.is_privileged() {
        return Ok(AccessGrant::Admin);
    }

    let enrollment = enrollment.ok_or(AccessDenial::EnrollmentRequired)?;

    if account.approval_status != ApprovalStatus::Approved {
        return Err(AccessDenial::AccountPending);
    }

    if enrollment != ApprovalStatus::Approved {
        return Err(AccessDenial::EnrollmentPending);
    }

    Ok(AccessGrant::Enrolled)
}

#[derive(sqlx::FromRow)]
struct GateRow {
    role: Option<String>,
    approval_status: Option<String>,
}

#[instrument(skip(pool))]
pub async fn check_course_access(
    pool: &Pool<Sqlite>,
    account_id: i64,
    course_id: i64,
) -> Result<AccessDecision, AppError> {
    info!("Checking course access");
    let account = sqlx::query_as::<_, GateRow>("SELECT role, approval_status FROM users WHERE id = ?")
        .bind(account_id)
        .fetch_optional(pool)
        .await?
        .map(|row| AccountGate {
            role: Role::from_db(row.role.as_deref()),
            approval_status: ApprovalStatus::from_db(row.approval_status.as_deref()),
        });

    let enrollment = match account {
        Some(gate) if !gate.role.is_privileged() => sqlx::query_scalar::<_, Option<String>>(
            "SELECT approval_status FROM enrollments WHERE user_id = ? AND course_id = ?",
        )
        .bind(account_id)
        .bind(course_id)
        .fetch_optional(pool)
        .await?
        .map(|status| ApprovalStatus::from_db(status.as_deref())),
        _ => None,
    };

    let decision = decide(account, enrollment);
    if let Err(denial) = &decision {
        warn!(reason = %denial, "Course access denied");
    }
    Ok(decision)
}

/// Like `check_course_access`, but a denial becomes `AppError::AccessDenied`.
pub async fn require_course_access(
    pool: &Pool<Sqlite>,
    account_id: i64,
    course_id: i64,
) -> Result<AccessGrant, AppError> {
    check_course_access(pool, account_id, course_id)
        .await?
        .map_err(AppError::AccessDenied)
}
