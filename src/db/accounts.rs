use chrono::Utc;
use sqlx::{Pool, Sqlite, SqliteConnection};
use tracing::{info, instrument, warn};

use crate::auth::Role;
use crate::error::AppError;
use crate::models::{Account, AccountStatistics, ApprovalStatus, DbAccount};
use crate::requests::{AccountUpdate, ProfileUpdate, RegistrationRequest, SignupRequest};
use crate::validation::{MIN_PASSWORD_LEN, profile_violations, registration_violations};

#[cfg(not(test))]
const HASH_COST: u32 = bcrypt::DEFAULT_COST;
#[cfg(test)]
const HASH_COST: u32 = 4;

const ACCOUNT_COLUMNS: &str = "id, username, email, full_name, role, department, phone, bio, \
     is_active, approval_status, approved_by, approved_at, last_login, created_at";

pub fn hash_password(password: &str) -> Result<String, AppError> {
    Ok(bcrypt::hash(password, HASH_COST)?)
}

#[instrument(skip(pool))]
pub async fn get_account(pool: &Pool<Sqlite>, id: i64) -> Result<Account, AppError> {
    info!("Fetching account by ID");
    let row = sqlx::query_as::<_, DbAccount>(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM users WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(account) => Ok(Account::from(account)),
        None => Err(AppError::NotFound("User not found.".to_string())),
    }
}

#[instrument(skip(pool))]
pub async fn find_account_by_email(
    pool: &Pool<Sqlite>,
    email: &str,
) -> Result<Option<Account>, AppError> {
    info!("Finding account by email");
    let row = sqlx::query_as::<_, DbAccount>(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM users WHERE email = ?"
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Account::from))
}

/// All accounts with the number of courses each is approved for.
#[instrument(skip(pool))]
pub async fn list_accounts(pool: &Pool<Sqlite>) -> Result<Vec<Account>, AppError> {
    info!("Listing accounts");
    let rows = sqlx::query_as::<_, DbAccount>(
        "SELECT u.id, u.username, u.email, u.full_name, u.role, u.department, u.phone, u.bio,
                u.is_active, u.approval_status, u.approved_by, u.approved_at, u.last_login,
                u.created_at, COUNT(e.id) AS enrolled_courses
         FROM users u
         LEFT JOIN enrollments e ON u.id = e.user_id AND e.approval_status = 'approved'
         GROUP BY u.id
         ORDER BY u.created_at DESC, u.id DESC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Account::from).collect())
}

#[instrument(skip(pool))]
pub async fn list_pending_accounts(pool: &Pool<Sqlite>) -> Result<Vec<Account>, AppError> {
    info!("Listing accounts pending approval");
    let rows = sqlx::query_as::<_, DbAccount>(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM users
         WHERE approval_status = 'pending' AND role != 'admin'
         ORDER BY created_at ASC, id ASC"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Account::from).collect())
}

#[derive(sqlx::FromRow)]
struct IdentityRow {
    username: String,
    email: String,
}

/// Reports which identity field, if any, is already taken by another account.
async fn identity_conflict(
    conn: &mut SqliteConnection,
    username: &str,
    email: &str,
    exclude_id: Option<i64>,
) -> Result<Option<&'static str>, AppError> {
    let existing = sqlx::query_as::<_, IdentityRow>(
        "SELECT username, email FROM users
         WHERE (username = ? OR email = ?) AND id != ?
         LIMIT 1",
    )
    .bind(username)
    .bind(email)
    .bind(exclude_id.unwrap_or(-1))
    .fetch_optional(&mut *conn)
    .await?;

    Ok(existing.map(|row| {
        if row.username == username {
            "Username already exists"
        } else if row.email == email {
            "Email address already exists"
        } else {
            "Email or username already exists."
        }
    }))
}

/// Simple public signup. Uniqueness is the only rule enforced here; field
/// shapes are validated by the request type.
#[instrument(skip_all, fields(username = %data.username))]
pub async fn signup(
    pool: &Pool<Sqlite>,
    data: &SignupRequest,
    status: ApprovalStatus,
) -> Result<i64, AppError> {
    info!("Creating account from public signup");
    let mut conn = pool.acquire().await?;

    if identity_conflict(&mut conn, &data.username, &data.email, None)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(
            "Email or username already exists.".to_string(),
        ));
    }

    let password_hash = hash_password(&data.password)?;

    let res = sqlx::query(
        "INSERT INTO users (username, email, full_name, password_hash, department, role, approval_status)
         VALUES (?, ?, ?, ?, ?, 'teacher', ?)",
    )
    .bind(&data.username)
    .bind(&data.email)
    .bind(&data.full_name)
    .bind(password_hash)
    .bind(&data.department)
    .bind(status.as_str())
    .execute(&mut *conn)
    .await
    .map_err(|e| AppError::from(e).on_unique_violation("Email or username already exists."))?;

    Ok(res.last_insert_rowid())
}

/// Comprehensive registration: validate every field, check identity
/// uniqueness, then create the account and the optional preferred-course
/// enrollment in one transaction.
#[instrument(skip_all, fields(username = %data.username))]
pub async fn register(
    pool: &Pool<Sqlite>,
    data: &RegistrationRequest,
    status: ApprovalStatus,
) -> Result<i64, AppError> {
    info!("Processing comprehensive registration");

    let violations = registration_violations(data);
    if !violations.is_empty() {
        return Err(AppError::Validation(violations.join("; ")));
    }

    let mut tx = pool.begin().await?;

    if let Some(conflict) = identity_conflict(&mut tx, &data.username, &data.email, None).await? {
        return Err(AppError::Conflict(conflict.to_string()));
    }

    if let Some(course_id) = data.preferred_course_id {
        let published = sqlx::query_scalar::<_, bool>(
            "SELECT is_published FROM courses WHERE id = ?",
        )
        .bind(course_id)
        .fetch_optional(&mut *tx)
        .await?;
        if published != Some(true) {
            return Err(AppError::NotFound(
                "Selected course is not available.".to_string(),
            ));
        }
    }

    let password_hash = hash_password(&data.password)?;

    let res = sqlx::query(
        "INSERT INTO users (
            username, email, full_name, password_hash, role, is_active, approval_status,
            first_name, last_name, date_of_birth, gender, phone_number, address, city,
            state_province, postal_code, country, nationality, id_number, passport_number,
            emergency_contact_name, emergency_contact_phone, emergency_contact_relationship,
            highest_education, institution_name, graduation_year, professional_experience,
            current_position, organization, years_of_experience, department,
            preferred_course_id, motivation, how_did_you_hear
        ) VALUES (?, ?, ?, ?, 'teacher', TRUE, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&data.username)
    .bind(&data.email)
    .bind(data.display_name())
    .bind(password_hash)
    .bind(status.as_str())
    .bind(&data.first_name)
    .bind(&data.last_name)
    .bind(&data.date_of_birth)
    .bind(&data.gender)
    .bind(&data.phone_number)
    .bind(&data.address)
    .bind(&data.city)
    .bind(&data.state_province)
    .bind(&data.postal_code)
    .bind(&data.country)
    .bind(&data.nationality)
    .bind(&data.id_number)
    .bind(&data.passport_number)
    .bind(&data.emergency_contact_name)
    .bind(&data.emergency_contact_phone)
    .bind(&data.emergency_contact_relationship)
    .bind(&data.highest_education)
    .bind(&data.institution_name)
    .bind(data.graduation_year)
    .bind(&data.professional_experience)
    .bind(&data.current_position)
    .bind(&data.organization)
    .bind(data.years_of_experience)
    .bind(&data.department)
    .bind(data.preferred_course_id)
    .bind(&data.motivation)
    .bind(&data.how_did_you_hear)
    .execute(&mut *tx)
    .await
    .map_err(|e| AppError::from(e).on_unique_violation("Email or username already exists."))?;

    let account_id = res.last_insert_rowid();

    if let Some(course_id) = data.preferred_course_id {
        sqlx::query(
            "INSERT INTO enrollments (user_id, course_id, approval_status, enrolled_at)
             VALUES (?, ?, 'pending', ?)",
        )
        .bind(account_id)
        .bind(course_id)
        .bind(Utc::now().naive_utc())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(account_id)
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    id: i64,
    password_hash: String,
}

/// Returns the active account matching the credentials. Unknown email,
/// wrong password and inactive account all give `None`.
#[instrument(skip_all, fields(email = %email))]
pub async fn authenticate(
    pool: &Pool<Sqlite>,
    email: &str,
    password: &str,
) -> Result<Option<Account>, AppError> {
    info!("Authenticating account");
    let row = sqlx::query_as::<_, CredentialRow>(
        "SELECT id, password_hash FROM users WHERE email = ? AND is_active = TRUE",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    if !bcrypt::verify(password, &row.password_hash).unwrap_or(false) {
        return Ok(None);
    }

    Ok(Some(get_account(pool, row.id).await?))
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub account: Account,
    pub message: String,
}

pub fn welcome_message(account: &Account) -> String {
    if account.role.is_privileged() {
        return format!("Welcome back, Administrator {}!", account.full_name);
    }
    match account.approval_status {
        ApprovalStatus::Pending => format!(
            "Welcome, {}! Your account is pending admin approval for full course access.",
            account.full_name
        ),
        ApprovalStatus::Rejected => format!(
            "Welcome, {}! Please contact administrator regarding your account status.",
            account.full_name
        ),
        ApprovalStatus::Approved => format!("Welcome back, {}!", account.full_name),
    }
}

/// Login is never blocked by approval status; only the welcome text differs.
#[instrument(skip_all, fields(email = %email))]
pub async fn login(
    pool: &Pool<Sqlite>,
    email: &str,
    password: &str,
) -> Result<Option<LoginOutcome>, AppError> {
    let Some(mut account) = authenticate(pool, email, password).await? else {
        warn!("Login rejected: invalid credentials");
        return Ok(None);
    };

    let now = Utc::now().naive_utc();
    sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
        .bind(now)
        .bind(account.id)
        .execute(pool)
        .await?;

    if account.role.is_privileged() && account.approval_status != ApprovalStatus::Approved {
        info!(account_id = account.id, "Self-approving admin account on login");
        account = crate::db::approve_account(pool, account.id, account.id).await?;
    }

    let message = welcome_message(&account);
    Ok(Some(LoginOutcome { account, message }))
}

#[instrument(skip_all, fields(account_id = account_id))]
pub async fn update_profile(
    pool: &Pool<Sqlite>,
    account_id: i64,
    data: &ProfileUpdate,
) -> Result<(), AppError> {
    info!("Updating account profile");

    let violations = profile_violations(data);
    if !violations.is_empty() {
        return Err(AppError::Validation(violations.join("; ")));
    }

    let res = sqlx::query(
        "UPDATE users SET
            first_name = COALESCE(?, first_name),
            last_name = COALESCE(?, last_name),
            full_name = COALESCE(?, full_name),
            phone_number = COALESCE(?, phone_number),
            address = COALESCE(?, address),
            city = COALESCE(?, city),
            state_province = COALESCE(?, state_province),
            postal_code = COALESCE(?, postal_code),
            country = COALESCE(?, country),
            nationality = COALESCE(?, nationality),
            emergency_contact_name = COALESCE(?, emergency_contact_name),
            emergency_contact_phone = COALESCE(?, emergency_contact_phone),
            emergency_contact_relationship = COALESCE(?, emergency_contact_relationship),
            highest_education = COALESCE(?, highest_education),
            institution_name = COALESCE(?, institution_name),
            graduation_year = COALESCE(?, graduation_year),
            professional_experience = COALESCE(?, professional_experience),
            current_position = COALESCE(?, current_position),
            organization = COALESCE(?, organization),
            years_of_experience = COALESCE(?, years_of_experience),
            department = COALESCE(?, department),
            bio = COALESCE(?, bio)
         WHERE id = ?",
    )
    .bind(&data.first_name)
    .bind(&data.last_name)
    .bind(&data.full_name)
    .bind(&data.phone_number)
    .bind(&data.address)
    .bind(&data.city)
    .bind(&data.state_province)
    .bind(&data.postal_code)
    .bind(&data.country)
    .bind(&data.nationality)
    .bind(&data.emergency_contact_name)
    .bind(&data.emergency_contact_phone)
    .bind(&data.emergency_contact_relationship)
    .bind(&data.highest_education)
    .bind(&data.institution_name)
    .bind(data.graduation_year)
    .bind(&data.professional_experience)
    .bind(&data.current_position)
    .bind(&data.organization)
    .bind(data.years_of_experience)
    .bind(&data.department)
    .bind(&data.bio)
    .bind(account_id)
    .execute(pool)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found.".to_string()));
    }

    Ok(())
}

/// Admin edit of an account's identity, role and status fields.
#[instrument(skip_all, fields(account_id = account_id))]
pub async fn update_account(
    pool: &Pool<Sqlite>,
    account_id: i64,
    data: &AccountUpdate,
) -> Result<(), AppError> {
    info!("Admin updating account");
    let mut tx = pool.begin().await?;

    let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE id = ?")
        .bind(account_id)
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Err(AppError::NotFound("User not found.".to_string()));
    }

    if identity_conflict(&mut tx, &data.username, &data.email, Some(account_id))
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(
            "Username or email already exists for another user.".to_string(),
        ));
    }

    sqlx::query(
        "UPDATE users
         SET username = ?, email = ?, full_name = ?, role = ?, department = ?,
             phone = ?, bio = ?, is_active = ?
         WHERE id = ?",
    )
    .bind(&data.username)
    .bind(&data.email)
    .bind(&data.full_name)
    .bind(data.role.as_str())
    .bind(&data.department)
    .bind(&data.phone)
    .bind(&data.bio)
    .bind(data.is_active)
    .bind(account_id)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        AppError::from(e).on_unique_violation("Username or email already exists for another user.")
    })?;

    if !data.is_active {
        revoke_account_access(&mut tx, account_id).await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Flips `is_active` and returns the new value. Turning an account off
/// cascades the same way as `deactivate_account`.
#[instrument(skip(pool))]
pub async fn toggle_account_status(pool: &Pool<Sqlite>, account_id: i64) -> Result<bool, AppError> {
    info!("Toggling account active flag");
    let mut tx = pool.begin().await?;

    let current = sqlx::query_scalar::<_, bool>("SELECT is_active FROM users WHERE id = ?")
        .bind(account_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".to_string()))?;

    let new_status = !current;
    sqlx::query("UPDATE users SET is_active = ? WHERE id = ?")
        .bind(new_status)
        .bind(account_id)
        .execute(&mut *tx)
        .await?;

    if !new_status {
        revoke_account_access(&mut tx, account_id).await?;
    }

    tx.commit().await?;
    Ok(new_status)
}

/// Accounts are never deleted. Deactivation also deactivates every
/// enrollment of the account and ends its sessions.
#[instrument(skip(pool))]
pub async fn deactivate_account(pool: &Pool<Sqlite>, account_id: i64) -> Result<Account, AppError> {
    info!("Deactivating account");
    let mut tx = pool.begin().await?;

    let res = sqlx::query("UPDATE users SET is_active = FALSE WHERE id = ?")
        .bind(account_id)
        .execute(&mut *tx)
        .await?;
    if res.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found.".to_string()));
    }

    revoke_account_access(&mut tx, account_id).await?;

    tx.commit().await?;
    get_account(pool, account_id).await
}

async fn revoke_account_access(conn: &mut SqliteConnection, account_id: i64) -> Result<(), AppError> {
    sqlx::query("UPDATE enrollments SET is_active = FALSE WHERE user_id = ?")
        .bind(account_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query("DELETE FROM user_sessions WHERE user_id = ?")
        .bind(account_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

#[instrument(skip_all, fields(account_id = account_id))]
pub async fn change_password(
    pool: &Pool<Sqlite>,
    account_id: i64,
    current_password: &str,
    new_password: &str,
) -> Result<(), AppError> {
    info!("Changing account password");
    if new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(
            "Password must be at least 8 characters long".to_string(),
        ));
    }

    let stored = sqlx::query_scalar::<_, String>("SELECT password_hash FROM users WHERE id = ?")
        .bind(account_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".to_string()))?;

    if !bcrypt::verify(current_password, &stored).unwrap_or(false) {
        return Err(AppError::Authentication(
            "Current password is incorrect".to_string(),
        ));
    }

    let hashed = hash_password(new_password)?;
    sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
        .bind(hashed)
        .bind(account_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn account_statistics(pool: &Pool<Sqlite>) -> Result<AccountStatistics, AppError> {
    info!("Collecting account statistics");
    let (total, active, pending, approved, rejected) =
        sqlx::query_as::<_, (i64, i64, i64, i64, i64)>(
            "SELECT COUNT(*),
                    COALESCE(SUM(is_active = TRUE), 0),
                    COALESCE(SUM(approval_status = 'pending'), 0),
                    COALESCE(SUM(approval_status = 'approved'), 0),
                    COALESCE(SUM(approval_status = 'rejected'), 0)
             FROM users",
        )
        .fetch_one(pool)
        .await?;

    Ok(AccountStatistics {
        total_accounts: total,
        active_accounts: active,
        pending_accounts: pending,
        approved_accounts: approved,
        rejected_accounts: rejected,
    })
}

/// Makes sure the bootstrap admin exists, is active and is approved.
#[instrument(skip_all, fields(email = %email))]
pub async fn ensure_admin(
    pool: &Pool<Sqlite>,
    username: &str,
    email: &str,
    password: &str,
) -> Result<i64, AppError> {
    if let Some(existing) = find_account_by_email(pool, email).await? {
        info!(account_id = existing.id, "Bootstrap admin already present");
        sqlx::query(
            "UPDATE users
             SET role = ?, is_active = TRUE, approval_status = 'approved',
                 approved_at = COALESCE(approved_at, ?), approved_by = COALESCE(approved_by, id)
             WHERE id = ?",
        )
        .bind(Role::Admin.as_str())
        .bind(Utc::now().naive_utc())
        .bind(existing.id)
        .execute(pool)
        .await?;
        return Ok(existing.id);
    }

    info!("Creating bootstrap admin account");
    let password_hash = hash_password(password)?;
    let res = sqlx::query(
        "INSERT INTO users (username, email, full_name, password_hash, role, is_active, approval_status, approved_at)
         VALUES (?, ?, 'System Administrator', ?, ?, TRUE, 'approved', ?)",
    )
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(Role::Admin.as_str())
    .bind(Utc::now().naive_utc())
    .execute(pool)
    .await?;

    let id = res.last_insert_rowid();
    sqlx::query("UPDATE users SET approved_by = ? WHERE id = ?")
        .bind(id)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(id)
}
