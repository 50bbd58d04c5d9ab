use rocket::State;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};

use crate::auth::{Permission, User};
use crate::db::{
    account_statistics, approve_account, approve_enrollment, bulk_approve_accounts,
    bulk_approve_enrollments, course_statistics, create_course, create_lesson, deactivate_account,
    delete_course, delete_lesson, duplicate_lesson, get_account, get_course, list_accounts,
    list_categories, list_course_enrollments, list_courses, list_enrollments,
    list_pending_accounts, list_pending_enrollments, reject_account, reject_enrollment,
    reorder_lessons, toggle_account_status, update_account, update_course, update_lesson,
};
use crate::error::AppError;
use crate::models::{
    Account, AccountStatistics, ApprovalStatus, BulkOutcome, Course, CourseStatistics,
    Enrollment, Lesson,
};
use crate::requests::{
    AccountUpdate, BulkApproveRequest, CourseRequest, LessonRequest, ReorderRequest,
};
use crate::validation::JsonValidateExt;

use super::{ApiResponse, ApiResult, respond};

#[get("/accounts")]
pub async fn api_admin_list_accounts(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Vec<Account>> {
    user.require_permission(Permission::ManageAccounts)?;

    let accounts = list_accounts(db).await?;
    respond("Accounts", accounts)
}

#[get("/accounts/pending")]
pub async fn api_admin_pending_accounts(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Vec<Account>> {
    user.require_permission(Permission::ApproveAccounts)?;

    let accounts = list_pending_accounts(db).await?;
    respond("Accounts pending approval", accounts)
}

#[put("/accounts/<account_id>", format = "json", data = "<data>")]
pub async fn api_admin_update_account(
    user: User,
    account_id: i64,
    data: Json<AccountUpdate>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Account> {
    user.require_permission(Permission::ManageAccounts)?;
    let data = data.validate_custom()?;

    update_account(db, account_id, &data).await?;
    let account = get_account(db, account_id).await?;

    respond("User updated successfully.", account)
}

#[post("/accounts/<account_id>/approve")]
pub async fn api_admin_approve_account(
    user: User,
    account_id: i64,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Account> {
    user.require_permission(Permission::ApproveAccounts)?;

    let account = approve_account(db, account_id, user.id).await?;
    respond(
        format!("User \"{}\" approved successfully!", account.full_name),
        account,
    )
}

#[post("/accounts/<account_id>/reject")]
pub async fn api_admin_reject_account(
    user: User,
    account_id: i64,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Account> {
    user.require_permission(Permission::ApproveAccounts)?;

    let account = reject_account(db, account_id, user.id).await?;
    respond(
        format!("User \"{}\" registration rejected.", account.full_name),
        account,
    )
}

#[post("/accounts/<account_id>/toggle")]
pub async fn api_admin_toggle_account(
    user: User,
    account_id: i64,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Account> {
    user.require_permission(Permission::ManageAccounts)?;
    if account_id == user.id {
        return Err(AppError::Validation(
            "You cannot modify your own account status.".to_string(),
        )
        .into());
    }

    let active = toggle_account_status(db, account_id).await?;
    let account = get_account(db, account_id).await?;
    let status_text = if active { "activated" } else { "deactivated" };

    respond(
        format!("User \"{}\" has been {}.", account.full_name, status_text),
        account,
    )
}

#[post("/accounts/<account_id>/deactivate")]
pub async fn api_admin_deactivate_account(
    user: User,
    account_id: i64,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Account> {
    user.require_permission(Permission::ManageAccounts)?;
    if account_id == user.id {
        return Err(
            AppError::Validation("You cannot delete your own account.".to_string()).into(),
        );
    }

    let account = deactivate_account(db, account_id).await?;
    respond(
        format!(
            "User \"{}\" has been deactivated successfully.",
            account.full_name
        ),
        account,
    )
}

#[post("/accounts/bulk-approve", format = "json", data = "<data>")]
pub async fn api_admin_bulk_approve_accounts(
    user: User,
    data: Json<BulkApproveRequest>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<BulkOutcome> {
    user.require_permission(Permission::ApproveAccounts)?;

    let outcome = bulk_approve_accounts(db, &data.ids, user.id).await?;
    respond(outcome.summary("user registration"), outcome)
}

#[get("/enrollments?<status>")]
pub async fn api_admin_list_enrollments(
    user: User,
    status: Option<&str>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Vec<Enrollment>> {
    user.require_permission(Permission::ApproveEnrollments)?;

    let status = match status.filter(|s| !s.is_empty() && *s != "all") {
        Some(raw) => Some(raw.parse::<ApprovalStatus>().map_err(|_| {
            AppError::Validation(format!("Unknown enrollment status: {}", raw))
        })?),
        None => None,
    };

    let enrollments = list_enrollments(db, status).await?;
    respond("Enrollments", enrollments)
}

#[get("/enrollments/pending")]
pub async fn api_admin_pending_enrollments(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Vec<Enrollment>> {
    user.require_permission(Permission::ApproveEnrollments)?;

    let enrollments = list_pending_enrollments(db).await?;
    respond("Enrollments pending approval", enrollments)
}

#[get("/courses/<course_id>/enrollments")]
pub async fn api_admin_course_enrollments(
    user: User,
    course_id: i64,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Vec<Enrollment>> {
    user.require_permission(Permission::ApproveEnrollments)?;

    let course = get_course(db, course_id).await?;
    let enrollments = list_course_enrollments(db, course_id).await?;
    respond(format!("Enrollments for \"{}\"", course.title), enrollments)
}

#[post("/enrollments/<enrollment_id>/approve")]
pub async fn api_admin_approve_enrollment(
    user: User,
    enrollment_id: i64,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Enrollment> {
    user.require_permission(Permission::ApproveEnrollments)?;

    let enrollment = approve_enrollment(db, enrollment_id, user.id).await?;
    respond(
        format!(
            "Enrollment approved for {} in \"{}\".",
            enrollment.full_name, enrollment.course_title
        ),
        enrollment,
    )
}

#[post("/enrollments/<enrollment_id>/reject")]
pub async fn api_admin_reject_enrollment(
    user: User,
    enrollment_id: i64,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Enrollment> {
    user.require_permission(Permission::ApproveEnrollments)?;

    let enrollment = reject_enrollment(db, enrollment_id, user.id).await?;
    respond(
        format!(
            "Enrollment rejected for {} in \"{}\".",
            enrollment.full_name, enrollment.course_title
        ),
        enrollment,
    )
}

#[post("/enrollments/bulk-approve", format = "json", data = "<data>")]
pub async fn api_admin_bulk_approve_enrollments(
    user: User,
    data: Json<BulkApproveRequest>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<BulkOutcome> {
    user.require_permission(Permission::ApproveEnrollments)?;

    let outcome = bulk_approve_enrollments(db, &data.ids, user.id).await?;
    respond(outcome.summary("enrollment"), outcome)
}

#[derive(Serialize, Deserialize, Debug)]
pub struct AdminCourseList {
    pub courses: Vec<Course>,
    pub categories: Vec<String>,
}

#[get("/courses")]
pub async fn api_admin_list_courses(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<AdminCourseList> {
    user.require_permission(Permission::ManageCourses)?;

    let courses = list_courses(db, true).await?;
    let categories = list_categories(db).await?;
    respond("Courses", AdminCourseList { courses, categories })
}

#[post("/courses", format = "json", data = "<data>")]
pub async fn api_admin_create_course(
    user: User,
    data: Json<CourseRequest>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Course> {
    user.require_permission(Permission::ManageCourses)?;
    let data = data.validate_custom()?;

    let course = create_course(db, &data, user.id).await?;
    respond(
        format!("Course \"{}\" created successfully.", course.title),
        course,
    )
}

#[put("/courses/<course_id>", format = "json", data = "<data>")]
pub async fn api_admin_update_course(
    user: User,
    course_id: i64,
    data: Json<CourseRequest>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Course> {
    user.require_permission(Permission::ManageCourses)?;
    let data = data.validate_custom()?;

    let course = update_course(db, course_id, &data).await?;
    respond("Course updated successfully.", course)
}

#[delete("/courses/<course_id>")]
pub async fn api_admin_delete_course(
    user: User,
    course_id: i64,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<()> {
    user.require_permission(Permission::ManageCourses)?;

    let title = delete_course(db, course_id).await?;
    Ok(Json(ApiResponse::done(format!(
        "Course \"{}\" and all related data deleted successfully.",
        title
    ))))
}

#[post("/courses/<course_id>/lessons", format = "json", data = "<data>")]
pub async fn api_admin_create_lesson(
    user: User,
    course_id: i64,
    data: Json<LessonRequest>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Lesson> {
    user.require_permission(Permission::ManageLessons)?;
    let data = data.validate_custom()?;

    let lesson = create_lesson(db, course_id, &data).await?;
    respond(
        format!("Module \"{}\" created successfully.", lesson.title),
        lesson,
    )
}

#[put("/lessons/<lesson_id>", format = "json", data = "<data>")]
pub async fn api_admin_update_lesson(
    user: User,
    lesson_id: i64,
    data: Json<LessonRequest>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Lesson> {
    user.require_permission(Permission::ManageLessons)?;
    let data = data.validate_custom()?;

    let lesson = update_lesson(db, lesson_id, &data).await?;
    respond("Module updated successfully.", lesson)
}

#[delete("/lessons/<lesson_id>")]
pub async fn api_admin_delete_lesson(
    user: User,
    lesson_id: i64,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<()> {
    user.require_permission(Permission::ManageLessons)?;

    let title = delete_lesson(db, lesson_id).await?;
    Ok(Json(ApiResponse::done(format!(
        "Module \"{}\" deleted successfully.",
        title
    ))))
}

#[post("/lessons/<lesson_id>/duplicate")]
pub async fn api_admin_duplicate_lesson(
    user: User,
    lesson_id: i64,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Lesson> {
    user.require_permission(Permission::ManageLessons)?;

    let lesson = duplicate_lesson(db, lesson_id).await?;
    respond("Module duplicated successfully.", lesson)
}

#[post("/courses/<course_id>/lessons/reorder", format = "json", data = "<data>")]
pub async fn api_admin_reorder_lessons(
    user: User,
    course_id: i64,
    data: Json<ReorderRequest>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Vec<Lesson>> {
    user.require_permission(Permission::ManageLessons)?;

    let lessons = reorder_lessons(db, course_id, &data.lesson_ids).await?;
    respond("Modules reordered successfully.", lessons)
}

#[derive(Serialize, Deserialize, Debug)]
pub struct PortalStatistics {
    pub accounts: AccountStatistics,
    pub courses: CourseStatistics,
}

#[get("/statistics")]
pub async fn api_admin_statistics(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<PortalStatistics> {
    user.require_permission(Permission::ViewStatistics)?;

    let accounts = account_statistics(db).await?;
    let courses = course_statistics(db).await?;
    respond("Statistics", PortalStatistics { accounts, courses })
}
