use rocket::State;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};

use crate::access::{check_course_access, require_course_access};
use crate::auth::{Permission, User};
use crate::db::{
    ProgressOutcome, find_enrollment, get_course, get_lesson, lesson_progress,
    list_account_enrollments, list_courses, list_lessons, mark_complete, request_enrollment,
};
use crate::error::AppError;
use crate::models::{Course, Enrollment, Lesson, LessonOutline, LessonProgress, LessonType};
use crate::requests::CompleteLessonRequest;
use crate::validation::JsonValidateExt;

use super::{ApiResponse, ApiResult, respond};

#[derive(Serialize, Deserialize, Debug)]
pub struct LessonTypeOption {
    pub value: String,
    pub label: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct CourseAccess {
    pub allowed: bool,
    pub reason: String,
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct CourseDetail {
    pub course: Course,
    pub lessons: Vec<LessonOutline>,
    pub enrollment: Option<Enrollment>,
    pub access: CourseAccess,
}

/// Courses a user may see: drafts are visible to privileged roles only.
async fn visible_course(db: &Pool<Sqlite>, user: &User, course_id: i64) -> Result<Course, AppError> {
    let course = get_course(db, course_id).await?;
    if !course.is_published && !user.is_privileged() {
        return Err(AppError::NotFound("Course not found.".to_string()));
    }
    Ok(course)
}

#[get("/lesson-types")]
pub fn api_lesson_types() -> Json<ApiResponse<Vec<LessonTypeOption>>> {
    let types = LessonType::ALL
        .iter()
        .map(|t| LessonTypeOption {
            value: t.as_str().to_string(),
            label: t.label().to_string(),
        })
        .collect();

    Json(ApiResponse::ok("Lesson types", types))
}

#[get("/courses")]
pub async fn api_list_courses(user: User, db: &State<Pool<Sqlite>>) -> ApiResult<Vec<Course>> {
    user.require_permission(Permission::ViewCatalog)?;

    let courses = list_courses(db, user.is_privileged()).await?;
    respond("Courses", courses)
}

/// Course page: only the lesson outline is listed; access tells the caller
/// whether the lessons themselves can be opened.
#[get("/courses/<course_id>")]
pub async fn api_get_course(
    user: User,
    course_id: i64,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<CourseDetail> {
    user.require_permission(Permission::ViewCatalog)?;

    let course = visible_course(db, &user, course_id).await?;
    let lessons = list_lessons(db, course_id)
        .await?
        .into_iter()
        .map(LessonOutline::from)
        .collect();
    let enrollment = find_enrollment(db, user.id, course_id).await?;
    let access = course_access_view(db, user.id, course_id).await?;

    respond(
        course.title.clone(),
        CourseDetail {
            course,
            lessons,
            enrollment,
            access,
        },
    )
}

#[post("/courses/<course_id>/enroll")]
pub async fn api_request_enrollment(
    user: User,
    course_id: i64,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Enrollment> {
    user.require_permission(Permission::RequestEnrollment)?;

    let enrollment = request_enrollment(db, user.id, course_id).await?;
    respond(
        "Enrollment request submitted successfully! Please wait for admin approval.",
        enrollment,
    )
}

async fn course_access_view(
    db: &Pool<Sqlite>,
    account_id: i64,
    course_id: i64,
) -> Result<CourseAccess, AppError> {
    Ok(match check_course_access(db, account_id, course_id).await? {
        Ok(grant) => CourseAccess {
            allowed: true,
            reason: grant.reason().to_string(),
            message: "Access granted".to_string(),
        },
        Err(denial) => CourseAccess {
            allowed: false,
            reason: denial.reason().to_string(),
            message: denial.message().to_string(),
        },
    })
}

#[get("/courses/<course_id>/access")]
pub async fn api_course_access(
    user: User,
    course_id: i64,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<CourseAccess> {
    user.require_permission(Permission::ViewCatalog)?;

    visible_course(db, &user, course_id).await?;
    let access = course_access_view(db, user.id, course_id).await?;
    respond(access.message.clone(), access)
}

#[get("/courses/<course_id>/lessons")]
pub async fn api_list_lessons(
    user: User,
    course_id: i64,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Vec<Lesson>> {
    user.require_permission(Permission::ViewLessons)?;

    visible_course(db, &user, course_id).await?;
    require_course_access(db, user.id, course_id).await?;

    let lessons = list_lessons(db, course_id).await?;
    respond("Course modules", lessons)
}

#[get("/lessons/<lesson_id>")]
pub async fn api_get_lesson(
    user: User,
    lesson_id: i64,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Lesson> {
    user.require_permission(Permission::ViewLessons)?;

    let lesson = get_lesson(db, lesson_id).await?;
    visible_course(db, &user, lesson.course_id).await?;
    require_course_access(db, user.id, lesson.course_id).await?;

    respond(lesson.title.clone(), lesson)
}

#[derive(Serialize, Deserialize, Debug)]
pub struct CompletionResult {
    pub tracked: bool,
    pub progress: Option<LessonProgress>,
}

#[post("/lessons/<lesson_id>/complete", format = "json", data = "<data>")]
pub async fn api_complete_lesson(
    user: User,
    lesson_id: i64,
    data: Json<CompleteLessonRequest>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<CompletionResult> {
    user.require_permission(Permission::TrackProgress)?;
    let data = data.validate_custom()?;

    let lesson = get_lesson(db, lesson_id).await?;
    visible_course(db, &user, lesson.course_id).await?;
    require_course_access(db, user.id, lesson.course_id).await?;

    let outcome = mark_complete(db, user.id, lesson_id, data.time_spent).await?;
    let message = outcome.message();
    let result = match outcome {
        ProgressOutcome::Tracked { progress } => CompletionResult {
            tracked: true,
            progress: Some(progress),
        },
        ProgressOutcome::NotTracked => CompletionResult {
            tracked: false,
            progress: None,
        },
    };

    respond(message, result)
}

#[get("/courses/<course_id>/progress")]
pub async fn api_course_progress(
    user: User,
    course_id: i64,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Vec<LessonProgress>> {
    user.require_permission(Permission::TrackProgress)?;

    visible_course(db, &user, course_id).await?;
    require_course_access(db, user.id, course_id).await?;

    let progress = lesson_progress(db, user.id, course_id).await?;
    respond("Course progress", progress)
}

#[get("/enrollments")]
pub async fn api_my_enrollments(user: User, db: &State<Pool<Sqlite>>) -> ApiResult<Vec<Enrollment>> {
    let enrollments = list_account_enrollments(db, user.id).await?;
    respond("Your enrollments", enrollments)
}
