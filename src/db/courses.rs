use chrono::Utc;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{CategoryCount, Course, CourseStatistics, DbCourse};
use crate::requests::CourseRequest;

const COURSE_SELECT: &str = "SELECT c.id, c.title, c.description, c.category, c.level,
            c.duration_hours, c.instructor_id, c.is_published, c.created_at,
            u.full_name AS instructor_name,
            (SELECT COUNT(*) FROM lessons l WHERE l.course_id = c.id) AS lesson_count,
            (SELECT COUNT(*) FROM enrollments e JOIN users eu ON e.user_id = eu.id
              WHERE e.course_id = c.id AND e.approval_status = 'approved' AND eu.role != 'admin')
              AS enrolled_count
     FROM courses c
     LEFT JOIN users u ON c.instructor_id = u.id";

#[instrument(skip_all, fields(title = %data.title))]
pub async fn create_course(
    pool: &Pool<Sqlite>,
    data: &CourseRequest,
    instructor_id: i64,
) -> Result<Course, AppError> {
    info!("Creating course");
    let res = sqlx::query(
        "INSERT INTO courses (title, description, category, level, duration_hours, instructor_id, is_published, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&data.title)
    .bind(&data.description)
    .bind(&data.category)
    .bind(&data.level)
    .bind(data.duration_hours)
    .bind(instructor_id)
    .bind(data.is_published)
    .bind(Utc::now().naive_utc())
    .execute(pool)
    .await?;

    get_course(pool, res.last_insert_rowid()).await
}

#[instrument(skip_all, fields(course_id = course_id))]
pub async fn update_course(
    pool: &Pool<Sqlite>,
    course_id: i64,
    data: &CourseRequest,
) -> Result<Course, AppError> {
    info!("Updating course");
    let res = sqlx::query(
        "UPDATE courses
         SET title = ?, description = ?, category = ?, level = ?, duration_hours = ?, is_published = ?
         WHERE id = ?",
    )
    .bind(&data.title)
    .bind(&data.description)
    .bind(&data.category)
    .bind(&data.level)
    .bind(data.duration_hours)
    .bind(data.is_published)
    .bind(course_id)
    .execute(pool)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound("Course not found.".to_string()));
    }

    get_course(pool, course_id).await
}

#[instrument(skip(pool))]
pub async fn get_course(pool: &Pool<Sqlite>, course_id: i64) -> Result<Course, AppError> {
    info!("Fetching course by ID");
    let row = sqlx::query_as::<_, DbCourse>(&format!("{COURSE_SELECT} WHERE c.id = ?"))
        .bind(course_id)
        .fetch_optional(pool)
        .await?;

    row.map(Course::from)
        .ok_or_else(|| AppError::NotFound("Course not found.".to_string()))
}

/// Newest first. Drafts are only included when asked for.
#[instrument(skip(pool))]
pub async fn list_courses(
    pool: &Pool<Sqlite>,
    include_unpublished: bool,
) -> Result<Vec<Course>, AppError> {
    info!("Listing courses");
    let filter = if include_unpublished {
        ""
    } else {
        " WHERE c.is_published = TRUE"
    };
    let rows = sqlx::query_as::<_, DbCourse>(&format!(
        "{COURSE_SELECT}{filter} ORDER BY c.created_at DESC, c.id DESC"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Course::from).collect())
}

/// Deletes the course together with its progress rows, lessons and
/// enrollments, in that order, as one unit.
#[instrument(skip(pool))]
pub async fn delete_course(pool: &Pool<Sqlite>, course_id: i64) -> Result<String, AppError> {
    info!("Deleting course and related data");
    let mut tx = pool.begin().await?;

    let title = sqlx::query_scalar::<_, String>("SELECT title FROM courses WHERE id = ?")
        .bind(course_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Course not found.".to_string()))?;

    sqlx::query(
        "DELETE FROM user_progress WHERE lesson_id IN (SELECT id FROM lessons WHERE course_id = ?)",
    )
    .bind(course_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM lessons WHERE course_id = ?")
        .bind(course_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM enrollments WHERE course_id = ?")
        .bind(course_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE users SET preferred_course_id = NULL WHERE preferred_course_id = ?")
        .bind(course_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM courses WHERE id = ?")
        .bind(course_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(title)
}

#[instrument(skip(pool))]
pub async fn list_categories(pool: &Pool<Sqlite>) -> Result<Vec<String>, AppError> {
    let rows = sqlx::query_scalar::<_, String>(
        "SELECT DISTINCT category FROM courses
         WHERE category IS NOT NULL AND category != ''
         ORDER BY category",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

async fn count(pool: &Pool<Sqlite>, sql: &str) -> Result<i64, AppError> {
    Ok(sqlx::query_scalar::<_, i64>(sql).fetch_one(pool).await?)
}

/// Enrollment figures leave out admin accounts.
#[instrument(skip(pool))]
pub async fn course_statistics(pool: &Pool<Sqlite>) -> Result<CourseStatistics, AppError> {
    info!("Collecting course statistics");

    let total_courses = count(pool, "SELECT COUNT(*) FROM courses").await?;
    let published_courses =
        count(pool, "SELECT COUNT(*) FROM courses WHERE is_published = TRUE").await?;
    let total_enrollments = count(
        pool,
        "SELECT COUNT(*) FROM enrollments e JOIN users u ON e.user_id = u.id
         WHERE u.role != 'admin'",
    )
    .await?;
    let approved_enrollments = count(
        pool,
        "SELECT COUNT(*) FROM enrollments e JOIN users u ON e.user_id = u.id
         WHERE e.approval_status = 'approved' AND u.role != 'admin'",
    )
    .await?;
    let pending_enrollments = count(
        pool,
        "SELECT COUNT(*) FROM enrollments e JOIN users u ON e.user_id = u.id
         WHERE e.approval_status = 'pending' AND u.role != 'admin'",
    )
    .await?;
    let total_lessons = count(pool, "SELECT COUNT(*) FROM lessons").await?;

    let categories = sqlx::query_as::<_, (String, i64)>(
        "SELECT category, COUNT(*) AS count FROM courses
         WHERE category IS NOT NULL
         GROUP BY category
         ORDER BY count DESC, category",
    )
    .fetch_all(pool)
    .await?;

    let levels = sqlx::query_as::<_, (String, i64)>(
        "SELECT level, COUNT(*) AS count FROM courses
         WHERE level IS NOT NULL
         GROUP BY level
         ORDER BY CASE level
             WHEN 'beginner' THEN 1
             WHEN 'intermediate' THEN 2
             WHEN 'advanced' THEN 3
             ELSE 4
         END, level",
    )
    .fetch_all(pool)
    .await?;

    let to_counts = |rows: Vec<(String, i64)>| {
        rows.into_iter()
            .map(|(name, count)| CategoryCount { name, count })
            .collect()
    };

    Ok(CourseStatistics {
        total_courses,
        published_courses,
        draft_courses: total_courses - published_courses,
        total_enrollments,
        approved_enrollments,
        pending_enrollments,
        total_lessons,
        categories: to_counts(categories),
        levels: to_counts(levels),
    })
}
