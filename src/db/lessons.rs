//! Lessons and their dense 1..N ordering within a course.

use std::collections::HashSet;

use chrono::Utc;
use sqlx::{Pool, Sqlite, SqliteConnection};
use tracing::{info, instrument, warn};

use crate::error::AppError;
use crate::models::{DbLesson, Lesson};
use crate::requests::LessonRequest;

const LESSON_COLUMNS: &str = "id, course_id, title, content, lesson_type, duration_minutes, \
     lesson_order, learning_objectives, additional_resources, file_path, created_at";

async fn next_lesson_order(conn: &mut SqliteConnection, course_id: i64) -> Result<i64, AppError> {
    let max = sqlx::query_scalar::<_, Option<i64>>(
        "SELECT MAX(lesson_order) FROM lessons WHERE course_id = ?",
    )
    .bind(course_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(max.unwrap_or(0) + 1)
}

#[instrument(skip_all, fields(course_id = course_id, title = %data.title))]
pub async fn create_lesson(
    pool: &Pool<Sqlite>,
    course_id: i64,
    data: &LessonRequest,
) -> Result<Lesson, AppError> {
    info!("Creating lesson");
    let mut tx = pool.begin().await?;

    let course = sqlx::query_scalar::<_, i64>("SELECT id FROM courses WHERE id = ?")
        .bind(course_id)
        .fetch_optional(&mut *tx)
        .await?;
    if course.is_none() {
        return Err(AppError::NotFound("Course not found.".to_string()));
    }

    let order = next_lesson_order(&mut tx, course_id).await?;

    let res = sqlx::query(
        "INSERT INTO lessons (course_id, title, content, lesson_type, duration_minutes, lesson_order,
                              learning_objectives, additional_resources, file_path, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(course_id)
    .bind(&data.title)
    .bind(&data.content)
    .bind(data.lesson_type.as_str())
    .bind(data.duration_minutes)
    .bind(order)
    .bind(&data.learning_objectives)
    .bind(&data.additional_resources)
    .bind(&data.file_path)
    .bind(Utc::now().naive_utc())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    get_lesson(pool, res.last_insert_rowid()).await
}

/// Updates content fields. Order is only changed by `reorder_lessons`, and
/// an absent `file_path` keeps the current attachment.
#[instrument(skip_all, fields(lesson_id = lesson_id))]
pub async fn update_lesson(
    pool: &Pool<Sqlite>,
    lesson_id: i64,
    data: &LessonRequest,
) -> Result<Lesson, AppError> {
    info!("Updating lesson");
    let res = sqlx::query(
        "UPDATE lessons
         SET title = ?, content = ?, lesson_type = ?, duration_minutes = ?,
             learning_objectives = ?, additional_resources = ?,
             file_path = COALESCE(?, file_path)
         WHERE id = ?",
    )
    .bind(&data.title)
    .bind(&data.content)
    .bind(data.lesson_type.as_str())
    .bind(data.duration_minutes)
    .bind(&data.learning_objectives)
    .bind(&data.additional_resources)
    .bind(&data.file_path)
    .bind(lesson_id)
    .execute(pool)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound("Lesson not found.".to_string()));
    }

    get_lesson(pool, lesson_id).await
}

#[instrument(skip(pool))]
pub async fn get_lesson(pool: &Pool<Sqlite>, lesson_id: i64) -> Result<Lesson, AppError> {
    let row = sqlx::query_as::<_, DbLesson>(&format!(
        "SELECT {LESSON_COLUMNS} FROM lessons WHERE id = ?"
    ))
    .bind(lesson_id)
    .fetch_optional(pool)
    .await?;

    row.map(Lesson::from)
        .ok_or_else(|| AppError::NotFound("Lesson not found.".to_string()))
}

#[instrument(skip(pool))]
pub async fn list_lessons(pool: &Pool<Sqlite>, course_id: i64) -> Result<Vec<Lesson>, AppError> {
    info!("Listing lessons for course");
    let rows = sqlx::query_as::<_, DbLesson>(&format!(
        "SELECT {LESSON_COLUMNS} FROM lessons WHERE course_id = ? ORDER BY lesson_order ASC, id ASC"
    ))
    .bind(course_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Lesson::from).collect())
}

async fn lesson_ids_in_order(
    conn: &mut SqliteConnection,
    course_id: i64,
) -> Result<Vec<i64>, AppError> {
    Ok(sqlx::query_scalar::<_, i64>(
        "SELECT id FROM lessons WHERE course_id = ? ORDER BY lesson_order ASC, id ASC",
    )
    .bind(course_id)
    .fetch_all(&mut *conn)
    .await?)
}

async fn apply_order(conn: &mut SqliteConnection, ids: &[i64]) -> Result<(), AppError> {
    for (position, &id) in ids.iter().enumerate() {
        sqlx::query("UPDATE lessons SET lesson_order = ? WHERE id = ?")
            .bind(position as i64 + 1)
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Removes the lesson and its progress rows, then closes the gap so the
/// course's remaining lessons are numbered 1..N again.
#[instrument(skip(pool))]
pub async fn delete_lesson(pool: &Pool<Sqlite>, lesson_id: i64) -> Result<String, AppError> {
    info!("Deleting lesson");
    let mut tx = pool.begin().await?;

    let (title, course_id) = sqlx::query_as::<_, (String, i64)>(
        "SELECT title, course_id FROM lessons WHERE id = ?",
    )
    .bind(lesson_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Lesson not found.".to_string()))?;

    sqlx::query("DELETE FROM user_progress WHERE lesson_id = ?")
        .bind(lesson_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM lessons WHERE id = ?")
        .bind(lesson_id)
        .execute(&mut *tx)
        .await?;

    let remaining = lesson_ids_in_order(&mut tx, course_id).await?;
    apply_order(&mut tx, &remaining).await?;

    tx.commit().await?;
    Ok(title)
}

/// Applies a caller-supplied ordering. The ids must be exactly the course's
/// lessons, each once; anything else is rejected without changes.
#[instrument(skip(pool))]
pub async fn reorder_lessons(
    pool: &Pool<Sqlite>,
    course_id: i64,
    ordered_ids: &[i64],
) -> Result<Vec<Lesson>, AppError> {
    info!("Reordering lessons");
    let mut tx = pool.begin().await?;

    let course = sqlx::query_scalar::<_, i64>("SELECT id FROM courses WHERE id = ?")
        .bind(course_id)
        .fetch_optional(&mut *tx)
        .await?;
    if course.is_none() {
        return Err(AppError::NotFound("Course not found.".to_string()));
    }

    let existing: HashSet<i64> = lesson_ids_in_order(&mut tx, course_id)
        .await?
        .into_iter()
        .collect();
    let supplied: HashSet<i64> = ordered_ids.iter().copied().collect();

    if supplied.len() != ordered_ids.len() || supplied != existing {
        warn!(
            expected = existing.len(),
            supplied = ordered_ids.len(),
            "Rejected lesson reorder that is not a permutation of the course's lessons"
        );
        return Err(AppError::Validation(
            "Lesson order must list every lesson of the course exactly once.".to_string(),
        ));
    }

    apply_order(&mut tx, ordered_ids).await?;
    tx.commit().await?;

    list_lessons(pool, course_id).await
}

/// Copies every content field into a new lesson titled "<title> (Copy)" at
/// the end of the course.
#[instrument(skip(pool))]
pub async fn duplicate_lesson(pool: &Pool<Sqlite>, lesson_id: i64) -> Result<Lesson, AppError> {
    info!("Duplicating lesson");
    let mut tx = pool.begin().await?;

    let original = sqlx::query_as::<_, DbLesson>(&format!(
        "SELECT {LESSON_COLUMNS} FROM lessons WHERE id = ?"
    ))
    .bind(lesson_id)
    .fetch_optional(&mut *tx)
    .await?
    .map(Lesson::from)
    .ok_or_else(|| AppError::NotFound("Lesson not found.".to_string()))?;

    let order = next_lesson_order(&mut tx, original.course_id).await?;

    let res = sqlx::query(
        "INSERT INTO lessons (course_id, title, content, lesson_type, duration_minutes, lesson_order,
                              learning_objectives, additional_resources, file_path, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(original.course_id)
    .bind(format!("{} (Copy)", original.title))
    .bind(&original.content)
    .bind(original.lesson_type.as_str())
    .bind(original.duration_minutes)
    .bind(order)
    .bind(&original.learning_objectives)
    .bind(&original.additional_resources)
    .bind(&original.file_path)
    .bind(Utc::now().naive_utc())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    get_lesson(pool, res.last_insert_rowid()).await
}
