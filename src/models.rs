use std::fmt;
use std::str::FromStr;

use anyhow::Error;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::Role;

/// Three-valued review state shared by accounts and enrollments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }

    /// Unknown or missing stored values read as `Pending`, the least permissive state.
    pub fn from_db(value: Option<&str>) -> Self {
        value
            .and_then(|s| s.parse().ok())
            .unwrap_or(ApprovalStatus::Pending)
    }
}

impl FromStr for ApprovalStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ApprovalStatus::Pending),
            "approved" => Ok(ApprovalStatus::Approved),
            "rejected" => Ok(ApprovalStatus::Rejected),
            _ => Err(Error::msg(format!("Unknown approval status: {}", s))),
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn to_utc(dt: Option<NaiveDateTime>) -> Option<DateTime<Utc>> {
    dt.map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub department: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub is_active: bool,
    pub approval_status: ApprovalStatus,
    pub approved_by: Option<i64>,
    pub approved_at: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub enrolled_courses: i64,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbAccount {
    pub id: Option<i64>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub role: Option<String>,
    pub department: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub is_active: Option<bool>,
    pub approval_status: Option<String>,
    pub approved_by: Option<i64>,
    pub approved_at: Option<NaiveDateTime>,
    pub last_login: Option<NaiveDateTime>,
    pub created_at: Option<NaiveDateTime>,
    #[sqlx(default)]
    pub enrolled_courses: Option<i64>,
}

impl From<DbAccount> for Account {
    fn from(db: DbAccount) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            username: db.username.unwrap_or_default(),
            email: db.email.unwrap_or_default(),
            full_name: db.full_name.unwrap_or_default(),
            role: Role::from_db(db.role.as_deref()),
            department: db.department,
            phone: db.phone,
            bio: db.bio,
            is_active: db.is_active.unwrap_or_default(),
            approval_status: ApprovalStatus::from_db(db.approval_status.as_deref()),
            approved_by: db.approved_by,
            approved_at: to_utc(db.approved_at),
            last_login: to_utc(db.last_login),
            created_at: to_utc(db.created_at),
            enrolled_courses: db.enrolled_courses.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct AccountStatistics {
    pub total_accounts: i64,
    pub active_accounts: i64,
    pub pending_accounts: i64,
    pub approved_accounts: i64,
    pub rejected_accounts: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Course {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub level: String,
    pub duration_hours: i64,
    pub instructor_id: Option<i64>,
    pub instructor_name: Option<String>,
    pub is_published: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub lesson_count: i64,
    pub enrolled_count: i64,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbCourse {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub level: Option<String>,
    pub duration_hours: Option<i64>,
    pub instructor_id: Option<i64>,
    #[sqlx(default)]
    pub instructor_name: Option<String>,
    pub is_published: Option<bool>,
    pub created_at: Option<NaiveDateTime>,
    #[sqlx(default)]
    pub lesson_count: Option<i64>,
    #[sqlx(default)]
    pub enrolled_count: Option<i64>,
}

impl From<DbCourse> for Course {
    fn from(db: DbCourse) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            title: db.title.unwrap_or_default(),
            description: db.description.unwrap_or_default(),
            category: db.category.unwrap_or_default(),
            level: db.level.unwrap_or_default(),
            duration_hours: db.duration_hours.unwrap_or_default(),
            instructor_id: db.instructor_id,
            instructor_name: db.instructor_name,
            is_published: db.is_published.unwrap_or_default(),
            created_at: to_utc(db.created_at),
            lesson_count: db.lesson_count.unwrap_or_default(),
            enrolled_count: db.enrolled_count.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CategoryCount {
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct CourseStatistics {
    pub total_courses: i64,
    pub published_courses: i64,
    pub draft_courses: i64,
    pub total_enrollments: i64,
    pub approved_enrollments: i64,
    pub pending_enrollments: i64,
    pub total_lessons: i64,
    pub categories: Vec<CategoryCount>,
    pub levels: Vec<CategoryCount>,
}

/// Display-only tag on a lesson; no behaviour depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LessonType {
    #[default]
    Text,
    Video,
    Audio,
    Presentation,
    Interactive,
    Quiz,
    Assignment,
    Discussion,
}

impl LessonType {
    pub const ALL: [LessonType; 8] = [
        LessonType::Text,
        LessonType::Video,
        LessonType::Audio,
        LessonType::Presentation,
        LessonType::Interactive,
        LessonType::Quiz,
        LessonType::Assignment,
        LessonType::Discussion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LessonType::Text => "text",
            LessonType::Video => "video",
            LessonType::Audio => "audio",
            LessonType::Presentation => "presentation",
            LessonType::Interactive => "interactive",
            LessonType::Quiz => "quiz",
            LessonType::Assignment => "assignment",
            LessonType::Discussion => "discussion",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LessonType::Text => "Text/Reading",
            LessonType::Video => "Video",
            LessonType::Audio => "Audio",
            LessonType::Presentation => "Presentation",
            LessonType::Interactive => "Interactive",
            LessonType::Quiz => "Quiz/Assessment",
            LessonType::Assignment => "Assignment",
            LessonType::Discussion => "Discussion",
        }
    }

    pub fn from_db(value: Option<&str>) -> Self {
        LessonType::ALL
            .into_iter()
            .find(|t| Some(t.as_str()) == value)
            .unwrap_or_default()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Lesson {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub content: String,
    pub lesson_type: LessonType,
    pub duration_minutes: Option<i64>,
    pub lesson_order: i64,
    pub learning_objectives: Option<String>,
    pub additional_resources: Option<String>,
    pub file_path: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// What the course page lists before access is decided: no lesson content.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LessonOutline {
    pub id: i64,
    pub title: String,
    pub lesson_type: LessonType,
    pub duration_minutes: Option<i64>,
    pub lesson_order: i64,
}

impl From<Lesson> for LessonOutline {
    fn from(lesson: Lesson) -> Self {
        LessonOutline {
            id: lesson.id,
            title: lesson.title,
            lesson_type: lesson.lesson_type,
            duration_minutes: lesson.duration_minutes,
            lesson_order: lesson.lesson_order,
        }
    }
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbLesson {
    pub id: Option<i64>,
    pub course_id: Option<i64>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub lesson_type: Option<String>,
    pub duration_minutes: Option<i64>,
    pub lesson_order: Option<i64>,
    pub learning_objectives: Option<String>,
    pub additional_resources: Option<String>,
    pub file_path: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

impl From<DbLesson> for Lesson {
    fn from(db: DbLesson) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            course_id: db.course_id.unwrap_or_default(),
            title: db.title.unwrap_or_default(),
            content: db.content.unwrap_or_default(),
            lesson_type: LessonType::from_db(db.lesson_type.as_deref()),
            duration_minutes: db.duration_minutes,
            lesson_order: db.lesson_order.unwrap_or_default(),
            learning_objectives: db.learning_objectives,
            additional_resources: db.additional_resources,
            file_path: db.file_path,
            created_at: to_utc(db.created_at),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Enrollment {
    pub id: i64,
    pub user_id: i64,
    pub course_id: i64,
    pub full_name: String,
    pub email: String,
    pub course_title: String,
    pub approval_status: ApprovalStatus,
    pub is_active: bool,
    pub approved_by: Option<i64>,
    pub approved_at: Option<DateTime<Utc>>,
    pub enrolled_at: Option<DateTime<Utc>>,
    pub completed_lessons: i64,
    pub total_lessons: i64,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbEnrollment {
    pub id: Option<i64>,
    pub user_id: Option<i64>,
    pub course_id: Option<i64>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub course_title: Option<String>,
    pub approval_status: Option<String>,
    pub is_active: Option<bool>,
    pub approved_by: Option<i64>,
    pub approved_at: Option<NaiveDateTime>,
    pub enrolled_at: Option<NaiveDateTime>,
    #[sqlx(default)]
    pub completed_lessons: Option<i64>,
    #[sqlx(default)]
    pub total_lessons: Option<i64>,
}

impl From<DbEnrollment> for Enrollment {
    fn from(db: DbEnrollment) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            user_id: db.user_id.unwrap_or_default(),
            course_id: db.course_id.unwrap_or_default(),
            full_name: db.full_name.unwrap_or_default(),
            email: db.email.unwrap_or_default(),
            course_title: db.course_title.unwrap_or_default(),
            approval_status: ApprovalStatus::from_db(db.approval_status.as_deref()),
            is_active: db.is_active.unwrap_or_default(),
            approved_by: db.approved_by,
            approved_at: to_utc(db.approved_at),
            enrolled_at: to_utc(db.enrolled_at),
            completed_lessons: db.completed_lessons.unwrap_or_default(),
            total_lessons: db.total_lessons.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LessonProgress {
    pub lesson_id: i64,
    pub title: String,
    pub lesson_order: i64,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub time_spent: i64,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbLessonProgress {
    pub lesson_id: Option<i64>,
    pub title: Option<String>,
    pub lesson_order: Option<i64>,
    pub completed: Option<bool>,
    pub completed_at: Option<NaiveDateTime>,
    pub time_spent: Option<i64>,
}

impl From<DbLessonProgress> for LessonProgress {
    fn from(db: DbLessonProgress) -> Self {
        Self {
            lesson_id: db.lesson_id.unwrap_or_default(),
            title: db.title.unwrap_or_default(),
            lesson_order: db.lesson_order.unwrap_or_default(),
            completed: db.completed.unwrap_or_default(),
            completed_at: to_utc(db.completed_at),
            time_spent: db.time_spent.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Approved,
    Skipped,
    Failed,
}

/// Result for one id of a bulk approval.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ItemOutcome {
    pub id: i64,
    pub status: ItemStatus,
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct BulkOutcome {
    pub approved: usize,
    pub skipped: usize,
    pub failed: usize,
    pub items: Vec<ItemOutcome>,
}

impl BulkOutcome {
    pub fn record(&mut self, id: i64, status: ItemStatus, reason: impl Into<String>) {
        match status {
            ItemStatus::Approved => self.approved += 1,
            ItemStatus::Skipped => self.skipped += 1,
            ItemStatus::Failed => self.failed += 1,
        }
        self.items.push(ItemOutcome {
            id,
            status,
            reason: reason.into(),
        });
    }

    pub fn summary(&self, noun: &str) -> String {
        let mut parts = vec![format!("Approved {} {}(s)", self.approved, noun)];
        if self.skipped > 0 {
            parts.push(format!("{} skipped", self.skipped));
        }
        if self.failed > 0 {
            parts.push(format!("{} failed", self.failed));
        }
        format!("{}.", parts.join(", "))
    }
}
