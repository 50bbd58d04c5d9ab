pub mod test_db {
    use crate::auth::Role;
    use crate::db::hash_password;
    use crate::error::AppError;
    use crate::models::ApprovalStatus;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::{Pool, Sqlite};
    use std::collections::HashMap;
    use std::sync::Once;
    use tracing::log::LevelFilter;

    static INIT: Once = Once::new();
    pub static STANDARD_PASSWORD: &str = "password123";

    #[derive(Default)]
    pub struct TestDbBuilder {
        accounts: Vec<TestAccount>,
        courses: Vec<TestCourse>,
        lessons: Vec<TestLesson>,
        enrollments: Vec<TestEnrollment>,
    }

    pub struct TestAccount {
        pub username: String,
        pub role: Role,
        pub approval_status: ApprovalStatus,
        pub is_active: bool,
    }

    pub struct TestCourse {
        pub title: String,
        pub category: String,
        pub level: String,
        pub is_published: bool,
    }

    pub struct TestLesson {
        pub course_title: String,
        pub title: String,
    }

    pub struct TestEnrollment {
        pub username: String,
        pub course_title: String,
        pub approval_status: ApprovalStatus,
    }

    /// Accounts log in as `<username>@example.com` with `STANDARD_PASSWORD`.
    pub fn email_for(username: &str) -> String {
        format!("{}@example.com", username)
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn teacher(self, username: &str, approval_status: ApprovalStatus) -> Self {
            self.account(username, Role::Teacher, approval_status, true)
        }

        pub fn admin(self, username: &str) -> Self {
            self.account(username, Role::Admin, ApprovalStatus::Approved, true)
        }

        pub fn account(
            mut self,
            username: &str,
            role: Role,
            approval_status: ApprovalStatus,
            is_active: bool,
        ) -> Self {
            self.accounts.push(TestAccount {
                username: username.to_string(),
                role,
                approval_status,
                is_active,
            });
            self
        }

        pub fn course(self, title: &str, is_published: bool) -> Self {
            self.course_with(title, "General", "beginner", is_published)
        }

        pub fn course_with(
            mut self,
            title: &str,
            category: &str,
            level: &str,
            is_published: bool,
        ) -> Self {
            self.courses.push(TestCourse {
                title: title.to_string(),
                category: category.to_string(),
                level: level.to_string(),
                is_published,
            });
            self
        }

        /// Lessons are numbered in the order they are declared per course.
        pub fn lesson(mut self, course_title: &str, title: &str) -> Self {
            self.lessons.push(TestLesson {
                course_title: course_title.to_string(),
                title: title.to_string(),
            });
            self
        }

        pub fn enrollment(
            mut self,
            username: &str,
            course_title: &str,
            approval_status: ApprovalStatus,
        ) -> Self {
            self.enrollments.push(TestEnrollment {
                username: username.to_string(),
                course_title: course_title.to_string(),
                approval_status,
            });
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            INIT.call_once(|| {
                let _ = env_logger::builder()
                    .filter_level(LevelFilter::Debug)
                    .is_test(true)
                    .try_init();
            });

            // One connection: every handle must see the same in-memory database.
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect("sqlite::memory:")
                .await?;

            sqlx::migrate!("./migrations").run(&pool).await?;

            let mut account_ids: HashMap<String, i64> = HashMap::new();
            let mut course_ids: HashMap<String, i64> = HashMap::new();
            let mut lesson_ids: HashMap<String, i64> = HashMap::new();
            let mut enrollment_ids: HashMap<(String, String), i64> = HashMap::new();

            let password_hash = hash_password(STANDARD_PASSWORD)?;

            for account in &self.accounts {
                let res = sqlx::query(
                    "INSERT INTO users (username, email, full_name, password_hash, role, is_active, approval_status)
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(&account.username)
                .bind(email_for(&account.username))
                .bind(format!("{} Name", account.username))
                .bind(&password_hash)
                .bind(account.role.as_str())
                .bind(account.is_active)
                .bind(account.approval_status.as_str())
                .execute(&pool)
                .await?;

                account_ids.insert(account.username.clone(), res.last_insert_rowid());
            }

            for course in &self.courses {
                let res = sqlx::query(
                    "INSERT INTO courses (title, description, category, level, duration_hours, is_published)
                     VALUES (?, ?, ?, ?, 10, ?)",
                )
                .bind(&course.title)
                .bind(format!("About {}", course.title))
                .bind(&course.category)
                .bind(&course.level)
                .bind(course.is_published)
                .execute(&pool)
                .await?;

                course_ids.insert(course.title.clone(), res.last_insert_rowid());
            }

            let mut next_order: HashMap<i64, i64> = HashMap::new();
            for lesson in &self.lessons {
                let course_id = *course_ids.get(&lesson.course_title).ok_or_else(|| {
                    AppError::Internal(format!("unknown course {}", lesson.course_title))
                })?;
                let order = next_order.entry(course_id).or_insert(0);
                *order += 1;

                let res = sqlx::query(
                    "INSERT INTO lessons (course_id, title, content, lesson_type, lesson_order)
                     VALUES (?, ?, ?, 'text', ?)",
                )
                .bind(course_id)
                .bind(&lesson.title)
                .bind(format!("Content of {}", lesson.title))
                .bind(*order)
                .execute(&pool)
                .await?;

                lesson_ids.insert(lesson.title.clone(), res.last_insert_rowid());
            }

            for enrollment in &self.enrollments {
                let account_id = *account_ids.get(&enrollment.username).ok_or_else(|| {
                    AppError::Internal(format!("unknown account {}", enrollment.username))
                })?;
                let course_id = *course_ids.get(&enrollment.course_title).ok_or_else(|| {
                    AppError::Internal(format!("unknown course {}", enrollment.course_title))
                })?;

                let res = sqlx::query(
                    "INSERT INTO enrollments (user_id, course_id, approval_status) VALUES (?, ?, ?)",
                )
                .bind(account_id)
                .bind(course_id)
                .bind(enrollment.approval_status.as_str())
                .execute(&pool)
                .await?;

                enrollment_ids.insert(
                    (enrollment.username.clone(), enrollment.course_title.clone()),
                    res.last_insert_rowid(),
                );
            }

            Ok(TestDb {
                pool,
                account_ids,
                course_ids,
                lesson_ids,
                enrollment_ids,
            })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub account_ids: HashMap<String, i64>,
        pub course_ids: HashMap<String, i64>,
        pub lesson_ids: HashMap<String, i64>,
        pub enrollment_ids: HashMap<(String, String), i64>,
    }

    impl TestDb {
        pub fn account_id(&self, username: &str) -> i64 {
            self.account_ids[username]
        }

        pub fn course_id(&self, title: &str) -> i64 {
            self.course_ids[title]
        }

        pub fn lesson_id(&self, title: &str) -> i64 {
            self.lesson_ids[title]
        }

        pub fn enrollment_id(&self, username: &str, course_title: &str) -> i64 {
            self.enrollment_ids[&(username.to_string(), course_title.to_string())]
        }

        pub async fn count(&self, sql: &str) -> i64 {
            sqlx::query_scalar::<_, i64>(sql)
                .fetch_one(&self.pool)
                .await
                .expect("count query failed")
        }
    }
}

pub mod test_utils {
    use rocket::http::{ContentType, Status};
    use rocket::local::asynchronous::Client;
    use serde_json::{Value, json};

    use super::test_db::{STANDARD_PASSWORD, TestDb, TestDbBuilder, email_for};
    use crate::config::AppConfig;
    use crate::init_rocket;
    use crate::models::ApprovalStatus;

    /// Two courses, an admin, and teachers in each approval state.
    pub async fn create_standard_test_db() -> TestDb {
        TestDbBuilder::new()
            .admin("admin_user")
            .teacher("approved_teacher", ApprovalStatus::Approved)
            .teacher("pending_teacher", ApprovalStatus::Pending)
            .teacher("rejected_teacher", ApprovalStatus::Rejected)
            .course("Rust Basics", true)
            .course("Draft Course", false)
            .lesson("Rust Basics", "Ownership")
            .lesson("Rust Basics", "Borrowing")
            .lesson("Rust Basics", "Lifetimes")
            .enrollment("approved_teacher", "Rust Basics", ApprovalStatus::Approved)
            .enrollment("pending_teacher", "Rust Basics", ApprovalStatus::Approved)
            .build()
            .await
            .expect("Failed to build standard test database")
    }

    pub async fn setup_test_client(test_db: TestDb) -> (Client, TestDb) {
        let rocket = init_rocket(test_db.pool.clone(), AppConfig::default()).await;
        let client = Client::tracked(rocket)
            .await
            .expect("valid rocket instance");
        (client, test_db)
    }

    /// Logs in through the API; the tracked client keeps the session cookie.
    pub async fn login_test_user(client: &Client, username: &str) -> Value {
        let response = client
            .post("/api/login")
            .header(ContentType::JSON)
            .body(
                json!({
                    "email": email_for(username),
                    "password": STANDARD_PASSWORD
                })
                .to_string(),
            )
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok, "login failed for {}", username);
        response.into_json().await.expect("login response body")
    }
}
