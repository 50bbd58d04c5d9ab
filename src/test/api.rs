#[cfg(test)]
mod tests {
    use rocket::http::{ContentType, Status};
    use rocket::local::asynchronous::Client;
    use serde_json::{Value, json};

    use crate::config::AppConfig;
    use crate::init_rocket;
    use crate::models::ApprovalStatus;
    use crate::test::test_db::{STANDARD_PASSWORD, TestDbBuilder};
    use crate::test::test_utils::{create_standard_test_db, login_test_user, setup_test_client};

    async fn get_json(client: &Client, uri: &str) -> (Status, Value) {
        let response = client.get(uri.to_string()).dispatch().await;
        let status = response.status();
        let body = response.into_json::<Value>().await.unwrap_or(Value::Null);
        (status, body)
    }

    async fn post_json(client: &Client, uri: &str, body: Value) -> (Status, Value) {
        let response = client
            .post(uri.to_string())
            .header(ContentType::JSON)
            .body(body.to_string())
            .dispatch()
            .await;
        let status = response.status();
        let body = response.into_json::<Value>().await.unwrap_or(Value::Null);
        (status, body)
    }

    #[rocket::async_test]
    async fn test_health_is_public() {
        let (client, _db) = setup_test_client(create_standard_test_db().await).await;

        let (status, body) = get_json(&client, "/api/health").await;
        assert_eq!(status, Status::Ok);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "healthy");
    }

    #[rocket::async_test]
    async fn test_protected_routes_require_a_session() {
        let (client, _db) = setup_test_client(create_standard_test_db().await).await;

        for uri in ["/api/me", "/api/courses", "/api/admin/accounts"] {
            let (status, body) = get_json(&client, uri).await;
            assert_eq!(status, Status::Unauthorized, "{} should need a session", uri);
            assert_eq!(body["success"], false);
        }
    }

    #[rocket::async_test]
    async fn test_failed_login_is_unauthorized() {
        let (client, _db) = setup_test_client(create_standard_test_db().await).await;

        let (status, body) = post_json(
            &client,
            "/api/login",
            json!({ "email": "approved_teacher@example.com", "password": "wrong" }),
        )
        .await;

        assert_eq!(status, Status::Unauthorized);
        assert_eq!(body["message"], "Invalid email or password.");

        let (status, _) = get_json(&client, "/api/me").await;
        assert_eq!(status, Status::Unauthorized);
    }

    #[rocket::async_test]
    async fn test_login_then_logout() {
        let (client, _db) = setup_test_client(create_standard_test_db().await).await;

        let body = login_test_user(&client, "approved_teacher").await;
        assert_eq!(body["message"], "Welcome back, approved_teacher Name!");
        assert_eq!(body["data"]["role"], "teacher");

        let (status, me) = get_json(&client, "/api/me").await;
        assert_eq!(status, Status::Ok);
        assert_eq!(me["data"]["username"], "approved_teacher");

        let response = client.post("/api/logout").dispatch().await;
        assert_eq!(response.status(), Status::Ok);

        let (status, _) = get_json(&client, "/api/me").await;
        assert_eq!(status, Status::Unauthorized);
    }

    #[rocket::async_test]
    async fn test_teachers_are_kept_out_of_admin_routes() {
        let (client, _db) = setup_test_client(create_standard_test_db().await).await;
        login_test_user(&client, "approved_teacher").await;

        for uri in [
            "/api/admin/accounts",
            "/api/admin/enrollments",
            "/api/admin/statistics",
        ] {
            let (status, body) = get_json(&client, uri).await;
            assert_eq!(status, Status::Forbidden, "{} should be admin-only", uri);
            assert_eq!(body["success"], false);
        }

        let (status, _) = post_json(&client, "/api/admin/accounts/bulk-approve", json!({ "ids": [1] })).await;
        assert_eq!(status, Status::Forbidden);
    }

    #[rocket::async_test]
    async fn test_drafts_are_hidden_from_teachers() {
        let (client, test_db) = setup_test_client(create_standard_test_db().await).await;
        login_test_user(&client, "approved_teacher").await;

        let (status, body) = get_json(&client, "/api/courses").await;
        assert_eq!(status, Status::Ok);
        let titles: Vec<_> = body["data"]
            .as_array()
            .expect("course list")
            .iter()
            .map(|c| c["title"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(titles, vec!["Rust Basics"]);

        let draft = test_db.course_id("Draft Course");
        let (status, _) = get_json(&client, &format!("/api/courses/{}", draft)).await;
        assert_eq!(status, Status::NotFound);
    }

    #[rocket::async_test]
    async fn test_registration_errors_are_unprocessable() {
        let (client, _db) = setup_test_client(create_standard_test_db().await).await;

        let (status, body) = post_json(
            &client,
            "/api/register",
            json!({ "username": "ab", "email": "nope", "password": "short" }),
        )
        .await;

        assert_eq!(status, Status::UnprocessableEntity);
        assert_eq!(body["success"], false);
        let message = body["message"].as_str().unwrap_or_default();
        assert!(message.contains("First Name is required"), "{}", message);
        assert!(message.contains("Please enter a valid email address"), "{}", message);
    }

    #[rocket::async_test]
    async fn test_signup_validation_lists_field_errors() {
        let (client, _db) = setup_test_client(create_standard_test_db().await).await;

        let (status, body) = post_json(
            &client,
            "/api/signup",
            json!({
                "username": "newbie",
                "email": "newbie@example.com",
                "full_name": "New Bie",
                "password": "password123",
                "confirm_password": "password124"
            }),
        )
        .await;

        assert_eq!(status, Status::UnprocessableEntity);
        assert!(body["errors"]["confirm_password"].is_array());
    }

    #[rocket::async_test]
    async fn test_admin_cannot_toggle_itself() {
        let (client, test_db) = setup_test_client(create_standard_test_db().await).await;
        login_test_user(&client, "admin_user").await;

        let admin_id = test_db.account_id("admin_user");
        let (status, body) = post_json(
            &client,
            &format!("/api/admin/accounts/{}/toggle", admin_id),
            json!({}),
        )
        .await;

        assert_eq!(status, Status::UnprocessableEntity);
        assert_eq!(body["message"], "You cannot modify your own account status.");
    }

    /// Sign up, request a course, get approved twice over, then study.
    #[rocket::async_test]
    async fn test_full_approval_workflow() {
        let test_db = TestDbBuilder::new()
            .admin("admin_user")
            .course("Rust Basics", true)
            .lesson("Rust Basics", "Ownership")
            .lesson("Rust Basics", "Borrowing")
            .build()
            .await
            .expect("Failed to build test database");
        let course_id = test_db.course_id("Rust Basics");
        let ownership = test_db.lesson_id("Ownership");
        let (client, test_db) = setup_test_client(test_db).await;

        let (status, body) = post_json(
            &client,
            "/api/signup",
            json!({
                "username": "learner",
                "email": "learner@example.com",
                "full_name": "Lea Learner",
                "password": STANDARD_PASSWORD,
                "confirm_password": STANDARD_PASSWORD
            }),
        )
        .await;
        assert_eq!(status, Status::Ok, "{}", body);
        let learner_id = body["data"]["id"].as_i64().expect("new account id");

        let (status, body) = post_json(
            &client,
            "/api/login",
            json!({ "email": "learner@example.com", "password": STANDARD_PASSWORD }),
        )
        .await;
        assert_eq!(status, Status::Ok);
        assert_eq!(
            body["message"],
            "Welcome, Lea Learner! Your account is pending admin approval for full course access."
        );

        let (status, body) =
            post_json(&client, &format!("/api/courses/{}/enroll", course_id), json!({})).await;
        assert_eq!(status, Status::Ok);
        let enrollment_id = body["data"]["id"].as_i64().expect("enrollment id");

        let (status, body) = get_json(&client, &format!("/api/courses/{}/lessons", course_id)).await;
        assert_eq!(status, Status::Forbidden);
        assert_eq!(
            body["message"],
            "Your account is pending admin approval. You'll gain access once approved"
        );

        let (_, body) = get_json(&client, &format!("/api/courses/{}/access", course_id)).await;
        assert_eq!(body["data"]["allowed"], false);
        assert_eq!(body["data"]["reason"], "account pending approval");

        // Switch to the admin; the tracked client replaces the session cookie.
        login_test_user(&client, "admin_user").await;

        let (status, body) = get_json(&client, "/api/admin/accounts/pending").await;
        assert_eq!(status, Status::Ok);
        assert_eq!(body["data"].as_array().map(Vec::len), Some(1));

        let (status, body) = post_json(
            &client,
            &format!("/api/admin/accounts/{}/approve", learner_id),
            json!({}),
        )
        .await;
        assert_eq!(status, Status::Ok);
        assert_eq!(body["message"], "User \"Lea Learner\" approved successfully!");

        let (status, body) = get_json(&client, "/api/admin/enrollments?status=pending").await;
        assert_eq!(status, Status::Ok);
        assert_eq!(body["data"][0]["id"], enrollment_id);

        let (_, pending) = get_json(&client, "/api/admin/enrollments/pending").await;
        assert_eq!(pending["data"], body["data"]);

        let (status, body) = post_json(
            &client,
            "/api/admin/enrollments/bulk-approve",
            json!({ "ids": [enrollment_id] }),
        )
        .await;
        assert_eq!(status, Status::Ok);
        assert_eq!(body["message"], "Approved 1 enrollment(s).");

        let (status, body) = post_json(
            &client,
            &format!("/api/lessons/{}/complete", ownership),
            json!({ "time_spent": 90 }),
        )
        .await;
        assert_eq!(status, Status::Ok);
        assert_eq!(body["data"]["tracked"], false);

        let response = client
            .post("/api/login")
            .header(ContentType::JSON)
            .body(json!({ "email": "learner@example.com", "password": STANDARD_PASSWORD }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let (status, body) = get_json(&client, &format!("/api/courses/{}/lessons", course_id)).await;
        assert_eq!(status, Status::Ok);
        assert_eq!(body["data"].as_array().map(Vec::len), Some(2));

        let (status, body) = post_json(
            &client,
            &format!("/api/lessons/{}/complete", ownership),
            json!({ "time_spent": 90 }),
        )
        .await;
        assert_eq!(status, Status::Ok);
        assert_eq!(body["message"], "Module marked as completed.");
        assert_eq!(body["data"]["progress"]["time_spent"], 90);

        let (_, body) = get_json(&client, &format!("/api/courses/{}/progress", course_id)).await;
        let completed: Vec<_> = body["data"]
            .as_array()
            .expect("progress list")
            .iter()
            .map(|p| p["completed"].as_bool().unwrap_or(false))
            .collect();
        assert_eq!(completed, vec![true, false]);

        let (_, body) = get_json(&client, "/api/enrollments").await;
        assert_eq!(body["data"][0]["approval_status"], ApprovalStatus::Approved.as_str());
        assert_eq!(body["data"][0]["completed_lessons"], 1);

        assert_eq!(
            test_db
                .count("SELECT COUNT(*) FROM user_progress WHERE user_id = (SELECT id FROM users WHERE username = 'admin_user')")
                .await,
            0
        );
    }

    #[rocket::async_test]
    async fn test_admin_lesson_management() {
        let (client, test_db) = setup_test_client(create_standard_test_db().await).await;
        login_test_user(&client, "admin_user").await;
        let course_id = test_db.course_id("Rust Basics");

        let (status, body) = post_json(
            &client,
            &format!("/api/admin/courses/{}/lessons", course_id),
            json!({ "title": "Traits", "content": "Shared behaviour", "lesson_type": "quiz" }),
        )
        .await;
        assert_eq!(status, Status::Ok);
        assert_eq!(body["message"], "Module \"Traits\" created successfully.");
        assert_eq!(body["data"]["lesson_order"], 4);
        let traits = body["data"]["id"].as_i64().expect("lesson id");

        let ids = [
            traits,
            test_db.lesson_id("Ownership"),
            test_db.lesson_id("Borrowing"),
            test_db.lesson_id("Lifetimes"),
        ];
        let (status, body) = post_json(
            &client,
            &format!("/api/admin/courses/{}/lessons/reorder", course_id),
            json!({ "lesson_ids": ids }),
        )
        .await;
        assert_eq!(status, Status::Ok);
        assert_eq!(body["data"][0]["id"], traits);
        assert_eq!(body["data"][0]["lesson_order"], 1);

        let (status, _) = post_json(
            &client,
            &format!("/api/admin/courses/{}/lessons/reorder", course_id),
            json!({ "lesson_ids": [traits] }),
        )
        .await;
        assert_eq!(status, Status::UnprocessableEntity);

        let response = client
            .delete(format!("/api/admin/lessons/{}", test_db.lesson_id("Ownership")))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let (_, body) = get_json(&client, &format!("/api/courses/{}/lessons", course_id)).await;
        let orders: Vec<_> = body["data"]
            .as_array()
            .expect("lesson list")
            .iter()
            .map(|l| l["lesson_order"].as_i64().unwrap_or_default())
            .collect();
        assert_eq!(orders, vec![1, 2, 3]);

        let (status, body) = get_json(&client, "/api/lesson-types").await;
        assert_eq!(status, Status::Ok);
        assert_eq!(body["data"][5]["label"], "Quiz/Assessment");
    }

    #[rocket::async_test]
    async fn test_course_page_lists_an_outline_without_content() {
        let (client, test_db) = setup_test_client(create_standard_test_db().await).await;
        let course_id = test_db.course_id("Rust Basics");

        for username in ["pending_teacher", "rejected_teacher", "approved_teacher"] {
            login_test_user(&client, username).await;

            let (status, body) = get_json(&client, &format!("/api/courses/{}", course_id)).await;
            assert_eq!(status, Status::Ok, "{}", body);

            let lessons = body["data"]["lessons"].as_array().expect("lesson outline");
            assert_eq!(lessons.len(), 3);
            assert_eq!(lessons[0]["title"], "Ownership");
            assert_eq!(lessons[0]["lesson_order"], 1);
            for lesson in lessons {
                assert!(lesson.get("content").is_none(), "{} saw lesson content", username);
                assert!(lesson.get("file_path").is_none());
                assert!(lesson.get("additional_resources").is_none());
            }
        }

        login_test_user(&client, "pending_teacher").await;
        let (_, body) = get_json(&client, &format!("/api/courses/{}", course_id)).await;
        assert_eq!(body["data"]["access"]["allowed"], false);
        assert_eq!(body["data"]["access"]["reason"], "account pending approval");

        login_test_user(&client, "rejected_teacher").await;
        let (_, body) = get_json(&client, &format!("/api/courses/{}", course_id)).await;
        assert_eq!(body["data"]["access"]["reason"], "must request enrollment first");
    }

    #[rocket::async_test]
    async fn test_lessons_of_unpublished_course_cannot_be_completed() {
        let (client, test_db) = setup_test_client(create_standard_test_db().await).await;
        login_test_user(&client, "approved_teacher").await;
        let ownership = test_db.lesson_id("Ownership");

        sqlx::query("UPDATE courses SET is_published = 0 WHERE id = ?")
            .bind(test_db.course_id("Rust Basics"))
            .execute(&test_db.pool)
            .await
            .expect("unpublish course");

        let (status, _) = post_json(
            &client,
            &format!("/api/lessons/{}/complete", ownership),
            json!({ "time_spent": 5 }),
        )
        .await;
        assert_eq!(status, Status::NotFound);
        assert_eq!(test_db.count("SELECT COUNT(*) FROM user_progress").await, 0);
    }

    #[rocket::async_test]
    async fn test_registration_message_follows_new_account_status() {
        let cases = [
            (
                ApprovalStatus::Pending,
                "Registration successful for \"Reg Istrant\". Your account and course enrollment are pending admin approval.",
            ),
            (
                ApprovalStatus::Approved,
                "Registration successful for \"Reg Istrant\". Your account is active; course enrollment requests still need admin approval.",
            ),
        ];

        for (new_account_status, expected) in cases {
            let test_db = create_standard_test_db().await;
            let config = AppConfig {
                new_account_status,
                ..AppConfig::default()
            };
            let client = Client::tracked(init_rocket(test_db.pool.clone(), config).await)
                .await
                .expect("valid rocket instance");

            let (status, body) = post_json(
                &client,
                "/api/register",
                json!({
                    "username": "registrant",
                    "email": "registrant@example.com",
                    "password": STANDARD_PASSWORD,
                    "first_name": "Reg",
                    "last_name": "Istrant",
                    "phone_number": "+254700000000"
                }),
            )
            .await;
            assert_eq!(status, Status::Ok, "{}", body);
            assert_eq!(body["message"], expected);

            let id = body["data"]["id"].as_i64().expect("new account id");
            let stored: String = sqlx::query_scalar("SELECT approval_status FROM users WHERE id = ?")
                .bind(id)
                .fetch_one(&test_db.pool)
                .await
                .expect("stored status");
            assert_eq!(stored, new_account_status.as_str());
        }
    }
}
