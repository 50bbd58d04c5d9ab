#[cfg(test)]
mod tests {
    use crate::db::{
        list_account_enrollments, list_course_enrollments, list_enrollments,
        list_pending_enrollments, request_enrollment,
    };
    use crate::error::AppError;
    use crate::models::ApprovalStatus;
    use crate::test::test_db::TestDbBuilder;
    use crate::test::test_utils::create_standard_test_db;

    #[rocket::async_test]
    async fn test_request_creates_pending_enrollment() {
        let test_db = create_standard_test_db().await;
        let rejected = test_db.account_id("rejected_teacher");
        let course_id = test_db.course_id("Rust Basics");

        let enrollment = request_enrollment(&test_db.pool, rejected, course_id)
            .await
            .expect("enrollment request");

        assert_eq!(enrollment.approval_status, ApprovalStatus::Pending);
        assert_eq!(enrollment.user_id, rejected);
        assert_eq!(enrollment.course_title, "Rust Basics");
        assert!(enrollment.is_active);
        assert_eq!(enrollment.total_lessons, 3);
    }

    #[rocket::async_test]
    async fn test_repeat_request_reports_existing_status() {
        let test_db = TestDbBuilder::new()
            .teacher("learner", ApprovalStatus::Approved)
            .course("Pending Course", true)
            .course("Approved Course", true)
            .course("Rejected Course", true)
            .enrollment("learner", "Pending Course", ApprovalStatus::Pending)
            .enrollment("learner", "Approved Course", ApprovalStatus::Approved)
            .enrollment("learner", "Rejected Course", ApprovalStatus::Rejected)
            .build()
            .await
            .expect("Failed to build test database");

        let learner = test_db.account_id("learner");
        let cases = [
            (
                "Pending Course",
                "Your enrollment request is already pending approval.",
            ),
            ("Approved Course", "You are already enrolled in this course."),
            (
                "Rejected Course",
                "Your previous enrollment was rejected. Please contact administrator.",
            ),
        ];

        for (course, expected) in cases {
            let result = request_enrollment(&test_db.pool, learner, test_db.course_id(course)).await;
            match result {
                Err(AppError::Conflict(message)) => assert_eq!(message, expected),
                other => panic!("expected conflict for {}, got {:?}", course, other),
            }
        }

        assert_eq!(test_db.count("SELECT COUNT(*) FROM enrollments").await, 3);
    }

    #[rocket::async_test]
    async fn test_admin_does_not_enroll() {
        let test_db = create_standard_test_db().await;
        let admin_id = test_db.account_id("admin_user");
        let course_id = test_db.course_id("Rust Basics");

        let result = request_enrollment(&test_db.pool, admin_id, course_id).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[rocket::async_test]
    async fn test_drafts_and_unknown_courses_cannot_be_requested() {
        let test_db = create_standard_test_db().await;
        let learner = test_db.account_id("approved_teacher");

        for course_id in [test_db.course_id("Draft Course"), 9_999] {
            let result = request_enrollment(&test_db.pool, learner, course_id).await;
            assert!(matches!(result, Err(AppError::NotFound(_))));
        }
    }

    #[rocket::async_test]
    async fn test_listings_filter_by_status_and_hide_admins() {
        let test_db = TestDbBuilder::new()
            .admin("admin_user")
            .teacher("first", ApprovalStatus::Approved)
            .teacher("second", ApprovalStatus::Approved)
            .course("Rust Basics", true)
            .course("Go Basics", true)
            .enrollment("first", "Rust Basics", ApprovalStatus::Approved)
            .enrollment("second", "Rust Basics", ApprovalStatus::Pending)
            .enrollment("second", "Go Basics", ApprovalStatus::Rejected)
            .enrollment("admin_user", "Rust Basics", ApprovalStatus::Approved)
            .build()
            .await
            .expect("Failed to build test database");

        let rust = list_course_enrollments(&test_db.pool, test_db.course_id("Rust Basics"))
            .await
            .expect("course enrollments");
        assert_eq!(rust.len(), 2);

        let pending = list_pending_enrollments(&test_db.pool)
            .await
            .expect("pending enrollments");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].full_name, "second Name");

        let rejected = list_enrollments(&test_db.pool, Some(ApprovalStatus::Rejected))
            .await
            .expect("rejected enrollments");
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].course_title, "Go Basics");

        let mine = list_account_enrollments(&test_db.pool, test_db.account_id("second"))
            .await
            .expect("account enrollments");
        assert_eq!(mine.len(), 2);
    }
}
