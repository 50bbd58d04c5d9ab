#[cfg(test)]
mod tests {
    use crate::{
        auth::UserSession,
        db::{
            clean_expired_sessions, create_user_session, get_session_by_token, invalidate_session,
        },
        error::AppError,
        models::ApprovalStatus,
        test::test_db::TestDbBuilder,
    };
    use chrono::{Duration, NaiveDateTime, Utc};
    use sqlx::{Pool, Sqlite};
    use uuid::Uuid;

    async fn create_test_session() -> (i64, String, NaiveDateTime, Pool<Sqlite>) {
        let test_db = TestDbBuilder::new()
            .teacher("test_session_user", ApprovalStatus::Approved)
            .build()
            .await
            .expect("Failed to build test database");

        let account_id = test_db.account_id("test_session_user");
        let token = format!("test_token_{}", Uuid::new_v4());
        let expires_at = (Utc::now() + Duration::hours(1)).naive_utc();

        (account_id, token, expires_at, test_db.pool)
    }

    #[rocket::async_test]
    async fn test_create_and_get_session() {
        let (account_id, token, expires_at, pool) = create_test_session().await;

        let session_id = create_user_session(&pool, account_id, &token, expires_at)
            .await
            .expect("Failed to create session");
        assert!(session_id > 0, "Session ID should be positive");

        let session = get_session_by_token(&pool, &token)
            .await
            .expect("Failed to get session");

        assert_eq!(session.user_id, account_id);
        assert_eq!(session.token, token);
        assert!(session.is_valid());

        let expires_diff =
            (session.expires_at.and_utc().timestamp() - expires_at.and_utc().timestamp()).abs();
        assert!(
            expires_diff <= 1,
            "Expiration timestamps should match within 1 second"
        );
    }

    #[rocket::async_test]
    async fn test_get_nonexistent_session() {
        let (_, _, _, pool) = create_test_session().await;

        let result = get_session_by_token(&pool, "does-not-exist").await;
        assert!(matches!(result, Err(AppError::Authentication(_))));
    }

    #[rocket::async_test]
    async fn test_invalidate_session() {
        let (account_id, token, expires_at, pool) = create_test_session().await;

        create_user_session(&pool, account_id, &token, expires_at)
            .await
            .expect("Failed to create session");

        invalidate_session(&pool, &token)
            .await
            .expect("Failed to invalidate session");

        assert!(get_session_by_token(&pool, &token).await.is_err());
    }

    #[rocket::async_test]
    async fn test_clean_expired_sessions() {
        let (account_id, token, expires_at, pool) = create_test_session().await;

        create_user_session(&pool, account_id, &token, expires_at)
            .await
            .expect("Failed to create live session");

        let expired_token = format!("expired_{}", Uuid::new_v4());
        let expired_at = (Utc::now() - Duration::hours(1)).naive_utc();
        create_user_session(&pool, account_id, &expired_token, expired_at)
            .await
            .expect("Failed to create expired session");

        let expired = get_session_by_token(&pool, &expired_token)
            .await
            .expect("Expired session row should still exist");
        assert!(!expired.is_valid());

        let removed = clean_expired_sessions(&pool)
            .await
            .expect("Failed to clean sessions");
        assert_eq!(removed, 1);

        assert!(get_session_by_token(&pool, &expired_token).await.is_err());
        assert!(get_session_by_token(&pool, &token).await.is_ok());
    }

    #[test]
    fn test_generated_tokens_are_unique() {
        let first = UserSession::generate_token();
        let second = UserSession::generate_token();

        assert_eq!(first.len(), 48);
        assert!(first.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(first, second);
    }
}
