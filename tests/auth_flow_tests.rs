/// End-to-end tests for the login, password-change and recovery flows,
/// run against the real service wiring over an in-memory database.
use leadflow::{
    account::{NewAdmin, NewUser},
    auth::require_password_current,
    config::{
        AuthConfig, LoggingConfig, ServerConfig, ServiceConfig, StorageConfig,
    },
    context::AppContext,
    db::{self, account::AccountKind},
    tokens::ResetPurpose,
};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::Row;

fn test_config() -> ServerConfig {
    ServerConfig {
        service: ServiceConfig {
            hostname: "localhost".to_string(),
            port: 0,
            version: "test".to_string(),
        },
        storage: StorageConfig {
            data_directory: ":memory:".into(),
            database: ":memory:".into(),
        },
        authentication: AuthConfig {
            jwt_secret: "test-access-secret-test-access-secret!!!".to_string(),
            jwt_refresh_secret: "test-refresh-secret-test-refresh-secret!".to_string(),
            access_token_hours: 4,
            refresh_token_days: 14,
            reset_token_minutes: 15,
            otp_minutes: 10,
        },
        email: None,
        logging: LoggingConfig {
            level: "debug".to_string(),
        },
    }
}

/// In-memory pool must stay on a single connection: each connection to
/// sqlite::memory: is its own database.
async fn test_context() -> AppContext {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::run_migrations(&pool).await.unwrap();

    AppContext::from_parts(test_config(), pool).unwrap()
}

async fn register_admin(ctx: &AppContext, email: &str, password: &str) -> i64 {
    ctx.account_store
        .create_admin(NewAdmin {
            email: email.to_string(),
            password: password.to_string(),
        })
        .await
        .unwrap()
        .id
}

async fn stored_otp_code(ctx: &AppContext, email: &str) -> String {
    sqlx::query("SELECT code FROM otps WHERE email = ?1")
        .bind(email)
        .fetch_one(&ctx.db)
        .await
        .unwrap()
        .get("code")
}

#[tokio::test]
async fn admin_can_register_and_login() {
    let ctx = test_context().await;
    let id = register_admin(&ctx, "owner@example.com", "Str0ng!Pass").await;

    let outcome = ctx
        .account_manager
        .login(AccountKind::Admin, "owner@example.com", "Str0ng!Pass")
        .await
        .unwrap();

    assert_eq!(outcome.user.id, id);
    assert!(!outcome.must_change_password);

    let claims = ctx
        .token_service
        .verify_access_token(&outcome.tokens.token)
        .unwrap();
    assert_eq!(claims.sub, id);
    assert_eq!(claims.role, leadflow::db::account::Role::Admin);
}

#[tokio::test]
async fn wrong_password_and_unknown_email_report_the_same_error() {
    let ctx = test_context().await;
    register_admin(&ctx, "owner@example.com", "Str0ng!Pass").await;

    let wrong_password = ctx
        .account_manager
        .login(AccountKind::Admin, "owner@example.com", "WrongPass1!")
        .await
        .unwrap_err();
    let unknown_email = ctx
        .account_manager
        .login(AccountKind::Admin, "nobody@example.com", "Str0ng!Pass")
        .await
        .unwrap_err();

    assert_eq!(wrong_password.to_string(), "Invalid credentials");
    assert_eq!(unknown_email.to_string(), "Invalid credentials");
}

#[tokio::test]
async fn deactivated_user_cannot_login() {
    let ctx = test_context().await;
    let admin_id = register_admin(&ctx, "owner@example.com", "Str0ng!Pass").await;

    let user = ctx
        .account_store
        .create_user(NewUser {
            name: "Pat".to_string(),
            email: "pat@example.com".to_string(),
            password: "Temp0rary!Pw".to_string(),
            created_by: admin_id,
        })
        .await
        .unwrap();

    ctx.account_store.toggle_user_status(user.id).await.unwrap();

    let err = ctx
        .account_manager
        .login(AccountKind::User, "pat@example.com", "Temp0rary!Pw")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Your account has been deactivated");
}

#[tokio::test]
async fn provisioned_user_is_held_to_the_change_password_route() {
    let ctx = test_context().await;
    let admin_id = register_admin(&ctx, "owner@example.com", "Str0ng!Pass").await;

    ctx.account_store
        .create_user(NewUser {
            name: "Pat".to_string(),
            email: "pat@example.com".to_string(),
            password: "Temp0rary!Pw".to_string(),
            created_by: admin_id,
        })
        .await
        .unwrap();

    let outcome = ctx
        .account_manager
        .login(AccountKind::User, "pat@example.com", "Temp0rary!Pw")
        .await
        .unwrap();
    assert!(outcome.must_change_password);

    assert!(require_password_current(&outcome.user, "/users/profile/me").is_err());
    assert!(require_password_current(&outcome.user, "/auth/change-password").is_ok());
}

#[tokio::test]
async fn change_password_validates_input() {
    let ctx = test_context().await;
    register_admin(&ctx, "owner@example.com", "Str0ng!Pass").await;

    let outcome = ctx
        .account_manager
        .login(AccountKind::Admin, "owner@example.com", "Str0ng!Pass")
        .await
        .unwrap();
    let account = &outcome.user;

    let err = ctx
        .account_manager
        .change_password(account, "NotCurrent1!", "N3w!Password", "N3w!Password")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Current password is incorrect");

    let err = ctx
        .account_manager
        .change_password(account, "Str0ng!Pass", "weak", "weak")
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("Password does not meet requirements"));

    let err = ctx
        .account_manager
        .change_password(account, "Str0ng!Pass", "N3w!Password", "Different1!")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Passwords do not match");

    let err = ctx
        .account_manager
        .change_password(account, "Str0ng!Pass", "Str0ng!Pass", "Str0ng!Pass")
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "New password must be different from current password"
    );
}

#[tokio::test]
async fn change_password_clears_the_rotation_flag() {
    let ctx = test_context().await;
    let admin_id = register_admin(&ctx, "owner@example.com", "Str0ng!Pass").await;

    ctx.account_store
        .create_user(NewUser {
            name: "Pat".to_string(),
            email: "pat@example.com".to_string(),
            password: "Temp0rary!Pw".to_string(),
            created_by: admin_id,
        })
        .await
        .unwrap();

    let outcome = ctx
        .account_manager
        .login(AccountKind::User, "pat@example.com", "Temp0rary!Pw")
        .await
        .unwrap();
    assert!(outcome.must_change_password);

    ctx.account_manager
        .change_password(&outcome.user, "Temp0rary!Pw", "N3w!Password", "N3w!Password")
        .await
        .unwrap();

    let outcome = ctx
        .account_manager
        .login(AccountKind::User, "pat@example.com", "N3w!Password")
        .await
        .unwrap();
    assert!(!outcome.must_change_password);

    // Old password no longer works
    let err = ctx
        .account_manager
        .login(AccountKind::User, "pat@example.com", "Temp0rary!Pw")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid credentials");
}

#[tokio::test]
async fn stale_access_token_is_rejected_after_password_change() {
    let ctx = test_context().await;
    register_admin(&ctx, "owner@example.com", "Str0ng!Pass").await;

    let outcome = ctx
        .account_manager
        .login(AccountKind::Admin, "owner@example.com", "Str0ng!Pass")
        .await
        .unwrap();
    let old_token = outcome.tokens.token.clone();

    // The staleness check has one-second granularity
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

    let new_tokens = ctx
        .account_manager
        .change_password(&outcome.user, "Str0ng!Pass", "N3w!Password", "N3w!Password")
        .await
        .unwrap();

    let err = ctx.account_manager.authenticate(&old_token).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Password recently changed. Please log in again"
    );

    // The pair issued by the change itself stays valid
    assert!(ctx.account_manager.authenticate(&new_tokens.token).await.is_ok());
}

#[tokio::test]
async fn forgot_password_requires_a_known_account() {
    let ctx = test_context().await;

    let err = ctx
        .account_manager
        .forgot_password("nobody@example.com", AccountKind::Admin)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "No account found with this email");
}

#[tokio::test]
async fn full_recovery_flow_resets_the_password() {
    let ctx = test_context().await;
    register_admin(&ctx, "owner@example.com", "Str0ng!Pass").await;

    ctx.account_manager
        .forgot_password("owner@example.com", AccountKind::Admin)
        .await
        .unwrap();
    let code = stored_otp_code(&ctx, "owner@example.com").await;

    let wrong = if code == "000000" { "000001" } else { "000000" };
    let err = ctx
        .account_manager
        .verify_otp("owner@example.com", wrong, AccountKind::Admin)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid or expired OTP");

    let reset_token = ctx
        .account_manager
        .verify_otp("owner@example.com", &code, AccountKind::Admin)
        .await
        .unwrap();

    // The token is tagged for the recovery flow only
    assert!(ctx
        .token_service
        .verify_reset_token(&reset_token, ResetPurpose::ForgotPasswordReset)
        .is_ok());
    assert!(ctx
        .token_service
        .verify_reset_token(&reset_token, ResetPurpose::PasswordReset)
        .is_err());

    ctx.account_manager
        .reset_password(
            "owner@example.com",
            "Rec0vered!Pw",
            "Rec0vered!Pw",
            AccountKind::Admin,
        )
        .await
        .unwrap();

    assert!(ctx
        .account_manager
        .login(AccountKind::Admin, "owner@example.com", "Rec0vered!Pw")
        .await
        .is_ok());
}

#[tokio::test]
async fn reset_without_a_verified_otp_fails() {
    let ctx = test_context().await;
    register_admin(&ctx, "owner@example.com", "Str0ng!Pass").await;

    let err = ctx
        .account_manager
        .reset_password(
            "owner@example.com",
            "Rec0vered!Pw",
            "Rec0vered!Pw",
            AccountKind::Admin,
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Please verify OTP first");

    // Requesting a code without verifying it is not enough either
    ctx.account_manager
        .forgot_password("owner@example.com", AccountKind::Admin)
        .await
        .unwrap();

    let err = ctx
        .account_manager
        .reset_password(
            "owner@example.com",
            "Rec0vered!Pw",
            "Rec0vered!Pw",
            AccountKind::Admin,
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Please verify OTP first");
}

#[tokio::test]
async fn reissuing_an_otp_invalidates_the_previous_code() {
    let ctx = test_context().await;
    register_admin(&ctx, "owner@example.com", "Str0ng!Pass").await;

    let first = ctx
        .otp_ledger
        .issue("owner@example.com", AccountKind::Admin)
        .await
        .unwrap();
    let second = ctx
        .otp_ledger
        .issue("owner@example.com", AccountKind::Admin)
        .await
        .unwrap();

    if first != second {
        let err = ctx
            .account_manager
            .verify_otp("owner@example.com", &first, AccountKind::Admin)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid or expired OTP");
    }

    assert!(ctx
        .account_manager
        .verify_otp("owner@example.com", &second, AccountKind::Admin)
        .await
        .is_ok());

    // Only one record exists per (email, kind)
    let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM otps WHERE email = ?1")
        .bind("owner@example.com")
        .fetch_one(&ctx.db)
        .await
        .unwrap()
        .get("n");
    assert_eq!(count, 1);
}

#[tokio::test]
async fn otp_is_single_use_once_the_reset_completes() {
    let ctx = test_context().await;
    register_admin(&ctx, "owner@example.com", "Str0ng!Pass").await;

    ctx.account_manager
        .forgot_password("owner@example.com", AccountKind::Admin)
        .await
        .unwrap();
    let code = stored_otp_code(&ctx, "owner@example.com").await;

    ctx.account_manager
        .verify_otp("owner@example.com", &code, AccountKind::Admin)
        .await
        .unwrap();
    ctx.account_manager
        .reset_password(
            "owner@example.com",
            "Rec0vered!Pw",
            "Rec0vered!Pw",
            AccountKind::Admin,
        )
        .await
        .unwrap();

    // The verified record died with the reset
    let err = ctx
        .account_manager
        .reset_password(
            "owner@example.com",
            "An0ther!Pw99",
            "An0ther!Pw99",
            AccountKind::Admin,
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Please verify OTP first");

    let err = ctx
        .account_manager
        .verify_otp("owner@example.com", &code, AccountKind::Admin)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid or expired OTP");
}

#[tokio::test]
async fn expired_otp_is_rejected_and_removed() {
    let ctx = test_context().await;
    register_admin(&ctx, "owner@example.com", "Str0ng!Pass").await;

    ctx.account_manager
        .forgot_password("owner@example.com", AccountKind::Admin)
        .await
        .unwrap();
    let code = stored_otp_code(&ctx, "owner@example.com").await;

    sqlx::query("UPDATE otps SET expires_at = datetime('now', '-1 minute')")
        .execute(&ctx.db)
        .await
        .unwrap();

    let err = ctx
        .account_manager
        .verify_otp("owner@example.com", &code, AccountKind::Admin)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "OTP has expired");

    let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM otps")
        .fetch_one(&ctx.db)
        .await
        .unwrap()
        .get("n");
    assert_eq!(count, 0);
}

#[tokio::test]
async fn expired_otp_sweep_only_touches_expired_rows() {
    let ctx = test_context().await;
    register_admin(&ctx, "owner@example.com", "Str0ng!Pass").await;

    ctx.otp_ledger
        .issue("owner@example.com", AccountKind::Admin)
        .await
        .unwrap();
    ctx.otp_ledger
        .issue("other@example.com", AccountKind::User)
        .await
        .unwrap();

    sqlx::query("UPDATE otps SET expires_at = datetime('now', '-1 minute') WHERE email = ?1")
        .bind("other@example.com")
        .execute(&ctx.db)
        .await
        .unwrap();

    let deleted = ctx.otp_ledger.delete_expired().await.unwrap();
    assert_eq!(deleted, 1);
    assert_eq!(ctx.otp_ledger.live_count().await.unwrap(), 1);
}

#[tokio::test]
async fn refresh_rotates_and_logout_revokes() {
    let ctx = test_context().await;
    register_admin(&ctx, "owner@example.com", "Str0ng!Pass").await;

    let outcome = ctx
        .account_manager
        .login(AccountKind::Admin, "owner@example.com", "Str0ng!Pass")
        .await
        .unwrap();
    let first_refresh = outcome.tokens.refresh_token.clone();

    let rotated = ctx
        .account_manager
        .refresh_session(&first_refresh)
        .await
        .unwrap();

    // The old refresh token no longer matches the persisted one
    let err = ctx
        .account_manager
        .refresh_session(&first_refresh)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid refresh token");

    ctx.account_manager.logout(&outcome.user).await.unwrap();

    let err = ctx
        .account_manager
        .refresh_session(&rotated.refresh_token)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid refresh token");
}

#[tokio::test]
async fn authenticate_sees_deactivation_immediately() {
    let ctx = test_context().await;
    let admin_id = register_admin(&ctx, "owner@example.com", "Str0ng!Pass").await;

    let user = ctx
        .account_store
        .create_user(NewUser {
            name: "Pat".to_string(),
            email: "pat@example.com".to_string(),
            password: "Temp0rary!Pw".to_string(),
            created_by: admin_id,
        })
        .await
        .unwrap();

    let outcome = ctx
        .account_manager
        .login(AccountKind::User, "pat@example.com", "Temp0rary!Pw")
        .await
        .unwrap();

    assert!(ctx
        .account_manager
        .authenticate(&outcome.tokens.token)
        .await
        .is_ok());

    ctx.account_store.toggle_user_status(user.id).await.unwrap();

    // The token itself is still valid; the fresh reload is what rejects
    let err = ctx
        .account_manager
        .authenticate(&outcome.tokens.token)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Your account has been deactivated");
}
