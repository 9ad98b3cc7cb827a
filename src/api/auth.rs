/// Authentication endpoints: login, password lifecycle, logout
use crate::{
    api::validate_email,
    auth::Auth,
    context::AppContext,
    db::account::AccountKind,
    error::{AppError, AppResult},
};
use axum::{
    extract::State,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/auth/admin/login", post(admin_login))
        .route("/auth/user/login", post(user_login))
        .route("/auth/change-password", post(change_password))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/verify-otp", post(verify_otp))
        .route("/auth/reset-password", post(reset_password))
        .route("/auth/refresh-token", post(refresh_token))
        .route("/auth/logout", post(logout))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    pub email: String,
    pub user_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
    pub user_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: String,
    pub new_password: String,
    pub confirm_password: String,
    pub user_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// POST /auth/admin/login
async fn admin_login(
    State(ctx): State<AppContext>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<serde_json::Value>> {
    login(ctx, AccountKind::Admin, req).await
}

/// POST /auth/user/login
async fn user_login(
    State(ctx): State<AppContext>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<serde_json::Value>> {
    login(ctx, AccountKind::User, req).await
}

async fn login(
    ctx: AppContext,
    kind: AccountKind,
    req: LoginRequest,
) -> AppResult<Json<serde_json::Value>> {
    validate_email(&req.email)?;
    if req.password.is_empty() {
        return Err(AppError::Validation("Password is required".to_string()));
    }

    let outcome = ctx.account_manager.login(kind, &req.email, &req.password).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Login successful",
        "data": {
            "user": outcome.user,
            "token": outcome.tokens.token,
            "refreshToken": outcome.tokens.refresh_token,
            "mustChangePassword": outcome.must_change_password,
        }
    })))
}

/// POST /auth/change-password (bearer)
async fn change_password(
    State(ctx): State<AppContext>,
    Auth(account): Auth,
    Json(req): Json<ChangePasswordRequest>,
) -> AppResult<Json<serde_json::Value>> {
    if req.current_password.is_empty() {
        return Err(AppError::Validation(
            "Current password is required".to_string(),
        ));
    }

    let tokens = ctx
        .account_manager
        .change_password(
            &account,
            &req.current_password,
            &req.new_password,
            &req.confirm_password,
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Password changed successfully",
        "data": {
            "token": tokens.token,
            "refreshToken": tokens.refresh_token,
        }
    })))
}

/// POST /auth/forgot-password
async fn forgot_password(
    State(ctx): State<AppContext>,
    Json(req): Json<ForgotPasswordRequest>,
) -> AppResult<Json<serde_json::Value>> {
    validate_email(&req.email)?;
    let kind = AccountKind::from_str(&req.user_type)?;

    ctx.account_manager.forgot_password(&req.email, kind).await?;

    Ok(Json(json!({
        "success": true,
        "message": "OTP sent to your email",
    })))
}

/// POST /auth/verify-otp
async fn verify_otp(
    State(ctx): State<AppContext>,
    Json(req): Json<VerifyOtpRequest>,
) -> AppResult<Json<serde_json::Value>> {
    validate_email(&req.email)?;
    if req.otp.len() != 6 || !req.otp.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::Validation("OTP must be 6 digits".to_string()));
    }
    let kind = AccountKind::from_str(&req.user_type)?;

    let reset_token = ctx
        .account_manager
        .verify_otp(&req.email, &req.otp, kind)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "OTP verified successfully",
        "data": {
            "resetToken": reset_token,
        }
    })))
}

/// POST /auth/reset-password
async fn reset_password(
    State(ctx): State<AppContext>,
    Json(req): Json<ResetPasswordRequest>,
) -> AppResult<Json<serde_json::Value>> {
    validate_email(&req.email)?;
    let kind = AccountKind::from_str(&req.user_type)?;

    ctx.account_manager
        .reset_password(&req.email, &req.new_password, &req.confirm_password, kind)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Password reset successfully",
    })))
}

/// POST /auth/refresh-token
async fn refresh_token(
    State(ctx): State<AppContext>,
    Json(req): Json<RefreshTokenRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let tokens = ctx.account_manager.refresh_session(&req.refresh_token).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Session refreshed",
        "data": {
            "token": tokens.token,
            "refreshToken": tokens.refresh_token,
        }
    })))
}

/// POST /auth/logout (bearer)
async fn logout(
    State(ctx): State<AppContext>,
    Auth(account): Auth,
) -> AppResult<Json<serde_json::Value>> {
    ctx.account_manager.logout(&account).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Logged out successfully",
    })))
}
