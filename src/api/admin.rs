/// Admin account endpoints: registration, profile, plan
use crate::{
    account::NewAdmin,
    api::validate_email,
    auth::AdminAuth,
    context::AppContext,
    db::account::AccountKind,
    error::{AppError, AppResult},
    password,
};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/admin/register", post(register))
        .route("/admin/profile", get(get_profile).put(update_profile))
        .route("/admin/plan", get(get_plan))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub email: Option<String>,
}

/// POST /admin/register
async fn register(
    State(ctx): State<AppContext>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<Json<serde_json::Value>> {
    validate_email(&req.email)?;

    if !password::is_strong(&req.password) {
        let errors = password::password_errors(&req.password);
        return Err(AppError::Validation(format!(
            "Password does not meet requirements: {}",
            errors.join("; ")
        )));
    }

    if req.password != req.confirm_password {
        return Err(AppError::Validation("Passwords do not match".to_string()));
    }

    let admin = ctx
        .account_store
        .create_admin(NewAdmin {
            email: req.email,
            password: req.password,
        })
        .await?;

    tracing::info!(admin_id = admin.id, "Admin registered");

    Ok(Json(json!({
        "success": true,
        "message": "Admin registered successfully",
        "data": {
            "admin": admin,
        }
    })))
}

/// GET /admin/profile
async fn get_profile(
    State(ctx): State<AppContext>,
    AdminAuth(admin): AdminAuth,
) -> AppResult<Json<serde_json::Value>> {
    let admin = ctx
        .account_store
        .require_by_id(AccountKind::Admin, admin.id, false)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "admin": admin,
        }
    })))
}

/// PUT /admin/profile
async fn update_profile(
    State(ctx): State<AppContext>,
    AdminAuth(admin): AdminAuth,
    Json(req): Json<UpdateProfileRequest>,
) -> AppResult<Json<serde_json::Value>> {
    if let Some(email) = &req.email {
        validate_email(email)?;

        if let Some(existing) = ctx
            .account_store
            .find_by_email(AccountKind::Admin, email, false)
            .await?
        {
            if existing.id != admin.id {
                return Err(AppError::Conflict(
                    "Admin with this email already exists".to_string(),
                ));
            }
        }
    }

    let admin = ctx
        .account_store
        .update(
            AccountKind::Admin,
            admin.id,
            crate::account::AccountUpdate {
                email: req.email,
                ..Default::default()
            },
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Profile updated successfully",
        "data": {
            "admin": admin,
        }
    })))
}

/// GET /admin/plan
async fn get_plan(
    State(ctx): State<AppContext>,
    AdminAuth(admin): AdminAuth,
) -> AppResult<Json<serde_json::Value>> {
    let plan = ctx.account_store.plan_with_usage(admin.id).await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "plan": plan,
        }
    })))
}
