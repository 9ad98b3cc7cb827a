/// User management endpoints (admin-scoped) plus user self-service
use crate::{
    account::{AccountUpdate, NewUser, UserQuery},
    api::validate_email,
    auth::{AdminAuth, Auth},
    context::AppContext,
    db::account::{Account, AccountKind, AccountStatus},
    error::{AppError, AppResult},
    password,
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

const GENERATED_PASSWORD_LENGTH: usize = 12;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/users", post(create_user).get(list_users))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/users/:id/toggle-status", patch(toggle_status))
        .route("/users/:id/reset-password", post(admin_reset_password))
        .route("/users/profile/me", get(my_profile).put(update_my_profile))
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub search: Option<String>,
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminResetPasswordRequest {
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMyProfileRequest {
    pub name: Option<String>,
}

/// POST /users — provision a user with a generated temp password
async fn create_user(
    State(ctx): State<AppContext>,
    AdminAuth(admin): AdminAuth,
    Json(req): Json<CreateUserRequest>,
) -> AppResult<Json<serde_json::Value>> {
    if req.name.trim().is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }
    validate_email(&req.email)?;

    let plan = ctx.account_store.plan_with_usage(admin.id).await?;
    if plan.current_users >= plan.max_users {
        return Err(AppError::Forbidden(format!(
            "Maximum user limit ({}) reached for {} plan",
            plan.max_users, plan.name
        )));
    }

    let temp_password = password::generate_password(GENERATED_PASSWORD_LENGTH);

    let user = ctx
        .account_store
        .create_user(NewUser {
            name: req.name.clone(),
            email: req.email.clone(),
            password: temp_password.clone(),
            created_by: admin.id,
        })
        .await?;

    ctx.mailer
        .send_credentials_email(&user.email, &req.name, &temp_password)
        .await;

    tracing::info!(user_id = user.id, admin_id = admin.id, "User provisioned");

    Ok(Json(json!({
        "success": true,
        "message": "User created successfully",
        "data": {
            "user": user,
            "temporaryPassword": temp_password,
        }
    })))
}

/// GET /users — paginated list, scoped to the calling admin
async fn list_users(
    State(ctx): State<AppContext>,
    AdminAuth(admin): AdminAuth,
    Query(query): Query<ListUsersQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let status = query
        .status
        .as_deref()
        .map(AccountStatus::from_str)
        .transpose()?;

    let page = ctx
        .account_store
        .list_users(
            admin.id,
            UserQuery {
                search: query.search,
                status,
                page: query.page.unwrap_or(1),
                limit: query.limit.unwrap_or(10),
            },
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "users": page.users,
            "pagination": {
                "total": page.total,
                "page": page.page,
                "pages": page.pages,
            }
        }
    })))
}

/// GET /users/:id
async fn get_user(
    State(ctx): State<AppContext>,
    AdminAuth(admin): AdminAuth,
    Path(id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    let user = owned_user(&ctx, &admin, id).await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "user": user,
        }
    })))
}

/// PUT /users/:id
async fn update_user(
    State(ctx): State<AppContext>,
    AdminAuth(admin): AdminAuth,
    Path(id): Path<i64>,
    Json(req): Json<UpdateUserRequest>,
) -> AppResult<Json<serde_json::Value>> {
    owned_user(&ctx, &admin, id).await?;

    if let Some(email) = &req.email {
        validate_email(email)?;

        if let Some(existing) = ctx
            .account_store
            .find_by_email(AccountKind::User, email, false)
            .await?
        {
            if existing.id != id {
                return Err(AppError::Conflict(
                    "User with this email already exists".to_string(),
                ));
            }
        }
    }

    let user = ctx
        .account_store
        .update(
            AccountKind::User,
            id,
            AccountUpdate {
                name: req.name,
                email: req.email,
                ..Default::default()
            },
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "User updated successfully",
        "data": {
            "user": user,
        }
    })))
}

/// DELETE /users/:id
async fn delete_user(
    State(ctx): State<AppContext>,
    AdminAuth(admin): AdminAuth,
    Path(id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    owned_user(&ctx, &admin, id).await?;

    ctx.account_store.delete_user(id).await?;

    tracing::info!(user_id = id, admin_id = admin.id, "User deleted");

    Ok(Json(json!({
        "success": true,
        "message": "User deleted successfully",
    })))
}

/// PATCH /users/:id/toggle-status
async fn toggle_status(
    State(ctx): State<AppContext>,
    AdminAuth(admin): AdminAuth,
    Path(id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    owned_user(&ctx, &admin, id).await?;

    let user = ctx.account_store.toggle_user_status(id).await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("User {}", match user.status {
            AccountStatus::Active => "activated",
            AccountStatus::Inactive => "deactivated",
        }),
        "data": {
            "user": user,
        }
    })))
}

/// POST /users/:id/reset-password — admin sets a new password directly.
/// The user is forced through a change on their next login.
async fn admin_reset_password(
    State(ctx): State<AppContext>,
    AdminAuth(admin): AdminAuth,
    Path(id): Path<i64>,
    Json(req): Json<AdminResetPasswordRequest>,
) -> AppResult<Json<serde_json::Value>> {
    owned_user(&ctx, &admin, id).await?;

    if !password::is_strong(&req.new_password) {
        let errors = password::password_errors(&req.new_password);
        return Err(AppError::Validation(format!(
            "Password does not meet requirements: {}",
            errors.join("; ")
        )));
    }

    ctx.account_store
        .update(
            AccountKind::User,
            id,
            AccountUpdate {
                password: Some(req.new_password),
                must_change_password: Some(true),
                refresh_token: Some(None),
                ..Default::default()
            },
        )
        .await?;

    tracing::info!(user_id = id, admin_id = admin.id, "Password reset by admin");

    Ok(Json(json!({
        "success": true,
        "message": "Password reset successfully",
    })))
}

/// GET /users/profile/me — any authenticated account
async fn my_profile(
    State(ctx): State<AppContext>,
    Auth(account): Auth,
) -> AppResult<Json<serde_json::Value>> {
    let account = ctx
        .account_store
        .require_by_id(account.kind, account.id, false)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "user": account,
        }
    })))
}

/// PUT /users/profile/me
async fn update_my_profile(
    State(ctx): State<AppContext>,
    Auth(account): Auth,
    Json(req): Json<UpdateMyProfileRequest>,
) -> AppResult<Json<serde_json::Value>> {
    // Only user rows carry a display name
    let name = match account.kind {
        AccountKind::User => req.name,
        AccountKind::Admin => None,
    };

    let account = ctx
        .account_store
        .update(
            account.kind,
            account.id,
            AccountUpdate {
                name,
                ..Default::default()
            },
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Profile updated successfully",
        "data": {
            "user": account,
        }
    })))
}

/// Load a user and verify it belongs to the calling admin
async fn owned_user(ctx: &AppContext, admin: &Account, id: i64) -> AppResult<Account> {
    let user = ctx
        .account_store
        .find_by_id(AccountKind::User, id, false)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if user.created_by != Some(admin.id) {
        return Err(AppError::Forbidden(
            "You do not have permission to perform this action".to_string(),
        ));
    }

    Ok(user)
}
