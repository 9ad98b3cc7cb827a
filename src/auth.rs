/// Authentication extractors and route gates
///
/// Every protected request re-loads its account from the store rather than
/// trusting token claims, so deactivation and password changes are visible
/// on the next request.
use crate::{
    api::middleware::extract_bearer_token,
    context::AppContext,
    db::account::{Account, Role},
    error::AppError,
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// Authenticated account of either kind
#[derive(Debug, Clone)]
pub struct Auth(pub Account);

#[async_trait]
impl FromRequestParts<AppContext> for Auth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)
            .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

        let account = state.account_manager.authenticate(&token).await?;

        Ok(Auth(account))
    }
}

/// Authenticated account with the admin or superadmin role
#[derive(Debug, Clone)]
pub struct AdminAuth(pub Account);

#[async_trait]
impl FromRequestParts<AppContext> for AdminAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let Auth(account) = Auth::from_request_parts(parts, state).await?;

        restrict_to(&account, &[Role::Admin, Role::SuperAdmin])?;

        Ok(AdminAuth(account))
    }
}

/// Reject with Forbidden unless the account's role is in the allowed set
pub fn restrict_to(account: &Account, roles: &[Role]) -> Result<(), AppError> {
    if !roles.contains(&account.role) {
        tracing::warn!(
            account_id = account.id,
            role = account.role.as_str(),
            "Role not permitted for this action"
        );
        return Err(AppError::Forbidden(
            "You do not have permission to perform this action".to_string(),
        ));
    }

    Ok(())
}

/// Block accounts still on a temp password from everything except the
/// change-password flow
pub fn require_password_current(account: &Account, path: &str) -> Result<(), AppError> {
    if account.must_change_password && path != "/auth/change-password" {
        return Err(AppError::PasswordChangeRequired);
    }

    Ok(())
}
