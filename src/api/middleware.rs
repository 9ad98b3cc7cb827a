/// Request middleware shared across the API
use crate::{context::AppContext, error::AppError};
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

/// Forced-rotation gate
///
/// When a request carries a valid bearer for an account still on a temp
/// password, everything except the change-password route is rejected.
/// Requests without (or with invalid) auth pass through; the extractors
/// handle those.
pub async fn check_password_change(
    State(ctx): State<AppContext>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(token) = extract_bearer_token(req.headers()) {
        if let Ok(account) = ctx.account_manager.authenticate(&token).await {
            crate::auth::require_password_current(&account, req.uri().path())?;
        }
    }

    Ok(next.run(req).await)
}
