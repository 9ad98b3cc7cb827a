/// API routes and handlers
pub mod admin;
pub mod auth;
pub mod health;
pub mod middleware;
pub mod users;

use crate::context::AppContext;
use crate::error::{AppError, AppResult};
use axum::Router;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(auth::routes())
        .merge(admin::routes())
        .merge(users::routes())
        .merge(health::routes())
}

/// Minimal shape check for submitted email addresses
pub(crate) fn validate_email(email: &str) -> AppResult<()> {
    let valid = email.contains('@')
        && !email.starts_with('@')
        && !email.ends_with('@')
        && email.len() <= 254
        && !email.contains(char::is_whitespace);

    if !valid {
        return Err(AppError::Validation(
            "Please provide a valid email".to_string(),
        ));
    }

    Ok(())
}
