/// Background task implementations
use crate::{context::AppContext, error::AppResult};

/// Delete OTP records past their expiry
pub async fn cleanup_expired_otps(ctx: &AppContext) -> AppResult<u64> {
    ctx.otp_ledger.delete_expired().await
}

/// Health check - verify the database is reachable
pub async fn health_check(ctx: &AppContext) -> AppResult<()> {
    sqlx::query("SELECT 1").fetch_one(&ctx.db).await?;

    Ok(())
}
