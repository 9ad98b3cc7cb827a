/// One-time code ledger for password recovery
///
/// At most one live code exists per (email, user type): issuing goes
/// through a single atomic upsert keyed on the store-level UNIQUE
/// constraint, so concurrent forgot-password requests cannot leave two
/// valid codes behind. Expiry is always re-checked on the request path;
/// the background sweep is housekeeping only.
use crate::{
    db::account::{AccountKind, OtpRecord},
    error::{AppError, AppResult},
    password,
};
use chrono::{Duration, Utc};
use sqlx::{Row, SqlitePool};

pub struct OtpLedger {
    db: SqlitePool,
    ttl: Duration,
}

impl OtpLedger {
    pub fn new(db: SqlitePool, ttl_minutes: i64) -> Self {
        Self {
            db,
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    /// Issue a fresh 6-digit code for (email, kind), replacing any prior
    /// record for that key in one statement. Returns the code for
    /// out-of-band delivery.
    pub async fn issue(&self, email: &str, kind: AccountKind) -> AppResult<String> {
        let code = password::generate_otp();
        let now = Utc::now();
        let expires_at = now + self.ttl;

        sqlx::query(
            "INSERT INTO otps (email, user_type, code, expires_at, verified, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)
             ON CONFLICT(email, user_type) DO UPDATE SET
                 code = excluded.code,
                 expires_at = excluded.expires_at,
                 verified = 0,
                 created_at = excluded.created_at",
        )
        .bind(email)
        .bind(kind.as_str())
        .bind(&code)
        .bind(expires_at)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(AppError::Database)?;

        Ok(code)
    }

    /// Look up an unverified record by (email, code, kind). The caller is
    /// responsible for the expiry check.
    pub async fn verify(
        &self,
        email: &str,
        code: &str,
        kind: AccountKind,
    ) -> AppResult<Option<OtpRecord>> {
        let record = sqlx::query_as::<_, OtpRecord>(
            "SELECT id, email, user_type, code, expires_at, verified, created_at
             FROM otps
             WHERE email = ?1 AND code = ?2 AND user_type = ?3 AND verified = 0",
        )
        .bind(email)
        .bind(code)
        .bind(kind.as_str())
        .fetch_optional(&self.db)
        .await
        .map_err(AppError::Database)?;

        Ok(record)
    }

    /// Find a verified record for (email, kind), if any
    pub async fn find_verified(
        &self,
        email: &str,
        kind: AccountKind,
    ) -> AppResult<Option<OtpRecord>> {
        let record = sqlx::query_as::<_, OtpRecord>(
            "SELECT id, email, user_type, code, expires_at, verified, created_at
             FROM otps
             WHERE email = ?1 AND user_type = ?2 AND verified = 1",
        )
        .bind(email)
        .bind(kind.as_str())
        .fetch_optional(&self.db)
        .await
        .map_err(AppError::Database)?;

        Ok(record)
    }

    /// Flip a record to verified. It stays valid as proof-of-identity
    /// until reset-password deletes it.
    pub async fn mark_verified(&self, id: i64) -> AppResult<()> {
        sqlx::query("UPDATE otps SET verified = 1 WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }

    /// Delete a record by id (reset completion or expiry on lookup)
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM otps WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }

    /// Sweep all records past their expiry. Returns the count deleted.
    pub async fn delete_expired(&self) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM otps WHERE expires_at < ?1")
            .bind(Utc::now())
            .execute(&self.db)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected())
    }

    /// Count live records (diagnostics)
    pub async fn live_count(&self) -> AppResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM otps WHERE expires_at >= ?1")
            .bind(Utc::now())
            .fetch_one(&self.db)
            .await
            .map_err(AppError::Database)?;

        Ok(row.try_get("n")?)
    }
}
