/// Login, password-lifecycle and session state machines
///
/// Composes the credential store, OTP ledger, token service and mailer.
/// Credential-guessing paths return one generic message for both unknown
/// email and wrong password; forgot-password deliberately reveals account
/// existence (inherited behavior, kept as-is).
use crate::{
    account::{AccountStore, AccountUpdate, AuthTokens, LoginOutcome},
    db::account::{Account, AccountKind},
    error::{AppError, AppResult},
    mailer::Mailer,
    otp::OtpLedger,
    password,
    tokens::{ResetPurpose, TokenService},
};
use chrono::Utc;
use std::sync::Arc;

pub struct AccountManager {
    store: Arc<AccountStore>,
    otps: Arc<OtpLedger>,
    tokens: Arc<TokenService>,
    mailer: Arc<Mailer>,
}

impl AccountManager {
    pub fn new(
        store: Arc<AccountStore>,
        otps: Arc<OtpLedger>,
        tokens: Arc<TokenService>,
        mailer: Arc<Mailer>,
    ) -> Self {
        Self {
            store,
            otps,
            tokens,
            mailer,
        }
    }

    /// Authenticate by email and password, same shape for both kinds.
    ///
    /// Unknown email and wrong password produce the identical generic
    /// error. The deactivated check runs only after the password matched,
    /// so the distinct message leaks nothing new.
    pub async fn login(
        &self,
        kind: AccountKind,
        email: &str,
        submitted_password: &str,
    ) -> AppResult<LoginOutcome> {
        let account = self
            .store
            .find_by_email(kind, email, true)
            .await?
            .ok_or_else(AppError::invalid_credentials)?;

        let hash = account
            .password_hash
            .as_deref()
            .ok_or_else(AppError::invalid_credentials)?;

        if !password::verify_password(submitted_password, hash)? {
            return Err(AppError::invalid_credentials());
        }

        if !account.is_active() {
            return Err(AppError::Auth(
                "Your account has been deactivated".to_string(),
            ));
        }

        let tokens = self.issue_token_pair(&account).await?;

        let account = self
            .store
            .update(
                kind,
                account.id,
                AccountUpdate {
                    last_login: Some(Utc::now()),
                    refresh_token: Some(Some(tokens.refresh_token.clone())),
                    ..Default::default()
                },
            )
            .await?;

        tracing::info!(account_id = account.id, kind = kind.as_str(), "Login successful");

        let must_change_password = account.must_change_password;

        Ok(LoginOutcome {
            user: account,
            tokens,
            must_change_password,
        })
    }

    /// Change the authenticated account's password. Requires the current
    /// password; the new one must pass policy, differ from the current and
    /// match its confirmation.
    pub async fn change_password(
        &self,
        account: &Account,
        current_password: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> AppResult<AuthTokens> {
        let stored = self
            .store
            .require_by_id(account.kind, account.id, true)
            .await?;
        let hash = stored
            .password_hash
            .as_deref()
            .ok_or_else(|| AppError::Internal("Account row is missing its hash".to_string()))?;

        if !password::verify_password(current_password, hash)? {
            return Err(AppError::Validation(
                "Current password is incorrect".to_string(),
            ));
        }

        validate_new_password(new_password, confirm_password)?;

        if current_password == new_password {
            return Err(AppError::Validation(
                "New password must be different from current password".to_string(),
            ));
        }

        // Commit the password first so the new pair's issued-at is never
        // behind password_changed_at
        self.store
            .update(
                account.kind,
                account.id,
                AccountUpdate {
                    password: Some(new_password.to_string()),
                    must_change_password: Some(false),
                    ..Default::default()
                },
            )
            .await?;

        let tokens = self.issue_token_pair(&stored).await?;

        self.store
            .update(
                account.kind,
                account.id,
                AccountUpdate {
                    refresh_token: Some(Some(tokens.refresh_token.clone())),
                    ..Default::default()
                },
            )
            .await?;

        // Courtesy notification; a delivery failure must not undo the
        // committed change
        self.mailer
            .send_password_changed_email(&stored.email, stored.name.as_deref())
            .await;

        tracing::info!(account_id = account.id, "Password changed");

        Ok(tokens)
    }

    /// Step 1 of recovery: issue an OTP and deliver it by email. Reveals
    /// account existence via NotFound, unlike login.
    pub async fn forgot_password(&self, email: &str, kind: AccountKind) -> AppResult<()> {
        let account = self
            .store
            .find_by_email(kind, email, false)
            .await?
            .ok_or_else(|| AppError::NotFound("No account found with this email".to_string()))?;

        let code = self.otps.issue(&account.email, kind).await?;

        self.mailer.send_otp_email(&account.email, &code).await;

        tracing::info!(kind = kind.as_str(), "Password reset OTP issued");

        Ok(())
    }

    /// Step 2: check the submitted code. On success the record is marked
    /// verified and a single-purpose reset token is returned so the client
    /// can carry proof into step 3.
    pub async fn verify_otp(
        &self,
        email: &str,
        code: &str,
        kind: AccountKind,
    ) -> AppResult<String> {
        let record = self
            .otps
            .verify(email, code, kind)
            .await?
            .ok_or_else(|| AppError::Validation("Invalid or expired OTP".to_string()))?;

        if record.is_expired() {
            self.otps.delete(record.id).await?;
            return Err(AppError::Validation("OTP has expired".to_string()));
        }

        self.otps.mark_verified(record.id).await?;

        let account = self
            .store
            .find_by_email(kind, email, false)
            .await?
            .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;

        self.tokens
            .issue_reset_token(account.id, ResetPurpose::ForgotPasswordReset)
    }

    /// Step 3: set the new password. Fails closed unless a verified OTP
    /// record exists for (email, kind); deletes the record on success so
    /// the code cannot be replayed.
    pub async fn reset_password(
        &self,
        email: &str,
        new_password: &str,
        confirm_password: &str,
        kind: AccountKind,
    ) -> AppResult<()> {
        let record = self
            .otps
            .find_verified(email, kind)
            .await?
            .ok_or_else(|| AppError::Validation("Please verify OTP first".to_string()))?;

        validate_new_password(new_password, confirm_password)?;

        let account = self
            .store
            .find_by_email(kind, email, false)
            .await?
            .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;

        self.store
            .update(
                kind,
                account.id,
                AccountUpdate {
                    password: Some(new_password.to_string()),
                    must_change_password: match kind {
                        AccountKind::User => Some(false),
                        AccountKind::Admin => None,
                    },
                    ..Default::default()
                },
            )
            .await?;

        // Single-use: the verified record dies with the reset
        self.otps.delete(record.id).await?;

        self.mailer
            .send_password_changed_email(&account.email, account.name.as_deref())
            .await;

        tracing::info!(account_id = account.id, kind = kind.as_str(), "Password reset completed");

        Ok(())
    }

    /// Mint a new token pair from a refresh token. The submitted token
    /// must match the one persisted on the account row, so logout and
    /// rotation both invalidate older refresh tokens.
    pub async fn refresh_session(&self, refresh_token: &str) -> AppResult<AuthTokens> {
        let claims = self.tokens.verify_refresh_token(refresh_token)?;
        let kind = claims.role.kind();

        let account = self
            .store
            .find_by_id(kind, claims.sub, false)
            .await?
            .ok_or_else(|| AppError::Auth("Invalid refresh token".to_string()))?;

        if account.refresh_token.as_deref() != Some(refresh_token) {
            return Err(AppError::Auth("Invalid refresh token".to_string()));
        }

        if !account.is_active() {
            return Err(AppError::Auth(
                "Your account has been deactivated".to_string(),
            ));
        }

        let tokens = self.issue_token_pair(&account).await?;

        self.store
            .update(
                kind,
                account.id,
                AccountUpdate {
                    refresh_token: Some(Some(tokens.refresh_token.clone())),
                    ..Default::default()
                },
            )
            .await?;

        Ok(tokens)
    }

    /// Clear the persisted refresh token. The access token stays valid
    /// until natural expiry; stateless tokens cannot be revoked early.
    pub async fn logout(&self, account: &Account) -> AppResult<()> {
        self.store
            .update(
                account.kind,
                account.id,
                AccountUpdate {
                    refresh_token: Some(None),
                    ..Default::default()
                },
            )
            .await?;

        tracing::info!(account_id = account.id, "Logged out");

        Ok(())
    }

    /// Per-request access gate: verify the bearer token, then re-load the
    /// account so deactivation and password changes take effect on the
    /// very next request instead of at token expiry.
    pub async fn authenticate(&self, token: &str) -> AppResult<Account> {
        let claims = self.tokens.verify_access_token(token)?;
        let kind = claims.role.kind();

        let account = self
            .store
            .find_by_id(kind, claims.sub, false)
            .await?
            .ok_or_else(|| AppError::Auth("Account no longer exists".to_string()))?;

        if !account.is_active() {
            return Err(AppError::Auth(
                "Your account has been deactivated".to_string(),
            ));
        }

        if account.password_changed_after(claims.iat) {
            return Err(AppError::Auth(
                "Password recently changed. Please log in again".to_string(),
            ));
        }

        Ok(account)
    }

    async fn issue_token_pair(&self, account: &Account) -> AppResult<AuthTokens> {
        Ok(AuthTokens {
            token: self.tokens.issue_access_token(account.id, account.role)?,
            refresh_token: self
                .tokens
                .issue_refresh_token(account.id, account.role)?,
        })
    }
}

fn validate_new_password(new_password: &str, confirm_password: &str) -> AppResult<()> {
    if !password::is_strong(new_password) {
        let errors = password::password_errors(new_password);
        return Err(AppError::Validation(format!(
            "Password does not meet requirements: {}",
            errors.join("; ")
        )));
    }

    if new_password != confirm_password {
        return Err(AppError::Validation("Passwords do not match".to_string()));
    }

    Ok(())
}
