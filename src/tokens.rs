/// Token issuance and verification
///
/// Three distinct token families, kept apart by type rather than by
/// convention: access tokens (short-lived bearer credential carrying the
/// subject and role), refresh tokens (long-lived, persisted on the account
/// row so logout can revoke them) and reset tokens (single-purpose, tagged
/// with the flow that minted them so a reset link can never stand in for a
/// session).
use crate::{
    config::AuthConfig,
    db::account::Role,
    error::{AppError, AppResult},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{rngs::OsRng, Rng};
use serde::{Deserialize, Serialize};

/// Claims carried by an access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: i64,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Claims carried by a refresh token. The role is embedded so a refresh
/// can resolve the right account table without a round-trip login. The
/// `jti` is a random per-issue id: timestamps have one-second granularity,
/// so without it two tokens minted in the same second would be
/// byte-identical and the persisted-token comparison could not revoke the
/// older one on rotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: i64,
    pub role: Role,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// Purpose tag for reset tokens. A token minted for one flow is rejected
/// by the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResetPurpose {
    #[serde(rename = "password-reset")]
    PasswordReset,
    #[serde(rename = "forgot-password-reset")]
    ForgotPasswordReset,
}

/// Claims carried by a reset token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetClaims {
    pub sub: i64,
    pub purpose: ResetPurpose,
    pub iat: i64,
    pub exp: i64,
}

/// Signs and verifies the three token families
#[derive(Clone)]
pub struct TokenService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
    reset_ttl: Duration,
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(config.jwt_refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(config.jwt_refresh_secret.as_bytes()),
            access_ttl: Duration::hours(config.access_token_hours),
            refresh_ttl: Duration::days(config.refresh_token_days),
            reset_ttl: Duration::minutes(config.reset_token_minutes),
        }
    }

    /// Issue a short-lived access token embedding subject and role
    pub fn issue_access_token(&self, subject: i64, role: Role) -> AppResult<String> {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: subject,
            role,
            iat: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.access_encoding)
            .map_err(|e| AppError::Internal(format!("Failed to sign access token: {}", e)))
    }

    /// Issue a long-lived refresh token; the caller persists it on the
    /// account row so logout can invalidate it
    pub fn issue_refresh_token(&self, subject: i64, role: Role) -> AppResult<String> {
        let now = Utc::now();
        let claims = RefreshClaims {
            sub: subject,
            role,
            jti: format!("{:032x}", OsRng.gen::<u128>()),
            iat: now.timestamp(),
            exp: (now + self.refresh_ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.refresh_encoding)
            .map_err(|e| AppError::Internal(format!("Failed to sign refresh token: {}", e)))
    }

    /// Issue a single-purpose reset token. Never persisted; validity is
    /// signature + expiry + purpose.
    pub fn issue_reset_token(&self, subject: i64, purpose: ResetPurpose) -> AppResult<String> {
        let now = Utc::now();
        let claims = ResetClaims {
            sub: subject,
            purpose,
            iat: now.timestamp(),
            exp: (now + self.reset_ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.access_encoding)
            .map_err(|e| AppError::Internal(format!("Failed to sign reset token: {}", e)))
    }

    /// Verify an access token, distinguishing expired from malformed
    pub fn verify_access_token(&self, token: &str) -> AppResult<AccessClaims> {
        decode::<AccessClaims>(token, &self.access_decoding, &validation())
            .map(|data| data.claims)
            .map_err(map_jwt_error)
    }

    /// Verify a refresh token
    pub fn verify_refresh_token(&self, token: &str) -> AppResult<RefreshClaims> {
        decode::<RefreshClaims>(token, &self.refresh_decoding, &validation())
            .map(|data| data.claims)
            .map_err(map_jwt_error)
    }

    /// Verify a reset token and check its purpose tag. A token minted for
    /// the other flow is rejected even when the signature is valid.
    pub fn verify_reset_token(
        &self,
        token: &str,
        expected: ResetPurpose,
    ) -> AppResult<ResetClaims> {
        let claims = decode::<ResetClaims>(token, &self.access_decoding, &validation())
            .map(|data| data.claims)
            .map_err(map_jwt_error)?;

        if claims.purpose != expected {
            return Err(AppError::Auth(
                "Token was not issued for this operation".to_string(),
            ));
        }

        Ok(claims)
    }
}

fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    // Allow some clock skew (1 minute)
    validation.leeway = 60;
    validation
}

fn map_jwt_error(e: jsonwebtoken::errors::Error) -> AppError {
    tracing::debug!("JWT verification failed: {}", e);
    match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            AppError::Auth("Token has expired".to_string())
        }
        jsonwebtoken::errors::ErrorKind::InvalidSignature => {
            AppError::Auth("Invalid token signature".to_string())
        }
        _ => AppError::Auth(format!("Invalid token: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;

    fn test_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-access-secret-test-access-secret!!!".to_string(),
            jwt_refresh_secret: "test-refresh-secret-test-refresh-secret!".to_string(),
            access_token_hours: 4,
            refresh_token_days: 14,
            reset_token_minutes: 15,
            otp_minutes: 10,
        }
    }

    #[test]
    fn access_token_roundtrip() {
        let svc = TokenService::new(&test_config());
        let token = svc.issue_access_token(42, Role::Admin).unwrap();
        let claims = svc.verify_access_token(&token).unwrap();

        assert_eq!(claims.sub, 42);
        assert_eq!(claims.role, Role::Admin);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let svc = TokenService::new(&test_config());
        let refresh = svc.issue_refresh_token(42, Role::User).unwrap();

        // Different secret, so the signature check fails
        assert!(svc.verify_access_token(&refresh).is_err());
    }

    #[test]
    fn refresh_tokens_minted_in_the_same_second_are_distinct() {
        let svc = TokenService::new(&test_config());

        // Back-to-back issues share sub, role, iat and exp; only the
        // random jti keeps them apart, and rotation depends on that
        let a = svc.issue_refresh_token(42, Role::User).unwrap();
        let b = svc.issue_refresh_token(42, Role::User).unwrap();
        assert_ne!(a, b);

        let a = svc.verify_refresh_token(&a).unwrap();
        let b = svc.verify_refresh_token(&b).unwrap();
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn reset_token_purpose_is_enforced() {
        let svc = TokenService::new(&test_config());
        let token = svc
            .issue_reset_token(7, ResetPurpose::ForgotPasswordReset)
            .unwrap();

        assert!(svc
            .verify_reset_token(&token, ResetPurpose::ForgotPasswordReset)
            .is_ok());
        assert!(svc
            .verify_reset_token(&token, ResetPurpose::PasswordReset)
            .is_err());
    }

    #[test]
    fn reset_token_is_not_an_access_token() {
        let svc = TokenService::new(&test_config());
        let token = svc
            .issue_reset_token(7, ResetPurpose::PasswordReset)
            .unwrap();

        // Same signing key as access tokens, but the claim shape differs:
        // a reset token must never be accepted where a session is expected
        assert!(svc.verify_access_token(&token).is_err());
    }

    #[test]
    fn garbage_token_is_rejected() {
        let svc = TokenService::new(&test_config());
        assert!(svc.verify_access_token("not.a.jwt").is_err());
    }
}
