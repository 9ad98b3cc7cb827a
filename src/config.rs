/// Configuration management for the Leadflow backend
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub email: Option<EmailConfig>,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
}

/// Authentication and token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_refresh_secret: String,
    /// Access token lifetime in hours. Kept short on purpose: a stolen
    /// access token cannot be revoked before its natural expiry.
    pub access_token_hours: i64,
    /// Refresh token lifetime in days
    pub refresh_token_days: i64,
    /// Reset token lifetime in minutes
    pub reset_token_minutes: i64,
    /// OTP lifetime in minutes
    pub otp_minutes: i64,
}

/// Email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_url: String,
    pub from_address: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("LEADFLOW_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("LEADFLOW_PORT")
            .unwrap_or_else(|_| "4000".to_string())
            .parse()
            .map_err(|_| AppError::Validation("Invalid port number".to_string()))?;
        let version = env::var("LEADFLOW_VERSION").unwrap_or_else(|_| "0.1.0".to_string());

        let data_directory: PathBuf = env::var("LEADFLOW_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("LEADFLOW_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("leadflow.sqlite"));

        let jwt_secret = env::var("LEADFLOW_JWT_SECRET")
            .map_err(|_| AppError::Validation("JWT secret required".to_string()))?;
        let jwt_refresh_secret = env::var("LEADFLOW_JWT_REFRESH_SECRET")
            .map_err(|_| AppError::Validation("JWT refresh secret required".to_string()))?;

        let access_token_hours = env::var("LEADFLOW_ACCESS_TOKEN_HOURS")
            .unwrap_or_else(|_| "4".to_string())
            .parse()
            .unwrap_or(4);
        let refresh_token_days = env::var("LEADFLOW_REFRESH_TOKEN_DAYS")
            .unwrap_or_else(|_| "14".to_string())
            .parse()
            .unwrap_or(14);
        let reset_token_minutes = env::var("LEADFLOW_RESET_TOKEN_MINUTES")
            .unwrap_or_else(|_| "15".to_string())
            .parse()
            .unwrap_or(15);
        let otp_minutes = env::var("LEADFLOW_OTP_MINUTES")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        let email = if let Ok(smtp_url) = env::var("LEADFLOW_EMAIL_SMTP_URL") {
            Some(EmailConfig {
                smtp_url,
                from_address: env::var("LEADFLOW_EMAIL_FROM_ADDRESS")
                    .unwrap_or_else(|_| format!("noreply@{}", hostname)),
            })
        } else {
            None
        };

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
            },
            storage: StorageConfig {
                data_directory,
                database,
            },
            authentication: AuthConfig {
                jwt_secret,
                jwt_refresh_secret,
                access_token_hours,
                refresh_token_days,
                reset_token_minutes,
                otp_minutes,
            },
            email,
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.service.hostname.is_empty() {
            return Err(AppError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(AppError::Validation(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if self.authentication.jwt_refresh_secret.len() < 32 {
            return Err(AppError::Validation(
                "JWT refresh secret must be at least 32 characters".to_string(),
            ));
        }

        if self.authentication.access_token_hours <= 0 {
            return Err(AppError::Validation(
                "Access token lifetime must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
