/// Application context and dependency injection
use crate::{
    account::{AccountManager, AccountStore},
    config::ServerConfig,
    db,
    error::AppResult,
    mailer::Mailer,
    otp::OtpLedger,
    tokens::TokenService,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub account_store: Arc<AccountStore>,
    pub account_manager: Arc<AccountManager>,
    pub otp_ledger: Arc<OtpLedger>,
    pub token_service: Arc<TokenService>,
    pub mailer: Arc<Mailer>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> AppResult<Self> {
        config.validate()?;

        let pool = db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;
        db::run_migrations(&pool).await?;
        db::test_connection(&pool).await?;

        let ctx = Self::from_parts(config, pool)?;

        if !ctx.mailer.is_configured() {
            tracing::warn!(
                "Email delivery not configured; credential and OTP emails will be skipped"
            );
        }

        Ok(ctx)
    }

    /// Wire the services over an existing pool (used by tests with an
    /// in-memory database)
    pub fn from_parts(config: ServerConfig, pool: SqlitePool) -> AppResult<Self> {
        let account_store = Arc::new(AccountStore::new(pool.clone()));
        let otp_ledger = Arc::new(OtpLedger::new(
            pool.clone(),
            config.authentication.otp_minutes,
        ));
        let token_service = Arc::new(TokenService::new(&config.authentication));
        let mailer = Arc::new(Mailer::new(config.email.clone())?);

        let account_manager = Arc::new(AccountManager::new(
            Arc::clone(&account_store),
            Arc::clone(&otp_ledger),
            Arc::clone(&token_service),
            Arc::clone(&mailer),
        ));

        Ok(Self {
            config: Arc::new(config),
            db: pool,
            account_store,
            account_manager,
            otp_ledger,
            token_service,
            mailer,
        })
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}
