/// LeadFlow - multi-tenant account and authentication backend
///
/// Admins own a tenant, provision users under a plan, and both account
/// kinds authenticate through the same JWT session flow.
pub mod account;
pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod jobs;
pub mod mailer;
pub mod otp;
pub mod password;
pub mod server;
pub mod tokens;
