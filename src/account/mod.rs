/// Account subsystem
///
/// `AccountStore` is the persistence layer over the admin/user tables;
/// `AccountManager` composes it with the OTP ledger, token service and
/// mailer into the login / password-lifecycle state machines.

mod manager;
mod store;

pub use manager::AccountManager;
pub use store::{AccountStore, AccountUpdate, NewAdmin, NewUser, UserPage, UserQuery};

use crate::db::account::Account;
use serde::Serialize;

/// Access + refresh token pair issued after a successful credential check
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokens {
    pub token: String,
    pub refresh_token: String,
}

/// Result of a login attempt that passed the credential checks
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginOutcome {
    pub user: Account,
    #[serde(flatten)]
    pub tokens: AuthTokens,
    /// True for accounts still carrying an admin-issued temp password.
    /// The access gate blocks every route except change-password while
    /// this is set.
    pub must_change_password: bool,
}
