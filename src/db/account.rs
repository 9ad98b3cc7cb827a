/// Account and OTP database models
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The two account kinds. Admins own a tenant and provision users;
/// users belong to the admin that created them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Admin,
    User,
}

impl AccountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Admin => "admin",
            AccountKind::User => "user",
        }
    }

    pub fn from_str(s: &str) -> AppResult<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(AccountKind::Admin),
            "user" => Ok(AccountKind::User),
            _ => Err(AppError::Validation(format!("Invalid user type: {}", s))),
        }
    }

    /// Table backing this account kind
    pub(crate) fn table(&self) -> &'static str {
        match self {
            AccountKind::Admin => "admins",
            AccountKind::User => "users",
        }
    }
}

/// Account roles, ordered by privilege
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::SuperAdmin => "superadmin",
        }
    }

    pub fn from_str(s: &str) -> AppResult<Self> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "superadmin" => Ok(Role::SuperAdmin),
            _ => Err(AppError::Validation(format!("Invalid role: {}", s))),
        }
    }

    /// Kind of account a token with this role resolves against
    pub fn kind(&self) -> AccountKind {
        match self {
            Role::User => AccountKind::User,
            Role::Admin | Role::SuperAdmin => AccountKind::Admin,
        }
    }
}

/// Account status. Inactive blocks login and token refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Inactive,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
        }
    }

    pub fn from_str(s: &str) -> AppResult<Self> {
        match s {
            "active" => Ok(AccountStatus::Active),
            "inactive" => Ok(AccountStatus::Inactive),
            _ => Err(AppError::Validation(format!("Invalid status: {}", s))),
        }
    }
}

/// Plan metadata carried on admin accounts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub name: String,
    pub max_users: i64,
    pub features: Option<String>,
}

/// Plan usage stats for an admin (current vs allowed user count)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanUsage {
    pub name: String,
    pub max_users: i64,
    pub current_users: i64,
    pub features: Option<String>,
}

/// Unified account record, parameterized by kind.
///
/// Admin rows carry `plan`, user rows carry `name` and `created_by`;
/// the remaining shape is shared so login, update and the access gate
/// run through one code path.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: i64,
    pub kind: AccountKind,
    pub name: Option<String>,
    pub email: String,
    /// Only populated when the caller explicitly asked for the hash;
    /// never serialized
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub role: Role,
    pub status: AccountStatus,
    pub must_change_password: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<i64>,
    pub last_login: Option<DateTime<Utc>>,
    pub password_changed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// Whether the password was changed after the given JWT issued-at
    /// timestamp (seconds since epoch). Used to invalidate stale tokens.
    pub fn password_changed_after(&self, jwt_iat: i64) -> bool {
        match self.password_changed_at {
            Some(changed_at) => jwt_iat < changed_at.timestamp(),
            None => false,
        }
    }
}

/// One-time code record for password recovery
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct OtpRecord {
    pub id: i64,
    pub email: String,
    pub user_type: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

impl OtpRecord {
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}
