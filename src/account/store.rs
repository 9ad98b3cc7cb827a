/// Credential store over the admin and user tables
///
/// Both tables share one row shape in code: kind-specific columns are
/// selected as NULL on the other side so a single mapping covers both.
/// Every password-bearing write re-hashes inside the call; plaintext never
/// survives the call boundary.
use crate::{
    db::account::{Account, AccountKind, AccountStatus, Plan, PlanUsage, Role},
    error::{AppError, AppResult},
    password,
};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

/// Fields for a new self-registered admin
#[derive(Debug, Clone)]
pub struct NewAdmin {
    pub email: String,
    pub password: String,
}

/// Fields for a new admin-provisioned user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    /// Temp password; the account is created with must_change_password set
    pub password: String,
    pub created_by: i64,
}

/// Partial update. Setting `password` re-hashes and stamps
/// password_changed_at; `refresh_token` uses a double Option so the caller
/// can distinguish "leave alone" from "clear".
#[derive(Debug, Clone, Default)]
pub struct AccountUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub status: Option<AccountStatus>,
    pub must_change_password: Option<bool>,
    pub last_login: Option<DateTime<Utc>>,
    pub refresh_token: Option<Option<String>>,
}

/// Paging/filter parameters for listing an admin's users
#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    pub search: Option<String>,
    pub status: Option<AccountStatus>,
    pub page: i64,
    pub limit: i64,
}

/// One page of users plus pagination totals
#[derive(Debug, Clone)]
pub struct UserPage {
    pub users: Vec<Account>,
    pub total: i64,
    pub page: i64,
    pub pages: i64,
}

#[derive(Clone)]
pub struct AccountStore {
    db: SqlitePool,
}

impl AccountStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Create an admin account. Registration passwords have already been
    /// policy-checked by the caller; hashing happens here.
    pub async fn create_admin(&self, new: NewAdmin) -> AppResult<Account> {
        if self
            .find_by_email(AccountKind::Admin, &new.email, false)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "Admin with this email already exists".to_string(),
            ));
        }

        let hash = password::hash_password(&new.password)?;
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO admins (email, password_hash, role, status, must_change_password, created_at, updated_at)
             VALUES (?1, ?2, 'admin', 'active', 0, ?3, ?3)",
        )
        .bind(&new.email)
        .bind(&hash)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(|e| map_unique_violation(e, "Admin with this email already exists"))?;

        self.require_by_id(AccountKind::Admin, result.last_insert_rowid(), false)
            .await
    }

    /// Create a user under an admin. Provisioned accounts start with
    /// must_change_password set.
    pub async fn create_user(&self, new: NewUser) -> AppResult<Account> {
        if self
            .find_by_email(AccountKind::User, &new.email, false)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "User with this email already exists".to_string(),
            ));
        }

        let hash = password::hash_password(&new.password)?;
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO users (name, email, password_hash, role, status, must_change_password, created_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, 'user', 'active', 1, ?4, ?5, ?5)",
        )
        .bind(&new.name)
        .bind(&new.email)
        .bind(&hash)
        .bind(new.created_by)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(|e| map_unique_violation(e, "User with this email already exists"))?;

        self.require_by_id(AccountKind::User, result.last_insert_rowid(), false)
            .await
    }

    /// Look up by id. `include_hash` controls whether the password hash is
    /// loaded; default reads exclude it.
    pub async fn find_by_id(
        &self,
        kind: AccountKind,
        id: i64,
        include_hash: bool,
    ) -> AppResult<Option<Account>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ?1",
            select_columns(kind, include_hash),
            kind.table()
        );

        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .map_err(AppError::Database)?;

        row.map(|r| map_row(kind, &r)).transpose()
    }

    /// Look up by email (unique within kind)
    pub async fn find_by_email(
        &self,
        kind: AccountKind,
        email: &str,
        include_hash: bool,
    ) -> AppResult<Option<Account>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE email = ?1",
            select_columns(kind, include_hash),
            kind.table()
        );

        let row = sqlx::query(&sql)
            .bind(email)
            .fetch_optional(&self.db)
            .await
            .map_err(AppError::Database)?;

        row.map(|r| map_row(kind, &r)).transpose()
    }

    /// Look up by id, NotFound if missing
    pub async fn require_by_id(
        &self,
        kind: AccountKind,
        id: i64,
        include_hash: bool,
    ) -> AppResult<Account> {
        self.find_by_id(kind, id, include_hash)
            .await?
            .ok_or_else(|| AppError::NotFound("Account not found".to_string()))
    }

    /// Apply a partial update and return the fresh row. Missing id is
    /// signaled as NotFound, never silently ignored.
    pub async fn update(
        &self,
        kind: AccountKind,
        id: i64,
        update: AccountUpdate,
    ) -> AppResult<Account> {
        let mut builder = sqlx::QueryBuilder::new(format!("UPDATE {} SET ", kind.table()));
        let mut separated = builder.separated(", ");
        let now = Utc::now();
        let mut touched = false;

        if let Some(name) = &update.name {
            separated.push("name = ").push_bind_unseparated(name.clone());
            touched = true;
        }
        if let Some(email) = &update.email {
            separated.push("email = ").push_bind_unseparated(email.clone());
            touched = true;
        }
        if let Some(plain) = &update.password {
            // Re-hash before anything touches the wire; the plaintext does
            // not survive this call
            let hash = password::hash_password(plain)?;
            separated.push("password_hash = ").push_bind_unseparated(hash);
            separated
                .push("password_changed_at = ")
                .push_bind_unseparated(now);
            touched = true;
        }
        if let Some(status) = update.status {
            separated
                .push("status = ")
                .push_bind_unseparated(status.as_str());
            touched = true;
        }
        if let Some(flag) = update.must_change_password {
            separated
                .push("must_change_password = ")
                .push_bind_unseparated(flag);
            touched = true;
        }
        if let Some(last_login) = update.last_login {
            separated
                .push("last_login = ")
                .push_bind_unseparated(last_login);
            touched = true;
        }
        if let Some(refresh_token) = &update.refresh_token {
            separated
                .push("refresh_token = ")
                .push_bind_unseparated(refresh_token.clone());
            touched = true;
        }

        if !touched {
            return self.require_by_id(kind, id, false).await;
        }

        separated.push("updated_at = ").push_bind_unseparated(now);
        builder.push(" WHERE id = ").push_bind(id);

        let result = builder
            .build()
            .execute(&self.db)
            .await
            .map_err(|e| map_unique_violation(e, "Email already in use"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Account not found".to_string()));
        }

        self.require_by_id(kind, id, false).await
    }

    /// Delete a user account
    pub async fn delete_user(&self, id: i64) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(AppError::Database)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        Ok(())
    }

    /// Flip a user between active and inactive
    pub async fn toggle_user_status(&self, id: i64) -> AppResult<Account> {
        let result = sqlx::query(
            "UPDATE users SET status = CASE WHEN status = 'active' THEN 'inactive' ELSE 'active' END,
                              updated_at = ?1
             WHERE id = ?2",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db)
        .await
        .map_err(AppError::Database)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        self.require_by_id(AccountKind::User, id, false).await
    }

    /// Plan metadata plus current usage for an admin, computed by counting
    /// the users it created
    pub async fn plan_with_usage(&self, admin_id: i64) -> AppResult<PlanUsage> {
        let admin = self.require_by_id(AccountKind::Admin, admin_id, false).await?;
        let plan = admin
            .plan
            .ok_or_else(|| AppError::Internal("Admin row is missing plan metadata".to_string()))?;

        let current_users = self.count_users_by_admin(admin_id).await?;

        Ok(PlanUsage {
            name: plan.name,
            max_users: plan.max_users,
            current_users,
            features: plan.features,
        })
    }

    /// Count users provisioned by an admin
    pub async fn count_users_by_admin(&self, admin_id: i64) -> AppResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM users WHERE created_by = ?1")
            .bind(admin_id)
            .fetch_one(&self.db)
            .await
            .map_err(AppError::Database)?;

        Ok(row.try_get("n")?)
    }

    /// List the users created by an admin with search/status filters and
    /// pagination
    pub async fn list_users(&self, created_by: i64, query: UserQuery) -> AppResult<UserPage> {
        let page = query.page.max(1);
        let limit = query.limit.clamp(1, 100);
        let offset = (page - 1) * limit;

        let mut list = sqlx::QueryBuilder::new(format!(
            "SELECT {} FROM users WHERE created_by = ",
            select_columns(AccountKind::User, false)
        ));
        list.push_bind(created_by);

        let mut count = sqlx::QueryBuilder::new("SELECT COUNT(*) AS n FROM users WHERE created_by = ");
        count.push_bind(created_by);

        if let Some(search) = &query.search {
            let pattern = format!("%{}%", search);
            list.push(" AND (name LIKE ").push_bind(pattern.clone());
            list.push(" OR email LIKE ").push_bind(pattern.clone());
            list.push(")");
            count.push(" AND (name LIKE ").push_bind(pattern.clone());
            count.push(" OR email LIKE ").push_bind(pattern);
            count.push(")");
        }

        if let Some(status) = query.status {
            list.push(" AND status = ").push_bind(status.as_str());
            count.push(" AND status = ").push_bind(status.as_str());
        }

        list.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = list
            .build()
            .fetch_all(&self.db)
            .await
            .map_err(AppError::Database)?;

        let users = rows
            .iter()
            .map(|r| map_row(AccountKind::User, r))
            .collect::<AppResult<Vec<_>>>()?;

        let total: i64 = count
            .build()
            .fetch_one(&self.db)
            .await
            .map_err(AppError::Database)?
            .try_get("n")?;

        Ok(UserPage {
            users,
            total,
            page,
            pages: (total + limit - 1) / limit,
        })
    }
}

/// Turn a unique-constraint violation into Conflict. The pre-check SELECTs
/// cover the common path; under concurrency the constraint is the actual
/// guarantee, and its failure must not surface as a 500.
fn map_unique_violation(e: sqlx::Error, message: &str) -> AppError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(message.to_string())
        }
        _ => AppError::Database(e),
    }
}

/// Shared column list; kind-specific columns are NULL on the other side so
/// one mapping covers both tables. The hash is only selected on request.
fn select_columns(kind: AccountKind, include_hash: bool) -> String {
    let hash = if include_hash {
        "password_hash"
    } else {
        "NULL AS password_hash"
    };

    match kind {
        AccountKind::Admin => format!(
            "id, NULL AS name, email, {}, role, status, must_change_password, \
             plan_name, plan_max_users, plan_features, NULL AS created_by, \
             last_login, password_changed_at, refresh_token, created_at, updated_at",
            hash
        ),
        AccountKind::User => format!(
            "id, name, email, {}, role, status, must_change_password, \
             NULL AS plan_name, NULL AS plan_max_users, NULL AS plan_features, created_by, \
             last_login, password_changed_at, refresh_token, created_at, updated_at",
            hash
        ),
    }
}

fn map_row(kind: AccountKind, row: &SqliteRow) -> AppResult<Account> {
    let role_str: String = row.try_get("role")?;
    let status_str: String = row.try_get("status")?;

    let plan = match kind {
        AccountKind::Admin => {
            let name: Option<String> = row.try_get("plan_name")?;
            name.map(|name| -> AppResult<Plan> {
                Ok(Plan {
                    name,
                    max_users: row.try_get("plan_max_users")?,
                    features: row.try_get("plan_features")?,
                })
            })
            .transpose()?
        }
        AccountKind::User => None,
    };

    Ok(Account {
        id: row.try_get("id")?,
        kind,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        role: Role::from_str(&role_str)?,
        status: AccountStatus::from_str(&status_str)?,
        must_change_password: row.try_get("must_change_password")?,
        plan,
        created_by: row.try_get("created_by")?,
        last_login: row.try_get("last_login")?,
        password_changed_at: row.try_get("password_changed_at")?,
        refresh_token: row.try_get("refresh_token")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
