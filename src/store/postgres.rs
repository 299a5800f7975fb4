//! Postgres-backed account store.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    PgPool, Row,
};
use std::time::Duration;
use tracing::{info, Instrument};

use super::{NewUser, User, UserRepository};
use crate::auth::{Credential, StoreError, UserStore};

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

const USER_COLUMNS: &str = "id, username, email, salt, password, created_at, updated_at";

#[derive(Clone, Debug)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    /// Connect to `dsn`.
    ///
    /// # Errors
    /// Returns an error if the database is unreachable.
    pub async fn connect(dsn: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the tables and indexes if missing.
    ///
    /// # Errors
    /// Returns an error if any schema statement fails.
    pub async fn migrate(&self) -> Result<()> {
        for (index, statement) in split_sql_statements(SCHEMA_SQL).iter().enumerate() {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .with_context(|| format!("failed to execute schema statement {}", index + 1))?;
        }
        info!("database schema ready");
        Ok(())
    }

    async fn find_one(&self, column: &str, value: Bind<'_>) -> Result<User, StoreError> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {column} = $1 AND deleted_at IS NULL"
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %query
        );
        let query = sqlx::query(&query);
        let query = match value {
            Bind::Id(id) => query.bind(id),
            Bind::Text(text) => query.bind(text),
        };
        let row = query
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?
            .ok_or(StoreError::NotFound)?;
        user_from_row(&row)
    }
}

enum Bind<'a> {
    Id(i64),
    Text(&'a str),
}

impl UserStore for PgUserStore {
    type Account = User;

    async fn find_by_username(&self, username: &str) -> Result<User, StoreError> {
        self.find_one("username", Bind::Text(username)).await
    }

    async fn find_by_email(&self, email: &str) -> Result<User, StoreError> {
        self.find_one("email", Bind::Text(email)).await
    }

    async fn find_by_id(&self, id: u64) -> Result<User, StoreError> {
        let id = i64::try_from(id).map_err(|_| StoreError::NotFound)?;
        self.find_one("id", Bind::Id(id)).await
    }

    async fn update_password(
        &self,
        id: u64,
        credential: &Credential,
        changed_at: DateTime<Utc>,
        unmodified_since: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let id = i64::try_from(id).map_err(|_| StoreError::NotFound)?;

        // Row lock makes "check updated_at, then write" atomic against
        // concurrent resets and password changes.
        let mut tx = self.pool.begin().await?;

        let query = "SELECT updated_at FROM users WHERE id = $1 AND deleted_at IS NULL FOR UPDATE";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .instrument(span)
            .await?
            .ok_or(StoreError::NotFound)?;
        let updated_at: DateTime<Utc> = row.try_get("updated_at")?;
        if unmodified_since.is_some_and(|bound| updated_at > bound) {
            tx.rollback().await?;
            return Err(StoreError::Stale);
        }

        let query = r"
            UPDATE users
            SET salt = $2,
                password = $3,
                updated_at = $4
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .bind(credential.salt())
            .bind(credential.digest())
            .bind(changed_at)
            .execute(&mut *tx)
            .instrument(span)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

impl UserRepository for PgUserStore {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let query = r"
            INSERT INTO users
                (username, email, salt, password, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING id, username, email, salt, password, created_at, updated_at
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(&user.username)
            .bind(&user.email)
            .bind(user.credential.salt())
            .bind(user.credential.digest())
            .bind(user.created_at)
            .fetch_one(&self.pool)
            .instrument(span)
            .await;

        match row {
            Ok(row) => user_from_row(&row),
            Err(err) if is_unique_violation(&err) => Err(StoreError::Conflict),
            Err(err) => Err(err.into()),
        }
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let query =
            format!("SELECT {USER_COLUMNS} FROM users WHERE deleted_at IS NULL ORDER BY id");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %query
        );
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .instrument(span)
            .await?;
        rows.iter().map(user_from_row).collect()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let query = "SELECT 1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        sqlx::query(query)
            .execute(&self.pool)
            .instrument(span)
            .await?;
        Ok(())
    }
}

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    let id: i64 = row.try_get("id")?;
    let id = u64::try_from(id).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
    let salt: Vec<u8> = row.try_get("salt")?;
    let digest: Vec<u8> = row.try_get("password")?;
    Ok(User {
        id,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        credential: Credential::from_parts(&salt, &digest)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}
