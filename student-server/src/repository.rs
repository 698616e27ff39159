//! User repository: an async trait with in-memory and Postgres implementations.
//! Lookups return `Ok(None)` for absence so callers can tell it apart from a failed query.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use tokio::sync::RwLock;

use crate::models::{AppError, NewUser, User};

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: NewUser) -> Result<User, AppError>;
    async fn find_by_id(&self, id: i32) -> Result<Option<User>, AppError>;
    /// Exactly one match yields `Some`, none yields `None`, several yield `Conflict`.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError>;
    async fn update(&self, user: User) -> Result<User, AppError>;
    async fn delete(&self, id: i32) -> Result<(), AppError>;
}

/// Collapses the matches of a username query into the single-record contract.
fn single_match(username: &str, mut matches: Vec<User>) -> Result<Option<User>, AppError> {
    if matches.len() > 1 {
        return Err(AppError::Conflict(format!("multiple users share username {username:?}")));
    }
    Ok(matches.pop())
}

#[derive(Debug)]
struct UserTable {
    rows: BTreeMap<i32, User>,
    next_id: i32,
}

impl Default for UserTable {
    fn default() -> Self {
        Self { rows: BTreeMap::new(), next_id: 1 }
    }
}

/// In-memory repository for dev fallback and tests.
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    inner: Arc<RwLock<UserTable>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: NewUser) -> Result<User, AppError> {
        let mut table = self.inner.write().await;
        let id = table.next_id;
        table.next_id = id
            .checked_add(1)
            .ok_or_else(|| AppError::Repo("user id space exhausted".into()))?;
        let user = user.with_id(id);
        table.rows.insert(id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, AppError> {
        let table = self.inner.read().await;
        Ok(table.rows.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let table = self.inner.read().await;
        let matches = table.rows.values().filter(|u| u.username == username).take(2).cloned().collect();
        single_match(username, matches)
    }

    async fn update(&self, user: User) -> Result<User, AppError> {
        let mut table = self.inner.write().await;
        match table.rows.get_mut(&user.id) {
            Some(slot) => {
                *slot = user.clone();
                Ok(user)
            }
            None => Err(AppError::NotFound(format!("user {} not found", user.id))),
        }
    }

    async fn delete(&self, id: i32) -> Result<(), AppError> {
        let mut table = self.inner.write().await;
        table.rows.remove(&id).ok_or_else(|| AppError::NotFound(format!("user {id} not found")))?;
        Ok(())
    }
}

/// Repository over the `users(id, username, password)` table.
#[derive(Clone)]
pub struct PostgresUserRepository {
    pub pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_user(row: &PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        password: row.try_get("password")?,
    })
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create(&self, user: NewUser) -> Result<User, AppError> {
        let row = sqlx::query(
            r#"INSERT INTO users (username, password)
               VALUES ($1, $2)
               RETURNING id, username, password"#,
        )
        .bind(&user.username)
        .bind(&user.password)
        .fetch_one(&self.pool)
        .await?;
        Ok(row_to_user(&row)?)
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, AppError> {
        let row = sqlx::query(r#"SELECT id, username, password FROM users WHERE id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_user).transpose()?)
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        // Two rows are enough to detect an ambiguous username.
        let rows = sqlx::query(
            r#"SELECT id, username, password FROM users
               WHERE username = $1
               ORDER BY id
               LIMIT 2"#,
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await?;
        let matches = rows.iter().map(row_to_user).collect::<Result<Vec<_>, _>>()?;
        single_match(username, matches)
    }

    async fn update(&self, user: User) -> Result<User, AppError> {
        let row = sqlx::query(
            r#"UPDATE users SET username = $2, password = $3
               WHERE id = $1
               RETURNING id, username, password"#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.password)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(row_to_user(&row)?),
            None => Err(AppError::NotFound(format!("user {} not found", user.id))),
        }
    }

    async fn delete(&self, id: i32) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("user {id} not found")));
        }
        Ok(())
    }
}

/// Factory for repositories; the composition root picks the driver.
#[derive(Debug, Clone)]
pub struct RepositoryFactory;

impl RepositoryFactory {
    pub fn postgres(pool: PgPool) -> Arc<dyn UserRepository> {
        Arc::new(PostgresUserRepository::new(pool))
    }

    pub fn in_memory() -> Arc<dyn UserRepository> {
        Arc::new(InMemoryUserRepository::new())
    }
}
