use std::collections::BTreeMap;
use std::sync::Arc;

use deadpool_postgres::Pool;
use tokio::sync::RwLock;
use tokio_postgres::Row;

use crate::{
    error::{AppError, Result},
    models::user::User,
};

/// A helper function to map a `tokio_postgres::Row` to a `User`.
fn row_to_user(row: &Row) -> Result<User> {
    Ok(User {
        id: row
            .try_get("id")
            .map_err(|_| AppError::Internal("users row is missing id".to_string()))?,
        name: row
            .try_get("name")
            .map_err(|_| AppError::Internal("users row is missing name".to_string()))?,
    })
}

/// Names inserted by the `dbseed` binary.
pub const SEED_NAMES: [&str; 3] = ["Alice", "Bob", "Charlie"];

fn not_found(id: i32) -> AppError {
    AppError::NotFound(format!("User {} not found", id))
}

/// Where users live: PostgreSQL when a database is configured, process
/// memory otherwise.
#[derive(Clone)]
pub enum UserStore {
    Postgres(PgUserRepository),
    Memory(MemoryUserRepository),
}

impl UserStore {
    pub async fn list(&self) -> Result<Vec<User>> {
        match self {
            UserStore::Postgres(repo) => repo.list().await,
            UserStore::Memory(repo) => Ok(repo.list().await),
        }
    }

    pub async fn create(&self, name: &str) -> Result<User> {
        match self {
            UserStore::Postgres(repo) => repo.create(name).await,
            UserStore::Memory(repo) => Ok(repo.create(name).await),
        }
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<User>> {
        match self {
            UserStore::Postgres(repo) => repo.find_by_id(id).await,
            UserStore::Memory(repo) => Ok(repo.find_by_id(id).await),
        }
    }

    /// Like `find_by_id`, but a missing user is a `NotFound` error.
    pub async fn get(&self, id: i32) -> Result<User> {
        self.find_by_id(id).await?.ok_or_else(|| not_found(id))
    }

    pub async fn update(&self, id: i32, name: &str) -> Result<User> {
        match self {
            UserStore::Postgres(repo) => repo.update(id, name).await,
            UserStore::Memory(repo) => repo.update(id, name).await,
        }
    }

    pub async fn delete(&self, id: i32) -> Result<()> {
        match self {
            UserStore::Postgres(repo) => repo.delete(id).await,
            UserStore::Memory(repo) => repo.delete(id).await,
        }
    }

    /// Inserts the [`SEED_NAMES`] users.
    pub async fn seed(&self) -> Result<Vec<User>> {
        let mut users = Vec::with_capacity(SEED_NAMES.len());
        for name in SEED_NAMES {
            users.push(self.create(name).await?);
        }
        Ok(users)
    }
}

/// Users stored in the `users` table.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: Pool,
}

impl PgUserRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn list(&self) -> Result<Vec<User>> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached("SELECT id, name FROM users ORDER BY id")
            .await?;
        let rows = client.query(&stmt, &[]).await?;
        rows.iter().map(row_to_user).collect()
    }

    async fn create(&self, name: &str) -> Result<User> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached("INSERT INTO users (name) VALUES ($1) RETURNING id, name")
            .await?;
        let row = client.query_one(&stmt, &[&name]).await?;
        row_to_user(&row)
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<User>> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached("SELECT id, name FROM users WHERE id = $1")
            .await?;
        let row = client.query_opt(&stmt, &[&id]).await?;
        row.map(|r| row_to_user(&r)).transpose()
    }

    async fn update(&self, id: i32, name: &str) -> Result<User> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached("UPDATE users SET name = $1 WHERE id = $2 RETURNING id, name")
            .await?;
        let row = client.query_opt(&stmt, &[&name, &id]).await?;
        row.map(|r| row_to_user(&r))
            .transpose()?
            .ok_or_else(|| not_found(id))
    }

    async fn delete(&self, id: i32) -> Result<()> {
        let client = self.pool.get().await?;
        let stmt = client.prepare_cached("DELETE FROM users WHERE id = $1").await?;
        match client.execute(&stmt, &[&id]).await? {
            0 => Err(not_found(id)),
            _ => Ok(()),
        }
    }
}

#[derive(Default)]
struct MemoryUsers {
    next_id: i32,
    rows: BTreeMap<i32, String>,
}

/// Users kept in process memory; used when no database is configured.
#[derive(Clone, Default)]
pub struct MemoryUserRepository {
    inner: Arc<RwLock<MemoryUsers>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    async fn list(&self) -> Vec<User> {
        let users = self.inner.read().await;
        users
            .rows
            .iter()
            .map(|(id, name)| User { id: *id, name: name.clone() })
            .collect()
    }

    async fn create(&self, name: &str) -> User {
        let mut users = self.inner.write().await;
        users.next_id += 1;
        let id = users.next_id;
        users.rows.insert(id, name.to_string());
        User { id, name: name.to_string() }
    }

    async fn find_by_id(&self, id: i32) -> Option<User> {
        let users = self.inner.read().await;
        users.rows.get(&id).map(|name| User { id, name: name.clone() })
    }

    async fn update(&self, id: i32, name: &str) -> Result<User> {
        let mut users = self.inner.write().await;
        let slot = users.rows.get_mut(&id).ok_or_else(|| not_found(id))?;
        *slot = name.to_string();
        Ok(User { id, name: name.to_string() })
    }

    async fn delete(&self, id: i32) -> Result<()> {
        let mut users = self.inner.write().await;
        users.rows.remove(&id).map(|_| ()).ok_or_else(|| not_found(id))
    }
}
