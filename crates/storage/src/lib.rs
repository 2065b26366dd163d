use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

pub mod session;

pub use session::SqliteSession;

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

/// One persisted entity document.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntity {
    pub kind: String,
    pub primary_key: i64,
    pub body: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // every connection to `sqlite::memory:` opens a distinct database
        let pool_options = if sqlite_path(database_url).is_none() {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options.connect_with(connect_options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Insert a document, allocating the next key of `kind` unless one is given.
    pub async fn insert_entity(
        &self,
        kind: &str,
        primary_key: Option<i64>,
        body: &serde_json::Value,
    ) -> Result<i64> {
        let mut tx = self.pool.begin().await?;
        let primary_key = match primary_key {
            Some(key) => key,
            None => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT COALESCE(MAX(primary_key), 0) + 1 FROM entities WHERE kind = ?",
                )
                .bind(kind)
                .fetch_one(&mut *tx)
                .await?
            }
        };
        let now = Utc::now();
        let inserted = sqlx::query(
            "INSERT INTO entities (kind, primary_key, body, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(kind, primary_key) DO NOTHING",
        )
        .bind(kind)
        .bind(primary_key)
        .bind(body.to_string())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if inserted == 0 {
            bail!("duplicate primary key {primary_key} for {kind}");
        }
        tx.commit().await?;
        Ok(primary_key)
    }

    /// Replace the body of an existing document; false when it does not exist.
    pub async fn update_entity(
        &self,
        kind: &str,
        primary_key: i64,
        body: &serde_json::Value,
    ) -> Result<bool> {
        let updated = sqlx::query(
            "UPDATE entities SET body = ?, updated_at = ? WHERE kind = ? AND primary_key = ?",
        )
        .bind(body.to_string())
        .bind(Utc::now())
        .bind(kind)
        .bind(primary_key)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(updated > 0)
    }

    pub async fn delete_entity(&self, kind: &str, primary_key: i64) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM entities WHERE kind = ? AND primary_key = ?")
            .bind(kind)
            .bind(primary_key)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }

    pub async fn load_entity(&self, kind: &str, primary_key: i64) -> Result<Option<StoredEntity>> {
        let row = sqlx::query(
            "SELECT kind, primary_key, body, updated_at FROM entities
             WHERE kind = ? AND primary_key = ?",
        )
        .bind(kind)
        .bind(primary_key)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|row| stored_entity(&row)).transpose()
    }

    /// Every document of `kind`, by primary key.
    pub async fn list_entities(&self, kind: &str) -> Result<Vec<StoredEntity>> {
        let rows = sqlx::query(
            "SELECT kind, primary_key, body, updated_at FROM entities
             WHERE kind = ? ORDER BY primary_key",
        )
        .bind(kind)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(stored_entity).collect()
    }

    pub async fn count_entities(&self, kind: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entities WHERE kind = ?")
            .bind(kind)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}

fn stored_entity(row: &sqlx::sqlite::SqliteRow) -> Result<StoredEntity> {
    let kind: String = row.try_get("kind")?;
    let primary_key: i64 = row.try_get("primary_key")?;
    let body: String = row.try_get("body")?;
    let body = serde_json::from_str(&body)
        .with_context(|| format!("corrupt document for {kind} {primary_key}"))?;
    Ok(StoredEntity {
        kind,
        primary_key,
        body,
        updated_at: row.try_get("updated_at")?,
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
