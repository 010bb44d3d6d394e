use anyhow::{Context, Result};
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

pub const DEFAULT_DATABASE_URL: &str = "sqlite://./data/board.db";

/// Local key-value store. Each key holds one text value; writes replace the
/// previous value (last write wins).
#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
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

    pub async fn get_value(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get_entry(key).await?.map(|entry| entry.value))
    }

    pub async fn get_entry(&self, key: &str) -> Result<Option<StoredEntry>> {
        let row = sqlx::query("SELECT key, value, updated_at FROM kv_entries WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to read key '{key}'"))?;

        row.map(|row| {
            let updated_at_ms: i64 = row.try_get("updated_at")?;
            Ok::<_, anyhow::Error>(StoredEntry {
                key: row.try_get("key")?,
                value: row.try_get("value")?,
                updated_at: DateTime::from_timestamp_millis(updated_at_ms).unwrap_or_default(),
            })
        })
        .transpose()
    }

    pub async fn put_value(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_entries (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to write key '{key}'"))?;
        Ok(())
    }

    /// Returns whether a value was present.
    pub async fn remove_value(&self, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM kv_entries WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to remove key '{key}'"))?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_keys(&self) -> Result<Vec<String>> {
        let keys = sqlx::query_scalar("SELECT key FROM kv_entries ORDER BY key")
            .fetch_all(&self.pool)
            .await
            .context("failed to list keys")?;
        Ok(keys)
    }
}

/// Normalises a user supplied database location and makes sure its parent
/// directory exists.
pub fn prepare_database_url(raw_database_url: &str) -> Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_sqlite_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return DEFAULT_DATABASE_URL.to_string();
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
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
