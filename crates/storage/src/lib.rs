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

use shared::domain::WalletAddress;

const MEMORY_DATABASE_URL: &str = "sqlite::memory:";

/// Backing store of the key/value contract: current entries, an append-only
/// transaction log, and the availability switch.
#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub key: String,
    pub value: Vec<u8>,
    pub updated_by: WalletAddress,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StoredTransaction {
    pub block_number: u64,
    pub tx_hash: String,
    pub key: String,
    pub signer: WalletAddress,
    pub value_len: u64,
    pub committed_at: DateTime<Utc>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Every connection to `sqlite::memory:` opens its own database.
        let pool_options = if database_url == MEMORY_DATABASE_URL {
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

    pub async fn is_available(&self) -> Result<bool> {
        let paused: Option<bool> = sqlx::query_scalar("SELECT paused FROM contract_state WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .context("failed to read contract availability")?;
        Ok(!paused.unwrap_or(false))
    }

    pub async fn set_paused(&self, paused: bool) -> Result<()> {
        sqlx::query(
            "INSERT INTO contract_state (id, paused) VALUES (1, ?)
             ON CONFLICT(id) DO UPDATE SET paused = excluded.paused",
        )
        .bind(paused)
        .execute(&self.pool)
        .await
        .context("failed to update contract availability")?;
        Ok(())
    }

    pub async fn get_data(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let row = sqlx::query("SELECT value FROM kv_entries WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to read key '{key}'"))?;
        Ok(row.map(|r| r.get::<Vec<u8>, _>(0)))
    }

    pub async fn get_entry(&self, key: &str) -> Result<Option<StoredEntry>> {
        let row = sqlx::query(
            "SELECT key, value, updated_by, updated_at FROM kv_entries WHERE key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to read entry '{key}'"))?;
        Ok(row.map(|r| StoredEntry {
            key: r.get::<String, _>(0),
            value: r.get::<Vec<u8>, _>(1),
            updated_by: WalletAddress(r.get::<String, _>(2)),
            updated_at: r.get::<DateTime<Utc>, _>(3),
        }))
    }

    /// Upserts the entry and appends to the transaction log in one SQLite
    /// transaction. The log row id is the block number.
    pub async fn set_data(
        &self,
        key: &str,
        value: &[u8],
        signer: &WalletAddress,
        tx_hash: &str,
    ) -> Result<StoredTransaction> {
        let committed_at = Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO kv_entries (key, value, updated_by, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
               value = excluded.value,
               updated_by = excluded.updated_by,
               updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(signer.as_str())
        .bind(committed_at)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to write key '{key}'"))?;

        let rec = sqlx::query(
            "INSERT INTO kv_transactions (tx_hash, key, signer, value_len, committed_at)
             VALUES (?, ?, ?, ?, ?) RETURNING block_number",
        )
        .bind(tx_hash)
        .bind(key)
        .bind(signer.as_str())
        .bind(value.len() as i64)
        .bind(committed_at)
        .fetch_one(&mut *tx)
        .await
        .context("failed to append transaction log")?;

        tx.commit().await?;

        Ok(StoredTransaction {
            block_number: rec.get::<i64, _>(0) as u64,
            tx_hash: tx_hash.to_string(),
            key: key.to_string(),
            signer: signer.clone(),
            value_len: value.len() as u64,
            committed_at,
        })
    }

    /// Keys starting with `prefix`, compared byte for byte.
    pub async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT key FROM kv_entries WHERE substr(key, 1, length(?)) = ? ORDER BY key",
        )
        .bind(prefix)
        .bind(prefix)
        .fetch_all(&self.pool)
        .await
        .context("failed to list keys")?;
        Ok(rows.into_iter().map(|r| r.get::<String, _>(0)).collect())
    }

    pub async fn list_transactions(
        &self,
        key: Option<&str>,
        limit: u32,
    ) -> Result<Vec<StoredTransaction>> {
        let rows = match key {
            Some(key) => {
                sqlx::query(
                    "SELECT block_number, tx_hash, key, signer, value_len, committed_at
                     FROM kv_transactions WHERE key = ?
                     ORDER BY block_number DESC LIMIT ?",
                )
                .bind(key)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    "SELECT block_number, tx_hash, key, signer, value_len, committed_at
                     FROM kv_transactions
                     ORDER BY block_number DESC LIMIT ?",
                )
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            }
        }
        .context("failed to list transactions")?;

        Ok(rows
            .into_iter()
            .map(|r| StoredTransaction {
                block_number: r.get::<i64, _>(0) as u64,
                tx_hash: r.get::<String, _>(1),
                key: r.get::<String, _>(2),
                signer: WalletAddress(r.get::<String, _>(3)),
                value_len: r.get::<i64, _>(4) as u64,
                committed_at: r.get::<DateTime<Utc>, _>(5),
            })
            .collect())
    }
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
    if database_url == MEMORY_DATABASE_URL || !database_url.starts_with("sqlite:") {
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
