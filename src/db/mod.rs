pub mod models;
pub mod queries;

use anyhow::Result;
use sqlx::{
    migrate::Migrator,
    pool::PoolConnection,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Sqlite, SqliteConnection, SqlitePool,
};
use std::ops::{Deref, DerefMut};
use std::str::FromStr;
use std::time::Duration;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// How long a connection waits for another writer before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<SqlitePool> {
    let connect_opts = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    // sqlx creates the file but not its directory
    if let Some(filename) = connect_opts.clone().get_filename().to_str() {
        if filename != ":memory:" {
            if let Some(parent) = std::path::Path::new(filename).parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(connect_opts)
        .await?;

    MIGRATOR.run(&pool).await?;

    tracing::info!("Database initialized at {}", database_url);
    Ok(pool)
}

// ─── Write transactions ──────────────────────────────────────────────────────

/// A transaction that takes the database write lock when it begins.
///
/// SQLite cannot upgrade a deferred transaction's read lock while another
/// connection writes, and fails with SQLITE_BUSY instead of waiting.
/// `BEGIN IMMEDIATE` waits out the busy timeout up front, so concurrent
/// read-then-write transactions queue.
///
/// Dropping it unfinished detaches the connection from the pool; closing
/// the connection discards the transaction.
pub struct WriteTransaction {
    conn: Option<PoolConnection<Sqlite>>,
}

impl WriteTransaction {
    pub async fn begin(pool: &SqlitePool) -> Result<Self, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
        Ok(WriteTransaction { conn: Some(conn) })
    }

    pub async fn commit(mut self) -> Result<(), sqlx::Error> {
        sqlx::query("COMMIT").execute(&mut *self).await?;
        // back to the pool
        self.conn = None;
        Ok(())
    }

    pub async fn rollback(mut self) -> Result<(), sqlx::Error> {
        sqlx::query("ROLLBACK").execute(&mut *self).await?;
        self.conn = None;
        Ok(())
    }
}

impl Deref for WriteTransaction {
    type Target = SqliteConnection;

    fn deref(&self) -> &SqliteConnection {
        // only commit/rollback clear it, and both consume the transaction
        self.conn.as_deref().expect("write transaction already finished")
    }
}

impl DerefMut for WriteTransaction {
    fn deref_mut(&mut self) -> &mut SqliteConnection {
        self.conn.as_deref_mut().expect("write transaction already finished")
    }
}

impl Drop for WriteTransaction {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            tracing::warn!("Write transaction dropped unfinished, closing its connection");
            drop(conn.detach());
        }
    }
}
