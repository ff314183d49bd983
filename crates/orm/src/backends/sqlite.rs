//! SQLite Backend Implementation
//!
//! Used for embedded deployments and for exercising the engine in tests.
//! SQLite DDL is transactional, so a failed script leaves no partial schema.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{Connection, Executor, Row, Sqlite, SqliteConnection, SqlitePool};
use std::time::{Duration, Instant};

use super::core::*;
use crate::error::StoreResult;
use crate::migrations::definitions::MigrationRecord;

/// SQLite store backed by a connection pool
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl MigrationStore for SqliteStore {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::SQLite
    }

    async fn execute(&self, sql: &str) -> StoreResult<()> {
        self.pool.execute(sql).await?;
        Ok(())
    }

    async fn fetch_records(&self, sql: &str) -> StoreResult<Vec<MigrationRecord>> {
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| -> StoreResult<MigrationRecord> {
                // CURRENT_TIMESTAMP is stored as UTC text without an offset
                let applied_at: NaiveDateTime = row.try_get(1)?;
                Ok(MigrationRecord {
                    name: row.try_get(0)?,
                    applied_at: DateTime::from_naive_utc_and_offset(applied_at, Utc),
                })
            })
            .collect()
    }

    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteTransaction { tx }))
    }

    async fn ping(&self) -> StoreResult<Duration> {
        let start = Instant::now();
        let mut conn = self.pool.acquire().await?;
        conn.ping().await?;
        Ok(start.elapsed())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// SQLite transaction implementation
pub struct SqliteTransaction {
    tx: sqlx::Transaction<'static, Sqlite>,
}

#[async_trait]
impl StoreTransaction for SqliteTransaction {
    async fn execute_batch(&mut self, sql: &str) -> StoreResult<()> {
        let conn: &mut SqliteConnection = &mut self.tx;
        conn.execute(sql).await?;
        Ok(())
    }

    async fn execute_with(&mut self, sql: &str, params: &[&str]) -> StoreResult<u64> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = query.bind(param.to_string());
        }
        let result = query.execute(&mut *self.tx).await?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let SqliteTransaction { tx } = *self;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        let SqliteTransaction { tx } = *self;
        tx.rollback().await?;
        Ok(())
    }
}
