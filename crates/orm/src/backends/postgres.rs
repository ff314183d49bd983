//! PostgreSQL Backend Implementation
//!
//! `MigrationStore` on top of a sqlx `PgPool`. Raw batches go through the
//! simple query protocol, so a script may hold any number of statements.

use async_trait::async_trait;
use sqlx::{Connection, Executor, PgConnection, PgPool, Postgres, Row};
use std::time::{Duration, Instant};

use super::core::*;
use crate::error::StoreResult;
use crate::migrations::definitions::MigrationRecord;

/// PostgreSQL store backed by a connection pool
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying pool, shared with the rest of the application
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl MigrationStore for PostgresStore {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::PostgreSQL
    }

    async fn execute(&self, sql: &str) -> StoreResult<()> {
        self.pool.execute(sql).await?;
        Ok(())
    }

    async fn fetch_records(&self, sql: &str) -> StoreResult<Vec<MigrationRecord>> {
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| -> StoreResult<MigrationRecord> {
                Ok(MigrationRecord {
                    name: row.try_get(0)?,
                    applied_at: row.try_get(1)?,
                })
            })
            .collect()
    }

    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresTransaction { tx }))
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

/// PostgreSQL transaction implementation
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn execute_batch(&mut self, sql: &str) -> StoreResult<()> {
        let conn: &mut PgConnection = &mut self.tx;
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
        let PostgresTransaction { tx } = *self;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        let PostgresTransaction { tx } = *self;
        tx.rollback().await?;
        Ok(())
    }
}
