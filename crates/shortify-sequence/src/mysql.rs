use async_trait::async_trait;
use shortify_core::sequence::Result;
use shortify_core::{AllocatorError, SequenceAllocator};
use sqlx::MySqlPool;
use tracing::{debug, trace};

const DEFAULT_NAME: &str = "short_links";

/// A sequence allocator backed by a MySQL counter row.
///
/// Each allocation runs `UPDATE … SET value = LAST_INSERT_ID(value + 1)`,
/// which increments the row under InnoDB's row lock and stashes the new value
/// in the connection's `LAST_INSERT_ID()`. The read-back happens on the same
/// pooled connection, so concurrent callers never observe each other's value.
#[derive(Debug, Clone)]
pub struct MySqlSequence {
    pool: MySqlPool,
    name: String,
}

fn map_sqlx_error(err: sqlx::Error) -> AllocatorError {
    AllocatorError::Unavailable(err.to_string())
}

impl MySqlSequence {
    /// Creates a sequence on the default counter row from an existing pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self::with_name(pool, DEFAULT_NAME)
    }

    /// Creates a sequence on the counter row called `name`.
    pub fn with_name(pool: MySqlPool, name: impl Into<String>) -> Self {
        Self {
            pool,
            name: name.into(),
        }
    }

    /// Creates a sequence by opening a new MySQL connection pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = MySqlPool::connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    /// Creates the counter table and seeds this sequence's row if missing.
    ///
    /// Safe to run concurrently and repeatedly: an existing row is never reset.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(include_str!("../ddl/mysql/link_sequences.sql"))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        sqlx::query("INSERT IGNORE INTO link_sequences (name, value) VALUES (?, 0)")
            .bind(&self.name)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        debug!(name = %self.name, "sequence row ready");
        Ok(())
    }
}

#[async_trait]
impl SequenceAllocator for MySqlSequence {
    async fn next(&self) -> Result<u64> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;

        let updated = sqlx::query(
            r#"
            UPDATE link_sequences
            SET value = LAST_INSERT_ID(value + 1)
            WHERE name = ?
            "#,
        )
        .bind(&self.name)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            // SQLSTATE 22003: the BIGINT UNSIGNED column is out of range.
            let out_of_range = e
                .as_database_error()
                .and_then(|db| db.code())
                .is_some_and(|code| code == "22003");
            if out_of_range {
                AllocatorError::Exhausted(e.to_string())
            } else {
                map_sqlx_error(e)
            }
        })?;

        if updated.rows_affected() == 0 {
            return Err(AllocatorError::Unavailable(format!(
                "sequence row '{}' does not exist; run migrate first",
                self.name
            )));
        }

        let value: u64 = sqlx::query_scalar("SELECT LAST_INSERT_ID()")
            .fetch_one(&mut *conn)
            .await
            .map_err(map_sqlx_error)?;

        trace!(name = %self.name, value, "allocated sequence value");
        Ok(value)
    }
}
