use async_trait::async_trait;
use jiff::Timestamp;
use shortify_core::store::Result;
use shortify_core::{MappingStore, Page, ShortCode, ShortLink, StorageError};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};
use tracing::debug;

/// MySQL implementation of [`MappingStore`].
///
/// One row per code, forever. Hard delete sets `deleted_at` and clears the
/// target and external id, but the row (and therefore the primary key and the
/// unique sequence value) stays, so a code can never be inserted twice.
/// Timestamps are Unix milliseconds.
#[derive(Debug, Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    /// Creates a store from an existing MySQL connection pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Creates a store by opening a new MySQL connection pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = MySqlPool::connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Creates the `short_links` table if it does not exist.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(include_str!("../ddl/mysql/short_links.sql"))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        debug!("short_links table ready");
        Ok(())
    }
}

fn parse_millis(column: &str, millis: i64) -> Result<Timestamp> {
    Timestamp::from_millisecond(millis).map_err(|e| {
        StorageError::InvalidData(format!("invalid {column} timestamp '{millis}': {e}"))
    })
}

fn row_to_link(row: &MySqlRow) -> Result<ShortLink> {
    let code: String = row.try_get("code").map_err(map_sqlx_error)?;
    let target: String = row.try_get("target").map_err(map_sqlx_error)?;
    let sequence: u64 = row.try_get("sequence_value").map_err(map_sqlx_error)?;
    let owner: Option<String> = row.try_get("owner").map_err(map_sqlx_error)?;
    let external_id: Option<String> = row.try_get("external_id").map_err(map_sqlx_error)?;
    let created_at: i64 = row.try_get("created_at").map_err(map_sqlx_error)?;
    let expires_at: Option<i64> = row.try_get("expires_at").map_err(map_sqlx_error)?;

    Ok(ShortLink {
        code: ShortCode::new_unchecked(code),
        target,
        sequence,
        created_at: parse_millis("created_at", created_at)?,
        expires_at: expires_at
            .map(|millis| parse_millis("expires_at", millis))
            .transpose()?,
        owner,
        external_id,
    })
}

const EXTERNAL_ID_KEY: &str = "uk_short_links_external_id";

const LINK_COLUMNS: &str = "code, target, sequence_value, owner, external_id, created_at, expires_at";

/// Maps a failed insert of `link` to the storage error it stands for.
fn insert_error(link: &ShortLink, err: sqlx::Error) -> StorageError {
    // MySQL names the violated key in the message.
    let violated_external_id = err
        .as_database_error()
        .filter(|db| db.is_unique_violation())
        .map(|db| db.message().contains(EXTERNAL_ID_KEY));

    match (violated_external_id, &link.external_id) {
        (Some(true), Some(external_id)) => StorageError::DuplicateExternalId(external_id.clone()),
        (Some(_), _) => StorageError::DuplicateCode(link.code.to_string()),
        (None, _) => map_sqlx_error(err),
    }
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

#[async_trait]
impl MappingStore for MySqlStore {
    async fn put(&self, link: &ShortLink) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO short_links
                (code, target, sequence_value, owner, external_id, created_at, expires_at, deleted_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, NULL)
            "#,
        )
        .bind(link.code.as_str())
        .bind(&link.target)
        .bind(link.sequence)
        .bind(link.owner.as_deref())
        .bind(link.external_id.as_deref())
        .bind(link.created_at.as_millisecond())
        .bind(link.expires_at.map(|ts| ts.as_millisecond()))
        .execute(&self.pool)
        .await;

        result.map(|_| ()).map_err(|err| insert_error(link, err))
    }

    async fn get(&self, code: &ShortCode) -> Result<Option<ShortLink>> {
        let sql = format!(
            "SELECT {LINK_COLUMNS} FROM short_links WHERE code = ? AND deleted_at IS NULL LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.as_ref().map(row_to_link).transpose()
    }

    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<ShortLink>> {
        let sql = format!(
            "SELECT {LINK_COLUMNS} FROM short_links \
             WHERE external_id = ? AND deleted_at IS NULL LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.as_ref().map(row_to_link).transpose()
    }

    async fn expire(&self, code: &ShortCode, at: Timestamp) -> Result<bool> {
        let at = at.as_millisecond();

        let result = sqlx::query(
            r#"
            UPDATE short_links
            SET expires_at = ?
            WHERE code = ?
              AND (expires_at IS NULL OR expires_at > ?)
            "#,
        )
        .bind(at)
        .bind(code.as_str())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }
        // Nothing changed: either already expired at or before `at`, or unknown.
        self.exists(code).await
    }

    async fn delete(&self, code: &ShortCode, at: Timestamp) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE short_links
            SET deleted_at = ?, target = '', external_id = NULL
            WHERE code = ?
              AND deleted_at IS NULL
            "#,
        )
        .bind(at.as_millisecond())
        .bind(code.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn exists(&self, code: &ShortCode) -> Result<bool> {
        let exists = sqlx::query(
            r#"
            SELECT 1
            FROM short_links
            WHERE code = ?
            LIMIT 1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .is_some();

        Ok(exists)
    }

    async fn list_by_owner(&self, owner: &str, page: Page) -> Result<Vec<ShortLink>> {
        let sql = format!(
            "SELECT {LINK_COLUMNS} FROM short_links \
             WHERE owner = ? AND deleted_at IS NULL \
             ORDER BY sequence_value LIMIT ? OFFSET ?"
        );
        let rows = sqlx::query(&sql)
            .bind(owner)
            .bind(page.limit as u64)
            .bind(page.offset as u64)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.iter().map(row_to_link).collect()
    }

    async fn list(&self, page: Page) -> Result<Vec<ShortLink>> {
        let sql = format!(
            "SELECT {LINK_COLUMNS} FROM short_links \
             WHERE deleted_at IS NULL \
             ORDER BY sequence_value LIMIT ? OFFSET ?"
        );
        let rows = sqlx::query(&sql)
            .bind(page.limit as u64)
            .bind(page.offset as u64)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.iter().map(row_to_link).collect()
    }
}
