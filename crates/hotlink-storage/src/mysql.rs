use async_trait::async_trait;
use hotlink_core::store::Result;
use hotlink_core::{
    AccessEvent, AccessLog, ClickDelta, CounterStore, MappingRecord, MappingStore, ShortCode,
    StorageError,
};
use jiff::Timestamp;
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};
use tracing::debug;

/// Longest client address the access log keeps (an IPv6 literal).
const MAX_SOURCE_LEN: usize = 45;

/// MySQL implementation of the durable store contracts.
///
/// Mappings live in `mappings`, one row per short code, and are removed with
/// a hard delete. Access events go to `access_events` without a foreign key,
/// so analytics detail survives the mapping it refers to. All timestamps are
/// stored as unix milliseconds.
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

    /// Applies the bundled schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Query(format!("migration failed: {e}")))
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

fn parse_millis(column: &str, value: i64) -> Result<Timestamp> {
    Timestamp::from_millisecond(value).map_err(|e| {
        StorageError::InvalidData(format!("invalid {column} timestamp '{value}': {e}"))
    })
}

fn to_db_count(count: u64) -> Result<i64> {
    i64::try_from(count)
        .map_err(|_| StorageError::InvalidData(format!("counter delta {count} out of range")))
}

fn from_db_count(count: i64) -> Result<u64> {
    u64::try_from(count)
        .map_err(|_| StorageError::InvalidData(format!("negative counter value {count}")))
}

fn to_db_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn truncate_source(source: &str) -> &str {
    match source.char_indices().nth(MAX_SOURCE_LEN) {
        Some((end, _)) => &source[..end],
        None => source,
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
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

fn mapping_from_row(row: &MySqlRow) -> Result<MappingRecord> {
    let short_code: String = row.try_get("short_code").map_err(map_sqlx_error)?;
    let target_url: String = row.try_get("target_url").map_err(map_sqlx_error)?;
    let created_at: i64 = row.try_get("created_at").map_err(map_sqlx_error)?;
    let expire_at: Option<i64> = row.try_get("expire_at").map_err(map_sqlx_error)?;
    let access_count: i64 = row.try_get("access_count").map_err(map_sqlx_error)?;

    Ok(MappingRecord {
        code: ShortCode::new_unchecked(short_code),
        target_url,
        created_at: parse_millis("created_at", created_at)?,
        expire_at: expire_at
            .map(|value| parse_millis("expire_at", value))
            .transpose()?,
        access_count: from_db_count(access_count)?,
    })
}

fn event_from_row(row: &MySqlRow) -> Result<AccessEvent> {
    let short_code: String = row.try_get("short_code").map_err(map_sqlx_error)?;
    let source: String = row.try_get("source").map_err(map_sqlx_error)?;
    let accessed_at: i64 = row.try_get("accessed_at").map_err(map_sqlx_error)?;

    Ok(AccessEvent {
        code: ShortCode::new_unchecked(short_code),
        source,
        accessed_at: parse_millis("accessed_at", accessed_at)?,
    })
}

#[async_trait]
impl MappingStore for MySqlStore {
    async fn find_by_key(&self, code: &ShortCode) -> Result<Option<MappingRecord>> {
        let row = sqlx::query(
            r#"
            SELECT short_code, target_url, created_at, expire_at, access_count
            FROM mappings
            WHERE short_code = ?
            LIMIT 1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(mapping_from_row).transpose()
    }

    async fn create_mapping(&self, record: MappingRecord) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO mappings (short_code, target_url, created_at, expire_at, access_count)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.code.as_str())
        .bind(&record.target_url)
        .bind(record.created_at.as_millisecond())
        .bind(record.expire_at.map(|ts| ts.as_millisecond()))
        .bind(to_db_count(record.access_count)?)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => {
                Err(StorageError::Conflict(record.code.to_string()))
            }
            Err(err) => Err(map_sqlx_error(err)),
        }
    }

    async fn delete_mapping(&self, code: &ShortCode) -> Result<bool> {
        let result = sqlx::query("DELETE FROM mappings WHERE short_code = ?")
            .bind(code.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn most_accessed(&self, limit: usize) -> Result<Vec<MappingRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT short_code, target_url, created_at, expire_at, access_count
            FROM mappings
            ORDER BY access_count DESC, short_code ASC
            LIMIT ?
            "#,
        )
        .bind(to_db_limit(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter().map(mapping_from_row).collect()
    }
}

#[async_trait]
impl CounterStore for MySqlStore {
    async fn batch_increment_counters(&self, deltas: &[ClickDelta]) -> Result<()> {
        if deltas.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        for delta in deltas {
            sqlx::query("UPDATE mappings SET access_count = access_count + ? WHERE short_code = ?")
                .bind(to_db_count(delta.count)?)
                .bind(&delta.code)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }
        tx.commit().await.map_err(map_sqlx_error)?;

        debug!(entries = deltas.len(), "Committed counter batch");
        Ok(())
    }
}

#[async_trait]
impl AccessLog for MySqlStore {
    async fn append_access(&self, event: &AccessEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO access_events (short_code, source, accessed_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(event.code.as_str())
        .bind(truncate_source(&event.source))
        .bind(event.accessed_at.as_millisecond())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn access_count(&self, code: &ShortCode) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM access_events WHERE short_code = ?")
                .bind(code.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        from_db_count(count)
    }

    async fn recent_accesses(&self, code: &ShortCode, limit: usize) -> Result<Vec<AccessEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT short_code, source, accessed_at
            FROM access_events
            WHERE short_code = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(code.as_str())
        .bind(to_db_limit(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter().map(event_from_row).collect()
    }
}
