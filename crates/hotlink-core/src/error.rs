use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache operation timed out: {0}")]
    Timeout(String),
    #[error("cache value is invalid: {0}")]
    InvalidData(String),
    #[error("cache operation failed: {0}")]
    Operation(String),
}

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("short code already exists: {0}")]
    Conflict(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
}

impl StorageError {
    /// Whether retrying the same operation later may succeed.
    ///
    /// Conflicts and malformed rows will fail the same way on every attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StorageError::Unavailable(_) | StorageError::Timeout(_) | StorageError::Query(_)
        )
    }
}

#[derive(Debug, Clone, Error)]
pub enum ShortenerError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("invalid short code: {0}")]
    InvalidShortCode(String),
    #[error("alias conflicts with a reserved route: {0}")]
    ReservedAlias(String),
    #[error("alias already exists: {0}")]
    AliasConflict(String),
    #[error("invalid expiration: {0}")]
    InvalidExpiration(String),
    #[error("unable to generate a unique short code after {0} attempts")]
    CodeSpaceExhausted(usize),
    #[error("short code not found")]
    NotFound,
    #[error("storage operation failed: {0}")]
    Storage(#[from] StorageError),
}
