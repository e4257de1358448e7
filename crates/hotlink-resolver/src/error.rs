use hotlink_core::StorageError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ResolveError>;

/// Failures a resolution can surface to its caller.
///
/// Cache trouble never shows up here: the cache layer absorbs it.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// Unknown, malformed, deleted, or expired short code.
    #[error("short code not found")]
    NotFound,
    #[error("resolution unavailable: {0}")]
    Unavailable(#[from] StorageError),
}
