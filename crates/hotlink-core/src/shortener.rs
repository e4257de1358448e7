use crate::mapping::{MappingAnalytics, MappingInfo, MappingRecord};
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use jiff::Timestamp;
use std::time::Duration;

type Result<T> = std::result::Result<T, crate::error::ShortenerError>;

/// Expiration policy for a mapping.
#[derive(Debug, Clone)]
pub enum ExpirationPolicy {
    /// The mapping never expires.
    Never,
    /// The mapping expires after a certain duration from now.
    AfterDuration(Duration),
    /// The mapping expires at a specific timestamp.
    AtTimestamp(Timestamp),
}

/// Parameters for creating a mapping.
#[derive(Debug, Clone)]
pub struct ShortenParams {
    /// The URL to be shortened.
    pub target_url: String,
    pub expiration: ExpirationPolicy,
    /// Optional custom alias used instead of a generated code.
    pub custom_alias: Option<ShortCode>,
}

/// Management operations around mappings. Resolution lives elsewhere.
#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Creates a mapping and returns the stored record.
    async fn shorten(&self, params: ShortenParams) -> Result<MappingRecord>;

    /// Deletes a mapping. Returns `Err(NotFound)` if it did not exist.
    async fn delete(&self, code: &ShortCode) -> Result<()>;

    async fn info(&self, code: &ShortCode) -> Result<MappingInfo>;

    async fn analytics(&self, code: &ShortCode) -> Result<MappingAnalytics>;
}
