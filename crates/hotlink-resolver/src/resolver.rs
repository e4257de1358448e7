use crate::Result;
use async_trait::async_trait;
use hotlink_core::ShortCode;

/// Where a resolution was answered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
    Cache,
    Store,
}

/// A successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub target_url: String,
    pub served_from: ServedFrom,
}

#[async_trait]
pub trait Resolver: Send + Sync + 'static {
    /// Resolves `code` to its target URL on behalf of the client at `source`.
    ///
    /// Every `Ok` result has been reported as exactly one access.
    async fn resolve(&self, code: &ShortCode, source: &str) -> Result<Resolution>;
}
