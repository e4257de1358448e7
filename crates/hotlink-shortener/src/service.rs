use crate::generator::Generator;
use async_trait::async_trait;
use hotlink_cache::CacheLayer;
use hotlink_core::{
    AccessLog, ExpirationPolicy, MappingAnalytics, MappingInfo, MappingRecord, MappingStore,
    ShortCode, ShortenParams, Shortener, ShortenerError, StorageError,
};
use jiff::{SignedDuration, Timestamp};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Path segments owned by the HTTP surface. Codes equal to one of these,
/// ignoring case, would be shadowed by the route and are never handed out.
pub const RESERVED_ROUTES: [&str; 5] = ["health", "shorten", "info", "delete", "analytics"];

const MAX_GENERATION_ATTEMPTS: usize = 10;
const RECENT_ACCESS_LIMIT: usize = 5;

type Result<T> = std::result::Result<T, ShortenerError>;

/// Creates, inspects and deletes mappings.
///
/// New mappings are written to the store and then primed into the cache so
/// the first resolution is already a hit. Click counts come from the
/// access log, not from the aggregated counter column.
#[derive(Debug)]
pub struct ShortenerService<S, G> {
    store: Arc<S>,
    generator: Arc<G>,
    cache: CacheLayer,
}

impl<S, G> Clone for ShortenerService<S, G> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            generator: Arc::clone(&self.generator),
            cache: self.cache.clone(),
        }
    }
}

impl<S, G> ShortenerService<S, G>
where
    S: MappingStore + AccessLog,
    G: Generator,
{
    pub fn new(store: Arc<S>, generator: G, cache: CacheLayer) -> Self {
        Self {
            store,
            generator: Arc::new(generator),
            cache,
        }
    }

    /// Accepts absolute http(s) URLs with a non-empty host.
    fn validate_url(url: &str) -> Result<()> {
        if url.is_empty() {
            return Err(ShortenerError::InvalidUrl("URL cannot be empty".to_string()));
        }
        if url.chars().any(char::is_whitespace) {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL must not contain whitespace: {url}"
            )));
        }

        let Some((scheme, rest)) = url.split_once("://") else {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL must have a valid scheme and host: {url}"
            )));
        };

        let scheme = scheme.to_ascii_lowercase();
        if scheme != "http" && scheme != "https" {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL scheme must be http or https: {scheme}"
            )));
        }

        let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
        let host = authority.rsplit('@').next().unwrap_or_default();
        let host = host.split(':').next().unwrap_or_default();
        if host.is_empty() {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL must have a host: {url}"
            )));
        }

        Ok(())
    }

    fn is_reserved(code: &str) -> bool {
        RESERVED_ROUTES
            .iter()
            .any(|route| route.eq_ignore_ascii_case(code))
    }

    fn expire_at(expiration: ExpirationPolicy, now: Timestamp) -> Result<Option<Timestamp>> {
        let expire_at = match expiration {
            ExpirationPolicy::Never => return Ok(None),
            ExpirationPolicy::AfterDuration(duration) => {
                let span = SignedDuration::try_from(duration).map_err(|e| {
                    ShortenerError::InvalidExpiration(format!("duration out of range: {e}"))
                })?;
                now.checked_add(span).map_err(|e| {
                    ShortenerError::InvalidExpiration(format!("duration out of range: {e}"))
                })?
            }
            ExpirationPolicy::AtTimestamp(timestamp) => timestamp,
        };

        if expire_at <= now {
            return Err(ShortenerError::InvalidExpiration(format!(
                "expiration must be in the future: {expire_at}"
            )));
        }
        Ok(Some(expire_at))
    }

    async fn insert_alias(&self, record: MappingRecord) -> Result<MappingRecord> {
        let code = record.code.clone();
        if Self::is_reserved(code.as_str()) {
            return Err(ShortenerError::ReservedAlias(code.to_string()));
        }
        if self.store.find_by_key(&code).await?.is_some() {
            return Err(ShortenerError::AliasConflict(code.to_string()));
        }

        match self.store.create_mapping(record.clone()).await {
            Ok(()) => Ok(record),
            // Lost a race with a concurrent request for the same alias
            Err(StorageError::Conflict(_)) => Err(ShortenerError::AliasConflict(code.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn insert_generated(
        &self,
        target_url: String,
        expire_at: Option<Timestamp>,
    ) -> Result<MappingRecord> {
        for attempt in 1..=MAX_GENERATION_ATTEMPTS {
            let code = self.generator.generate();
            if Self::is_reserved(code.as_str()) {
                trace!(code = %code, attempt, "Generated code is a reserved route");
                continue;
            }

            let record = MappingRecord::new(code, target_url.clone(), expire_at);
            match self.store.create_mapping(record.clone()).await {
                Ok(()) => return Ok(record),
                Err(StorageError::Conflict(_)) => {
                    debug!(code = %record.code, attempt, "Generated code collided");
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(
            attempts = MAX_GENERATION_ATTEMPTS,
            "Unable to generate a unique short code"
        );
        Err(ShortenerError::CodeSpaceExhausted(MAX_GENERATION_ATTEMPTS))
    }

    /// Loads a live mapping. Expired mappings are deleted and reported as missing.
    async fn live_mapping(&self, code: &ShortCode) -> Result<MappingRecord> {
        let record = self
            .store
            .find_by_key(code)
            .await?
            .ok_or(ShortenerError::NotFound)?;

        if record.is_expired() {
            debug!(code = %code, "Mapping has expired, deleting");
            if let Err(e) = self.store.delete_mapping(code).await {
                warn!(code = %code, error = %e, "Failed to delete expired mapping");
            }
            self.cache.delete(code.as_str()).await;
            return Err(ShortenerError::NotFound);
        }
        Ok(record)
    }
}

#[async_trait]
impl<S, G> Shortener for ShortenerService<S, G>
where
    S: MappingStore + AccessLog,
    G: Generator,
{
    async fn shorten(&self, params: ShortenParams) -> Result<MappingRecord> {
        Self::validate_url(&params.target_url)?;
        let expire_at = Self::expire_at(params.expiration, Timestamp::now())?;

        let record = match params.custom_alias {
            Some(alias) => {
                self.insert_alias(MappingRecord::new(alias, params.target_url, expire_at))
                    .await?
            }
            None => self.insert_generated(params.target_url, expire_at).await?,
        };

        if !self.cache.populate(&record).await {
            debug!(code = %record.code, "New mapping expires too soon to cache");
        }

        info!(
            code = %record.code,
            expire_at = ?record.expire_at,
            "Created mapping"
        );
        Ok(record)
    }

    async fn delete(&self, code: &ShortCode) -> Result<()> {
        if !self.store.delete_mapping(code).await? {
            return Err(ShortenerError::NotFound);
        }
        self.cache.delete(code.as_str()).await;
        info!(code = %code, "Deleted mapping");
        Ok(())
    }

    async fn info(&self, code: &ShortCode) -> Result<MappingInfo> {
        let record = self.live_mapping(code).await?;
        let click_count = self.store.access_count(code).await?;

        Ok(MappingInfo {
            code: record.code,
            target_url: record.target_url,
            created_at: record.created_at,
            expire_at: record.expire_at,
            click_count,
        })
    }

    async fn analytics(&self, code: &ShortCode) -> Result<MappingAnalytics> {
        let info = self.info(code).await?;
        let recent_accesses = self
            .store
            .recent_accesses(code, RECENT_ACCESS_LIMIT)
            .await?;

        Ok(MappingAnalytics {
            info,
            recent_accesses,
        })
    }
}
