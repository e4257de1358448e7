use hotlink_core::MappingRecord;
use jiff::Timestamp;
use std::time::Duration;
use typed_builder::TypedBuilder;

/// Decides how long a resolved mapping may live in the cache.
///
/// Mappings without an expiration get `default_ttl` plus a bonus that grows
/// with their access count, capped at `max_bonus`. Mappings with an
/// expiration are cached only until that instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TypedBuilder)]
pub struct TtlPolicy {
    #[builder(default = Duration::from_secs(3600))]
    pub default_ttl: Duration,
    /// Extra lifetime granted per recorded access.
    #[builder(default = Duration::from_secs(10))]
    pub bonus_per_access: Duration,
    #[builder(default = Duration::from_secs(86_400))]
    pub max_bonus: Duration,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl TtlPolicy {
    /// `default_ttl + min(access_count * bonus_per_access, max_bonus)`.
    pub fn popularity_ttl(&self, access_count: u64) -> Duration {
        let bonus_secs = self
            .bonus_per_access
            .as_secs()
            .saturating_mul(access_count)
            .min(self.max_bonus.as_secs());
        self.default_ttl + Duration::from_secs(bonus_secs)
    }

    /// Whole seconds left until `expire_at`, or `None` when nothing is left.
    pub fn expiration_ttl(&self, expire_at: Timestamp, now: Timestamp) -> Option<Duration> {
        let remaining_ms = expire_at.as_millisecond() - now.as_millisecond();
        let seconds = remaining_ms / 1000;
        if seconds <= 0 {
            return None;
        }
        Some(Duration::from_secs(seconds.unsigned_abs()))
    }

    /// Cache lifetime for `record` as of `now`. `None` means do not cache.
    pub fn ttl_for(&self, record: &MappingRecord, now: Timestamp) -> Option<Duration> {
        match record.expire_at {
            Some(expire_at) => self.expiration_ttl(expire_at, now),
            None => Some(self.popularity_ttl(record.access_count)),
        }
    }

    /// Upper bound of any popularity-based TTL.
    pub fn max_ttl(&self) -> Duration {
        self.default_ttl + self.max_bonus
    }
}
