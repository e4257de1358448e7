use crate::shortcode::ShortCode;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// A stored mapping from a short code to its target URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingRecord {
    pub code: ShortCode,
    /// The URL the short code resolves to.
    pub target_url: String,
    pub created_at: Timestamp,
    /// When the mapping stops resolving, if ever.
    pub expire_at: Option<Timestamp>,
    /// Aggregated access counter. Only moves through batched increments.
    pub access_count: u64,
}

impl MappingRecord {
    /// Creates a fresh mapping with a zero access counter.
    pub fn new(code: ShortCode, target_url: impl Into<String>, expire_at: Option<Timestamp>) -> Self {
        Self {
            code,
            target_url: target_url.into(),
            created_at: Timestamp::now(),
            expire_at,
            access_count: 0,
        }
    }

    /// Whether the mapping is logically deleted at `now`.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.expire_at.is_some_and(|expire_at| now >= expire_at)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Timestamp::now())
    }
}

/// One successful resolution, kept for analytics detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessEvent {
    pub code: ShortCode,
    /// Client address as reported by the caller, or `unknown`.
    pub source: String,
    pub accessed_at: Timestamp,
}

impl AccessEvent {
    pub fn now(code: ShortCode, source: impl Into<String>) -> Self {
        Self {
            code,
            source: source.into(),
            accessed_at: Timestamp::now(),
        }
    }
}

/// A pending counter increment for a single short code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClickDelta {
    pub code: String,
    pub count: u64,
}

impl ClickDelta {
    pub fn new(code: impl Into<String>, count: u64) -> Self {
        Self {
            code: code.into(),
            count,
        }
    }
}

/// Public view of a mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingInfo {
    pub code: ShortCode,
    pub target_url: String,
    pub created_at: Timestamp,
    pub expire_at: Option<Timestamp>,
    /// Number of recorded access events.
    pub click_count: u64,
}

/// [`MappingInfo`] plus the most recent access events, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingAnalytics {
    pub info: MappingInfo,
    pub recent_accesses: Vec<AccessEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::SignedDuration;

    fn record(expire_at: Option<Timestamp>) -> MappingRecord {
        MappingRecord::new(
            ShortCode::new_unchecked("abc"),
            "https://example.com",
            expire_at,
        )
    }

    #[test]
    fn never_expires_without_timestamp() {
        assert!(!record(None).is_expired());
    }

    #[test]
    fn expired_at_boundary() {
        let now = Timestamp::now();
        let rec = record(Some(now));
        assert!(rec.is_expired_at(now));
        assert!(!rec.is_expired_at(now - SignedDuration::from_millis(1)));
    }

    #[test]
    fn new_record_starts_with_zero_count() {
        assert_eq!(record(None).access_count, 0);
    }
}
