use hotlink_core::{AccessEvent, MappingAnalytics, MappingInfo};
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: Timestamp,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUrlRequest {
    #[serde(default)]
    pub original_url: String,
    pub expires_at: Option<Timestamp>,
    /// Lifetime in seconds, as an alternative to `expiresAt`.
    pub expires_in: Option<u64>,
    pub alias: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUrlResponse {
    pub short_code: String,
    pub short_url: String,
    pub original_url: String,
    pub created_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Timestamp>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlInfoResponse {
    pub short_code: String,
    pub short_url: String,
    pub original_url: String,
    pub created_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Timestamp>,
    pub click_count: u64,
}

impl UrlInfoResponse {
    pub fn new(info: MappingInfo, short_url: String) -> Self {
        Self {
            short_code: info.code.to_string(),
            short_url,
            original_url: info.target_url,
            created_at: info.created_at,
            expires_at: info.expire_at,
            click_count: info.click_count,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickEntry {
    pub timestamp: Timestamp,
    pub ip_address: String,
}

impl From<AccessEvent> for ClickEntry {
    fn from(event: AccessEvent) -> Self {
        Self {
            timestamp: event.accessed_at,
            ip_address: event.source,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlAnalyticsResponse {
    #[serde(flatten)]
    pub info: UrlInfoResponse,
    pub recent_clicks: Vec<ClickEntry>,
}

impl UrlAnalyticsResponse {
    pub fn new(analytics: MappingAnalytics, short_url: String) -> Self {
        Self {
            info: UrlInfoResponse::new(analytics.info, short_url),
            recent_clicks: analytics
                .recent_accesses
                .into_iter()
                .map(ClickEntry::from)
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteUrlResponse {
    pub message: String,
}
