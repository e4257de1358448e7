mod url;

pub use url::{
    ClickEntry, CreateUrlRequest, CreateUrlResponse, DeleteUrlResponse, HealthResponse,
    UrlAnalyticsResponse, UrlInfoResponse,
};
