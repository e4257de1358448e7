use clap::{Parser, ValueEnum};
use hotlink_aggregator::{AggregatorConfig, RetryPolicy};
use hotlink_cache::TtlPolicy;
use hotlink_resolver::DispatcherConfig;
use hotlink_telemetry::{LogFormat, TelemetryConfig};
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::time::Duration;

pub const LISTEN_ADDR_ENV: &str = "HOTLINK_LISTEN_ADDR";
pub const BASE_URL_ENV: &str = "HOTLINK_BASE_URL";
pub const STORAGE_BACKEND_ENV: &str = "HOTLINK_STORAGE_BACKEND";
pub const MYSQL_DSN_ENV: &str = "HOTLINK_MYSQL_DSN";
pub const CACHE_BACKEND_ENV: &str = "HOTLINK_CACHE_BACKEND";
pub const CACHE_CAPACITY_ENV: &str = "HOTLINK_CACHE_CAPACITY";
pub const REDIS_URL_ENV: &str = "HOTLINK_REDIS_URL";
pub const REDIS_KEY_PREFIX_ENV: &str = "HOTLINK_REDIS_KEY_PREFIX";
pub const DEFAULT_TTL_ENV: &str = "HOTLINK_CACHE_DEFAULT_TTL_SECS";
pub const BONUS_PER_ACCESS_ENV: &str = "HOTLINK_CACHE_BONUS_PER_ACCESS_SECS";
pub const MAX_BONUS_ENV: &str = "HOTLINK_CACHE_MAX_BONUS_SECS";
pub const FLUSH_WINDOW_ENV: &str = "HOTLINK_FLUSH_WINDOW_MS";
pub const FLUSH_THRESHOLD_ENV: &str = "HOTLINK_FLUSH_THRESHOLD";
pub const MAX_IN_FLIGHT_ENV: &str = "HOTLINK_FLUSH_MAX_IN_FLIGHT";
pub const RETRY_ATTEMPTS_ENV: &str = "HOTLINK_RETRY_ATTEMPTS";
pub const RETRY_BACKOFF_ENV: &str = "HOTLINK_RETRY_BACKOFF_MS";
pub const QUEUE_CAPACITY_ENV: &str = "HOTLINK_DISPATCH_QUEUE_CAPACITY";
pub const WARMUP_LIMIT_ENV: &str = "HOTLINK_WARMUP_LIMIT";
pub const SHUTDOWN_GRACE_ENV: &str = "HOTLINK_SHUTDOWN_GRACE_SECS";
pub const GENERATOR_ENV: &str = "HOTLINK_GENERATOR";
pub const GENERATOR_PREFIX_ENV: &str = "HOTLINK_GENERATOR_PREFIX";
pub const GENERATOR_OFFSET_ENV: &str = "HOTLINK_GENERATOR_OFFSET";
pub const LOG_FORMAT_ENV: &str = "HOTLINK_LOG_FORMAT";
pub const OTLP_ENDPOINT_ENV: &str = "HOTLINK_OTLP_ENDPOINT";

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
pub const DEFAULT_REDIS_KEY_PREFIX: &str = "hl:url:";
pub const DEFAULT_GENERATOR_PREFIX: &str = "hl";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "mysql")]
    Mysql,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::Mysql => write!(f, "mysql"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheBackendArg {
    #[value(name = "memory")]
    Memory,
    #[value(name = "redis")]
    Redis,
}

impl Display for CacheBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheBackendArg::Memory => write!(f, "memory"),
            CacheBackendArg::Redis => write!(f, "redis"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GeneratorArg {
    #[value(name = "random")]
    Random,
    #[value(name = "seq")]
    Seq,
}

impl Display for GeneratorArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GeneratorArg::Random => write!(f, "random"),
            GeneratorArg::Seq => write!(f, "seq"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Plain,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Plain => LogFormat::Plain,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "hotlink-gateway")]
pub struct CLI {
    #[arg(long, env = LISTEN_ADDR_ENV, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    /// Prefix for the short URLs returned by the API.
    #[arg(long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::InMemory
    )]
    pub storage: StorageBackendArg,

    #[arg(long, env = MYSQL_DSN_ENV, required_if_eq("storage", "mysql"))]
    pub mysql_dsn: Option<String>,

    #[arg(
        long,
        env = CACHE_BACKEND_ENV,
        value_enum,
        default_value_t = CacheBackendArg::Memory
    )]
    pub cache: CacheBackendArg,

    /// Entry limit of the in-process cache. 0 leaves it unbounded so entries
    /// only leave on TTL; a non-zero limit also evicts by size.
    #[arg(long, env = CACHE_CAPACITY_ENV, default_value_t = 0)]
    pub cache_capacity: u64,

    #[arg(long, env = REDIS_URL_ENV, default_value = DEFAULT_REDIS_URL)]
    pub redis_url: String,

    #[arg(long, env = REDIS_KEY_PREFIX_ENV, default_value = DEFAULT_REDIS_KEY_PREFIX)]
    pub redis_key_prefix: String,

    #[arg(long, env = DEFAULT_TTL_ENV, default_value_t = 3600)]
    pub cache_default_ttl_secs: u64,

    #[arg(long, env = BONUS_PER_ACCESS_ENV, default_value_t = 10)]
    pub cache_bonus_per_access_secs: u64,

    #[arg(long, env = MAX_BONUS_ENV, default_value_t = 86_400)]
    pub cache_max_bonus_secs: u64,

    #[arg(long, env = FLUSH_WINDOW_ENV, default_value_t = 1000)]
    pub flush_window_ms: u64,

    #[arg(long, env = FLUSH_THRESHOLD_ENV, default_value_t = 50)]
    pub flush_threshold: usize,

    #[arg(long, env = MAX_IN_FLIGHT_ENV, default_value_t = 5)]
    pub flush_max_in_flight: usize,

    #[arg(long, env = RETRY_ATTEMPTS_ENV, default_value_t = 5)]
    pub retry_attempts: u32,

    #[arg(long, env = RETRY_BACKOFF_ENV, default_value_t = 2000)]
    pub retry_backoff_ms: u64,

    #[arg(long, env = QUEUE_CAPACITY_ENV, default_value_t = 10_000)]
    pub dispatch_queue_capacity: usize,

    /// Most accessed mappings to preload into the cache. 0 disables warm-up.
    #[arg(long, env = WARMUP_LIMIT_ENV, default_value_t = 1000)]
    pub warmup_limit: usize,

    #[arg(long, env = SHUTDOWN_GRACE_ENV, default_value_t = 10)]
    pub shutdown_grace_secs: u64,

    /// How new short codes are produced when no alias is given.
    #[arg(long, env = GENERATOR_ENV, value_enum, default_value_t = GeneratorArg::Random)]
    pub generator: GeneratorArg,

    /// Prefix of sequential codes. Only used with `--generator seq`.
    #[arg(long, env = GENERATOR_PREFIX_ENV, default_value = DEFAULT_GENERATOR_PREFIX)]
    pub generator_prefix: String,

    /// First counter value of sequential codes. Restarting a sequential
    /// gateway on persistent storage needs an offset past the issued codes.
    #[arg(long, env = GENERATOR_OFFSET_ENV, default_value_t = 0)]
    pub generator_offset: u64,

    #[arg(long, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormatArg::Plain)]
    pub log_format: LogFormatArg,

    #[arg(long, env = OTLP_ENDPOINT_ENV)]
    pub otlp_endpoint: Option<String>,
}

impl CLI {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn ttl_policy(&self) -> TtlPolicy {
        TtlPolicy::builder()
            .default_ttl(Duration::from_secs(self.cache_default_ttl_secs))
            .bonus_per_access(Duration::from_secs(self.cache_bonus_per_access_secs))
            .max_bonus(Duration::from_secs(self.cache_max_bonus_secs))
            .build()
    }

    pub fn aggregator_config(&self) -> AggregatorConfig {
        let retry = RetryPolicy::builder()
            .max_attempts(self.retry_attempts)
            .initial_backoff(Duration::from_millis(self.retry_backoff_ms))
            .build();

        AggregatorConfig::builder()
            .flush_window(Duration::from_millis(self.flush_window_ms))
            .flush_threshold(self.flush_threshold)
            .max_in_flight(self.flush_max_in_flight)
            .retry(retry)
            .shutdown_grace(self.shutdown_grace())
            .build()
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig::builder()
            .queue_capacity(self.dispatch_queue_capacity)
            .build()
    }

    pub fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            service_name: "hotlink-gateway".to_string(),
            format: self.log_format.into(),
            default_filter: "info,tower_http=debug".to_string(),
            otlp_endpoint: self.otlp_endpoint.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_random_codes_and_an_unbounded_cache() {
        let cli = CLI::try_parse_from(["hotlink-gateway"]).unwrap();
        assert_eq!(cli.generator, GeneratorArg::Random);
        assert_eq!(cli.cache_capacity, 0);
        assert_eq!(cli.storage, StorageBackendArg::InMemory);
    }

    #[test]
    fn sequential_generator_options() {
        let cli = CLI::try_parse_from([
            "hotlink-gateway",
            "--generator",
            "seq",
            "--generator-prefix",
            "go",
            "--generator-offset",
            "500",
        ])
        .unwrap();
        assert_eq!(cli.generator, GeneratorArg::Seq);
        assert_eq!(cli.generator_prefix, "go");
        assert_eq!(cli.generator_offset, 500);
    }

    #[test]
    fn unknown_generator_is_rejected() {
        assert!(CLI::try_parse_from(["hotlink-gateway", "--generator", "uuid"]).is_err());
    }

    #[test]
    fn mysql_requires_dsn() {
        assert!(CLI::try_parse_from(["hotlink-gateway", "--storage", "mysql"]).is_err());
    }
}
