mod cli;

use crate::cli::{CacheBackendArg, GeneratorArg, StorageBackendArg, CLI};
use anyhow::Context;
use clap::Parser;
use hotlink_aggregator::AccessAggregator;
use hotlink_cache::{CacheBackend, CacheLayer, MokaCacheBackend, RedisCacheBackend};
use hotlink_core::{AccessLog, CounterStore, MappingStore, ShortCode, Shortener};
use hotlink_gateway::{App, AppState};
use hotlink_resolver::{AccessDispatcher, CacheWarmer, ResolutionService};
use hotlink_shortener::{RandomGenerator, SequentialGenerator, ShortenerService};
use hotlink_storage::{InMemoryStore, MySqlStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let config = CLI::try_parse()?;
    let _telemetry = hotlink_telemetry::init(&config.telemetry_config())?;

    info!(
        listen_addr = %config.listen_addr,
        storage_backend = %config.storage,
        cache_backend = %config.cache,
        generator = %config.generator,
        "starting hotlink gateway"
    );

    let backend: Arc<dyn CacheBackend> = match config.cache {
        CacheBackendArg::Memory => Arc::new(MokaCacheBackend::with_capacity(config.cache_capacity)),
        CacheBackendArg::Redis => Arc::new(
            RedisCacheBackend::connect(&config.redis_url)
                .await
                .context("failed to connect to redis")?
                .with_prefix(config.redis_key_prefix.clone()),
        ),
    };
    let cache = CacheLayer::new(backend, config.ttl_policy());

    match config.storage {
        StorageBackendArg::InMemory => serve(&config, Arc::new(InMemoryStore::new()), cache).await,
        StorageBackendArg::Mysql => {
            let mysql_dsn = config
                .mysql_dsn
                .as_deref()
                .context("mysql dsn is required when storage backend is mysql")?;
            let store = MySqlStore::connect(mysql_dsn)
                .await
                .context("failed to connect to mysql")?;
            store.migrate().await.context("failed to run migrations")?;
            serve(&config, Arc::new(store), cache).await
        }
    }
}

async fn serve<S>(config: &CLI, store: Arc<S>, cache: CacheLayer) -> anyhow::Result<()>
where
    S: MappingStore + CounterStore + AccessLog,
{
    let aggregator = Arc::new(AccessAggregator::new(
        Arc::clone(&store),
        config.aggregator_config(),
    ));
    aggregator.start();

    let dispatcher = Arc::new(AccessDispatcher::spawn(
        aggregator.clone(),
        Arc::clone(&store),
        config.dispatcher_config(),
    ));

    if config.warmup_limit > 0 {
        CacheWarmer::new(Arc::clone(&store), cache.clone())
            .warm(config.warmup_limit)
            .await;
    }

    let resolver = Arc::new(ResolutionService::new(
        Arc::clone(&store),
        cache.clone(),
        dispatcher.clone(),
    ));
    let shortener: Arc<dyn Shortener> = match config.generator {
        GeneratorArg::Random => Arc::new(ShortenerService::new(store, RandomGenerator::new(), cache)),
        GeneratorArg::Seq => {
            let first = format!("{}{:06}", config.generator_prefix, config.generator_offset);
            ShortCode::new(first).context("invalid sequential generator prefix")?;
            Arc::new(ShortenerService::new(
                store,
                SequentialGenerator::with_offset(
                    config.generator_prefix.clone(),
                    config.generator_offset,
                ),
                cache,
            ))
        }
    };
    let state = AppState::new(resolver, shortener, config.base_url.clone());

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!(listen_addr = %listener.local_addr()?, "gateway listening");

    axum::serve(
        listener,
        App::router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("http server failed")?;

    let grace = config.shutdown_grace();
    dispatcher.shutdown(grace).await;
    aggregator.stop(grace).await;

    let stats = aggregator.stats();
    info!(
        flushed_batches = stats.flushed_batches,
        flushed_accesses = stats.flushed_accesses,
        dropped_batches = stats.dropped_batches,
        dropped_accesses = stats.dropped_accesses,
        dropped_events = dispatcher.dropped_events(),
        "gateway stopped"
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received, draining");
}
