//! Online-event marketplace read service.
//!
//! Serves time-overlap range queries through a month-bucket cache backed
//! by a relational store, and keeps both coherent via a periodic XML
//! ingestion sync.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::get;
use axum::Router;
use clap::Parser;
use events_marketplace_backend::api::routes;
use events_marketplace_backend::cache::fill::FillQueue;
use events_marketplace_backend::cache::{BucketCacheStrategy, RedisBucketStore};
use events_marketplace_backend::composer::Composer;
use events_marketplace_backend::config::AppConfig;
use events_marketplace_backend::provider::ProviderClient;
use events_marketplace_backend::scheduler::Scheduler;
use events_marketplace_backend::store::PostgresStore;
use events_marketplace_backend::sync::SyncPipeline;
use events_marketplace_backend::AppState;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, Parser)]
#[command(name = "events-marketplace", about = "Online-event marketplace read service")]
struct Cli {
    /// Path to a layered config file (without extension), e.g. config/default
    #[arg(long, default_value = "config/default")]
    config: String,

    /// Overrides `server.port` from the resolved configuration.
    #[arg(long)]
    port: Option<u16>,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "events_marketplace_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut cfg = AppConfig::load(Some(&cli.config)).context("failed to load configuration")?;
    if let Some(port) = cli.port {
        cfg.server.port = port;
    }

    info!(config = %cli.config, port = cfg.server.port, "starting events marketplace backend");

    let durable_store = Arc::new(
        PostgresStore::connect(&cfg.store)
            .await
            .context("failed to connect to durable store")?,
    );

    let bucket_store = Arc::new(
        RedisBucketStore::connect(&cfg.cache.redis_url, cfg.cache.key_prefix.clone())
            .await
            .context("failed to connect to bucket store")?,
    );

    let (fill_queue, fill_rx) = FillQueue::new(cfg.cache.fill_queue_capacity);
    tokio::spawn(events_marketplace_backend::cache::fill::run(
        fill_rx,
        bucket_store.clone(),
        cfg.cache.clone(),
    ));
    tokio::spawn(events_marketplace_backend::cache::fill::sample_bucket_count(
        bucket_store.clone(),
        std::time::Duration::from_millis(cfg.sync.interval_ms),
    ));

    let strategy = Arc::new(BucketCacheStrategy::new(
        bucket_store,
        cfg.cache.clone(),
        fill_queue,
    ));

    let composer = Arc::new(Composer::new(strategy.clone(), durable_store.clone()));

    if cfg.sync.enabled {
        let provider = Arc::new(ProviderClient::new(cfg.provider.clone()));
        let pipeline = Arc::new(SyncPipeline::new(provider, strategy, durable_store));
        let scheduler = Scheduler::new(pipeline, std::time::Duration::from_millis(cfg.sync.interval_ms));
        scheduler.spawn();
        info!(interval_ms = cfg.sync.interval_ms, "sync scheduler enabled");
    } else {
        info!("sync scheduler disabled by configuration");
    }

    let metrics_addr = std::net::SocketAddr::from(([0, 0, 0, 0], cfg.server.metrics_port));
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .context("failed to install Prometheus metrics exporter")?;

    let state = AppState { composer };
    let app = Router::new()
        .route("/search", get(routes::search))
        .route("/health", get(routes::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("{}:{}", cfg.server.host, cfg.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
