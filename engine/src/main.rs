//! Scan engine: keeps every registered website's report fresh.

use anyhow::Context;
use sitescan_browser::{BrowserPool, ChromiumFactory, PoolConfig};
use sitescan_core::{AppConfig, ScanJob};
use sitescan_db::SqliteStore;
use sitescan_scanner::{
    build_client, JsonSecurityData, NoSecurityData, ScanOrchestrator, ScanSettings,
    SecurityDataSource,
};
use sitescan_scheduler::{JobConsumer, JobQueue, MemoryQueue, ResultStore, StaleJobRequeuer};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sitescan=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

async fn security_source(config: &AppConfig) -> anyhow::Result<Arc<dyn SecurityDataSource>> {
    match &config.security.data_path {
        Some(path) => {
            let data = JsonSecurityData::load(Path::new(path))
                .await
                .with_context(|| format!("loading security data from {path}"))?;
            Ok(Arc::new(data))
        }
        None => {
            info!("No security data configured; security aspect will be not applicable");
            Ok(Arc::new(NoSecurityData))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    info!("Starting scan engine v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load_with_env().context("loading configuration")?;

    let store = Arc::new(
        SqliteStore::new(&config.database.path)
            .await
            .context("opening result store")?,
    );
    store.run_migrations().await.context("migrating result store")?;

    let pool = BrowserPool::new(
        ChromiumFactory::new(config.pool.headless),
        PoolConfig::from(&config.pool),
    );
    pool.warm_up().await.context("warming up browser pool")?;

    let http = build_client(
        &config.scanning.user_agent,
        config.scanning.analyzer_timeout(),
    )?;
    let orchestrator = Arc::new(ScanOrchestrator::new(
        pool,
        http,
        security_source(&config).await?,
        ScanSettings::from(&config.scanning),
    ));
    let reaper = orchestrator
        .pool()
        .spawn_reaper(config.pool.reaper_interval());

    let queue = Arc::new(MemoryQueue::new(config.consumer.max_attempts));
    let websites = store.all_websites().await?;
    for website in &websites {
        queue
            .enqueue(ScanJob::new(website.id, website.url.clone()))
            .await?;
    }
    info!("Enqueued {} website(s) for the initial pass", websites.len());

    let shutdown = CancellationToken::new();

    let requeuer = StaleJobRequeuer::new(
        store.clone(),
        queue.clone(),
        config.requeue.max_age(),
    );
    let requeue_task = tokio::spawn({
        let shutdown = shutdown.clone();
        let interval = config.requeue.interval();
        async move { requeuer.run(interval, shutdown).await }
    });

    let consumer = Arc::new(JobConsumer::new(
        orchestrator.clone(),
        queue.clone(),
        store.clone(),
        config.consumer.concurrency,
    ));
    let consumer_task = tokio::spawn(consumer.run(shutdown.clone()));

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("Shutdown requested");

    shutdown.cancel();
    queue.close();
    if let Err(e) = consumer_task.await {
        warn!("Consumer task ended abnormally: {}", e);
    }
    if let Err(e) = requeue_task.await {
        warn!("Requeue task ended abnormally: {}", e);
    }

    let dead = queue.dead_letters();
    if !dead.is_empty() {
        warn!("{} job(s) exhausted their retries", dead.len());
    }

    reaper.abort();
    orchestrator.pool().shutdown().await;
    store.close().await;
    info!("Scan engine stopped");
    Ok(())
}
