use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use estate_cms::api::{build_router, AppState};
use estate_cms::config::Config;
use estate_cms::idempotency::IdempotencySweeper;
use estate_cms::index::{NoopIndex, SearchIndex};
use estate_cms::scheduler::{SchedulerService, SchedulerWorker};
use estate_cms::services::EntityServices;
use estate_cms::store::Stores;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("estate_cms=info,tower_http=info")),
        )
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env();

    let (stores, _memory) = Stores::in_memory();
    let index: Arc<dyn SearchIndex> = Arc::new(NoopIndex);
    let services = Arc::new(EntityServices::new(stores.clone(), index.clone()));
    let scheduler = Arc::new(SchedulerService::new(stores.clone()));

    let worker = Arc::new(SchedulerWorker::new(
        stores.clone(),
        services.clone(),
        index.clone(),
        config.scheduler_interval,
        config.scheduler_batch_size,
    ));
    let sweeper = IdempotencySweeper::new(stores.idempotency.clone(), config.sweep_interval);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(worker.run(shutdown_rx.clone()));
    tokio::spawn(sweeper.run(shutdown_rx));

    let state = AppState {
        stores,
        services,
        scheduler,
        idempotency_ttl: config.idempotency_ttl,
    };
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr.as_str()).await?;
    info!("listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    Ok(())
}
