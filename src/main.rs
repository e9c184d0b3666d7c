use std::sync::Arc;

use anyhow::Context;
use tokio::{signal, sync::mpsc};
use tracing::{error, info};

use stockledger_api as api;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config().context("failed to load configuration")?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    // Init DB
    let db_pool = api::db::establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to the database")?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }

    let db_arc = Arc::new(db_pool);

    // Init events
    let (event_tx, event_rx) = mpsc::channel(cfg.event_buffer_size);
    let event_sender = api::events::EventSender::new(event_tx);
    tokio::spawn(api::events::process_events(event_rx));

    // Build services
    let services = api::AppServices::new(db_arc.clone(), Arc::new(event_sender.clone()));

    let state = api::AppState {
        db: db_arc.clone(),
        config: cfg,
        event_sender,
        services,
    };

    api::db::check_connection(&state.db).await?;
    info!(
        environment = %state.config.environment,
        "Stock ledger ready; press Ctrl-C to stop"
    );

    signal::ctrl_c().await?;
    info!("Shutdown signal received");

    drop(state);
    match Arc::try_unwrap(db_arc) {
        Ok(pool) => api::db::close_pool(pool).await?,
        Err(_) => info!("Database pool still shared at shutdown; skipping close"),
    }

    Ok(())
}
