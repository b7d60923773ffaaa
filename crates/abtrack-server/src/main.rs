use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use abtrack_core::{
    config::{Config, StoreBackend},
    memory::MemoryEventStore,
    store::EventStore,
};
use abtrack_duckdb::DuckDbEventStore;
use abtrack_server::state::AppState;

fn open_store(cfg: &Config) -> Result<Arc<dyn EventStore>> {
    match cfg.store {
        StoreBackend::DuckDb => {
            std::fs::create_dir_all(&cfg.data_dir)?;
            let db_path = format!("{}/abtrack.db", cfg.data_dir);
            let store = DuckDbEventStore::open(&db_path, &cfg.duckdb_memory_limit, cfg.page_size)?;
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory event store; events are lost on restart");
            Ok(Arc::new(MemoryEventStore::with_page_size(cfg.page_size)))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise structured JSON logging. Level controlled via RUST_LOG env var.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("abtrack=info".parse()?),
        )
        .json()
        .init();

    let cfg = Config::from_env()?;
    let store = open_store(&cfg)?;
    let state = Arc::new(AppState::new(store, cfg.clone()));

    // Spawn background TTL sweep.
    {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            state.run_expiry_loop().await;
        });
    }

    let addr = format!("0.0.0.0:{}", cfg.port);
    let app = abtrack_server::app::build_app(Arc::clone(&state));

    info!(
        port = cfg.port,
        store = ?cfg.store,
        ttl_days = cfg.event_ttl_days,
        "abtrack listening on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    Ok(())
}
