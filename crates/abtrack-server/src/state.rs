use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};

use abtrack_core::{collector::Collector, config::Config, store::EventStore};

/// Shared application state injected into every Axum handler via
/// [`axum::extract::State`].
///
/// The store is constructed once at startup and handed to the collector; no
/// handler reaches for a global client.
pub struct AppState {
    /// The event store shared by the writer, the aggregator and the TTL sweep.
    pub store: Arc<dyn EventStore>,

    /// Dispatches collect requests to the writer or the aggregator.
    pub collector: Arc<Collector>,

    /// Parsed configuration, loaded once at startup from environment variables.
    pub config: Arc<Config>,
}

impl AppState {
    /// Construct a new `AppState` wrapping the given store and config.
    pub fn new(store: Arc<dyn EventStore>, config: Config) -> Self {
        let collector = Collector::from_config(Arc::clone(&store), &config);
        Self {
            store,
            collector: Arc::new(collector),
            config: Arc::new(config),
        }
    }

    /// Delete expired events once. Returns the number removed, or 0 on error.
    pub async fn expire_events(&self) -> u64 {
        match self.store.expire(Utc::now()).await {
            Ok(removed) => {
                if removed > 0 {
                    info!(removed, "TTL sweep removed expired events");
                }
                removed
            }
            Err(e) => {
                error!(error = %e, "TTL sweep failed");
                0
            }
        }
    }

    /// Background loop: delete expired events on a fixed interval.
    ///
    /// Returns immediately when the sweep is disabled
    /// (`ABTRACK_EXPIRY_INTERVAL_SECS=0`). A failed sweep is logged and the
    /// loop keeps running.
    pub async fn run_expiry_loop(self: Arc<Self>) {
        let Some(period) = self.config.expiry_interval() else {
            info!("TTL sweep disabled");
            return;
        };
        let mut interval = tokio::time::interval(period);
        // The first tick fires immediately; skip it so startup is not delayed by a sweep.
        interval.tick().await;
        loop {
            interval.tick().await;
            self.expire_events().await;
        }
    }
}
