//! Single entry point that routes a collect request by its `action` field.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::aggregator::StatsAggregator;
use crate::config::Config;
use crate::error::CollectError;
use crate::event::Event;
use crate::request::CollectRequest;
use crate::stats::StatsWindow;
use crate::store::EventStore;
use crate::writer::EventWriter;

/// Successful outcome of [`Collector::dispatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum CollectResponse {
    Logged(Event),
    Stats(StatsWindow),
}

/// Owns the writer and aggregator, both sharing one injected store.
pub struct Collector {
    writer: EventWriter,
    aggregator: StatsAggregator,
}

impl Collector {
    pub fn from_config(store: Arc<dyn EventStore>, config: &Config) -> Self {
        Self {
            writer: EventWriter::new(Arc::clone(&store), config.event_ttl()),
            aggregator: StatsAggregator::new(store)
                .with_default_window(config.default_window())
                .with_max_pages(config.max_pages),
        }
    }

    pub async fn dispatch(&self, req: CollectRequest) -> Result<CollectResponse, CollectError> {
        self.dispatch_at(req, Utc::now()).await
    }

    pub async fn dispatch_at(
        &self,
        req: CollectRequest,
        now: DateTime<Utc>,
    ) -> Result<CollectResponse, CollectError> {
        match req.action() {
            Some("log_impression") | Some("log_click") => self
                .writer
                .write_at(&req, now)
                .await
                .map(CollectResponse::Logged),
            Some("get_stats") => self
                .aggregator
                .get_stats_at(&req, now)
                .await
                .map(CollectResponse::Stats),
            other => Err(CollectError::UnknownAction(other.map(str::to_string))),
        }
    }
}
