use async_trait::async_trait;
use chrono::{DateTime, Utc};

use abtrack_core::event::Event;
use abtrack_core::store::{EventPage, EventStore, RangeQuery};

use crate::DuckDbEventStore;

#[async_trait]
impl EventStore for DuckDbEventStore {
    async fn put(&self, event: &Event) -> anyhow::Result<()> {
        DuckDbEventStore::insert_event(self, event).await
    }

    async fn query(
        &self,
        query: &RangeQuery,
        continuation: Option<&str>,
    ) -> anyhow::Result<EventPage> {
        self.query_page(query, continuation).await
    }

    async fn expire(&self, now: DateTime<Utc>) -> anyhow::Result<u64> {
        self.delete_expired(now.timestamp()).await
    }

    async fn ping(&self) -> anyhow::Result<()> {
        DuckDbEventStore::ping(self).await
    }
}
