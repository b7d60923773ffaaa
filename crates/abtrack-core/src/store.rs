//! Persistence collaborator abstraction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::event::{Event, EventRecord};

/// A range scan over the `(experiment_id, ts)` index. Both bounds are inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeQuery {
    pub experiment_id: String,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// One page of a range query.
///
/// `next` is an opaque continuation token; `None` means the result set is
/// exhausted. A page may be empty and still carry a token.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventPage {
    pub items: Vec<EventRecord>,
    pub next: Option<String>,
}

/// Durable event storage with an indexed, paginated range query.
///
/// Implementations enforce their own page size; callers must keep re-issuing
/// [`query`](EventStore::query) with the returned token until it is `None`.
#[async_trait]
pub trait EventStore: Send + Sync + 'static {
    /// Unconditional insert. Duplicates are accepted.
    async fn put(&self, event: &Event) -> anyhow::Result<()>;

    async fn query(
        &self,
        query: &RangeQuery,
        continuation: Option<&str>,
    ) -> anyhow::Result<EventPage>;

    /// Delete records whose `ttl` lies before `now`. Returns the number removed.
    async fn expire(&self, now: DateTime<Utc>) -> anyhow::Result<u64>;

    /// Lightweight liveness check.
    async fn ping(&self) -> anyhow::Result<()>;
}
