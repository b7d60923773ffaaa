use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::error::CollectError;
use crate::event::{Event, EventAction};
use crate::request::CollectRequest;
use crate::store::EventStore;

const MISSING_FIELDS: &str = "Missing required fields: experimentId, userId, variant, action";

/// Validates impressions and clicks and appends them to the store.
pub struct EventWriter {
    store: Arc<dyn EventStore>,
    ttl: Option<Duration>,
}

impl EventWriter {
    /// `ttl` is how long a written event lives; `None` writes events without expiry.
    pub fn new(store: Arc<dyn EventStore>, ttl: Option<Duration>) -> Self {
        Self { store, ttl }
    }

    pub async fn write(&self, req: &CollectRequest) -> Result<Event, CollectError> {
        self.write_at(req, Utc::now()).await
    }

    /// Same as [`write`](Self::write) with an explicit write time.
    pub async fn write_at(
        &self,
        req: &CollectRequest,
        now: DateTime<Utc>,
    ) -> Result<Event, CollectError> {
        let event = self.build_event(req, now)?;
        self.store.put(&event).await.map_err(CollectError::Store)?;
        debug!(
            experiment_id = %event.experiment_id,
            variant = %event.variant,
            action = event.action.as_str(),
            "event logged"
        );
        Ok(event)
    }

    fn build_event(&self, req: &CollectRequest, now: DateTime<Utc>) -> Result<Event, CollectError> {
        let (Some(experiment_id), Some(user_id), Some(variant), Some(raw_action)) = (
            req.experiment_id(),
            req.user_id(),
            req.variant(),
            req.action(),
        ) else {
            return Err(CollectError::validation(MISSING_FIELDS));
        };
        let action = EventAction::parse(raw_action).ok_or_else(|| {
            CollectError::validation("action must be one of: log_impression, log_click")
        })?;

        let ttl = match self.ttl {
            Some(ttl) => Some(
                now.checked_add_signed(ttl)
                    .ok_or_else(|| {
                        CollectError::TimeOutOfRange(format!(
                            "event expiry {ttl} after {now} is out of range"
                        ))
                    })?
                    .timestamp(),
            ),
            None => None,
        };

        Ok(Event {
            user_id: user_id.to_string(),
            ts: now,
            experiment_id: experiment_id.to_string(),
            variant: variant.to_string(),
            action,
            ttl,
        })
    }
}
