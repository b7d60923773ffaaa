use std::sync::Arc;

use anyhow::anyhow;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use tracing::{debug, info};

use crate::error::CollectError;
use crate::event::{format_ts, parse_ts};
use crate::request::CollectRequest;
use crate::stats::{StatsFold, StatsWindow, Window};
use crate::store::{EventStore, RangeQuery};

pub const DEFAULT_MAX_PAGES: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Start,
    End,
}

/// Parse one window bound.
///
/// Accepts RFC 3339 with any offset, a date-time without offset (read as UTC)
/// and a bare date. A bare date is midnight as `from` and the last stored
/// millisecond of that day as `to`, so `"to": "2025-08-31"` covers the 31st.
fn parse_bound(raw: &str, edge: Edge) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Some(ts) = parse_ts(raw) {
        return Some(ts);
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    let naive = match edge {
        Edge::Start => date.and_hms_opt(0, 0, 0),
        Edge::End => date.and_hms_milli_opt(23, 59, 59, 999),
    }?;
    Some(Utc.from_utc_datetime(&naive))
}

/// Resolve the query window from optional caller bounds.
///
/// Missing `to` defaults to `now`; missing `from` defaults to `default_span`
/// before `now`. Supplied bounds must be ISO-8601 and `from` must not be
/// after `to`.
pub fn resolve_window(
    from: Option<&str>,
    to: Option<&str>,
    now: DateTime<Utc>,
    default_span: Duration,
) -> Result<(DateTime<Utc>, DateTime<Utc>), CollectError> {
    let parse = |raw: &str, field: &str, edge: Edge| {
        parse_bound(raw, edge).ok_or_else(|| {
            CollectError::validation(format!("{field} must be an ISO-8601 timestamp"))
        })
    };
    let from = match from {
        Some(raw) => parse(raw, "from", Edge::Start)?,
        None => now.checked_sub_signed(default_span).ok_or_else(|| {
            CollectError::TimeOutOfRange(format!(
                "default window of {default_span} before {now} is out of range"
            ))
        })?,
    };
    let to = match to {
        Some(raw) => parse(raw, "to", Edge::End)?,
        None => now,
    };
    if from > to {
        return Err(CollectError::validation("from must be on or before to"));
    }
    Ok((from, to))
}

/// Computes per-variant and overall statistics for one experiment by scanning
/// every page of a range query.
///
/// Aggregation is all-or-nothing: a failed page drops the partial counters and
/// returns [`CollectError::Store`].
pub struct StatsAggregator {
    store: Arc<dyn EventStore>,
    default_window: Duration,
    max_pages: usize,
}

impl StatsAggregator {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self {
            store,
            default_window: Duration::days(30),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    pub fn with_default_window(mut self, window: Duration) -> Self {
        self.default_window = window;
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub async fn get_stats(&self, req: &CollectRequest) -> Result<StatsWindow, CollectError> {
        self.get_stats_at(req, Utc::now()).await
    }

    pub async fn get_stats_at(
        &self,
        req: &CollectRequest,
        now: DateTime<Utc>,
    ) -> Result<StatsWindow, CollectError> {
        let experiment_id = req
            .experiment_id()
            .ok_or_else(|| CollectError::validation("Missing required field: experimentId"))?;
        let (from, to) = resolve_window(req.window_from(), req.window_to(), now, self.default_window)?;

        let query = RangeQuery {
            experiment_id: experiment_id.to_string(),
            from,
            to,
        };
        let mut fold = StatsFold::new();
        let mut continuation: Option<String> = None;
        let mut pages = 0usize;

        loop {
            if pages >= self.max_pages {
                return Err(CollectError::Store(anyhow!(
                    "range query for {experiment_id} exceeded {} pages",
                    self.max_pages
                )));
            }
            let page = self
                .store
                .query(&query, continuation.as_deref())
                .await
                .map_err(CollectError::Store)?;
            pages += 1;
            debug!(
                experiment_id,
                page = pages,
                items = page.items.len(),
                has_more = page.next.is_some(),
                "stats page fetched"
            );

            for record in &page.items {
                fold.fold(record);
            }

            match page.next {
                Some(token) => continuation = Some(token),
                None => break,
            }
        }

        info!(experiment_id, pages, records = fold.records(), "stats aggregated");

        let window = Window {
            from: format_ts(&from),
            to: format_ts(&to),
        };
        Ok(fold.finish(experiment_id, window))
    }
}
