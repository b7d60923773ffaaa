//! In-process [`EventStore`] for local development and tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::event::{format_ts, Event, EventRecord};
use crate::store::{EventPage, EventStore, RangeQuery};

pub const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
struct StoredRow {
    seq: u64,
    record: EventRecord,
    ttl: Option<i64>,
}

#[derive(Debug, Default)]
struct Rows {
    next_seq: u64,
    rows: Vec<StoredRow>,
}

impl Rows {
    fn push(&mut self, record: EventRecord, ttl: Option<i64>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.rows.push(StoredRow { seq, record, ttl });
    }
}

/// Position of the last row handed out: its `ts` and insertion sequence.
///
/// Rows are ordered by `(ts, seq)`, so resuming strictly after this key is
/// unaffected by rows expiring or arriving between pages.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Cursor<'a> {
    ts: &'a str,
    seq: u64,
}

fn encode_cursor(ts: &str, seq: u64) -> String {
    format!("{seq}/{ts}")
}

fn decode_cursor(token: &str) -> Result<Cursor<'_>> {
    let (seq, ts) = token
        .split_once('/')
        .ok_or_else(|| anyhow!("invalid continuation token"))?;
    let seq = seq
        .parse::<u64>()
        .map_err(|_| anyhow!("invalid continuation token"))?;
    Ok(Cursor { ts, seq })
}

/// Events held in a `Vec` behind a `tokio::sync::RwLock`.
///
/// Range queries return at most `page_size` records per call, ordered by `ts`
/// and then by insertion order.
pub struct MemoryEventStore {
    rows: RwLock<Rows>,
    page_size: usize,
}

impl Default for MemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            rows: RwLock::new(Rows::default()),
            page_size: page_size.max(1),
        }
    }

    /// Insert a record as-is, bypassing validation.
    ///
    /// Lets tests and imports seed rows with missing or unexpected fields.
    pub async fn insert_record(&self, record: EventRecord) {
        self.rows.write().await.push(record, None);
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.rows.is_empty()
    }

    /// Snapshot of everything stored, in insertion order.
    pub async fn records(&self) -> Vec<EventRecord> {
        self.rows
            .read()
            .await
            .rows
            .iter()
            .map(|row| row.record.clone())
            .collect()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn put(&self, event: &Event) -> Result<()> {
        self.rows
            .write()
            .await
            .push(EventRecord::from(event), event.ttl);
        Ok(())
    }

    async fn query(&self, query: &RangeQuery, continuation: Option<&str>) -> Result<EventPage> {
        let after = continuation.map(decode_cursor).transpose()?;
        let from = format_ts(&query.from);
        let to = format_ts(&query.to);

        let rows = self.rows.read().await;
        let mut matching: Vec<&StoredRow> = rows
            .rows
            .iter()
            .filter(|row| row.record.experiment_id == query.experiment_id)
            .filter(|row| {
                let ts = row.record.ts.as_str();
                ts >= from.as_str() && ts <= to.as_str()
            })
            .filter(|row| match &after {
                Some(cursor) => {
                    Cursor {
                        ts: &row.record.ts,
                        seq: row.seq,
                    } > *cursor
                }
                None => true,
            })
            .collect();
        matching.sort_by(|a, b| (a.record.ts.as_str(), a.seq).cmp(&(b.record.ts.as_str(), b.seq)));

        let has_more = matching.len() > self.page_size;
        matching.truncate(self.page_size);
        let next = if has_more {
            matching
                .last()
                .map(|row| encode_cursor(&row.record.ts, row.seq))
        } else {
            None
        };
        let items = matching.into_iter().map(|row| row.record.clone()).collect();

        Ok(EventPage { items, next })
    }

    async fn expire(&self, now: DateTime<Utc>) -> Result<u64> {
        let cutoff = now.timestamp();
        let mut rows = self.rows.write().await;
        let before = rows.rows.len();
        rows.rows.retain(|row| row.ttl.map_or(true, |ttl| ttl >= cutoff));
        Ok((before - rows.rows.len()) as u64)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
