use std::sync::Arc;

use anyhow::Result;
use duckdb::Connection;
use tokio::sync::Mutex;
use tracing::info;

use abtrack_core::event::{format_ts, Event, EventRecord};
use abtrack_core::store::{EventPage, RangeQuery};

use crate::cursor::{decode_cursor, encode_cursor};
use crate::schema::{init_sql, SCHEMA_VERSION};

pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// A DuckDB-backed event store.
///
/// DuckDB is single-writer, so the connection sits behind
/// `Arc<tokio::sync::Mutex<_>>`: every call takes the lock for the duration of
/// one statement and the struct is cheap to share across handlers.
///
/// Range queries return at most `page_size` rows and hand back a keyset
/// cursor over `(ts, id)`, so pages stay stable while new events are written.
pub struct DuckDbEventStore {
    pub(crate) conn: Arc<Mutex<Connection>>,
    pub(crate) page_size: usize,
}

impl DuckDbEventStore {
    /// Open (or create) a DuckDB database file at `path`.
    ///
    /// `memory_limit` is a DuckDB size string such as `"1GB"` or `"512MB"`.
    pub fn open(path: &str, memory_limit: &str, page_size: usize) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(&init_sql(memory_limit))?;
        Self::seed_settings_sync(&conn)?;
        info!(path, memory_limit, page_size, "DuckDB event store opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            page_size: page_size.max(1),
        })
    }

    /// Open an **in-memory** DuckDB database.
    ///
    /// Intended for tests only; data is discarded when the struct is dropped.
    pub fn open_in_memory() -> Result<Self> {
        Self::open_in_memory_with_page_size(DEFAULT_PAGE_SIZE)
    }

    pub fn open_in_memory_with_page_size(page_size: usize) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(&init_sql("1GB"))?;
        Self::seed_settings_sync(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            page_size: page_size.max(1),
        })
    }

    fn seed_settings_sync(conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO settings (key, value) VALUES ('version', ?1)",
            duckdb::params![SCHEMA_VERSION],
        )?;
        Ok(())
    }

    /// Insert one event. No existence check: the same logical event written
    /// twice produces two rows.
    pub async fn insert_event(&self, event: &Event) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT INTO events (id, experiment_id, ts, user_id, variant, action, ttl)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            duckdb::params![
                uuid::Uuid::new_v4().to_string(),
                event.experiment_id,
                format_ts(&event.ts),
                event.user_id,
                event.variant,
                event.action.as_str(),
                event.ttl,
            ],
        )?;
        Ok(())
    }

    /// Insert a raw record without validation, e.g. when importing history.
    pub async fn insert_record(&self, record: &EventRecord, ttl: Option<i64>) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT INTO events (id, experiment_id, ts, user_id, variant, action, ttl)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            duckdb::params![
                uuid::Uuid::new_v4().to_string(),
                record.experiment_id,
                record.ts,
                record.user_id,
                record.variant,
                record.action,
                ttl,
            ],
        )?;
        Ok(())
    }

    /// One page of events for `query.experiment_id` with `ts` in
    /// `[query.from, query.to]`, ordered by `(ts, id)`.
    ///
    /// Fetches `page_size + 1` rows to learn whether another page exists
    /// without a separate COUNT.
    pub async fn query_page(
        &self,
        query: &RangeQuery,
        continuation: Option<&str>,
    ) -> Result<EventPage> {
        let mut params: Vec<Box<dyn duckdb::types::ToSql + Send>> = vec![
            Box::new(query.experiment_id.clone()),
            Box::new(format_ts(&query.from)),
            Box::new(format_ts(&query.to)),
        ];

        let mut cursor_clause = String::new();
        if let Some(token) = continuation {
            let cursor = decode_cursor(token)?;
            cursor_clause.push_str(" AND (ts > ?4 OR (ts = ?4 AND id > ?5))");
            params.push(Box::new(cursor.ts));
            params.push(Box::new(cursor.id));
        }

        let limit_plus_one = self.page_size + 1;
        let sql = format!(
            r#"SELECT id, experiment_id, ts, user_id, variant, action
               FROM events
               WHERE experiment_id = ?1
                 AND ts BETWEEN ?2 AND ?3
                 {cursor_clause}
               ORDER BY ts ASC, id ASC
               LIMIT {limit_plus_one}"#
        );

        let conn = self.conn.lock().await;
        let param_refs: Vec<&dyn duckdb::types::ToSql> = params.iter().map(|p| p.as_ref() as &dyn duckdb::types::ToSql).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(param_refs.as_slice(), |row| {
            Ok((
                row.get::<_, String>(0)?,
                EventRecord {
                    experiment_id: row.get(1)?,
                    ts: row.get(2)?,
                    user_id: row.get(3)?,
                    variant: row.get(4)?,
                    action: row.get(5)?,
                },
            ))
        })?;

        let mut fetched = Vec::new();
        for row in rows {
            fetched.push(row?);
        }

        let has_more = fetched.len() > self.page_size;
        if has_more {
            fetched.pop();
        }

        let next = match (has_more, fetched.last()) {
            (true, Some((id, record))) => Some(encode_cursor(&record.ts, id)?),
            _ => None,
        };

        Ok(EventPage {
            items: fetched.into_iter().map(|(_, record)| record).collect(),
            next,
        })
    }

    /// Delete every event whose `ttl` is before `now_epoch` (seconds).
    pub async fn delete_expired(&self, now_epoch: i64) -> Result<u64> {
        let conn = self.conn.lock().await;
        let removed = conn.execute(
            "DELETE FROM events WHERE ttl IS NOT NULL AND ttl < ?1",
            duckdb::params![now_epoch],
        )?;
        if removed > 0 {
            info!(removed, "Expired events deleted");
        }
        Ok(removed as u64)
    }

    /// Execute `SELECT 1` as a lightweight liveness check.
    pub async fn ping(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute_batch("SELECT 1")?;
        Ok(())
    }

    /// Acquire the DuckDB connection lock for direct queries.
    ///
    /// Intended for integration tests that need to verify stored data.
    /// Production code should use the typed methods above.
    pub async fn conn_for_test(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}
