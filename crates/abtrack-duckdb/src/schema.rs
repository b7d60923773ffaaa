/// DuckDB initialization SQL.
///
/// Executed once at database open time via `Connection::execute_batch`.
/// All statements use `IF NOT EXISTS` so they are safe to re-run on every
/// startup.
///
/// `memory_limit` comes from `Config.duckdb_memory_limit`
/// (env `ABTRACK_DUCKDB_MEMORY`, default `"1GB"`).
///
/// `ts` is stored as VARCHAR in the fixed-width `YYYY-MM-DDTHH:MM:SS.mmmZ`
/// form written by `abtrack_core::event::format_ts`, so string comparison is
/// chronological and `BETWEEN` on the index works without casts.
/// `user_id`, `variant` and `action` are nullable: imported historical rows
/// may lack them and the aggregator tolerates that.
pub fn init_sql(memory_limit: &str) -> String {
    format!(
        r#"SET memory_limit = '{memory_limit}';
SET threads = 2;

-- Keys stored in this table:
--   'version'  – schema version
CREATE TABLE IF NOT EXISTS settings (
    key             VARCHAR PRIMARY KEY,
    value           VARCHAR NOT NULL
);

CREATE TABLE IF NOT EXISTS events (
    id              VARCHAR PRIMARY KEY,           -- UUID v4, pagination tie-break
    experiment_id   VARCHAR NOT NULL,
    ts              VARCHAR NOT NULL,              -- ISO-8601, millisecond precision, UTC
    user_id         VARCHAR,
    variant         VARCHAR,
    action          VARCHAR,                       -- 'log_impression' | 'log_click'
    ttl             BIGINT                         -- epoch seconds; NULL = never expires
);
-- Range query: WHERE experiment_id = ? AND ts BETWEEN ? AND ? ORDER BY ts, id
CREATE INDEX IF NOT EXISTS idx_events_experiment_ts
    ON events(experiment_id, ts);
CREATE INDEX IF NOT EXISTS idx_events_ttl
    ON events(ttl);
"#
    )
}

pub const SCHEMA_VERSION: &str = "1";
