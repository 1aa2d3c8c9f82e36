//! SQL schema for the presence SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS visitors (
    visitor_id    TEXT PRIMARY KEY,
    session_key   TEXT NOT NULL,
    ip_address    TEXT NOT NULL,
    user_ref      TEXT,             -- NULL for anonymous visitors
    user_agent    TEXT NOT NULL,
    referrer      TEXT NOT NULL,
    url           TEXT NOT NULL,
    page_views    INTEGER NOT NULL DEFAULT 0 CHECK (page_views >= 0),
    session_start TEXT,             -- RFC 3339 UTC
    last_update   TEXT NOT NULL,    -- RFC 3339 UTC, fixed width
    UNIQUE (session_key, ip_address)
);

CREATE INDEX IF NOT EXISTS visitors_last_update_idx ON visitors(last_update);
CREATE INDEX IF NOT EXISTS visitors_agent_idx       ON visitors(ip_address, user_agent);

-- Scalar values shared between processes (the reaper's last-run time).
CREATE TABLE IF NOT EXISTS cache_entries (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

PRAGMA user_version = 1;
";
