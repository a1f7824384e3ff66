use rusqlite::Connection;

use crate::error::Result;

pub fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- Version tracking
        CREATE TABLE IF NOT EXISTS tip_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- Core tables
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            speaker TEXT NOT NULL,
            organization TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'draft',
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        );

        CREATE TABLE IF NOT EXISTS org_members (
            organization TEXT NOT NULL,
            member TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'member',
            PRIMARY KEY (organization, member)
        );

        -- Append-only transcript pieces; the pipeline never rewrites these
        CREATE TABLE IF NOT EXISTS segments (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
            segment_index INTEGER NOT NULL DEFAULT 0,
            text TEXT NOT NULL DEFAULT '',
            start_time REAL,
            end_time REAL,
            confidence REAL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        );

        -- Versioned insight rows; the current set is the highest
        -- transcript_version for a session
        CREATE TABLE IF NOT EXISTS insights (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
            kind TEXT NOT NULL,
            content TEXT NOT NULL DEFAULT '',
            timestamp_seconds REAL,
            last_processed_word_count INTEGER NOT NULL DEFAULT 0,
            transcript_version INTEGER NOT NULL,
            session_status_at_write TEXT NOT NULL DEFAULT 'live',
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        );

        -- Run ledger (counts and versions only, no content)
        CREATE TABLE IF NOT EXISTS pipeline_runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT NOT NULL,
            mode TEXT NOT NULL,
            status TEXT NOT NULL,
            words_total INTEGER NOT NULL DEFAULT 0,
            words_new INTEGER NOT NULL DEFAULT 0,
            version INTEGER,
            error_kind TEXT,
            started_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
            completed_at TEXT
        );

        -- Indexes for common filters
        CREATE INDEX IF NOT EXISTS idx_sessions_status ON sessions(status);
        CREATE INDEX IF NOT EXISTS idx_sessions_org ON sessions(organization);
        CREATE INDEX IF NOT EXISTS idx_segments_session ON segments(session_id, segment_index);
        CREATE INDEX IF NOT EXISTS idx_insights_session_version
            ON insights(session_id, transcript_version);
        CREATE INDEX IF NOT EXISTS idx_runs_session ON pipeline_runs(session_id, started_at);
        ",
    )?;

    // Set schema version
    conn.execute(
        "INSERT OR REPLACE INTO tip_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}
