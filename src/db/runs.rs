//! Pipeline run ledger. Every invocation leaves a row: skipped, completed,
//! or failed, with word counts and the version it produced. Content never
//! lands here.

use rusqlite::Connection;

use super::models::RunRecord;
use crate::error::Result;

/// Record the start of a synthesis run. Returns the run ID.
pub fn start_run(
    conn: &Connection,
    session_id: &str,
    mode: &str,
    words_total: usize,
    words_new: i64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO pipeline_runs (session_id, mode, status, words_total, words_new, started_at)
         VALUES (?1, ?2, 'running', ?3, ?4, strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))",
        rusqlite::params![session_id, mode, words_total, words_new],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Mark a run completed with the version it wrote.
pub fn complete_run(conn: &Connection, run_id: i64, version: i64) -> Result<()> {
    conn.execute(
        "UPDATE pipeline_runs SET
            status = 'completed',
            version = ?2,
            completed_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
         WHERE id = ?1",
        rusqlite::params![run_id, version],
    )?;
    Ok(())
}

/// Mark a run failed with a stable error label.
pub fn fail_run(conn: &Connection, run_id: i64, error_kind: &str) -> Result<()> {
    conn.execute(
        "UPDATE pipeline_runs SET
            status = 'failed',
            error_kind = ?2,
            completed_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
         WHERE id = ?1",
        rusqlite::params![run_id, error_kind],
    )?;
    Ok(())
}

/// Record an invocation that evaluated the thresholds and stood down.
/// `mode` is the mode the run would have used.
pub fn record_skip(
    conn: &Connection,
    session_id: &str,
    mode: &str,
    words_total: usize,
    words_new: i64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO pipeline_runs
            (session_id, mode, status, words_total, words_new, started_at, completed_at)
         VALUES (?1, ?2, 'skipped', ?3, ?4,
                 strftime('%Y-%m-%dT%H:%M:%SZ', 'now'),
                 strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))",
        rusqlite::params![session_id, mode, words_total, words_new],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Most recent runs, newest first, optionally for one session.
pub fn recent_runs(
    conn: &Connection,
    session_id: Option<&str>,
    limit: usize,
) -> Result<Vec<RunRecord>> {
    let mut runs = Vec::new();
    match session_id {
        Some(sid) => {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, mode, status, words_total, words_new, version,
                        error_kind, started_at, completed_at
                 FROM pipeline_runs WHERE session_id = ?1
                 ORDER BY id DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(rusqlite::params![sid, limit as i64], run_from_row)?;
            for row in rows {
                runs.push(row?);
            }
        }
        None => {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, mode, status, words_total, words_new, version,
                        error_kind, started_at, completed_at
                 FROM pipeline_runs ORDER BY id DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map([limit as i64], run_from_row)?;
            for row in rows {
                runs.push(row?);
            }
        }
    }
    Ok(runs)
}

fn run_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        session_id: row.get(1)?,
        mode: row.get(2)?,
        status: row.get(3)?,
        words_total: row.get(4)?,
        words_new: row.get(5)?,
        version: row.get(6)?,
        error_kind: row.get(7)?,
        started_at: row.get(8)?,
        completed_at: row.get(9)?,
    })
}
