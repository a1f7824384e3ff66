pub mod models;
pub mod runs;
pub mod schema;

use rusqlite::{Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{PipelineError, Result};
use crate::policy::RunMode;
use models::*;

pub struct Database {
    pub conn: Connection,
    pub path: PathBuf,
}

/// Inputs for one versioned insight replacement.
#[derive(Debug)]
pub struct ReplaceRequest<'a> {
    pub session_id: &'a str,
    pub mode: RunMode,
    /// Version the caller last observed; the write aborts if the stored
    /// maximum differs.
    pub expected_version: i64,
    pub word_count: i64,
    pub status: SessionStatus,
    pub set: &'a InsightSet,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplaceOutcome {
    pub version: i64,
    pub rows_written: usize,
    pub stale_rows_removed: usize,
    /// True when stale-row cleanup failed; the new version was still written.
    pub cleanup_warning: bool,
}

impl Database {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Performance pragmas; busy_timeout covers concurrent invocations
        // sharing the file under WAL
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;
             PRAGMA cache_size = -64000;",
        )?;

        schema::create_schema(&conn)?;

        info!("Opened database: {}", path.display());

        Ok(Database {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Default database path: ~/.tip/tip.db
    pub fn default_db_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| PipelineError::Config {
            message: "Could not determine home directory".to_string(),
        })?;
        Ok(home.join(".tip").join("tip.db"))
    }

    // ---- sessions ----

    pub fn insert_session(&self, s: &NewSession) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sessions (id, title, speaker, organization, status)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![s.id, s.title, s.speaker, s.organization, s.status.as_str()],
        )?;
        Ok(())
    }

    pub fn get_session(&self, id: &str) -> Result<Option<SessionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, speaker, organization, status, created_at, updated_at
             FROM sessions WHERE id = ?1",
        )?;
        let result = stmt.query_row([id], session_from_row).optional()?;
        Ok(result)
    }

    pub fn list_sessions(&self, status: Option<SessionStatus>) -> Result<Vec<SessionRecord>> {
        let mut sessions = Vec::new();
        match status {
            Some(st) => {
                let mut stmt = self.conn.prepare(
                    "SELECT id, title, speaker, organization, status, created_at, updated_at
                     FROM sessions WHERE status = ?1 ORDER BY created_at DESC, id",
                )?;
                let rows = stmt.query_map([st.as_str()], session_from_row)?;
                for row in rows {
                    sessions.push(row?);
                }
            }
            None => {
                let mut stmt = self.conn.prepare(
                    "SELECT id, title, speaker, organization, status, created_at, updated_at
                     FROM sessions ORDER BY created_at DESC, id",
                )?;
                let rows = stmt.query_map([], session_from_row)?;
                for row in rows {
                    sessions.push(row?);
                }
            }
        }
        Ok(sessions)
    }

    /// Update a session's lifecycle status. Returns false if the session
    /// does not exist.
    pub fn set_session_status(&self, id: &str, status: SessionStatus) -> Result<bool> {
        let updated = self.conn.execute(
            "UPDATE sessions
             SET status = ?2, updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
             WHERE id = ?1",
            rusqlite::params![id, status.as_str()],
        )?;
        Ok(updated > 0)
    }

    // ---- org membership ----

    pub fn grant_role(&self, organization: &str, member: &str, role: &str) -> Result<()> {
        if !matches!(role, "admin" | "organizer" | "member") {
            return Err(PipelineError::Validation {
                message: format!(
                    "unknown role '{role}' (expected admin, organizer, or member)"
                ),
            });
        }
        self.conn.execute(
            "INSERT OR REPLACE INTO org_members (organization, member, role)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![organization, member, role],
        )?;
        Ok(())
    }

    pub fn role_of(&self, organization: &str, member: &str) -> Result<Option<String>> {
        let role = self
            .conn
            .query_row(
                "SELECT role FROM org_members WHERE organization = ?1 AND member = ?2",
                rusqlite::params![organization, member],
                |r| r.get(0),
            )
            .optional()?;
        Ok(role)
    }

    // ---- segments ----

    /// Append segments to a session, continuing its index sequence.
    /// Segments are never updated or deleted once written.
    pub fn append_segments(&self, session_id: &str, segs: &[NewSegment]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;

        let mut next_index: i64 = tx.query_row(
            "SELECT COALESCE(MAX(segment_index) + 1, 0) FROM segments WHERE session_id = ?1",
            [session_id],
            |r| r.get(0),
        )?;

        for seg in segs {
            tx.execute(
                "INSERT INTO segments (id, session_id, segment_index, text, start_time, end_time, confidence)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    uuid::Uuid::new_v4().to_string(),
                    session_id,
                    next_index,
                    seg.text,
                    seg.start_time,
                    seg.end_time,
                    seg.confidence,
                ],
            )?;
            next_index += 1;
        }

        tx.commit()?;
        Ok(segs.len())
    }

    pub fn get_segments(&self, session_id: &str) -> Result<Vec<SegmentRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_id, segment_index, text, start_time, end_time, confidence, created_at
             FROM segments WHERE session_id = ?1 ORDER BY segment_index",
        )?;

        let rows = stmt.query_map([session_id], |row| {
            Ok(SegmentRecord {
                id: row.get(0)?,
                session_id: row.get(1)?,
                segment_index: row.get(2)?,
                text: row.get(3)?,
                start_time: row.get(4)?,
                end_time: row.get(5)?,
                confidence: row.get(6)?,
                created_at: row.get(7)?,
            })
        })?;

        let mut segments = Vec::new();
        for row in rows {
            segments.push(row?);
        }
        Ok(segments)
    }

    // ---- insights ----

    /// Highest stored transcript version for a session, 0 when none.
    pub fn current_version(&self, session_id: &str) -> Result<i64> {
        let version = self.conn.query_row(
            "SELECT COALESCE(MAX(transcript_version), 0) FROM insights WHERE session_id = ?1",
            [session_id],
            |r| r.get(0),
        )?;
        Ok(version)
    }

    /// Rows of the current (highest) version only.
    pub fn current_insights(&self, session_id: &str) -> Result<Vec<InsightRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_id, kind, content, timestamp_seconds, last_processed_word_count,
                    transcript_version, session_status_at_write, created_at, updated_at
             FROM insights
             WHERE session_id = ?1
               AND transcript_version =
                   (SELECT MAX(transcript_version) FROM insights WHERE session_id = ?1)
             ORDER BY kind, rowid",
        )?;

        let rows = stmt.query_map([session_id], insight_from_row)?;
        let mut insights = Vec::new();
        for row in rows {
            insights.push(row?);
        }
        Ok(insights)
    }

    /// Every stored insight row for a session, oldest version first.
    pub fn insight_rows(&self, session_id: &str) -> Result<Vec<InsightRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_id, kind, content, timestamp_seconds, last_processed_word_count,
                    transcript_version, session_status_at_write, created_at, updated_at
             FROM insights WHERE session_id = ?1
             ORDER BY transcript_version, rowid",
        )?;

        let rows = stmt.query_map([session_id], insight_from_row)?;
        let mut insights = Vec::new();
        for row in rows {
            insights.push(row?);
        }
        Ok(insights)
    }

    /// Latest insight state, or None for sessions never summarized.
    pub fn latest_snapshot(&self, session_id: &str) -> Result<Option<InsightSnapshot>> {
        let version = self.current_version(session_id)?;
        if version == 0 {
            return Ok(None);
        }
        let records = self.current_insights(session_id)?;
        let last_processed_word_count = records
            .first()
            .map(|r| r.last_processed_word_count)
            .unwrap_or(0);
        Ok(Some(InsightSnapshot {
            version,
            last_processed_word_count,
            set: InsightSet::from_records(&records),
        }))
    }

    /// Replace a session's insights with a new version, atomically.
    ///
    /// The stored maximum version must still equal `expected_version` or the
    /// write fails with a version conflict and mutates nothing. Stale-row
    /// deletion is best effort: on a full rewrite or a completed session all
    /// prior rows go, otherwise only the immediately previous version's rows.
    /// A failed deletion is logged and flagged, never blocks the insert.
    pub fn replace_insights(&self, req: &ReplaceRequest) -> Result<ReplaceOutcome> {
        if req.set.is_empty() {
            return Err(PipelineError::Validation {
                message: format!(
                    "refusing to write an empty insight set for session {}",
                    req.session_id
                ),
            });
        }

        let tx = self.conn.unchecked_transaction()?;

        let found: i64 = tx.query_row(
            "SELECT COALESCE(MAX(transcript_version), 0) FROM insights WHERE session_id = ?1",
            [req.session_id],
            |r| r.get(0),
        )?;
        if found != req.expected_version {
            return Err(PipelineError::VersionConflict {
                session_id: req.session_id.to_string(),
                expected: req.expected_version,
                found,
            });
        }

        let new_version = req.expected_version + 1;
        let wipe_all = req.mode == RunMode::Full || req.status.is_completed();

        let mut cleanup_warning = false;
        let cleanup = if wipe_all {
            tx.execute(
                "DELETE FROM insights WHERE session_id = ?1",
                [req.session_id],
            )
        } else {
            tx.execute(
                "DELETE FROM insights WHERE session_id = ?1 AND transcript_version = ?2",
                rusqlite::params![req.session_id, req.expected_version],
            )
        };
        let stale_rows_removed = match cleanup {
            Ok(n) => n,
            Err(e) => {
                warn!(
                    session_id = %req.session_id,
                    version = new_version,
                    error = %e,
                    "stale insight cleanup failed; writing new version anyway"
                );
                cleanup_warning = true;
                0
            }
        };

        let mut rows_written = 0usize;
        let status_str = req.status.as_str();

        if !req.set.summary.is_empty() {
            tx.execute(
                "INSERT INTO insights (id, session_id, kind, content, timestamp_seconds,
                                       last_processed_word_count, transcript_version, session_status_at_write)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    uuid::Uuid::new_v4().to_string(),
                    req.session_id,
                    InsightKind::Summary.as_str(),
                    req.set.summary,
                    Option::<f64>::None,
                    req.word_count,
                    new_version,
                    status_str,
                ],
            )?;
            rows_written += 1;
        }

        let groups = [
            (InsightKind::KeyPoint, &req.set.key_points),
            (InsightKind::ActionItem, &req.set.action_items),
            (InsightKind::Quote, &req.set.quotes),
        ];
        for (kind, items) in groups {
            for item in items {
                tx.execute(
                    "INSERT INTO insights (id, session_id, kind, content, timestamp_seconds,
                                           last_processed_word_count, transcript_version, session_status_at_write)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    rusqlite::params![
                        uuid::Uuid::new_v4().to_string(),
                        req.session_id,
                        kind.as_str(),
                        item.text,
                        item.timestamp,
                        req.word_count,
                        new_version,
                        status_str,
                    ],
                )?;
                rows_written += 1;
            }
        }

        tx.commit()?;

        Ok(ReplaceOutcome {
            version: new_version,
            rows_written,
            stale_rows_removed,
            cleanup_warning,
        })
    }

    /// Get database statistics.
    pub fn stats(&self) -> Result<DbStats> {
        let sessions: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |r| r.get(0))?;
        let segments: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM segments", [], |r| r.get(0))?;
        let insights: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM insights", [], |r| r.get(0))?;
        let insight_versions: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM (SELECT DISTINCT session_id, transcript_version FROM insights)",
            [],
            |r| r.get(0),
        )?;
        let runs: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pipeline_runs", [], |r| r.get(0))?;
        let organizations: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT organization) FROM sessions",
            [],
            |r| r.get(0),
        )?;

        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM sessions GROUP BY status ORDER BY status")?;
        let status_rows = stmt.query_map([], |row| {
            Ok(StatusCount {
                status: row.get(0)?,
                count: row.get(1)?,
            })
        })?;
        let mut statuses = Vec::new();
        for row in status_rows {
            statuses.push(row?);
        }

        let db_size_bytes = std::fs::metadata(&self.path)
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(DbStats {
            sessions,
            segments,
            insights,
            insight_versions,
            runs,
            organizations,
            statuses,
            db_size_bytes,
        })
    }
}

fn session_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRecord> {
    let status: String = row.get(4)?;
    Ok(SessionRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        speaker: row.get(2)?,
        organization: row.get(3)?,
        status: SessionStatus::parse(&status).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn insight_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<InsightRecord> {
    let kind: String = row.get(2)?;
    Ok(InsightRecord {
        id: row.get(0)?,
        session_id: row.get(1)?,
        kind: InsightKind::parse(&kind).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?,
        content: row.get(3)?,
        timestamp_seconds: row.get(4)?,
        last_processed_word_count: row.get(5)?,
        transcript_version: row.get(6)?,
        session_status_at_write: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (Database, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("tip.db")).unwrap();
        (db, dir)
    }

    fn seed_session(db: &Database, id: &str, status: SessionStatus) {
        db.insert_session(&NewSession {
            id: id.to_string(),
            title: "Scaling Rust services".to_string(),
            speaker: "ana".to_string(),
            organization: "rustconf".to_string(),
            status,
        })
        .unwrap();
    }

    fn sample_set() -> InsightSet {
        InsightSet {
            summary: "Talk covers service scaling tactics.".to_string(),
            key_points: vec![
                InsightItem::new("Connection pooling matters"),
                InsightItem::new("Measure before sharding"),
            ],
            action_items: vec![InsightItem::new("Try the profiler demo")],
            quotes: vec![InsightItem::timed("Measure twice, shard once", 95.0)],
        }
    }

    #[test]
    fn session_round_trip() {
        let (db, _dir) = test_db();
        seed_session(&db, "s-1", SessionStatus::Live);

        let found = db.get_session("s-1").unwrap().unwrap();
        assert_eq!(found.title, "Scaling Rust services");
        assert_eq!(found.status, SessionStatus::Live);
        assert!(db.get_session("nope").unwrap().is_none());

        assert!(db.set_session_status("s-1", SessionStatus::Completed).unwrap());
        let found = db.get_session("s-1").unwrap().unwrap();
        assert_eq!(found.status, SessionStatus::Completed);
        assert!(!db.set_session_status("nope", SessionStatus::Live).unwrap());
    }

    #[test]
    fn list_sessions_filters_by_status() {
        let (db, _dir) = test_db();
        seed_session(&db, "s-1", SessionStatus::Live);
        seed_session(&db, "s-2", SessionStatus::Completed);

        assert_eq!(db.list_sessions(None).unwrap().len(), 2);
        let live = db.list_sessions(Some(SessionStatus::Live)).unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id, "s-1");
    }

    #[test]
    fn segments_keep_their_append_order() {
        let (db, _dir) = test_db();
        seed_session(&db, "s-1", SessionStatus::Live);

        let first = vec![
            NewSegment {
                text: "hello everyone".to_string(),
                start_time: Some(0.0),
                end_time: Some(4.0),
                confidence: Some(0.94),
            },
            NewSegment {
                text: "welcome to the talk".to_string(),
                start_time: Some(4.0),
                end_time: Some(8.0),
                confidence: None,
            },
        ];
        assert_eq!(db.append_segments("s-1", &first).unwrap(), 2);

        let more = vec![NewSegment {
            text: "first topic is pooling".to_string(),
            start_time: Some(8.0),
            end_time: None,
            confidence: None,
        }];
        db.append_segments("s-1", &more).unwrap();

        let segs = db.get_segments("s-1").unwrap();
        assert_eq!(segs.len(), 3);
        assert_eq!(
            segs.iter().map(|s| s.segment_index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(segs[2].text, "first topic is pooling");
    }

    #[test]
    fn roles_round_trip_and_reject_junk() {
        let (db, _dir) = test_db();
        db.grant_role("rustconf", "omar", "admin").unwrap();
        db.grant_role("rustconf", "pia", "member").unwrap();

        assert_eq!(db.role_of("rustconf", "omar").unwrap().as_deref(), Some("admin"));
        assert_eq!(db.role_of("rustconf", "pia").unwrap().as_deref(), Some("member"));
        assert!(db.role_of("rustconf", "ghost").unwrap().is_none());

        let err = db.grant_role("rustconf", "x", "owner").unwrap_err();
        assert!(matches!(err, PipelineError::Validation { .. }));

        // re-grant overwrites
        db.grant_role("rustconf", "pia", "organizer").unwrap();
        assert_eq!(
            db.role_of("rustconf", "pia").unwrap().as_deref(),
            Some("organizer")
        );
    }

    #[test]
    fn first_replace_writes_version_one() {
        let (db, _dir) = test_db();
        seed_session(&db, "s-1", SessionStatus::Live);

        assert!(db.latest_snapshot("s-1").unwrap().is_none());

        let set = sample_set();
        let outcome = db
            .replace_insights(&ReplaceRequest {
                session_id: "s-1",
                mode: RunMode::Full,
                expected_version: 0,
                word_count: 240,
                status: SessionStatus::Live,
                set: &set,
            })
            .unwrap();

        assert_eq!(outcome.version, 1);
        assert_eq!(outcome.rows_written, 5);
        assert_eq!(outcome.stale_rows_removed, 0);
        assert!(!outcome.cleanup_warning);

        let snap = db.latest_snapshot("s-1").unwrap().unwrap();
        assert_eq!(snap.version, 1);
        assert_eq!(snap.last_processed_word_count, 240);
        assert_eq!(snap.set, set);
    }

    #[test]
    fn inserted_rows_carry_both_timestamps() {
        let (db, _dir) = test_db();
        seed_session(&db, "s-1", SessionStatus::Live);

        db.replace_insights(&ReplaceRequest {
            session_id: "s-1",
            mode: RunMode::Full,
            expected_version: 0,
            word_count: 240,
            status: SessionStatus::Live,
            set: &sample_set(),
        })
        .unwrap();

        let rows = db.insight_rows("s-1").unwrap();
        assert!(!rows.is_empty());
        for row in &rows {
            assert!(!row.created_at.is_empty());
            // fresh rows: both stamps come from the same insert
            assert_eq!(row.updated_at, row.created_at);
        }
    }

    #[test]
    fn incremental_replace_removes_only_the_previous_version() {
        let (db, _dir) = test_db();
        seed_session(&db, "s-1", SessionStatus::Live);

        let v1 = sample_set();
        db.replace_insights(&ReplaceRequest {
            session_id: "s-1",
            mode: RunMode::Full,
            expected_version: 0,
            word_count: 240,
            status: SessionStatus::Live,
            set: &v1,
        })
        .unwrap();

        let mut v2 = sample_set();
        v2.summary = "Updated running summary.".to_string();
        let outcome = db
            .replace_insights(&ReplaceRequest {
                session_id: "s-1",
                mode: RunMode::Incremental,
                expected_version: 1,
                word_count: 560,
                status: SessionStatus::Live,
                set: &v2,
            })
            .unwrap();

        assert_eq!(outcome.version, 2);
        assert_eq!(outcome.stale_rows_removed, 5);

        let rows = db.insight_rows("s-1").unwrap();
        assert!(rows.iter().all(|r| r.transcript_version == 2));
        assert_eq!(rows.len(), 5);

        let snap = db.latest_snapshot("s-1").unwrap().unwrap();
        assert_eq!(snap.set.summary, "Updated running summary.");
        assert_eq!(snap.last_processed_word_count, 560);
    }

    #[test]
    fn completed_replace_wipes_every_version() {
        let (db, _dir) = test_db();
        seed_session(&db, "s-1", SessionStatus::Live);

        db.replace_insights(&ReplaceRequest {
            session_id: "s-1",
            mode: RunMode::Full,
            expected_version: 0,
            word_count: 240,
            status: SessionStatus::Live,
            set: &sample_set(),
        })
        .unwrap();

        // orphan row from an older version that a failed cleanup left behind
        db.conn
            .execute(
                "INSERT INTO insights (id, session_id, kind, content, transcript_version)
                 VALUES ('orphan', 's-1', 'key_point', 'stale point', 0)",
                [],
            )
            .unwrap();

        let outcome = db
            .replace_insights(&ReplaceRequest {
                session_id: "s-1",
                mode: RunMode::Incremental,
                expected_version: 1,
                word_count: 600,
                status: SessionStatus::Completed,
                set: &sample_set(),
            })
            .unwrap();

        // both the version-1 rows and the orphan are gone
        assert_eq!(outcome.stale_rows_removed, 6);
        let rows = db.insight_rows("s-1").unwrap();
        assert!(rows.iter().all(|r| r.transcript_version == 2));
        assert!(rows.iter().all(|r| r.session_status_at_write == "completed"));
    }

    #[test]
    fn failed_cleanup_warns_but_the_new_version_still_lands() {
        let (db, _dir) = test_db();
        seed_session(&db, "s-1", SessionStatus::Live);

        db.replace_insights(&ReplaceRequest {
            session_id: "s-1",
            mode: RunMode::Full,
            expected_version: 0,
            word_count: 240,
            status: SessionStatus::Live,
            set: &sample_set(),
        })
        .unwrap();

        // make every delete on insights fail
        db.conn
            .execute_batch(
                "CREATE TRIGGER block_insight_deletes BEFORE DELETE ON insights
                 BEGIN SELECT RAISE(ABORT, 'deletes disabled'); END;",
            )
            .unwrap();

        let outcome = db
            .replace_insights(&ReplaceRequest {
                session_id: "s-1",
                mode: RunMode::Incremental,
                expected_version: 1,
                word_count: 560,
                status: SessionStatus::Live,
                set: &sample_set(),
            })
            .unwrap();

        assert!(outcome.cleanup_warning);
        assert_eq!(outcome.version, 2);
        assert_eq!(outcome.stale_rows_removed, 0);

        // the stale version-1 rows linger, but the current set is v2 only
        let all = db.insight_rows("s-1").unwrap();
        assert_eq!(all.len(), 10);
        let current = db.current_insights("s-1").unwrap();
        assert_eq!(current.len(), 5);
        assert!(current.iter().all(|r| r.transcript_version == 2));
    }

    #[test]
    fn stale_observers_get_a_version_conflict() {
        let (db, _dir) = test_db();
        seed_session(&db, "s-1", SessionStatus::Live);

        db.replace_insights(&ReplaceRequest {
            session_id: "s-1",
            mode: RunMode::Full,
            expected_version: 0,
            word_count: 240,
            status: SessionStatus::Live,
            set: &sample_set(),
        })
        .unwrap();

        // a second writer that read before the first write landed
        let err = db
            .replace_insights(&ReplaceRequest {
                session_id: "s-1",
                mode: RunMode::Full,
                expected_version: 0,
                word_count: 250,
                status: SessionStatus::Live,
                set: &sample_set(),
            })
            .unwrap_err();

        match err {
            PipelineError::VersionConflict {
                expected, found, ..
            } => {
                assert_eq!(expected, 0);
                assert_eq!(found, 1);
            }
            other => panic!("expected version conflict, got {other:?}"),
        }

        // nothing was mutated
        let snap = db.latest_snapshot("s-1").unwrap().unwrap();
        assert_eq!(snap.version, 1);
        assert_eq!(snap.last_processed_word_count, 240);
    }

    #[test]
    fn empty_sets_are_refused() {
        let (db, _dir) = test_db();
        seed_session(&db, "s-1", SessionStatus::Live);

        let empty = InsightSet::default();
        let err = db
            .replace_insights(&ReplaceRequest {
                session_id: "s-1",
                mode: RunMode::Full,
                expected_version: 0,
                word_count: 240,
                status: SessionStatus::Live,
                set: &empty,
            })
            .unwrap_err();
        assert!(matches!(err, PipelineError::Validation { .. }));
        assert!(db.latest_snapshot("s-1").unwrap().is_none());
    }

    #[test]
    fn stats_count_sessions_and_versions() {
        let (db, _dir) = test_db();
        seed_session(&db, "s-1", SessionStatus::Live);
        seed_session(&db, "s-2", SessionStatus::Completed);
        db.append_segments(
            "s-1",
            &[NewSegment {
                text: "hello".to_string(),
                start_time: None,
                end_time: None,
                confidence: None,
            }],
        )
        .unwrap();
        db.replace_insights(&ReplaceRequest {
            session_id: "s-1",
            mode: RunMode::Full,
            expected_version: 0,
            word_count: 240,
            status: SessionStatus::Live,
            set: &sample_set(),
        })
        .unwrap();

        let stats = db.stats().unwrap();
        assert_eq!(stats.sessions, 2);
        assert_eq!(stats.segments, 1);
        assert_eq!(stats.insights, 5);
        assert_eq!(stats.insight_versions, 1);
        assert_eq!(stats.organizations, 1);
        assert!(stats.db_size_bytes > 0);
    }
}
