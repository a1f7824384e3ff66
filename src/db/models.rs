use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Draft,
    Scheduled,
    Live,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Draft => "draft",
            SessionStatus::Scheduled => "scheduled",
            SessionStatus::Live => "live",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "draft" => Ok(SessionStatus::Draft),
            "scheduled" => Ok(SessionStatus::Scheduled),
            "live" => Ok(SessionStatus::Live),
            "completed" => Ok(SessionStatus::Completed),
            "cancelled" => Ok(SessionStatus::Cancelled),
            other => Err(PipelineError::Validation {
                message: format!(
                    "unknown session status '{other}' (expected draft, scheduled, live, completed, or cancelled)"
                ),
            }),
        }
    }

    /// Completed sessions force a final synthesis pass and a full history reset.
    pub fn is_completed(&self) -> bool {
        matches!(self, SessionStatus::Completed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub title: String,
    pub speaker: String,
    pub organization: String,
    pub status: SessionStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// Data needed to insert a new session (no auto-generated fields).
#[derive(Debug, Clone)]
pub struct NewSession {
    pub id: String,
    pub title: String,
    pub speaker: String,
    pub organization: String,
    pub status: SessionStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentRecord {
    pub id: String,
    pub session_id: String,
    pub segment_index: i64,
    pub text: String,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub confidence: Option<f64>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewSegment {
    pub text: String,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    Summary,
    KeyPoint,
    ActionItem,
    Quote,
}

impl InsightKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsightKind::Summary => "summary",
            InsightKind::KeyPoint => "key_point",
            InsightKind::ActionItem => "action_item",
            InsightKind::Quote => "quote",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "summary" => Ok(InsightKind::Summary),
            "key_point" => Ok(InsightKind::KeyPoint),
            "action_item" => Ok(InsightKind::ActionItem),
            "quote" => Ok(InsightKind::Quote),
            other => Err(PipelineError::Validation {
                message: format!("unknown insight kind '{other}'"),
            }),
        }
    }
}

/// One stored insight row. Rows sharing a `transcript_version` were written
/// by the same pipeline run; the current set is the rows at the highest
/// version for the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightRecord {
    pub id: String,
    pub session_id: String,
    pub kind: InsightKind,
    pub content: String,
    pub timestamp_seconds: Option<f64>,
    pub last_processed_word_count: i64,
    pub transcript_version: i64,
    pub session_status_at_write: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightItem {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

impl InsightItem {
    pub fn new(text: impl Into<String>) -> Self {
        InsightItem {
            text: text.into(),
            timestamp: None,
        }
    }

    pub fn timed(text: impl Into<String>, timestamp: f64) -> Self {
        InsightItem {
            text: text.into(),
            timestamp: Some(timestamp),
        }
    }
}

/// A complete set of insights for one transcript version. An empty summary
/// means the model produced none; no summary row is stored for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsightSet {
    pub summary: String,
    pub key_points: Vec<InsightItem>,
    pub action_items: Vec<InsightItem>,
    pub quotes: Vec<InsightItem>,
}

impl InsightSet {
    pub fn is_empty(&self) -> bool {
        self.summary.is_empty()
            && self.key_points.is_empty()
            && self.action_items.is_empty()
            && self.quotes.is_empty()
    }

    /// Number of rows this set persists as.
    pub fn row_count(&self) -> usize {
        let summary_rows = if self.summary.is_empty() { 0 } else { 1 };
        summary_rows + self.key_points.len() + self.action_items.len() + self.quotes.len()
    }

    /// Reassemble a set from stored rows (all rows must share one version).
    pub fn from_records(records: &[InsightRecord]) -> Self {
        let mut set = InsightSet::default();
        for rec in records {
            let item = InsightItem {
                text: rec.content.clone(),
                timestamp: rec.timestamp_seconds,
            };
            match rec.kind {
                InsightKind::Summary => set.summary = rec.content.clone(),
                InsightKind::KeyPoint => set.key_points.push(item),
                InsightKind::ActionItem => set.action_items.push(item),
                InsightKind::Quote => set.quotes.push(item),
            }
        }
        set
    }
}

/// The latest persisted insight state for a session.
#[derive(Debug, Clone)]
pub struct InsightSnapshot {
    pub version: i64,
    pub last_processed_word_count: i64,
    pub set: InsightSet,
}

/// One row of the pipeline run ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: i64,
    pub session_id: String,
    pub mode: String,
    pub status: String,
    pub words_total: i64,
    pub words_new: i64,
    pub version: Option<i64>,
    pub error_kind: Option<String>,
    pub started_at: String,
    pub completed_at: Option<String>,
}

/// Stats returned by `tip stats`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbStats {
    pub sessions: i64,
    pub segments: i64,
    pub insights: i64,
    pub insight_versions: i64,
    pub runs: i64,
    pub organizations: i64,
    pub statuses: Vec<StatusCount>,
    pub db_size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_round_trip() {
        for status in [
            SessionStatus::Draft,
            SessionStatus::Scheduled,
            SessionStatus::Live,
            SessionStatus::Completed,
            SessionStatus::Cancelled,
        ] {
            assert_eq!(SessionStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(SessionStatus::parse("archived").is_err());
    }

    #[test]
    fn kind_strings_round_trip() {
        for kind in [
            InsightKind::Summary,
            InsightKind::KeyPoint,
            InsightKind::ActionItem,
            InsightKind::Quote,
        ] {
            assert_eq!(InsightKind::parse(kind.as_str()).unwrap(), kind);
        }
        assert!(InsightKind::parse("highlight").is_err());
    }

    #[test]
    fn set_reassembles_from_rows() {
        let rec = |kind, content: &str, ts: Option<f64>| InsightRecord {
            id: "i".to_string(),
            session_id: "s".to_string(),
            kind,
            content: content.to_string(),
            timestamp_seconds: ts,
            last_processed_word_count: 40,
            transcript_version: 2,
            session_status_at_write: "live".to_string(),
            created_at: String::new(),
            updated_at: String::new(),
        };

        let set = InsightSet::from_records(&[
            rec(InsightKind::Summary, "the talk so far", None),
            rec(InsightKind::KeyPoint, "first point", None),
            rec(InsightKind::Quote, "a great line", Some(12.5)),
        ]);

        assert_eq!(set.summary, "the talk so far");
        assert_eq!(set.key_points, vec![InsightItem::new("first point")]);
        assert_eq!(set.quotes, vec![InsightItem::timed("a great line", 12.5)]);
        assert!(set.action_items.is_empty());
        assert_eq!(set.row_count(), 3);
    }

    #[test]
    fn empty_summary_does_not_count_as_a_row() {
        let mut set = InsightSet::default();
        assert!(set.is_empty());
        assert_eq!(set.row_count(), 0);

        set.key_points.push(InsightItem::new("only a point"));
        assert!(!set.is_empty());
        assert_eq!(set.row_count(), 1);
    }
}
