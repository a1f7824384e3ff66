pub mod json;
pub mod text;

use std::io::Read;
use std::path::Path;
use tracing::info;

use crate::db::models::NewSegment;
use crate::db::Database;
use crate::error::{PipelineError, Result};
use crate::transcript;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Format {
    Json,
    Text,
}

impl Format {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(Format::Json),
            "text" | "txt" => Some(Format::Text),
            _ => None,
        }
    }

    pub fn detect_from_extension(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Some(Format::Json),
            Some("txt" | "text") => Some(Format::Text),
            _ => None,
        }
    }
}

/// Append segments from a file to a session. Returns the number appended.
pub fn append_from_file(
    db: &Database,
    session_id: &str,
    path: &Path,
    format_override: Option<Format>,
    dry_run: bool,
) -> Result<usize> {
    let format = format_override
        .or_else(|| Format::detect_from_extension(path))
        .ok_or_else(|| PipelineError::Validation {
            message: format!("cannot determine format for: {}", path.display()),
        })?;

    let content = std::fs::read_to_string(path)?;
    let segments = parse_content(&content, format)?;
    append(db, session_id, segments, dry_run)
}

/// Append segments from stdin. JSON is detected by a leading brace or
/// bracket; anything else is treated as plain text lines.
pub fn append_from_stdin(
    db: &Database,
    session_id: &str,
    format_override: Option<Format>,
    dry_run: bool,
) -> Result<usize> {
    let mut content = String::new();
    std::io::stdin().read_to_string(&mut content)?;

    if content.trim().is_empty() {
        return Err(PipelineError::Validation {
            message: "empty input from stdin".to_string(),
        });
    }

    let format = format_override.unwrap_or_else(|| {
        let trimmed = content.trim();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            Format::Json
        } else {
            Format::Text
        }
    });

    let segments = parse_content(&content, format)?;
    append(db, session_id, segments, dry_run)
}

/// Append a single chunk of inline text as one segment.
pub fn append_inline(db: &Database, session_id: &str, text: &str, dry_run: bool) -> Result<usize> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::Validation {
            message: "inline text must not be empty".to_string(),
        });
    }
    let segments = vec![NewSegment {
        text: trimmed.to_string(),
        start_time: None,
        end_time: None,
        confidence: None,
    }];
    append(db, session_id, segments, dry_run)
}

fn parse_content(content: &str, format: Format) -> Result<Vec<NewSegment>> {
    match format {
        Format::Json => json::parse_segments(content),
        Format::Text => Ok(text::parse_lines(content)),
    }
}

fn append(
    db: &Database,
    session_id: &str,
    segments: Vec<NewSegment>,
    dry_run: bool,
) -> Result<usize> {
    if db.get_session(session_id)?.is_none() {
        return Err(PipelineError::SessionNotFound {
            session_id: session_id.to_string(),
        });
    }

    if segments.is_empty() {
        return Err(PipelineError::Validation {
            message: "no segments found in input".to_string(),
        });
    }

    let words: usize = segments.iter().map(|s| transcript::word_count(&s.text)).sum();

    if dry_run {
        println!(
            "  [dry-run] Would append {} segments ({} words) to session {}",
            segments.len(),
            words,
            session_id
        );
        return Ok(segments.len());
    }

    let appended = db.append_segments(session_id, &segments)?;
    info!(
        session_id = %session_id,
        segments = appended,
        words,
        "Appended transcript segments"
    );
    Ok(appended)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{NewSession, SessionStatus};

    fn seeded_db() -> (Database, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("tip.db")).unwrap();
        db.insert_session(&NewSession {
            id: "s-1".to_string(),
            title: "Observability on a budget".to_string(),
            speaker: "ana".to_string(),
            organization: "rustconf".to_string(),
            status: SessionStatus::Live,
        })
        .unwrap();
        (db, dir)
    }

    #[test]
    fn format_detection() {
        assert_eq!(Format::from_str("JSON"), Some(Format::Json));
        assert_eq!(Format::from_str("txt"), Some(Format::Text));
        assert_eq!(Format::from_str("csv"), None);

        assert_eq!(
            Format::detect_from_extension(Path::new("talk.json")),
            Some(Format::Json)
        );
        assert_eq!(
            Format::detect_from_extension(Path::new("talk.txt")),
            Some(Format::Text)
        );
        assert_eq!(Format::detect_from_extension(Path::new("talk.wav")), None);
    }

    #[test]
    fn inline_append_lands_one_segment() {
        let (db, _dir) = seeded_db();
        assert_eq!(
            append_inline(&db, "s-1", "  hello everyone  ", false).unwrap(),
            1
        );
        let segs = db.get_segments("s-1").unwrap();
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].text, "hello everyone");

        assert!(append_inline(&db, "s-1", "   ", false).is_err());
    }

    #[test]
    fn appends_require_an_existing_session() {
        let (db, _dir) = seeded_db();
        let err = append_inline(&db, "ghost", "hello there", false).unwrap_err();
        assert!(matches!(err, PipelineError::SessionNotFound { .. }));
    }

    #[test]
    fn dry_run_touches_nothing() {
        let (db, _dir) = seeded_db();
        assert_eq!(append_inline(&db, "s-1", "hello world", true).unwrap(), 1);
        assert!(db.get_segments("s-1").unwrap().is_empty());
    }
}
