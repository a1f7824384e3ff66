use serde::Deserialize;

use crate::db::models::NewSegment;
use crate::error::{PipelineError, Result};

/// Accepts either a wrapped object (`{"segments": [...]}`) or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonPayload {
    Wrapped { segments: Vec<JsonSegment> },
    Flat(Vec<JsonSegment>),
}

/// A segment element: a full object or a bare string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonSegment {
    Obj {
        text: Option<String>,
        start: Option<f64>,
        // Also accept start_time/end_time
        start_time: Option<f64>,
        end: Option<f64>,
        end_time: Option<f64>,
        confidence: Option<f64>,
    },
    Line(String),
}

/// Parse a JSON document into transcript segments. Elements without
/// usable text are skipped.
pub fn parse_segments(content: &str) -> Result<Vec<NewSegment>> {
    let payload: JsonPayload =
        serde_json::from_str(content).map_err(|e| PipelineError::Validation {
            message: format!("failed to parse JSON transcript: {e}"),
        })?;

    let raw = match payload {
        JsonPayload::Wrapped { segments } => segments,
        JsonPayload::Flat(segments) => segments,
    };

    let segments = raw
        .into_iter()
        .filter_map(|s| match s {
            JsonSegment::Obj {
                text,
                start,
                start_time,
                end,
                end_time,
                confidence,
            } => {
                let text = text.unwrap_or_default();
                if text.trim().is_empty() {
                    return None;
                }
                Some(NewSegment {
                    text,
                    start_time: start.or(start_time),
                    end_time: end.or(end_time),
                    confidence,
                })
            }
            JsonSegment::Line(line) => {
                if line.trim().is_empty() {
                    return None;
                }
                Some(NewSegment {
                    text: line,
                    start_time: None,
                    end_time: None,
                    confidence: None,
                })
            }
        })
        .collect();

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wrapped_and_flat_payloads() {
        let wrapped = r#"{"segments": [{"text": "hello", "start": 1.5, "end": 3.0}]}"#;
        let segs = parse_segments(wrapped).unwrap();
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].text, "hello");
        assert_eq!(segs[0].start_time, Some(1.5));
        assert_eq!(segs[0].end_time, Some(3.0));

        let flat = r#"[{"text": "a"}, "bare line", {"text": "b"}]"#;
        let segs = parse_segments(flat).unwrap();
        assert_eq!(segs.len(), 3);
        assert_eq!(segs[1].text, "bare line");
    }

    #[test]
    fn accepts_start_time_aliases() {
        let content = r#"[{"text": "x", "start_time": 2.0, "end_time": 4.0, "confidence": 0.9}]"#;
        let segs = parse_segments(content).unwrap();
        assert_eq!(segs[0].start_time, Some(2.0));
        assert_eq!(segs[0].end_time, Some(4.0));
        assert_eq!(segs[0].confidence, Some(0.9));
    }

    #[test]
    fn skips_empty_text_elements() {
        let content = r#"[{"text": "  "}, "", {"text": "kept"}, {"start": 1.0}]"#;
        let segs = parse_segments(content).unwrap();
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].text, "kept");
    }

    #[test]
    fn malformed_json_is_a_validation_error() {
        let err = parse_segments("{not json").unwrap_err();
        assert!(matches!(err, PipelineError::Validation { .. }));
    }
}
