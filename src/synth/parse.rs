//! Model response handling.
//!
//! Models are told to return bare JSON but routinely wrap it in Markdown
//! fences, switch key casing, or emit bare strings where objects were asked
//! for. Everything recoverable is normalized into an `InsightSet`; anything
//! else fails the run with a parse error rather than being retried.

use serde::Deserialize;

use crate::db::models::{InsightItem, InsightSet};
use crate::error::{PipelineError, Result};

#[derive(Debug, Deserialize)]
struct RawInsights {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default, alias = "keyPoints")]
    key_points: Vec<RawItem>,
    #[serde(default, alias = "actionItems")]
    action_items: Vec<RawItem>,
    #[serde(default, alias = "notableQuotes", alias = "quotes")]
    notable_quotes: Vec<RawItem>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawItem {
    Timed {
        text: String,
        #[serde(default)]
        timestamp: Option<serde_json::Value>,
    },
    Text(String),
    // anything else the model dreamed up; dropped during normalization
    Other(serde_json::Value),
}

/// Parse a raw model response into an insight set.
pub fn parse_insights(raw: &str) -> Result<InsightSet> {
    let cleaned = strip_code_fences(raw);
    let parsed: RawInsights =
        serde_json::from_str(cleaned).map_err(|e| PipelineError::SynthesisParse {
            message: format!("model response was not valid JSON: {e}"),
        })?;

    Ok(InsightSet {
        summary: parsed
            .summary
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
        key_points: normalize_items(parsed.key_points),
        action_items: normalize_items(parsed.action_items),
        quotes: normalize_items(parsed.notable_quotes),
    })
}

/// Remove a surrounding Markdown code fence (with or without a language
/// tag). Anything that is not fenced passes through trimmed.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the info string ("json", "JSON", or nothing) up to the newline
    let rest = match rest.find('\n') {
        Some(i) => &rest[i + 1..],
        None => rest,
    };
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

fn normalize_items(items: Vec<RawItem>) -> Vec<InsightItem> {
    items
        .into_iter()
        .filter_map(|item| match item {
            RawItem::Timed { text, timestamp } => {
                let text = text.trim().to_string();
                if text.is_empty() {
                    return None;
                }
                Some(InsightItem {
                    text,
                    timestamp: normalize_timestamp(timestamp.as_ref()),
                })
            }
            RawItem::Text(text) => {
                let text = text.trim().to_string();
                if text.is_empty() {
                    return None;
                }
                Some(InsightItem {
                    text,
                    timestamp: None,
                })
            }
            RawItem::Other(_) => None,
        })
        .collect()
}

/// Timestamps arrive as numbers, numeric strings, or junk. Junk becomes
/// None; the item itself survives.
fn normalize_timestamp(value: Option<&serde_json::Value>) -> Option<f64> {
    let secs = match value? {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if secs.is_finite() && secs >= 0.0 {
        Some(secs)
    } else {
        None
    }
}
