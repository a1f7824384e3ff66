use crate::error::{PipelineError, Result};

/// Flatten ordered segment texts into the accumulated transcript.
/// Segments are joined with a single space; an empty sequence yields "".
pub fn assemble<'a>(texts: impl IntoIterator<Item = &'a str>) -> String {
    let parts: Vec<&str> = texts.into_iter().collect();
    parts.join(" ")
}

/// Count non-empty whitespace-delimited tokens.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Re-join the word list from `start_word` onward, the incremental slice
/// handed to synthesis. A start past the last word yields "".
pub fn words_from(text: &str, start_word: usize) -> String {
    text.split_whitespace()
        .skip(start_word)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Truncate to the first `max_chars` characters (char-boundary safe).
/// Returns the clamped slice and whether anything was cut.
pub fn clamp_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => (&text[..byte_idx], true),
        None => (text, false),
    }
}

/// Entry-point length gate. Under `min_chars` or over `max_chars` is a hard
/// reject; the pipeline never silently truncates caller input.
pub fn validate_bounds(text: &str, min_chars: usize, max_chars: usize) -> Result<()> {
    let chars = text.chars().count();
    if chars < min_chars {
        return Err(PipelineError::Validation {
            message: format!("transcript too short: {chars} chars (minimum {min_chars})"),
        });
    }
    if chars > max_chars {
        return Err(PipelineError::Validation {
            message: format!("transcript too long: {chars} chars (maximum {max_chars})"),
        });
    }
    Ok(())
}
