use crate::db::models::NewSegment;

/// Parse plain text into segments, one per non-empty line.
pub fn parse_lines(content: &str) -> Vec<NewSegment> {
    content
        .lines()
        .filter_map(|line| {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                return None;
            }
            Some(NewSegment {
                text: trimmed.to_string(),
                start_time: None,
                end_time: None,
                confidence: None,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_segment_per_nonempty_line() {
        let segs = parse_lines("first line\n\n  second line  \n\t\nthird");
        assert_eq!(segs.len(), 3);
        assert_eq!(segs[0].text, "first line");
        assert_eq!(segs[1].text, "second line");
        assert_eq!(segs[2].text, "third");
        assert!(segs[0].start_time.is_none());
    }

    #[test]
    fn blank_input_yields_nothing() {
        assert!(parse_lines("").is_empty());
        assert!(parse_lines("   \n  \n").is_empty());
    }
}
