use unicode_width::UnicodeWidthStr;

use crate::db::models::*;
use crate::pipeline::RunReport;

/// Truncate a string to fit within max_width (respecting unicode width).
fn truncate(s: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(s) <= max_width {
        return s.to_string();
    }
    let mut result = String::new();
    let mut width = 0;
    for ch in s.chars() {
        let cw = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if width + cw + 3 > max_width {
            result.push_str("...");
            break;
        }
        result.push(ch);
        width += cw;
    }
    result
}

fn format_timestamp(seconds: f64) -> String {
    let total = seconds as u64;
    let m = total / 60;
    let s = total % 60;
    format!("{m:02}:{s:02}")
}

/// Wall-clock duration of a finished run, "-" while running or unparseable.
fn run_duration(r: &RunRecord) -> String {
    let parse = |s: &str| chrono::DateTime::parse_from_rfc3339(s).ok();
    match r.completed_at.as_deref().and_then(parse).zip(parse(&r.started_at)) {
        Some((end, start)) => format!("{}s", (end - start).num_seconds().max(0)),
        None => "-".to_string(),
    }
}

pub fn format_bytes(bytes: u64) -> String {
    if bytes >= 1_073_741_824 {
        format!("{:.1} GB", bytes as f64 / 1_073_741_824.0)
    } else if bytes >= 1_048_576 {
        format!("{:.1} MB", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} B")
    }
}

/// Format the session list as a table.
pub fn print_session_list(sessions: &[SessionRecord]) {
    if sessions.is_empty() {
        println!("No sessions found.");
        return;
    }

    println!(
        "{} session{}:\n",
        sessions.len(),
        if sessions.len() == 1 { "" } else { "s" }
    );

    println!(
        "  {:<14} {:<34} {:<14} {:<12} {:<10}",
        "ID", "TITLE", "SPEAKER", "ORG", "STATUS"
    );
    println!("  {}", "-".repeat(88));

    for s in sessions {
        println!(
            "  {:<14} {:<34} {:<14} {:<12} {:<10}",
            truncate(&s.id, 12),
            truncate(&s.title, 32),
            truncate(&s.speaker, 12),
            truncate(&s.organization, 10),
            s.status.as_str(),
        );
    }
    println!();
}

/// Format one session's details plus its current insights for `tip show`.
pub fn print_session_detail(
    session: &SessionRecord,
    snapshot: Option<&InsightSnapshot>,
    segment_count: usize,
    word_count: usize,
) {
    println!("Session: {}", session.title);
    println!("  ID:       {}", session.id);
    println!("  Speaker:  {}", session.speaker);
    println!("  Org:      {}", session.organization);
    println!("  Status:   {}", session.status.as_str());
    println!("  Segments: {segment_count}");
    println!("  Words:    {word_count}");

    match snapshot {
        None => println!("\nNo insights yet. Run `tip run {}` once there is enough transcript.", session.id),
        Some(snap) => {
            println!(
                "\nInsights (version {}, {} words processed):",
                snap.version, snap.last_processed_word_count
            );
            print_insight_set(&snap.set);
        }
    }
}

/// Pretty-print one insight set.
pub fn print_insight_set(set: &InsightSet) {
    if !set.summary.is_empty() {
        println!("\nSummary:");
        for line in set.summary.lines() {
            println!("  {line}");
        }
    }

    if !set.key_points.is_empty() {
        println!("\nKey Points ({}):", set.key_points.len());
        for kp in &set.key_points {
            match kp.timestamp {
                Some(ts) => println!("  [{}] {}", format_timestamp(ts), truncate(&kp.text, 70)),
                None => println!("  - {}", truncate(&kp.text, 76)),
            }
        }
    }

    if !set.action_items.is_empty() {
        println!("\nAction Items ({}):", set.action_items.len());
        for ai in &set.action_items {
            println!("  - {}", truncate(&ai.text, 76));
        }
    }

    if !set.quotes.is_empty() {
        println!("\nNotable Quotes ({}):", set.quotes.len());
        for q in &set.quotes {
            match q.timestamp {
                Some(ts) => println!("  [{}] \"{}\"", format_timestamp(ts), truncate(&q.text, 68)),
                None => println!("  \"{}\"", truncate(&q.text, 74)),
            }
        }
    }
}

/// Print the outcome of a triggered pipeline run.
pub fn print_run_report(report: &RunReport) {
    let kind = match report.mode.as_str() {
        "full" => "Full synthesis",
        _ => "Incremental update",
    };
    println!(
        "{kind} complete: version {} ({} words, {} new) via {}",
        report.version, report.words_processed, report.new_words, report.model
    );
    if report.cleanup_warning {
        println!("  Warning: stale insight rows were left behind; they will be swept on the next full run.");
    }
    print_insight_set(&report.insights);
}

/// Print a skipped run.
pub fn print_skip(current_words: usize, new_words: i64, threshold: usize) {
    println!("Not enough new content for an update.");
    println!("  Words: {current_words} total, {new_words} new (threshold {threshold})");
}

/// Format the run ledger as a table.
pub fn print_history(runs: &[RunRecord]) {
    if runs.is_empty() {
        println!("No pipeline runs recorded.");
        return;
    }

    println!(
        "{} run{}:\n",
        runs.len(),
        if runs.len() == 1 { "" } else { "s" }
    );

    println!(
        "  {:<5} {:<14} {:<12} {:<10} {:>7} {:>6} {:>4} {:>5}  {:<20}",
        "RUN", "SESSION", "MODE", "STATUS", "WORDS", "NEW", "VER", "DUR", "STARTED"
    );
    println!("  {}", "-".repeat(92));

    for r in runs {
        let version = r
            .version
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<5} {:<14} {:<12} {:<10} {:>7} {:>6} {:>4} {:>5}  {:<20}",
            r.id,
            truncate(&r.session_id, 12),
            r.mode,
            r.status,
            r.words_total,
            r.words_new,
            version,
            run_duration(r),
            r.started_at,
        );
        if let Some(kind) = &r.error_kind {
            println!("        error: {kind}");
        }
    }
    println!();
}

/// Print database stats.
pub fn print_stats(stats: &DbStats) {
    println!("Database Statistics:");
    println!("  Sessions:      {}", stats.sessions);
    println!("  Segments:      {}", stats.segments);
    println!("  Insight rows:  {}", stats.insights);
    println!("  Insight sets:  {}", stats.insight_versions);
    println!("  Pipeline runs: {}", stats.runs);
    println!("  Organizations: {}", stats.organizations);
    println!("  DB Size:       {}", format_bytes(stats.db_size_bytes));
    if !stats.statuses.is_empty() {
        println!("\n  Sessions by status:");
        for sc in &stats.statuses {
            println!("    {:<12} {}", sc.status, sc.count);
        }
    }
}
