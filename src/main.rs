use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tip::auth::OrgRoleAccess;
use tip::config::{self, TipConfig};
use tip::db::models::{NewSession, SessionStatus};
use tip::db::{runs, Database};
use tip::ingest;
use tip::output::{json as json_out, table};
use tip::pipeline::locks::SessionLocks;
use tip::pipeline::{InsightPipeline, PipelineRequest, RunOutcome};
use tip::policy::{Decision, RunMode};
use tip::synth::{prompt, InsightSynthesizer};
use tip::transcript;

#[derive(Parser)]
#[command(name = "tip", version, about = "Transcript Insight Pipeline — incremental AI insights over live session transcripts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Path to database file (default: ~/.tip/tip.db)
    #[arg(long, global = true, env = "TIP_DB")]
    db: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default config template to ~/.tip/config.toml
    Init,

    /// Manage sessions
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },

    /// Grant an organization role to a member
    Grant {
        organization: String,
        member: String,

        /// Role: admin, organizer, member
        role: String,
    },

    /// Append transcript segments to a session
    Append {
        /// Session ID
        session_id: String,

        /// File to read (.json or .txt)
        file: Option<PathBuf>,

        /// Read from stdin
        #[arg(long)]
        stdin: bool,

        /// Append a single inline segment
        #[arg(long)]
        text: Option<String>,

        /// Force format: json, text
        #[arg(long)]
        format: Option<String>,

        /// Preview without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Run the insight pipeline over a session's transcript
    Run {
        /// Session ID
        session_id: String,

        /// Treat the session as having this status for this run
        /// (e.g. completed, to force the final pass)
        #[arg(long)]
        status: Option<String>,

        /// Acting identity (default: TIP_ACTOR env, then config)
        #[arg(long)]
        actor: Option<String>,

        /// API key for the synthesis backend (default: TIP_API_KEY, then config)
        #[arg(long)]
        api_key: Option<String>,

        /// Evaluate the threshold gate without calling the model
        #[arg(long)]
        dry_run: bool,
    },

    /// Show a session and its current insights
    Show {
        /// Session ID
        session_id: String,
    },

    /// Show the pipeline run ledger
    History {
        /// Only runs for this session
        #[arg(long)]
        session: Option<String>,

        /// Maximum rows
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Show database statistics
    Stats,

    /// Show database and config info
    Info,
}

#[derive(Subcommand)]
enum SessionCommands {
    /// Create a session
    Add {
        /// Session ID (generated when omitted)
        #[arg(long)]
        id: Option<String>,

        #[arg(long)]
        title: String,

        /// Speaker identity (always allowed to run the pipeline)
        #[arg(long)]
        speaker: String,

        /// Owning organization
        #[arg(long)]
        org: String,

        /// Initial status: draft, scheduled, live, completed, cancelled
        #[arg(long, default_value = "draft")]
        status: String,
    },

    /// List sessions
    List {
        /// Filter by status
        #[arg(long)]
        status: Option<String>,
    },

    /// Set a session's lifecycle status
    Status {
        /// Session ID
        session_id: String,

        /// New status: draft, scheduled, live, completed, cancelled
        status: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let json_output = cli.json;

    if matches!(cli.command, Commands::Init) {
        let path = config::config_path()?;
        if config::init_config()? {
            println!("Wrote config template: {}", path.display());
        } else {
            println!("Config already exists: {}", path.display());
        }
        return Ok(());
    }

    let db_path = cli
        .db
        .unwrap_or_else(|| Database::default_db_path().expect("Could not determine default DB path"));

    let db = Database::open(&db_path)?;
    let cfg = TipConfig::load()?;

    match cli.command {
        Commands::Init => unreachable!("handled before the database opens"),

        Commands::Session { command } => match command {
            SessionCommands::Add {
                id,
                title,
                speaker,
                org,
                status,
            } => {
                let status = SessionStatus::parse(&status)?;
                let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
                db.insert_session(&NewSession {
                    id: id.clone(),
                    title: title.clone(),
                    speaker,
                    organization: org,
                    status,
                })?;

                if json_output {
                    json_out::print_json(&serde_json::json!({
                        "id": id,
                        "title": title,
                        "status": status.as_str(),
                    }))?;
                } else {
                    println!("Created session: {title} ({id})");
                }
            }

            SessionCommands::List { status } => {
                let status = status.as_deref().map(SessionStatus::parse).transpose()?;
                let sessions = db.list_sessions(status)?;
                if json_output {
                    json_out::print_json(&sessions)?;
                } else {
                    table::print_session_list(&sessions);
                }
            }

            SessionCommands::Status { session_id, status } => {
                let status = SessionStatus::parse(&status)?;
                if !db.set_session_status(&session_id, status)? {
                    bail!("Session not found: {session_id}");
                }
                println!("Session {session_id} is now {}", status.as_str());
            }
        },

        Commands::Grant {
            organization,
            member,
            role,
        } => {
            db.grant_role(&organization, &member, &role)?;
            println!("Granted {role} on {organization} to {member}");
        }

        Commands::Append {
            session_id,
            file,
            stdin,
            text,
            format,
            dry_run,
        } => {
            let format_enum = format
                .as_deref()
                .map(|f| {
                    ingest::Format::from_str(f)
                        .with_context(|| format!("Unknown format: {f}. Use: json, text"))
                })
                .transpose()?;

            let count = if let Some(text) = text {
                ingest::append_inline(&db, &session_id, &text, dry_run)?
            } else if stdin {
                ingest::append_from_stdin(&db, &session_id, format_enum, dry_run)?
            } else if let Some(file) = file {
                ingest::append_from_file(&db, &session_id, &file, format_enum, dry_run)?
            } else {
                bail!("No input provided. Pass a file, --stdin, or --text.");
            };

            if json_output {
                json_out::print_json(&serde_json::json!({
                    "session_id": session_id,
                    "segments": count,
                    "dry_run": dry_run,
                }))?;
            } else {
                let action = if dry_run { "Would append" } else { "Appended" };
                println!(
                    "{action} {count} segment{} to session {session_id}",
                    if count == 1 { "" } else { "s" }
                );
            }
        }

        Commands::Run {
            session_id,
            status,
            actor,
            api_key,
            dry_run,
        } => {
            let status_override = status.as_deref().map(SessionStatus::parse).transpose()?;

            // A missing session would otherwise surface as a bounds error
            // on the empty assembled transcript.
            if db.get_session(&session_id)?.is_none() {
                bail!("Session not found: {session_id}");
            }

            let segments = db.get_segments(&session_id)?;
            let transcript_text = transcript::assemble(segments.iter().map(|s| s.text.as_str()));
            let hints = prompt::hints_from_segments(&segments, prompt::MAX_TIMESTAMP_HINTS);

            if dry_run {
                print_gate_preview(
                    &db,
                    &cfg,
                    &session_id,
                    status_override,
                    &transcript_text,
                    json_output,
                )?;
                return Ok(());
            }

            let actor = config::resolve_actor(actor.as_deref(), &cfg);
            let api_key = config::resolve_api_key(api_key.as_deref(), &cfg.synthesis)?;
            let synthesizer = InsightSynthesizer::from_config(&cfg.synthesis, api_key)?;
            let pipeline = InsightPipeline::new(
                &db,
                &synthesizer,
                &OrgRoleAccess,
                SessionLocks::new(),
                cfg.policy.clone(),
            );

            let outcome = pipeline.run(&PipelineRequest {
                session_id: &session_id,
                transcript_text: &transcript_text,
                status_override,
                hints,
                actor: actor.as_deref(),
            })?;

            match outcome {
                RunOutcome::Skipped {
                    current_words,
                    new_words,
                    threshold,
                } => {
                    if json_output {
                        json_out::print_json(&serde_json::json!({
                            "success": true,
                            "message": "Not enough new content for update",
                            "current_words": current_words,
                            "new_words": new_words,
                            "threshold": threshold,
                        }))?;
                    } else {
                        table::print_skip(current_words, new_words, threshold);
                    }
                }
                RunOutcome::Completed(report) => {
                    if json_output {
                        json_out::print_json(&serde_json::json!({
                            "success": true,
                            "is_incremental": report.mode == RunMode::Incremental,
                            "version": report.version,
                            "words_processed": report.words_processed,
                            "new_words": report.new_words,
                            "model": report.model,
                            "cleanup_warning": report.cleanup_warning,
                            "insights": {
                                "summary": report.insights.summary,
                                "key_points": report.insights.key_points,
                                "action_items": report.insights.action_items,
                                "notable_quotes": report.insights.quotes,
                            },
                        }))?;
                    } else {
                        table::print_run_report(&report);
                    }
                }
            }
        }

        Commands::Show { session_id } => {
            let session = db
                .get_session(&session_id)?
                .with_context(|| format!("Session not found: {session_id}"))?;
            let segments = db.get_segments(&session_id)?;
            let word_count: usize = segments.iter().map(|s| transcript::word_count(&s.text)).sum();
            let snapshot = db.latest_snapshot(&session_id)?;

            if json_output {
                json_out::print_json(&serde_json::json!({
                    "session": session,
                    "segment_count": segments.len(),
                    "word_count": word_count,
                    "insights": snapshot.as_ref().map(|s| serde_json::json!({
                        "version": s.version,
                        "last_processed_word_count": s.last_processed_word_count,
                        "summary": s.set.summary,
                        "key_points": s.set.key_points,
                        "action_items": s.set.action_items,
                        "notable_quotes": s.set.quotes,
                    })),
                }))?;
            } else {
                table::print_session_detail(&session, snapshot.as_ref(), segments.len(), word_count);
            }
        }

        Commands::History { session, limit } => {
            let history = runs::recent_runs(&db.conn, session.as_deref(), limit)?;
            if json_output {
                json_out::print_json(&history)?;
            } else {
                table::print_history(&history);
            }
        }

        Commands::Stats => {
            let stats = db.stats()?;
            if json_output {
                json_out::print_json(&stats)?;
            } else {
                table::print_stats(&stats);
            }
        }

        Commands::Info => {
            let stats = db.stats()?;
            let schema_ver: String = db
                .conn
                .query_row(
                    "SELECT value FROM tip_meta WHERE key = 'schema_version'",
                    [],
                    |r| r.get(0),
                )
                .unwrap_or_else(|_| "unknown".to_string());

            if json_output {
                json_out::print_json(&serde_json::json!({
                    "version": env!("CARGO_PKG_VERSION"),
                    "schema_version": schema_ver,
                    "db_path": db.path.display().to_string(),
                    "db_size_bytes": stats.db_size_bytes,
                    "sessions": stats.sessions,
                    "insight_rows": stats.insights,
                    "backend": cfg.synthesis.backend,
                    "model": cfg.synthesis.model,
                }))?;
            } else {
                println!("tip v{}", env!("CARGO_PKG_VERSION"));
                println!("  Schema:   v{schema_ver}");
                println!("  Database: {}", db.path.display());
                println!("  Size:     {}", table::format_bytes(stats.db_size_bytes));
                println!("  Sessions: {}", stats.sessions);
                println!("  Backend:  {} ({})", cfg.synthesis.backend, cfg.synthesis.model);
                println!("\nConfig ({}):", config::config_path()?.display());
                for line in cfg.display_redacted().lines() {
                    println!("  {line}");
                }
            }
        }
    }

    Ok(())
}

/// Evaluate the threshold gate for `run --dry-run` without touching the
/// model, the insight store, or the run ledger.
fn print_gate_preview(
    db: &Database,
    cfg: &TipConfig,
    session_id: &str,
    status_override: Option<SessionStatus>,
    transcript_text: &str,
    json_output: bool,
) -> Result<()> {
    let session = db
        .get_session(session_id)?
        .with_context(|| format!("Session not found: {session_id}"))?;
    let status = status_override.unwrap_or(session.status);

    let snapshot = db.latest_snapshot(session_id)?;
    let first = snapshot.is_none();
    let last_processed = snapshot
        .as_ref()
        .map(|s| s.last_processed_word_count)
        .unwrap_or(0);

    let current_words = transcript::word_count(transcript_text);
    let new_words = current_words as i64 - last_processed;

    match cfg
        .policy
        .evaluate(first, status.is_completed(), current_words, new_words)
    {
        Decision::Triggered {
            mode,
            upgrade_model,
        } => {
            if json_output {
                json_out::print_json(&serde_json::json!({
                    "would_run": true,
                    "mode": mode.as_str(),
                    "current_words": current_words,
                    "new_words": new_words,
                    "upgrade_model": upgrade_model,
                }))?;
            } else {
                println!(
                    "Would run {} synthesis: {current_words} words, {new_words} new",
                    mode.as_str()
                );
                if upgrade_model {
                    println!("  Long completed session: the upgrade model would be used.");
                }
            }
        }
        Decision::Skip {
            current_words,
            new_words,
            threshold,
        } => {
            if json_output {
                json_out::print_json(&serde_json::json!({
                    "would_run": false,
                    "message": "Not enough new content for update",
                    "current_words": current_words,
                    "new_words": new_words,
                    "threshold": threshold,
                }))?;
            } else {
                table::print_skip(current_words, new_words, threshold);
            }
        }
    }

    Ok(())
}
