//! The run orchestrator. Each invocation validates input, authorizes the
//! caller, consults the thresholds, and only then synthesizes and persists,
//! leaving a ledger row either way. Skips are successes; only backend and
//! persistence trouble surface as errors.

pub mod locks;

use tracing::{debug, info};

use crate::auth::AccessPolicy;
use crate::db::models::{InsightSet, SessionStatus};
use crate::db::{runs, Database, ReplaceRequest};
use crate::error::{PipelineError, Result};
use crate::policy::{Decision, PolicyConfig, RunMode};
use crate::synth::prompt::TimestampHint;
use crate::synth::{InsightSynthesizer, SynthesisJob};
use crate::transcript;
use locks::SessionLocks;

/// One pipeline invocation.
#[derive(Debug)]
pub struct PipelineRequest<'a> {
    pub session_id: &'a str,
    pub transcript_text: &'a str,
    /// Overrides the stored session status for this run (e.g. the caller
    /// reporting completion before the row is updated).
    pub status_override: Option<SessionStatus>,
    pub hints: Vec<TimestampHint>,
    pub actor: Option<&'a str>,
}

#[derive(Debug)]
pub enum RunOutcome {
    /// Thresholds not met; nothing was synthesized or written.
    Skipped {
        current_words: usize,
        new_words: i64,
        threshold: usize,
    },
    Completed(RunReport),
}

#[derive(Debug)]
pub struct RunReport {
    pub mode: RunMode,
    pub version: i64,
    pub words_processed: usize,
    pub new_words: i64,
    pub insights: InsightSet,
    pub cleanup_warning: bool,
    pub model: String,
}

pub struct InsightPipeline<'a> {
    db: &'a Database,
    synthesizer: &'a InsightSynthesizer,
    access: &'a dyn AccessPolicy,
    locks: SessionLocks,
    policy: PolicyConfig,
}

impl<'a> InsightPipeline<'a> {
    pub fn new(
        db: &'a Database,
        synthesizer: &'a InsightSynthesizer,
        access: &'a dyn AccessPolicy,
        locks: SessionLocks,
        policy: PolicyConfig,
    ) -> Self {
        Self {
            db,
            synthesizer,
            access,
            locks,
            policy,
        }
    }

    pub fn run(&self, req: &PipelineRequest) -> Result<RunOutcome> {
        // Shape and bounds first; nothing is read or written for bad input.
        if req.session_id.trim().is_empty() {
            return Err(PipelineError::Validation {
                message: "session_id must not be blank".to_string(),
            });
        }
        transcript::validate_bounds(
            req.transcript_text,
            self.policy.min_transcript_chars,
            self.policy.max_transcript_chars,
        )?;

        // Unauthenticated callers are rejected before the session lookup.
        let actor = req.actor.ok_or(PipelineError::Unauthorized)?;
        let session = self.db.get_session(req.session_id)?.ok_or_else(|| {
            PipelineError::SessionNotFound {
                session_id: req.session_id.to_string(),
            }
        })?;
        if !self.access.has_access(self.db, &session, actor)? {
            return Err(PipelineError::Forbidden {
                session_id: req.session_id.to_string(),
            });
        }
        let status = req.status_override.unwrap_or(session.status);

        // One run per session at a time from here on.
        let lock = self.locks.lock_for(req.session_id);
        let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let snapshot = self.db.latest_snapshot(req.session_id)?;
        let last_version = snapshot.as_ref().map(|s| s.version).unwrap_or(0);
        let last_processed = snapshot
            .as_ref()
            .map(|s| s.last_processed_word_count)
            .unwrap_or(0);
        let prior_set = snapshot.as_ref().map(|s| &s.set);

        let current_words = transcript::word_count(req.transcript_text);
        let new_words = current_words as i64 - last_processed;
        let first_generation = last_version == 0;

        let decision = self.policy.evaluate(
            first_generation,
            status.is_completed(),
            current_words,
            new_words,
        );
        let (mode, upgrade_model) = match decision {
            Decision::Skip {
                current_words,
                new_words,
                threshold,
            } => {
                let would_be = if first_generation {
                    RunMode::Full
                } else {
                    RunMode::Incremental
                };
                runs::record_skip(
                    &self.db.conn,
                    req.session_id,
                    would_be.as_str(),
                    current_words,
                    new_words,
                )?;
                info!(
                    session_id = %req.session_id,
                    current_words,
                    new_words,
                    threshold,
                    "Skipping synthesis; thresholds not met"
                );
                return Ok(RunOutcome::Skipped {
                    current_words,
                    new_words,
                    threshold,
                });
            }
            Decision::Triggered {
                mode,
                upgrade_model,
            } => (mode, upgrade_model),
        };

        // Full runs see the whole transcript; incremental runs only the
        // words beyond the last processed count. A shrunken transcript
        // yields an empty slice, and the model works from prior insights.
        let slice_owned;
        let input_text: &str = match mode {
            RunMode::Full => req.transcript_text,
            RunMode::Incremental => {
                let start = last_processed.max(0) as usize;
                slice_owned = transcript::words_from(req.transcript_text, start);
                &slice_owned
            }
        };
        let (input_text, truncated) =
            transcript::clamp_chars(input_text, self.policy.max_transcript_chars);
        if truncated {
            debug!(
                session_id = %req.session_id,
                max_chars = self.policy.max_transcript_chars,
                "Synthesis input clamped"
            );
        }

        let run_id = runs::start_run(
            &self.db.conn,
            req.session_id,
            mode.as_str(),
            current_words,
            new_words,
        )?;

        let job = SynthesisJob {
            session_id: req.session_id,
            mode,
            text: input_text,
            prior: prior_set,
            hints: &req.hints,
            upgrade_model,
        };
        let set = match self.synthesizer.synthesize(&job) {
            Ok(set) => set,
            Err(e) => {
                runs::fail_run(&self.db.conn, run_id, e.kind())?;
                return Err(e);
            }
        };

        let outcome = match self.db.replace_insights(&ReplaceRequest {
            session_id: req.session_id,
            mode,
            expected_version: last_version,
            word_count: current_words as i64,
            status,
            set: &set,
        }) {
            Ok(outcome) => outcome,
            Err(e) => {
                runs::fail_run(&self.db.conn, run_id, e.kind())?;
                return Err(e);
            }
        };

        runs::complete_run(&self.db.conn, run_id, outcome.version)?;
        info!(
            session_id = %req.session_id,
            version = outcome.version,
            mode = mode.as_str(),
            rows = outcome.rows_written,
            words_processed = current_words,
            new_words,
            cleanup_warning = outcome.cleanup_warning,
            "Insights updated"
        );

        Ok(RunOutcome::Completed(RunReport {
            mode,
            version: outcome.version,
            words_processed: current_words,
            new_words,
            insights: set,
            cleanup_warning: outcome.cleanup_warning,
            model: self.synthesizer.model_for(upgrade_model).to_string(),
        }))
    }
}
