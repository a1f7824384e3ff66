use serde::{Deserialize, Serialize};

/// Word thresholds that gate synthesis runs, plus the transcript length
/// bounds enforced at the pipeline entry point. Loaded from the `[policy]`
/// table of the config file; every field falls back to its default.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Words required before the first insight generation.
    pub initial_word_threshold: usize,
    /// New words required between incremental updates.
    pub update_word_threshold: usize,
    /// Above this many words a completed session advises the larger model.
    pub model_switch_word_threshold: usize,
    pub min_transcript_chars: usize,
    pub max_transcript_chars: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            initial_word_threshold: 200,
            update_word_threshold: 300,
            model_switch_word_threshold: 500,
            min_transcript_chars: 10,
            max_transcript_chars: 50_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// First generation for a session: synthesize over the full transcript.
    Full,
    /// Later generations: synthesize the new slice against prior insights.
    Incremental,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Full => "full",
            RunMode::Incremental => "incremental",
        }
    }
}

/// Outcome of the threshold gate for one pipeline invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Triggered { mode: RunMode, upgrade_model: bool },
    Skip {
        current_words: usize,
        new_words: i64,
        threshold: usize,
    },
}

impl PolicyConfig {
    /// Decide whether this invocation runs synthesis.
    ///
    /// A run triggers when the session just completed, when the first
    /// generation has accumulated `initial_word_threshold` words, or when
    /// `update_word_threshold` new words arrived since the last run.
    /// `new_words` is signed: a shrunken transcript never trips the update
    /// threshold, though completion still forces a final pass over whatever
    /// text remains.
    pub fn evaluate(
        &self,
        first_generation: bool,
        completed: bool,
        current_words: usize,
        new_words: i64,
    ) -> Decision {
        let triggered = completed
            || (first_generation && current_words >= self.initial_word_threshold)
            || new_words >= self.update_word_threshold as i64;

        if !triggered {
            let threshold = if first_generation {
                self.initial_word_threshold
            } else {
                self.update_word_threshold
            };
            return Decision::Skip {
                current_words,
                new_words,
                threshold,
            };
        }

        let mode = if first_generation {
            RunMode::Full
        } else {
            RunMode::Incremental
        };
        let upgrade_model = completed && current_words > self.model_switch_word_threshold;

        Decision::Triggered {
            mode,
            upgrade_model,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> PolicyConfig {
        PolicyConfig::default()
    }

    #[test]
    fn first_generation_waits_for_initial_threshold() {
        match cfg().evaluate(true, false, 150, 150) {
            Decision::Skip {
                current_words,
                new_words,
                threshold,
            } => {
                assert_eq!(current_words, 150);
                assert_eq!(new_words, 150);
                assert_eq!(threshold, 200);
            }
            other => panic!("expected skip, got {other:?}"),
        }

        assert_eq!(
            cfg().evaluate(true, false, 200, 200),
            Decision::Triggered {
                mode: RunMode::Full,
                upgrade_model: false,
            }
        );
    }

    #[test]
    fn updates_wait_for_enough_new_words() {
        match cfg().evaluate(false, false, 450, 250) {
            Decision::Skip { threshold, .. } => assert_eq!(threshold, 300),
            other => panic!("expected skip, got {other:?}"),
        }

        assert_eq!(
            cfg().evaluate(false, false, 500, 300),
            Decision::Triggered {
                mode: RunMode::Incremental,
                upgrade_model: false,
            }
        );
    }

    #[test]
    fn completion_forces_a_run_below_thresholds() {
        assert_eq!(
            cfg().evaluate(false, true, 40, 5),
            Decision::Triggered {
                mode: RunMode::Incremental,
                upgrade_model: false,
            }
        );
        // completion on a never-summarized session is still a full pass
        assert_eq!(
            cfg().evaluate(true, true, 40, 40),
            Decision::Triggered {
                mode: RunMode::Full,
                upgrade_model: false,
            }
        );
    }

    #[test]
    fn upgrade_is_advised_strictly_above_switch_threshold() {
        assert_eq!(
            cfg().evaluate(false, true, 500, 10),
            Decision::Triggered {
                mode: RunMode::Incremental,
                upgrade_model: false,
            }
        );
        assert_eq!(
            cfg().evaluate(false, true, 501, 10),
            Decision::Triggered {
                mode: RunMode::Incremental,
                upgrade_model: true,
            }
        );
        // upgrade is only advised for completed sessions
        assert_eq!(
            cfg().evaluate(false, false, 900, 400),
            Decision::Triggered {
                mode: RunMode::Incremental,
                upgrade_model: false,
            }
        );
    }

    #[test]
    fn negative_new_words_never_trigger_an_update() {
        match cfg().evaluate(false, false, 100, -50) {
            Decision::Skip { new_words, .. } => assert_eq!(new_words, -50),
            other => panic!("expected skip, got {other:?}"),
        }
        // unless the session completed
        assert!(matches!(
            cfg().evaluate(false, true, 100, -50),
            Decision::Triggered { .. }
        ));
    }

    #[test]
    fn config_defaults_fill_missing_fields() {
        let parsed: PolicyConfig = toml::from_str("initial_word_threshold = 100").unwrap();
        assert_eq!(parsed.initial_word_threshold, 100);
        assert_eq!(parsed.update_word_threshold, 300);
        assert_eq!(parsed.max_transcript_chars, 50_000);
    }
}
