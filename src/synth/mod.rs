pub mod ollama;
pub mod openai;
pub mod parse;
pub mod prompt;

use tracing::{debug, info};

use crate::config::SynthesisConfig;
use crate::db::models::InsightSet;
use crate::error::{PipelineError, Result};
use crate::policy::RunMode;
use prompt::TimestampHint;

/// One fully-assembled request to a model backend.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: u32,
}

/// Trait that all model backends implement. One call per pipeline run; the
/// pipeline decides whether a failure is worth a later retry, the backend
/// never retries internally.
pub trait SynthesisBackend: Send + Sync + std::fmt::Debug {
    /// Backend name (used in logs and `tip info`).
    fn name(&self) -> &str;

    /// Run one completion and return the raw response text.
    fn generate(&self, req: &GenerationRequest) -> Result<String>;
}

/// Build the configured backend. `api_key` must already be resolved by the
/// caller (flag, environment, or config chain).
pub fn build_backend(
    cfg: &SynthesisConfig,
    api_key: Option<String>,
) -> Result<Box<dyn SynthesisBackend>> {
    match cfg.backend.as_str() {
        "openai" => {
            let key = api_key.ok_or_else(|| PipelineError::Config {
                message: "openai backend requires an API key; pass --api-key, set TIP_API_KEY, or configure one"
                    .to_string(),
            })?;
            Ok(Box::new(openai::OpenAiBackend::new(
                key,
                cfg.base_url.clone(),
                cfg.timeout_secs,
            )?))
        }
        "ollama" => Ok(Box::new(ollama::OllamaBackend::new(
            cfg.base_url.clone(),
            cfg.timeout_secs,
        )?)),
        other => Err(PipelineError::Config {
            message: format!("unknown synthesis backend '{other}' (expected openai or ollama)"),
        }),
    }
}

/// Everything one synthesis call needs, assembled by the pipeline.
#[derive(Debug)]
pub struct SynthesisJob<'a> {
    pub session_id: &'a str,
    pub mode: RunMode,
    /// Full transcript on a full run, only the new slice on an incremental
    /// one. Already clamped to the configured character cap.
    pub text: &'a str,
    pub prior: Option<&'a InsightSet>,
    pub hints: &'a [TimestampHint],
    /// Advisory flag from the policy: long completed session, use the
    /// larger model if one is configured.
    pub upgrade_model: bool,
}

pub struct InsightSynthesizer {
    backend: Box<dyn SynthesisBackend>,
    model: String,
    upgrade_model: Option<String>,
    max_tokens: u32,
}

impl InsightSynthesizer {
    pub fn new(backend: Box<dyn SynthesisBackend>, cfg: &SynthesisConfig) -> Self {
        Self {
            backend,
            model: cfg.model.clone(),
            upgrade_model: cfg.upgrade_model.clone(),
            max_tokens: cfg.max_tokens,
        }
    }

    /// Build the configured backend and wrap it.
    pub fn from_config(cfg: &SynthesisConfig, api_key: Option<String>) -> Result<Self> {
        let backend = build_backend(cfg, api_key)?;
        Ok(Self::new(backend, cfg))
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Model a job would run with, honoring the upgrade advisory.
    pub fn model_for(&self, upgrade: bool) -> &str {
        if upgrade {
            self.upgrade_model.as_deref().unwrap_or(&self.model)
        } else {
            &self.model
        }
    }

    /// Run one synthesis call and normalize the response.
    pub fn synthesize(&self, job: &SynthesisJob) -> Result<InsightSet> {
        let model = self.model_for(job.upgrade_model);

        let empty;
        let (system_prompt, user_prompt) = match job.mode {
            RunMode::Full => prompt::full_prompts(job.text, job.hints),
            RunMode::Incremental => {
                let prior = match job.prior {
                    Some(p) => p,
                    None => {
                        empty = InsightSet::default();
                        &empty
                    }
                };
                prompt::incremental_prompts(job.text, prior, job.hints)
            }
        };

        let request = GenerationRequest {
            model: model.to_string(),
            system_prompt,
            user_prompt,
            max_tokens: self.max_tokens,
        };

        info!(
            session_id = %job.session_id,
            backend = %self.backend.name(),
            model = %request.model,
            mode = job.mode.as_str(),
            input_chars = job.text.len(),
            "Requesting insight synthesis"
        );

        let raw = self.backend.generate(&request)?;
        let set = parse::parse_insights(&raw)?;
        if set.is_empty() {
            return Err(PipelineError::SynthesisParse {
                message: "model returned no usable insights".to_string(),
            });
        }

        debug!(
            session_id = %job.session_id,
            key_points = set.key_points.len(),
            action_items = set.action_items.len(),
            quotes = set.quotes.len(),
            has_summary = !set.summary.is_empty(),
            "Synthesis response parsed"
        );

        Ok(set)
    }
}
