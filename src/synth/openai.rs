use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{GenerationRequest, SynthesisBackend};
use crate::error::{PipelineError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Backend for the OpenAI Chat Completions API and compatible servers.
#[derive(Debug)]
pub struct OpenAiBackend {
    api_key: String,
    base_url: String,
    timeout_secs: u64,
    client: reqwest::blocking::Client,
}

impl OpenAiBackend {
    pub fn new(api_key: String, base_url: Option<String>, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| PipelineError::Synthesis {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout_secs,
            client,
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageBody,
}

#[derive(Debug, Deserialize)]
struct ChatMessageBody {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
    code: Option<String>,
}

impl SynthesisBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
    }

    fn generate(&self, req: &GenerationRequest) -> Result<String> {
        let body = ChatRequest {
            model: &req.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &req.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &req.user_prompt,
                },
            ],
            max_tokens: req.max_tokens,
            temperature: 0.3,
        };

        debug!(
            model = %req.model,
            prompt_chars = req.system_prompt.len() + req.user_prompt.len(),
            "Calling chat completions"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .map_err(|e| classify_transport(e, self.timeout_secs))?;

        let status = response.status();
        if status.is_success() {
            let parsed: ChatResponse =
                response.json().map_err(|e| PipelineError::SynthesisParse {
                    message: format!("malformed completion payload: {e}"),
                })?;
            return parsed
                .choices
                .into_iter()
                .next()
                .map(|c| c.message.content.trim().to_string())
                .filter(|content| !content.is_empty())
                .ok_or_else(|| PipelineError::SynthesisParse {
                    message: "completion contained no choices".to_string(),
                });
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body_text = response.text().unwrap_or_default();
        Err(classify_status(status.as_u16(), retry_after, &body_text))
    }
}

fn classify_transport(err: reqwest::Error, timeout_secs: u64) -> PipelineError {
    if err.is_timeout() {
        PipelineError::SynthesisTimeout { timeout_secs }
    } else {
        PipelineError::Synthesis {
            message: format!("request failed: {err}"),
        }
    }
}

/// Map an API error status to the pipeline taxonomy. A 429 usually means
/// rate limiting, but OpenAI also uses it with code `insufficient_quota`
/// for exhausted billing, which must not be retried.
fn classify_status(status: u16, retry_after_secs: Option<u64>, body: &str) -> PipelineError {
    let detail = serde_json::from_str::<ErrorResponse>(body).ok();
    let code = detail.as_ref().and_then(|d| d.error.code.clone());
    let message = detail
        .map(|d| d.error.message)
        .unwrap_or_else(|| body.trim().to_string());

    match status {
        402 => PipelineError::QuotaExhausted { message },
        429 if code.as_deref() == Some("insufficient_quota") => {
            PipelineError::QuotaExhausted { message }
        }
        429 => PipelineError::RateLimited { retry_after_secs },
        _ => PipelineError::Synthesis {
            message: format!("API returned {status}: {message}"),
        },
    }
}
