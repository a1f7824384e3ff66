use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{GenerationRequest, SynthesisBackend};
use crate::error::{PipelineError, Result};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Backend for a local Ollama server. No API key, no billing statuses;
/// anything other than success is a plain synthesis failure.
#[derive(Debug)]
pub struct OllamaBackend {
    base_url: String,
    timeout_secs: u64,
    client: reqwest::blocking::Client,
}

impl OllamaBackend {
    pub fn new(base_url: Option<String>, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| PipelineError::Synthesis {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout_secs,
            client,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
}

impl SynthesisBackend for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    fn generate(&self, req: &GenerationRequest) -> Result<String> {
        let body = OllamaChatRequest {
            model: &req.model,
            messages: vec![
                OllamaMessage {
                    role: "system".to_string(),
                    content: req.system_prompt.clone(),
                },
                OllamaMessage {
                    role: "user".to_string(),
                    content: req.user_prompt.clone(),
                },
            ],
            stream: false,
            options: OllamaOptions {
                temperature: 0.3,
                num_predict: req.max_tokens,
            },
        };

        debug!(model = %req.model, base_url = %self.base_url, "Calling Ollama chat");

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    PipelineError::SynthesisTimeout {
                        timeout_secs: self.timeout_secs,
                    }
                } else {
                    PipelineError::Synthesis {
                        message: format!("request to Ollama failed: {e}"),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(PipelineError::Synthesis {
                message: format!("Ollama returned {status}: {text}"),
            });
        }

        let parsed: OllamaChatResponse =
            response.json().map_err(|e| PipelineError::SynthesisParse {
                message: format!("malformed Ollama payload: {e}"),
            })?;

        let content = parsed.message.content.trim().to_string();
        if content.is_empty() {
            return Err(PipelineError::SynthesisParse {
                message: "Ollama returned an empty completion".to_string(),
            });
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_disables_streaming_and_caps_tokens() {
        let body = OllamaChatRequest {
            model: "llama3.2",
            messages: vec![OllamaMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
            }],
            stream: false,
            options: OllamaOptions {
                temperature: 0.3,
                num_predict: 512,
            },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["stream"], false);
        assert_eq!(value["options"]["num_predict"], 512);
        assert_eq!(value["model"], "llama3.2");
    }
}
