use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::policy::PolicyConfig;

/// Synthesis backend settings from config.toml.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Backend name: "openai" or "ollama".
    pub backend: String,
    pub model: String,
    /// Larger model for the final pass over long completed sessions.
    /// None disables the switch.
    pub upgrade_model: Option<String>,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub api_key_command: Option<String>,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        SynthesisConfig {
            backend: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            upgrade_model: Some("gpt-4o".to_string()),
            max_tokens: 1024,
            timeout_secs: 60,
            base_url: None,
            api_key: None,
            api_key_command: None,
        }
    }
}

/// Top-level tip config file structure.
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
#[serde(default)]
pub struct TipConfig {
    /// Default identity for runs when --actor and TIP_ACTOR are unset.
    pub actor: Option<String>,
    pub policy: PolicyConfig,
    pub synthesis: SynthesisConfig,
}

impl TipConfig {
    /// Load config from ~/.tip/config.toml. Returns defaults if the file
    /// doesn't exist.
    pub fn load() -> Result<Self> {
        let path = config_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(TipConfig::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: TipConfig =
            toml::from_str(&content).with_context(|| "Failed to parse config.toml")?;
        Ok(config)
    }

    /// Display config with secrets redacted.
    pub fn display_redacted(&self) -> String {
        let mut lines = Vec::new();
        if let Some(ref actor) = self.actor {
            lines.push(format!("actor = \"{actor}\""));
        }
        lines.push("[policy]".to_string());
        lines.push(format!(
            "  initial_word_threshold = {}",
            self.policy.initial_word_threshold
        ));
        lines.push(format!(
            "  update_word_threshold = {}",
            self.policy.update_word_threshold
        ));
        lines.push(format!(
            "  model_switch_word_threshold = {}",
            self.policy.model_switch_word_threshold
        ));
        lines.push("[synthesis]".to_string());
        lines.push(format!("  backend = \"{}\"", self.synthesis.backend));
        lines.push(format!("  model = \"{}\"", self.synthesis.model));
        if let Some(ref m) = self.synthesis.upgrade_model {
            lines.push(format!("  upgrade_model = \"{m}\""));
        }
        if let Some(ref url) = self.synthesis.base_url {
            lines.push(format!("  base_url = \"{url}\""));
        }
        if let Some(ref key) = self.synthesis.api_key {
            // char-based slicing; byte offsets would split multibyte keys
            let n = key.chars().count();
            let redacted = if n > 8 {
                let head: String = key.chars().take(4).collect();
                let tail: String = key.chars().skip(n - 4).collect();
                format!("{head}...{tail}")
            } else {
                "****".to_string()
            };
            lines.push(format!("  api_key = \"{redacted}\""));
        }
        if let Some(ref cmd) = self.synthesis.api_key_command {
            lines.push(format!("  api_key_command = \"{cmd}\""));
        }
        lines.join("\n")
    }
}

/// Resolve the API key through the chain: CLI flag > TIP_API_KEY >
/// config api_key > config api_key_command. Returns None when nothing is
/// configured; the openai backend rejects that, ollama doesn't care.
pub fn resolve_api_key(cli_flag: Option<&str>, cfg: &SynthesisConfig) -> Result<Option<String>> {
    if let Some(key) = cli_flag {
        if !key.is_empty() {
            return Ok(Some(key.to_string()));
        }
    }

    if let Ok(val) = std::env::var("TIP_API_KEY") {
        if !val.is_empty() {
            return Ok(Some(val));
        }
    }

    if let Some(ref key) = cfg.api_key {
        if !key.is_empty() {
            return Ok(Some(key.clone()));
        }
    }

    if let Some(ref cmd) = cfg.api_key_command {
        if !cmd.is_empty() {
            let output = std::process::Command::new("sh")
                .arg("-c")
                .arg(cmd)
                .output()
                .with_context(|| format!("Failed to run api_key_command: {cmd}"))?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                bail!(
                    "api_key_command failed (exit {}): {}",
                    output.status.code().unwrap_or(-1),
                    stderr.trim()
                );
            }

            let secret = String::from_utf8(output.stdout)
                .context("api_key_command output is not valid UTF-8")?
                .trim()
                .to_string();

            if !secret.is_empty() {
                return Ok(Some(secret));
            }
        }
    }

    Ok(None)
}

/// Resolve the acting identity: CLI flag > TIP_ACTOR > config actor.
pub fn resolve_actor(cli_flag: Option<&str>, cfg: &TipConfig) -> Option<String> {
    if let Some(actor) = cli_flag {
        if !actor.is_empty() {
            return Some(actor.to_string());
        }
    }
    if let Ok(val) = std::env::var("TIP_ACTOR") {
        if !val.is_empty() {
            return Some(val);
        }
    }
    cfg.actor.clone()
}

/// Path to the config file: ~/.tip/config.toml
pub fn config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".tip").join("config.toml"))
}

/// Default config template content.
pub fn default_config_template() -> &'static str {
    r#"# ~/.tip/config.toml
# API key resolution order: --api-key flag > TIP_API_KEY > api_key > api_key_command

# actor = "your-username"

[policy]
# initial_word_threshold = 200
# update_word_threshold = 300
# model_switch_word_threshold = 500

[synthesis]
# backend = "openai"          # or "ollama"
# model = "gpt-4o-mini"
# upgrade_model = "gpt-4o"
# base_url = "https://api.openai.com/v1"
# api_key = "your-api-key"
# api_key_command = "your-secrets-manager-command-here"
"#
}

/// Create the default config file if it doesn't already exist.
pub fn init_config() -> Result<bool> {
    let path = config_path()?;
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, default_config_template())?;
    Ok(true)
}
