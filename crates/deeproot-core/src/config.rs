//! Gateway configuration. Load from TOML or env.
//!
//! Precedence: programmatic defaults < `config/gateway.toml` (or the file
//! named by `DEEPROOT_CONFIG`) < environment variables with prefix
//! `DEEPROOT` and separator `__` (e.g. `DEEPROOT__PORT=8080`).

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Global application configuration (gateway + model selection).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Application identity used in logs (e.g. "DeepRoot Gateway").
    pub app_name: String,
    /// HTTP port for the gateway. Bound on 127.0.0.1 only.
    pub port: u16,
    /// LLM mode: "mock" (deterministic canned output) or "local" (candle inference).
    pub llm_mode: String,
    /// Model family: "causal" (decoder-only) or "seq2seq" (encoder-decoder).
    pub model_family: String,
    /// Hugging Face hub repo id. When unset, a per-family default is used.
    #[serde(default)]
    pub model_id: Option<String>,
    /// Hub revision (branch or commit) for model files.
    #[serde(default = "default_revision")]
    pub model_revision: String,
    /// Newline-delimited keyword resource for the relevance gate.
    pub keywords_path: String,
    /// Queries with at most this many whitespace-separated tokens always pass
    /// the relevance gate (greetings, nickname-only messages).
    #[serde(default = "default_max_ungated_tokens")]
    pub max_ungated_tokens: usize,
}

fn default_revision() -> String {
    "main".to_string()
}

fn default_max_ungated_tokens() -> usize {
    2
}

impl CoreConfig {
    /// Load config from file and environment. Precedence: env `DEEPROOT_CONFIG`
    /// path > `config/gateway.toml` > defaults.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("DEEPROOT_CONFIG").unwrap_or_else(|_| "config/gateway".to_string());
        let builder = config::Config::builder()
            .set_default("app_name", "DeepRoot Gateway")?
            .set_default("port", 5000_i64)?
            .set_default("llm_mode", "mock")?
            .set_default("model_family", "causal")?
            .set_default("model_revision", "main")?
            .set_default("keywords_path", "./keywords.txt")?
            .set_default("max_ungated_tokens", 2_i64)?;

        let path = Path::new(&config_path);
        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(config::Environment::with_prefix("DEEPROOT").separator("__"))
            .build()?;

        built.try_deserialize()
    }

    /// True when the gateway should run real candle inference.
    pub fn llm_local(&self) -> bool {
        self.llm_mode.trim().eq_ignore_ascii_case("local")
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            app_name: "DeepRoot Gateway".to_string(),
            port: 5000,
            llm_mode: "mock".to_string(),
            model_family: "causal".to_string(),
            model_id: None,
            model_revision: default_revision(),
            keywords_path: "./keywords.txt".to_string(),
            max_ungated_tokens: default_max_ungated_tokens(),
        }
    }
}
