//! Generation adapter: a uniform `generate(prompt) -> text` operation over
//! two model families with different post-processing.
//!
//! Decoder-only (causal) models re-emit the prompt as a prefix of their
//! output, so the first N input tokens are sliced off before decoding.
//! Encoder-decoder (seq2seq) models produce output independently of the
//! input encoding and are decoded whole. That difference is encapsulated
//! here; callers only see text in, text out.

pub mod candle;
pub mod mock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the generation backend.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to load model: {0}")]
    Load(String),

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("inference error: {0}")]
    Inference(#[from] candle_core::Error),
}

/// Which post-processing the model's output needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFamily {
    /// Decoder-only: output echoes the prompt; strip the prefix.
    Causal,
    /// Encoder-decoder: output stands alone; decode it whole.
    Seq2Seq,
}

impl ModelFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFamily::Causal => "causal",
            ModelFamily::Seq2Seq => "seq2seq",
        }
    }

    /// Parse a config string. Unknown values fall back to causal.
    pub fn from_str(s: &str) -> Self {
        match s.trim() {
            s if s.eq_ignore_ascii_case("seq2seq") => ModelFamily::Seq2Seq,
            _ => ModelFamily::Causal,
        }
    }
}

/// Fixed decoding parameters for every generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Upper bound on newly generated tokens.
    pub max_new_tokens: usize,
    pub temperature: f64,
    /// Nucleus-sampling threshold.
    pub top_p: f64,
    /// When false, decoding is greedy (argmax) instead of sampled.
    pub do_sample: bool,
    /// Input is truncated to this many tokens to bound memory and latency.
    pub max_input_tokens: usize,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_new_tokens: 256,
            temperature: 0.7,
            top_p: 0.9,
            do_sample: true,
            max_input_tokens: 512,
        }
    }
}

/// Text generation backend, abstracting over the underlying model family.
pub trait TextGenerator: Send + Sync {
    /// Family tag; drives the prompt template used for this backend.
    fn family(&self) -> ModelFamily;

    /// Produce response text for a rendered prompt.
    fn generate(&self, prompt: &str) -> Result<String, ModelError>;

    /// Model name/identifier for logs and status surfaces.
    fn model_name(&self) -> &str;
}

/// The ids to decode for the response, given the full output buffer.
///
/// Causal buffers hold prompt + generated ids, so the first `prompt_len`
/// ids are dropped; seq2seq buffers are returned unmodified.
pub(crate) fn response_ids(family: ModelFamily, prompt_len: usize, output: &[u32]) -> &[u32] {
    match family {
        ModelFamily::Causal => &output[prompt_len.min(output.len())..],
        ModelFamily::Seq2Seq => output,
    }
}
