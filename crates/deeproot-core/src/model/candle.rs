//! Candle-backed local inference: one generator struct over two model
//! families. Causal = Qwen2 decoder-only, seq2seq = T5 encoder-decoder.
//!
//! Model files (tokenizer.json, config.json, model.safetensors) come from
//! the Hugging Face hub via `hf-hub`, which caches them locally. Generation
//! mutates the KV caches, so the model lives behind a single `Mutex` and
//! requests serialize on it.

use std::sync::Mutex;
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::{qwen2, t5};
use hf_hub::api::sync::Api;
use hf_hub::{Repo, RepoType};
use tokenizers::Tokenizer;

use super::{response_ids, GenerationParams, ModelError, ModelFamily, TextGenerator};

const DEFAULT_CAUSAL_MODEL: &str = "Qwen/Qwen2.5-0.5B-Instruct";
const DEFAULT_SEQ2SEQ_MODEL: &str = "google/flan-t5-base";

/// Fixed sampling seed so mock-free runs are reproducible across restarts.
const GENERATION_SEED: u64 = 299792458;

/// End-of-sequence token spellings, most specific first.
const EOS_TOKENS: &[&str] = &["<|im_end|>", "<|endoftext|>", "</s>"];
const PAD_TOKENS: &[&str] = &["<pad>"];

enum ModelKind {
    Causal(qwen2::ModelForCausalLM),
    Seq2Seq {
        model: t5::T5ForConditionalGeneration,
        decoder_start: u32,
    },
}

/// Local text generation over candle. One model instance per process.
pub struct CandleGenerator {
    family: ModelFamily,
    model_id: String,
    tokenizer: Tokenizer,
    inner: Mutex<ModelKind>,
    params: GenerationParams,
    device: Device,
    eos_token_id: Option<u32>,
}

impl CandleGenerator {
    /// Download (or reuse cached) model files and load the weights.
    /// `model_id` of `None` selects the per-family default repo.
    pub fn load(
        family: ModelFamily,
        model_id: Option<&str>,
        revision: &str,
        params: GenerationParams,
    ) -> Result<Self, ModelError> {
        let model_id = model_id
            .map(str::to_string)
            .unwrap_or_else(|| default_model_id(family).to_string());
        let device = Device::Cpu;
        let started = Instant::now();

        let api = Api::new().map_err(|e| ModelError::Load(e.to_string()))?;
        let repo = api.repo(Repo::with_revision(
            model_id.clone(),
            RepoType::Model,
            revision.to_string(),
        ));
        let tokenizer_path = repo
            .get("tokenizer.json")
            .map_err(|e| ModelError::Load(e.to_string()))?;
        let config_path = repo
            .get("config.json")
            .map_err(|e| ModelError::Load(e.to_string()))?;
        let weights_path = repo
            .get("model.safetensors")
            .map_err(|e| ModelError::Load(e.to_string()))?;

        let tokenizer =
            Tokenizer::from_file(tokenizer_path).map_err(|e| ModelError::Tokenizer(e.to_string()))?;
        let config_bytes =
            std::fs::read(config_path).map_err(|e| ModelError::Load(e.to_string()))?;
        let vb =
            unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)? };

        let inner = match family {
            ModelFamily::Causal => {
                let config: qwen2::Config = serde_json::from_slice(&config_bytes)
                    .map_err(|e| ModelError::Load(e.to_string()))?;
                ModelKind::Causal(qwen2::ModelForCausalLM::new(&config, vb)?)
            }
            ModelFamily::Seq2Seq => {
                let mut config: t5::Config = serde_json::from_slice(&config_bytes)
                    .map_err(|e| ModelError::Load(e.to_string()))?;
                config.use_cache = true;
                let decoder_start =
                    config.decoder_start_token_id.unwrap_or(config.pad_token_id) as u32;
                ModelKind::Seq2Seq {
                    model: t5::T5ForConditionalGeneration::load(vb, &config)?,
                    decoder_start,
                }
            }
        };

        let eos_token_id = first_token_id(&tokenizer, EOS_TOKENS);
        // Models without a dedicated pad token reuse end-of-sequence for padding.
        let pad_token_id = first_token_id(&tokenizer, PAD_TOKENS).or(eos_token_id);

        tracing::info!(
            target: "deeproot::model",
            model = %model_id,
            family = family.as_str(),
            eos = ?eos_token_id,
            pad = ?pad_token_id,
            "Model loaded in {:?}",
            started.elapsed()
        );

        Ok(Self {
            family,
            model_id,
            tokenizer,
            inner: Mutex::new(inner),
            params,
            device,
            eos_token_id,
        })
    }

    fn logits_processor(&self) -> LogitsProcessor {
        if self.params.do_sample {
            LogitsProcessor::new(
                GENERATION_SEED,
                Some(self.params.temperature),
                Some(self.params.top_p),
            )
        } else {
            // Greedy decoding.
            LogitsProcessor::new(GENERATION_SEED, None, None)
        }
    }

    /// Autoregressive decode loop. The returned buffer holds prompt +
    /// generated ids; the echoed prompt is sliced off by the caller.
    fn generate_causal(
        &self,
        model: &mut qwen2::ModelForCausalLM,
        prompt_ids: &[u32],
    ) -> Result<Vec<u32>, ModelError> {
        model.clear_kv_cache();
        let mut logits_processor = self.logits_processor();
        let mut tokens = prompt_ids.to_vec();
        for index in 0..self.params.max_new_tokens {
            let context_size = if index > 0 { 1 } else { tokens.len() };
            let start_pos = tokens.len().saturating_sub(context_size);
            let input = Tensor::new(&tokens[start_pos..], &self.device)?.unsqueeze(0)?;
            let logits = model.forward(&input, start_pos)?;
            let logits = logits.squeeze(0)?.squeeze(0)?.to_dtype(DType::F32)?;
            let next = logits_processor.sample(&logits)?;
            tokens.push(next);
            if self.eos_token_id == Some(next) {
                break;
            }
        }
        Ok(tokens)
    }

    /// Encode once, then decode step by step. The returned buffer holds the
    /// decoder sequence only; there is no prompt echo to strip.
    fn generate_seq2seq(
        &self,
        model: &mut t5::T5ForConditionalGeneration,
        decoder_start: u32,
        prompt_ids: &[u32],
    ) -> Result<Vec<u32>, ModelError> {
        model.clear_kv_cache();
        let mut logits_processor = self.logits_processor();
        let input = Tensor::new(prompt_ids, &self.device)?.unsqueeze(0)?;
        let encoder_output = model.encode(&input)?;
        let mut tokens = vec![decoder_start];
        for index in 0..self.params.max_new_tokens {
            // With the KV cache warm, only the newest token is fed back in.
            let context = if index == 0 {
                &tokens[..]
            } else {
                &tokens[tokens.len() - 1..]
            };
            let decoder_ids = Tensor::new(context, &self.device)?.unsqueeze(0)?;
            let logits = model.decode(&decoder_ids, &encoder_output)?.squeeze(0)?;
            let next = logits_processor.sample(&logits)?;
            if self.eos_token_id == Some(next) {
                break;
            }
            tokens.push(next);
        }
        Ok(tokens)
    }
}

impl TextGenerator for CandleGenerator {
    fn family(&self) -> ModelFamily {
        self.family
    }

    fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| ModelError::Tokenizer(e.to_string()))?;
        let ids = encoding.get_ids();
        // Bound input length to protect memory and latency.
        let ids = &ids[..ids.len().min(self.params.max_input_tokens)];
        if ids.is_empty() {
            return Err(ModelError::Tokenizer(
                "prompt produced no tokens".to_string(),
            ));
        }

        // A poisoned lock means a previous generation panicked mid-request;
        // clear_kv_cache at the top of each loop resets any half-written
        // state, so the model is safe to reuse.
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let output = match &mut *inner {
            ModelKind::Causal(model) => self.generate_causal(model, ids)?,
            ModelKind::Seq2Seq {
                model,
                decoder_start,
            } => {
                let start = *decoder_start;
                self.generate_seq2seq(model, start, ids)?
            }
        };
        drop(inner);

        let response = response_ids(self.family, ids.len(), &output);
        let text = self
            .tokenizer
            .decode(response, true)
            .map_err(|e| ModelError::Tokenizer(e.to_string()))?;
        Ok(text.trim().to_string())
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

fn default_model_id(family: ModelFamily) -> &'static str {
    match family {
        ModelFamily::Causal => DEFAULT_CAUSAL_MODEL,
        ModelFamily::Seq2Seq => DEFAULT_SEQ2SEQ_MODEL,
    }
}

/// First candidate spelling the tokenizer actually knows.
fn first_token_id(tokenizer: &Tokenizer, candidates: &[&str]) -> Option<u32> {
    candidates.iter().find_map(|t| tokenizer.token_to_id(t))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_model_ids_track_family() {
        assert_eq!(default_model_id(ModelFamily::Causal), DEFAULT_CAUSAL_MODEL);
        assert_eq!(
            default_model_id(ModelFamily::Seq2Seq),
            DEFAULT_SEQ2SEQ_MODEL
        );
    }
}
