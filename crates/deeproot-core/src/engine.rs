//! Chat engine: the `generate_response` flow.
//!
//! Relevance gate → nickname detection + prompt templating → generation.
//! The generator is injected, so tests substitute the mock backend.

use crate::keywords::{KeywordSet, RelevanceGate};
use crate::model::{ModelError, TextGenerator};
use crate::persona::Persona;
use crate::CoreConfig;

pub struct ChatEngine {
    persona: Persona,
    gate: RelevanceGate,
    generator: Box<dyn TextGenerator>,
}

impl ChatEngine {
    pub fn new(persona: Persona, gate: RelevanceGate, generator: Box<dyn TextGenerator>) -> Self {
        Self {
            persona,
            gate,
            generator,
        }
    }

    /// Build an engine from config: DeepRoot persona, keyword gate from the
    /// configured resource (fail-open), and the given generation backend.
    pub fn from_config(config: &CoreConfig, generator: Box<dyn TextGenerator>) -> Self {
        let keywords = KeywordSet::load_or_default(&config.keywords_path);
        let gate = RelevanceGate::new(keywords, config.max_ungated_tokens);
        Self::new(Persona::deep_root(), gate, generator)
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    /// Introduction text for the `/introduce` endpoint.
    pub fn introduce(&self) -> String {
        self.persona.introduction()
    }

    /// Turn user text into generated text. Off-topic queries get the
    /// persona's fixed refusal instead of reaching the model.
    pub fn generate_response(&self, message: &str) -> Result<String, ModelError> {
        if !self.gate.is_relevant(message) {
            tracing::debug!(
                target: "deeproot::engine",
                "Relevance gate rejected the query"
            );
            return Ok(self.persona.off_topic_reply());
        }
        let prompt = self.persona.render_prompt(self.generator.family(), message);
        tracing::debug!(
            target: "deeproot::engine",
            model = self.generator.model_name(),
            prompt_len = prompt.len(),
            "Dispatching prompt to generator"
        );
        self.generator.generate(&prompt)
    }
}
