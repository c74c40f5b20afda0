//! Mock generation backend: deterministic canned output for offline mode
//! and tests. Selected by `llm_mode = "mock"`.

use super::{ModelError, ModelFamily, TextGenerator};

const MOCK_MODEL_NAME: &str = "mock";

/// Returns a simulated generation embedding a preview of the prompt, so the
/// end-to-end pipeline can be exercised without model weights.
pub struct MockGenerator {
    family: ModelFamily,
}

impl MockGenerator {
    pub fn new(family: ModelFamily) -> Self {
        Self { family }
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new(ModelFamily::Causal)
    }
}

impl TextGenerator for MockGenerator {
    fn family(&self) -> ModelFamily {
        self.family
    }

    fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        let preview = prompt
            .chars()
            .take(80)
            .chain(if prompt.len() > 80 { "…" } else { "" }.chars())
            .collect::<String>();
        Ok(format!(
            "[Generated – Mock LLM] Based on your question ({}), healthy soil starts with \
             organic matter: work in compost, keep the surface mulched, and test pH before \
             amending.",
            preview
        ))
    }

    fn model_name(&self) -> &str {
        MOCK_MODEL_NAME
    }
}
