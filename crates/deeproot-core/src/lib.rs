//! deeproot-core: DeepRoot chatbot core library.
//!
//! Persona identity, keyword relevance gate, prompt builder, and the
//! generation adapter (candle-backed local inference plus a mock backend),
//! so the gateway keeps a consistent public API.

mod config;
mod engine;
mod keywords;
mod persona;
pub mod model;

pub use config::CoreConfig;
pub use engine::ChatEngine;
pub use keywords::{KeywordSet, RelevanceGate};
pub use persona::{Persona, PersonalityTraits};

pub use model::{
    GenerationParams, ModelError, ModelFamily, TextGenerator,
    candle::CandleGenerator,
    mock::MockGenerator,
};
