//! Persona layer: the fixed identity the model presents to users.
//!
//! Nickname detection scans the declared alias list in order; the first alias
//! found as a case-insensitive substring of the query is the invoked name.
//! Prompt templates differ by model family: causal models get a trailing
//! "Answer:" cue, encoder-decoder models get an "Answer as X:" framing.

use crate::model::ModelFamily;
use serde::{Deserialize, Serialize};

/// Personality attributes attached to a [`Persona`]. Boolean flags plus a
/// tone and expertise string; only descriptive, never branched on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalityTraits {
    pub knowledgeable: bool,
    pub helpful: bool,
    pub friendly: bool,
    pub patient: bool,
    pub tone: String,
    pub expertise: String,
}

/// The fixed identity (name, aliases, tone) presented to users.
/// Immutable after construction; one per process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    /// Canonical display name, used when no nickname is invoked.
    pub display_name: String,
    /// Ordered alias list. Order matters: detection returns the first match.
    pub nicknames: Vec<String>,
    /// Descriptive text for status surfaces.
    pub description: String,
    pub traits: PersonalityTraits,
}

impl Persona {
    /// The DeepRoot soil-health advisor identity.
    pub fn deep_root() -> Self {
        Self {
            display_name: "DeepRoot".to_string(),
            nicknames: vec![
                "DeepRoot".to_string(),
                "Deep".to_string(),
                "D.R".to_string(),
                "DR".to_string(),
            ],
            description: "DeepRoot is a model designed to provide expert advice on soil health \
                          and plant growth."
                .to_string(),
            traits: PersonalityTraits {
                knowledgeable: true,
                helpful: true,
                friendly: true,
                patient: true,
                tone: "friendly and enthusiastic".to_string(),
                expertise: "soil health and plant growth".to_string(),
            },
        }
    }

    /// Introduction text for the `/introduce` endpoint.
    pub fn introduction(&self) -> String {
        format!(
            "Hi! I'm {}. You can call me {}. I can help you with {} questions.",
            self.display_name,
            self.nicknames.join(", "),
            self.traits.expertise
        )
    }

    /// Fixed reply when the relevance gate rejects a query.
    pub fn off_topic_reply(&self) -> String {
        format!(
            "I'm sorry, but I can only provide advice on {}. Please ask me a relevant question.",
            self.traits.expertise
        )
    }

    /// First declared nickname occurring case-insensitively in the query,
    /// or the canonical display name when none matches.
    pub fn invoked_name<'a>(&'a self, query: &str) -> &'a str {
        let lowered = query.to_lowercase();
        self.nicknames
            .iter()
            .find(|n| lowered.contains(&n.to_lowercase()))
            .map(String::as_str)
            .unwrap_or(&self.display_name)
    }

    /// Render the instruction prompt for the given model family. The invoked
    /// name and the verbatim query are always embedded.
    pub fn render_prompt(&self, family: ModelFamily, query: &str) -> String {
        let name = self.invoked_name(query);
        match family {
            ModelFamily::Causal => format!(
                "You are {}, a knowledgeable and helpful assistant specializing in {}. \
                 Question: {}\nAnswer:",
                name, self.traits.expertise, query
            ),
            ModelFamily::Seq2Seq => format!(
                "Answer as {}, a knowledgeable soil and plant expert: {}",
                name, query
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nickname_detection_is_order_stable() {
        let persona = Persona::deep_root();
        // "Deep" precedes "DR" in the declared order, so it wins even though
        // both occur in the query.
        assert_eq!(persona.invoked_name("Hey Deep, what about DR?"), "Deep");
    }

    #[test]
    fn nickname_detection_is_case_insensitive() {
        let persona = Persona::deep_root();
        assert_eq!(persona.invoked_name("hello deeproot!"), "DeepRoot");
        assert_eq!(persona.invoked_name("yo d.r, help"), "D.R");
    }

    #[test]
    fn display_name_used_when_no_nickname_invoked() {
        let persona = Persona::deep_root();
        assert_eq!(persona.invoked_name("how do I fix my soil?"), "DeepRoot");
    }

    #[test]
    fn causal_prompt_embeds_name_and_verbatim_query() {
        let persona = Persona::deep_root();
        let prompt = persona.render_prompt(ModelFamily::Causal, "Why is my soil acidic?");
        assert!(prompt.contains("You are DeepRoot"));
        assert!(prompt.contains("Why is my soil acidic?"));
        assert!(prompt.ends_with("Answer:"));
    }

    #[test]
    fn seq2seq_prompt_uses_answer_as_framing() {
        let persona = Persona::deep_root();
        let prompt = persona.render_prompt(ModelFamily::Seq2Seq, "Deep, best mulch?");
        assert!(prompt.starts_with("Answer as Deep,"));
        assert!(prompt.contains("Deep, best mulch?"));
    }

    #[test]
    fn introduction_lists_all_nicknames() {
        let persona = Persona::deep_root();
        let intro = persona.introduction();
        assert_eq!(
            intro,
            "Hi! I'm DeepRoot. You can call me DeepRoot, Deep, D.R, DR. \
             I can help you with soil health and plant growth questions."
        );
    }
}
