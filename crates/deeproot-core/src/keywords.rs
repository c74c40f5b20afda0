//! Keyword store and relevance gate.
//!
//! The keyword resource is a newline-delimited text file read once at
//! startup. Loading is **fail-open**: a missing or unreadable file degrades
//! to the empty set, which accepts every query, rather than refusing all
//! traffic.

use std::io;
use std::path::Path;

/// A set of lowercase topic keywords. The empty set is valid and means the
/// relevance gate always passes.
#[derive(Debug, Clone, Default)]
pub struct KeywordSet {
    keywords: Vec<String>,
}

impl KeywordSet {
    /// Read keywords from a newline-delimited file. Entries are trimmed and
    /// lowercased; blank lines are skipped.
    pub fn load(path: impl AsRef<Path>) -> io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_lines(content.lines()))
    }

    /// Load keywords, recovering every failure into the empty set.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(set) => {
                tracing::info!(
                    target: "deeproot::keywords",
                    count = set.len(),
                    path = %path.display(),
                    "Keyword set loaded"
                );
                set
            }
            Err(e) => {
                tracing::warn!(
                    target: "deeproot::keywords",
                    path = %path.display(),
                    "Keyword resource unavailable ({}). Relevance gate will accept everything.",
                    e
                );
                Self::default()
            }
        }
    }

    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = lines
            .into_iter()
            .map(|l| l.as_ref().trim().to_lowercase())
            .filter(|l| !l.is_empty())
            .collect();
        Self { keywords }
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// True when any keyword occurs as a substring of the lowercased query.
    pub fn matches(&self, query: &str) -> bool {
        let lowered = query.to_lowercase();
        self.keywords.iter().any(|k| lowered.contains(k))
    }
}

/// The accept/reject check applied before generation.
///
/// Reject only if no keyword matches AND the query has more than
/// `max_ungated_tokens` whitespace-separated tokens. Short queries always
/// pass so greetings and nickname-only messages are never refused.
#[derive(Debug, Clone)]
pub struct RelevanceGate {
    keywords: KeywordSet,
    max_ungated_tokens: usize,
}

impl RelevanceGate {
    pub fn new(keywords: KeywordSet, max_ungated_tokens: usize) -> Self {
        Self {
            keywords,
            max_ungated_tokens,
        }
    }

    pub fn is_relevant(&self, query: &str) -> bool {
        if query.split_whitespace().count() <= self.max_ungated_tokens {
            return true;
        }
        if self.keywords.is_empty() {
            return true;
        }
        self.keywords.matches(query)
    }
}
