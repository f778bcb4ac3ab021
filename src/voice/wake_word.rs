//! Wake word detection
//!
//! Classifies transcribed fragments for the configured wake phrase.
//! Matching is a whole-word, case-insensitive comparison over tokens, so
//! "aria" matches "Aria, what's up?" but not "Ariadne".

use crate::session::Utterance;
use crate::{Error, Result};

/// Result of locating the wake phrase in a fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakeMatch {
    /// Text after the wake phrase, whitespace-normalized; empty for a bare wake word
    pub remainder: String,
}

/// Detects the wake phrase in transcribed text
#[derive(Debug, Clone)]
pub struct WakeWordDetector {
    wake_word: String,
    wake_tokens: Vec<String>,
}

impl WakeWordDetector {
    /// Create a detector for one wake word or phrase
    ///
    /// # Errors
    ///
    /// Returns error if the wake word has no usable tokens
    pub fn new(wake_word: &str) -> Result<Self> {
        let wake_tokens: Vec<String> = wake_word
            .split_whitespace()
            .map(normalize_token)
            .filter(|t| !t.is_empty())
            .collect();

        if wake_tokens.is_empty() {
            return Err(Error::Config(format!("invalid wake word: {wake_word:?}")));
        }

        tracing::debug!(wake_word = ?wake_tokens, "wake word detector initialized");

        Ok(Self {
            wake_word: wake_tokens.join(" "),
            wake_tokens,
        })
    }

    /// Whether the fragment contains the wake phrase as whole words
    #[must_use]
    pub fn detect(&self, fragment: &Utterance) -> bool {
        self.find(&fragment.text).is_some()
    }

    /// Locate the wake phrase and return what follows it
    ///
    /// Anything before the wake phrase is discarded.
    #[must_use]
    pub fn find(&self, text: &str) -> Option<WakeMatch> {
        let tokens = tokenize(text);
        let n = self.wake_tokens.len();
        if tokens.len() < n {
            return None;
        }

        let start = (0..=tokens.len() - n).find(|&i| {
            tokens[i..i + n]
                .iter()
                .zip(&self.wake_tokens)
                .all(|((_, norm), wake)| norm == wake)
        })?;

        let remainder = tokens[start + n..]
            .iter()
            .map(|(orig, _)| *orig)
            .collect::<Vec<_>>()
            .join(" ");

        tracing::debug!(wake_word = %self.wake_word, transcript = text, "wake word detected");
        Some(WakeMatch { remainder })
    }

    /// Normalized tokens of `text` with every wake phrase occurrence removed
    #[must_use]
    pub fn strip_wake_word(&self, text: &str) -> Vec<String> {
        let tokens: Vec<String> = tokenize(text).into_iter().map(|(_, norm)| norm).collect();
        let n = self.wake_tokens.len();
        let mut out = Vec::with_capacity(tokens.len());
        let mut i = 0;

        while i < tokens.len() {
            if tokens.len() - i >= n && tokens[i..i + n] == self.wake_tokens[..] {
                i += n;
            } else {
                out.push(tokens[i].clone());
                i += 1;
            }
        }

        out
    }

    /// The configured wake phrase, normalized
    #[must_use]
    pub fn wake_word(&self) -> &str {
        &self.wake_word
    }
}

/// Split into (original, normalized) tokens, dropping tokens that are only punctuation
fn tokenize(text: &str) -> Vec<(&str, String)> {
    text.split_whitespace()
        .map(|raw| (raw, normalize_token(raw)))
        .filter(|(_, norm)| !norm.is_empty())
        .collect()
}

/// Lowercase and strip surrounding punctuation
pub(crate) fn normalize_token(raw: &str) -> String {
    raw.trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}
