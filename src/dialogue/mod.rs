//! Dialogue with a remote completion service
//!
//! The [`DialogueEngine`] builds a prompt from the persona preamble, the
//! session's recent context and the new command, makes exactly one call to a
//! [`CompletionService`], and turns failures into apology replies.

mod context;
mod engine;
mod gemini;
mod openai;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;

pub use context::{ConversationContext, Role, Turn};
pub use engine::{APOLOGY_MALFORMED, APOLOGY_QUOTA, APOLOGY_UNREACHABLE, DialogueEngine};
pub use gemini::GeminiClient;
pub use openai::OpenAiClient;

use crate::config::{ApiKeys, LlmConfig, LlmProvider};
use crate::{Error, Result};

/// Everything sent to the completion service for one command
#[derive(Debug, Clone)]
pub struct Prompt {
    /// Persona instructions
    pub preamble: String,
    /// Recent turns, oldest first, starting with a user turn
    pub history: Vec<Turn>,
    /// The new command
    pub command: String,
}

/// A remote language model
///
/// Implementations report failures as [`Error::ServiceUnreachable`],
/// [`Error::QuotaExceeded`] or [`Error::MalformedResponse`].
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Produce the reply text for a prompt
    async fn complete(&self, prompt: &Prompt) -> Result<String>;
}

/// Stand-in used when no API key is configured
///
/// Every call fails as unreachable, so sessions still answer with an apology.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredService;

#[async_trait]
impl CompletionService for UnconfiguredService {
    async fn complete(&self, _prompt: &Prompt) -> Result<String> {
        Err(Error::ServiceUnreachable(
            "no API key configured for the language service".to_string(),
        ))
    }
}

/// Build the completion client for the configured provider
///
/// # Errors
///
/// Returns [`Error::Config`] if the provider's API key is missing
pub fn completion_service(llm: &LlmConfig, keys: &ApiKeys) -> Result<Arc<dyn CompletionService>> {
    let key = keys
        .for_llm(llm.provider)
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| Error::Config(format!("no API key configured for {}", llm.provider)))?;

    let service: Arc<dyn CompletionService> = match llm.provider {
        LlmProvider::Gemini => Arc::new(GeminiClient::new(key, &llm.model, llm.base_url.as_deref())),
        LlmProvider::OpenAi => Arc::new(OpenAiClient::new(key, &llm.model, llm.base_url.as_deref())),
    };

    tracing::debug!(provider = %llm.provider, model = %llm.model, "completion service ready");
    Ok(service)
}

/// Map a non-success HTTP status to the failure taxonomy
pub(crate) fn status_error(service: &str, status: StatusCode, body: &str) -> Error {
    let detail = format!("{service} returned {status}: {}", truncate(body, 200));
    if status == StatusCode::TOO_MANY_REQUESTS {
        Error::QuotaExceeded(detail)
    } else {
        Error::ServiceUnreachable(detail)
    }
}

/// Map a transport error to the failure taxonomy
pub(crate) fn transport_error(service: &str, err: &reqwest::Error) -> Error {
    if err.is_decode() {
        Error::MalformedResponse(format!("{service}: {err}"))
    } else {
        Error::ServiceUnreachable(format!("{service}: {err}"))
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    text.char_indices()
        .nth(max_chars)
        .map_or(text, |(idx, _)| &text[..idx])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_is_quota() {
        let err = status_error("gemini", StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(matches!(err, Error::QuotaExceeded(_)));
    }

    #[test]
    fn other_statuses_are_unreachable() {
        for status in [StatusCode::INTERNAL_SERVER_ERROR, StatusCode::FORBIDDEN] {
            let err = status_error("openai", status, "");
            assert!(matches!(err, Error::ServiceUnreachable(_)));
        }
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(500);
        let Error::ServiceUnreachable(detail) =
            status_error("gemini", StatusCode::BAD_GATEWAY, &body)
        else {
            panic!("expected unreachable");
        };
        assert!(detail.len() < 300);
    }

    #[test]
    fn missing_key_is_config_error() {
        let llm = LlmConfig {
            provider: LlmProvider::Gemini,
            model: "gemini-1.5-pro-latest".to_string(),
            base_url: None,
        };
        assert!(matches!(
            completion_service(&llm, &ApiKeys::default()),
            Err(Error::Config(_))
        ));

        let keys = ApiKeys {
            gemini: Some("g-key".to_string()),
            ..ApiKeys::default()
        };
        assert!(completion_service(&llm, &keys).is_ok());
    }

    #[tokio::test]
    async fn unconfigured_service_is_unreachable() {
        let prompt = Prompt {
            preamble: String::new(),
            history: Vec::new(),
            command: "hi".to_string(),
        };
        let err = UnconfiguredService.complete(&prompt).await.unwrap_err();
        assert!(err.is_service_failure());
    }
}
