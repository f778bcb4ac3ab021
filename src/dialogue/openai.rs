//! OpenAI-compatible chat completions client

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{CompletionService, Prompt, status_error, transport_error};
use crate::{Error, Result};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Client for any endpoint speaking the chat completions protocol
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl OpenAiClient {
    /// Create a client for `model`, optionally against a compatible endpoint
    #[must_use]
    pub fn new(api_key: &str, model: &str, base_url: Option<&str>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: SecretString::from(api_key.to_string()),
            model: model.to_string(),
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
        }
    }
}

fn build_request<'a>(model: &'a str, prompt: &'a Prompt) -> ChatRequest<'a> {
    let mut messages = Vec::with_capacity(prompt.history.len() + 2);
    messages.push(Message {
        role: "system",
        content: &prompt.preamble,
    });
    messages.extend(prompt.history.iter().map(|turn| Message {
        role: turn.role.as_str(),
        content: &turn.text,
    }));
    messages.push(Message {
        role: "user",
        content: &prompt.command,
    });

    ChatRequest { model, messages }
}

fn parse_response(body: &str) -> Result<String> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| Error::MalformedResponse(format!("openai: {e}")))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or_else(|| Error::MalformedResponse("openai returned no message content".to_string()))
}

#[async_trait]
impl CompletionService for OpenAiClient {
    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        tracing::debug!(model = %self.model, history = prompt.history.len(), "calling chat completions");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&build_request(&self.model, prompt))
            .send()
            .await
            .map_err(|e| transport_error("openai", &e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error("openai", &e))?;

        if !status.is_success() {
            return Err(status_error("openai", status, &body));
        }

        parse_response(&body)
    }
}
