//! Google Gemini `generateContent` client

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{CompletionService, Prompt, Role, status_error, transport_error};
use crate::{Error, Result};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// Client for Gemini models
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl GeminiClient {
    /// Create a client for `model`, optionally against a different endpoint
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

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

fn build_request(prompt: &Prompt) -> GenerateRequest<'_> {
    let mut contents: Vec<Content<'_>> = prompt
        .history
        .iter()
        .map(|turn| Content {
            role: Some(match turn.role {
                Role::User => "user",
                Role::Assistant => "model",
            }),
            parts: vec![Part { text: &turn.text }],
        })
        .collect();

    contents.push(Content {
        role: Some("user"),
        parts: vec![Part {
            text: &prompt.command,
        }],
    });

    GenerateRequest {
        system_instruction: Content {
            role: None,
            parts: vec![Part {
                text: &prompt.preamble,
            }],
        },
        contents,
    }
}

fn parse_response(body: &str) -> Result<String> {
    let response: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| Error::MalformedResponse(format!("gemini: {e}")))?;

    let text = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| {
            c.parts
                .into_iter()
                .map(|p| p.text)
                .collect::<String>()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(Error::MalformedResponse(
            "gemini returned no candidate text".to_string(),
        ));
    }

    Ok(text.trim().to_string())
}

#[async_trait]
impl CompletionService for GeminiClient {
    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        tracing::debug!(model = %self.model, history = prompt.history.len(), "calling gemini");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&build_request(prompt))
            .send()
            .await
            .map_err(|e| transport_error("gemini", &e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error("gemini", &e))?;

        if !status.is_success() {
            return Err(status_error("gemini", status, &body));
        }

        parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogue::ConversationContext;

    #[test]
    fn request_maps_roles_and_preamble() {
        let mut ctx = ConversationContext::new(10);
        ctx.push_exchange("hi", "hello");
        let prompt = Prompt {
            preamble: "be brief".to_string(),
            history: ctx.turns().to_vec(),
            command: "time?".to_string(),
        };

        let json = serde_json::to_value(build_request(&prompt)).unwrap();
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "be brief");
        assert!(json["systemInstruction"].get("role").is_none());
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][1]["role"], "model");
        assert_eq!(json["contents"][2]["parts"][0]["text"], "time?");
    }

    #[test]
    fn candidate_parts_are_joined() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"It is "},{"text":"noon. "}]}}]}"#;
        assert_eq!(parse_response(body).unwrap(), "It is noon.");
    }

    #[test]
    fn blocked_prompt_is_malformed() {
        let body = r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#;
        assert!(matches!(
            parse_response(body),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            parse_response("<html>"),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn endpoint_uses_model() {
        let client = GeminiClient::new("k", "gemini-1.5-pro-latest", Some("http://localhost:9/"));
        assert_eq!(
            client.endpoint(),
            "http://localhost:9/models/gemini-1.5-pro-latest:generateContent"
        );
    }
}
