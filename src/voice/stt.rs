//! Speech-to-text (STT) processing

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::config::{ApiKeys, SttProvider, VoiceConfig};
use crate::session::Utterance;
use crate::{Error, Result};

/// Turns recorded speech into text
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Transcribe one WAV-encoded segment
    ///
    /// An empty transcript means the audio held no intelligible speech.
    async fn transcribe(&self, wav: &[u8]) -> Result<Utterance>;
}

/// Response from OpenAI Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Response from Deepgram transcription API
#[derive(serde::Deserialize)]
struct DeepgramResponse {
    results: DeepgramResults,
}

#[derive(serde::Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(serde::Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(serde::Deserialize)]
struct DeepgramAlternative {
    transcript: String,
    #[serde(default)]
    confidence: Option<f32>,
}

/// Transcribes speech through a hosted API
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    provider: SttProvider,
}

impl SpeechToText {
    /// Create a new STT instance using `OpenAI` Whisper
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_whisper(api_key: &str, model: impl Into<String>) -> Result<Self> {
        Self::build(api_key, model.into(), SttProvider::Whisper)
    }

    /// Create a new STT instance using Deepgram
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_deepgram(api_key: &str, model: impl Into<String>) -> Result<Self> {
        Self::build(api_key, model.into(), SttProvider::Deepgram)
    }

    /// Create the configured STT backend
    ///
    /// # Errors
    ///
    /// Returns error if the provider's API key is not set
    pub fn from_config(voice: &VoiceConfig, keys: &ApiKeys) -> Result<Self> {
        match voice.stt_provider {
            SttProvider::Whisper => {
                let key = keys.openai.as_deref().unwrap_or_default();
                Self::new_whisper(key, voice.stt_model.clone())
            }
            SttProvider::Deepgram => {
                let key = keys.deepgram.as_deref().unwrap_or_default();
                Self::new_deepgram(key, voice.stt_model.clone())
            }
        }
    }

    fn build(api_key: &str, model: String, provider: SttProvider) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(Error::Config(match provider {
                SttProvider::Whisper => "OpenAI API key required for Whisper".to_string(),
                SttProvider::Deepgram => "Deepgram API key required".to_string(),
            }));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key: SecretString::from(api_key.to_string()),
            model,
            provider,
        })
    }

    /// Transcribe using OpenAI Whisper
    async fn transcribe_whisper(&self, audio: &[u8]) -> Result<Utterance> {
        tracing::debug!(audio_bytes = audio.len(), "starting Whisper transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio.to_vec())
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/transcriptions")
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Stt(format!("Whisper request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response
            .json()
            .await
            .map_err(|e| Error::Stt(format!("invalid Whisper response: {e}")))?;

        tracing::debug!(transcript = %result.text, "transcription complete");
        Ok(Utterance::new(result.text.trim()))
    }

    /// Transcribe using Deepgram
    async fn transcribe_deepgram(&self, audio: &[u8]) -> Result<Utterance> {
        tracing::debug!(audio_bytes = audio.len(), "starting Deepgram transcription");

        let url = format!(
            "https://api.deepgram.com/v1/listen?model={}&punctuate=true",
            self.model
        );

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Token {}", self.api_key.expose_secret()),
            )
            .header("Content-Type", "audio/wav")
            .body(audio.to_vec())
            .send()
            .await
            .map_err(|e| Error::Stt(format!("Deepgram request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Deepgram API error");
            return Err(Error::Stt(format!("Deepgram API error {status}: {body}")));
        }

        let result: DeepgramResponse = response
            .json()
            .await
            .map_err(|e| Error::Stt(format!("invalid Deepgram response: {e}")))?;

        let utterance = result
            .results
            .channels
            .first()
            .and_then(|c| c.alternatives.first())
            .map_or_else(
                || Utterance::new(""),
                |a| {
                    let utterance = Utterance::new(a.transcript.trim());
                    match a.confidence {
                        Some(c) => utterance.with_confidence(c),
                        None => utterance,
                    }
                },
            );

        tracing::debug!(transcript = %utterance.text, "transcription complete");
        Ok(utterance)
    }
}

#[async_trait]
impl SpeechRecognizer for SpeechToText {
    async fn transcribe(&self, wav: &[u8]) -> Result<Utterance> {
        match self.provider {
            SttProvider::Whisper => self.transcribe_whisper(wav).await,
            SttProvider::Deepgram => self.transcribe_deepgram(wav).await,
        }
    }
}
