//! Text-to-speech (TTS) processing

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::config::{ApiKeys, TtsProvider, VoiceConfig};
use crate::{Error, Result};

/// Turns reply text into audio
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize text to MP3 bytes
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

/// Synthesizes speech through a hosted API
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: SecretString,
    voice: String,
    speed: f32,
    model: String,
    provider: TtsProvider,
}

impl TextToSpeech {
    /// Create a new TTS instance using `OpenAI`
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_openai(
        api_key: &str,
        voice: impl Into<String>,
        speed: f32,
        model: impl Into<String>,
    ) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key: SecretString::from(api_key.to_string()),
            voice: voice.into(),
            speed: speed.clamp(0.25, 4.0),
            model: model.into(),
            provider: TtsProvider::OpenAi,
        })
    }

    /// Create a new TTS instance using `ElevenLabs`
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_elevenlabs(
        api_key: &str,
        voice_id: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(Error::Config(
                "ElevenLabs API key required for TTS".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key: SecretString::from(api_key.to_string()),
            voice: voice_id.into(),
            speed: 1.0,
            model: model.into(),
            provider: TtsProvider::ElevenLabs,
        })
    }

    /// Create the configured TTS backend
    ///
    /// # Errors
    ///
    /// Returns error if the provider's API key is not set
    pub fn from_config(voice: &VoiceConfig, keys: &ApiKeys) -> Result<Self> {
        match voice.tts_provider {
            TtsProvider::OpenAi => Self::new_openai(
                keys.openai.as_deref().unwrap_or_default(),
                voice.tts_voice.clone(),
                voice.tts_speed,
                voice.tts_model.clone(),
            ),
            TtsProvider::ElevenLabs => {
                // OpenAI model names mean nothing to ElevenLabs
                let model = if voice.tts_model.starts_with("eleven_") {
                    voice.tts_model.clone()
                } else {
                    "eleven_monolingual_v1".to_string()
                };
                Self::new_elevenlabs(
                    keys.elevenlabs.as_deref().unwrap_or_default(),
                    voice.tts_voice.clone(),
                    model,
                )
            }
        }
    }

    /// Synthesize using OpenAI TTS
    async fn synthesize_openai(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/speech")
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }

    /// Synthesize using ElevenLabs TTS
    async fn synthesize_elevenlabs(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
        }

        let url = format!(
            "https://api.elevenlabs.io/v1/text-to-speech/{}",
            self.voice
        );

        let request = ElevenLabsRequest {
            text,
            model_id: &self.model,
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("ElevenLabs TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}

#[async_trait]
impl SpeechSynthesizer for TextToSpeech {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        tracing::debug!(provider = ?self.provider, chars = text.len(), "synthesizing speech");
        match self.provider {
            TtsProvider::OpenAi => self.synthesize_openai(text).await,
            TtsProvider::ElevenLabs => self.synthesize_elevenlabs(text).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_config_error() {
        assert!(matches!(
            TextToSpeech::new_openai("", "alloy", 1.0, "tts-1"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            TextToSpeech::new_elevenlabs("", "voice", "eleven_monolingual_v1"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn speed_is_clamped() {
        let tts = TextToSpeech::new_openai("sk-test", "alloy", 9.0, "tts-1").unwrap();
        assert!((tts.speed - 4.0).abs() < f32::EPSILON);
    }

    #[test]
    fn elevenlabs_ignores_openai_model_name() {
        let voice = VoiceConfig {
            tts_provider: TtsProvider::ElevenLabs,
            tts_voice: "21m00Tcm4TlvDq8ikWAM".to_string(),
            ..VoiceConfig::default()
        };
        let keys = ApiKeys {
            elevenlabs: Some("el-key".to_string()),
            ..ApiKeys::default()
        };

        let tts = TextToSpeech::from_config(&voice, &keys).unwrap();
        assert_eq!(tts.provider, TtsProvider::ElevenLabs);
        assert_eq!(tts.model, "eleven_monolingual_v1");
    }
}
