//! Configuration management for the assistant
//!
//! Values resolve as env > toml > default. Everything a session needs is
//! collected into [`SessionSettings`], which is immutable once a session starts.

pub mod file;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::{Error, Result};

use file::AriaConfigFile;

/// Default persona preamble sent ahead of every conversation
pub const DEFAULT_PREAMBLE: &str = "You are A.R.I.A. (Advanced Responsive Intelligent Assistant), a sophisticated AI assistant.
Your personality traits:
- Helpful, polite, and highly intelligent
- Professional yet friendly
- Concise yet informative responses
- Proactive in offering assistance
Your replies are spoken aloud, so keep them short and avoid markup.
Always respond as A.R.I.A. and maintain your helpful, professional demeanor.";

/// Assistant configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Per-session behavior shared by every orchestrator
    pub session: SessionSettings,

    /// Completion service
    pub llm: LlmConfig,

    /// Speech recognition and synthesis
    pub voice: VoiceConfig,

    /// Web server
    pub server: ServerConfig,

    /// API keys
    pub api_keys: ApiKeys,
}

/// Immutable options for one session's lifetime
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Wake word or phrase (e.g. "aria")
    pub wake_word: String,

    /// Absolute window for capturing a command after the wake word
    pub capture_window: Duration,

    /// Silence after the last fragment that finalizes a command
    pub silence_gap: Duration,

    /// How long one wake-listening wait lasts before re-polling
    pub listen_interval: Duration,

    /// Phrases that end the session (matched with or without the wake word)
    pub exit_phrases: Vec<String>,

    /// Answer a bare wake word with an acknowledgement
    pub acknowledge_wake: bool,

    /// Persona text
    pub persona: PersonaConfig,

    /// Maximum turns kept in a conversation context
    pub max_context_turns: usize,

    /// Timeout for one completion call
    pub request_timeout: Duration,

    /// Timeout for one synthesis call
    pub synthesis_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            wake_word: "aria".to_string(),
            capture_window: Duration::from_secs(10),
            silence_gap: Duration::from_millis(1500),
            listen_interval: Duration::from_secs(5),
            exit_phrases: ["goodbye", "exit", "shutdown", "power down"]
                .into_iter()
                .map(String::from)
                .collect(),
            acknowledge_wake: true,
            persona: PersonaConfig::default(),
            max_context_turns: 20,
            request_timeout: Duration::from_secs(30),
            synthesis_timeout: Duration::from_secs(15),
        }
    }
}

/// Persona text spoken or sent by the assistant
#[derive(Debug, Clone)]
pub struct PersonaConfig {
    /// Display name used in transcripts
    pub name: String,

    /// System preamble for the completion service
    pub preamble: String,

    /// Spoken when a local session starts
    pub greeting: String,

    /// Spoken when the user says an exit phrase
    pub farewell: String,

    /// Spoken when the process is interrupted
    pub interruption: String,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            name: "A.R.I.A.".to_string(),
            preamble: DEFAULT_PREAMBLE.to_string(),
            greeting: "A.R.I.A. systems online. Advanced Responsive Intelligent Assistant at your service.".to_string(),
            farewell: "Understood. Shutting down A.R.I.A. systems. Goodbye.".to_string(),
            interruption: "System interruption detected. Shutting down A.R.I.A.".to_string(),
        }
    }
}

/// Completion service backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmProvider {
    /// Google Gemini `generateContent`
    #[default]
    Gemini,
    /// `OpenAI`-compatible chat completions
    OpenAi,
}

impl FromStr for LlmProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "openai" | "openai-compatible" => Ok(Self::OpenAi),
            other => Err(Error::Config(format!("unknown llm provider: {other}"))),
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gemini => write!(f, "gemini"),
            Self::OpenAi => write!(f, "openai"),
        }
    }
}

impl LlmProvider {
    /// Model used when none is configured
    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::Gemini => "gemini-1.5-pro-latest",
            Self::OpenAi => "gpt-4o-mini",
        }
    }
}

/// Completion service configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub base_url: Option<String>,
}

/// STT provider backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SttProvider {
    #[default]
    Whisper,
    Deepgram,
}

/// TTS provider backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TtsProvider {
    #[default]
    OpenAi,
    ElevenLabs,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    pub stt_provider: SttProvider,

    /// STT model (e.g. "whisper-1", "nova-2")
    pub stt_model: String,

    pub tts_provider: TtsProvider,

    /// TTS model (e.g. "tts-1", "`eleven_monolingual_v1`")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f32,

    /// Consecutive recognition failures tolerated before giving up
    pub recognition_failure_limit: u32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            stt_provider: SttProvider::default(),
            stt_model: "whisper-1".to_string(),
            tts_provider: TtsProvider::default(),
            tts_model: "tts-1".to_string(),
            tts_voice: "alloy".to_string(),
            tts_speed: 1.0,
            recognition_failure_limit: 3,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Directory holding the browser UI
    pub static_dir: Option<PathBuf>,

    /// Idle time after which a web session is dropped
    pub session_idle_timeout: Duration,
}

/// API keys for external services
#[derive(Clone, Default)]
pub struct ApiKeys {
    /// Google AI Studio key
    pub gemini: Option<String>,

    /// `OpenAI` key (chat, Whisper and TTS)
    pub openai: Option<String>,

    /// `ElevenLabs` key (optional TTS)
    pub elevenlabs: Option<String>,

    /// `Deepgram` key (optional STT)
    pub deepgram: Option<String>,
}

impl fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeys")
            .field("gemini", &self.gemini.is_some())
            .field("openai", &self.openai.is_some())
            .field("elevenlabs", &self.elevenlabs.is_some())
            .field("deepgram", &self.deepgram.is_some())
            .finish()
    }
}

impl ApiKeys {
    /// Key for the configured completion provider
    #[must_use]
    pub fn for_llm(&self, provider: LlmProvider) -> Option<&str> {
        match provider {
            LlmProvider::Gemini => self.gemini.as_deref(),
            LlmProvider::OpenAi => self.openai.as_deref(),
        }
    }
}

impl Config {
    /// Load configuration from the environment and the config file
    ///
    /// # Errors
    ///
    /// Returns error if a configured value is invalid
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::resolve(fc, |key| std::env::var(key).ok())
    }

    /// Resolve configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a provider name or wake word is invalid
    #[allow(clippy::too_many_lines)]
    pub fn resolve<F>(fc: AriaConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parse_env = |key: &str| -> Option<u64> { env(key).and_then(|v| v.trim().parse().ok()) };
        let defaults = SessionSettings::default();
        let persona_defaults = PersonaConfig::default();

        let wake_word = env("ARIA_WAKE_WORD")
            .or(fc.session.wake_word)
            .unwrap_or(defaults.wake_word);
        if wake_word.split_whitespace().next().is_none() {
            return Err(Error::Config("wake word must not be empty".to_string()));
        }

        let persona = PersonaConfig {
            name: fc.persona.name.unwrap_or(persona_defaults.name),
            preamble: fc.persona.preamble.unwrap_or(persona_defaults.preamble),
            greeting: fc.persona.greeting.unwrap_or(persona_defaults.greeting),
            farewell: fc.persona.farewell.unwrap_or(persona_defaults.farewell),
            interruption: persona_defaults.interruption,
        };

        let session = SessionSettings {
            wake_word: wake_word.trim().to_string(),
            capture_window: parse_env("ARIA_CAPTURE_WINDOW_SECS")
                .or(fc.session.capture_window_secs)
                .map_or(defaults.capture_window, Duration::from_secs),
            silence_gap: parse_env("ARIA_SILENCE_GAP_MS")
                .or(fc.session.silence_gap_ms)
                .map_or(defaults.silence_gap, Duration::from_millis),
            listen_interval: fc
                .session
                .listen_interval_secs
                .map_or(defaults.listen_interval, Duration::from_secs),
            exit_phrases: fc.session.exit_phrases.unwrap_or(defaults.exit_phrases),
            acknowledge_wake: fc
                .session
                .acknowledge_wake
                .unwrap_or(defaults.acknowledge_wake),
            persona,
            max_context_turns: env("ARIA_CONTEXT_MAX_TURNS")
                .and_then(|v| v.trim().parse().ok())
                .or(fc.context.max_turns)
                .unwrap_or(defaults.max_context_turns),
            request_timeout: parse_env("ARIA_LLM_TIMEOUT_SECS")
                .or(fc.llm.request_timeout_secs)
                .map_or(defaults.request_timeout, Duration::from_secs),
            synthesis_timeout: fc
                .voice
                .synthesis_timeout_secs
                .map_or(defaults.synthesis_timeout, Duration::from_secs),
        };

        if session.capture_window.is_zero() {
            return Err(Error::Config("capture window must be positive".to_string()));
        }

        // LLM config (env > toml > default)
        let provider = env("ARIA_LLM_PROVIDER")
            .or(fc.llm.provider)
            .map(|p| p.parse::<LlmProvider>())
            .transpose()?
            .unwrap_or_default();
        let llm = LlmConfig {
            provider,
            model: env("ARIA_LLM_MODEL")
                .or(fc.llm.model)
                .unwrap_or_else(|| provider.default_model().to_string()),
            base_url: env("ARIA_LLM_BASE_URL").or(fc.llm.base_url),
        };

        let voice_defaults = VoiceConfig::default();
        let voice = VoiceConfig {
            stt_provider: match fc.voice.stt_provider.as_deref() {
                Some("deepgram") => SttProvider::Deepgram,
                _ => SttProvider::Whisper,
            },
            stt_model: env("ARIA_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or(voice_defaults.stt_model),
            tts_provider: match fc.voice.tts_provider.as_deref() {
                Some("elevenlabs") => TtsProvider::ElevenLabs,
                _ => TtsProvider::OpenAi,
            },
            tts_model: env("ARIA_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or(voice_defaults.tts_model),
            tts_voice: fc.voice.tts_voice.unwrap_or(voice_defaults.tts_voice),
            tts_speed: fc.voice.tts_speed.unwrap_or(voice_defaults.tts_speed),
            recognition_failure_limit: fc
                .voice
                .recognition_failure_limit
                .unwrap_or(voice_defaults.recognition_failure_limit),
        };

        let server = ServerConfig {
            port: env("ARIA_PORT")
                .or_else(|| env("PORT"))
                .and_then(|s| s.trim().parse().ok())
                .or(fc.server.port)
                .unwrap_or(5001),
            static_dir: env("ARIA_STATIC_DIR")
                .or(fc.server.static_dir)
                .map(PathBuf::from),
            session_idle_timeout: fc
                .session
                .idle_timeout_secs
                .map_or(Duration::from_secs(30 * 60), Duration::from_secs),
        };

        // API keys (env > toml > None)
        let api_keys = ApiKeys {
            gemini: env("GEMINI_API_KEY").or(fc.api_keys.gemini),
            openai: env("OPENAI_API_KEY").or(fc.api_keys.openai),
            elevenlabs: env("ELEVENLABS_API_KEY").or(fc.api_keys.elevenlabs),
            deepgram: env("DEEPGRAM_API_KEY").or(fc.api_keys.deepgram),
        };

        Ok(Self {
            session,
            llm,
            voice,
            server,
            api_keys,
        })
    }

    /// The immutable settings handed to every session
    #[must_use]
    pub fn session_settings(&self) -> SessionSettings {
        self.session.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_sources() {
        let config = Config::resolve(AriaConfigFile::default(), |_| None).unwrap();

        assert_eq!(config.session.wake_word, "aria");
        assert_eq!(config.session.capture_window, Duration::from_secs(10));
        assert_eq!(config.session.silence_gap, Duration::from_millis(1500));
        assert_eq!(config.llm.provider, LlmProvider::Gemini);
        assert_eq!(config.llm.model, "gemini-1.5-pro-latest");
        assert_eq!(config.server.port, 5001);
        assert!(config.api_keys.gemini.is_none());
    }

    #[test]
    fn env_overrides_file() {
        let mut fc = AriaConfigFile::default();
        fc.session.wake_word = Some("jarvis".to_string());
        fc.session.silence_gap_ms = Some(900);
        fc.llm.provider = Some("gemini".to_string());

        let env = env_from(&[
            ("ARIA_WAKE_WORD", "computer"),
            ("ARIA_LLM_PROVIDER", "openai"),
            ("OPENAI_API_KEY", "sk-test"),
        ]);
        let config = Config::resolve(fc, env).unwrap();

        assert_eq!(config.session.wake_word, "computer");
        assert_eq!(config.session.silence_gap, Duration::from_millis(900));
        assert_eq!(config.llm.provider, LlmProvider::OpenAi);
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.api_keys.for_llm(LlmProvider::OpenAi), Some("sk-test"));
    }

    #[test]
    fn rejects_unknown_provider() {
        let env = env_from(&[("ARIA_LLM_PROVIDER", "carrier-pigeon")]);
        assert!(Config::resolve(AriaConfigFile::default(), env).is_err());
    }

    #[test]
    fn rejects_blank_wake_word() {
        let env = env_from(&[("ARIA_WAKE_WORD", "   ")]);
        assert!(Config::resolve(AriaConfigFile::default(), env).is_err());
    }

    #[test]
    fn api_keys_debug_is_redacted() {
        let keys = ApiKeys {
            gemini: Some("super-secret".to_string()),
            ..ApiKeys::default()
        };
        let printed = format!("{keys:?}");
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("gemini: true"));
    }
}
