//! TOML configuration file loading
//!
//! Supports `~/.config/aria/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct AriaConfigFile {
    /// Wake word, capture timing and exit phrases
    #[serde(default)]
    pub session: SessionFileConfig,

    /// Persona text
    #[serde(default)]
    pub persona: PersonaFileConfig,

    /// Completion service configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Conversation context bounds
    #[serde(default)]
    pub context: ContextFileConfig,

    /// Speech recognition and synthesis
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Web server
    #[serde(default)]
    pub server: ServerFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Session timing configuration
#[derive(Debug, Default, Deserialize)]
pub struct SessionFileConfig {
    /// Wake word (e.g. "aria")
    pub wake_word: Option<String>,

    /// Absolute capture window after the wake word
    pub capture_window_secs: Option<u64>,

    /// Silence that finalizes a command
    pub silence_gap_ms: Option<u64>,

    /// How long local mode waits per wake-listening poll
    pub listen_interval_secs: Option<u64>,

    /// Phrases that end the session
    pub exit_phrases: Option<Vec<String>>,

    /// Answer a bare wake word with a short acknowledgement
    pub acknowledge_wake: Option<bool>,

    /// Idle time after which a web session is dropped
    pub idle_timeout_secs: Option<u64>,
}

/// Persona configuration
#[derive(Debug, Default, Deserialize)]
pub struct PersonaFileConfig {
    pub name: Option<String>,
    pub preamble: Option<String>,
    pub greeting: Option<String>,
    pub farewell: Option<String>,
}

/// LLM-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Provider ("gemini" or "openai")
    pub provider: Option<String>,

    /// Model identifier (e.g. "gemini-1.5-pro-latest")
    pub model: Option<String>,

    /// Per-call timeout
    pub request_timeout_secs: Option<u64>,

    /// Base URL override (OpenAI-compatible servers, proxies)
    pub base_url: Option<String>,
}

/// Conversation context configuration
#[derive(Debug, Default, Deserialize)]
pub struct ContextFileConfig {
    /// Maximum number of turns kept per session
    pub max_turns: Option<usize>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// STT provider ("whisper" or "deepgram")
    pub stt_provider: Option<String>,

    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// TTS provider ("openai" or "elevenlabs")
    pub tts_provider: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "alloy")
    pub tts_voice: Option<String>,

    /// TTS speed multiplier
    pub tts_speed: Option<f32>,

    /// Timeout for one synthesis call
    pub synthesis_timeout_secs: Option<u64>,

    /// Consecutive recognition failures tolerated before giving up
    pub recognition_failure_limit: Option<u32>,
}

/// Server configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// API server port
    pub port: Option<u16>,

    /// Directory holding the browser UI
    pub static_dir: Option<String>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub gemini: Option<String>,
    pub openai: Option<String>,
    pub elevenlabs: Option<String>,
    pub deepgram: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `AriaConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> AriaConfigFile {
    config_file_path().map_or_else(AriaConfigFile::default, |path| load_from(&path))
}

/// Load a TOML config file from an explicit path
///
/// Missing or malformed files fall back to defaults with a warning.
pub fn load_from(path: &Path) -> AriaConfigFile {
    if !path.exists() {
        return AriaConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                AriaConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            AriaConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/aria/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("aria").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let fc = load_from(&dir.path().join("nope.toml"));
        assert!(fc.session.wake_word.is_none());
    }

    #[test]
    fn partial_file_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[session]\nwake_word = \"jarvis\"\nsilence_gap_ms = 800\n\n[llm]\nprovider = \"openai\"\n",
        )
        .unwrap();

        let fc = load_from(&path);
        assert_eq!(fc.session.wake_word.as_deref(), Some("jarvis"));
        assert_eq!(fc.session.silence_gap_ms, Some(800));
        assert_eq!(fc.llm.provider.as_deref(), Some("openai"));
        assert!(fc.voice.tts_voice.is_none());
    }

    #[test]
    fn malformed_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[session\nwake_word = ").unwrap();

        let fc = load_from(&path);
        assert!(fc.session.wake_word.is_none());
    }
}
