//! Voice processing module
//!
//! Handles audio capture, segmentation, wake word detection, command
//! capture, speech recognition, synthesis, and playback.

mod capture;
mod command;
mod playback;
mod segment;
mod stt;
mod synthesizer;
mod tts;
mod wake_word;

pub use capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
pub use command::{CaptureOutcome, CommandCapture};
pub use playback::{AudioPlayback, decode_mp3};
pub use segment::{SegmenterState, SpeechSegmenter, calculate_energy};
pub use stt::{SpeechRecognizer, SpeechToText};
pub use synthesizer::ResponseSynthesizer;
pub use tts::{SpeechSynthesizer, TextToSpeech};
pub use wake_word::{WakeMatch, WakeWordDetector};

pub(crate) use wake_word::normalize_token;
