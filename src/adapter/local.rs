//! Local microphone and speaker adapter
//!
//! Captured audio is segmented by energy, each segment is transcribed, and
//! replies are printed and played through the default output device.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::{IoAdapter, Listen};
use crate::session::Reply;
use crate::voice::{AudioCapture, AudioPlayback, SpeechRecognizer, SpeechSegmenter, samples_to_wav};
use crate::{Error, Result};

/// How often the capture buffer is drained
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Adapter for a locally attached microphone and speaker
pub struct LocalAudioAdapter {
    capture: AudioCapture,
    segmenter: SpeechSegmenter,
    recognizer: Arc<dyn SpeechRecognizer>,
    playback: Option<AudioPlayback>,
    speaker: String,
    failures: FailureBudget,
}

/// Counts consecutive recognition failures against a limit
#[derive(Debug, Clone, Copy)]
pub(crate) struct FailureBudget {
    limit: u32,
    consecutive: u32,
}

impl FailureBudget {
    pub(crate) fn new(limit: u32) -> Self {
        Self {
            limit: limit.max(1),
            consecutive: 0,
        }
    }

    pub(crate) fn succeeded(&mut self) {
        self.consecutive = 0;
    }

    /// Record a failure; once the limit is reached it becomes fatal
    pub(crate) fn failed(&mut self, error: &Error) -> Result<()> {
        self.consecutive += 1;
        tracing::warn!(
            error = %error,
            failures = self.consecutive,
            limit = self.limit,
            "speech recognition failed"
        );
        if self.consecutive >= self.limit {
            return Err(Error::RecognitionUnavailable(error.to_string()));
        }
        Ok(())
    }
}

impl LocalAudioAdapter {
    /// Open the default input device and start capturing
    ///
    /// Playback is optional: without an output device replies are printed only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecognitionUnavailable`] if the microphone cannot be opened
    pub fn open(
        recognizer: Arc<dyn SpeechRecognizer>,
        speaker: impl Into<String>,
        failure_limit: u32,
    ) -> Result<Self> {
        let mut capture = AudioCapture::new()
            .map_err(|e| Error::RecognitionUnavailable(format!("microphone unavailable: {e}")))?;
        capture
            .start()
            .map_err(|e| Error::RecognitionUnavailable(format!("microphone unavailable: {e}")))?;

        let playback = match AudioPlayback::new() {
            Ok(playback) => Some(playback),
            Err(e) => {
                tracing::warn!(error = %e, "no audio output, replies will be printed only");
                None
            }
        };

        Ok(Self {
            capture,
            segmenter: SpeechSegmenter::default(),
            recognizer,
            playback,
            speaker: speaker.into(),
            failures: FailureBudget::new(failure_limit),
        })
    }

    /// Transcribe one segment, counting failures toward the limit
    async fn recognize(&mut self, segment: &[f32]) -> Result<Option<Listen>> {
        let wav = samples_to_wav(segment, self.capture.sample_rate())?;

        match self.recognizer.transcribe(&wav).await {
            Ok(utterance) => {
                self.failures.succeeded();
                if utterance.text.trim().is_empty() {
                    tracing::debug!("segment held no intelligible speech");
                    return Ok(None);
                }
                println!("You: {}", utterance.text);
                Ok(Some(Listen::Heard(utterance)))
            }
            Err(e) => {
                self.failures.failed(&e)?;
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl IoAdapter for LocalAudioAdapter {
    async fn listen(&mut self, wait: Duration) -> Result<Listen> {
        let deadline = Instant::now() + wait;

        loop {
            if !self.capture.is_capturing() {
                return Err(Error::RecognitionUnavailable(
                    "microphone stream stopped".to_string(),
                ));
            }

            let samples = self.capture.take_buffer();
            if let Some(segment) = self.segmenter.process(&samples)
                && let Some(heard) = self.recognize(&segment).await?
            {
                return Ok(heard);
            }

            // Never cut a speaker off mid-sentence; the segmenter bounds this
            if Instant::now() >= deadline && !self.segmenter.is_speaking() {
                return Ok(Listen::Silence);
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn deliver(&mut self, reply: &Reply) -> Result<()> {
        println!("{}: {}", self.speaker, reply.text);

        if let (Some(playback), Some(audio)) = (&self.playback, &reply.audio) {
            if let Err(e) = playback.play_mp3(audio.clone()).await {
                tracing::warn!(error = %e, "audio playback failed");
            }
            // Drop what the microphone picked up from our own voice
            self.capture.clear_buffer();
            self.segmenter.reset();
        }

        Ok(())
    }

    fn wants_audio(&self) -> bool {
        self.playback.is_some()
    }
}
