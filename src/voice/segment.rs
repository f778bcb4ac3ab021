//! Energy-based speech segmentation
//!
//! Splits a stream of microphone samples into utterance-sized segments that
//! can be sent to a recognizer one at a time.

use super::capture::SAMPLE_RATE;

/// Minimum audio energy threshold to consider speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum duration of speech to keep a segment (0.3 seconds)
const MIN_SPEECH_SAMPLES: usize = 4800;

/// Silence duration that ends a segment (0.5 seconds)
const SILENCE_SAMPLES: usize = 8000;

/// Longest segment before it is cut regardless of silence (15 seconds)
const MAX_SEGMENT_SAMPLES: usize = SAMPLE_RATE as usize * 15;

/// State of the segmenter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmenterState {
    /// Waiting for speech
    Idle,
    /// Speech detected, accumulating
    Speaking,
}

/// Groups samples into speech segments by RMS energy
#[derive(Debug)]
pub struct SpeechSegmenter {
    state: SegmenterState,
    threshold: f32,
    speech_buffer: Vec<f32>,
    voiced_samples: usize,
    silence_counter: usize,
}

impl Default for SpeechSegmenter {
    fn default() -> Self {
        Self::new(ENERGY_THRESHOLD)
    }
}

impl SpeechSegmenter {
    /// Create a segmenter with the given energy threshold
    #[must_use]
    pub const fn new(threshold: f32) -> Self {
        Self {
            state: SegmenterState::Idle,
            threshold,
            speech_buffer: Vec::new(),
            voiced_samples: 0,
            silence_counter: 0,
        }
    }

    /// Feed samples; returns a completed segment once speech is followed by silence
    pub fn process(&mut self, samples: &[f32]) -> Option<Vec<f32>> {
        if samples.is_empty() {
            return None;
        }

        let energy = calculate_energy(samples);
        let is_speech = energy > self.threshold;

        match self.state {
            SegmenterState::Idle => {
                if is_speech {
                    self.state = SegmenterState::Speaking;
                    self.speech_buffer.clear();
                    self.speech_buffer.extend_from_slice(samples);
                    self.voiced_samples = samples.len();
                    self.silence_counter = 0;
                    tracing::trace!(energy, "speech detected");
                }
                None
            }
            SegmenterState::Speaking => {
                self.speech_buffer.extend_from_slice(samples);

                if is_speech {
                    self.voiced_samples += samples.len();
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                }

                let ended = self.silence_counter > SILENCE_SAMPLES
                    && self.voiced_samples > MIN_SPEECH_SAMPLES;

                if ended || self.speech_buffer.len() >= MAX_SEGMENT_SAMPLES {
                    tracing::debug!(samples = self.speech_buffer.len(), "speech segment complete");
                    let segment = std::mem::take(&mut self.speech_buffer);
                    self.reset();
                    return Some(segment);
                }

                // Too much silence without enough speech: a click or a cough
                if self.silence_counter > SILENCE_SAMPLES * 2 {
                    tracing::trace!("segment discarded");
                    self.reset();
                }

                None
            }
        }
    }

    /// Whether speech is in progress
    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.state == SegmenterState::Speaking
    }

    /// Get current state
    #[must_use]
    pub const fn state(&self) -> SegmenterState {
        self.state
    }

    /// Drop any partial segment
    pub fn reset(&mut self) {
        self.state = SegmenterState::Idle;
        self.speech_buffer.clear();
        self.voiced_samples = 0;
        self.silence_counter = 0;
    }
}

/// Calculate RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
pub fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(len: usize) -> Vec<f32> {
        vec![0.5; len]
    }

    fn quiet(len: usize) -> Vec<f32> {
        vec![0.0; len]
    }

    #[test]
    fn test_energy_calculation() {
        assert!(calculate_energy(&quiet(100)) < 0.001);
        assert!(calculate_energy(&tone(100)) > 0.4);
        assert!(calculate_energy(&[]).abs() < f32::EPSILON);
    }

    #[test]
    fn speech_then_silence_yields_segment() {
        let mut seg = SpeechSegmenter::default();

        assert!(seg.process(&quiet(1600)).is_none());
        assert_eq!(seg.state(), SegmenterState::Idle);

        assert!(seg.process(&tone(8000)).is_none());
        assert!(seg.is_speaking());

        let segment = seg.process(&quiet(9000)).expect("segment");
        assert_eq!(segment.len(), 17000);
        assert_eq!(seg.state(), SegmenterState::Idle);
    }

    #[test]
    fn short_blip_is_discarded() {
        let mut seg = SpeechSegmenter::default();

        assert!(seg.process(&tone(100)).is_none());
        assert!(seg.process(&quiet(4000)).is_none());
        assert!(seg.process(&quiet(4000)).is_none());
        assert!(seg.process(&quiet(9000)).is_none());
        assert_eq!(seg.state(), SegmenterState::Idle);
    }

    #[test]
    fn long_speech_is_cut() {
        let mut seg = SpeechSegmenter::default();
        assert!(seg.process(&tone(SAMPLE_RATE as usize)).is_none());

        let mut cut = None;
        for _ in 0..20 {
            if let Some(segment) = seg.process(&tone(SAMPLE_RATE as usize)) {
                cut = Some(segment);
                break;
            }
        }

        assert_eq!(cut.map(|s| s.len()), Some(MAX_SEGMENT_SAMPLES));
    }
}
