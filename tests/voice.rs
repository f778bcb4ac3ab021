//! Voice pipeline integration tests
//!
//! Tests voice components without requiring audio hardware

use std::io::Cursor;
use std::time::Duration;

use aria::adapter::BrowserRelayAdapter;
use aria::voice::{
    CaptureOutcome, CommandCapture, SAMPLE_RATE, SegmenterState, SpeechSegmenter,
    WakeWordDetector, calculate_energy, samples_to_wav,
};
use aria::Utterance;

mod common;

/// Generate sine wave audio samples
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Generate silence
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn generate_silence(duration_secs: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    vec![0.0; num_samples]
}

#[test]
fn test_wake_word_case_insensitive() {
    let detector = WakeWordDetector::new("Aria").unwrap();

    assert!(detector.detect(&Utterance::new("ARIA")));
    assert!(detector.detect(&Utterance::new("ArIa, lights on")));
    assert!(detector.detect(&Utterance::new("aria")));
    assert!(!detector.detect(&Utterance::new("hey there")));
}

#[test]
fn test_wake_word_remainder_keeps_original_text() {
    let detector = WakeWordDetector::new("hey aria").unwrap();

    let found = detector.find("Hey Aria, what's on my Calendar?").unwrap();
    assert_eq!(found.remainder, "what's on my Calendar?");
}

#[test]
fn test_speech_segment_detection() {
    let mut segmenter = SpeechSegmenter::default();

    // Silent samples - should not trigger
    assert!(segmenter.process(&generate_silence(0.1)).is_none());
    assert_eq!(segmenter.state(), SegmenterState::Idle);

    // Loud samples - should start a segment
    let speech = generate_sine_samples(440.0, 0.5, 0.3);
    assert!(segmenter.process(&speech).is_none());
    assert_eq!(segmenter.state(), SegmenterState::Speaking);

    // Silence after enough speech completes the segment
    let silence = generate_silence(0.6);
    let segment = segmenter.process(&silence).unwrap();
    assert_eq!(segment.len(), speech.len() + silence.len());
    assert_eq!(segmenter.state(), SegmenterState::Idle);
}

#[test]
fn test_short_noise_is_discarded() {
    let mut segmenter = SpeechSegmenter::default();

    segmenter.process(&generate_sine_samples(440.0, 0.1, 0.3));
    assert!(segmenter.is_speaking());

    assert!(segmenter.process(&generate_silence(0.6)).is_none());
    assert!(segmenter.process(&generate_silence(0.6)).is_none());
    assert_eq!(segmenter.state(), SegmenterState::Idle);
}

#[test]
fn test_long_speech_is_cut() {
    let mut segmenter = SpeechSegmenter::default();
    let second = generate_sine_samples(440.0, 1.0, 0.3);

    let cut = (1..=20).find_map(|i| segmenter.process(&second).map(|segment| (i, segment)));

    let (chunks, segment) = cut.unwrap();
    assert_eq!(chunks, 15);
    assert_eq!(segment.len(), SAMPLE_RATE as usize * 15);
}

#[test]
fn test_energy_of_sine() {
    let samples = generate_sine_samples(440.0, 1.0, 0.5);
    let energy = calculate_energy(&samples);

    // RMS of a sine is amplitude / sqrt(2)
    assert!((energy - 0.5 / 2.0_f32.sqrt()).abs() < 0.01);
    assert!(calculate_energy(&[]).abs() < f32::EPSILON);
}

#[test]
fn test_samples_to_wav() {
    let samples = generate_sine_samples(440.0, 0.1, 0.5);
    let wav_data = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

    // Check WAV header magic
    assert_eq!(&wav_data[0..4], b"RIFF");
    assert_eq!(&wav_data[8..12], b"WAVE");

    // WAV should have reasonable size
    assert!(wav_data.len() > 44); // WAV header is 44 bytes
}

#[test]
fn test_wav_roundtrip() {
    let original_samples: Vec<f32> = vec![0.0, 0.5, -0.5, 1.0, -1.0, 0.25];
    let wav_data = samples_to_wav(&original_samples, SAMPLE_RATE).unwrap();

    let cursor = Cursor::new(wav_data);
    let mut reader = hound::WavReader::new(cursor).unwrap();

    let spec = reader.spec();
    assert_eq!(spec.sample_rate, SAMPLE_RATE);
    assert_eq!(spec.channels, 1);

    let read_samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(read_samples.len(), original_samples.len());
    assert_eq!(read_samples[3], 32767);
}

#[test]
fn test_garbage_mp3_is_rejected_or_empty() {
    // minimp3 skips bytes it cannot sync on; either way no audio comes out
    let decoded = aria::voice::decode_mp3(b"definitely not an mp3 stream");
    assert!(decoded.map_or(true, |samples| samples.is_empty()));
}

#[tokio::test]
async fn test_capture_from_relayed_fragments() {
    let mut capture = CommandCapture::new(Duration::from_secs(10), Duration::from_millis(1500));
    let mut adapter = BrowserRelayAdapter::new(["turn on", "the   kitchen lights"]);

    capture.begin("");
    let outcome = capture.capture(&mut adapter).await.unwrap();

    assert_eq!(
        outcome,
        CaptureOutcome::Command("turn on the kitchen lights".to_string())
    );
    assert!(!capture.is_active());
}

#[tokio::test]
async fn test_capture_suspends_without_input() {
    let mut capture = CommandCapture::new(Duration::from_secs(10), Duration::from_millis(1500));
    let mut adapter = BrowserRelayAdapter::default();

    capture.begin("play some");
    let outcome = capture.capture(&mut adapter).await.unwrap();

    assert_eq!(outcome, CaptureOutcome::Suspended);
    assert!(capture.is_active());
    assert_eq!(capture.text(), "play some");
}

#[tokio::test(start_paused = true)]
async fn test_capture_times_out_with_text() {
    let mut capture = CommandCapture::new(Duration::from_secs(10), Duration::from_millis(1500));

    capture.begin("half a");
    tokio::time::advance(Duration::from_secs(11)).await;

    let mut adapter = BrowserRelayAdapter::new(["sentence"]);
    let outcome = capture.capture(&mut adapter).await.unwrap();

    assert_eq!(outcome, CaptureOutcome::TimedOut);
    assert!(!capture.has_text());
}
