//! Command capture after the wake word
//!
//! Accumulates fragments until a silence gap closes the command or the
//! absolute capture window runs out.

use std::time::Duration;

use tokio::time::Instant;

use crate::Result;
use crate::adapter::{IoAdapter, Listen};

/// Result of one capture attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Silence closed the window; the accumulated text is the command
    Command(String),
    /// The capture window elapsed without a finalized command
    TimedOut,
    /// The adapter has no more input for now; timers keep running
    Suspended,
}

/// Collects a bounded window of speech into a command string
#[derive(Debug, Clone)]
pub struct CommandCapture {
    window: Duration,
    silence_gap: Duration,
    parts: Vec<String>,
    started_at: Option<Instant>,
    last_fragment_at: Option<Instant>,
}

impl CommandCapture {
    /// Create an idle capture with the given timing
    #[must_use]
    pub const fn new(window: Duration, silence_gap: Duration) -> Self {
        Self {
            window,
            silence_gap,
            parts: Vec::new(),
            started_at: None,
            last_fragment_at: None,
        }
    }

    /// Start a fresh accumulation, seeded with text that followed the wake word
    pub fn begin(&mut self, seed: &str) {
        self.reset();
        let now = Instant::now();
        self.started_at = Some(now);
        self.push_at(seed, now);
        tracing::debug!(seed, window_ms = self.window.as_millis(), "command capture started");
    }

    /// Append a fragment
    pub fn push(&mut self, fragment: &str) {
        self.push_at(fragment, Instant::now());
    }

    fn push_at(&mut self, fragment: &str, now: Instant) {
        let normalized = fragment.split_whitespace().collect::<Vec<_>>().join(" ");
        if normalized.is_empty() {
            return;
        }
        self.parts.push(normalized);
        self.last_fragment_at = Some(now);
    }

    /// Accumulated text so far
    #[must_use]
    pub fn text(&self) -> String {
        self.parts.join(" ")
    }

    /// Whether any text has been accumulated
    #[must_use]
    pub fn has_text(&self) -> bool {
        !self.parts.is_empty()
    }

    /// Whether a capture is in progress
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.started_at.is_some()
    }

    /// Whether the absolute window has elapsed at `now`
    #[must_use]
    pub fn window_elapsed(&self, now: Instant) -> bool {
        self.started_at
            .is_none_or(|started| now.saturating_duration_since(started) >= self.window)
    }

    /// How long to wait for the next fragment
    ///
    /// Before any text arrives this is the rest of the window; afterwards it
    /// is the rest of the silence gap, capped by the window.
    #[must_use]
    pub fn next_wait(&self, now: Instant) -> Duration {
        let Some(started) = self.started_at else {
            return Duration::ZERO;
        };
        let window_left = self
            .window
            .saturating_sub(now.saturating_duration_since(started));

        match self.last_fragment_at {
            Some(last) => {
                let gap_left = self
                    .silence_gap
                    .saturating_sub(now.saturating_duration_since(last));
                gap_left.min(window_left)
            }
            None => window_left,
        }
    }

    /// Take the accumulated text and return to idle
    pub fn finish(&mut self) -> String {
        let text = self.text();
        self.reset();
        text
    }

    /// Drop any accumulated text and timers
    pub fn reset(&mut self) {
        self.parts.clear();
        self.started_at = None;
        self.last_fragment_at = None;
    }

    /// Run the capture against an adapter
    ///
    /// Call [`begin`](Self::begin) first. A suspended capture can be resumed
    /// by calling this again; its timers are not restarted.
    ///
    /// # Errors
    ///
    /// Returns the adapter's error when it fails to produce input
    pub async fn capture<A>(&mut self, adapter: &mut A) -> Result<CaptureOutcome>
    where
        A: IoAdapter + ?Sized,
    {
        loop {
            let now = Instant::now();
            if self.window_elapsed(now) {
                tracing::debug!(discarded = %self.text(), "command capture timed out");
                self.reset();
                return Ok(CaptureOutcome::TimedOut);
            }

            match adapter.listen(self.next_wait(now)).await? {
                Listen::Heard(utterance) => {
                    tracing::debug!(fragment = %utterance.text, "capture fragment");
                    self.push(&utterance.text);
                }
                Listen::Silence if self.has_text() => {
                    let command = self.finish();
                    tracing::info!(command = %command, "command captured");
                    return Ok(CaptureOutcome::Command(command));
                }
                Listen::Silence => {}
                Listen::Idle => return Ok(CaptureOutcome::Suspended),
            }
        }
    }
}
