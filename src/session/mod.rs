//! Session data model and orchestration
//!
//! A session owns one [`SessionState`] and one conversation context and is
//! driven by exactly one [`SessionOrchestrator`].

mod orchestrator;
mod table;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

pub use orchestrator::{SessionOrchestrator, StepOutcome};
pub use table::{SessionFactory, SessionHandle, SessionTable};

/// A transcribed fragment of speech
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    /// Transcribed text
    pub text: String,

    /// Recognizer confidence (0–1), when the engine reports one
    pub confidence: Option<f32>,

    /// When the fragment was captured
    pub captured_at: DateTime<Utc>,
}

impl Utterance {
    /// Create an utterance captured now with no confidence score
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confidence: None,
            captured_at: Utc::now(),
        }
    }

    /// Attach a confidence score, clamped to 0–1
    #[must_use]
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence.clamp(0.0, 1.0));
        self
    }
}

/// A finalized user instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub text: String,
    pub session_id: String,
}

/// What kind of reply the assistant produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyKind {
    /// Answer from the completion service
    Answer,
    /// Stand-in for a failed completion call
    Apology,
    /// Short response to a bare wake word
    Acknowledgement,
    /// Session start announcement
    Greeting,
    /// Spoken before the session exits
    Farewell,
}

/// Text for the user, optionally with synthesized audio
#[derive(Debug, Clone)]
pub struct Reply {
    pub text: String,
    pub kind: ReplyKind,

    /// MP3 audio, present once synthesis succeeded
    pub audio: Option<Vec<u8>>,
}

impl Reply {
    /// Create a text-only reply
    #[must_use]
    pub fn new(kind: ReplyKind, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind,
            audio: None,
        }
    }

    /// Reply from a successful completion
    #[must_use]
    pub fn answer(text: impl Into<String>) -> Self {
        Self::new(ReplyKind::Answer, text)
    }

    /// Apology sentinel substituted for a failed completion
    #[must_use]
    pub fn apology(text: impl Into<String>) -> Self {
        Self::new(ReplyKind::Apology, text)
    }

    /// Whether this reply stands in for a failed completion
    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        self.kind == ReplyKind::Apology
    }
}

/// Phase of the session state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Created, not started
    #[default]
    Idle,
    /// Waiting for the wake word
    WakeListening,
    /// Collecting a command after the wake word
    Capturing,
    /// Waiting on the completion service
    Processing,
    /// Delivering a reply
    Speaking,
    /// Terminal
    Exited,
}

impl Phase {
    /// Whether the session has ended
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Exited)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "IDLE",
            Self::WakeListening => "WAKE_LISTENING",
            Self::Capturing => "CAPTURING",
            Self::Processing => "PROCESSING",
            Self::Speaking => "SPEAKING",
            Self::Exited => "EXITED",
        };
        f.write_str(name)
    }
}

/// Phases kept in [`SessionState::history`]
const PHASE_HISTORY_LIMIT: usize = 256;

/// Current phase plus last-activity time of one session
#[derive(Debug, Clone)]
pub struct SessionState {
    phase: Phase,
    last_activity: Instant,
    history: Vec<Phase>,
}

impl SessionState {
    /// Create a state in `Idle`
    #[must_use]
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            last_activity: Instant::now(),
            history: vec![Phase::Idle],
        }
    }

    /// Current phase
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Last time the session saw input or produced output
    #[must_use]
    pub const fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// Recently entered phases, oldest first
    #[must_use]
    pub fn history(&self) -> &[Phase] {
        &self.history
    }

    /// Record activity; never moves the timestamp backwards
    pub fn touch(&mut self) {
        let now = Instant::now();
        if now > self.last_activity {
            self.last_activity = now;
        }
    }

    /// Move to a new phase; `Exited` is absorbing
    pub(crate) fn transition(&mut self, to: Phase) {
        if self.phase.is_terminal() {
            return;
        }
        if self.phase != to {
            tracing::debug!(from = %self.phase, to = %to, "phase transition");
        }
        self.phase = to;
        self.history.push(to);
        if self.history.len() > PHASE_HISTORY_LIMIT {
            self.history.remove(0);
        }
        self.touch();
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exited_is_absorbing() {
        let mut state = SessionState::new();
        state.transition(Phase::WakeListening);
        state.transition(Phase::Exited);
        state.transition(Phase::WakeListening);

        assert_eq!(state.phase(), Phase::Exited);
        assert_eq!(
            state.history(),
            &[Phase::Idle, Phase::WakeListening, Phase::Exited]
        );
    }

    #[test]
    fn phase_names_match_state_table() {
        assert_eq!(Phase::WakeListening.to_string(), "WAKE_LISTENING");
        assert_eq!(
            serde_json::to_value(Phase::Capturing).unwrap(),
            serde_json::json!("CAPTURING")
        );
    }

    #[test]
    fn confidence_is_clamped() {
        let u = Utterance::new("hi").with_confidence(1.7);
        assert_eq!(u.confidence, Some(1.0));
    }
}
