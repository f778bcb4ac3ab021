//! I/O adapters
//!
//! An adapter supplies the orchestrator with transcribed fragments and
//! delivers replies, hiding whether audio comes from a local microphone,
//! a terminal, or a browser relaying its own speech recognition.

mod browser;
mod console;
mod local;

use std::time::Duration;

use async_trait::async_trait;

pub use browser::BrowserRelayAdapter;
pub use console::ConsoleAdapter;
pub use local::LocalAudioAdapter;

use crate::Result;
use crate::session::{Reply, Utterance};

/// Outcome of waiting for input
#[derive(Debug, Clone, PartialEq)]
pub enum Listen {
    /// A fragment was transcribed
    Heard(Utterance),
    /// The wait elapsed, or the speaker stopped, with no new fragment
    Silence,
    /// No more input is available for now; the session should yield
    Idle,
}

/// Source of fragments and sink for replies
///
/// Errors returned from either method end the session.
#[async_trait]
pub trait IoAdapter: Send {
    /// Wait up to `wait` for the next fragment
    async fn listen(&mut self, wait: Duration) -> Result<Listen>;

    /// Deliver a reply to the user
    async fn deliver(&mut self, reply: &Reply) -> Result<()>;

    /// Whether replies should carry synthesized audio
    fn wants_audio(&self) -> bool {
        false
    }
}
