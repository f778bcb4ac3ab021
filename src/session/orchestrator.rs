//! The session state machine
//!
//! One orchestrator drives one session through
//! `IDLE → WAKE_LISTENING → CAPTURING → PROCESSING → SPEAKING → WAKE_LISTENING`
//! until an exit phrase or a fatal adapter error moves it to `EXITED`.
//! The local loop ([`SessionOrchestrator::run`]) and the per-request web
//! handler ([`SessionOrchestrator::step`]) share the same transitions; they
//! only differ in the adapter they pass in.

use std::sync::Arc;

use super::{Command, Phase, Reply, ReplyKind, SessionState};
use crate::adapter::{IoAdapter, Listen};
use crate::config::SessionSettings;
use crate::dialogue::{ConversationContext, DialogueEngine};
use crate::voice::{
    CaptureOutcome, CommandCapture, ResponseSynthesizer, WakeWordDetector, normalize_token,
};
use crate::{Error, Result};

/// Reply to a bare wake word
const ACKNOWLEDGEMENT: &str = "Yes?";

/// Result of advancing a session as far as its input allows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The adapter ran out of input; the session waits for the next step
    Suspended,
    /// The session has ended
    Exited,
}

/// Result of a single transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Progress {
    Continue,
    Suspended,
    Exited,
}

/// Drives one session's state machine
pub struct SessionOrchestrator {
    session_id: String,
    settings: Arc<SessionSettings>,
    detector: WakeWordDetector,
    capture: CommandCapture,
    dialogue: DialogueEngine,
    synthesizer: ResponseSynthesizer,
    context: ConversationContext,
    state: SessionState,
    exit_phrases: Vec<String>,
}

impl std::fmt::Debug for SessionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionOrchestrator")
            .field("session_id", &self.session_id)
            .field("phase", &self.state.phase())
            .field("turns", &self.context.len())
            .finish_non_exhaustive()
    }
}

impl SessionOrchestrator {
    /// Create an orchestrator in `IDLE`
    ///
    /// # Errors
    ///
    /// Returns error if the configured wake word is unusable
    pub fn new(
        session_id: impl Into<String>,
        settings: Arc<SessionSettings>,
        dialogue: DialogueEngine,
        synthesizer: ResponseSynthesizer,
    ) -> Result<Self> {
        let detector = WakeWordDetector::new(&settings.wake_word)?;
        let exit_phrases = settings
            .exit_phrases
            .iter()
            .map(|phrase| normalize_phrase(phrase))
            .filter(|phrase| !phrase.is_empty())
            .collect();

        Ok(Self {
            session_id: session_id.into(),
            capture: CommandCapture::new(settings.capture_window, settings.silence_gap),
            context: ConversationContext::new(settings.max_context_turns),
            state: SessionState::new(),
            detector,
            dialogue,
            synthesizer,
            exit_phrases,
            settings,
        })
    }

    /// Session identifier
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Current phase
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.state.phase()
    }

    /// Phase and activity bookkeeping
    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    /// Conversation so far
    #[must_use]
    pub const fn context(&self) -> &ConversationContext {
        &self.context
    }

    /// Leave `IDLE` and start listening for the wake word
    ///
    /// Does nothing once the session has started.
    pub fn start(&mut self) {
        if self.state.phase() == Phase::Idle {
            self.context.clear();
            self.capture.reset();
            self.state.transition(Phase::WakeListening);
            tracing::info!(session_id = %self.session_id, "session started");
        }
    }

    /// Start the session and deliver the greeting
    ///
    /// # Errors
    ///
    /// Returns the adapter's error if the greeting cannot be delivered; the
    /// session is then `EXITED`
    pub async fn greet<A>(&mut self, adapter: &mut A) -> Result<()>
    where
        A: IoAdapter + ?Sized,
    {
        self.start();
        let greeting = Reply::new(ReplyKind::Greeting, self.settings.persona.greeting.clone());
        if let Err(e) = self.emit(adapter, greeting).await {
            return Err(self.fail(e));
        }
        Ok(())
    }

    /// Drive the session until it exits
    ///
    /// Used by the local and console front ends, whose adapters block for
    /// input. An adapter that reports it has no more input is treated as
    /// closed.
    ///
    /// # Errors
    ///
    /// Returns the fatal error that ended the session
    pub async fn run<A>(&mut self, adapter: &mut A) -> Result<()>
    where
        A: IoAdapter + ?Sized,
    {
        self.start();
        loop {
            match self.advance(adapter).await {
                Ok(Progress::Continue) => {}
                Ok(Progress::Exited) => return Ok(()),
                Ok(Progress::Suspended) => {
                    return Err(self.fail(Error::AdapterClosed("input exhausted".to_string())));
                }
                Err(e) => return Err(self.fail(e)),
            }
        }
    }

    /// Greet, then run until the session exits or `shutdown` resolves
    ///
    /// A shutdown at any point, the greeting included, ends the session
    /// with the interruption notice.
    ///
    /// # Errors
    ///
    /// Returns the fatal error that ended the session
    pub async fn run_until<A, F>(&mut self, adapter: &mut A, shutdown: F) -> Result<()>
    where
        A: IoAdapter + ?Sized,
        F: Future<Output = ()>,
    {
        let session = async {
            self.greet(adapter).await?;
            self.run(adapter).await
        };

        let finished = tokio::select! {
            result = session => Some(result),
            () = shutdown => None,
        };

        match finished {
            Some(result) => result,
            None => {
                self.interrupt(adapter).await;
                Ok(())
            }
        }
    }

    /// Advance the session until the adapter's input is consumed
    ///
    /// Used by the web front end: each request wraps its fragments in an
    /// adapter and steps the session once. Capture timers persist between
    /// steps.
    ///
    /// # Errors
    ///
    /// Returns the fatal error that ended the session
    pub async fn step<A>(&mut self, adapter: &mut A) -> Result<StepOutcome>
    where
        A: IoAdapter + ?Sized,
    {
        self.start();
        loop {
            match self.advance(adapter).await {
                Ok(Progress::Continue) => {}
                Ok(Progress::Suspended) => return Ok(StepOutcome::Suspended),
                Ok(Progress::Exited) => return Ok(StepOutcome::Exited),
                Err(e) => return Err(self.fail(e)),
            }
        }
    }

    /// Handle a typed or push-to-talk command without a wake word
    ///
    /// Any capture in progress is abandoned.
    ///
    /// # Errors
    ///
    /// Returns the fatal error that ended the session
    pub async fn submit<A>(&mut self, adapter: &mut A, text: &str) -> Result<StepOutcome>
    where
        A: IoAdapter + ?Sized,
    {
        self.start();
        if self.state.phase().is_terminal() {
            return Ok(StepOutcome::Exited);
        }

        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.is_empty() {
            return Ok(StepOutcome::Suspended);
        }

        self.capture.reset();
        self.state.transition(Phase::Capturing);

        match self.handle_command(adapter, text).await {
            Ok(Progress::Exited) => Ok(StepOutcome::Exited),
            Ok(_) => Ok(StepOutcome::Suspended),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// End the session after an external interruption such as Ctrl-C
    ///
    /// The interruption notice is delivered on a best-effort basis.
    pub async fn interrupt<A>(&mut self, adapter: &mut A)
    where
        A: IoAdapter + ?Sized,
    {
        if self.state.phase().is_terminal() {
            return;
        }

        tracing::info!(session_id = %self.session_id, "session interrupted");
        let notice = Reply::new(ReplyKind::Farewell, self.settings.persona.interruption.clone());
        if let Err(e) = self.emit(adapter, notice).await {
            tracing::debug!(error = %e, "interruption notice not delivered");
        }
        self.context.clear();
        self.state.transition(Phase::Exited);
    }

    /// Perform one transition from the current phase
    async fn advance<A>(&mut self, adapter: &mut A) -> Result<Progress>
    where
        A: IoAdapter + ?Sized,
    {
        match self.state.phase() {
            Phase::Idle => {
                self.start();
                Ok(Progress::Continue)
            }
            Phase::WakeListening => self.listen_for_wake(adapter).await,
            Phase::Capturing => self.capture_command(adapter).await,
            Phase::Processing | Phase::Speaking => {
                // Only reachable if a previous call was cancelled mid-reply
                tracing::debug!(phase = %self.state.phase(), "resuming after interrupted reply");
                self.state.transition(Phase::WakeListening);
                Ok(Progress::Continue)
            }
            Phase::Exited => Ok(Progress::Exited),
        }
    }

    async fn listen_for_wake<A>(&mut self, adapter: &mut A) -> Result<Progress>
    where
        A: IoAdapter + ?Sized,
    {
        let fragment = match adapter.listen(self.settings.listen_interval).await? {
            Listen::Heard(fragment) => fragment,
            Listen::Silence => return Ok(Progress::Continue),
            Listen::Idle => return Ok(Progress::Suspended),
        };
        self.state.touch();

        let Some(wake) = self.detector.find(&fragment.text) else {
            tracing::trace!(fragment = %fragment.text, "no wake word, fragment discarded");
            return Ok(Progress::Continue);
        };

        tracing::info!(session_id = %self.session_id, "wake word detected");

        if self.is_exit_phrase(&fragment.text) {
            return self.farewell(adapter).await;
        }

        self.state.transition(Phase::Capturing);

        if wake.remainder.is_empty() && self.settings.acknowledge_wake {
            let ack = Reply::new(ReplyKind::Acknowledgement, ACKNOWLEDGEMENT);
            self.emit(adapter, ack).await?;
        }

        // Timers start after the acknowledgement so playback does not eat the window
        self.capture.begin(&wake.remainder);
        Ok(Progress::Continue)
    }

    async fn capture_command<A>(&mut self, adapter: &mut A) -> Result<Progress>
    where
        A: IoAdapter + ?Sized,
    {
        match self.capture.capture(adapter).await? {
            CaptureOutcome::Command(text) => self.handle_command(adapter, text).await,
            CaptureOutcome::TimedOut => {
                tracing::debug!(
                    session_id = %self.session_id,
                    reason = %Error::CaptureTimeout,
                    "returning to wake listening"
                );
                self.state.transition(Phase::WakeListening);
                Ok(Progress::Continue)
            }
            CaptureOutcome::Suspended => Ok(Progress::Suspended),
        }
    }

    async fn handle_command<A>(&mut self, adapter: &mut A, text: String) -> Result<Progress>
    where
        A: IoAdapter + ?Sized,
    {
        self.state.touch();

        if self.is_exit_phrase(&text) {
            return self.farewell(adapter).await;
        }

        self.state.transition(Phase::Processing);
        let command = Command {
            text,
            session_id: self.session_id.clone(),
        };
        tracing::info!(session_id = %self.session_id, command = %command.text, "processing command");

        let reply = self.dialogue.respond(&command, &mut self.context).await;
        self.speak(adapter, reply).await?;

        self.state.transition(Phase::WakeListening);
        Ok(Progress::Continue)
    }

    async fn farewell<A>(&mut self, adapter: &mut A) -> Result<Progress>
    where
        A: IoAdapter + ?Sized,
    {
        tracing::info!(session_id = %self.session_id, "exit phrase received");
        let farewell = Reply::new(ReplyKind::Farewell, self.settings.persona.farewell.clone());
        self.speak(adapter, farewell).await?;
        self.context.clear();
        self.state.transition(Phase::Exited);
        Ok(Progress::Exited)
    }

    /// Deliver a reply through `SPEAKING`
    async fn speak<A>(&mut self, adapter: &mut A, reply: Reply) -> Result<()>
    where
        A: IoAdapter + ?Sized,
    {
        self.state.transition(Phase::Speaking);
        self.emit(adapter, reply).await
    }

    /// Synthesize if the adapter plays audio, then deliver
    async fn emit<A>(&mut self, adapter: &mut A, mut reply: Reply) -> Result<()>
    where
        A: IoAdapter + ?Sized,
    {
        if adapter.wants_audio() {
            self.synthesizer.speak(&mut reply).await;
        }
        adapter.deliver(&reply).await?;
        self.state.touch();
        Ok(())
    }

    /// Whether the text, minus any wake phrase, is one of the exit phrases
    fn is_exit_phrase(&self, text: &str) -> bool {
        let stripped = self.detector.strip_wake_word(text).join(" ");
        !stripped.is_empty() && self.exit_phrases.iter().any(|p| *p == stripped)
    }

    /// Move to `EXITED` after a fatal error and hand the error back
    fn fail(&mut self, error: Error) -> Error {
        tracing::error!(session_id = %self.session_id, error = %error, "session ended by fatal error");
        self.capture.reset();
        self.context.clear();
        self.state.transition(Phase::Exited);
        error
    }
}

fn normalize_phrase(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(normalize_token)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
