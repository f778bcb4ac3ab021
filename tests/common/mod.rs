//! Shared test utilities
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use aria::adapter::{IoAdapter, Listen};
use aria::dialogue::{CompletionService, DialogueEngine, Prompt};
use aria::voice::{ResponseSynthesizer, SpeechSynthesizer};
use aria::{Error, Reply, Result, SessionOrchestrator, SessionSettings, Utterance};
use async_trait::async_trait;

/// Adapter that replays scripted input, then reports no more input
#[derive(Default)]
pub struct ScriptedAdapter {
    input: VecDeque<Listen>,
    failure: Option<fn() -> Error>,
    pub delivered: Vec<Reply>,
    pub audio: bool,
}

impl ScriptedAdapter {
    pub fn new(input: impl IntoIterator<Item = Listen>) -> Self {
        Self {
            input: input.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Fail `listen` with this error once the script runs out
    pub fn then_fail(mut self, failure: fn() -> Error) -> Self {
        self.failure = Some(failure);
        self
    }

    /// Queue more input for a later step
    pub fn push(&mut self, listen: Listen) {
        self.input.push_back(listen);
    }

    pub fn texts(&self) -> Vec<&str> {
        self.delivered.iter().map(|r| r.text.as_str()).collect()
    }
}

#[async_trait]
impl IoAdapter for ScriptedAdapter {
    async fn listen(&mut self, _wait: Duration) -> Result<Listen> {
        match (self.input.pop_front(), self.failure) {
            (Some(listen), _) => Ok(listen),
            (None, Some(failure)) => Err(failure()),
            (None, None) => Ok(Listen::Idle),
        }
    }

    async fn deliver(&mut self, reply: &Reply) -> Result<()> {
        self.delivered.push(reply.clone());
        Ok(())
    }

    fn wants_audio(&self) -> bool {
        self.audio
    }
}

/// Adapter that hears one command but whose output is gone
#[derive(Default)]
pub struct BrokenAdapter {
    heard: bool,
}

#[async_trait]
impl IoAdapter for BrokenAdapter {
    async fn listen(&mut self, _wait: Duration) -> Result<Listen> {
        if std::mem::replace(&mut self.heard, true) {
            Ok(Listen::Silence)
        } else {
            Ok(Listen::Heard(Utterance::new("aria what time is it")))
        }
    }

    async fn deliver(&mut self, _reply: &Reply) -> Result<()> {
        Err(Error::AdapterClosed("speaker unplugged".to_string()))
    }
}

pub fn heard(text: &str) -> Listen {
    Listen::Heard(Utterance::new(text))
}

/// Completion service returning a fixed answer and counting calls
#[derive(Default)]
pub struct FixedService {
    answer: String,
    pub calls: AtomicUsize,
    pub last_prompt: std::sync::Mutex<Option<Prompt>>,
}

impl FixedService {
    pub fn new(answer: &str) -> Arc<Self> {
        Arc::new(Self {
            answer: answer.to_string(),
            ..Self::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionService for FixedService {
    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = Some(prompt.clone());
        Ok(self.answer.clone())
    }
}

/// Completion service that always fails the same way
pub struct FailingService(pub fn() -> Error);

#[async_trait]
impl CompletionService for FailingService {
    async fn complete(&self, _prompt: &Prompt) -> Result<String> {
        Err((self.0)())
    }
}

/// Completion service that never answers
pub struct HangingService;

#[async_trait]
impl CompletionService for HangingService {
    async fn complete(&self, _prompt: &Prompt) -> Result<String> {
        std::future::pending().await
    }
}

/// Speech engine returning fixed bytes, or failing
pub struct StubSynthesizer {
    pub fail: bool,
}

#[async_trait]
impl SpeechSynthesizer for StubSynthesizer {
    async fn synthesize(&self, _text: &str) -> Result<Vec<u8>> {
        if self.fail {
            Err(Error::Tts("engine offline".to_string()))
        } else {
            Ok(vec![0xFF, 0xFB, 0x90, 0x00])
        }
    }
}

/// Session settings with short, test-friendly timing
pub fn settings() -> SessionSettings {
    SessionSettings {
        capture_window: Duration::from_secs(10),
        silence_gap: Duration::from_millis(1500),
        request_timeout: Duration::from_secs(5),
        ..SessionSettings::default()
    }
}

/// Orchestrator over a completion service, text only
pub fn orchestrator(service: Arc<dyn CompletionService>) -> SessionOrchestrator {
    orchestrator_with(settings(), service, ResponseSynthesizer::text_only())
}

pub fn orchestrator_with(
    settings: SessionSettings,
    service: Arc<dyn CompletionService>,
    synthesizer: ResponseSynthesizer,
) -> SessionOrchestrator {
    let settings = Arc::new(settings);
    let dialogue = DialogueEngine::from_settings(service, &settings);
    SessionOrchestrator::new("test", settings, dialogue, synthesizer)
        .expect("failed to create orchestrator")
}
