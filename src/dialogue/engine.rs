//! One command in, one reply out

use std::sync::Arc;
use std::time::Duration;

use super::{CompletionService, ConversationContext, Prompt};
use crate::Error;
use crate::config::SessionSettings;
use crate::session::{Command, Reply};

/// Spoken when the completion service cannot be reached or times out
pub const APOLOGY_UNREACHABLE: &str =
    "I'm sorry, I couldn't reach my language service just now. Please try again.";

/// Spoken when the completion service reports a usage limit
pub const APOLOGY_QUOTA: &str =
    "I'm sorry, I've reached my usage limit for the moment. Please try again later.";

/// Spoken when the completion service answers with something unusable
pub const APOLOGY_MALFORMED: &str =
    "I'm sorry, I received an unexpected response. Could you ask that again?";

/// Sends commands to the completion service with the persona and context
#[derive(Clone)]
pub struct DialogueEngine {
    service: Arc<dyn CompletionService>,
    preamble: String,
    timeout: Duration,
    window: usize,
}

impl std::fmt::Debug for DialogueEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogueEngine")
            .field("timeout", &self.timeout)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

impl DialogueEngine {
    /// Create an engine with an explicit preamble, call timeout and context window
    #[must_use]
    pub fn new(
        service: Arc<dyn CompletionService>,
        preamble: impl Into<String>,
        timeout: Duration,
        window: usize,
    ) -> Self {
        Self {
            service,
            preamble: preamble.into(),
            timeout,
            window,
        }
    }

    /// Create an engine from session settings
    #[must_use]
    pub fn from_settings(service: Arc<dyn CompletionService>, settings: &SessionSettings) -> Self {
        Self::new(
            service,
            settings.persona.preamble.clone(),
            settings.request_timeout,
            settings.max_context_turns,
        )
    }

    /// Produce the reply for a command
    ///
    /// Makes exactly one completion call. On success the exchange is appended
    /// to `context`; on failure an apology is returned and `context` is left
    /// as it was.
    pub async fn respond(&self, command: &Command, context: &mut ConversationContext) -> Reply {
        let prompt = Prompt {
            preamble: self.preamble.clone(),
            history: context.recent(self.window).to_vec(),
            command: command.text.clone(),
        };

        let result = match tokio::time::timeout(self.timeout, self.service.complete(&prompt)).await
        {
            Ok(result) => result,
            Err(_) => Err(Error::ServiceUnreachable(format!(
                "no reply within {}s",
                self.timeout.as_secs()
            ))),
        };

        match result {
            Ok(text) if !text.trim().is_empty() => {
                let text = text.trim();
                context.push_exchange(command.text.as_str(), text);
                tracing::debug!(
                    session_id = %command.session_id,
                    turns = context.len(),
                    "completion received"
                );
                Reply::answer(text)
            }
            Ok(_) => self.apologize(
                command,
                &Error::MalformedResponse("empty completion".to_string()),
            ),
            Err(e) => self.apologize(command, &e),
        }
    }

    #[allow(clippy::unused_self)]
    fn apologize(&self, command: &Command, error: &Error) -> Reply {
        tracing::warn!(session_id = %command.session_id, error = %error, "completion failed");
        Reply::apology(apology_for(error))
    }
}

/// The apology spoken for a failed completion
#[must_use]
pub const fn apology_for(error: &Error) -> &'static str {
    match error {
        Error::QuotaExceeded(_) => APOLOGY_QUOTA,
        Error::MalformedResponse(_) => APOLOGY_MALFORMED,
        _ => APOLOGY_UNREACHABLE,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::Result;

    struct Echo {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionService for Echo {
        async fn complete(&self, prompt: &Prompt) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("echo: {} ({} turns)", prompt.command, prompt.history.len()))
        }
    }

    struct Failing(fn() -> Error);

    #[async_trait]
    impl CompletionService for Failing {
        async fn complete(&self, _prompt: &Prompt) -> Result<String> {
            Err((self.0)())
        }
    }

    struct Hanging;

    #[async_trait]
    impl CompletionService for Hanging {
        async fn complete(&self, _prompt: &Prompt) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("too late".to_string())
        }
    }

    fn command(text: &str) -> Command {
        Command {
            text: text.to_string(),
            session_id: "test".to_string(),
        }
    }

    fn engine(service: Arc<dyn CompletionService>) -> DialogueEngine {
        DialogueEngine::new(service, "persona", Duration::from_secs(5), 20)
    }

    #[tokio::test]
    async fn success_appends_two_turns() {
        let echo = Arc::new(Echo {
            calls: AtomicUsize::new(0),
        });
        let engine = engine(echo.clone());
        let mut ctx = ConversationContext::new(20);

        let reply = engine.respond(&command("hello"), &mut ctx).await;
        assert_eq!(reply.text, "echo: hello (0 turns)");
        assert!(!reply.is_sentinel());
        assert_eq!(ctx.len(), 2);

        let reply = engine.respond(&command("again"), &mut ctx).await;
        assert_eq!(reply.text, "echo: again (2 turns)");
        assert_eq!(ctx.len(), 4);
        assert_eq!(echo.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failures_become_apologies() {
        let cases: [(fn() -> Error, &str); 3] = [
            (|| Error::ServiceUnreachable("down".into()), APOLOGY_UNREACHABLE),
            (|| Error::QuotaExceeded("429".into()), APOLOGY_QUOTA),
            (|| Error::MalformedResponse("bad".into()), APOLOGY_MALFORMED),
        ];

        for (make, expected) in cases {
            let engine = engine(Arc::new(Failing(make)));
            let mut ctx = ConversationContext::new(20);
            ctx.push_exchange("earlier", "reply");

            let reply = engine.respond(&command("hello"), &mut ctx).await;
            assert!(reply.is_sentinel());
            assert_eq!(reply.text, expected);
            assert_eq!(ctx.len(), 2);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_unreachable() {
        let engine = engine(Arc::new(Hanging));
        let mut ctx = ConversationContext::new(20);

        let reply = engine.respond(&command("hello"), &mut ctx).await;
        assert!(reply.is_sentinel());
        assert_eq!(reply.text, APOLOGY_UNREACHABLE);
        assert!(ctx.is_empty());
    }
}
