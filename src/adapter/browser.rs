//! Adapter for fragments relayed from a browser's speech API
//!
//! The browser performs recognition and synthesis itself. One adapter wraps
//! the fragments of a single HTTP request: each is heard in order, then the
//! end of the browser's utterance reads as silence, then the adapter is idle
//! so the session yields until the next request.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;

use super::{IoAdapter, Listen};
use crate::Result;
use crate::session::{Reply, Utterance};

/// Per-request adapter for web sessions
#[derive(Debug, Default)]
pub struct BrowserRelayAdapter {
    pending: VecDeque<Utterance>,
    end_of_speech: bool,
    replies: Vec<Reply>,
}

impl BrowserRelayAdapter {
    /// Wrap the fragments carried by one request
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pending = fragments
            .into_iter()
            .map(Into::into)
            .filter(|s: &String| !s.trim().is_empty())
            .map(Utterance::new)
            .collect();

        Self {
            pending,
            end_of_speech: false,
            replies: Vec::new(),
        }
    }

    /// Replies delivered during this request, oldest first
    #[must_use]
    pub fn replies(&self) -> &[Reply] {
        &self.replies
    }

    /// Take the delivered replies
    pub fn take_replies(&mut self) -> Vec<Reply> {
        std::mem::take(&mut self.replies)
    }
}

#[async_trait]
impl IoAdapter for BrowserRelayAdapter {
    async fn listen(&mut self, _wait: Duration) -> Result<Listen> {
        if let Some(utterance) = self.pending.pop_front() {
            self.end_of_speech = true;
            return Ok(Listen::Heard(utterance));
        }

        if std::mem::take(&mut self.end_of_speech) {
            return Ok(Listen::Silence);
        }

        Ok(Listen::Idle)
    }

    async fn deliver(&mut self, reply: &Reply) -> Result<()> {
        tracing::debug!(kind = ?reply.kind, chars = reply.text.len(), "reply relayed to browser");
        self.replies.push(Reply::new(reply.kind, reply.text.clone()));
        Ok(())
    }
}
