//! Reply rendering and speech synthesis

use std::sync::Arc;
use std::time::Duration;

use super::tts::SpeechSynthesizer;
use crate::Error;
use crate::session::Reply;

/// Turns replies into something the user can hear or read
///
/// Synthesis failures never stop a session: the reply is delivered as text.
#[derive(Clone)]
pub struct ResponseSynthesizer {
    engine: Option<Arc<dyn SpeechSynthesizer>>,
    timeout: Duration,
}

impl std::fmt::Debug for ResponseSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseSynthesizer")
            .field("engine", &self.engine.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ResponseSynthesizer {
    /// Synthesizer backed by a speech engine
    #[must_use]
    pub fn new(engine: Arc<dyn SpeechSynthesizer>, timeout: Duration) -> Self {
        Self {
            engine: Some(engine),
            timeout,
        }
    }

    /// Synthesizer that only renders text
    #[must_use]
    pub const fn text_only() -> Self {
        Self {
            engine: None,
            timeout: Duration::ZERO,
        }
    }

    /// Whether a speech engine is configured
    #[must_use]
    pub const fn has_engine(&self) -> bool {
        self.engine.is_some()
    }

    /// Attach synthesized audio to a reply
    ///
    /// Leaves the reply text-only if no engine is configured or synthesis
    /// fails or times out.
    pub async fn speak(&self, reply: &mut Reply) {
        let Some(engine) = &self.engine else {
            return;
        };

        let text = self.render(reply);
        if text.is_empty() {
            return;
        }

        let result = match tokio::time::timeout(self.timeout, engine.synthesize(&text)).await {
            Ok(Ok(audio)) if audio.is_empty() => {
                Err(Error::SynthesisUnavailable("engine returned no audio".to_string()))
            }
            Ok(Ok(audio)) => Ok(audio),
            Ok(Err(e)) => Err(Error::SynthesisUnavailable(e.to_string())),
            Err(_) => Err(Error::SynthesisUnavailable(format!(
                "no audio within {}s",
                self.timeout.as_secs()
            ))),
        };

        match result {
            Ok(audio) => {
                tracing::debug!(bytes = audio.len(), "reply synthesized");
                reply.audio = Some(audio);
            }
            Err(e) => tracing::warn!(error = %e, "delivering reply as text only"),
        }
    }

    /// Text to hand to the speech engine
    ///
    /// Strips markdown emphasis, headings and bullets that completion
    /// services tend to emit. The reply itself is delivered unchanged.
    #[must_use]
    #[allow(clippy::unused_self)]
    pub fn render(&self, reply: &Reply) -> String {
        speakable_text(&reply.text)
    }
}

impl Default for ResponseSynthesizer {
    fn default() -> Self {
        Self::text_only()
    }
}

/// Remove markup that reads badly when spoken
fn speakable_text(text: &str) -> String {
    let spoken = text
        .lines()
        .map(|line| {
            let line = line.trim_start();
            let line = line.trim_start_matches('#').trim_start();
            let line = line
                .strip_prefix("- ")
                .or_else(|| line.strip_prefix("* "))
                .unwrap_or(line);
            let line = strip_paired(line, "**");
            let line = strip_paired(&line, "__");
            strip_paired(&line, "`")
        })
        .collect::<Vec<_>>()
        .join(" ");

    spoken.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop `marker` around spans like `**x**`; unmatched markers are kept
fn strip_paired(line: &str, marker: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;

    while let Some(open) = rest.find(marker) {
        let after = &rest[open + marker.len()..];
        let Some(close) = after.find(marker) else {
            break;
        };
        let inner = &after[..close];
        if inner.is_empty() || inner.starts_with(' ') || inner.ends_with(' ') {
            out.push_str(&rest[..open + marker.len()]);
            rest = after;
            continue;
        }
        out.push_str(&rest[..open]);
        out.push_str(inner);
        rest = &after[close + marker.len()..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::Result;

    struct FixedAudio(Vec<u8>);

    #[async_trait]
    impl SpeechSynthesizer for FixedAudio {
        async fn synthesize(&self, _text: &str) -> Result<Vec<u8>> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct Recording {
        spoken: std::sync::Mutex<Option<String>>,
    }

    #[async_trait]
    impl SpeechSynthesizer for Recording {
        async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
            *self.spoken.lock().unwrap() = Some(text.to_string());
            Ok(vec![1])
        }
    }

    struct Broken;

    #[async_trait]
    impl SpeechSynthesizer for Broken {
        async fn synthesize(&self, _text: &str) -> Result<Vec<u8>> {
            Err(Error::Tts("quota".to_string()))
        }
    }

    struct Slow;

    #[async_trait]
    impl SpeechSynthesizer for Slow {
        async fn synthesize(&self, _text: &str) -> Result<Vec<u8>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec![1])
        }
    }

    #[test]
    fn render_strips_markdown() {
        let synth = ResponseSynthesizer::text_only();
        let reply = Reply::answer("## Weather\n\n- **Sunny** today\n* `72F` high");
        assert_eq!(synth.render(&reply), "Weather Sunny today 72F high");
    }

    #[test]
    fn render_keeps_plain_text() {
        let synth = ResponseSynthesizer::text_only();
        let reply = Reply::answer("It's 3 o'clock.");
        assert_eq!(synth.render(&reply), "It's 3 o'clock.");
    }

    #[test]
    fn render_keeps_lone_markers() {
        let synth = ResponseSynthesizer::text_only();
        assert_eq!(synth.render(&Reply::answer("5 * 3 = 15")), "5 * 3 = 15");
        assert_eq!(synth.render(&Reply::answer("2 ** 8 is 256")), "2 ** 8 is 256");
        assert_eq!(
            synth.render(&Reply::answer("1. first\n2. second")),
            "1. first 2. second"
        );
    }

    #[test]
    fn strip_paired_only_touches_spans() {
        assert_eq!(strip_paired("a **b** c", "**"), "a b c");
        assert_eq!(strip_paired("a ** b ** c", "**"), "a ** b ** c");
        assert_eq!(strip_paired("x * y", "*"), "x * y");
        assert_eq!(strip_paired("**open only", "**"), "**open only");
    }

    #[tokio::test]
    async fn speak_attaches_audio() {
        let synth = ResponseSynthesizer::new(Arc::new(FixedAudio(vec![7, 7])), Duration::from_secs(5));
        let mut reply = Reply::answer("hello");
        synth.speak(&mut reply).await;
        assert_eq!(reply.audio, Some(vec![7, 7]));
    }

    #[tokio::test]
    async fn failed_synthesis_leaves_text_only() {
        let synth = ResponseSynthesizer::new(Arc::new(Broken), Duration::from_secs(5));
        let mut reply = Reply::answer("hello");
        synth.speak(&mut reply).await;
        assert!(reply.audio.is_none());
        assert_eq!(reply.text, "hello");
    }

    #[tokio::test]
    async fn speak_leaves_reply_text_alone() {
        let engine = Arc::new(Recording::default());
        let synth = ResponseSynthesizer::new(engine.clone(), Duration::from_secs(5));
        let mut reply = Reply::answer("**Note:** 5 * 3 = 15");
        synth.speak(&mut reply).await;

        assert_eq!(reply.text, "**Note:** 5 * 3 = 15");
        assert_eq!(engine.spoken.lock().unwrap().as_deref(), Some("Note: 5 * 3 = 15"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_synthesis_times_out() {
        let synth = ResponseSynthesizer::new(Arc::new(Slow), Duration::from_secs(2));
        let mut reply = Reply::answer("hello");
        synth.speak(&mut reply).await;
        assert!(reply.audio.is_none());
    }

    #[tokio::test]
    async fn text_only_never_synthesizes() {
        let synth = ResponseSynthesizer::default();
        assert!(!synth.has_engine());
        let mut reply = Reply::answer("hello");
        synth.speak(&mut reply).await;
        assert!(reply.audio.is_none());
    }
}
