//! Line-oriented adapter over stdin/stdout
//!
//! Each input line is one transcribed fragment; an empty line or a quiet
//! wait is silence. Closing the input ends the session.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines, Stdin, Stdout};

use super::{IoAdapter, Listen};
use crate::session::{Reply, Utterance};
use crate::{Error, Result};

/// Adapter reading fragments from lines of text
pub struct ConsoleAdapter<R, W> {
    lines: Lines<R>,
    writer: W,
    speaker: String,
}

impl ConsoleAdapter<BufReader<Stdin>, Stdout> {
    /// Adapter over the process's stdin and stdout
    #[must_use]
    pub fn stdio(speaker: impl Into<String>) -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout(), speaker)
    }
}

impl<R, W> ConsoleAdapter<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Adapter over any line reader and writer
    pub fn new(reader: R, writer: W, speaker: impl Into<String>) -> Self {
        Self {
            lines: reader.lines(),
            writer,
            speaker: speaker.into(),
        }
    }

    /// Consume the adapter and return the writer
    pub fn into_writer(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<R, W> IoAdapter for ConsoleAdapter<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn listen(&mut self, wait: Duration) -> Result<Listen> {
        match tokio::time::timeout(wait, self.lines.next_line()).await {
            Err(_) => Ok(Listen::Silence),
            Ok(Ok(Some(line))) if line.trim().is_empty() => Ok(Listen::Silence),
            Ok(Ok(Some(line))) => Ok(Listen::Heard(Utterance::new(line.trim()))),
            Ok(Ok(None)) => Err(Error::AdapterClosed("input closed".to_string())),
            Ok(Err(e)) => Err(Error::AdapterClosed(format!("input failed: {e}"))),
        }
    }

    async fn deliver(&mut self, reply: &Reply) -> Result<()> {
        let line = format!("{}: {}\n", self.speaker, reply.text);
        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| Error::AdapterClosed(format!("output failed: {e}")))?;
        self.writer
            .flush()
            .await
            .map_err(|e| Error::AdapterClosed(format!("output failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lines_become_fragments() {
        let input: &[u8] = b"  aria what time is it  \n\n";
        let mut adapter = ConsoleAdapter::new(input, Vec::new(), "ARIA");
        let wait = Duration::from_secs(1);

        match adapter.listen(wait).await.unwrap() {
            Listen::Heard(u) => assert_eq!(u.text, "aria what time is it"),
            other => panic!("expected fragment, got {other:?}"),
        }
        assert_eq!(adapter.listen(wait).await.unwrap(), Listen::Silence);
        assert!(matches!(
            adapter.listen(wait).await,
            Err(Error::AdapterClosed(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn quiet_input_is_silence() {
        let reader = tokio_test::io::Builder::new()
            .wait(Duration::from_secs(5))
            .read(b"late\n")
            .build();
        let mut adapter = ConsoleAdapter::new(BufReader::new(reader), Vec::new(), "ARIA");

        assert_eq!(
            adapter.listen(Duration::from_secs(1)).await.unwrap(),
            Listen::Silence
        );
        assert!(matches!(
            adapter.listen(Duration::from_secs(10)).await.unwrap(),
            Listen::Heard(u) if u.text == "late"
        ));
    }

    #[tokio::test]
    async fn replies_are_prefixed_with_speaker() {
        let input: &[u8] = b"";
        let mut adapter = ConsoleAdapter::new(input, Vec::new(), "A.R.I.A.");
        adapter.deliver(&Reply::answer("Hello.")).await.unwrap();

        let out = String::from_utf8(adapter.into_writer()).unwrap();
        assert_eq!(out, "A.R.I.A.: Hello.\n");
    }
}
