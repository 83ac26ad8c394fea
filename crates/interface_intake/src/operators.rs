//! Operator adapters for the application
//!
//! - [`ConsoleOperator`]: line-oriented dialogue over any async reader/writer
//!   pair (stdin/stdout for the binary)
//! - [`ReplayOperator`]: answers from a transcript, one line per question

use std::collections::VecDeque;
use std::path::Path;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines, Stdin, Stdout};
use tokio::sync::Mutex;
use tracing::debug;

use core_kernel::{DomainPort, PortError};
use domain_intake::{ConfirmationRequest, OperatorIo, OperatorPrompt};

/// Interactive operator reading one answer per line
pub struct ConsoleOperator<R, W> {
    input: Mutex<Lines<R>>,
    output: Mutex<W>,
}

impl ConsoleOperator<BufReader<Stdin>, Stdout> {
    /// Operator on the process's stdin and stdout
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> ConsoleOperator<R, W>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(input: R, output: W) -> Self {
        Self {
            input: Mutex::new(input.lines()),
            output: Mutex::new(output),
        }
    }

    async fn say(&self, line: &str) -> Result<(), PortError> {
        let mut output = self.output.lock().await;
        output
            .write_all(format!("{line}\n").as_bytes())
            .await
            .map_err(|e| PortError::connection(format!("operator output failed: {e}")))?;
        output
            .flush()
            .await
            .map_err(|e| PortError::connection(format!("operator output failed: {e}")))
    }

    async fn read_answer(&self) -> Result<String, PortError> {
        let line = self
            .input
            .lock()
            .await
            .next_line()
            .await
            .map_err(|e| PortError::connection(format!("operator input failed: {e}")))?;
        line.ok_or_else(|| PortError::connection("operator input closed"))
    }

    /// Consumes the operator and returns the writer
    pub fn into_output(self) -> W {
        self.output.into_inner()
    }
}

impl<R, W> std::fmt::Debug for ConsoleOperator<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleOperator").finish_non_exhaustive()
    }
}

impl<R, W> DomainPort for ConsoleOperator<R, W>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
}

#[async_trait]
impl<R, W> OperatorIo for ConsoleOperator<R, W>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn ask(&self, prompt: &OperatorPrompt) -> Result<String, PortError> {
        self.say(&format!("> {prompt}")).await?;
        self.read_answer().await
    }

    async fn confirm(&self, request: &ConfirmationRequest) -> Result<String, PortError> {
        self.say(&format!("> {request}")).await?;
        self.say("  (answer \"mine\", \"report\", or type the correct value)").await?;
        self.read_answer().await
    }

    async fn notify(&self, message: &str) {
        if let Err(e) = self.say(&format!("* {message}")).await {
            debug!(error = %e, "notification not delivered");
        }
    }
}

/// Operator answering from a prepared transcript
///
/// Each question, whether a prompt or a confirmation, consumes the next
/// line. Blank lines and lines starting with `#` are skipped when loading.
/// Once the transcript runs out every answer is empty.
#[derive(Debug, Default)]
pub struct ReplayOperator {
    answers: Mutex<VecDeque<String>>,
    notifications: Mutex<Vec<String>>,
}

impl ReplayOperator {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            notifications: Mutex::default(),
        }
    }

    /// Parses a transcript file's contents
    pub fn parse(transcript: &str) -> Self {
        Self::new(
            transcript
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#')),
        )
    }

    pub async fn from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let transcript = tokio::fs::read_to_string(path).await?;
        Ok(Self::parse(&transcript))
    }

    /// Answers not yet consumed
    pub async fn remaining(&self) -> usize {
        self.answers.lock().await.len()
    }

    pub async fn notifications(&self) -> Vec<String> {
        self.notifications.lock().await.clone()
    }

    async fn next(&self) -> String {
        self.answers.lock().await.pop_front().unwrap_or_default()
    }
}

impl DomainPort for ReplayOperator {}

#[async_trait]
impl OperatorIo for ReplayOperator {
    async fn ask(&self, _prompt: &OperatorPrompt) -> Result<String, PortError> {
        Ok(self.next().await)
    }

    async fn confirm(&self, _request: &ConfirmationRequest) -> Result<String, PortError> {
        Ok(self.next().await)
    }

    async fn notify(&self, message: &str) {
        self.notifications.lock().await.push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt(field: &str) -> OperatorPrompt {
        OperatorPrompt {
            field: field.to_string(),
            label: field.replace('_', " "),
            expected: "text".to_string(),
            attempt: 1,
            retry_reason: None,
        }
    }

    #[tokio::test]
    async fn test_console_round_trip() {
        let input: &[u8] = b"Main Street 5\n";
        let operator = ConsoleOperator::new(BufReader::new(input), Vec::new());

        let answer = operator.ask(&prompt("location")).await.unwrap();
        assert_eq!(answer, "Main Street 5");

        let written = String::from_utf8(operator.into_output()).unwrap();
        assert_eq!(written, "> Please provide the location.\n");
    }

    #[tokio::test]
    async fn test_console_closed_input_is_an_error() {
        let input: &[u8] = b"";
        let operator = ConsoleOperator::new(BufReader::new(input), Vec::new());
        assert!(operator.ask(&prompt("date")).await.is_err());
    }

    #[tokio::test]
    async fn test_replay_skips_comments() {
        let operator = ReplayOperator::parse("# turn 1\n2024-01-01\n\nZurich\n");
        assert_eq!(operator.ask(&prompt("date")).await.unwrap(), "2024-01-01");
        assert_eq!(operator.ask(&prompt("location")).await.unwrap(), "Zurich");
        assert_eq!(operator.ask(&prompt("time")).await.unwrap(), "");
    }
}
