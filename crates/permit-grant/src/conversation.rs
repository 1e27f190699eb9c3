//! The conversation seam.
//!
//! Whoever drives an escalation supplies the answers: a desktop agent, a
//! console prompt, a test script. The GUI/text agents themselves stay
//! outside this crate; they only implement [`Conversation`].

use crate::GrantError;
use std::collections::VecDeque;
use std::future::Future;
use tracing::debug;

/// An answer source for authentication prompts.
pub trait Conversation: Send {
    /// Asks for a hidden answer (passwords).
    fn prompt_echo_off(
        &mut self,
        prompt: &str,
    ) -> impl Future<Output = Result<String, GrantError>> + Send;

    /// Asks for a visible answer.
    fn prompt_echo_on(
        &mut self,
        prompt: &str,
    ) -> impl Future<Output = Result<String, GrantError>> + Send;

    /// Shows an error message; no answer expected.
    fn show_error(&mut self, message: &str) -> impl Future<Output = ()> + Send;

    /// Shows an informational message; no answer expected.
    fn show_info(&mut self, message: &str) -> impl Future<Output = ()> + Send;
}

/// A conversation answering from a fixed script, for tests and batch use.
#[derive(Debug, Default)]
pub struct ScriptedConversation {
    answers: VecDeque<String>,
    /// Error messages shown so far.
    pub errors: Vec<String>,
    /// Info messages shown so far.
    pub infos: Vec<String>,
}

impl ScriptedConversation {
    /// A conversation that will answer the given lines in order.
    #[must_use]
    pub fn answering(answers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            errors: Vec::new(),
            infos: Vec::new(),
        }
    }

    fn next_answer(&mut self) -> Result<String, GrantError> {
        self.answers
            .pop_front()
            .ok_or(GrantError::ConversationClosed)
    }
}

impl Conversation for ScriptedConversation {
    async fn prompt_echo_off(&mut self, prompt: &str) -> Result<String, GrantError> {
        debug!(prompt, "scripted conversation answering hidden prompt");
        self.next_answer()
    }

    async fn prompt_echo_on(&mut self, prompt: &str) -> Result<String, GrantError> {
        debug!(prompt, "scripted conversation answering visible prompt");
        self.next_answer()
    }

    async fn show_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    async fn show_info(&mut self, message: &str) {
        self.infos.push(message.to_string());
    }
}

/// A console conversation over the process's own stdin/stderr.
///
/// Hidden prompts disable terminal echo for the duration of the read when
/// stdin is a tty; on a pipe they read plainly, which is what batch callers
/// want.
#[derive(Debug, Default)]
pub struct ConsoleConversation;

impl ConsoleConversation {
    /// Creates a console conversation.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    async fn read_line(echo: bool, prompt: String) -> Result<String, GrantError> {
        tokio::task::spawn_blocking(move || {
            use std::io::{BufRead, Write};

            let mut stderr = std::io::stderr();
            write!(stderr, "{prompt}")?;
            stderr.flush()?;

            let _guard = if echo { None } else { EchoOff::engage() };

            let mut line = String::new();
            let n = std::io::stdin().lock().read_line(&mut line)?;
            if n == 0 {
                return Err(GrantError::ConversationClosed);
            }
            if !echo {
                // the suppressed newline the user typed
                writeln!(stderr)?;
            }
            Ok(line.trim_end_matches(['\r', '\n']).to_string())
        })
        .await
        .map_err(|_| GrantError::ConversationClosed)?
    }
}

impl Conversation for ConsoleConversation {
    async fn prompt_echo_off(&mut self, prompt: &str) -> Result<String, GrantError> {
        Self::read_line(false, prompt.to_string()).await
    }

    async fn prompt_echo_on(&mut self, prompt: &str) -> Result<String, GrantError> {
        Self::read_line(true, prompt.to_string()).await
    }

    async fn show_error(&mut self, message: &str) {
        eprintln!("{message}");
    }

    async fn show_info(&mut self, message: &str) {
        eprintln!("{message}");
    }
}

/// Restores terminal echo when dropped.
struct EchoOff {
    original: nix::sys::termios::Termios,
}

impl EchoOff {
    fn engage() -> Option<Self> {
        use nix::sys::termios::{tcgetattr, tcsetattr, LocalFlags, SetArg};

        let stdin = std::io::stdin();
        let original = tcgetattr(&stdin).ok()?;
        let mut silent = original.clone();
        silent.local_flags.remove(LocalFlags::ECHO);
        tcsetattr(&stdin, SetArg::TCSANOW, &silent).ok()?;
        Some(Self { original })
    }
}

impl Drop for EchoOff {
    fn drop(&mut self) {
        use nix::sys::termios::{tcsetattr, SetArg};
        let _ = tcsetattr(&std::io::stdin(), SetArg::TCSANOW, &self.original);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_conversation_answers_in_order() {
        let mut conv = ScriptedConversation::answering(["first", "second"]);
        assert_eq!(conv.prompt_echo_off("p").await.unwrap(), "first");
        assert_eq!(conv.prompt_echo_on("p").await.unwrap(), "second");
        assert!(matches!(
            conv.prompt_echo_off("p").await,
            Err(GrantError::ConversationClosed)
        ));
    }

    #[tokio::test]
    async fn scripted_conversation_collects_messages() {
        let mut conv = ScriptedConversation::default();
        conv.show_error("bad").await;
        conv.show_info("fyi").await;
        assert_eq!(conv.errors, vec!["bad"]);
        assert_eq!(conv.infos, vec!["fyi"]);
    }
}
