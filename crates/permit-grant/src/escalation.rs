//! The escalation flow.
//!
//! Drives one interactive authentication attempt: spawn the setuid helper,
//! relay its prompts through the caller's [`Conversation`], and map the
//! terminal line to an outcome. The caller's loop is never blocked; the
//! whole exchange is async line IO over the helper's stdio.

use crate::protocol::HelperLine;
use crate::{Conversation, GrantError};
use permit_types::{Constraint, Identity, Scope};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::Notify;
use tracing::{debug, warn};

/// What the caller wants authenticated and retained.
#[derive(Debug, Clone)]
pub struct EscalationRequest {
    /// The action to grant.
    pub action_id: String,
    /// The uid that will hold the resulting grant.
    pub holder_uid: u32,
    /// Who must authenticate: the holder itself, or one of the admin
    /// identities for an admin-required challenge.
    pub authenticate_as: Identity,
    /// Retention scope for the resulting grant.
    pub scope: Scope,
    /// Constraint recorded on the resulting grant.
    pub constraint: Constraint,
}

/// How an escalation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationOutcome {
    /// Authentication succeeded and the grant was persisted by the helper.
    Granted,
    /// Authentication failed; nothing was persisted.
    Denied,
    /// The caller cancelled; the helper was killed.
    Cancelled,
}

/// Cancels a running escalation from another task.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<Notify>);

impl CancelHandle {
    /// Creates a handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Effective even if called before the
    /// escalation starts waiting.
    pub fn cancel(&self) {
        self.0.notify_one();
    }
}

/// Runs escalations through a helper binary.
///
/// The helper persists the grant itself, while it still holds the
/// privilege to write the store; this flow only relays the conversation.
/// Cancellation kills the helper, and because the helper persists only
/// after its backend reports success and immediately before printing
/// `SUCCESS`, a cancelled escalation has not persisted anything.
#[derive(Debug, Clone)]
pub struct Escalation {
    helper: PathBuf,
}

impl Escalation {
    /// Uses the helper binary at `helper`.
    #[must_use]
    pub fn new(helper: impl Into<PathBuf>) -> Self {
        Self {
            helper: helper.into(),
        }
    }

    /// Runs one authentication attempt to completion.
    ///
    /// # Errors
    ///
    /// Spawn and pipe failures, protocol violations, and a conversation
    /// that closes mid-exchange. A clean `FAILURE` from the helper is not
    /// an error; it is [`EscalationOutcome::Denied`].
    pub async fn run<C: Conversation>(
        &self,
        request: &EscalationRequest,
        conversation: &mut C,
        cancel: &CancelHandle,
    ) -> Result<EscalationOutcome, GrantError> {
        debug!(
            action_id = %request.action_id,
            authenticate_as = %request.authenticate_as,
            scope = %request.scope,
            "spawning grant helper"
        );
        let mut child = Command::new(&self.helper)
            .arg(&request.action_id)
            .arg(request.authenticate_as.to_string())
            .arg(request.holder_uid.to_string())
            .arg(request.scope.to_string())
            .arg(request.constraint.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| GrantError::Spawn {
                command: self.helper.display().to_string(),
                source,
            })?;

        // stdio handles exist by construction of the command above
        let mut answers = child.stdin.take().ok_or(GrantError::NoVerdict)?;
        let prompts = child.stdout.take().ok_or(GrantError::NoVerdict)?;
        let mut prompts = BufReader::new(prompts).lines();

        loop {
            let line = tokio::select! {
                () = cancel.0.notified() => {
                    warn!(action_id = %request.action_id, "escalation cancelled, killing helper");
                    let _ = child.kill().await;
                    return Ok(EscalationOutcome::Cancelled);
                }
                line = prompts.next_line() => line?,
            };
            let Some(line) = line else {
                // helper hung up without a verdict
                let _ = child.wait().await;
                return Err(GrantError::NoVerdict);
            };

            match HelperLine::parse(&line)? {
                HelperLine::Success => {
                    let _ = child.wait().await;
                    debug!(action_id = %request.action_id, "escalation granted");
                    return Ok(EscalationOutcome::Granted);
                }
                HelperLine::Failure => {
                    let _ = child.wait().await;
                    debug!(action_id = %request.action_id, "escalation denied");
                    return Ok(EscalationOutcome::Denied);
                }
                HelperLine::PromptEchoOff(prompt) => {
                    let answer = conversation.prompt_echo_off(&prompt).await?;
                    answers.write_all(answer.as_bytes()).await?;
                    answers.write_all(b"\n").await?;
                    answers.flush().await?;
                }
                HelperLine::PromptEchoOn(prompt) => {
                    let answer = conversation.prompt_echo_on(&prompt).await?;
                    answers.write_all(answer.as_bytes()).await?;
                    answers.write_all(b"\n").await?;
                    answers.flush().await?;
                }
                HelperLine::ErrorMsg(message) => conversation.show_error(&message).await,
                HelperLine::TextInfo(message) => conversation.show_info(&message).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScriptedConversation;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn fake_helper(dir: &TempDir, script: &str) -> PathBuf {
        let path = dir.path().join("fake-helper");
        std::fs::write(&path, format!("#!/bin/sh\n{script}")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn request() -> EscalationRequest {
        EscalationRequest {
            action_id: "org.example.restart".into(),
            holder_uid: 1000,
            authenticate_as: Identity::UnixUser(1000),
            scope: Scope::Session {
                session_id: "c2".into(),
            },
            constraint: Constraint::NONE,
        }
    }

    #[tokio::test]
    async fn granted_on_success_line() {
        let dir = TempDir::new().unwrap();
        let helper = fake_helper(
            &dir,
            r#"echo "PAM_PROMPT_ECHO_OFF Password: "
read answer
if [ "$answer" = "sesame" ]; then echo "SUCCESS"; else echo "FAILURE"; fi"#,
        );
        let mut conv = ScriptedConversation::answering(["sesame"]);
        let outcome = Escalation::new(helper)
            .run(&request(), &mut conv, &CancelHandle::new())
            .await
            .unwrap();
        assert_eq!(outcome, EscalationOutcome::Granted);
    }

    #[tokio::test]
    async fn denied_on_failure_line_with_error_relayed() {
        let dir = TempDir::new().unwrap();
        let helper = fake_helper(
            &dir,
            r#"echo "PAM_PROMPT_ECHO_OFF Password: "
read answer
echo "PAM_ERROR_MSG authentication failed"
echo "FAILURE""#,
        );
        let mut conv = ScriptedConversation::answering(["wrong"]);
        let outcome = Escalation::new(helper)
            .run(&request(), &mut conv, &CancelHandle::new())
            .await
            .unwrap();
        assert_eq!(outcome, EscalationOutcome::Denied);
        assert_eq!(conv.errors, vec!["authentication failed"]);
    }

    #[tokio::test]
    async fn info_lines_are_relayed_without_answers() {
        let dir = TempDir::new().unwrap();
        let helper = fake_helper(
            &dir,
            r#"echo "PAM_TEXT_INFO one moment"
echo "SUCCESS""#,
        );
        let mut conv = ScriptedConversation::default();
        let outcome = Escalation::new(helper)
            .run(&request(), &mut conv, &CancelHandle::new())
            .await
            .unwrap();
        assert_eq!(outcome, EscalationOutcome::Granted);
        assert_eq!(conv.infos, vec!["one moment"]);
    }

    #[tokio::test]
    async fn cancel_kills_the_helper() {
        let dir = TempDir::new().unwrap();
        let helper = fake_helper(&dir, "sleep 30\necho SUCCESS");
        let cancel = CancelHandle::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let mut conv = ScriptedConversation::default();
        let started = std::time::Instant::now();
        let outcome = Escalation::new(helper)
            .run(&request(), &mut conv, &cancel)
            .await
            .unwrap();
        assert_eq!(outcome, EscalationOutcome::Cancelled);
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }

    #[tokio::test]
    async fn cancel_before_start_wins_immediately() {
        let dir = TempDir::new().unwrap();
        let helper = fake_helper(&dir, "sleep 30\necho SUCCESS");
        let cancel = CancelHandle::new();
        cancel.cancel();

        let mut conv = ScriptedConversation::default();
        let outcome = Escalation::new(helper)
            .run(&request(), &mut conv, &cancel)
            .await
            .unwrap();
        assert_eq!(outcome, EscalationOutcome::Cancelled);
    }

    #[tokio::test]
    async fn hangup_without_verdict_is_an_error() {
        let dir = TempDir::new().unwrap();
        let helper = fake_helper(&dir, "echo \"PAM_TEXT_INFO hi\"\nexit 3");
        let mut conv = ScriptedConversation::default();
        let err = Escalation::new(helper)
            .run(&request(), &mut conv, &CancelHandle::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GrantError::NoVerdict));
    }

    #[tokio::test]
    async fn garbage_on_the_wire_is_a_protocol_error() {
        let dir = TempDir::new().unwrap();
        let helper = fake_helper(&dir, "echo \"HELLO THERE\"\nsleep 30");
        let mut conv = ScriptedConversation::default();
        let err = Escalation::new(helper)
            .run(&request(), &mut conv, &CancelHandle::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GrantError::Protocol { .. }));
    }

    #[tokio::test]
    async fn missing_helper_is_a_spawn_error() {
        let mut conv = ScriptedConversation::default();
        let err = Escalation::new("/nonexistent/permit-grant-helper")
            .run(&request(), &mut conv, &CancelHandle::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GrantError::Spawn { .. }));
    }
}
