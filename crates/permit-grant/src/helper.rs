//! Helper-side logic.
//!
//! The `permit-grant-helper` binary is the only writer of new grants. It
//! runs privilege-separated from the caller: the escalation flow talks to
//! it over stdio, it re-validates the invoker itself, and it delegates the
//! actual authentication conversation to an external backend command (the
//! PAM shim) speaking the same line protocol. Everything here is plain
//! functions so the binary stays a thin shell and the logic is testable.

use crate::protocol::HelperLine;
use crate::GrantError;
use permit_store::AuthorizationStore;
use permit_types::{AuthorizationEntry, Constraint, Identity, Scope};
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

/// Default ephemeral partition directory.
pub const DEFAULT_EPHEMERAL_DIR: &str = "/run/permit/grants";
/// Default durable partition directory.
pub const DEFAULT_DURABLE_DIR: &str = "/var/lib/permit/grants";
/// Default rules directory.
pub const DEFAULT_RULES_DIR: &str = "/etc/permit/rules.d";
/// Default authentication backend command.
pub const DEFAULT_AUTH_BACKEND: &str = "/usr/libexec/permit-auth-backend";

/// A parsed helper invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperRequest {
    /// The action to grant.
    pub action_id: String,
    /// The uid that must authenticate.
    pub authenticate_uid: u32,
    /// The uid that will hold the grant.
    pub holder_uid: u32,
    /// Retention scope.
    pub scope: Scope,
    /// Constraint recorded on the grant.
    pub constraint: Constraint,
}

/// Parses the textual scope form used on the helper command line.
///
/// The forms are the ones [`Scope`]'s `Display` produces:
/// `one-shot-process:<pid>@<start>`, `process:<pid>@<start>`,
/// `session:<id>`, `always:uid<uid>`.
#[must_use]
pub fn parse_scope(spec: &str) -> Option<Scope> {
    let (kind, rest) = spec.split_once(':')?;
    match kind {
        "one-shot-process" => {
            let (pid, start_time) = parse_process_key(rest)?;
            Some(Scope::OneShotProcess { pid, start_time })
        }
        "process" => {
            let (pid, start_time) = parse_process_key(rest)?;
            Some(Scope::Process { pid, start_time })
        }
        "session" => (!rest.is_empty()).then(|| Scope::Session {
            session_id: rest.to_string(),
        }),
        "always" => {
            let uid = rest.strip_prefix("uid")?.parse().ok()?;
            Some(Scope::Always { uid })
        }
        _ => None,
    }
}

fn parse_process_key(rest: &str) -> Option<(u32, u64)> {
    let (pid, start) = rest.split_once('@')?;
    Some((pid.parse().ok()?, start.parse().ok()?))
}

/// Parses the helper's five positional arguments:
/// `<action_id> <authenticate-identity> <holder_uid> <scope> <constraint>`.
///
/// # Errors
///
/// [`GrantError::BadInvocation`] for a wrong argument count, an identity
/// that is not a concrete user, or an unparseable scope/constraint.
pub fn parse_args(args: &[String]) -> Result<HelperRequest, GrantError> {
    let [action_id, identity, holder, scope, constraint] = args else {
        return Err(GrantError::BadInvocation {
            reason: format!("expected 5 arguments, got {}", args.len()),
        });
    };

    let authenticate_as: Identity =
        identity.parse().map_err(|e| GrantError::BadInvocation {
            reason: format!("bad identity '{identity}': {e}"),
        })?;
    let Identity::UnixUser(authenticate_uid) = authenticate_as else {
        return Err(GrantError::BadInvocation {
            reason: format!("can only authenticate concrete users, not '{identity}'"),
        });
    };

    Ok(HelperRequest {
        action_id: action_id.clone(),
        authenticate_uid,
        holder_uid: holder.parse().map_err(|_| GrantError::BadInvocation {
            reason: format!("bad holder uid '{holder}'"),
        })?,
        scope: parse_scope(scope).ok_or_else(|| GrantError::BadInvocation {
            reason: format!("bad scope '{scope}'"),
        })?,
        constraint: constraint.parse().map_err(|_| GrantError::BadInvocation {
            reason: format!("bad constraint '{constraint}'"),
        })?,
    })
}

/// Re-validates that the invoking uid is entitled to this escalation.
///
/// Root may drive any escalation. Any other invoker may only
/// self-authenticate: the authenticating uid and the grant holder must
/// both be the invoker itself. (Write access to the durable partition is
/// enforced separately by the filesystem when an `Always` grant is
/// persisted.)
///
/// # Errors
///
/// [`GrantError::PrivilegeViolation`] with the failed condition.
pub fn validate_invoker(invoker_uid: u32, request: &HelperRequest) -> Result<(), GrantError> {
    if invoker_uid == 0 {
        return Ok(());
    }
    if request.authenticate_uid != invoker_uid {
        return Err(GrantError::PrivilegeViolation {
            reason: format!(
                "uid {invoker_uid} cannot authenticate as uid {}",
                request.authenticate_uid
            ),
        });
    }
    if request.holder_uid != invoker_uid {
        return Err(GrantError::PrivilegeViolation {
            reason: format!(
                "uid {invoker_uid} cannot mint grants for uid {}",
                request.holder_uid
            ),
        });
    }
    Ok(())
}

/// Runs the authentication conversation and persists the grant.
///
/// Spawns the backend, relays its prompts to `caller_out` and the caller's
/// answers from `caller_in`, verbatim. On backend `SUCCESS` the grant is
/// persisted *before* `SUCCESS` is echoed to the caller, so a caller that
/// has seen `SUCCESS` can rely on the grant existing and a caller that
/// kills the helper mid-conversation has changed nothing.
///
/// Returns whether authentication succeeded.
///
/// # Errors
///
/// Spawn/pipe failures, protocol garbage from the backend, a backend that
/// hangs up without a verdict, and store failures while persisting.
pub async fn authenticate_and_persist<R, W>(
    request: &HelperRequest,
    store: &AuthorizationStore,
    backend: &Path,
    caller_in: R,
    mut caller_out: W,
) -> Result<bool, GrantError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut child = Command::new(backend)
        .arg(request.authenticate_uid.to_string())
        .arg(&request.action_id)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| GrantError::Spawn {
            command: backend.display().to_string(),
            source,
        })?;

    let mut backend_in = child.stdin.take().ok_or(GrantError::NoVerdict)?;
    let backend_out = child.stdout.take().ok_or(GrantError::NoVerdict)?;
    let mut backend_lines = BufReader::new(backend_out).lines();
    let mut caller_lines = caller_in.lines();

    loop {
        let Some(line) = backend_lines.next_line().await? else {
            let _ = child.wait().await;
            return Err(GrantError::NoVerdict);
        };
        let message = HelperLine::parse(&line)?;

        match &message {
            HelperLine::Success => {
                let _ = child.wait().await;
                persist(request, store)?;
                caller_out.write_all(b"SUCCESS\n").await?;
                caller_out.flush().await?;
                return Ok(true);
            }
            HelperLine::Failure => {
                let _ = child.wait().await;
                caller_out.write_all(b"FAILURE\n").await?;
                caller_out.flush().await?;
                return Ok(false);
            }
            _ => {
                caller_out
                    .write_all(format!("{message}\n").as_bytes())
                    .await?;
                caller_out.flush().await?;
                if message.expects_answer() {
                    let Some(answer) = caller_lines.next_line().await? else {
                        warn!("caller hung up mid-authentication");
                        let _ = child.kill().await;
                        return Err(GrantError::ConversationClosed);
                    };
                    backend_in.write_all(answer.as_bytes()).await?;
                    backend_in.write_all(b"\n").await?;
                    backend_in.flush().await?;
                }
            }
        }
    }
}

fn persist(request: &HelperRequest, store: &AuthorizationStore) -> Result<(), GrantError> {
    let created_at = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    let entry = AuthorizationEntry::new(
        Identity::UnixUser(request.holder_uid),
        request.action_id.clone(),
        request.constraint,
        request.scope.clone(),
        created_at,
    );
    store.insert(&entry, request.authenticate_uid)?;
    store.mark_changed()?;
    debug!(
        action_id = %request.action_id,
        holder_uid = request.holder_uid,
        scope = %request.scope,
        "persisted grant"
    );
    Ok(())
}
