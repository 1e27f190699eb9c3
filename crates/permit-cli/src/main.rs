//! permit - authorization engine front-end
//!
//! # Configuration
//!
//! Configuration is loaded from multiple sources with priority:
//!
//! 1. Environment variables (`PERMIT_*`, highest priority)
//! 2. System config (`/etc/permit/config.toml`, or `--config`)
//! 3. Default values (lowest priority)
//!
//! # Environment Variables
//!
//! - `PERMIT_EPHEMERAL_DIR`: runtime grant partition
//! - `PERMIT_DURABLE_DIR`: persistent grant partition
//! - `PERMIT_RULES_DIR`: administrator rules directory
//! - `PERMIT_ACTIONS_FILE`: action definitions (JSON)
//! - `PERMIT_HELPER`: grant helper binary
//! - `PERMIT_AUTH_BACKEND`: authentication backend command
//! - `PERMIT_ADMIN_GROUP`: gid whose members satisfy admin challenges

mod config;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use config::PermitConfig;
use permit_engine::{
    ActionRegistry, AdminResolver, AdminRule, DecisionEngine, EngineError, UnixDirectory,
};
use permit_grant::{
    CancelHandle, ConsoleConversation, Escalation, EscalationOutcome, EscalationRequest,
};
use permit_store::AuthorizationStore;
use permit_tracker::{CallerTracker, ProcFs, StaticBusDirectory, StaticSessionDirectory};
use permit_types::{
    Action, AuthorizationEntry, Constraint, Identity, Scope, SessionFacts, Subject,
};
use std::os::unix::fs::MetadataExt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// permit - check, list and grant authorizations
#[derive(Parser, Debug)]
#[command(name = "permit")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file (default: /etc/permit/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decide whether a subject may perform an action
    Check {
        /// The action id, e.g. org.example.restart
        action_id: String,

        /// Check for this process
        #[arg(long, conflicts_with = "session")]
        pid: Option<u32>,

        /// Check for this login session
        #[arg(long, requires = "uid")]
        session: Option<String>,

        /// The session's uid (required with --session)
        #[arg(long)]
        uid: Option<u32>,

        /// Print the verdict as JSON
        #[arg(long)]
        json: bool,
    },

    /// List explicit grants held by a user
    List {
        /// The holder uid (default: the invoking user)
        #[arg(long)]
        uid: Option<u32>,

        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove one explicit grant
    Revoke {
        /// The action id
        action_id: String,

        /// The holder uid
        #[arg(long)]
        uid: u32,

        /// The grant's scope, e.g. 'session:c2' or 'always:uid1000'
        #[arg(long)]
        scope: String,
    },

    /// Deny an action outright until unlocked
    Lockdown {
        /// The action id
        action_id: String,

        /// Lock down only this uid (default: everyone, via a mandatory
        /// rule file)
        #[arg(long)]
        uid: Option<u32>,
    },

    /// Undo a lockdown
    Unlock {
        /// The action id
        action_id: String,

        /// The uid the lockdown was scoped to, if any
        #[arg(long)]
        uid: Option<u32>,
    },

    /// Interactively authenticate and persist a grant
    Grant {
        /// The action id
        action_id: String,

        /// Who authenticates (default: the invoking user)
        #[arg(long)]
        identity: Option<String>,

        /// Who holds the resulting grant (default: the invoking user)
        #[arg(long)]
        uid: Option<u32>,

        /// Retention scope (default: always for the holder)
        #[arg(long)]
        scope: Option<String>,

        /// Constraint string: null, local, active or local+active
        #[arg(long)]
        constraint: Option<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = PermitConfig::load(cli.config.as_deref())?;
    let code = run(cli.command, &config).await?;
    std::process::exit(code);
}

async fn run(command: Command, config: &PermitConfig) -> Result<i32> {
    match command {
        Command::Check {
            action_id,
            pid,
            session,
            uid,
            json,
        } => check(config, &action_id, pid, session, uid, json),
        Command::List { uid, json } => list(config, uid, json),
        Command::Revoke {
            action_id,
            uid,
            scope,
        } => revoke(config, &action_id, uid, &scope),
        Command::Lockdown { action_id, uid } => lockdown(config, &action_id, uid),
        Command::Unlock { action_id, uid } => unlock(config, &action_id, uid),
        Command::Grant {
            action_id,
            identity,
            uid,
            scope,
            constraint,
        } => grant(config, &action_id, identity, uid, scope, constraint).await,
    }
}

fn open_store(config: &PermitConfig) -> Result<Arc<AuthorizationStore>> {
    Ok(Arc::new(AuthorizationStore::open(
        &config.ephemeral_dir,
        &config.durable_dir,
        &config.rules_dir,
        Arc::new(ProcFs::new()),
    )?))
}

fn load_actions(config: &PermitConfig) -> Result<Vec<Action>> {
    let content = match std::fs::read_to_string(&config.actions_file) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %config.actions_file.display(), "no actions file");
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(e).with_context(|| {
                format!("cannot read actions file {}", config.actions_file.display())
            })
        }
    };
    serde_json::from_str(&content).with_context(|| {
        format!("invalid actions file {}", config.actions_file.display())
    })
}

fn build_engine(
    config: &PermitConfig,
    store: Arc<AuthorizationStore>,
    sessions: Arc<StaticSessionDirectory>,
) -> Result<DecisionEngine> {
    let registry = Arc::new(ActionRegistry::new());
    registry.replace_all(load_actions(config)?);

    let tracker = Arc::new(CallerTracker::new(
        Arc::new(StaticBusDirectory::new()),
        sessions,
        Arc::new(ProcFs::new()),
    ));
    let directory = Arc::new(UnixDirectory::new());
    let admin = AdminResolver::new(
        vec![AdminRule::Group(config.admin_group), AdminRule::User(0)],
        directory.clone(),
    );
    Ok(DecisionEngine::new(
        registry, store, tracker, directory, admin,
    ))
}

fn uid_of_pid(pid: u32) -> Result<u32> {
    let meta = std::fs::metadata(format!("/proc/{pid}"))
        .with_context(|| format!("no such process: {pid}"))?;
    Ok(meta.uid())
}

fn check(
    config: &PermitConfig,
    action_id: &str,
    pid: Option<u32>,
    session: Option<String>,
    uid: Option<u32>,
    json: bool,
) -> Result<i32> {
    let sessions = Arc::new(StaticSessionDirectory::new());
    let subject = match (pid, session) {
        (Some(pid), None) => {
            let table = ProcFs::new();
            let start_time = permit_types::ProcessTable::start_time_of(&table, pid)
                .with_context(|| format!("no such process: {pid}"))?;
            Subject::process(pid, start_time, uid_of_pid(pid)?)?
        }
        (None, Some(session_id)) => {
            // no session manager is wired here: facts degrade to
            // not-local/not-active, which fails toward authentication
            let Some(uid) = uid else {
                bail!("--session requires --uid");
            };
            sessions.set_facts(SessionFacts::degraded(session_id.clone(), uid));
            Subject::session(session_id)?
        }
        _ => bail!("exactly one of --pid or --session is required"),
    };

    let store = open_store(config)?;
    let engine = build_engine(config, store, sessions)?;

    match engine.decide(&subject, action_id) {
        Ok(verdict) => {
            if json {
                println!("{}", serde_json::to_string(&verdict)?);
            } else {
                println!("{verdict}");
            }
            Ok(i32::from(!verdict.is_authorized()))
        }
        Err(EngineError::UnknownAction { action_id }) => {
            eprintln!("permit: unknown action '{action_id}' (not registered)");
            Ok(1)
        }
        Err(e) => Err(e.into()),
    }
}

fn list(config: &PermitConfig, uid: Option<u32>, json: bool) -> Result<i32> {
    let uid = uid.unwrap_or_else(|| nix::unistd::getuid().as_raw());
    let store = open_store(config)?;
    let entries = store.list(uid)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(0);
    }
    if entries.is_empty() {
        println!("no explicit grants for uid {uid}");
        return Ok(0);
    }
    for entry in entries {
        let created = chrono::DateTime::from_timestamp(entry.created_at, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        let kind = if entry.negative { "deny " } else { "grant" };
        println!(
            "{kind}  {:<40}  {:<28}  {:<12}  {created}",
            entry.action_id,
            entry.scope.to_string(),
            entry.constraint.to_string(),
        );
    }
    Ok(0)
}

/// Grant records are touched only for one's own uid unless root.
fn require_same_user_or_root(holder_uid: u32) -> Result<()> {
    let invoker = nix::unistd::getuid().as_raw();
    if invoker != 0 && invoker != holder_uid {
        bail!("only root may alter grants held by uid {holder_uid}");
    }
    Ok(())
}

fn revoke(config: &PermitConfig, action_id: &str, uid: u32, scope: &str) -> Result<i32> {
    let scope = permit_grant::helper::parse_scope(scope)
        .with_context(|| format!("bad scope '{scope}'"))?;
    require_same_user_or_root(uid)?;
    let store = open_store(config)?;
    let removed = store.revoke(&Identity::UnixUser(uid), action_id, &scope)?;
    if removed {
        store.mark_changed()?;
        println!("revoked");
        Ok(0)
    } else {
        warn!(action_id, uid, "no matching grant");
        println!("nothing to revoke");
        Ok(1)
    }
}

const LOCKDOWN_RULES_DIR: &str = "95-lockdown.d";

fn lockdown_rule_path(config: &PermitConfig, action_id: &str) -> PathBuf {
    config
        .rules_dir
        .join(LOCKDOWN_RULES_DIR)
        .join(format!("{action_id}.pkla"))
}

fn lockdown(config: &PermitConfig, action_id: &str, uid: Option<u32>) -> Result<i32> {
    let store = open_store(config)?;
    match uid {
        // per-user lockdown: a negative entry shadowing any positive grant
        Some(uid) => {
            require_same_user_or_root(uid)?;
            let now = chrono::Utc::now().timestamp();
            let entry = AuthorizationEntry::new(
                Identity::UnixUser(uid),
                action_id,
                Constraint::NONE,
                Scope::Always { uid },
                now,
            )
            .into_negative();
            store.insert(&entry, nix::unistd::getuid().as_raw())?;
        }
        // global lockdown: a mandatory rule stanza overriding every
        // earlier rule and the action's own defaults
        None => {
            let path = lockdown_rule_path(config, action_id);
            let parent = path.parent().context("lockdown path has no parent")?;
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
            std::fs::write(
                &path,
                format!(
                    "[lockdown]\nIdentity=unix-user:*\nAction={action_id}\nResultAny=no\n"
                ),
            )
            .with_context(|| format!("cannot write {}", path.display()))?;
        }
    }
    store.mark_changed()?;
    println!("locked down {action_id}");
    Ok(0)
}

fn unlock(config: &PermitConfig, action_id: &str, uid: Option<u32>) -> Result<i32> {
    let store = open_store(config)?;
    let removed = match uid {
        Some(uid) => {
            require_same_user_or_root(uid)?;
            store.revoke(&Identity::UnixUser(uid), action_id, &Scope::Always { uid })?
        }
        None => {
            let path = lockdown_rule_path(config, action_id);
            match std::fs::remove_file(&path) {
                Ok(()) => true,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("cannot remove {}", path.display()))
                }
            }
        }
    };
    if removed {
        store.mark_changed()?;
        println!("unlocked {action_id}");
        Ok(0)
    } else {
        println!("{action_id} was not locked down");
        Ok(1)
    }
}

async fn grant(
    config: &PermitConfig,
    action_id: &str,
    identity: Option<String>,
    uid: Option<u32>,
    scope: Option<String>,
    constraint: Option<String>,
) -> Result<i32> {
    let my_uid = nix::unistd::getuid().as_raw();
    let holder_uid = uid.unwrap_or(my_uid);
    let authenticate_as = match identity {
        Some(spec) => spec
            .parse()
            .map_err(|e| anyhow::anyhow!("bad identity '{spec}': {e}"))?,
        None => Identity::UnixUser(my_uid),
    };
    let scope = match scope {
        Some(spec) => permit_grant::helper::parse_scope(&spec)
            .with_context(|| format!("bad scope '{spec}'"))?,
        None => Scope::Always { uid: holder_uid },
    };
    let constraint: Constraint = match constraint {
        Some(spec) => spec
            .parse()
            .map_err(|e| anyhow::anyhow!("bad constraint: {e}"))?,
        None => Constraint::NONE,
    };

    // the helper inherits this process's environment; make sure it sees
    // the same store this config resolved to
    std::env::set_var("PERMIT_EPHEMERAL_DIR", &config.ephemeral_dir);
    std::env::set_var("PERMIT_DURABLE_DIR", &config.durable_dir);
    std::env::set_var("PERMIT_RULES_DIR", &config.rules_dir);
    std::env::set_var("PERMIT_AUTH_BACKEND", &config.auth_backend);

    let request = EscalationRequest {
        action_id: action_id.to_string(),
        holder_uid,
        authenticate_as,
        scope,
        constraint,
    };
    let mut conversation = ConsoleConversation::new();
    let outcome = Escalation::new(&config.helper_path)
        .run(&request, &mut conversation, &CancelHandle::new())
        .await?;

    match outcome {
        EscalationOutcome::Granted => {
            println!("granted");
            Ok(0)
        }
        EscalationOutcome::Denied => {
            println!("denied");
            Ok(1)
        }
        EscalationOutcome::Cancelled => {
            println!("cancelled");
            Ok(1)
        }
    }
}
