//! Privilege-separated grant helper.
//!
//! Invoked by the escalation flow with five positional arguments
//! (`<action_id> <authenticate-identity> <holder_uid> <scope>
//! <constraint>`), speaks the line protocol on stdio and exits 0 on
//! `SUCCESS`, 1 otherwise. Store directories and the backend command come
//! from `PERMIT_*` environment variables, falling back to the system
//! defaults.

use permit_grant::helper::{
    authenticate_and_persist, parse_args, validate_invoker, DEFAULT_AUTH_BACKEND,
    DEFAULT_DURABLE_DIR, DEFAULT_EPHEMERAL_DIR, DEFAULT_RULES_DIR,
};
use permit_store::AuthorizationStore;
use permit_tracker::ProcFs;
use std::os::fd::AsRawFd;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{error, warn};

fn env_path(name: &str, default: &str) -> PathBuf {
    std::env::var_os(name)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    std::process::exit(run().await);
}

async fn run() -> i32 {
    // an interactive terminal must never see the protocol, and passwords
    // must never come from one
    if nix::unistd::isatty(std::io::stdin().as_raw_fd()).unwrap_or(false) {
        error!("refusing to run with a tty on stdin");
        return fail().await;
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let request = match parse_args(&args) {
        Ok(request) => request,
        Err(e) => {
            error!(error = %e, "bad invocation");
            return fail().await;
        }
    };

    let invoker_uid = nix::unistd::getuid().as_raw();
    if let Err(e) = validate_invoker(invoker_uid, &request) {
        warn!(invoker_uid, error = %e, "refusing escalation");
        return fail().await;
    }

    let store = match AuthorizationStore::open(
        env_path("PERMIT_EPHEMERAL_DIR", DEFAULT_EPHEMERAL_DIR),
        env_path("PERMIT_DURABLE_DIR", DEFAULT_DURABLE_DIR),
        env_path("PERMIT_RULES_DIR", DEFAULT_RULES_DIR),
        Arc::new(ProcFs::new()),
    ) {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, "cannot open authorization store");
            return fail().await;
        }
    };

    let backend = env_path("PERMIT_AUTH_BACKEND", DEFAULT_AUTH_BACKEND);
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();

    match authenticate_and_persist(&request, &store, &backend, stdin, stdout).await {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            error!(error = %e, "escalation aborted");
            fail().await
        }
    }
}

/// Emits the terminal `FAILURE` line and returns the failure exit code.
async fn fail() -> i32 {
    use tokio::io::AsyncWriteExt;
    let mut stdout = tokio::io::stdout();
    let _ = stdout.write_all(b"FAILURE\n").await;
    let _ = stdout.flush().await;
    1
}
