//! Shared E2E test helpers for the grant helper binary.

use assert_cmd::cargo::cargo_bin_cmd;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default timeout for helper tests.
pub const TIMEOUT: Duration = Duration::from_secs(10);

/// A store layout in a tempdir plus the env wiring for the helper.
pub struct HelperEnv {
    pub dir: tempfile::TempDir,
}

impl HelperEnv {
    pub fn new() -> Self {
        Self {
            dir: tempfile::TempDir::new().expect("tempdir"),
        }
    }

    pub fn ephemeral(&self) -> PathBuf {
        self.dir.path().join("run")
    }

    pub fn durable(&self) -> PathBuf {
        self.dir.path().join("lib")
    }

    /// Writes an executable backend script into the env.
    pub fn backend(&self, script: &str) -> PathBuf {
        let path = self.dir.path().join("backend");
        std::fs::write(&path, format!("#!/bin/sh\n{script}")).expect("write backend");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("chmod backend");
        path
    }

    /// Builds a helper command wired to this env's store and backend.
    pub fn cmd(&self, backend: &Path) -> assert_cmd::Command {
        let mut cmd: assert_cmd::Command = cargo_bin_cmd!("permit-grant-helper");
        cmd.timeout(TIMEOUT)
            .env("PERMIT_EPHEMERAL_DIR", self.ephemeral())
            .env("PERMIT_DURABLE_DIR", self.durable())
            .env("PERMIT_RULES_DIR", self.dir.path().join("rules.d"))
            .env("PERMIT_AUTH_BACKEND", backend);
        cmd
    }
}

/// The current real uid, for self-authentication arguments.
pub fn my_uid() -> u32 {
    nix::unistd::getuid().as_raw()
}
