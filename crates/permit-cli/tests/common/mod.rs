//! Shared E2E test helpers for the `permit` binary.

use assert_cmd::cargo::cargo_bin_cmd;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::Duration;

/// Default timeout for CLI tests.
pub const TIMEOUT: Duration = Duration::from_secs(10);

/// A store layout plus action definitions in a tempdir.
pub struct CliEnv {
    pub dir: tempfile::TempDir,
}

impl CliEnv {
    /// Creates an env with the given action definitions (JSON list).
    pub fn with_actions(actions_json: &str) -> Self {
        let env = Self {
            dir: tempfile::TempDir::new().expect("tempdir"),
        };
        std::fs::write(env.actions_file(), actions_json).expect("write actions");
        env
    }

    pub fn ephemeral(&self) -> PathBuf {
        self.dir.path().join("run")
    }

    pub fn durable(&self) -> PathBuf {
        self.dir.path().join("lib")
    }

    pub fn rules(&self) -> PathBuf {
        self.dir.path().join("rules.d")
    }

    pub fn actions_file(&self) -> PathBuf {
        self.dir.path().join("actions.json")
    }

    /// Writes an executable script standing in for the grant helper.
    pub fn helper(&self, script: &str) -> PathBuf {
        let path = self.dir.path().join("helper");
        std::fs::write(&path, format!("#!/bin/sh\n{script}")).expect("write helper");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("chmod helper");
        path
    }

    /// Builds a `permit` command wired to this env's store and actions.
    pub fn cmd(&self, args: &[&str]) -> assert_cmd::Command {
        let mut cmd: assert_cmd::Command = cargo_bin_cmd!("permit");
        cmd.timeout(TIMEOUT)
            .args(args)
            .env("PERMIT_EPHEMERAL_DIR", self.ephemeral())
            .env("PERMIT_DURABLE_DIR", self.durable())
            .env("PERMIT_RULES_DIR", self.rules())
            .env("PERMIT_ACTIONS_FILE", self.actions_file());
        cmd
    }
}

/// The current real uid.
pub fn my_uid() -> u32 {
    nix::unistd::getuid().as_raw()
}

/// A complete action definition with the given implicit levels.
pub fn action_json(id: &str, any: &str, inactive: &str, active: &str) -> String {
    format!(
        r#"{{"id": "{id}", "description": null, "message": null,
            "implicit_any": "{any}", "implicit_inactive": "{inactive}",
            "implicit_active": "{active}", "annotations": {{}}}}"#
    )
}
