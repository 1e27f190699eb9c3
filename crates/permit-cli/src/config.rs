//! Layered CLI configuration.
//!
//! # Load Order
//!
//! 1. Default values (compile-time)
//! 2. System config (`/etc/permit/config.toml`, or `--config`)
//! 3. Environment variables (`PERMIT_*`)
//!
//! Each layer overrides the previous.

use permit_grant::helper::{
    DEFAULT_AUTH_BACKEND, DEFAULT_DURABLE_DIR, DEFAULT_EPHEMERAL_DIR, DEFAULT_RULES_DIR,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Default system config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/permit/config.toml";
/// Default action definitions file.
pub const DEFAULT_ACTIONS_PATH: &str = "/etc/permit/actions.json";
/// Default helper binary location.
pub const DEFAULT_HELPER_PATH: &str = "/usr/libexec/permit-grant-helper";

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but cannot be read.
    #[error("cannot read config file {path}: {source}")]
    Unreadable {
        /// The config file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this schema.
    #[error("invalid config file {path}: {source}")]
    Invalid {
        /// The config file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: toml::de::Error,
    },
}

/// Resolved CLI configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PermitConfig {
    /// Ephemeral grant partition directory.
    pub ephemeral_dir: PathBuf,
    /// Durable grant partition directory.
    pub durable_dir: PathBuf,
    /// Administrator rules directory.
    pub rules_dir: PathBuf,
    /// Action definitions file (JSON list of actions).
    pub actions_file: PathBuf,
    /// Grant helper binary.
    pub helper_path: PathBuf,
    /// Authentication backend command for the helper.
    pub auth_backend: PathBuf,
    /// Admin group gid; members can satisfy admin challenges.
    pub admin_group: u32,
}

impl Default for PermitConfig {
    fn default() -> Self {
        Self {
            ephemeral_dir: DEFAULT_EPHEMERAL_DIR.into(),
            durable_dir: DEFAULT_DURABLE_DIR.into(),
            rules_dir: DEFAULT_RULES_DIR.into(),
            actions_file: DEFAULT_ACTIONS_PATH.into(),
            helper_path: DEFAULT_HELPER_PATH.into(),
            auth_backend: DEFAULT_AUTH_BACKEND.into(),
            admin_group: 0,
        }
    }
}

impl PermitConfig {
    /// Loads configuration: defaults, then the config file (if present),
    /// then `PERMIT_*` environment variables.
    ///
    /// A missing config file is fine; an unreadable or invalid one is not.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] describing the file problem.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(SYSTEM_CONFIG_PATH));

        let mut config = match std::fs::read_to_string(&path) {
            Ok(content) => {
                toml::from_str(&content).map_err(|source| ConfigError::Invalid {
                    path: path.clone(),
                    source,
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                Self::default()
            }
            Err(source) => return Err(ConfigError::Unreadable { path, source }),
        };

        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        let overrides: [(&str, &mut PathBuf); 6] = [
            ("PERMIT_EPHEMERAL_DIR", &mut self.ephemeral_dir),
            ("PERMIT_DURABLE_DIR", &mut self.durable_dir),
            ("PERMIT_RULES_DIR", &mut self.rules_dir),
            ("PERMIT_ACTIONS_FILE", &mut self.actions_file),
            ("PERMIT_HELPER", &mut self.helper_path),
            ("PERMIT_AUTH_BACKEND", &mut self.auth_backend),
        ];
        for (var, slot) in overrides {
            if let Some(value) = std::env::var_os(var) {
                *slot = PathBuf::from(value);
            }
        }
        if let Ok(value) = std::env::var("PERMIT_ADMIN_GROUP") {
            if let Ok(gid) = value.parse() {
                self.admin_group = gid;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_system_paths() {
        let config = PermitConfig::default();
        assert_eq!(config.ephemeral_dir, PathBuf::from("/run/permit/grants"));
        assert_eq!(config.durable_dir, PathBuf::from("/var/lib/permit/grants"));
        assert_eq!(config.admin_group, 0);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = PermitConfig::load(Some(Path::new("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config.rules_dir, PathBuf::from("/etc/permit/rules.d"));
    }

    #[test]
    fn file_layer_overrides_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "ephemeral_dir = \"/tmp/permit-run\"\nadmin_group = 27\n",
        )
        .unwrap();

        let config = PermitConfig::load(Some(&path)).unwrap();
        assert_eq!(config.ephemeral_dir, PathBuf::from("/tmp/permit-run"));
        assert_eq!(config.admin_group, 27);
        // untouched keys keep their defaults
        assert_eq!(config.durable_dir, PathBuf::from("/var/lib/permit/grants"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "ephemral_dir = \"/oops\"\n").unwrap();
        assert!(matches!(
            PermitConfig::load(Some(&path)),
            Err(ConfigError::Invalid { .. })
        ));
    }
}
