//! Implicit authorization levels.
//!
//! Every action declares a default policy for three session states
//! (any, inactive, active). The levels form a total order from most strict
//! to most lenient, which the engine uses when combining stacked decision
//! modules ("most lenient wins" for advisory modules, floor semantics for
//! mandatory ones).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An action's default policy before explicit grants are consulted.
///
/// # Ordering
///
/// Variants are ordered least to most permissive:
///
/// ```text
/// NotAuthorized < AuthAdmin < AuthAdminKeep < AuthSelf < AuthSelfKeep < Authorized
/// ```
///
/// [`Unknown`](Self::Unknown) sorts below everything but is a sentinel, not a
/// policy: it means "this module has no opinion" and is excluded from leniency
/// comparison. Use [`is_known`](Self::is_known) before comparing.
///
/// # Textual form
///
/// The rule-file keywords round-trip through `FromStr`/`Display`:
///
/// ```
/// use permit_types::ImplicitAuthorization;
///
/// let level: ImplicitAuthorization = "auth_admin_keep".parse().unwrap();
/// assert_eq!(level, ImplicitAuthorization::AuthAdminKeep);
/// assert_eq!(level.to_string(), "auth_admin_keep");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum ImplicitAuthorization {
    /// Sentinel: no opinion. Never a valid action default.
    #[default]
    Unknown,
    /// Denied outright; only an explicit grant can allow.
    NotAuthorized,
    /// An administrator must authenticate for every use.
    AuthAdmin,
    /// An administrator must authenticate; the grant may be retained.
    AuthAdminKeep,
    /// The subject's own user must authenticate for every use.
    AuthSelf,
    /// The subject's own user must authenticate; the grant may be retained.
    AuthSelfKeep,
    /// Allowed without authentication.
    Authorized,
}

impl ImplicitAuthorization {
    /// Returns `true` unless this is the [`Unknown`](Self::Unknown) sentinel.
    #[must_use]
    pub fn is_known(self) -> bool {
        self != Self::Unknown
    }

    /// Returns `true` if this level can be upgraded by authentication.
    #[must_use]
    pub fn is_challenge(self) -> bool {
        matches!(
            self,
            Self::AuthAdmin | Self::AuthAdminKeep | Self::AuthSelf | Self::AuthSelfKeep
        )
    }

    /// Returns `true` if authentication must be performed by an administrator
    /// rather than the subject's own user.
    #[must_use]
    pub fn requires_admin(self) -> bool {
        matches!(self, Self::AuthAdmin | Self::AuthAdminKeep)
    }

    /// Returns `true` if a successful authentication may be retained beyond
    /// the single use ("keep" variants).
    #[must_use]
    pub fn retains(self) -> bool {
        matches!(self, Self::AuthAdminKeep | Self::AuthSelfKeep)
    }

    /// The more lenient of two known levels.
    ///
    /// Returns the other operand when either side is `Unknown`.
    #[must_use]
    pub fn most_lenient(self, other: Self) -> Self {
        match (self.is_known(), other.is_known()) {
            (true, true) => self.max(other),
            (true, false) => self,
            (false, _) => other,
        }
    }

    /// The stricter of two known levels.
    ///
    /// Returns the other operand when either side is `Unknown`.
    #[must_use]
    pub fn most_strict(self, other: Self) -> Self {
        match (self.is_known(), other.is_known()) {
            (true, true) => self.min(other),
            (true, false) => self,
            (false, _) => other,
        }
    }

    /// The rule-file keyword for this level.
    ///
    /// # Panics
    ///
    /// Never panics; `Unknown` maps to `"unknown"` (not accepted by
    /// `FromStr`, which only parses the six real keywords).
    #[must_use]
    pub fn as_keyword(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::NotAuthorized => "no",
            Self::AuthAdmin => "auth_admin",
            Self::AuthAdminKeep => "auth_admin_keep",
            Self::AuthSelf => "auth_self",
            Self::AuthSelfKeep => "auth_self_keep",
            Self::Authorized => "yes",
        }
    }
}

impl fmt::Display for ImplicitAuthorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_keyword())
    }
}

/// Error parsing an implicit authorization keyword.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized authorization keyword: '{0}'")]
pub struct ParseImplicitError(pub String);

impl FromStr for ImplicitAuthorization {
    type Err = ParseImplicitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "no" => Ok(Self::NotAuthorized),
            "yes" => Ok(Self::Authorized),
            "auth_self" => Ok(Self::AuthSelf),
            "auth_self_keep" => Ok(Self::AuthSelfKeep),
            "auth_admin" => Ok(Self::AuthAdmin),
            "auth_admin_keep" => Ok(Self::AuthAdminKeep),
            other => Err(ParseImplicitError(other.to_string())),
        }
    }
}
