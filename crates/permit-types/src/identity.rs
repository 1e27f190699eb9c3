//! Identities that can hold authorizations.
//!
//! An [`Identity`] names *who* a grant or rule applies to. Equality is
//! structural; whether a concrete user *matches* a group or netgroup
//! identity is a separate relation resolved by the engine through its
//! identity directory seam, never by this type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A user, group or netgroup that can hold an authorization.
///
/// # Textual form
///
/// The canonical textual form is the one used in rule files:
///
/// ```
/// use permit_types::Identity;
///
/// let id: Identity = "unix-user:1000".parse().unwrap();
/// assert_eq!(id, Identity::UnixUser(1000));
/// assert_eq!(id.to_string(), "unix-user:1000");
///
/// let grp: Identity = "unix-group:27".parse().unwrap();
/// assert_eq!(grp, Identity::UnixGroup(27));
///
/// let ng: Identity = "unix-netgroup:admins".parse().unwrap();
/// assert_eq!(ng, Identity::UnixNetgroup("admins".into()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Identity {
    /// A single Unix user, by uid.
    UnixUser(u32),
    /// All members of a Unix group, by gid.
    UnixGroup(u32),
    /// All members of a NIS netgroup, by name.
    UnixNetgroup(String),
}

impl Identity {
    /// Returns the uid when this is a user identity.
    #[must_use]
    pub fn uid(&self) -> Option<u32> {
        match self {
            Self::UnixUser(uid) => Some(*uid),
            _ => None,
        }
    }

    /// Returns `true` for user identities.
    #[must_use]
    pub fn is_user(&self) -> bool {
        matches!(self, Self::UnixUser(_))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnixUser(uid) => write!(f, "unix-user:{uid}"),
            Self::UnixGroup(gid) => write!(f, "unix-group:{gid}"),
            Self::UnixNetgroup(name) => write!(f, "unix-netgroup:{name}"),
        }
    }
}

/// Error parsing an identity string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityParseError {
    /// The string had no recognized `unix-*:` prefix.
    #[error("identity '{0}' lacks a unix-user:/unix-group:/unix-netgroup: prefix")]
    UnknownPrefix(String),
    /// The uid/gid part was not a number.
    #[error("identity '{0}' has a non-numeric id")]
    BadNumber(String),
    /// The name or id part was empty.
    #[error("identity '{0}' has an empty value")]
    Empty(String),
}

impl FromStr for Identity {
    type Err = IdentityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_num = |rest: &str| -> Result<u32, IdentityParseError> {
            if rest.is_empty() {
                return Err(IdentityParseError::Empty(s.to_string()));
            }
            rest.parse()
                .map_err(|_| IdentityParseError::BadNumber(s.to_string()))
        };

        if let Some(rest) = s.strip_prefix("unix-user:") {
            Ok(Self::UnixUser(parse_num(rest)?))
        } else if let Some(rest) = s.strip_prefix("unix-group:") {
            Ok(Self::UnixGroup(parse_num(rest)?))
        } else if let Some(rest) = s.strip_prefix("unix-netgroup:") {
            if rest.is_empty() {
                Err(IdentityParseError::Empty(s.to_string()))
            } else {
                Ok(Self::UnixNetgroup(rest.to_string()))
            }
        } else {
            Err(IdentityParseError::UnknownPrefix(s.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_roundtrip() {
        for id in [
            Identity::UnixUser(0),
            Identity::UnixGroup(1000),
            Identity::UnixNetgroup("staff".into()),
        ] {
            let parsed: Identity = id.to_string().parse().unwrap();
            assert_eq!(parsed, id);
        }
    }

    #[test]
    fn equality_is_structural() {
        assert_eq!(Identity::UnixUser(5), Identity::UnixUser(5));
        assert_ne!(Identity::UnixUser(5), Identity::UnixGroup(5));
        assert_ne!(
            Identity::UnixNetgroup("a".into()),
            Identity::UnixNetgroup("b".into())
        );
    }

    #[test]
    fn parse_errors() {
        assert!(matches!(
            "wheel".parse::<Identity>(),
            Err(IdentityParseError::UnknownPrefix(_))
        ));
        assert!(matches!(
            "unix-user:alice".parse::<Identity>(),
            Err(IdentityParseError::BadNumber(_))
        ));
        assert!(matches!(
            "unix-group:".parse::<Identity>(),
            Err(IdentityParseError::Empty(_))
        ));
        assert!(matches!(
            "unix-netgroup:".parse::<Identity>(),
            Err(IdentityParseError::Empty(_))
        ));
    }

    #[test]
    fn uid_accessor() {
        assert_eq!(Identity::UnixUser(42).uid(), Some(42));
        assert_eq!(Identity::UnixGroup(42).uid(), None);
        assert!(Identity::UnixUser(0).is_user());
        assert!(!Identity::UnixNetgroup("x".into()).is_user());
    }
}
