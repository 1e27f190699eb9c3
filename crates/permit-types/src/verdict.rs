//! Decision verdicts.

use crate::ImplicitAuthorization;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The outcome of a decision call.
///
/// Produced fresh per call and never persisted; only the grants that result
/// from a successful escalation are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// Denied; authentication cannot change the outcome.
    NotAuthorized,
    /// Authentication can upgrade this to `Authorized`.
    Challenge {
        /// Whether an administrator (rather than the subject's own user)
        /// must authenticate.
        admin_required: bool,
    },
    /// Allowed.
    Authorized,
}

impl Verdict {
    /// Maps a final implicit authorization level to a verdict.
    ///
    /// `Unknown` maps to `NotAuthorized`: ambiguity resolves toward the
    /// stricter outcome.
    #[must_use]
    pub fn from_implicit(level: ImplicitAuthorization) -> Self {
        use ImplicitAuthorization::*;
        match level {
            Authorized => Self::Authorized,
            AuthSelf | AuthSelfKeep => Self::Challenge {
                admin_required: false,
            },
            AuthAdmin | AuthAdminKeep => Self::Challenge {
                admin_required: true,
            },
            NotAuthorized | Unknown => Self::NotAuthorized,
        }
    }

    /// Returns `true` for [`Verdict::Authorized`].
    #[must_use]
    pub fn is_authorized(&self) -> bool {
        matches!(self, Self::Authorized)
    }

    /// Returns `true` for either challenge form.
    #[must_use]
    pub fn is_challenge(&self) -> bool {
        matches!(self, Self::Challenge { .. })
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAuthorized => f.write_str("not authorized"),
            Self::Challenge {
                admin_required: true,
            } => f.write_str("challenge (admin)"),
            Self::Challenge {
                admin_required: false,
            } => f.write_str("challenge (self)"),
            Self::Authorized => f.write_str("authorized"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_from_implicit() {
        use ImplicitAuthorization::*;
        assert_eq!(Verdict::from_implicit(Authorized), Verdict::Authorized);
        assert_eq!(
            Verdict::from_implicit(AuthSelf),
            Verdict::Challenge {
                admin_required: false
            }
        );
        assert_eq!(
            Verdict::from_implicit(AuthSelfKeep),
            Verdict::Challenge {
                admin_required: false
            }
        );
        assert_eq!(
            Verdict::from_implicit(AuthAdmin),
            Verdict::Challenge {
                admin_required: true
            }
        );
        assert_eq!(
            Verdict::from_implicit(AuthAdminKeep),
            Verdict::Challenge {
                admin_required: true
            }
        );
        assert_eq!(Verdict::from_implicit(NotAuthorized), Verdict::NotAuthorized);
    }

    #[test]
    fn unknown_resolves_strict() {
        assert_eq!(
            Verdict::from_implicit(ImplicitAuthorization::Unknown),
            Verdict::NotAuthorized
        );
    }

    #[test]
    fn predicates() {
        assert!(Verdict::Authorized.is_authorized());
        assert!(Verdict::Challenge {
            admin_required: true
        }
        .is_challenge());
        assert!(!Verdict::NotAuthorized.is_authorized());
    }
}
