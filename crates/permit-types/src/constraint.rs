//! Grant constraints: locality and activity requirements.

use crate::SessionFacts;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An additional requirement a grant must satisfy to apply.
///
/// Serializes to a stable short string used verbatim in grant record files:
/// `"null"`, `"local"`, `"active"` or `"local+active"`.
///
/// # Example
///
/// ```
/// use permit_types::Constraint;
///
/// let c = Constraint::LOCAL_ACTIVE;
/// assert_eq!(c.to_string(), "local+active");
/// let back: Constraint = "local+active".parse().unwrap();
/// assert_eq!(back, c);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Constraint {
    /// The session must be on a local seat.
    pub require_local: bool,
    /// The session must be the active one on its seat.
    pub require_active: bool,
}

impl Constraint {
    /// No requirement.
    pub const NONE: Self = Self {
        require_local: false,
        require_active: false,
    };
    /// Requires a local session.
    pub const LOCAL: Self = Self {
        require_local: true,
        require_active: false,
    };
    /// Requires an active session.
    pub const ACTIVE: Self = Self {
        require_local: false,
        require_active: true,
    };
    /// Requires a local and active session.
    pub const LOCAL_ACTIVE: Self = Self {
        require_local: true,
        require_active: true,
    };

    /// Whether the given session facts satisfy this constraint.
    ///
    /// `None` facts satisfy only the empty constraint: a grant that requires
    /// locality or activity cannot apply to a subject with no session.
    #[must_use]
    pub fn satisfied_by(&self, facts: Option<&SessionFacts>) -> bool {
        match facts {
            Some(f) => {
                (!self.require_local || f.is_local) && (!self.require_active || f.is_active)
            }
            None => !self.require_local && !self.require_active,
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match (self.require_local, self.require_active) {
            (false, false) => "null",
            (true, false) => "local",
            (false, true) => "active",
            (true, true) => "local+active",
        };
        f.write_str(s)
    }
}

/// Error parsing a constraint string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized constraint: '{0}'")]
pub struct ParseConstraintError(pub String);

impl FromStr for Constraint {
    type Err = ParseConstraintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "null" => Ok(Self::NONE),
            "local" => Ok(Self::LOCAL),
            "active" => Ok(Self::ACTIVE),
            "local+active" => Ok(Self::LOCAL_ACTIVE),
            other => Err(ParseConstraintError(other.to_string())),
        }
    }
}
