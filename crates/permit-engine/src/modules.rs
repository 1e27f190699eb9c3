//! Decision module stacking.
//!
//! A deployment can stack several decision modules, each producing an
//! [`ImplicitAuthorization`] opinion for the call. Modules are a closed
//! enum consulted in declared order; there are no callbacks.

use permit_types::ImplicitAuthorization;

/// How a module's opinion combines with the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleControl {
    /// The module's known result replaces the combined result outright;
    /// later mandatory modules may tighten or loosen it.
    Mandatory,
    /// The module may only move the combined result toward *less* strict.
    Advise,
}

/// A decision module kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionModule {
    /// The store-backed local authority (implicit policy, rule files,
    /// explicit grants).
    LocalAuthority,
    /// A constant opinion, for configuration pinning and tests.
    Fixed(ImplicitAuthorization),
}

/// One configured stack slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleEntry {
    /// Combination mode.
    pub control: ModuleControl,
    /// The module.
    pub module: DecisionModule,
}

impl ModuleEntry {
    /// The default single-module stack: the local authority, mandatory.
    #[must_use]
    pub fn default_stack() -> Vec<Self> {
        vec![Self {
            control: ModuleControl::Mandatory,
            module: DecisionModule::LocalAuthority,
        }]
    }
}

/// Combines per-module opinions in declared order.
///
/// `Unknown` opinions are skipped (the module had nothing to say). A
/// mandatory module's known opinion sets the result wholesale; an advisory
/// module's opinion applies only when it is more lenient than what is
/// already combined.
#[must_use]
pub fn combine(
    opinions: impl IntoIterator<Item = (ModuleControl, ImplicitAuthorization)>,
) -> ImplicitAuthorization {
    let mut combined = ImplicitAuthorization::Unknown;
    for (control, opinion) in opinions {
        if !opinion.is_known() {
            continue;
        }
        combined = match control {
            ModuleControl::Mandatory => opinion,
            ModuleControl::Advise => combined.most_lenient(opinion),
        };
    }
    combined
}

#[cfg(test)]
mod tests {
    use super::*;
    use ImplicitAuthorization::*;
    use ModuleControl::*;

    #[test]
    fn empty_stack_is_unknown() {
        assert_eq!(combine([]), Unknown);
    }

    #[test]
    fn later_mandatory_overrides_either_direction() {
        assert_eq!(combine([(Mandatory, Authorized), (Mandatory, AuthAdmin)]), AuthAdmin);
        assert_eq!(combine([(Mandatory, AuthAdmin), (Mandatory, Authorized)]), Authorized);
    }

    #[test]
    fn advise_only_loosens() {
        assert_eq!(combine([(Mandatory, AuthAdmin), (Advise, Authorized)]), Authorized);
        assert_eq!(combine([(Mandatory, AuthSelf), (Advise, NotAuthorized)]), AuthSelf);
    }

    #[test]
    fn unknown_opinions_are_skipped() {
        assert_eq!(combine([(Mandatory, Unknown), (Advise, AuthSelf)]), AuthSelf);
        assert_eq!(combine([(Mandatory, AuthAdmin), (Mandatory, Unknown)]), AuthAdmin);
    }

    #[test]
    fn advise_before_any_mandatory_still_counts() {
        assert_eq!(combine([(Advise, AuthSelf)]), AuthSelf);
    }
}
