//! The admin resolver.
//!
//! Decides *who* counts as an administrator for an action, which the grant
//! protocol uses to pick the authenticating identity for an admin-required
//! challenge.

use crate::IdentityDirectory;
use permit_types::{Action, Identity};
use std::sync::Arc;
use tracing::warn;

/// Annotation key an action can carry to override the admin rule set.
pub const ADMIN_IDENTITIES_ANNOTATION: &str = "org.permit.admin-identities";

/// One rule in the ordered admin configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminRule {
    /// Members of this group are administrators.
    Group(u32),
    /// This user is an administrator.
    User(u32),
    /// Members of this netgroup are administrators.
    Netgroup(String),
    /// A literal identity list.
    FixedList(Vec<Identity>),
}

impl AdminRule {
    fn identities(&self) -> Vec<Identity> {
        match self {
            Self::Group(gid) => vec![Identity::UnixGroup(*gid)],
            Self::User(uid) => vec![Identity::UnixUser(*uid)],
            Self::Netgroup(name) => vec![Identity::UnixNetgroup(name.clone())],
            Self::FixedList(ids) => ids.clone(),
        }
    }
}

/// Computes the identities that can satisfy an admin challenge.
///
/// Rules are evaluated in declaration order and the first rule yielding a
/// non-empty set wins; there is no merging across rules. An action can
/// override the whole rule set with the
/// [`org.permit.admin-identities`](ADMIN_IDENTITIES_ANNOTATION) annotation,
/// a semicolon-separated identity list.
pub struct AdminResolver {
    rules: Vec<AdminRule>,
    directory: Arc<dyn IdentityDirectory>,
}

impl AdminResolver {
    /// Creates a resolver over the given rules.
    #[must_use]
    pub fn new(rules: Vec<AdminRule>, directory: Arc<dyn IdentityDirectory>) -> Self {
        Self { rules, directory }
    }

    /// The conventional default: root is the administrator.
    #[must_use]
    pub fn root_only(directory: Arc<dyn IdentityDirectory>) -> Self {
        Self::new(vec![AdminRule::User(0)], directory)
    }

    /// The ordered admin identities for an action.
    #[must_use]
    pub fn admin_identities(&self, action: &Action) -> Vec<Identity> {
        if let Some(spec) = action.annotation(ADMIN_IDENTITIES_ANNOTATION) {
            let parsed = parse_identity_list(spec);
            if !parsed.is_empty() {
                return parsed;
            }
            warn!(
                action_id = %action.id,
                spec,
                "admin-identities annotation parsed to nothing, falling back to rules"
            );
        }

        self.rules
            .iter()
            .map(AdminRule::identities)
            .find(|ids| !ids.is_empty())
            .unwrap_or_default()
    }

    /// Whether a uid matches any of the given admin identities.
    #[must_use]
    pub fn is_admin(&self, uid: u32, admins: &[Identity]) -> bool {
        let mine = self.directory.identities_of(uid);
        admins.iter().any(|admin| mine.contains(admin))
    }
}

fn parse_identity_list(spec: &str) -> Vec<Identity> {
    spec.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse() {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(spec = s, error = %e, "bad identity in admin annotation");
                None
            }
        })
        .collect()
}
