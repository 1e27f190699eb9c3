//! Action descriptions.

use crate::ImplicitAuthorization;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named capability protected by policy.
///
/// Actions are owned by the action registry: loaded wholesale from policy
/// files by an external parser, immutable once loaded, and replaced en masse
/// when the policy files change. The three implicit levels select the
/// default policy by session state (no session / inactive / active).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Reverse-DNS action id, e.g. `org.example.restart`.
    pub id: String,
    /// Short human-readable description (what the action does).
    pub description: Option<String>,
    /// Message shown to the user when authentication is requested.
    pub message: Option<String>,
    /// Default policy when the subject has no session.
    pub implicit_any: ImplicitAuthorization,
    /// Default policy for subjects in an inactive session.
    pub implicit_inactive: ImplicitAuthorization,
    /// Default policy for subjects in an active session.
    pub implicit_active: ImplicitAuthorization,
    /// Vendor annotations, e.g. `org.permit.admin-identities`.
    pub annotations: BTreeMap<String, String>,
}

impl Action {
    /// Creates an action with the given implicit defaults and no metadata.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        implicit_any: ImplicitAuthorization,
        implicit_inactive: ImplicitAuthorization,
        implicit_active: ImplicitAuthorization,
    ) -> Self {
        Self {
            id: id.into(),
            description: None,
            message: None,
            implicit_any,
            implicit_inactive,
            implicit_active,
            annotations: BTreeMap::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the authentication message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Adds an annotation.
    #[must_use]
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Selects the implicit baseline for the given session state.
    ///
    /// `None` means the subject has no session at all.
    #[must_use]
    pub fn implicit_for(&self, session_active: Option<bool>) -> ImplicitAuthorization {
        match session_active {
            None => self.implicit_any,
            Some(true) => self.implicit_active,
            Some(false) => self.implicit_inactive,
        }
    }

    /// Looks up an annotation value.
    #[must_use]
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }
}
