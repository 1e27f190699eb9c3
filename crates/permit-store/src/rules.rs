//! Administrator rule files (`.pkla`).
//!
//! Rule files let an administrator override action defaults for whole
//! identity classes without minting per-user grant records. The format is
//! INI-like stanzas:
//!
//! ```text
//! [let admins reboot]
//! Identity=unix-group:27;unix-user:1000
//! Action=org.example.reboot;org.example.shutdown.*
//! ResultAny=no
//! ResultInactive=auth_admin
//! ResultActive=yes
//! ```
//!
//! Files live in priority subdirectories of the rules root (for example
//! `10-vendor.d/`, `50-local.d/`, `90-mandatory.d/`). Directories are
//! visited in lexicographic order, files within a directory likewise, and
//! stanzas within a file top to bottom. Evaluation takes the *last*
//! matching stanza, so higher-numbered directories override lower ones.

use permit_types::{Identity, ImplicitAuthorization};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// The override a rule stanza supplies, one level per session state.
///
/// A field left at [`ImplicitAuthorization::Unknown`] means the stanza does
/// not override that state and the action's own default applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RuleResult {
    /// Override when session state is not considered.
    pub any: ImplicitAuthorization,
    /// Override for inactive (or remote) sessions.
    pub inactive: ImplicitAuthorization,
    /// Override for locally active sessions.
    pub active: ImplicitAuthorization,
}

impl RuleResult {
    /// Picks the override for a concrete session state.
    ///
    /// Prefers the state-specific field, falling back to `any`. Returns
    /// `None` when neither field is set.
    #[must_use]
    pub fn for_state(&self, is_local_active: bool) -> Option<ImplicitAuthorization> {
        let specific = if is_local_active {
            self.active
        } else {
            self.inactive
        };
        if specific.is_known() {
            return Some(specific);
        }
        self.any.is_known().then_some(self.any)
    }
}

/// One identity pattern from a stanza's `Identity=` line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum IdentityMatch {
    /// `unix-user:*` — any user.
    AnyUser,
    /// A concrete identity.
    Exact(Identity),
}

impl IdentityMatch {
    fn matches(&self, candidates: &[Identity]) -> bool {
        match self {
            Self::AnyUser => candidates.iter().any(Identity::is_user),
            Self::Exact(id) => candidates.contains(id),
        }
    }
}

/// One action pattern from a stanza's `Action=` line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ActionMatch {
    Exact(String),
    /// `org.example.*` — dotted prefix.
    Prefix(String),
}

impl ActionMatch {
    fn parse(spec: &str) -> Self {
        match spec.strip_suffix('*') {
            Some(prefix) => Self::Prefix(prefix.to_string()),
            None => Self::Exact(spec.to_string()),
        }
    }

    fn matches(&self, action_id: &str) -> bool {
        match self {
            Self::Exact(id) => id == action_id,
            Self::Prefix(prefix) => action_id.starts_with(prefix.as_str()),
        }
    }
}

#[derive(Debug, Clone)]
struct Rule {
    name: String,
    identities: Vec<IdentityMatch>,
    actions: Vec<ActionMatch>,
    result: RuleResult,
}

impl Rule {
    fn matches(&self, candidates: &[Identity], action_id: &str) -> bool {
        self.identities.iter().any(|i| i.matches(candidates))
            && self.actions.iter().any(|a| a.matches(action_id))
    }
}

/// All rule stanzas from a rules root, in evaluation order.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// An empty rule set.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads every `.pkla` file under `root`.
    ///
    /// A missing root is an empty set, not an error: rule files are
    /// optional system configuration. Individual files or stanzas that do
    /// not parse are logged and skipped; configuration mistakes must never
    /// take the whole authority down.
    #[must_use]
    pub fn load(root: &Path) -> Self {
        let mut rules = Vec::new();

        let Ok(entries) = fs::read_dir(root) else {
            debug!(root = %root.display(), "no rules directory");
            return Self { rules };
        };

        let mut dirs: Vec<_> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();

        for dir in dirs {
            let Ok(entries) = fs::read_dir(&dir) else {
                warn!(dir = %dir.display(), "unreadable rules directory");
                continue;
            };
            let mut files: Vec<_> = entries
                .filter_map(Result::ok)
                .map(|e| e.path())
                .filter(|p| p.extension().is_some_and(|ext| ext == "pkla"))
                .collect();
            files.sort();

            for file in files {
                match fs::read_to_string(&file) {
                    Ok(content) => parse_file(&file, &content, &mut rules),
                    Err(e) => warn!(file = %file.display(), error = %e, "unreadable rules file"),
                }
            }
        }

        debug!(count = rules.len(), root = %root.display(), "loaded rule stanzas");
        Self { rules }
    }

    /// Number of loaded stanzas.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` when no stanzas are loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Finds the override for the given identities and action, if any.
    ///
    /// The last matching stanza wins wholesale; its unset fields mean "no
    /// override for that state" even if an earlier stanza set them.
    #[must_use]
    pub fn evaluate(&self, candidates: &[Identity], action_id: &str) -> Option<RuleResult> {
        let mut winner = None;
        for rule in &self.rules {
            if rule.matches(candidates, action_id) {
                debug!(rule = %rule.name, action_id, "rule stanza matched");
                winner = Some(rule.result);
            }
        }
        winner
    }
}

fn parse_file(path: &Path, content: &str, out: &mut Vec<Rule>) {
    let mut current: Option<Rule> = None;

    for (lineno, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            finish_stanza(path, current.take(), out);
            current = Some(Rule {
                name: name.to_string(),
                identities: Vec::new(),
                actions: Vec::new(),
                result: RuleResult::default(),
            });
            continue;
        }

        let Some(rule) = current.as_mut() else {
            warn!(file = %path.display(), line = lineno + 1, "directive before first stanza header");
            continue;
        };
        let Some((key, value)) = line.split_once('=') else {
            warn!(file = %path.display(), line = lineno + 1, "line is neither header nor key=value");
            continue;
        };

        match key.trim() {
            "Identity" => {
                for spec in value.split(';').map(str::trim).filter(|s| !s.is_empty()) {
                    if spec == "unix-user:*" {
                        rule.identities.push(IdentityMatch::AnyUser);
                    } else {
                        match spec.parse::<Identity>() {
                            Ok(id) => rule.identities.push(IdentityMatch::Exact(id)),
                            Err(e) => {
                                warn!(file = %path.display(), line = lineno + 1, error = %e, "bad identity");
                            }
                        }
                    }
                }
            }
            "Action" => {
                for spec in value.split(';').map(str::trim).filter(|s| !s.is_empty()) {
                    rule.actions.push(ActionMatch::parse(spec));
                }
            }
            "ResultAny" => parse_level(path, lineno, value, &mut rule.result.any),
            "ResultInactive" => parse_level(path, lineno, value, &mut rule.result.inactive),
            "ResultActive" => parse_level(path, lineno, value, &mut rule.result.active),
            other => {
                warn!(file = %path.display(), line = lineno + 1, key = other, "unknown directive");
            }
        }
    }
    finish_stanza(path, current, out);
}

fn parse_level(path: &Path, lineno: usize, value: &str, slot: &mut ImplicitAuthorization) {
    match value.trim().parse() {
        Ok(level) => *slot = level,
        Err(e) => {
            warn!(file = %path.display(), line = lineno + 1, error = %e, "bad result keyword");
        }
    }
}

fn finish_stanza(path: &Path, stanza: Option<Rule>, out: &mut Vec<Rule>) {
    let Some(rule) = stanza else { return };
    if rule.identities.is_empty() || rule.actions.is_empty() {
        warn!(
            file = %path.display(),
            stanza = %rule.name,
            "stanza lacks Identity or Action, skipping"
        );
        return;
    }
    out.push(rule);
}
