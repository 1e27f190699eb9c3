//! The on-disk grant record codec.
//!
//! A grant record file holds exactly one line:
//!
//! ```text
//! grant:<action_id>:<created_at>:<granting_uid>:<constraint>
//! grant-negative:<action_id>:<created_at>:<granting_uid>:<constraint>
//! ```
//!
//! The *file name* carries the rest of the entry key (holder uid, scope and
//! action, see [`Scope::relative_path`]); the line carries the audit
//! metadata and the constraint. Presence of the file is what makes the
//! grant exist, so insertion and revocation are single-file operations.

use permit_types::{Constraint, Scope};
use thiserror::Error;

/// Decoded contents of one grant record file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantRecord {
    /// The action the grant is for.
    pub action_id: String,
    /// Creation time, unix seconds.
    pub created_at: i64,
    /// The uid of the administrator (or self) who granted it.
    pub granting_uid: u32,
    /// Locality/activity requirement.
    pub constraint: Constraint,
    /// Lockdown flag.
    pub negative: bool,
}

/// Why a record line failed to decode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordParseError {
    /// The line did not start with `grant:` or `grant-negative:`.
    #[error("line does not start with a grant tag")]
    BadTag,
    /// The line had fewer than five colon-separated fields.
    #[error("expected 5 fields, found {0}")]
    FieldCount(usize),
    /// A numeric field did not parse.
    #[error("field '{0}' is not a number")]
    BadNumber(&'static str),
    /// The constraint field was not one of the four known strings.
    #[error("unrecognized constraint '{0}'")]
    BadConstraint(String),
    /// The action id field was empty.
    #[error("empty action id")]
    EmptyAction,
}

impl GrantRecord {
    /// Encodes the record as its single-line file content.
    #[must_use]
    pub fn encode(&self) -> String {
        let tag = if self.negative {
            "grant-negative"
        } else {
            "grant"
        };
        format!(
            "{tag}:{}:{}:{}:{}\n",
            self.action_id, self.created_at, self.granting_uid, self.constraint
        )
    }

    /// Decodes a record from file content.
    ///
    /// Only the first line is significant; anything after it is ignored so
    /// a future format revision can append fields without breaking older
    /// readers.
    ///
    /// # Errors
    ///
    /// [`RecordParseError`] describing the first field that failed.
    pub fn parse(content: &str) -> Result<Self, RecordParseError> {
        let line = content.lines().next().unwrap_or("").trim_end();
        let fields: Vec<&str> = line.split(':').collect();
        if fields.len() != 5 {
            if fields.first().is_some_and(|t| !t.starts_with("grant")) {
                return Err(RecordParseError::BadTag);
            }
            return Err(RecordParseError::FieldCount(fields.len()));
        }

        let negative = match fields[0] {
            "grant" => false,
            "grant-negative" => true,
            _ => return Err(RecordParseError::BadTag),
        };
        if fields[1].is_empty() {
            return Err(RecordParseError::EmptyAction);
        }
        let created_at = fields[2]
            .parse()
            .map_err(|_| RecordParseError::BadNumber("created_at"))?;
        let granting_uid = fields[3]
            .parse()
            .map_err(|_| RecordParseError::BadNumber("granting_uid"))?;
        let constraint = fields[4]
            .parse()
            .map_err(|_| RecordParseError::BadConstraint(fields[4].to_string()))?;

        Ok(Self {
            action_id: fields[1].to_string(),
            created_at,
            granting_uid,
            constraint,
            negative,
        })
    }
}

/// Reconstructs the scope encoded in a record file name.
///
/// `rel` is the path relative to the partition root, as produced by
/// [`Scope::relative_path`] for the given holder uid and the record's
/// action id. Returns `None` when the name does not decode, which callers
/// treat as a foreign file to skip.
#[must_use]
pub fn scope_from_path(rel: &str, action_id: &str) -> Option<(u32, Scope)> {
    // durable layout: uid<U>/<action>.grant
    if let Some((dir, file)) = rel.split_once('/') {
        let uid = dir.strip_prefix("uid")?.parse().ok()?;
        if file == format!("{action_id}.grant") {
            return Some((uid, Scope::Always { uid }));
        }
        return None;
    }

    // ephemeral layout: uid<U>-<scope-key>-<action>.grant
    let stem = rel
        .strip_suffix(".grant")?
        .strip_suffix(action_id)?
        .strip_suffix('-')?;
    let rest = stem.strip_prefix("uid")?;
    let (uid_str, key) = rest.split_once('-')?;
    let uid = uid_str.parse().ok()?;

    let scope = if let Some(proc_key) = key.strip_prefix("pid-oneshot-") {
        let (pid, start_time) = split_pid_key(proc_key)?;
        Scope::OneShotProcess { pid, start_time }
    } else if let Some(proc_key) = key.strip_prefix("pid-") {
        let (pid, start_time) = split_pid_key(proc_key)?;
        Scope::Process { pid, start_time }
    } else if let Some(session_id) = key.strip_prefix("session-") {
        Scope::Session {
            session_id: session_id.to_string(),
        }
    } else {
        return None;
    };
    Some((uid, scope))
}

fn split_pid_key(key: &str) -> Option<(u32, u64)> {
    let (pid, start) = key.split_once('@')?;
    Some((pid.parse().ok()?, start.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> GrantRecord {
        GrantRecord {
            action_id: "org.example.restart".into(),
            created_at: 1_700_000_000,
            granting_uid: 0,
            constraint: Constraint::LOCAL_ACTIVE,
            negative: false,
        }
    }

    #[test]
    fn encode_positive_and_negative() {
        assert_eq!(
            record().encode(),
            "grant:org.example.restart:1700000000:0:local+active\n"
        );
        let mut neg = record();
        neg.negative = true;
        assert!(neg.encode().starts_with("grant-negative:"));
    }

    #[test]
    fn parse_roundtrip() {
        let r = record();
        assert_eq!(GrantRecord::parse(&r.encode()).unwrap(), r);
    }

    #[test]
    fn parse_ignores_trailing_lines() {
        let content = format!("{}future: extension\n", record().encode());
        assert_eq!(GrantRecord::parse(&content).unwrap(), record());
    }

    #[test]
    fn parse_rejects_malformed_lines() {
        assert!(matches!(
            GrantRecord::parse("lease:a.b:0:0:null"),
            Err(RecordParseError::BadTag)
        ));
        assert!(matches!(
            GrantRecord::parse("grant:a.b:0:0"),
            Err(RecordParseError::FieldCount(4))
        ));
        assert!(matches!(
            GrantRecord::parse("grant:a.b:soon:0:null"),
            Err(RecordParseError::BadNumber("created_at"))
        ));
        assert!(matches!(
            GrantRecord::parse("grant:a.b:0:0:remote"),
            Err(RecordParseError::BadConstraint(_))
        ));
        assert!(matches!(
            GrantRecord::parse("grant::0:0:null"),
            Err(RecordParseError::EmptyAction)
        ));
        assert!(GrantRecord::parse("").is_err());
    }

    #[test]
    fn scope_roundtrips_through_path() {
        let cases = [
            Scope::OneShotProcess {
                pid: 9,
                start_time: 77,
            },
            Scope::Process {
                pid: 321,
                start_time: 99,
            },
            Scope::Session {
                session_id: "c2-seat0".into(),
            },
            Scope::Always { uid: 1000 },
        ];
        for scope in cases {
            let rel = scope.relative_path(1000, "org.example.restart");
            let (uid, parsed) = scope_from_path(&rel, "org.example.restart").unwrap();
            assert_eq!(uid, 1000);
            assert_eq!(parsed, scope);
        }
    }

    #[test]
    fn scope_from_foreign_path_is_none() {
        assert!(scope_from_path("README", "a.b").is_none());
        assert!(scope_from_path("uid1000-lease-5-a.b.grant", "a.b").is_none());
        assert!(scope_from_path("uid1000/other.action.grant", "a.b").is_none());
        assert!(scope_from_path("uidx-pid-1@2-a.b.grant", "a.b").is_none());
    }
}
