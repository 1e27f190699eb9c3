//! `/proc`-backed process table.

use permit_types::ProcessTable;
use std::path::PathBuf;

/// Reads process start times from the kernel via `/proc/<pid>/stat`.
///
/// The start time is field 22 of the stat line, counted in clock ticks
/// since boot. Field 2 (the comm) is enclosed in parentheses and may itself
/// contain spaces and parentheses, so fields are counted from the *last*
/// closing parenthesis, never by naive whitespace splitting.
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcFs {
    /// Process table rooted at `/proc`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: PathBuf::from("/proc"),
        }
    }

    /// Process table rooted at an alternate directory (tests).
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ProcessTable for ProcFs {
    fn start_time_of(&self, pid: u32) -> Option<u64> {
        let stat = std::fs::read_to_string(self.root.join(pid.to_string()).join("stat")).ok()?;
        parse_start_time(&stat)
    }
}

/// Extracts the start-time field from a `/proc/<pid>/stat` line.
fn parse_start_time(stat: &str) -> Option<u64> {
    // fields 3.. follow the last ')' of the comm field
    let after_comm = &stat[stat.rfind(')')? + 1..];
    // start_time is field 22 overall, so field 20 counting from state
    after_comm.split_whitespace().nth(19)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAT: &str = "1234 (some proc) S 1 1234 1234 0 -1 4194560 1189 0 2 0 4 7 0 0 20 0 1 0 4242424 17530880 581 18446744073709551615 1 1 0 0 0 0 0 0 0 0 0 0 17 3 0 0 0 0 0";

    #[test]
    fn parses_field_22() {
        assert_eq!(parse_start_time(STAT), Some(4_242_424));
    }

    #[test]
    fn survives_parentheses_in_comm() {
        let tricky = STAT.replace("(some proc)", "(we(ird) proc))");
        assert_eq!(parse_start_time(&tricky), Some(4_242_424));
    }

    #[test]
    fn rejects_truncated_line() {
        assert_eq!(parse_start_time("1 (x) S 1 2 3"), None);
        assert_eq!(parse_start_time(""), None);
    }

    #[test]
    fn missing_pid_yields_none() {
        let table = ProcFs::with_root("/nonexistent-proc-root");
        assert_eq!(table.start_time_of(1), None);
    }
}
