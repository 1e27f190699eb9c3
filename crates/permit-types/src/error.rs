//! Unified error-code interface.
//!
//! Every permit error enum implements [`ErrorCode`] so that front-ends and
//! logs can report a stable machine-readable code alongside the human
//! message, and so callers can tell transient conditions (a subject that
//! vanished mid-query) from permanent ones (an unknown action).

/// Stable machine-readable code and recoverability for an error.
///
/// # Code format
///
/// - **UPPER_SNAKE_CASE**, prefixed by domain: `"STORE_CORRUPT_RECORD"`,
///   `"TRACKER_SUBJECT_VANISHED"`, `"GRANT_CANCELLED"`.
/// - **Stable**: once published a code never changes meaning.
///
/// # Recoverability
///
/// Recoverable means retrying may succeed (subject vanished mid-query,
/// helper died early). Not recoverable means retrying cannot help
/// (unknown action, privilege violation).
///
/// # Example
///
/// ```
/// use permit_types::ErrorCode;
///
/// #[derive(Debug)]
/// enum QueryError {
///     Vanished,
///     UnknownAction(String),
/// }
///
/// impl ErrorCode for QueryError {
///     fn code(&self) -> &'static str {
///         match self {
///             Self::Vanished => "QUERY_SUBJECT_VANISHED",
///             Self::UnknownAction(_) => "QUERY_UNKNOWN_ACTION",
///         }
///     }
///
///     fn is_recoverable(&self) -> bool {
///         matches!(self, Self::Vanished)
///     }
/// }
///
/// assert!(QueryError::Vanished.is_recoverable());
/// ```
pub trait ErrorCode {
    /// Returns the stable machine-readable code.
    fn code(&self) -> &'static str;

    /// Returns whether retrying the operation may succeed.
    fn is_recoverable(&self) -> bool;
}

/// Asserts that an error code follows the workspace conventions.
///
/// Checks the code is non-empty, UPPER_SNAKE_CASE and carries the expected
/// domain prefix. Intended for use in each crate's error tests.
///
/// # Panics
///
/// Panics with a descriptive message when any check fails.
pub fn assert_error_code<E: ErrorCode>(err: &E, expected_prefix: &str) {
    let code = err.code();
    assert!(!code.is_empty(), "error code must not be empty");
    assert!(
        code.starts_with(expected_prefix),
        "error code '{code}' must start with prefix '{expected_prefix}'"
    );
    assert!(
        is_upper_snake_case(code),
        "error code '{code}' must be UPPER_SNAKE_CASE"
    );
}

/// Asserts conventions for every variant of an error enum at once.
pub fn assert_error_codes<E: ErrorCode>(errors: &[E], expected_prefix: &str) {
    for err in errors {
        assert_error_code(err, expected_prefix);
    }
}

fn is_upper_snake_case(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with('_')
        && !s.ends_with('_')
        && !s.contains("__")
        && s.chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    enum TestError {
        Transient,
        Permanent,
    }

    impl ErrorCode for TestError {
        fn code(&self) -> &'static str {
            match self {
                Self::Transient => "TEST_TRANSIENT",
                Self::Permanent => "TEST_PERMANENT",
            }
        }

        fn is_recoverable(&self) -> bool {
            matches!(self, Self::Transient)
        }
    }

    #[test]
    fn codes_and_recoverability() {
        assert_eq!(TestError::Transient.code(), "TEST_TRANSIENT");
        assert!(TestError::Transient.is_recoverable());
        assert!(!TestError::Permanent.is_recoverable());
    }

    #[test]
    fn conventions_hold() {
        assert_error_codes(&[TestError::Transient, TestError::Permanent], "TEST_");
    }

    #[test]
    #[should_panic(expected = "must start with prefix")]
    fn wrong_prefix_panics() {
        assert_error_code(&TestError::Transient, "OTHER_");
    }

    #[test]
    fn snake_case_checker() {
        assert!(is_upper_snake_case("STORE_CORRUPT"));
        assert!(!is_upper_snake_case("store_corrupt"));
        assert!(!is_upper_snake_case("_STORE"));
        assert!(!is_upper_snake_case("STORE__X"));
        assert!(!is_upper_snake_case(""));
    }
}
