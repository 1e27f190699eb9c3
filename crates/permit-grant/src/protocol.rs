//! The helper line protocol.
//!
//! The escalation flow, the helper and the authentication backend all talk
//! the same newline-delimited protocol on stdio, one message per line:
//!
//! ```text
//! PAM_PROMPT_ECHO_OFF <prompt>    ask, hide the answer (passwords)
//! PAM_PROMPT_ECHO_ON <prompt>     ask, echo the answer
//! PAM_ERROR_MSG <message>         show an error, no answer expected
//! PAM_TEXT_INFO <message>         show information, no answer expected
//! SUCCESS                         terminal: authentication succeeded
//! FAILURE                         terminal: authentication failed
//! ```
//!
//! Prompt answers flow back as bare lines. The terminal lines end the
//! conversation; anything else is a protocol error.

use crate::GrantError;
use std::fmt;

/// One message on the helper wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelperLine {
    /// Ask for a hidden answer.
    PromptEchoOff(String),
    /// Ask for a visible answer.
    PromptEchoOn(String),
    /// Show an error message.
    ErrorMsg(String),
    /// Show an informational message.
    TextInfo(String),
    /// Terminal: authentication (and any persistence) succeeded.
    Success,
    /// Terminal: authentication failed.
    Failure,
}

impl HelperLine {
    /// Parses one line off the wire.
    ///
    /// # Errors
    ///
    /// [`GrantError::Protocol`] for anything that is not one of the six
    /// message forms.
    pub fn parse(line: &str) -> Result<Self, GrantError> {
        let line = line.trim_end_matches(['\r', '\n']);
        if let Some(prompt) = line.strip_prefix("PAM_PROMPT_ECHO_OFF ") {
            return Ok(Self::PromptEchoOff(prompt.to_string()));
        }
        if let Some(prompt) = line.strip_prefix("PAM_PROMPT_ECHO_ON ") {
            return Ok(Self::PromptEchoOn(prompt.to_string()));
        }
        if let Some(msg) = line.strip_prefix("PAM_ERROR_MSG ") {
            return Ok(Self::ErrorMsg(msg.to_string()));
        }
        if let Some(msg) = line.strip_prefix("PAM_TEXT_INFO ") {
            return Ok(Self::TextInfo(msg.to_string()));
        }
        match line {
            "SUCCESS" => Ok(Self::Success),
            "FAILURE" => Ok(Self::Failure),
            other => Err(GrantError::Protocol {
                line: other.to_string(),
            }),
        }
    }

    /// Whether this line ends the conversation.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }

    /// Whether this line expects an answer back.
    #[must_use]
    pub fn expects_answer(&self) -> bool {
        matches!(self, Self::PromptEchoOff(_) | Self::PromptEchoOn(_))
    }
}

impl fmt::Display for HelperLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PromptEchoOff(prompt) => write!(f, "PAM_PROMPT_ECHO_OFF {prompt}"),
            Self::PromptEchoOn(prompt) => write!(f, "PAM_PROMPT_ECHO_ON {prompt}"),
            Self::ErrorMsg(msg) => write!(f, "PAM_ERROR_MSG {msg}"),
            Self::TextInfo(msg) => write!(f, "PAM_TEXT_INFO {msg}"),
            Self::Success => f.write_str("SUCCESS"),
            Self::Failure => f.write_str("FAILURE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_all_forms() {
        assert_eq!(
            HelperLine::parse("PAM_PROMPT_ECHO_OFF Password: ").unwrap(),
            HelperLine::PromptEchoOff("Password: ".into())
        );
        assert_eq!(
            HelperLine::parse("PAM_PROMPT_ECHO_ON Login: ").unwrap(),
            HelperLine::PromptEchoOn("Login: ".into())
        );
        assert_eq!(
            HelperLine::parse("PAM_ERROR_MSG try again\n").unwrap(),
            HelperLine::ErrorMsg("try again".into())
        );
        assert_eq!(
            HelperLine::parse("PAM_TEXT_INFO almost there").unwrap(),
            HelperLine::TextInfo("almost there".into())
        );
        assert_eq!(HelperLine::parse("SUCCESS").unwrap(), HelperLine::Success);
        assert_eq!(HelperLine::parse("FAILURE\n").unwrap(), HelperLine::Failure);
    }

    #[test]
    fn display_roundtrip() {
        for line in [
            HelperLine::PromptEchoOff("p".into()),
            HelperLine::PromptEchoOn("p".into()),
            HelperLine::ErrorMsg("m".into()),
            HelperLine::TextInfo("m".into()),
            HelperLine::Success,
            HelperLine::Failure,
        ] {
            assert_eq!(HelperLine::parse(&line.to_string()).unwrap(), line);
        }
    }

    #[test]
    fn rejects_unknown_lines() {
        assert!(HelperLine::parse("HELLO").is_err());
        assert!(HelperLine::parse("").is_err());
        // prefixes require the trailing space
        assert!(HelperLine::parse("PAM_PROMPT_ECHO_OFF").is_err());
        // terminal keywords take no payload
        assert!(HelperLine::parse("SUCCESS but actually").is_err());
    }

    #[test]
    fn classification() {
        assert!(HelperLine::Success.is_terminal());
        assert!(HelperLine::Failure.is_terminal());
        assert!(!HelperLine::TextInfo("x".into()).is_terminal());
        assert!(HelperLine::PromptEchoOff("x".into()).expects_answer());
        assert!(!HelperLine::ErrorMsg("x".into()).expects_answer());
    }
}
