//! Interactive grant protocol.
//!
//! Creates new explicit grants through privilege-separated interactive
//! authentication:
//!
//! ```text
//! caller loop                helper process             backend (PAM shim)
//! ───────────                ──────────────             ──────────────────
//! Escalation::run ──spawn──► permit-grant-helper ──spawn──► auth backend
//!      ▲                          │    ▲                       │
//!      │  PAM_* prompt lines      │    │  relayed verbatim     │
//! Conversation ◄──────────────────┘    └───────────────────────┘
//!      │  answers ────────────────►        ──────────────────►
//!                                 persist grant, then SUCCESS/FAILURE
//! ```
//!
//! The helper re-validates the invoker's privilege itself, delegates the
//! authentication conversation to an external backend command speaking the
//! same protocol, and persists the resulting grant only after the backend
//! reports success — so killing the helper at any earlier point leaves the
//! store untouched.

#![warn(missing_docs)]

mod conversation;
mod error;
mod escalation;
pub mod helper;
pub mod protocol;

pub use conversation::{ConsoleConversation, Conversation, ScriptedConversation};
pub use error::GrantError;
pub use escalation::{CancelHandle, Escalation, EscalationOutcome, EscalationRequest};
pub use protocol::HelperLine;
