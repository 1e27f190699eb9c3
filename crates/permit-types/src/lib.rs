//! Core value types for the permit authorization engine.
//!
//! This crate provides the foundational data model shared by every other
//! permit crate. It has no I/O and no runtime dependencies, so it is safe
//! to depend on from helpers, front-ends and tests alike.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Value Layer                               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  permit-types   : Identity, Subject, Scope, Verdict ◄── HERE │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Engine Layer                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  permit-tracker : caller/session facts                       │
//! │  permit-store   : explicit grants & rule files               │
//! │  permit-engine  : decision algorithm                         │
//! │  permit-grant   : interactive escalation                     │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Frontend Layer                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  permit-cli     : check / list / revoke / lockdown           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Design Principles
//!
//! - **Immutable value records** — subjects, entries and verdicts are plain
//!   `Clone` values with no shared mutable aliasing; registries own the only
//!   mutable state.
//! - **Seams as traits** — [`ProcessTable`] is defined here so that the store
//!   and the tracker can agree on process liveness without depending on each
//!   other.
//! - **Fail closed** — nothing in this crate defaults toward `Authorized`;
//!   invalid input is rejected at construction time.

#![warn(missing_docs)]

pub mod action;
pub mod constraint;
pub mod entry;
pub mod error;
pub mod identity;
pub mod implicit;
pub mod process;
pub mod scope;
pub mod subject;
pub mod verdict;

pub use action::Action;
pub use constraint::Constraint;
pub use entry::AuthorizationEntry;
pub use error::{assert_error_code, assert_error_codes, ErrorCode};
pub use identity::{Identity, IdentityParseError};
pub use implicit::ImplicitAuthorization;
pub use process::ProcessTable;
pub use scope::{PartitionClass, Scope};
pub use subject::{SessionFacts, Subject, SubjectError};
pub use verdict::Verdict;
