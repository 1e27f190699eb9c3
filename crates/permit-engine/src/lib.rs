//! Authorization decision engine.
//!
//! Combines an action's implicit default policy, administrator rule files,
//! and persisted explicit grants into a per-call [`Verdict`](permit_types::Verdict).
//!
//! # Architecture
//!
//! ```text
//! decide(subject, action_id)
//!   │
//!   ├─► CallerTracker ──► uid, (pid, start_time), SessionFacts
//!   ├─► ActionRegistry ──► Action (or UnknownAction error)
//!   │
//!   ├─► local authority module
//!   │     baseline = implicit_{any,inactive,active}
//!   │     rule files may override the baseline
//!   │     explicit grants: lockdown ► deny, positive ► authorize
//!   │
//!   ├─► module stack (Mandatory / Advise combination)
//!   └─► Verdict { NotAuthorized | Challenge{admin_required} | Authorized }
//! ```
//!
//! The engine mutates nothing except consuming a one-shot grant on the
//! authorizing call; all other writes go through the grant protocol.

#![warn(missing_docs)]

pub mod admin;
pub mod directory;
mod engine;
mod error;
pub mod modules;
mod registry;

pub use admin::{AdminResolver, AdminRule, ADMIN_IDENTITIES_ANNOTATION};
pub use directory::{IdentityDirectory, StaticDirectory, UnixDirectory};
pub use engine::DecisionEngine;
pub use error::EngineError;
pub use modules::{DecisionModule, ModuleControl, ModuleEntry};
pub use registry::ActionRegistry;
