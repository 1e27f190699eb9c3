//! Caller and session tracking.
//!
//! Resolves transient bus identities into the stable `(pid, start_time,
//! uid, session)` facts the decision engine needs, caches them, and
//! invalidates the cache on bus and session-manager change events.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     CallerTracker                         │
//! │                                                           │
//! │  resolve(bus_name) ──► BusDirectory ──► ProcessTable     │
//! │        │                  (pid, uid)      (start_time)    │
//! │        └──► cache: bus name → CallerFacts                │
//! │                                                           │
//! │  resolve_session(subject) ──► SessionDirectory           │
//! │        └──► cache: session id → SessionFacts             │
//! │                                                           │
//! │  on_change(event) ──► evict / re-derive                  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The bus daemon and the session manager (logind/ConsoleKit) stay outside
//! this crate behind the [`BusDirectory`] and [`SessionDirectory`] seams;
//! the raw signal plumbing feeds [`CallerTracker::on_change`].

#![warn(missing_docs)]

pub mod directory;
pub mod error;
pub mod event;
pub mod procfs;
pub mod tracker;

pub use directory::{BusDirectory, SessionDirectory, StaticBusDirectory, StaticSessionDirectory};
pub use error::TrackerError;
pub use event::TrackerEvent;
pub use procfs::ProcFs;
pub use tracker::CallerTracker;
