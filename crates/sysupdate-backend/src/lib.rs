//! sysupdate backend - Package-transaction service seam
//!
//! The controller never talks to a package manager directly. It is handed
//! a `TransactionService`, starts one `Transaction` per backend call, and
//! receives that transaction's raw signals through a `SignalSink` tagged
//! with the call's ticket.
//!
//! `ScriptedService` is a timer-driven implementation that replays a
//! `Scenario`; it backs the command-line front end and the tests.

pub mod error;
pub mod scenario;
pub mod scripted;
pub mod service;

pub use error::{BackendError, ScenarioError};
pub use scenario::{Scenario, Step};
pub use scripted::ScriptedService;
pub use service::{SignalSink, TaggedSignal, Transaction, TransactionService};
