//! sysupdate core - Shared types for the software update session
//!
//! This crate provides the domain types shared between the backend
//! adapter, the session controller and presentations:
//! - `package` - typed `name=version` identifiers and list records
//! - `phase` - session phases, outcomes and transaction tickets
//! - `event` - the normalized, backend-agnostic transaction events
//! - `reducer` - the pure `(state, event) -> (state, view, intents)` mapping
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod event;
pub mod package;
pub mod phase;
pub mod reducer;
pub mod session;
pub mod size;
pub mod view;

// Re-exports for convenience
pub use error::{DomainError, DomainResult};
pub use event::{ProgressUpdate, TransactionEvent};
pub use package::{PackageId, PackageRecord};
pub use phase::{Outcome, SessionPhase, TransactionKind, TransactionTicket};
pub use reducer::{Intent, ReducerOptions, Transition};
pub use session::{SessionSnapshot, SessionState};
pub use size::format_size;
pub use view::{ProgressView, UpdateListView, ViewState};
