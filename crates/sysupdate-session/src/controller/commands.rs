//! Controller commands, errors, and events.
//!
//! This module defines the message types for communicating with the
//! `ControllerActor`:
//! - `SessionCommand`: user intents sent to the actor
//! - `ControllerError`: rejected intents
//! - `SessionEvent`: outbound signals published for presentations

use sysupdate_backend::BackendError;
use sysupdate_core::{
    Outcome, PackageId, PackageRecord, SessionPhase, SessionSnapshot, ViewState,
};
use thiserror::Error;
use tokio::sync::oneshot;

// ============================================================================
// Session Commands
// ============================================================================

/// Commands sent to the controller actor.
///
/// Each command carries a oneshot channel for the reply.
#[derive(Debug)]
pub enum SessionCommand {
    /// Refresh package metadata, then check for updates.
    ///
    /// # Errors
    /// - `ControllerError::Busy` if a transaction is in flight
    Refresh {
        respond_to: oneshot::Sender<Result<(), ControllerError>>,
    },

    /// Check for updates without refreshing first.
    ///
    /// # Errors
    /// - `ControllerError::Busy` if a transaction is in flight
    Check {
        respond_to: oneshot::Sender<Result<(), ControllerError>>,
    },

    /// Query the download size of the given packages.
    ///
    /// Supersedes any earlier size query still running.
    CheckSize {
        ids: Vec<PackageId>,
        respond_to: oneshot::Sender<Result<(), ControllerError>>,
    },

    /// Install upgrades for the given packages.
    ///
    /// # Errors
    /// - `ControllerError::EmptySelection` if `ids` is empty
    /// - `ControllerError::Busy` if a transaction is in flight
    Update {
        ids: Vec<PackageId>,
        respond_to: oneshot::Sender<Result<(), ControllerError>>,
    },

    /// Install the packages currently selected in the update list.
    InstallSelected {
        respond_to: oneshot::Sender<Result<(), ControllerError>>,
    },

    /// Request cancellation of the active transaction.
    ///
    /// Replies `true` if the request was forwarded to the backend.
    Cancel { respond_to: oneshot::Sender<bool> },

    /// Replace the update-list selection.
    SelectionChanged {
        ids: Vec<PackageId>,
        respond_to: oneshot::Sender<()>,
    },

    /// Flip one package's selection. Replies `false` for unknown ids.
    Toggle {
        id: PackageId,
        respond_to: oneshot::Sender<bool>,
    },

    /// Get a copy of the session state.
    GetSnapshot {
        respond_to: oneshot::Sender<SessionSnapshot>,
    },

    /// Get the current view.
    GetView { respond_to: oneshot::Sender<ViewState> },
}

// ============================================================================
// Controller Errors
// ============================================================================

/// Errors returned for rejected intents.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    /// A primary transaction is already in flight.
    #[error("session is busy ({phase})")]
    Busy { phase: SessionPhase },

    /// An update or size query was requested for no packages.
    #[error("no packages selected")]
    EmptySelection,

    /// No update list is shown to install from.
    #[error("no update list available")]
    NotReady,

    /// The backend could not start the transaction.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// The response channel was closed before receiving a response.
    ///
    /// This typically indicates the actor was shut down.
    #[error("response channel closed")]
    ChannelClosed,
}

// ============================================================================
// Session Events
// ============================================================================

/// Outbound signals published to presentations.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A busy phase made progress.
    Progress {
        phase: SessionPhase,
        fraction: f64,
        detail: Option<String>,
    },

    /// A primary transaction ended.
    Finished {
        phase: SessionPhase,
        outcome: Outcome,
        /// The update list for a check, the installed packages for an update.
        packages: Vec<PackageRecord>,
    },

    /// The active transaction started or stopped accepting cancellation.
    CancellableChanged { cancellable: bool },

    /// The download size of the selection is known.
    DownloadSizeKnown { bytes: u64 },

    /// The view changed. Boxed to keep the enum small.
    ViewChanged { view: Box<ViewState> },
}
