//! Client interface for interacting with the ControllerActor.
//!
//! The `SessionHandle` is a cheap-to-clone interface for sending intents
//! to the controller and subscribing to session events.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel errors are mapped to `ControllerError::ChannelClosed`

use tokio::sync::{broadcast, mpsc, oneshot};

use sysupdate_core::{PackageId, SessionSnapshot, ViewState};

use super::commands::{ControllerError, SessionCommand, SessionEvent};

// ============================================================================
// Session Handle
// ============================================================================

/// Handle for interacting with the controller actor.
///
/// # Usage
///
/// ```ignore
/// let mut events = handle.subscribe();
/// handle.refresh().await?;
///
/// while let Ok(event) = events.recv().await {
///     if let SessionEvent::ViewChanged { view } = event {
///         // render
///     }
/// }
/// ```
#[derive(Clone)]
pub struct SessionHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<SessionCommand>,

    /// Event broadcaster for subscribing to updates
    event_sender: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    pub fn new(
        sender: mpsc::Sender<SessionCommand>,
        event_sender: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            sender,
            event_sender,
        }
    }

    /// Sends a command built around a fresh reply channel and awaits the reply.
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, ControllerError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| ControllerError::ChannelClosed)?;
        rx.await.map_err(|_| ControllerError::ChannelClosed)
    }

    /// Refresh package metadata. A successful refresh continues into a check.
    ///
    /// # Errors
    ///
    /// - `ControllerError::Busy` if a transaction is in flight
    /// - `ControllerError::Backend` if the backend refused to start
    /// - `ControllerError::ChannelClosed` if the actor has shut down
    pub async fn refresh(&self) -> Result<(), ControllerError> {
        self.request(|respond_to| SessionCommand::Refresh { respond_to })
            .await?
    }

    /// Check for updates without refreshing.
    ///
    /// # Errors
    ///
    /// Same as [`SessionHandle::refresh`].
    pub async fn check(&self) -> Result<(), ControllerError> {
        self.request(|respond_to| SessionCommand::Check { respond_to })
            .await?
    }

    /// Query the download size of `ids`, superseding any running query.
    ///
    /// A no-op when size checks are disabled.
    ///
    /// # Errors
    ///
    /// - `ControllerError::EmptySelection` if `ids` is empty
    /// - `ControllerError::Backend` if the backend refused to start
    pub async fn check_size(&self, ids: Vec<PackageId>) -> Result<(), ControllerError> {
        self.request(|respond_to| SessionCommand::CheckSize { ids, respond_to })
            .await?
    }

    /// Install upgrades for `ids`.
    ///
    /// # Errors
    ///
    /// - `ControllerError::EmptySelection` if `ids` is empty
    /// - `ControllerError::Busy` if a transaction is in flight
    /// - `ControllerError::Backend` if the backend refused to start
    pub async fn update(&self, ids: Vec<PackageId>) -> Result<(), ControllerError> {
        self.request(|respond_to| SessionCommand::Update { ids, respond_to })
            .await?
    }

    /// Install the packages selected in the update list.
    ///
    /// # Errors
    ///
    /// - `ControllerError::NotReady` if no update list is shown
    /// - otherwise as [`SessionHandle::update`]
    pub async fn install_selected(&self) -> Result<(), ControllerError> {
        self.request(|respond_to| SessionCommand::InstallSelected { respond_to })
            .await?
    }

    /// Request cancellation of the active transaction.
    ///
    /// Returns `true` if the backend accepted the request. The session
    /// stays in its phase until the backend reports the outcome. Never
    /// fails: a closed actor reports `false`.
    pub async fn cancel(&self) -> bool {
        self.request(|respond_to| SessionCommand::Cancel { respond_to })
            .await
            .unwrap_or(false)
    }

    /// Replace the update-list selection.
    ///
    /// # Errors
    ///
    /// `ControllerError::ChannelClosed` if the actor has shut down.
    pub async fn selection_changed(&self, ids: Vec<PackageId>) -> Result<(), ControllerError> {
        self.request(|respond_to| SessionCommand::SelectionChanged { ids, respond_to })
            .await
    }

    /// Flip the selection of one package. Returns `false` if nothing changed.
    pub async fn toggle(&self, id: PackageId) -> Result<bool, ControllerError> {
        self.request(|respond_to| SessionCommand::Toggle { id, respond_to })
            .await
    }

    /// Get a copy of the session state.
    ///
    /// Returns `None` if the actor has shut down.
    pub async fn snapshot(&self) -> Option<SessionSnapshot> {
        self.request(|respond_to| SessionCommand::GetSnapshot { respond_to })
            .await
            .ok()
    }

    /// Get the current view.
    ///
    /// Returns `None` if the actor has shut down.
    pub async fn view(&self) -> Option<ViewState> {
        self.request(|respond_to| SessionCommand::GetView { respond_to })
            .await
            .ok()
    }

    /// Subscribe to session events.
    ///
    /// Subscribers only see events published after this call; use
    /// [`SessionHandle::view`] for the current state.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_sender.subscribe()
    }

    /// Check if the actor is still running.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("connected", &self.is_connected())
            .field("subscribers", &self.event_sender.receiver_count())
            .finish()
    }
}
