//! Update session controller using the Actor pattern.
//!
//! The controller is the single owner of the update session. It receives
//! user intents via a tokio mpsc channel, drives the transaction service,
//! and reduces backend signals into the next session state and view.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │  SessionHandle  │────▶│ ControllerActor │────▶│ Broadcast Channel│
//! └─────────────────┘     └───────┬─▲───────┘     └──────────────────┘
//!         │                       │ │                      │
//!         │   SessionCommand      │ │ TaggedSignal         │  SessionEvent
//!         │   (mpsc channel)      ▼ │ (unbounded mpsc)     ▼
//!    refresh/update/       TransactionService         presentations
//!    cancel/select
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use sysupdate_backend::TransactionService;

use crate::config::SessionConfig;

mod actor;
mod commands;
mod handle;

pub use actor::ControllerActor;
pub use commands::{ControllerError, SessionCommand, SessionEvent};
pub use handle::SessionHandle;

/// Channel buffer sizes
const COMMAND_BUFFER: usize = 32;
const EVENT_BUFFER: usize = 256;

/// Spawn the controller actor and return a handle for interaction.
///
/// This function:
/// 1. Creates command and event channels
/// 2. Spawns the ControllerActor on a tokio task
/// 3. Returns a SessionHandle for client use
///
/// The actor stops once every handle is dropped.
///
/// # Example
///
/// ```ignore
/// let service = Arc::new(ScriptedService::new(Scenario::demo()));
/// let handle = spawn_controller(service, &SessionConfig::default());
/// handle.refresh().await?;
/// ```
pub fn spawn_controller(
    service: Arc<dyn TransactionService>,
    config: &SessionConfig,
) -> SessionHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (event_tx, _) = broadcast::channel(EVENT_BUFFER);

    let actor = ControllerActor::new(
        cmd_rx,
        service,
        config.normalizer(),
        config.reducer_options(),
        event_tx.clone(),
    );
    tokio::spawn(actor.run());
    debug!(?config, "Spawned session controller");

    SessionHandle::new(cmd_tx, event_tx)
}
