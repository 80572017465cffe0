//! Controller actor - owns the session state and drives the backend.
//!
//! The ControllerActor is the single owner of `SessionState` and the
//! current `ViewState`. It receives user intents via an mpsc channel, raw
//! backend signals via a second (unbounded) channel, and publishes
//! `SessionEvent`s via broadcast.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Channel send failures are logged but don't panic

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, trace, warn};

use sysupdate_backend::{SignalSink, TaggedSignal, Transaction, TransactionService};
use sysupdate_core::reducer::{self, Intent, ReducerOptions, Transition};
use sysupdate_core::{
    Outcome, PackageId, PackageRecord, SessionPhase, SessionState, TransactionEvent, TransactionKind,
    TransactionTicket, ViewState,
};
use sysupdate_protocol::{Normalizer, RawSignal};

use super::commands::{ControllerError, SessionCommand, SessionEvent};

// ============================================================================
// Controller Actor
// ============================================================================

/// The controller actor - owns the update session.
///
/// # Ownership
///
/// The actor owns:
/// - `state` and `view`: only changed here, through the reducer or when a
///   transaction starts
/// - `active`: handle of the primary transaction (refresh, check, update)
/// - `size_query`: handle of the latest size query, which runs alongside
///
/// # Stale Signals
///
/// Every backend call gets a ticket with a fresh sequence number. Signals
/// for a primary ticket other than `state.active`, and size signals for a
/// ticket other than the latest size query, are dropped.
pub struct ControllerActor {
    /// Command receiver
    receiver: mpsc::Receiver<SessionCommand>,

    /// Sender cloned into every `SignalSink`
    signal_sender: mpsc::UnboundedSender<TaggedSignal>,

    /// Raw backend signals
    signals: mpsc::UnboundedReceiver<TaggedSignal>,

    service: Arc<dyn TransactionService>,
    normalizer: Normalizer,
    options: ReducerOptions,

    state: SessionState,
    view: ViewState,

    active: Option<Box<dyn Transaction>>,
    size_query: Option<Box<dyn Transaction>>,
    latest_size_ticket: Option<TransactionTicket>,

    /// Last issued sequence number
    seq: u64,

    /// Event publisher for presentations
    event_publisher: broadcast::Sender<SessionEvent>,
}

impl ControllerActor {
    pub fn new(
        receiver: mpsc::Receiver<SessionCommand>,
        service: Arc<dyn TransactionService>,
        normalizer: Normalizer,
        options: ReducerOptions,
        event_publisher: broadcast::Sender<SessionEvent>,
    ) -> Self {
        let (signal_sender, signals) = mpsc::unbounded_channel();
        Self {
            receiver,
            signal_sender,
            signals,
            service,
            normalizer,
            options,
            state: SessionState::new(),
            view: ViewState::default(),
            active: None,
            size_query: None,
            latest_size_ticket: None,
            seq: 0,
            event_publisher,
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands and backend signals until the command channel
    /// closes (all handles dropped). Dropping the actor drops any running
    /// transaction handles.
    pub async fn run(mut self) {
        info!("Session controller starting");

        loop {
            tokio::select! {
                // Backend signals first so a terminal event is applied
                // before the next user intent is looked at
                biased;

                Some(tagged) = self.signals.recv() => {
                    self.handle_signal(tagged).await;
                }
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },
            }
        }

        info!(phase = %self.state.phase, "Session controller stopped");
    }

    /// Dispatches a command to the appropriate handler.
    async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Refresh { respond_to } => {
                let result = self.handle_refresh().await;
                // Ignore send error - client may have dropped the receiver
                let _ = respond_to.send(result);
            }
            SessionCommand::Check { respond_to } => {
                let result = self.handle_check().await;
                let _ = respond_to.send(result);
            }
            SessionCommand::CheckSize { ids, respond_to } => {
                let result = self.handle_check_size(ids).await;
                let _ = respond_to.send(result);
            }
            SessionCommand::Update { ids, respond_to } => {
                let result = self.handle_update(ids).await;
                let _ = respond_to.send(result);
            }
            SessionCommand::InstallSelected { respond_to } => {
                let result = self.handle_install_selected().await;
                let _ = respond_to.send(result);
            }
            SessionCommand::Cancel { respond_to } => {
                let forwarded = self.handle_cancel().await;
                let _ = respond_to.send(forwarded);
            }
            SessionCommand::SelectionChanged { ids, respond_to } => {
                self.handle_selection_changed(ids).await;
                let _ = respond_to.send(());
            }
            SessionCommand::Toggle { id, respond_to } => {
                let toggled = self.handle_toggle(id).await;
                let _ = respond_to.send(toggled);
            }
            SessionCommand::GetSnapshot { respond_to } => {
                let _ = respond_to.send(self.state.snapshot());
            }
            SessionCommand::GetView { respond_to } => {
                let _ = respond_to.send(self.view.clone());
            }
        }
    }

    // ========================================================================
    // Primary transactions
    // ========================================================================

    async fn handle_refresh(&mut self) -> Result<(), ControllerError> {
        self.ensure_idle()?;
        self.state.packages.clear();
        self.state.pending_packages.clear();
        self.drop_size_query();
        self.start_primary(TransactionKind::Refresh, &[]).await
    }

    async fn handle_check(&mut self) -> Result<(), ControllerError> {
        self.ensure_idle()?;
        self.state.packages.clear();
        self.state.pending_packages.clear();
        self.drop_size_query();
        self.start_primary(TransactionKind::Check, &[]).await
    }

    async fn handle_update(&mut self, ids: Vec<PackageId>) -> Result<(), ControllerError> {
        if ids.is_empty() {
            return Err(ControllerError::EmptySelection);
        }
        self.ensure_idle()?;
        self.drop_size_query();
        self.state.pending_packages = ids.clone();
        self.start_primary(TransactionKind::Update, &ids).await
    }

    async fn handle_install_selected(&mut self) -> Result<(), ControllerError> {
        if self.view.as_update_list().is_none() {
            return Err(ControllerError::NotReady);
        }
        let ids = self.state.pending_packages.clone();
        self.handle_update(ids).await
    }

    /// Rejects a primary start while another one owns the session.
    fn ensure_idle(&self) -> Result<(), ControllerError> {
        if self.state.is_busy() {
            debug!(phase = %self.state.phase, "Rejecting start while busy");
            return Err(ControllerError::Busy {
                phase: self.state.phase,
            });
        }
        Ok(())
    }

    /// Starts a primary transaction and moves into its phase.
    ///
    /// A backend that refuses to start is handled like a `Failed` event.
    async fn start_primary(
        &mut self,
        kind: TransactionKind,
        ids: &[PackageId],
    ) -> Result<(), ControllerError> {
        let Some(phase) = kind.phase() else {
            return Ok(());
        };

        let ticket = self.next_ticket(kind);
        let sink = SignalSink::new(ticket, self.signal_sender.clone());
        self.state.begin(phase, ticket);
        self.set_view(reducer::started(&self.view, phase, &self.options));

        let service = Arc::clone(&self.service);
        let started = match kind {
            TransactionKind::Refresh => service.update_cache(sink).await,
            TransactionKind::Check => service.upgrade_system_simulate(sink).await,
            TransactionKind::Update => service.upgrade_packages(ids, sink).await,
            TransactionKind::SizeCheck => return Ok(()),
        };

        match started {
            Ok(transaction) => {
                info!(%ticket, %phase, "Transaction started");
                self.active = Some(transaction);
                Ok(())
            }
            Err(e) => {
                warn!(%ticket, code = e.code(), error = %e, "Backend refused to start transaction");
                let event = TransactionEvent::Failed {
                    code: e.code().to_string(),
                    detail: e.to_string(),
                };
                // Failed never produces intents
                let _ = self.apply_event(&event);
                Err(ControllerError::Backend(e))
            }
        }
    }

    async fn handle_cancel(&self) -> bool {
        let Some(transaction) = &self.active else {
            debug!("Cancel ignored, no active transaction");
            return false;
        };
        if !self.state.cancellable {
            debug!(phase = %self.state.phase, "Cancel ignored, transaction not cancellable");
            return false;
        }

        match transaction.cancel().await {
            Ok(()) => {
                info!(ticket = %transaction.ticket(), "Cancellation requested");
                true
            }
            Err(e) => {
                warn!(ticket = %transaction.ticket(), error = %e, "Cancellation refused");
                false
            }
        }
    }

    // ========================================================================
    // Selection
    // ========================================================================

    /// The selection is frozen while a transaction owns the session.
    async fn handle_selection_changed(&mut self, ids: Vec<PackageId>) {
        if self.state.is_busy() {
            debug!(phase = %self.state.phase, "Selection change ignored while busy");
            return;
        }
        let t = reducer::select(&self.state, &self.view, &ids, &self.options);
        self.commit_selection(t).await;
    }

    async fn handle_toggle(&mut self, id: PackageId) -> bool {
        if self.state.is_busy() {
            debug!(phase = %self.state.phase, "Toggle ignored while busy");
            return false;
        }
        if !self.state.packages.iter().any(|r| r.id == id) {
            debug!(package = %id, "Toggle for unknown package");
            return false;
        }
        let t = reducer::toggle(&self.state, &self.view, &id, &self.options);
        self.commit_selection(t).await;
        true
    }

    /// Commits a selection transition. An emptied selection has no size,
    /// so a query still measuring the previous one is dropped.
    async fn commit_selection(&mut self, t: Transition) {
        let intents = self.commit(t);
        if self.state.pending_packages.is_empty() && self.latest_size_ticket.is_some() {
            self.drop_size_query();
        }
        self.run_intents(intents).await;
    }

    // ========================================================================
    // Size queries
    // ========================================================================

    /// Starts a size query, superseding any earlier one.
    async fn handle_check_size(&mut self, ids: Vec<PackageId>) -> Result<(), ControllerError> {
        if !self.options.size_check {
            debug!("Size check disabled, ignoring request");
            return Ok(());
        }
        if ids.is_empty() {
            return Err(ControllerError::EmptySelection);
        }

        if let Some(previous) = self.size_query.take() {
            debug!(ticket = %previous.ticket(), "Superseding size query");
            if let Err(e) = previous.cancel().await {
                trace!(error = %e, "Superseded size query kept running");
            }
        }

        let ticket = self.next_ticket(TransactionKind::SizeCheck);
        self.latest_size_ticket = Some(ticket);
        let sink = SignalSink::new(ticket, self.signal_sender.clone());

        let service = Arc::clone(&self.service);
        match service.simulate_upgrade(&ids, sink).await {
            Ok(transaction) => {
                debug!(%ticket, packages = ids.len(), "Size query started");
                self.size_query = Some(transaction);
                Ok(())
            }
            Err(e) => {
                warn!(%ticket, code = e.code(), error = %e, "Size query could not start");
                self.latest_size_ticket = None;
                Err(ControllerError::Backend(e))
            }
        }
    }

    fn drop_size_query(&mut self) {
        if self.size_query.take().is_some() {
            debug!("Dropping size query");
        }
        self.latest_size_ticket = None;
    }

    // ========================================================================
    // Backend signals
    // ========================================================================

    async fn handle_signal(&mut self, tagged: TaggedSignal) {
        let TaggedSignal { ticket, signal } = tagged;

        if ticket.kind == TransactionKind::SizeCheck {
            self.handle_size_signal(ticket, signal);
            return;
        }

        if self.state.active != Some(ticket) {
            trace!(%ticket, signal = signal.name(), "Dropping stale signal");
            return;
        }

        let Some(event) = self.normalizer.normalize(ticket.kind, signal) else {
            return;
        };

        match &event {
            TransactionEvent::Failed { code, detail } => {
                warn!(%ticket, code = %code, detail = %detail, "Transaction failed");
                self.cancel_best_effort().await;
            }
            TransactionEvent::Finished {
                outcome: Outcome::Failed { code },
            } => {
                warn!(%ticket, code = %code, "Transaction finished with failure");
            }
            TransactionEvent::Finished { outcome } => {
                info!(%ticket, %outcome, "Transaction finished");
            }
            _ => {}
        }

        let intents = self.apply_event(&event);
        self.run_intents(intents).await;
    }

    fn handle_size_signal(&mut self, ticket: TransactionTicket, signal: RawSignal) {
        if self.latest_size_ticket != Some(ticket) {
            trace!(%ticket, signal = signal.name(), "Dropping superseded size signal");
            return;
        }

        match self.normalizer.normalize(ticket.kind, signal) {
            Some(TransactionEvent::Finished { outcome }) => {
                if !outcome.is_success() {
                    debug!(%ticket, %outcome, "Size query did not complete");
                }
                self.size_query = None;
            }
            Some(TransactionEvent::Failed { code, .. }) => {
                warn!(%ticket, code = %code, "Size query failed");
                self.size_query = None;
                self.latest_size_ticket = None;
            }
            Some(event @ TransactionEvent::DownloadSizeKnown { .. }) => {
                // Size transitions carry no intents
                let _ = self.apply_event(&event);
            }
            Some(_) | None => {}
        }
    }

    /// Cancels the active transaction after a failure. Refusals are logged.
    async fn cancel_best_effort(&self) {
        if let Some(transaction) = &self.active {
            if let Err(e) = transaction.cancel().await {
                debug!(ticket = %transaction.ticket(), error = %e, "Cancel after failure refused");
            }
        }
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Reduces one event, publishes its outbound signals and commits it.
    fn apply_event(&mut self, event: &TransactionEvent) -> Vec<Intent> {
        let phase = self.state.phase;
        let installed = self.state.pending_packages.clone();
        let t = reducer::reduce(&self.state, &self.view, event, &self.options);

        match event {
            TransactionEvent::ProgressUpdate(_) => {
                if let Some(progress) = t.view.as_progress() {
                    self.publish(SessionEvent::Progress {
                        phase: progress.phase,
                        fraction: progress.fraction,
                        detail: progress.detail.clone(),
                    });
                }
            }
            TransactionEvent::Finished { outcome } if !phase.is_idle() => {
                let packages = match (phase, outcome) {
                    (SessionPhase::Checking, Outcome::Success) => t.state.packages.clone(),
                    (SessionPhase::Updating, Outcome::Success) => {
                        installed.iter().cloned().map(PackageRecord::new).collect()
                    }
                    _ => Vec::new(),
                };
                self.publish(SessionEvent::Finished {
                    phase,
                    outcome: outcome.clone(),
                    packages,
                });
            }
            TransactionEvent::Failed { code, .. } if !phase.is_idle() => {
                self.publish(SessionEvent::Finished {
                    phase,
                    outcome: Outcome::Failed { code: code.clone() },
                    packages: Vec::new(),
                });
            }
            TransactionEvent::CancellableChanged { cancellable } if t.state.active.is_some() => {
                self.publish(SessionEvent::CancellableChanged {
                    cancellable: *cancellable,
                });
            }
            TransactionEvent::DownloadSizeKnown { bytes } => {
                self.publish(SessionEvent::DownloadSizeKnown { bytes: *bytes });
            }
            _ => {}
        }

        let checked = phase == SessionPhase::Checking
            && matches!(
                event,
                TransactionEvent::Finished {
                    outcome: Outcome::Success
                }
            );

        let intents = self.commit(t);
        if checked {
            self.state.last_checked = Some(Utc::now());
        }
        intents
    }

    /// Installs a transition as the current state and view.
    fn commit(&mut self, t: Transition) -> Vec<Intent> {
        let Transition {
            state,
            view,
            intents,
        } = t;

        if state.active.is_none() && self.active.take().is_some() {
            trace!("Released transaction handle");
        }
        if state.phase != self.state.phase {
            debug!(from = %self.state.phase, to = %state.phase, "Phase changed");
        }
        self.state = state;
        self.set_view(view);
        intents
    }

    /// Executes follow-up intents in the same actor step.
    async fn run_intents(&mut self, intents: Vec<Intent>) {
        for intent in intents {
            let result = match intent {
                Intent::Check => self.handle_check().await,
                Intent::CheckSize(ids) => self.handle_check_size(ids).await,
            };
            if let Err(e) = result {
                warn!(error = %e, "Follow-up request failed");
            }
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn next_ticket(&mut self, kind: TransactionKind) -> TransactionTicket {
        self.seq += 1;
        TransactionTicket::new(kind, self.seq)
    }

    fn set_view(&mut self, view: ViewState) {
        if view != self.view {
            self.view = view.clone();
            self.publish(SessionEvent::ViewChanged {
                view: Box::new(view),
            });
        }
    }

    /// Publishes an event to subscribers. No subscribers is not an error.
    fn publish(&self, event: SessionEvent) {
        let _ = self.event_publisher.send(event);
    }
}

impl std::fmt::Debug for ControllerActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerActor")
            .field("state", &self.state)
            .field("view", &self.view)
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}
