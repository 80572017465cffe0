//! The transaction service interface.
//!
//! # Panic-Free Guarantees
//!
//! Sinks never panic on a closed channel: `emit` reports delivery as a
//! `bool` and backends stop emitting once it returns `false`.

use async_trait::async_trait;
use tokio::sync::mpsc;

use sysupdate_core::{PackageId, TransactionTicket};
use sysupdate_protocol::RawSignal;

// ============================================================================
// Signal Delivery
// ============================================================================

/// A raw signal together with the ticket of the call that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedSignal {
    pub ticket: TransactionTicket,
    pub signal: RawSignal,
}

/// Per-transaction signal emitter handed to the backend.
///
/// Every signal emitted through a sink carries the sink's ticket, so the
/// receiver can discard signals from superseded calls.
#[derive(Debug, Clone)]
pub struct SignalSink {
    ticket: TransactionTicket,
    sender: mpsc::UnboundedSender<TaggedSignal>,
}

impl SignalSink {
    pub fn new(ticket: TransactionTicket, sender: mpsc::UnboundedSender<TaggedSignal>) -> Self {
        Self { ticket, sender }
    }

    pub fn ticket(&self) -> TransactionTicket {
        self.ticket
    }

    /// Emits a signal. Returns `false` if the receiver has gone away.
    pub fn emit(&self, signal: RawSignal) -> bool {
        self.sender
            .send(TaggedSignal {
                ticket: self.ticket,
                signal,
            })
            .is_ok()
    }

    /// True once the receiving side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

// ============================================================================
// Service Traits
// ============================================================================

/// Handle to one running backend transaction.
#[async_trait]
pub trait Transaction: Send + Sync {
    /// Ticket the transaction was started with.
    fn ticket(&self) -> TransactionTicket;

    /// Whether the backend currently accepts cancellation.
    fn is_cancellable(&self) -> bool;

    /// Requests cooperative cancellation.
    ///
    /// The transaction keeps running until the backend emits
    /// `finished("exit-cancelled")` or an error.
    ///
    /// # Errors
    ///
    /// `BackendError::NotCancellable` if the transaction does not accept
    /// cancellation right now.
    async fn cancel(&self) -> Result<(), crate::BackendError>;
}

/// Asynchronous package backend.
///
/// Each call returns as soon as the transaction is started; progress and
/// completion arrive later through the given sink.
#[async_trait]
pub trait TransactionService: Send + Sync {
    /// Refreshes package metadata (`updateCache()`).
    async fn update_cache(
        &self,
        sink: SignalSink,
    ) -> Result<Box<dyn Transaction>, crate::BackendError>;

    /// Simulates a full system upgrade without applying it
    /// (`upgradeSystemSimulate()`).
    async fn upgrade_system_simulate(
        &self,
        sink: SignalSink,
    ) -> Result<Box<dyn Transaction>, crate::BackendError>;

    /// Installs upgrades for the given packages (`upgradePackages(ids)`).
    async fn upgrade_packages(
        &self,
        ids: &[PackageId],
        sink: SignalSink,
    ) -> Result<Box<dyn Transaction>, crate::BackendError>;

    /// Simulates upgrading the given packages to learn the download size
    /// (`simulateUpgrade(ids)`).
    async fn simulate_upgrade(
        &self,
        ids: &[PackageId],
        sink: SignalSink,
    ) -> Result<Box<dyn Transaction>, crate::BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use sysupdate_core::TransactionKind;

    #[tokio::test]
    async fn test_sink_tags_signals() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ticket = TransactionTicket::new(TransactionKind::Refresh, 3);
        let sink = SignalSink::new(ticket, tx);

        assert!(sink.emit(RawSignal::finished("exit-success")));

        let tagged = rx.recv().await.unwrap();
        assert_eq!(tagged.ticket, ticket);
        assert_eq!(tagged.signal, RawSignal::finished("exit-success"));
    }

    #[tokio::test]
    async fn test_sink_reports_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = SignalSink::new(TransactionTicket::new(TransactionKind::Check, 1), tx);
        drop(rx);

        assert!(sink.is_closed());
        assert!(!sink.emit(RawSignal::CancellableChanged { cancellable: true }));
    }
}
