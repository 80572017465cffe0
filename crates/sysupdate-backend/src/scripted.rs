//! Scripted transaction service.
//!
//! Each call spawns a replay task that emits the scenario's steps after
//! their delays. Cancellation is cooperative: `cancel()` is accepted only
//! while the last replayed `cancellable_changed` was `true`, and the
//! replay then stops and emits `finished("exit-cancelled")`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use sysupdate_core::phase::EXIT_CANCELLED;
use sysupdate_core::{PackageId, TransactionKind, TransactionTicket};
use sysupdate_protocol::RawSignal;

use crate::error::BackendError;
use crate::scenario::{Scenario, Step};
use crate::service::{SignalSink, Transaction, TransactionService};

/// Backend that replays a `Scenario`.
#[derive(Debug, Clone)]
pub struct ScriptedService {
    scenario: Arc<Scenario>,
}

impl ScriptedService {
    pub fn new(scenario: Scenario) -> Self {
        Self {
            scenario: Arc::new(scenario),
        }
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    fn start_primary(
        &self,
        kind: TransactionKind,
        sink: SignalSink,
    ) -> Result<Box<dyn Transaction>, BackendError> {
        let steps = self.scenario.script(kind).to_vec();
        if steps.is_empty() {
            return Err(BackendError::Unavailable(format!(
                "no script for {kind} transactions"
            )));
        }
        Ok(Box::new(ScriptedTransaction::spawn(steps, sink)))
    }
}

#[async_trait]
impl TransactionService for ScriptedService {
    async fn update_cache(&self, sink: SignalSink) -> Result<Box<dyn Transaction>, BackendError> {
        self.start_primary(TransactionKind::Refresh, sink)
    }

    async fn upgrade_system_simulate(
        &self,
        sink: SignalSink,
    ) -> Result<Box<dyn Transaction>, BackendError> {
        self.start_primary(TransactionKind::Check, sink)
    }

    async fn upgrade_packages(
        &self,
        ids: &[PackageId],
        sink: SignalSink,
    ) -> Result<Box<dyn Transaction>, BackendError> {
        debug!(packages = ids.len(), "Scripted upgrade requested");
        self.start_primary(TransactionKind::Update, sink)
    }

    async fn simulate_upgrade(
        &self,
        ids: &[PackageId],
        sink: SignalSink,
    ) -> Result<Box<dyn Transaction>, BackendError> {
        let steps = self.scenario.size_script(ids);
        Ok(Box::new(ScriptedTransaction::spawn(steps, sink)))
    }
}

// ============================================================================
// Scripted Transaction
// ============================================================================

/// State shared between a transaction handle and its replay task.
#[derive(Debug, Default)]
struct ReplayFlags {
    cancellable: AtomicBool,
    done: AtomicBool,
}

/// Handle to one replaying transaction.
pub struct ScriptedTransaction {
    ticket: TransactionTicket,
    token: CancellationToken,
    flags: Arc<ReplayFlags>,
}

impl ScriptedTransaction {
    fn spawn(steps: Vec<Step>, sink: SignalSink) -> Self {
        let ticket = sink.ticket();
        let token = CancellationToken::new();
        let flags = Arc::new(ReplayFlags::default());

        tokio::spawn(replay(steps, sink, token.clone(), Arc::clone(&flags)));

        Self {
            ticket,
            token,
            flags,
        }
    }
}

#[async_trait]
impl Transaction for ScriptedTransaction {
    fn ticket(&self) -> TransactionTicket {
        self.ticket
    }

    fn is_cancellable(&self) -> bool {
        self.flags.cancellable.load(Ordering::SeqCst)
    }

    async fn cancel(&self) -> Result<(), BackendError> {
        if self.flags.done.load(Ordering::SeqCst) || self.token.is_cancelled() {
            return Ok(());
        }
        if !self.is_cancellable() {
            return Err(BackendError::NotCancellable);
        }
        debug!(ticket = %self.ticket, "Cancelling scripted transaction");
        self.token.cancel();
        Ok(())
    }
}

impl Drop for ScriptedTransaction {
    fn drop(&mut self) {
        // Nobody can observe the replay any more; stop it quietly
        if !self.flags.done.load(Ordering::SeqCst) {
            self.flags.done.store(true, Ordering::SeqCst);
            self.token.cancel();
        }
    }
}

async fn replay(steps: Vec<Step>, sink: SignalSink, token: CancellationToken, flags: Arc<ReplayFlags>) {
    let ticket = sink.ticket();

    for step in steps {
        if step.delay_ms > 0 {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = sleep(Duration::from_millis(step.delay_ms)) => {}
            }
        }

        if token.is_cancelled() {
            if !flags.done.swap(true, Ordering::SeqCst) {
                flags.cancellable.store(false, Ordering::SeqCst);
                sink.emit(RawSignal::finished(EXIT_CANCELLED));
            }
            trace!(%ticket, "Replay cancelled");
            return;
        }

        if let RawSignal::CancellableChanged { cancellable } = &step.emit {
            flags.cancellable.store(*cancellable, Ordering::SeqCst);
        }
        let terminal = matches!(step.emit, RawSignal::Finished { .. });

        trace!(%ticket, signal = step.emit.name(), "Replaying signal");
        if !sink.emit(step.emit) {
            flags.done.store(true, Ordering::SeqCst);
            return;
        }

        if terminal {
            flags.done.store(true, Ordering::SeqCst);
            flags.cancellable.store(false, Ordering::SeqCst);
            return;
        }
    }

    flags.done.store(true, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::TaggedSignal;
    use tokio::sync::mpsc;

    fn sink(kind: TransactionKind) -> (SignalSink, mpsc::UnboundedReceiver<TaggedSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (SignalSink::new(TransactionTicket::new(kind, 1), tx), rx)
    }

    async fn drain(rx: &mut mpsc::UnboundedReceiver<TaggedSignal>) -> Vec<RawSignal> {
        let mut signals = Vec::new();
        while let Some(tagged) = rx.recv().await {
            let terminal = matches!(tagged.signal, RawSignal::Finished { .. });
            signals.push(tagged.signal);
            if terminal {
                break;
            }
        }
        signals
    }

    #[tokio::test(start_paused = true)]
    async fn test_replays_script_in_order() {
        let service = ScriptedService::new(Scenario::demo());
        let (sink, mut rx) = sink(TransactionKind::Refresh);

        let _tx = service.update_cache(sink).await.unwrap();
        let signals = drain(&mut rx).await;

        let expected: Vec<RawSignal> = Scenario::demo()
            .refresh
            .into_iter()
            .map(|s| s.emit)
            .collect();
        assert_eq!(signals, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_cancellable_is_rejected() {
        let service = ScriptedService::new(Scenario::demo());
        let (sink, _rx) = sink(TransactionKind::Refresh);

        let tx = service.update_cache(sink).await.unwrap();

        assert!(!tx.is_cancellable());
        assert_eq!(tx.cancel().await, Err(BackendError::NotCancellable));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_emits_cancelled() {
        let service = ScriptedService::new(Scenario::demo());
        let (sink, mut rx) = sink(TransactionKind::Refresh);
        let tx = service.update_cache(sink).await.unwrap();

        // First step makes the refresh cancellable
        let first = rx.recv().await.unwrap();
        assert_eq!(first.signal, RawSignal::CancellableChanged { cancellable: true });
        assert!(tx.is_cancellable());

        tx.cancel().await.unwrap();
        let rest = drain(&mut rx).await;

        assert_eq!(rest.last(), Some(&RawSignal::finished("exit-cancelled")));
        assert!(!tx.is_cancellable());
        // Cancelling again is a no-op
        assert_eq!(tx.cancel().await, Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_size_query_sums_selection() {
        let service = ScriptedService::new(Scenario::demo());
        let (sink, mut rx) = sink(TransactionKind::SizeCheck);
        let ids = vec![
            PackageId::parse("write-activity=84").unwrap(),
            PackageId::parse("browse-activity=207").unwrap(),
        ];

        let _tx = service.simulate_upgrade(&ids, sink).await.unwrap();
        let signals = drain(&mut rx).await;

        assert_eq!(
            signals.first(),
            Some(&RawSignal::DownloadSizeChanged { bytes: 1024 * 1024 })
        );
    }

    #[tokio::test]
    async fn test_missing_script_is_unavailable() {
        let service = ScriptedService::new(Scenario::default());
        let (sink, _rx) = sink(TransactionKind::Update);

        let result = service.upgrade_packages(&[], sink).await;

        assert!(matches!(result, Err(BackendError::Unavailable(_))));
    }
}
