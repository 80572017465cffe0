//! Session state owned by the controller.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::package::{selected_ids, PackageId, PackageRecord};
use crate::phase::{SessionPhase, TransactionTicket};

/// Mutable state of one update session.
///
/// Created once per pane and only ever changed by the controller, either
/// directly when it starts a transaction or through the reducer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Current activity.
    pub phase: SessionPhase,

    /// Ticket of the primary transaction in flight. `Some` exactly when
    /// `phase` is not `Idle`.
    pub active: Option<TransactionTicket>,

    /// Whether the active transaction currently accepts cancellation.
    pub cancellable: bool,

    /// Ids targeted by the next or current update.
    pub pending_packages: Vec<PackageId>,

    /// The update list from the last check, with selection flags.
    pub packages: Vec<PackageRecord>,

    /// When the last check completed successfully.
    pub last_checked: Option<DateTime<Utc>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a primary transaction owns the session.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.active.is_some() || !self.phase.is_idle()
    }

    /// Moves into a busy phase for the given transaction.
    pub fn begin(&mut self, phase: SessionPhase, ticket: TransactionTicket) {
        self.phase = phase;
        self.active = Some(ticket);
        self.cancellable = false;
    }

    /// Returns to `Idle` after a terminal event.
    pub fn finish(&mut self) {
        self.phase = SessionPhase::Idle;
        self.active = None;
        self.cancellable = false;
    }

    /// Applies a new selection to the package list.
    ///
    /// Records whose id is in `ids` become selected, all others are
    /// deselected. `pending_packages` follows list order.
    pub fn select(&mut self, ids: &[PackageId]) {
        for record in &mut self.packages {
            record.selected = ids.contains(&record.id);
        }
        self.pending_packages = selected_ids(&self.packages);
    }

    /// Flips one record's selection. Returns `false` if the id is unknown.
    pub fn toggle(&mut self, id: &PackageId) -> bool {
        let mut found = false;
        for record in self.packages.iter_mut().filter(|r| &r.id == id) {
            record.selected = !record.selected;
            found = true;
        }
        if found {
            self.pending_packages = selected_ids(&self.packages);
        }
        found
    }

    /// Read-only copy for presentations.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            active: self.active,
            cancellable: self.cancellable,
            pending_packages: self.pending_packages.clone(),
            packages: self.packages.clone(),
            last_checked: self.last_checked,
        }
    }
}

/// Serializable view of the session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub active: Option<TransactionTicket>,
    pub cancellable: bool,
    pub pending_packages: Vec<PackageId>,
    pub packages: Vec<PackageRecord>,
    pub last_checked: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::TransactionKind;

    fn ids(values: &[&str]) -> Vec<PackageId> {
        values.iter().map(|v| PackageId::parse(*v).unwrap()).collect()
    }

    fn state_with(values: &[&str]) -> SessionState {
        let mut state = SessionState::new();
        state.packages = ids(values).into_iter().map(PackageRecord::new).collect();
        state.pending_packages = ids(values);
        state
    }

    #[test]
    fn test_begin_and_finish() {
        let mut state = SessionState::new();
        assert!(!state.is_busy());

        let ticket = TransactionTicket::new(TransactionKind::Refresh, 1);
        state.begin(SessionPhase::Refreshing, ticket);
        assert!(state.is_busy());
        assert_eq!(state.active, Some(ticket));
        assert!(!state.cancellable);

        state.cancellable = true;
        state.finish();
        assert_eq!(state.phase, SessionPhase::Idle);
        assert_eq!(state.active, None);
        assert!(!state.cancellable);
    }

    #[test]
    fn test_select_follows_list_order() {
        let mut state = state_with(&["a-activity=1", "b-activity=1", "c-activity=1"]);
        state.select(&ids(&["c-activity=1", "a-activity=1"]));
        assert_eq!(state.pending_packages, ids(&["a-activity=1", "c-activity=1"]));
        assert!(!state.packages.iter().any(|p| p.id.name() == "b-activity" && p.selected));
    }

    #[test]
    fn test_toggle() {
        let mut state = state_with(&["a-activity=1", "b-activity=1"]);
        assert!(state.toggle(&PackageId::parse("a-activity=1").unwrap()));
        assert_eq!(state.pending_packages, ids(&["b-activity=1"]));

        assert!(!state.toggle(&PackageId::parse("zzz=1").unwrap()));
        assert_eq!(state.pending_packages, ids(&["b-activity=1"]));
    }
}
