//! Pure view-state reducer.
//!
//! Maps the current session state, the current view and one normalized
//! event to the next state, the next view and any follow-up intents the
//! controller must execute. Nothing here performs I/O or reads the clock.
//!
//! ```text
//!  Idle ──refresh()──▶ Refreshing ──Finished(ok)──▶ Idle + Intent::Check
//!  Idle ──check()───▶ Checking ──Finished(ok)──▶ Idle  (UpToDate | UpdateList + Intent::CheckSize)
//!  Idle ──update()──▶ Updating ──Finished(ok)──▶ Idle  (Installed)
//!  any busy phase ──Finished(cancelled) | Finished(failed) | Failed──▶ Idle
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::event::{ProgressUpdate, TransactionEvent};
use crate::package::{PackageId, PackageRecord};
use crate::phase::{Outcome, SessionPhase};
use crate::session::SessionState;
use crate::size::format_size;
use crate::view::{
    ProgressView, UpdateListView, ViewState, ERROR_HEADLINE, PLEASE_WAIT, SIZE_CALCULATING,
};

// ============================================================================
// Options, Intents, Transitions
// ============================================================================

/// Behaviour switches that distinguish the pane variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReducerOptions {
    /// Query and show the download size of the selection.
    pub size_check: bool,

    /// Report real byte/item progress while updating. When off, updating
    /// reports a fixed `1.0` like the simulation phases.
    pub download_progress: bool,

    /// Surface per-file detail text in the progress pane.
    pub detail_text: bool,
}

impl Default for ReducerOptions {
    fn default() -> Self {
        Self {
            size_check: true,
            download_progress: true,
            detail_text: true,
        }
    }
}

/// Follow-up work the controller must start after applying a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Start the dependency simulation (refresh auto-chains into check).
    Check,

    /// Query the download size of these packages.
    CheckSize(Vec<PackageId>),
}

/// Result of reducing one input.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: SessionState,
    pub view: ViewState,
    pub intents: Vec<Intent>,
}

impl Transition {
    fn unchanged(state: &SessionState, view: &ViewState) -> Self {
        Self {
            state: state.clone(),
            view: view.clone(),
            intents: Vec::new(),
        }
    }
}

// ============================================================================
// Phase Start
// ============================================================================

/// View shown when a primary transaction has just started.
///
/// Simulation phases start at `1.0`, the others at `0.0`. Detail text
/// already shown for the same phase (the post-refresh "Please wait...")
/// is kept.
pub fn started(view: &ViewState, phase: SessionPhase, options: &ReducerOptions) -> ViewState {
    let fraction = match phase {
        SessionPhase::Checking => 1.0,
        SessionPhase::Updating if !options.download_progress => 1.0,
        _ => 0.0,
    };
    let detail = view
        .as_progress()
        .filter(|p| p.phase == phase)
        .and_then(|p| p.detail.clone());

    ViewState::ShowingProgress(ProgressView {
        phase,
        fraction,
        message: phase.prompt().to_string(),
        detail,
        cancellable: false,
    })
}

// ============================================================================
// Event Reduction
// ============================================================================

/// Reduces one normalized transaction event.
pub fn reduce(
    state: &SessionState,
    view: &ViewState,
    event: &TransactionEvent,
    options: &ReducerOptions,
) -> Transition {
    match event {
        TransactionEvent::ProgressUpdate(update) => on_progress(state, view, update, options),
        TransactionEvent::DependenciesResolved { packages } => {
            on_dependencies_resolved(state, view, packages)
        }
        TransactionEvent::DownloadSizeKnown { bytes } => {
            on_download_size(state, view, *bytes, options)
        }
        TransactionEvent::CancellableChanged { cancellable } => {
            on_cancellable(state, view, *cancellable)
        }
        TransactionEvent::Finished { outcome } => on_finished(state, view, outcome, options),
        TransactionEvent::Failed { .. } => on_failed(state, view),
    }
}

fn on_progress(
    state: &SessionState,
    view: &ViewState,
    update: &ProgressUpdate,
    options: &ReducerOptions,
) -> Transition {
    let phase = state.phase;
    let fraction = match phase {
        SessionPhase::Idle => return Transition::unchanged(state, view),
        SessionPhase::Refreshing => update.fraction(),
        // Simulation is not fine-grained
        SessionPhase::Checking => 1.0,
        SessionPhase::Updating if options.download_progress => update.fraction(),
        SessionPhase::Updating => 1.0,
    };

    let detail = if options.detail_text {
        update.detail_text.clone().or_else(|| {
            view.as_progress()
                .filter(|p| p.phase == phase)
                .and_then(|p| p.detail.clone())
        })
    } else {
        None
    };

    Transition {
        state: state.clone(),
        view: ViewState::ShowingProgress(ProgressView {
            phase,
            fraction,
            message: phase.prompt().to_string(),
            detail,
            cancellable: state.cancellable,
        }),
        intents: Vec::new(),
    }
}

fn on_dependencies_resolved(
    state: &SessionState,
    view: &ViewState,
    packages: &[PackageRecord],
) -> Transition {
    if state.phase != SessionPhase::Checking {
        debug!(phase = %state.phase, "Ignoring dependency resolution outside checking");
        return Transition::unchanged(state, view);
    }

    let mut next = state.clone();
    next.packages = packages.to_vec();
    next.pending_packages = crate::package::selected_ids(&next.packages);

    Transition {
        state: next,
        view: view.clone(),
        intents: Vec::new(),
    }
}

fn on_download_size(
    state: &SessionState,
    view: &ViewState,
    bytes: u64,
    options: &ReducerOptions,
) -> Transition {
    match view {
        ViewState::ShowingUpdateList(list) if options.size_check => Transition {
            state: state.clone(),
            view: ViewState::ShowingUpdateList(UpdateListView {
                packages: list.packages.clone(),
                total_size_label: Some(format_size(bytes)),
            }),
            intents: Vec::new(),
        },
        _ => Transition::unchanged(state, view),
    }
}

fn on_cancellable(state: &SessionState, view: &ViewState, cancellable: bool) -> Transition {
    if state.active.is_none() {
        return Transition::unchanged(state, view);
    }

    let mut next = state.clone();
    next.cancellable = cancellable;

    let view = match view {
        ViewState::ShowingProgress(progress) => ViewState::ShowingProgress(ProgressView {
            cancellable,
            ..progress.clone()
        }),
        other => other.clone(),
    };

    Transition {
        state: next,
        view,
        intents: Vec::new(),
    }
}

fn on_finished(
    state: &SessionState,
    view: &ViewState,
    outcome: &Outcome,
    options: &ReducerOptions,
) -> Transition {
    if state.phase.is_idle() {
        return Transition::unchanged(state, view);
    }

    match outcome {
        Outcome::Success => on_success(state, view, options),
        Outcome::Cancelled => {
            let mut next = state.clone();
            next.finish();
            Transition {
                state: next,
                view: ViewState::ShowingCancelled,
                intents: Vec::new(),
            }
        }
        Outcome::Failed { .. } => on_failed(state, view),
    }
}

fn on_success(state: &SessionState, view: &ViewState, options: &ReducerOptions) -> Transition {
    let mut next = state.clone();
    next.finish();

    match state.phase {
        SessionPhase::Idle => Transition::unchanged(state, view),
        SessionPhase::Refreshing => Transition {
            state: next,
            view: ViewState::ShowingProgress(ProgressView {
                phase: SessionPhase::Checking,
                fraction: 1.0,
                message: SessionPhase::Checking.prompt().to_string(),
                detail: Some(PLEASE_WAIT.to_string()),
                cancellable: false,
            }),
            intents: vec![Intent::Check],
        },
        SessionPhase::Checking => {
            if next.packages.is_empty() {
                next.pending_packages.clear();
                return Transition {
                    state: next,
                    view: ViewState::ShowingUpToDate,
                    intents: Vec::new(),
                };
            }

            let mut intents = Vec::new();
            if options.size_check && !next.pending_packages.is_empty() {
                intents.push(Intent::CheckSize(next.pending_packages.clone()));
            }
            let view = ViewState::ShowingUpdateList(UpdateListView {
                packages: next.packages.clone(),
                total_size_label: options.size_check.then(|| SIZE_CALCULATING.to_string()),
            });
            Transition {
                state: next,
                view,
                intents,
            }
        }
        SessionPhase::Updating => {
            let count = next.pending_packages.len();
            next.pending_packages.clear();
            next.packages.clear();
            Transition {
                state: next,
                view: ViewState::ShowingInstalled { count },
                intents: Vec::new(),
            }
        }
    }
}

fn on_failed(state: &SessionState, view: &ViewState) -> Transition {
    if state.phase.is_idle() {
        return Transition::unchanged(state, view);
    }

    let mut next = state.clone();
    next.finish();
    Transition {
        state: next,
        view: ViewState::ShowingError {
            message: ERROR_HEADLINE.to_string(),
        },
        intents: Vec::new(),
    }
}

// ============================================================================
// Selection
// ============================================================================

/// Replaces the selection with `ids`.
pub fn select(
    state: &SessionState,
    view: &ViewState,
    ids: &[PackageId],
    options: &ReducerOptions,
) -> Transition {
    let mut next = state.clone();
    next.select(ids);
    selection_changed(next, view, options)
}

/// Flips the selection of one package.
pub fn toggle(
    state: &SessionState,
    view: &ViewState,
    id: &PackageId,
    options: &ReducerOptions,
) -> Transition {
    let mut next = state.clone();
    if !next.toggle(id) {
        debug!(package = %id, "Toggle for unknown package ignored");
        return Transition::unchanged(state, view);
    }
    selection_changed(next, view, options)
}

fn selection_changed(next: SessionState, view: &ViewState, options: &ReducerOptions) -> Transition {
    let ViewState::ShowingUpdateList(_) = view else {
        return Transition {
            state: next,
            view: view.clone(),
            intents: Vec::new(),
        };
    };

    let mut intents = Vec::new();
    let total_size_label = if !options.size_check {
        None
    } else if next.pending_packages.is_empty() {
        Some(format_size(0))
    } else {
        intents.push(Intent::CheckSize(next.pending_packages.clone()));
        Some(SIZE_CALCULATING.to_string())
    };

    let view = ViewState::ShowingUpdateList(UpdateListView {
        packages: next.packages.clone(),
        total_size_label,
    });
    Transition {
        state: next,
        view,
        intents,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::{TransactionKind, TransactionTicket};

    fn ids(values: &[&str]) -> Vec<PackageId> {
        values.iter().map(|v| PackageId::parse(*v).unwrap()).collect()
    }

    fn records(values: &[&str]) -> Vec<PackageRecord> {
        ids(values).into_iter().map(PackageRecord::new).collect()
    }

    fn busy(phase: SessionPhase, kind: TransactionKind) -> SessionState {
        let mut state = SessionState::new();
        state.begin(phase, TransactionTicket::new(kind, 1));
        state
    }

    fn finished(outcome: Outcome) -> TransactionEvent {
        TransactionEvent::Finished { outcome }
    }

    // ------------------------------------------------------------------------
    // Progress
    // ------------------------------------------------------------------------

    #[test]
    fn test_progress_while_refreshing_uses_items() {
        let state = busy(SessionPhase::Refreshing, TransactionKind::Refresh);
        let event = TransactionEvent::ProgressUpdate(ProgressUpdate::items(1, 4));

        let t = reduce(&state, &ViewState::Initializing, &event, &ReducerOptions::default());

        let progress = t.view.as_progress().expect("progress view");
        assert_eq!(progress.phase, SessionPhase::Refreshing);
        assert!((progress.fraction - 0.25).abs() < f64::EPSILON);
        assert_eq!(progress.message, "Refreshing sources...");
        assert!(!progress.cancellable);
        assert!(t.intents.is_empty());
    }

    #[test]
    fn test_progress_while_checking_is_fixed() {
        let state = busy(SessionPhase::Checking, TransactionKind::Check);
        let event = TransactionEvent::ProgressUpdate(ProgressUpdate::items(1, 100));

        let t = reduce(&state, &ViewState::Initializing, &event, &ReducerOptions::default());

        assert_eq!(t.view.as_progress().unwrap().fraction, 1.0);
    }

    #[test]
    fn test_progress_while_updating_uses_bytes() {
        let state = busy(SessionPhase::Updating, TransactionKind::Update);
        let event = TransactionEvent::ProgressUpdate(ProgressUpdate::bytes(50, 200));

        let t = reduce(&state, &ViewState::Initializing, &event, &ReducerOptions::default());

        let progress = t.view.as_progress().unwrap();
        assert!((progress.fraction - 0.25).abs() < f64::EPSILON);
        assert_eq!(progress.message, "Installing updates...");
    }

    #[test]
    fn test_progress_while_updating_zero_total() {
        let state = busy(SessionPhase::Updating, TransactionKind::Update);
        let event = TransactionEvent::ProgressUpdate(ProgressUpdate::bytes(50, 0));

        let t = reduce(&state, &ViewState::Initializing, &event, &ReducerOptions::default());

        assert_eq!(t.view.as_progress().unwrap().fraction, 0.0);
    }

    #[test]
    fn test_progress_coarse_updating() {
        let options = ReducerOptions {
            download_progress: false,
            ..ReducerOptions::default()
        };
        let state = busy(SessionPhase::Updating, TransactionKind::Update);
        let event = TransactionEvent::ProgressUpdate(ProgressUpdate::bytes(1, 200));

        let t = reduce(&state, &ViewState::Initializing, &event, &options);

        assert_eq!(t.view.as_progress().unwrap().fraction, 1.0);
    }

    #[test]
    fn test_progress_detail_is_sticky_within_phase() {
        let state = busy(SessionPhase::Updating, TransactionKind::Update);
        let options = ReducerOptions::default();

        let first = TransactionEvent::ProgressUpdate(
            ProgressUpdate::bytes(10, 100).with_detail("Downloading foo"),
        );
        let t = reduce(&state, &ViewState::Initializing, &first, &options);
        assert_eq!(
            t.view.as_progress().unwrap().detail.as_deref(),
            Some("Downloading foo")
        );

        let second = TransactionEvent::ProgressUpdate(ProgressUpdate::bytes(20, 100));
        let t = reduce(&state, &t.view, &second, &options);
        assert_eq!(
            t.view.as_progress().unwrap().detail.as_deref(),
            Some("Downloading foo")
        );
    }

    #[test]
    fn test_progress_detail_disabled() {
        let options = ReducerOptions {
            detail_text: false,
            ..ReducerOptions::default()
        };
        let state = busy(SessionPhase::Updating, TransactionKind::Update);
        let event = TransactionEvent::ProgressUpdate(
            ProgressUpdate::bytes(10, 100).with_detail("Downloading foo"),
        );

        let t = reduce(&state, &ViewState::Initializing, &event, &options);

        assert_eq!(t.view.as_progress().unwrap().detail, None);
    }

    #[test]
    fn test_progress_when_idle_is_ignored() {
        let state = SessionState::new();
        let event = TransactionEvent::ProgressUpdate(ProgressUpdate::items(1, 2));

        let t = reduce(&state, &ViewState::ShowingUpToDate, &event, &ReducerOptions::default());

        assert_eq!(t.view, ViewState::ShowingUpToDate);
        assert_eq!(t.state, state);
    }

    // ------------------------------------------------------------------------
    // Finished
    // ------------------------------------------------------------------------

    #[test]
    fn test_refresh_success_chains_into_check() {
        let state = busy(SessionPhase::Refreshing, TransactionKind::Refresh);

        let t = reduce(
            &state,
            &ViewState::Initializing,
            &finished(Outcome::Success),
            &ReducerOptions::default(),
        );

        assert_eq!(t.intents, vec![Intent::Check]);
        assert_eq!(t.state.phase, SessionPhase::Idle);
        assert_eq!(t.state.active, None);
        let progress = t.view.as_progress().unwrap();
        assert_eq!(progress.phase, SessionPhase::Checking);
        assert_eq!(progress.fraction, 1.0);
        assert_eq!(progress.detail.as_deref(), Some(PLEASE_WAIT));
        assert!(!progress.cancellable);
    }

    #[test]
    fn test_check_success_with_packages() {
        let mut state = busy(SessionPhase::Checking, TransactionKind::Check);
        let options = ReducerOptions::default();

        let resolved = TransactionEvent::DependenciesResolved {
            packages: records(&["x-activity=2=1"]),
        };
        let t = reduce(&state, &ViewState::Initializing, &resolved, &options);
        state = t.state;
        assert_eq!(state.pending_packages, ids(&["x-activity=2=1"]));

        let t = reduce(&state, &t.view, &finished(Outcome::Success), &options);

        let list = t.view.as_update_list().expect("update list");
        assert_eq!(list.packages.len(), 1);
        assert_eq!(list.total_size_label.as_deref(), Some(SIZE_CALCULATING));
        assert_eq!(t.intents, vec![Intent::CheckSize(ids(&["x-activity=2=1"]))]);
        assert_eq!(t.state.phase, SessionPhase::Idle);
    }

    #[test]
    fn test_check_success_without_size_check() {
        let mut state = busy(SessionPhase::Checking, TransactionKind::Check);
        state.packages = records(&["a-activity=1"]);
        let options = ReducerOptions {
            size_check: false,
            ..ReducerOptions::default()
        };

        let t = reduce(&state, &ViewState::Initializing, &finished(Outcome::Success), &options);

        assert_eq!(t.view.as_update_list().unwrap().total_size_label, None);
        assert!(t.intents.is_empty());
    }

    #[test]
    fn test_check_success_empty_is_up_to_date() {
        let state = busy(SessionPhase::Checking, TransactionKind::Check);

        let t = reduce(
            &state,
            &ViewState::Initializing,
            &finished(Outcome::Success),
            &ReducerOptions::default(),
        );

        assert_eq!(t.view, ViewState::ShowingUpToDate);
        assert!(t.intents.is_empty());
    }

    #[test]
    fn test_update_success_counts_packages() {
        let mut state = busy(SessionPhase::Updating, TransactionKind::Update);
        state.pending_packages = ids(&["a-activity=1", "b-activity=2"]);

        let t = reduce(
            &state,
            &ViewState::Initializing,
            &finished(Outcome::Success),
            &ReducerOptions::default(),
        );

        assert_eq!(t.view, ViewState::ShowingInstalled { count: 2 });
        assert!(t.state.pending_packages.is_empty());
    }

    #[test]
    fn test_cancelled_in_every_phase() {
        for (phase, kind) in [
            (SessionPhase::Refreshing, TransactionKind::Refresh),
            (SessionPhase::Checking, TransactionKind::Check),
            (SessionPhase::Updating, TransactionKind::Update),
        ] {
            let mut state = busy(phase, kind);
            state.cancellable = true;

            let t = reduce(
                &state,
                &ViewState::Initializing,
                &finished(Outcome::Cancelled),
                &ReducerOptions::default(),
            );

            assert_eq!(t.view, ViewState::ShowingCancelled, "phase {phase}");
            assert_eq!(t.state.active, None);
            assert!(!t.state.cancellable);
            assert_eq!(t.state.phase, SessionPhase::Idle);
        }
    }

    #[test]
    fn test_failures_show_error() {
        let state = busy(SessionPhase::Updating, TransactionKind::Update);
        let options = ReducerOptions::default();
        let expected = ViewState::ShowingError {
            message: ERROR_HEADLINE.to_string(),
        };

        let failed = TransactionEvent::Failed {
            code: "conn-failed".into(),
            detail: "no route".into(),
        };
        let t = reduce(&state, &ViewState::Initializing, &failed, &options);
        assert_eq!(t.view, expected);
        assert_eq!(t.state.phase, SessionPhase::Idle);

        let t = reduce(
            &state,
            &ViewState::Initializing,
            &finished(Outcome::from_status("exit-failed")),
            &options,
        );
        assert_eq!(t.view, expected);
    }

    #[test]
    fn test_finished_when_idle_is_ignored() {
        let state = SessionState::new();
        let t = reduce(
            &state,
            &ViewState::ShowingUpToDate,
            &finished(Outcome::Cancelled),
            &ReducerOptions::default(),
        );
        assert_eq!(t.view, ViewState::ShowingUpToDate);
    }

    // ------------------------------------------------------------------------
    // Size, cancellable, selection
    // ------------------------------------------------------------------------

    fn list_view(values: &[&str]) -> ViewState {
        ViewState::ShowingUpdateList(UpdateListView {
            packages: records(values),
            total_size_label: Some(SIZE_CALCULATING.to_string()),
        })
    }

    #[test]
    fn test_download_size_updates_label_only() {
        let state = SessionState::new();
        let view = list_view(&["a-activity=1"]);
        let event = TransactionEvent::DownloadSizeKnown { bytes: 250 * 1024 };

        let t = reduce(&state, &view, &event, &ReducerOptions::default());

        let list = t.view.as_update_list().unwrap();
        assert_eq!(list.total_size_label.as_deref(), Some("250 KB"));
        assert_eq!(list.packages, records(&["a-activity=1"]));
    }

    #[test]
    fn test_download_size_outside_list_is_ignored() {
        let state = SessionState::new();
        let event = TransactionEvent::DownloadSizeKnown { bytes: 10 };
        let t = reduce(&state, &ViewState::ShowingCancelled, &event, &ReducerOptions::default());
        assert_eq!(t.view, ViewState::ShowingCancelled);
    }

    #[test]
    fn test_cancellable_changes_only_that_field() {
        let state = busy(SessionPhase::Refreshing, TransactionKind::Refresh);
        let progress = ProgressView {
            phase: SessionPhase::Refreshing,
            fraction: 0.5,
            message: "Refreshing sources...".into(),
            detail: Some("x".into()),
            cancellable: false,
        };
        let view = ViewState::ShowingProgress(progress.clone());
        let event = TransactionEvent::CancellableChanged { cancellable: true };

        let t = reduce(&state, &view, &event, &ReducerOptions::default());

        assert!(t.state.cancellable);
        assert_eq!(
            t.view,
            ViewState::ShowingProgress(ProgressView {
                cancellable: true,
                ..progress
            })
        );
    }

    #[test]
    fn test_cancellable_without_active_is_ignored() {
        let state = SessionState::new();
        let event = TransactionEvent::CancellableChanged { cancellable: true };
        let t = reduce(&state, &ViewState::Initializing, &event, &ReducerOptions::default());
        assert!(!t.state.cancellable);
    }

    #[test]
    fn test_selection_change_requests_size() {
        let mut state = SessionState::new();
        state.packages = records(&["a-activity=1", "b-activity=1"]);
        state.pending_packages = ids(&["a-activity=1", "b-activity=1"]);
        let view = list_view(&["a-activity=1", "b-activity=1"]);

        let t = select(&state, &view, &ids(&["b-activity=1"]), &ReducerOptions::default());

        assert_eq!(t.state.pending_packages, ids(&["b-activity=1"]));
        assert_eq!(t.intents, vec![Intent::CheckSize(ids(&["b-activity=1"]))]);
        let list = t.view.as_update_list().unwrap();
        assert_eq!(list.total_size_label.as_deref(), Some(SIZE_CALCULATING));
        assert_eq!(list.selected_count(), 1);
    }

    #[test]
    fn test_empty_selection_shows_none() {
        let mut state = SessionState::new();
        state.packages = records(&["a-activity=1"]);
        state.pending_packages = ids(&["a-activity=1"]);
        let view = list_view(&["a-activity=1"]);

        let t = toggle(&state, &view, &PackageId::parse("a-activity=1").unwrap(), &ReducerOptions::default());

        assert!(t.intents.is_empty());
        let list = t.view.as_update_list().unwrap();
        assert_eq!(list.total_size_label.as_deref(), Some("None"));
        assert!(!list.can_install());
    }

    #[test]
    fn test_started_keeps_please_wait_for_check() {
        let after_refresh = ViewState::ShowingProgress(ProgressView {
            phase: SessionPhase::Checking,
            fraction: 1.0,
            message: SessionPhase::Checking.prompt().to_string(),
            detail: Some(PLEASE_WAIT.to_string()),
            cancellable: false,
        });

        let view = started(&after_refresh, SessionPhase::Checking, &ReducerOptions::default());
        assert_eq!(view, after_refresh);

        let view = started(&after_refresh, SessionPhase::Refreshing, &ReducerOptions::default());
        let progress = view.as_progress().unwrap();
        assert_eq!(progress.fraction, 0.0);
        assert_eq!(progress.detail, None);
        assert_eq!(progress.message, "Refreshing sources...");
    }
}
