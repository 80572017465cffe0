//! Session phases, transaction outcomes and transaction tickets.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Session Phase
// ============================================================================

/// The controller's current high-level activity.
///
/// Exactly one phase is active at any time. The only way from one busy
/// phase to another is through a terminal event that brings the session
/// back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No primary transaction in flight.
    #[default]
    Idle,

    /// Package metadata is being refreshed.
    Refreshing,

    /// A dependency simulation is computing the available upgrades.
    Checking,

    /// Selected packages are being installed.
    Updating,
}

impl SessionPhase {
    /// Returns the display label for this phase.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Refreshing => "refreshing",
            Self::Checking => "checking",
            Self::Updating => "updating",
        }
    }

    /// Headline shown while this phase is in progress.
    #[must_use]
    pub fn prompt(&self) -> &'static str {
        match self {
            Self::Idle => "Initializing...",
            Self::Refreshing => "Refreshing sources...",
            Self::Checking => "Checking for updates...",
            Self::Updating => "Installing updates...",
        }
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Backend completion status for a successful transaction.
pub const EXIT_SUCCESS: &str = "exit-success";

/// Backend completion status for a cancelled transaction.
pub const EXIT_CANCELLED: &str = "exit-cancelled";

/// How a transaction ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Cancelled,
    Failed { code: String },
}

impl Outcome {
    /// Classifies a backend completion status string.
    ///
    /// `"exit-success"` and `"exit-cancelled"` are matched exactly; any
    /// other status is a failure carrying the status as its code.
    pub fn from_status(status: &str) -> Self {
        match status {
            EXIT_SUCCESS => Self::Success,
            EXIT_CANCELLED => Self::Cancelled,
            other => Self::Failed {
                code: other.to_string(),
            },
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Failed { code } => write!(f, "failed ({code})"),
        }
    }
}

// ============================================================================
// Transaction Tickets
// ============================================================================

/// The kind of backend call a transaction was started with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// `updateCache()`
    Refresh,
    /// `upgradeSystemSimulate()`
    Check,
    /// `upgradePackages(ids)`
    Update,
    /// `simulateUpgrade(ids)`, the secondary download-size query
    SizeCheck,
}

impl TransactionKind {
    /// Phase a primary transaction of this kind runs in.
    ///
    /// Returns `None` for the size query, which never changes the phase.
    pub fn phase(&self) -> Option<SessionPhase> {
        match self {
            Self::Refresh => Some(SessionPhase::Refreshing),
            Self::Check => Some(SessionPhase::Checking),
            Self::Update => Some(SessionPhase::Updating),
            Self::SizeCheck => None,
        }
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Refresh => "refresh",
            Self::Check => "check",
            Self::Update => "update",
            Self::SizeCheck => "size-check",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Identity tag attached to every outgoing backend call.
///
/// `seq` increases monotonically per session, so a signal whose ticket
/// is not the latest one issued for its purpose is stale and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionTicket {
    pub kind: TransactionKind,
    pub seq: u64,
}

impl TransactionTicket {
    pub fn new(kind: TransactionKind, seq: u64) -> Self {
        Self { kind, seq }
    }
}

impl fmt::Display for TransactionTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_classification() {
        assert_eq!(Outcome::from_status("exit-success"), Outcome::Success);
        assert_eq!(Outcome::from_status("exit-cancelled"), Outcome::Cancelled);
        assert_eq!(
            Outcome::from_status("exit-failed"),
            Outcome::Failed {
                code: "exit-failed".to_string()
            }
        );
        // Matching is exact
        assert_eq!(
            Outcome::from_status("EXIT-SUCCESS"),
            Outcome::Failed {
                code: "EXIT-SUCCESS".to_string()
            }
        );
        assert!(matches!(Outcome::from_status(""), Outcome::Failed { .. }));
    }

    #[test]
    fn test_kind_phase_mapping() {
        assert_eq!(TransactionKind::Refresh.phase(), Some(SessionPhase::Refreshing));
        assert_eq!(TransactionKind::Check.phase(), Some(SessionPhase::Checking));
        assert_eq!(TransactionKind::Update.phase(), Some(SessionPhase::Updating));
        assert_eq!(TransactionKind::SizeCheck.phase(), None);
    }

    #[test]
    fn test_phase_prompts_are_distinct() {
        let prompts = [
            SessionPhase::Refreshing.prompt(),
            SessionPhase::Checking.prompt(),
            SessionPhase::Updating.prompt(),
        ];
        assert_ne!(prompts[0], prompts[1]);
        assert_ne!(prompts[1], prompts[2]);
        assert_ne!(prompts[0], prompts[2]);
    }

    #[test]
    fn test_ticket_display() {
        let ticket = TransactionTicket::new(TransactionKind::SizeCheck, 7);
        assert_eq!(ticket.to_string(), "size-check#7");
    }
}
