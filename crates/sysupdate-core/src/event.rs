//! Normalized transaction events.
//!
//! Every raw backend callback is translated into one of these before it
//! reaches the reducer, so the reducer never sees backend specifics.

use serde::{Deserialize, Serialize};

use crate::package::PackageRecord;
use crate::phase::Outcome;

/// Progress counters reported by a running transaction.
///
/// Item counters come from cache/index progress, byte counters from
/// download callbacks. Either pair may be zero when the backend does not
/// report it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub items_done: u64,
    pub items_total: u64,
    pub bytes_done: u64,
    pub bytes_total: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_text: Option<String>,
}

impl ProgressUpdate {
    /// Progress from item counters only.
    pub fn items(done: u64, total: u64) -> Self {
        Self {
            items_done: done,
            items_total: total,
            ..Self::default()
        }
    }

    /// Progress from byte counters only.
    pub fn bytes(done: u64, total: u64) -> Self {
        Self {
            bytes_done: done,
            bytes_total: total,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail_text = Some(detail.into());
        self
    }

    /// Completed fraction in `[0, 1]`.
    ///
    /// Prefers bytes when a byte total is known, falls back to items, and
    /// reports `0.0` when neither total is known.
    #[must_use]
    pub fn fraction(&self) -> f64 {
        if self.bytes_total > 0 {
            ratio(self.bytes_done, self.bytes_total)
        } else if self.items_total > 0 {
            ratio(self.items_done, self.items_total)
        } else {
            0.0
        }
    }
}

fn ratio(done: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (done as f64 / total as f64).clamp(0.0, 1.0)
}

/// Backend-agnostic transaction event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionEvent {
    /// Progress counters changed.
    ProgressUpdate(ProgressUpdate),

    /// The dependency simulation produced the (already filtered) upgrade set.
    DependenciesResolved { packages: Vec<PackageRecord> },

    /// The size query computed the download size of the current selection.
    DownloadSizeKnown { bytes: u64 },

    /// The transaction ended.
    Finished { outcome: Outcome },

    /// The transaction started or stopped accepting cancellation.
    CancellableChanged { cancellable: bool },

    /// The backend reported a transaction-level error.
    Failed { code: String, detail: String },
}

impl TransactionEvent {
    /// True for events after which the transaction is over.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished { .. } | Self::Failed { .. })
    }
}
