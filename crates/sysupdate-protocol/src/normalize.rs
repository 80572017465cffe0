//! Raw signal normalization.
//!
//! The `Normalizer` is the only place that knows how backend callbacks
//! map onto `TransactionEvent`s:
//! - `progress` and `downloadDetail` become `ProgressUpdate`s
//! - `dependenciesResolved` keeps only upgrades whose package name ends
//!   with the installable suffix; everything else is a system package
//!   and never reaches the user
//! - `finished(status)` is classified into an `Outcome`
//!
//! Malformed package ids are logged and skipped.

use sysupdate_core::{
    Outcome, PackageId, PackageRecord, ProgressUpdate, TransactionEvent, TransactionKind,
};
use tracing::{debug, warn};

use crate::signal::{DependencySet, RawSignal};

/// Suffix marking end-user installable content bundles.
pub const DEFAULT_INSTALLABLE_SUFFIX: &str = "activity";

/// Translates raw signals into normalized events.
#[derive(Debug, Clone)]
pub struct Normalizer {
    installable_suffix: String,
    detail_text: bool,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_INSTALLABLE_SUFFIX, true)
    }
}

impl Normalizer {
    /// Creates a normalizer.
    ///
    /// # Arguments
    ///
    /// * `installable_suffix` - Package-name suffix kept from upgrade sets
    /// * `detail_text` - Whether `downloadDetail` descriptions are surfaced
    pub fn new(installable_suffix: impl Into<String>, detail_text: bool) -> Self {
        Self {
            installable_suffix: installable_suffix.into(),
            detail_text,
        }
    }

    pub fn installable_suffix(&self) -> &str {
        &self.installable_suffix
    }

    /// Normalizes one signal from a transaction of the given kind.
    ///
    /// Returns `None` for signals that carry nothing for this kind, such
    /// as a download size reported by a primary transaction.
    pub fn normalize(&self, kind: TransactionKind, signal: RawSignal) -> Option<TransactionEvent> {
        let event = match signal {
            RawSignal::Progress {
                items_done,
                items_total,
                bytes_done,
                bytes_total,
            } => TransactionEvent::ProgressUpdate(ProgressUpdate {
                items_done,
                items_total,
                bytes_done,
                bytes_total,
                detail_text: None,
            }),
            RawSignal::DownloadDetail {
                uri,
                description,
                bytes_total,
                bytes_done,
                ..
            } => {
                // Byte counts still drive the fraction without the text
                let detail_text = if self.detail_text {
                    (!description.is_empty()).then_some(description)
                } else {
                    debug!(uri = %uri, "Dropping download detail text");
                    None
                };
                TransactionEvent::ProgressUpdate(ProgressUpdate {
                    bytes_done,
                    bytes_total,
                    detail_text,
                    ..ProgressUpdate::default()
                })
            }
            RawSignal::DependenciesResolved(set) => TransactionEvent::DependenciesResolved {
                packages: self.installable_upgrades(&set),
            },
            RawSignal::Finished { status } => TransactionEvent::Finished {
                outcome: Outcome::from_status(&status),
            },
            RawSignal::CancellableChanged { cancellable } => {
                TransactionEvent::CancellableChanged { cancellable }
            }
            RawSignal::Error { code, detail } => TransactionEvent::Failed { code, detail },
            RawSignal::DownloadSizeChanged { bytes } => {
                if kind != TransactionKind::SizeCheck {
                    debug!(%kind, bytes, "Ignoring download size from primary transaction");
                    return None;
                }
                TransactionEvent::DownloadSizeKnown { bytes }
            }
        };
        Some(event)
    }

    /// Upgrade records that are installable content, in backend order.
    pub fn installable_upgrades(&self, set: &DependencySet) -> Vec<PackageRecord> {
        let mut records: Vec<PackageRecord> = Vec::new();

        for raw in &set.upgrades {
            let id = match PackageId::parse(raw.as_str()) {
                Ok(id) => id,
                Err(e) => {
                    warn!(error = %e, "Skipping malformed upgrade entry");
                    continue;
                }
            };
            if !id.has_suffix(&self.installable_suffix) {
                continue;
            }
            if records.iter().any(|r| r.id == id) {
                // Rows are keyed by id, so duplicates collide in selection
                warn!(package = %id, "Duplicate package id in upgrade set");
            }
            records.push(PackageRecord::new(id));
        }

        debug!(
            upgrades = set.upgrades.len(),
            installable = records.len(),
            "Filtered upgrade set"
        );
        records
    }
}
