//! Raw signals pushed by a package-transaction service.
//!
//! One variant per backend callback. Field names follow the service's
//! callback arguments; all counters default to zero so partial payloads
//! from scenario files deserialize.

use serde::{Deserialize, Serialize};

/// Package sets computed by a dependency simulation.
///
/// Every entry is a `"name=version"` string as reported by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DependencySet {
    pub installs: Vec<String>,
    pub reinstalls: Vec<String>,
    pub removals: Vec<String>,
    pub purges: Vec<String>,
    pub upgrades: Vec<String>,
    pub downgrades: Vec<String>,
    pub kept: Vec<String>,
}

impl DependencySet {
    /// A set that only contains upgrades.
    pub fn upgrades<I, S>(upgrades: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            upgrades: upgrades.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// True if the simulation would not change anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.installs.is_empty()
            && self.reinstalls.is_empty()
            && self.removals.is_empty()
            && self.purges.is_empty()
            && self.upgrades.is_empty()
            && self.downgrades.is_empty()
    }
}

/// One raw callback from a running transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum RawSignal {
    /// `progress(itemsDone, itemsTotal, bytesDone, bytesTotal)`
    Progress {
        #[serde(default)]
        items_done: u64,
        #[serde(default)]
        items_total: u64,
        #[serde(default)]
        bytes_done: u64,
        #[serde(default)]
        bytes_total: u64,
    },

    /// `downloadDetail(uri, status, description, bytesTotal, bytesDone)`
    DownloadDetail {
        #[serde(default)]
        uri: String,
        #[serde(default)]
        status: String,
        #[serde(default)]
        description: String,
        #[serde(default)]
        bytes_total: u64,
        #[serde(default)]
        bytes_done: u64,
    },

    /// `dependenciesResolved(installs, reinstalls, removals, purges, upgrades, downgrades, kept)`
    DependenciesResolved(DependencySet),

    /// `finished(status)`
    Finished { status: String },

    /// `cancellableChanged(bool)`
    CancellableChanged { cancellable: bool },

    /// `error(code, detail)`
    Error {
        code: String,
        #[serde(default)]
        detail: String,
    },

    /// `downloadSizeChanged(bytes)`
    DownloadSizeChanged { bytes: u64 },
}

impl RawSignal {
    /// Shorthand for a `finished` signal.
    pub fn finished(status: impl Into<String>) -> Self {
        Self::Finished {
            status: status.into(),
        }
    }

    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Progress { .. } => "progress",
            Self::DownloadDetail { .. } => "download_detail",
            Self::DependenciesResolved(_) => "dependencies_resolved",
            Self::Finished { .. } => "finished",
            Self::CancellableChanged { .. } => "cancellable_changed",
            Self::Error { .. } => "error",
            Self::DownloadSizeChanged { .. } => "download_size_changed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_from_json() {
        let signal: RawSignal = serde_json::from_str(
            r#"{"signal": "progress", "items_done": 2, "items_total": 8}"#,
        )
        .unwrap();
        assert_eq!(
            signal,
            RawSignal::Progress {
                items_done: 2,
                items_total: 8,
                bytes_done: 0,
                bytes_total: 0,
            }
        );
    }

    #[test]
    fn test_dependencies_from_toml() {
        let signal: RawSignal = toml::from_str(
            r#"
            signal = "dependencies_resolved"
            upgrades = ["foo=1.0", "bar-activity=2.0"]
            kept = ["baz=3.0"]
            "#,
        )
        .unwrap();
        let RawSignal::DependenciesResolved(set) = signal else {
            panic!("expected dependencies_resolved, got {signal:?}");
        };
        assert_eq!(set.upgrades, vec!["foo=1.0", "bar-activity=2.0"]);
        assert_eq!(set.kept, vec!["baz=3.0"]);
        assert!(set.installs.is_empty());
        assert!(!set.is_empty());
    }

    #[test]
    fn test_kept_only_is_empty() {
        let set = DependencySet {
            kept: vec!["a=1".into()],
            ..DependencySet::default()
        };
        assert!(set.is_empty());
    }

    #[test]
    fn test_unknown_signal_rejected() {
        let result: Result<RawSignal, _> = serde_json::from_str(r#"{"signal": "exploded"}"#);
        assert!(result.is_err());
    }
}
