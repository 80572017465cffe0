//! Replay scripts for the scripted backend.
//!
//! A scenario holds one script per primary call plus the download sizes
//! used to answer size queries:
//!
//! ```toml
//! size_delay_ms = 200
//!
//! [download_sizes]
//! "write-activity=84" = 1048576
//!
//! [[refresh]]
//! delay_ms = 100
//! emit = { signal = "cancellable_changed", cancellable = true }
//!
//! [[refresh]]
//! delay_ms = 500
//! emit = { signal = "finished", status = "exit-success" }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sysupdate_core::{PackageId, TransactionKind};
use sysupdate_protocol::{DependencySet, RawSignal};
use tracing::debug;

use crate::error::ScenarioError;

/// One scripted signal, emitted after `delay_ms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    #[serde(default)]
    pub delay_ms: u64,
    pub emit: RawSignal,
}

impl Step {
    pub fn new(delay_ms: u64, emit: RawSignal) -> Self {
        Self { delay_ms, emit }
    }
}

/// Scripts and data replayed by `ScriptedService`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub refresh: Vec<Step>,
    pub check: Vec<Step>,
    pub update: Vec<Step>,

    /// Delay before a size query answers.
    pub size_delay_ms: u64,

    /// Download size per package id, in bytes.
    pub download_sizes: BTreeMap<String, u64>,
}

impl Scenario {
    /// Parses a scenario from TOML text.
    ///
    /// # Errors
    ///
    /// `ScenarioError::Parse` if the text is not a valid scenario.
    pub fn from_toml_str(s: &str) -> Result<Self, ScenarioError> {
        Ok(toml::from_str(s)?)
    }

    /// Loads a scenario file.
    ///
    /// # Errors
    ///
    /// `ScenarioError::Io` if the file cannot be read, `ScenarioError::Parse`
    /// if it is not a valid scenario.
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let content = fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Script for a primary call.
    pub fn script(&self, kind: TransactionKind) -> &[Step] {
        match kind {
            TransactionKind::Refresh => &self.refresh,
            TransactionKind::Check => &self.check,
            TransactionKind::Update => &self.update,
            TransactionKind::SizeCheck => &[],
        }
    }

    /// Sum of the known download sizes of `ids`. Unknown ids count as zero.
    pub fn download_size(&self, ids: &[PackageId]) -> u64 {
        ids.iter()
            .map(|id| match self.download_sizes.get(id.as_str()) {
                Some(bytes) => *bytes,
                None => {
                    debug!(package = %id, "No download size known");
                    0
                }
            })
            .sum()
    }

    /// Script answering a size query for `ids`.
    pub fn size_script(&self, ids: &[PackageId]) -> Vec<Step> {
        vec![
            Step::new(
                self.size_delay_ms,
                RawSignal::DownloadSizeChanged {
                    bytes: self.download_size(ids),
                },
            ),
            Step::new(0, RawSignal::finished(sysupdate_core::phase::EXIT_SUCCESS)),
        ]
    }

    /// A small scenario with two installable updates and one system package.
    pub fn demo() -> Self {
        let success = || RawSignal::finished(sysupdate_core::phase::EXIT_SUCCESS);
        let cancellable = |c: bool| RawSignal::CancellableChanged { cancellable: c };
        let items = |done: u64, total: u64| RawSignal::Progress {
            items_done: done,
            items_total: total,
            bytes_done: 0,
            bytes_total: 0,
        };

        let refresh = vec![
            Step::new(50, cancellable(true)),
            Step::new(150, items(1, 4)),
            Step::new(150, items(2, 4)),
            Step::new(150, items(3, 4)),
            Step::new(150, items(4, 4)),
            Step::new(50, success()),
        ];

        let check = vec![
            Step::new(100, items(0, 0)),
            Step::new(
                400,
                RawSignal::DependenciesResolved(DependencySet::upgrades([
                    "libc6=2.36-9",
                    "write-activity=84",
                    "browse-activity=207",
                ])),
            ),
            Step::new(0, success()),
        ];

        let mut update = vec![Step::new(50, cancellable(true))];
        for (done, name) in [(256u64, "write-activity"), (1024, "browse-activity")] {
            update.push(Step::new(
                200,
                RawSignal::DownloadDetail {
                    uri: format!("https://download.example.org/{name}.xo"),
                    status: "fetching".to_string(),
                    description: name.to_string(),
                    bytes_total: 1024 * 1024,
                    bytes_done: done * 1024,
                },
            ));
        }
        update.push(Step::new(100, cancellable(false)));
        update.push(Step::new(300, success()));

        let download_sizes = BTreeMap::from([
            ("write-activity=84".to_string(), 256 * 1024),
            ("browse-activity=207".to_string(), 768 * 1024),
        ]);

        Self {
            refresh,
            check,
            update,
            size_delay_ms: 200,
            download_sizes,
        }
    }
}
