//! View states rendered by presentations.
//!
//! A `ViewState` is always replaced as a whole; presentations render it
//! without keeping state of their own.

use serde::Serialize;

use crate::package::PackageRecord;
use crate::phase::SessionPhase;

/// Label shown while the download size is being computed.
pub const SIZE_CALCULATING: &str = "calculating...";

/// Detail text shown between a finished refresh and the first check event.
pub const PLEASE_WAIT: &str = "Please wait...";

/// Headline shown for any failed transaction.
pub const ERROR_HEADLINE: &str = "Can't connect to the activity server";

/// Secondary text shown for any failed transaction.
pub const ERROR_HINT: &str =
    "Verify your connection to internet and try again, or try again later";

/// Progress pane contents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressView {
    pub phase: SessionPhase,
    pub fraction: f64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub cancellable: bool,
}

/// Update list contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateListView {
    pub packages: Vec<PackageRecord>,
    /// `None` when download size queries are disabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_size_label: Option<String>,
}

impl UpdateListView {
    /// The install affordance is enabled only while something is selected.
    #[must_use]
    pub fn can_install(&self) -> bool {
        self.packages.iter().any(|p| p.selected)
    }

    pub fn selected_count(&self) -> usize {
        self.packages.iter().filter(|p| p.selected).count()
    }
}

/// What the presentation layer should show.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum ViewState {
    #[default]
    Initializing,
    ShowingProgress(ProgressView),
    ShowingUpdateList(UpdateListView),
    ShowingUpToDate,
    ShowingInstalled { count: usize },
    ShowingCancelled,
    ShowingError { message: String },
}

impl ViewState {
    /// Main headline for this view.
    pub fn headline(&self) -> String {
        match self {
            Self::Initializing => SessionPhase::Idle.prompt().to_string(),
            Self::ShowingProgress(progress) => progress.message.clone(),
            Self::ShowingUpdateList(list) => match list.packages.len() {
                1 => "You can install 1 update".to_string(),
                n => format!("You can install {n} updates"),
            },
            Self::ShowingUpToDate => "Your software is up-to-date".to_string(),
            Self::ShowingInstalled { count: 1 } => "1 update was installed".to_string(),
            Self::ShowingInstalled { count } => format!("{count} updates were installed"),
            Self::ShowingCancelled => "The updates have been cancelled".to_string(),
            Self::ShowingError { message } => message.clone(),
        }
    }

    /// Secondary line under the headline, if any.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ShowingError { .. } => Some(ERROR_HINT),
            _ => None,
        }
    }

    /// True for views that end a user-visible cycle.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            Self::ShowingUpToDate
                | Self::ShowingInstalled { .. }
                | Self::ShowingCancelled
                | Self::ShowingError { .. }
        )
    }

    pub fn as_progress(&self) -> Option<&ProgressView> {
        match self {
            Self::ShowingProgress(progress) => Some(progress),
            _ => None,
        }
    }

    pub fn as_update_list(&self) -> Option<&UpdateListView> {
        match self {
            Self::ShowingUpdateList(list) => Some(list),
            _ => None,
        }
    }
}
