//! Backend error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors reported by a transaction service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The backend rejected or aborted the call.
    #[error("transaction failed ({code}): {detail}")]
    Failed { code: String, detail: String },

    /// Cancellation was requested while the transaction did not accept it.
    #[error("transaction is not cancellable")]
    NotCancellable,

    /// The backend cannot serve this kind of call.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl BackendError {
    /// Error code for logs and for the `Failed` event.
    pub fn code(&self) -> &str {
        match self {
            Self::Failed { code, .. } => code,
            Self::NotCancellable => "not-cancellable",
            Self::Unavailable(_) => "unavailable",
        }
    }
}

/// Errors loading a scenario file.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read scenario {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse scenario: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::Failed {
            code: "conn-failed".into(),
            detail: "no route to host".into(),
        };
        assert_eq!(err.to_string(), "transaction failed (conn-failed): no route to host");
        assert_eq!(err.code(), "conn-failed");

        assert_eq!(BackendError::NotCancellable.to_string(), "transaction is not cancellable");
        assert_eq!(BackendError::Unavailable("check".into()).code(), "unavailable");
    }
}
