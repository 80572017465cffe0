//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Package identifier does not have the `name=version` shape
    #[error("Invalid package id: {value} (expected name=version)")]
    InvalidPackageId { value: String },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
