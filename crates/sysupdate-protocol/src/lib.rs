//! sysupdate protocol - Raw backend signals and their normalization
//!
//! This crate describes the callbacks a package-transaction service
//! pushes for each transaction, and the adapter that turns them into the
//! backend-agnostic `TransactionEvent`s consumed by the reducer.

pub mod normalize;
pub mod signal;

pub use normalize::{Normalizer, DEFAULT_INSTALLABLE_SUFFIX};
pub use signal::{DependencySet, RawSignal};
