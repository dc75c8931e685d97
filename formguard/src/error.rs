//! Error types for validation runs.

use thiserror::Error;

/// Errors returned by [`ValidationRegistry::run_all`].
///
/// [`ValidationRegistry::run_all`]: crate::registry::ValidationRegistry::run_all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidateError {
    /// A validation run is already in flight on this registry.
    ///
    /// Runs are strictly sequential per registry; callers should wait for
    /// the in-flight run to resolve and retry.
    #[error("a validation run is already in progress")]
    AlreadyRunning,
}
