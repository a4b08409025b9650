//! Crate error types

use thiserror::Error;

/// Errors that fail a teardown call outright.
///
/// Per-resource failures never surface here; they are recorded in the
/// [`TeardownOutcome`](crate::models::TeardownOutcome) instead.
#[derive(Debug, Error)]
pub enum TeardownError {
    #[error("Invalid teardown request: {0}")]
    InvalidRequest(String),

    #[error("Failed to connect to container engine: {0}")]
    Connect(#[from] bollard::errors::Error),
}
