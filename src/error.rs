//! Error type for registry and allocator failures.

use thiserror::Error;

/// Failures surfaced by the innovation registry and its id allocators.
///
/// None of these are transient: retrying the same call without changing the
/// registry setup yields the same error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InnovationError {
    /// The registry was used before a population was attached.
    #[error("registry misconfigured: {0}")]
    Configuration(String),

    /// An identifier counter has no values left.
    #[error("{counter} identifier space exhausted")]
    IdentifierOverflow { counter: &'static str },

    /// A key or record handed to the registry is malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
