//! Error types for inference-program execution.

use thiserror::Error;

/// Errors that can occur while building or executing an inference program.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in the future without breaking changes.
///
/// All public APIs return `Result<T, RuntimeError>` to avoid panics in
/// library code. No variant is recovered internally: every error is reported
/// to the immediate caller, and a failed recomputation unit leaves its done
/// marker unadvanced so a retry re-executes from the last good state.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Bad argument to a public API (e.g., an unregistered input or marginal name).
    #[error("argument error: {0}")]
    Argument(String),

    /// An observed value whose shape does not match the declared range size.
    /// Surfaced at `set_observed`, never silently truncated or padded.
    #[error("shape mismatch for '{name}': expected {expected}, got {actual}")]
    ShapeMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    /// An observed deterministic relationship contradicted by data, detected
    /// during recomputation (e.g., a discrete product with no remaining support).
    #[error("constraint violated: {0}")]
    ConstraintViolated(String),

    /// Numerical failure (division by a point mass, NaN/Inf parameters,
    /// invalid probabilities).
    #[error("numerical error: {0}")]
    Numerical(String),

    /// A message record that could not be serialized or deserialized.
    #[error("storage error: {0}")]
    Storage(String),

    /// Backing storage could not be created, read, or written. Never retried
    /// internally; propagated to the caller of the triggering operation.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Runtime execution error (e.g., reading an input that was never observed).
    #[error("execution error: {0}")]
    Execution(String),

    /// Internal execution error (programmer error, not user error).
    #[error("internal error: {0}")]
    Internal(String),
}
