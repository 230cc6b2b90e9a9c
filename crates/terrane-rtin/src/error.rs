//! Simplifier error types.

/// Errors raised while building the simplifier or its per-tile state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RtinError {
    /// The grid size is not of the form `2^n + 1` (with `n >= 1`).
    #[error("expected grid size to be 2^n+1, got {0}")]
    InvalidGridSize(usize),

    /// The elevation data does not match the expected grid dimensions.
    #[error("expected terrain data of length {expected} ({size} x {size}), got {actual}")]
    GridLengthMismatch {
        size: usize,
        expected: usize,
        actual: usize,
    },
}
