//! Error and warning types shared by all pipeline stages.
use std::fmt;
use thiserror::Error;

/// A fatal error from one of the pipeline stages.
///
/// Every variant is deterministic given the inputs: retrying the same call
/// with the same data cannot succeed, so callers should adjust parameters
/// rather than loop.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Malformed or degenerate input: bad shapes, a zero-variance series,
    /// a quantile or rank outside its valid range.
    #[error("invalid input: {msg}")]
    InvalidInput { msg: String },

    /// The Jacobi eigen-solver did not reach its off-diagonal tolerance
    /// within the sweep budget.
    #[error("eigendecomposition did not converge after {sweeps} sweeps (off-diagonal norm {off_diagonal:.3e})")]
    DecompositionFailed { sweeps: u32, off_diagonal: f64 },

    /// The requested rank is out of range, or a retained eigenvalue sits at
    /// or below the floor. Inverting such an eigenvalue would amplify noise,
    /// which is exactly what truncation exists to prevent.
    #[error("regularization failed for rank {rank}: {msg}")]
    Regularization { rank: usize, msg: String },

    /// The community optimizer was still moving nodes when its pass budget
    /// ran out. A partial partition is never returned.
    #[error("community optimization exhausted its budget of {passes} passes")]
    BudgetExhausted { passes: u32 },
}

/// A non-fatal numeric event, carried on the value object that produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericWarning {
    /// A floating-point-negative eigenvalue of a PSD matrix was clamped
    /// to zero. `index` is the position in the sorted spectrum.
    ClampedEigenvalue { index: usize, value: f64 },
}

impl fmt::Display for NumericWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericWarning::ClampedEigenvalue { index, value } => {
                write!(f, "clamped negative eigenvalue {value:.3e} at position {index} to zero")
            }
        }
    }
}
