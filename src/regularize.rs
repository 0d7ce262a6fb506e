//! Rank-truncated pseudo-inverse with diagonal normalization.
//!
//! Inverting only the top-N eigenpairs bounds the reciprocal-eigenvalue
//! amplification by 1/lambda_N instead of by the smallest of all S
//! eigenvalues; everything beyond rank N is treated as noise and discarded
//! before the inversion.
use crate::error::PipelineError;
use crate::spectral::SpectralDecomposition;
use nalgebra::DMatrix;

/// Default floor under which a retained eigenvalue is considered too close
/// to zero to invert.
pub const DEFAULT_EIGENVALUE_FLOOR: f64 = 1e-10;

/// S x S precision-like matrix: symmetric, diagonal normalized to 1,
/// parameterized by the truncation rank that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct PrecisionMatrix {
    matrix: DMatrix<f64>,
    rank: usize,
}

impl PrecisionMatrix {
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    pub fn order(&self) -> usize {
        self.matrix.nrows()
    }

    /// The truncation rank this matrix was built with.
    pub fn rank(&self) -> usize {
        self.rank
    }
}

/// Builds the normalized rank-`rank` pseudo-inverse of the decomposed
/// matrix. Purely functional: a different rank yields a new instance.
pub fn regularize(
    decomposition: &SpectralDecomposition,
    rank: usize,
    eigenvalue_floor: f64,
) -> Result<PrecisionMatrix, PipelineError> {
    let s = decomposition.order();
    if rank == 0 || rank > s {
        return Err(PipelineError::Regularization {
            rank,
            msg: format!("rank must lie in 1..={s}"),
        });
    }
    if eigenvalue_floor <= 0.0 {
        return Err(PipelineError::InvalidInput {
            msg: format!("eigenvalue floor must be positive, got {eigenvalue_floor:e}"),
        });
    }
    let eigenvalues = decomposition.eigenvalues();
    for k in 0..rank {
        if eigenvalues[k] <= eigenvalue_floor {
            return Err(PipelineError::Regularization {
                rank,
                msg: format!(
                    "retained eigenvalue {} = {:e} is at or below the floor {:e}",
                    k, eigenvalues[k], eigenvalue_floor
                ),
            });
        }
    }

    // Raw = V_N * diag(1/lambda) * V_N^T, accumulated pair by pair.
    let v = decomposition.eigenvectors();
    let mut raw: DMatrix<f64> = DMatrix::zeros(s, s);
    for k in 0..rank {
        let inv_lambda = 1.0 / eigenvalues[k];
        for i in 0..s {
            let vi = v[(i, k)] * inv_lambda;
            for j in 0..s {
                raw[(i, j)] += vi * v[(j, k)];
            }
        }
    }

    // Normalize like covariance -> correlation so entries stay comparable
    // across ranks and the diagonal lands on 1.
    for i in 0..s {
        if raw[(i, i)] <= 0.0 {
            return Err(PipelineError::Regularization {
                rank,
                msg: format!(
                    "diagonal entry {} of the raw pseudo-inverse is non-positive",
                    i
                ),
            });
        }
    }
    let matrix =
        DMatrix::<f64>::from_fn(s, s, |i, j| raw[(i, j)] / (raw[(i, i)] * raw[(j, j)]).sqrt());

    Ok(PrecisionMatrix { matrix, rank })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectral::{decompose, DEFAULT_SWEEP_BUDGET};
    use rstest::rstest;

    fn correlation_fixture() -> DMatrix<f64> {
        DMatrix::from_row_slice(3, 3, &[1.0, 0.5, 0.2, 0.5, 1.0, 0.3, 0.2, 0.3, 1.0])
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(3)]
    fn test_unit_diagonal_and_symmetry(#[case] rank: usize) {
        let d = decompose(&correlation_fixture(), DEFAULT_SWEEP_BUDGET).unwrap();
        let p = regularize(&d, rank, DEFAULT_EIGENVALUE_FLOOR).unwrap();
        let m = p.matrix();
        for i in 0..3 {
            assert!((m[(i, i)] - 1.0).abs() < 1e-12);
            for j in 0..3 {
                assert!((m[(i, j)] - m[(j, i)]).abs() < 1e-12);
            }
        }
        assert_eq!(p.rank(), rank);
    }

    #[test]
    fn test_full_rank_matches_normalized_inverse() {
        // With N = S and no floored eigenvalues the pseudo-inverse is the
        // plain inverse, so the normalized closed form must agree.
        let x = correlation_fixture();
        let d = decompose(&x, DEFAULT_SWEEP_BUDGET).unwrap();
        let p = regularize(&d, 3, DEFAULT_EIGENVALUE_FLOOR).unwrap();

        let inv = x.clone().try_inverse().unwrap();
        for i in 0..3 {
            for j in 0..3 {
                let expected = inv[(i, j)] / (inv[(i, i)] * inv[(j, j)]).sqrt();
                assert!(
                    (p.matrix()[(i, j)] - expected).abs() < 1e-9,
                    "mismatch at ({i}, {j})"
                );
            }
        }
    }

    #[rstest]
    #[case(0)]
    #[case(4)]
    fn test_rank_out_of_range_rejected(#[case] rank: usize) {
        let d = decompose(&correlation_fixture(), DEFAULT_SWEEP_BUDGET).unwrap();
        assert!(matches!(
            regularize(&d, rank, DEFAULT_EIGENVALUE_FLOOR),
            Err(PipelineError::Regularization { .. })
        ));
    }

    #[test]
    fn test_floored_retained_eigenvalue_rejected() {
        // Rank 2 of a rank-1 matrix would invert an eigenvalue of ~0.
        let x = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let d = decompose(&x, DEFAULT_SWEEP_BUDGET).unwrap();
        let err = regularize(&d, 2, DEFAULT_EIGENVALUE_FLOOR).unwrap_err();
        match err {
            PipelineError::Regularization { rank, msg } => {
                assert_eq!(rank, 2);
                assert!(msg.contains("floor"));
            }
            other => panic!("wrong error: {other:?}"),
        }
    }

    #[test]
    fn test_non_positive_floor_rejected() {
        let d = decompose(&correlation_fixture(), DEFAULT_SWEEP_BUDGET).unwrap();
        assert!(matches!(
            regularize(&d, 2, 0.0),
            Err(PipelineError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_new_rank_yields_new_instance() {
        let d = decompose(&correlation_fixture(), DEFAULT_SWEEP_BUDGET).unwrap();
        let p1 = regularize(&d, 1, DEFAULT_EIGENVALUE_FLOOR).unwrap();
        let p2 = regularize(&d, 2, DEFAULT_EIGENVALUE_FLOOR).unwrap();
        assert_ne!(p1, p2);
    }
}
