//! Symmetric eigendecomposition via cyclic Jacobi rotations.
//!
//! The rotation order is fixed (row-cyclic), so the output is deterministic
//! for a given matrix and platform. Numerically equal eigenvalues keep the
//! solver's own (ascending original index) order through the stable sort.
use crate::error::{NumericWarning, PipelineError};
use nalgebra::{DMatrix, DVector};

/// Default cap on full Jacobi sweeps. Convergence is quadratic; well-formed
/// correlation matrices settle in far fewer.
pub const DEFAULT_SWEEP_BUDGET: u32 = 64;

/// Relative off-diagonal Frobenius norm at which the iteration stops.
const OFF_DIAGONAL_TOL: f64 = 1e-12;

/// Symmetry tolerance accepted at the input boundary.
const SYMMETRY_TOL: f64 = 1e-9;

/// Eigenvalues in descending order paired with orthonormal eigenvector
/// columns, plus any non-fatal numeric events recorded on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralDecomposition {
    eigenvalues: DVector<f64>,
    eigenvectors: DMatrix<f64>,
    warnings: Vec<NumericWarning>,
}

impl SpectralDecomposition {
    pub fn order(&self) -> usize {
        self.eigenvalues.len()
    }

    /// Eigenvalues, descending, all >= 0 after clamping.
    pub fn eigenvalues(&self) -> &DVector<f64> {
        &self.eigenvalues
    }

    /// Orthonormal eigenvectors; column i pairs with eigenvalue i.
    pub fn eigenvectors(&self) -> &DMatrix<f64> {
        &self.eigenvectors
    }

    pub fn warnings(&self) -> &[NumericWarning] {
        &self.warnings
    }
}

/// Decomposes a symmetric matrix, spending at most `sweep_budget` full
/// Jacobi sweeps.
///
/// Eigenvalues that come out marginally negative (floating-point noise on a
/// PSD input) are clamped to zero and flagged as a `NumericWarning` rather
/// than failing the run. Non-convergence within the budget is a hard
/// `DecompositionFailed`.
pub fn decompose(
    matrix: &DMatrix<f64>,
    sweep_budget: u32,
) -> Result<SpectralDecomposition, PipelineError> {
    let n = matrix.nrows();
    if matrix.ncols() != n {
        return Err(PipelineError::InvalidInput {
            msg: format!(
                "eigendecomposition needs a square matrix, got {}x{}",
                n,
                matrix.ncols()
            ),
        });
    }
    for i in 0..n {
        for j in (i + 1)..n {
            if (matrix[(i, j)] - matrix[(j, i)]).abs() > SYMMETRY_TOL {
                return Err(PipelineError::InvalidInput {
                    msg: format!("matrix is not symmetric at ({i}, {j})"),
                });
            }
        }
    }

    let mut a = matrix.clone();
    let mut v = DMatrix::identity(n, n);
    let scale = a.norm();

    // Zero matrix: spectrum is all zeros and the identity basis is as good
    // as any.
    if scale == 0.0 {
        return Ok(SpectralDecomposition {
            eigenvalues: DVector::zeros(n),
            eigenvectors: v,
            warnings: Vec::new(),
        });
    }

    let tol = OFF_DIAGONAL_TOL * scale;
    let mut off = off_diagonal_norm(&a);
    let mut sweeps = 0u32;
    while off > tol {
        if sweeps == sweep_budget {
            return Err(PipelineError::DecompositionFailed {
                sweeps: sweep_budget,
                off_diagonal: off,
            });
        }
        for p in 0..n {
            for q in (p + 1)..n {
                rotate(&mut a, &mut v, p, q);
            }
        }
        sweeps += 1;
        off = off_diagonal_norm(&a);
    }

    // Sort descending; the stable sort keeps ties in ascending original
    // index order, which is the documented tie-break.
    let raw: Vec<f64> = (0..n).map(|i| a[(i, i)]).collect();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| raw[j].total_cmp(&raw[i]));

    let mut warnings = Vec::new();
    let mut eigenvalues = DVector::zeros(n);
    for (pos, &src) in order.iter().enumerate() {
        let lambda = raw[src];
        if lambda < 0.0 {
            warnings.push(NumericWarning::ClampedEigenvalue {
                index: pos,
                value: lambda,
            });
            eigenvalues[pos] = 0.0;
        } else {
            eigenvalues[pos] = lambda;
        }
    }
    let eigenvectors = DMatrix::from_fn(n, n, |r, c| v[(r, order[c])]);

    Ok(SpectralDecomposition {
        eigenvalues,
        eigenvectors,
        warnings,
    })
}

fn off_diagonal_norm(a: &DMatrix<f64>) -> f64 {
    let n = a.nrows();
    let mut sum = 0.0;
    for i in 0..n {
        for j in (i + 1)..n {
            sum += 2.0 * a[(i, j)] * a[(i, j)];
        }
    }
    sum.sqrt()
}

/// One Jacobi rotation annihilating a[(p, q)], applied two-sided to `a`
/// and accumulated into the eigenvector basis `v`.
fn rotate(a: &mut DMatrix<f64>, v: &mut DMatrix<f64>, p: usize, q: usize) {
    let apq = a[(p, q)];
    if apq == 0.0 {
        return;
    }
    let theta = (a[(q, q)] - a[(p, p)]) / (2.0 * apq);
    // Smaller-magnitude root of t^2 + 2*theta*t - 1 = 0 keeps the rotation
    // angle below 45 degrees, which is what makes the sweep stable.
    let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
    let c = 1.0 / (t * t + 1.0).sqrt();
    let s = t * c;

    let n = a.nrows();
    for k in 0..n {
        let akp = a[(k, p)];
        let akq = a[(k, q)];
        a[(k, p)] = c * akp - s * akq;
        a[(k, q)] = s * akp + c * akq;
    }
    for k in 0..n {
        let apk = a[(p, k)];
        let aqk = a[(q, k)];
        a[(p, k)] = c * apk - s * aqk;
        a[(q, k)] = s * apk + c * aqk;
    }
    for k in 0..n {
        let vkp = v[(k, p)];
        let vkq = v[(k, q)];
        v[(k, p)] = c * vkp - s * vkq;
        v[(k, q)] = s * vkp + c * vkq;
    }
}
