//! Pearson correlation estimation over a labeled returns matrix.
use crate::error::PipelineError;
use crate::kernels;
use nalgebra::DMatrix;

/// T observations by S series of log-returns, with one label per series.
///
/// The matrix is guaranteed free of missing values by the data-cleaning
/// collaborator upstream of this crate; only shape and degeneracy are
/// checked here.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnsMatrix {
    data: DMatrix<f64>,
    labels: Vec<String>,
}

impl ReturnsMatrix {
    /// Wraps a T x S matrix. Fails if the label count does not match S.
    pub fn new(data: DMatrix<f64>, labels: Vec<String>) -> Result<Self, PipelineError> {
        if labels.len() != data.ncols() {
            return Err(PipelineError::InvalidInput {
                msg: format!(
                    "expected {} series labels, got {}",
                    data.ncols(),
                    labels.len()
                ),
            });
        }
        Ok(Self { data, labels })
    }

    /// Builds from row-major observation rows, the layout the Python
    /// boundary hands over. All rows must have the same length.
    pub fn from_rows(rows: &[Vec<f64>], labels: Vec<String>) -> Result<Self, PipelineError> {
        let series = labels.len();
        for (t, row) in rows.iter().enumerate() {
            if row.len() != series {
                return Err(PipelineError::InvalidInput {
                    msg: format!(
                        "observation row {} has {} entries, expected {}",
                        t,
                        row.len(),
                        series
                    ),
                });
            }
        }
        let data = DMatrix::from_fn(rows.len(), series, |t, s| rows[t][s]);
        Self::new(data, labels)
    }

    pub fn observations(&self) -> usize {
        self.data.nrows()
    }

    pub fn series(&self) -> usize {
        self.data.ncols()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// S x S sample correlation matrix: symmetric, unit diagonal, PSD up to
/// floating-point error.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    matrix: DMatrix<f64>,
}

impl CorrelationMatrix {
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    pub fn order(&self) -> usize {
        self.matrix.nrows()
    }
}

/// Estimates the pairwise Pearson correlation of every column pair.
///
/// Fails with `InvalidInput` when T < 2, S < 2, or any column has zero
/// variance (its correlation with anything is undefined).
pub fn estimate(returns: &ReturnsMatrix) -> Result<CorrelationMatrix, PipelineError> {
    let t = returns.observations();
    let s = returns.series();
    if t < 2 {
        return Err(PipelineError::InvalidInput {
            msg: format!("need at least 2 observations, got {t}"),
        });
    }
    if s < 2 {
        return Err(PipelineError::InvalidInput {
            msg: format!("need at least 2 series, got {s}"),
        });
    }

    // Demean each column once; pairwise correlations reduce to dot products
    // of the centered columns.
    let mut centered: Vec<Vec<f64>> = Vec::with_capacity(s);
    let mut norms: Vec<f64> = Vec::with_capacity(s);
    for j in 0..s {
        let col: Vec<f64> = returns.data.column(j).iter().copied().collect();
        let mean = kernels::sum(&col) / t as f64;
        let col: Vec<f64> = col.iter().map(|v| v - mean).collect();
        let norm = kernels::dot(&col, &col).sqrt();
        if norm == 0.0 {
            return Err(PipelineError::InvalidInput {
                msg: format!(
                    "series '{}' has zero variance; correlation is undefined",
                    returns.labels[j]
                ),
            });
        }
        centered.push(col);
        norms.push(norm);
    }

    let mut matrix = DMatrix::identity(s, s);
    for i in 0..s {
        for j in (i + 1)..s {
            let r = kernels::dot(&centered[i], &centered[j]) / (norms[i] * norms[j]);
            matrix[(i, j)] = r;
            matrix[(j, i)] = r;
        }
    }

    Ok(CorrelationMatrix { matrix })
}
