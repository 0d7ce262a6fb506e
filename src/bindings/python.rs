//! pyo3 adapters. The Python side supplies cleaned returns and renders the
//! JSON artifacts; everything in between happens here.
use crate::artifact::NetworkArtifact;
use crate::correlation::{self, ReturnsMatrix};
use crate::error::PipelineError;
use crate::network;
use crate::pipeline::{self, DEFAULT_CONVERGENCE_BUDGET};
use crate::regularize::{self, PrecisionMatrix, DEFAULT_EIGENVALUE_FLOOR};
use crate::spectral::{self, SpectralDecomposition};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

fn to_py_err(e: PipelineError) -> PyErr {
    match e {
        PipelineError::InvalidInput { .. } | PipelineError::Regularization { .. } => {
            PyValueError::new_err(e.to_string())
        }
        PipelineError::DecompositionFailed { .. } | PipelineError::BudgetExhausted { .. } => {
            PyRuntimeError::new_err(e.to_string())
        }
    }
}

fn json_err(e: serde_json::Error) -> PyErr {
    PyRuntimeError::new_err(format!("artifact serialization failed: {e}"))
}

/// A regularized precision matrix held for repeated thresholding.
///
/// Construction runs stages 1-3 once; `network` and `sweep` replay only
/// the cheap graph stages, and `with_rank` re-runs stage 3 against the
/// cached decomposition.
#[pyclass(name = "_PrecisionModel")]
#[derive(Debug, Clone)]
pub struct PyPrecisionModel {
    decomposition: SpectralDecomposition,
    precision: PrecisionMatrix,
    labels: Vec<String>,
    eigenvalue_floor: f64,
    convergence_budget: u32,
}

#[pymethods]
impl PyPrecisionModel {
    #[new]
    #[pyo3(signature = (returns, labels, rank, eigenvalue_floor=None, convergence_budget=None))]
    pub fn new(
        returns: Vec<Vec<f64>>,
        labels: Vec<String>,
        rank: usize,
        eigenvalue_floor: Option<f64>,
        convergence_budget: Option<u32>,
    ) -> PyResult<Self> {
        let floor = eigenvalue_floor.unwrap_or(DEFAULT_EIGENVALUE_FLOOR);
        let budget = convergence_budget.unwrap_or(DEFAULT_CONVERGENCE_BUDGET);
        let matrix = ReturnsMatrix::from_rows(&returns, labels.clone()).map_err(to_py_err)?;
        let corr = correlation::estimate(&matrix).map_err(to_py_err)?;
        let decomposition = spectral::decompose(corr.matrix(), budget).map_err(to_py_err)?;
        let precision = regularize::regularize(&decomposition, rank, floor).map_err(to_py_err)?;
        Ok(Self {
            decomposition,
            precision,
            labels,
            eigenvalue_floor: floor,
            convergence_budget: budget,
        })
    }

    /// A new model at a different rank, reusing the cached decomposition.
    pub fn with_rank(&self, rank: usize) -> PyResult<Self> {
        let precision = regularize::regularize(&self.decomposition, rank, self.eigenvalue_floor)
            .map_err(to_py_err)?;
        let mut model = self.clone();
        model.precision = precision;
        Ok(model)
    }

    /// One thresholded network with communities, as a JSON document.
    pub fn network(&self, quantile: f64) -> PyResult<String> {
        let graph = network::build(&self.precision, &self.labels, quantile).map_err(to_py_err)?;
        let communities =
            network::detect(&graph.graph, self.convergence_budget).map_err(to_py_err)?;
        NetworkArtifact::assemble(&graph, &communities)
            .to_json()
            .map_err(json_err)
    }

    /// One JSON document per quantile, computed in parallel, returned in
    /// the supplied order.
    pub fn sweep(&self, quantiles: Vec<f64>) -> PyResult<Vec<String>> {
        let artifacts = pipeline::sweep(
            &self.precision,
            &self.labels,
            &quantiles,
            self.convergence_budget,
        )
        .map_err(to_py_err)?;
        artifacts
            .iter()
            .map(|a| a.to_json().map_err(json_err))
            .collect()
    }

    /// The normalized precision matrix, row major.
    pub fn precision_matrix(&self) -> Vec<Vec<f64>> {
        let m = self.precision.matrix();
        (0..m.nrows())
            .map(|i| (0..m.ncols()).map(|j| m[(i, j)]).collect())
            .collect()
    }

    pub fn rank(&self) -> usize {
        self.precision.rank()
    }

    /// Eigenvalues of the correlation matrix, descending.
    pub fn eigenvalues(&self) -> Vec<f64> {
        self.decomposition.eigenvalues().iter().copied().collect()
    }

    /// Human-readable non-fatal numeric warnings from the decomposition.
    pub fn warnings(&self) -> Vec<String> {
        self.decomposition
            .warnings()
            .iter()
            .map(|w| w.to_string())
            .collect()
    }
}
