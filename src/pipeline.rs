//! The linear five-stage pipeline and the parallel threshold sweep.
use crate::artifact::NetworkArtifact;
use crate::correlation::{self, ReturnsMatrix};
use crate::error::PipelineError;
use crate::network;
use crate::regularize::{self, PrecisionMatrix, DEFAULT_EIGENVALUE_FLOOR};
use crate::spectral;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Default iteration budget shared by the eigen-solver (sweeps) and the
/// community optimizer (passes).
pub const DEFAULT_CONVERGENCE_BUDGET: u32 = 64;

/// Scalar configuration threaded through the pipeline. There is no other
/// state: every stage is a pure function of its inputs and this struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Truncation rank N, 1..=S.
    pub rank: usize,
    /// Edge-retention quantile, open interval (0, 1).
    pub threshold_quantile: f64,
    /// Floor under which a retained eigenvalue refuses inversion.
    pub eigenvalue_floor: f64,
    /// Iteration budget for both internal convergence loops.
    pub convergence_budget: u32,
}

impl PipelineConfig {
    pub fn new(rank: usize, threshold_quantile: f64) -> Self {
        Self {
            rank,
            threshold_quantile,
            eigenvalue_floor: DEFAULT_EIGENVALUE_FLOOR,
            convergence_budget: DEFAULT_CONVERGENCE_BUDGET,
        }
    }

    /// Range validation against the series count. The core does not judge
    /// whether a valid rank or quantile is a *good* choice.
    pub fn validate(&self, series: usize) -> Result<(), PipelineError> {
        if self.rank == 0 || self.rank > series {
            return Err(PipelineError::InvalidInput {
                msg: format!("rank {} out of range 1..={}", self.rank, series),
            });
        }
        if !(self.threshold_quantile > 0.0 && self.threshold_quantile < 1.0) {
            return Err(PipelineError::InvalidInput {
                msg: format!(
                    "threshold quantile must lie in (0, 1), got {}",
                    self.threshold_quantile
                ),
            });
        }
        if self.eigenvalue_floor <= 0.0 {
            return Err(PipelineError::InvalidInput {
                msg: format!(
                    "eigenvalue floor must be positive, got {:e}",
                    self.eigenvalue_floor
                ),
            });
        }
        Ok(())
    }
}

/// Runs correlation -> decomposition -> regularization for the configured
/// rank, returning the precision matrix the graph stages consume.
pub fn precision_model(
    returns: &ReturnsMatrix,
    config: &PipelineConfig,
) -> Result<PrecisionMatrix, PipelineError> {
    config.validate(returns.series())?;
    let corr = correlation::estimate(returns)?;
    let decomposition = spectral::decompose(corr.matrix(), config.convergence_budget)?;
    regularize::regularize(&decomposition, config.rank, config.eigenvalue_floor)
}

/// The full linear pipeline. Errors from stages 1-4 propagate unchanged;
/// there is no retry, since the stages are deterministic.
pub fn run(
    returns: &ReturnsMatrix,
    config: &PipelineConfig,
) -> Result<NetworkArtifact, PipelineError> {
    let precision = precision_model(returns, config)?;
    let graph = network::build(&precision, returns.labels(), config.threshold_quantile)?;
    let communities = network::detect(&graph.graph, config.convergence_budget)?;
    Ok(NetworkArtifact::assemble(&graph, &communities))
}

/// Builds one network per quantile against a shared immutable precision
/// matrix, as a parallel map. Tasks share nothing mutable; the collected
/// result follows the supplied quantile order.
pub fn sweep(
    precision: &PrecisionMatrix,
    labels: &[String],
    quantiles: &[f64],
    convergence_budget: u32,
) -> Result<Vec<NetworkArtifact>, PipelineError> {
    quantiles
        .par_iter()
        .map(|&q| {
            let graph = network::build(precision, labels, q)?;
            let communities = network::detect(&graph.graph, convergence_budget)?;
            Ok(NetworkArtifact::assemble(&graph, &communities))
        })
        .collect()
}
