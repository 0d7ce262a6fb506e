// FFI Facade: The main entry point for Python.
// This file uses `pyo3` to define the `_core` Python
// module and expose Rust structs and functions as Python objects.

//! Correlation-network core: turns a matrix of log-returns into a sparse
//! weighted dependence graph with community structure.
//!
//! The pipeline is five stateless stages in a fixed order: Pearson
//! correlation, Jacobi eigendecomposition, rank-truncated pseudo-inverse
//! (the regularization step), quantile thresholding into a graph, and
//! modularity-based community detection. Data acquisition and rendering
//! live outside this crate; they talk to it through `bindings::python`.

pub mod artifact;
pub mod bindings;
pub mod correlation;
pub mod error;
pub mod kernels;
pub mod network;
pub mod pipeline;
pub mod regularize;
pub mod spectral;

use pyo3::prelude::*;

/// A simple function to confirm the Rust core is callable from Python.
#[pyfunction]
fn rust_core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// --- Module Definition ---
/// This function defines the `corrnet._core` Python module.
/// The name `_core` is chosen to indicate it's an internal, compiled component.
#[pymodule]
fn _core(_py: Python, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(rust_core_version, m)?)?;
    m.add_class::<bindings::python::PyPrecisionModel>()?;
    Ok(())
}
