//! FFI surfaces exposing the pipeline to external collaborators.
pub mod python;
