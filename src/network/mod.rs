//! Sparse network construction and community structure over the precision
//! matrix.
pub mod builder;
pub mod community;
pub mod palette;

pub use builder::{build, ThresholdedGraph};
pub use community::{detect, CommunityAssignment, DEFAULT_PASS_BUDGET};
