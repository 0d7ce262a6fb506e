//! Categorical colors for community groups.

/// Ten-color categorical palette; group ids cycle through it.
pub const CATEGORICAL: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

/// Fixed neutral grey for the unassociated bucket.
pub const NEUTRAL: &str = "#c7c7c7";

/// Color for a multi-node group id (ids are 1-based).
pub fn group_color(id: u32) -> &'static str {
    CATEGORICAL[(id as usize - 1) % CATEGORICAL.len()]
}
