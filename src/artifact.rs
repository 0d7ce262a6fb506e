//! Renderer-facing network artifacts.
//!
//! These DTOs are the externally visible output of the pipeline; the
//! visualization collaborator consumes them as JSON and owns everything
//! from there on.
use crate::network::palette;
use crate::network::{CommunityAssignment, ThresholdedGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDto {
    pub id: usize,
    pub label: String,
    pub group: u32,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeDto {
    pub source: usize,
    pub target: usize,
    pub weight: f64,
}

/// One thresholded network with its community partition, ready to render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkArtifact {
    pub threshold_quantile: f64,
    pub threshold: f64,
    pub nodes: Vec<NodeDto>,
    pub edges: Vec<EdgeDto>,
}

impl NetworkArtifact {
    /// Joins a thresholded graph with its community assignment. Node ids
    /// are the series indices; edge order follows graph insertion order,
    /// which is deterministic.
    pub fn assemble(graph: &ThresholdedGraph, communities: &CommunityAssignment) -> Self {
        let nodes = graph
            .graph
            .node_indices()
            .enumerate()
            .map(|(k, idx)| {
                let group = communities.group_of(k);
                NodeDto {
                    id: k,
                    label: graph.graph[idx].clone(),
                    group,
                    color: communities
                        .color_of(group)
                        .unwrap_or(palette::NEUTRAL)
                        .to_string(),
                }
            })
            .collect();
        let edges = graph
            .graph
            .edge_references()
            .map(|e| EdgeDto {
                source: e.source().index(),
                target: e.target().index(),
                weight: *e.weight(),
            })
            .collect();
        Self {
            threshold_quantile: graph.quantile(),
            threshold: graph.threshold(),
            nodes,
            edges,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
