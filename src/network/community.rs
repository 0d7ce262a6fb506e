//! Community structure via multilevel modularity maximization.
//!
//! Local moves run in fixed node-index order and ties prefer the smallest
//! community id, so the partition is deterministic for a given graph.
//! Levels aggregate communities into super-nodes and repeat until no move
//! improves modularity.
use crate::error::PipelineError;
use crate::network::palette;
use petgraph::graph::UnGraph;
use petgraph::visit::EdgeRef;
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// Default cap on local-move passes, totalled across all levels.
pub const DEFAULT_PASS_BUDGET: u32 = 64;

/// Minimum modularity gain treated as an actual improvement.
const GAIN_EPS: f64 = 1e-12;

/// A complete partition of the node set into groups, with one color per
/// group id.
///
/// Multi-node groups carry ids 1..=k in size order; if any singleton
/// existed before merging, id k+1 is the unassociated bucket holding all
/// of them.
#[derive(Debug, Clone, PartialEq)]
pub struct CommunityAssignment {
    group_of: Vec<u32>,
    colors: BTreeMap<u32, String>,
    unassociated: Option<u32>,
}

impl CommunityAssignment {
    /// Group id of a node (node indices follow the graph's insertion order).
    pub fn group_of(&self, node: usize) -> u32 {
        self.group_of[node]
    }

    pub fn node_count(&self) -> usize {
        self.group_of.len()
    }

    /// Number of distinct group ids, unassociated bucket included.
    pub fn group_count(&self) -> usize {
        self.colors.len()
    }

    pub fn color_of(&self, group: u32) -> Option<&str> {
        self.colors.get(&group).map(String::as_str)
    }

    /// Id of the unassociated bucket, present only when pre-merge
    /// singletons existed. It is always the maximum group id.
    pub fn unassociated_group(&self) -> Option<u32> {
        self.unassociated
    }

    pub fn colors(&self) -> &BTreeMap<u32, String> {
        &self.colors
    }
}

/// Aggregated weights between a node and the communities it touches.
type CommunityLinks = SmallVec<[(usize, f64); 8]>;

/// One level of the aggregation hierarchy. Self-loop weight is kept apart
/// from the neighbor lists; it counts twice in the weighted degree.
struct LevelGraph {
    adj: Vec<Vec<(usize, f64)>>,
    self_weight: Vec<f64>,
}

impl LevelGraph {
    fn len(&self) -> usize {
        self.adj.len()
    }

    fn degrees(&self) -> Vec<f64> {
        (0..self.len())
            .map(|i| 2.0 * self.self_weight[i] + self.adj[i].iter().map(|(_, w)| w).sum::<f64>())
            .collect()
    }
}

/// Partitions the graph, spending at most `pass_budget` local-move passes
/// across all aggregation levels.
///
/// An edgeless graph is not an error: every node becomes a singleton and
/// all of them land in the single unassociated group.
pub fn detect(
    graph: &UnGraph<String, f64>,
    pass_budget: u32,
) -> Result<CommunityAssignment, PipelineError> {
    let n = graph.node_count();
    let mut level = LevelGraph {
        adj: vec![Vec::new(); n],
        self_weight: vec![0.0; n],
    };
    let mut total_weight = 0.0;
    for edge in graph.edge_references() {
        let (a, b) = (edge.source().index(), edge.target().index());
        let w = *edge.weight();
        level.adj[a].push((b, w));
        level.adj[b].push((a, w));
        total_weight += w;
    }

    // Each original node tracks its node in the current level.
    let mut node_to_comm: Vec<usize> = (0..n).collect();

    // Degenerate graphs (no edges, or non-positive total weight) skip the
    // optimizer entirely and fall through as all-singleton.
    if graph.edge_count() > 0 && total_weight > 0.0 {
        let two_m = 2.0 * total_weight;
        let mut passes_used = 0u32;
        loop {
            let (comm, improved) = local_moves(&level, two_m, &mut passes_used, pass_budget)?;
            if !improved {
                break;
            }
            let (remap, count) = renumber(&comm);
            for c in node_to_comm.iter_mut() {
                *c = remap[comm[*c]];
            }
            level = aggregate(&level, &comm, &remap, count);
        }
    }

    Ok(assign_groups(&node_to_comm, n))
}

/// One phase of sequential local moves, repeated until a full pass makes
/// no move. Returns the community label per node and whether anything moved.
fn local_moves(
    g: &LevelGraph,
    two_m: f64,
    passes_used: &mut u32,
    pass_budget: u32,
) -> Result<(Vec<usize>, bool), PipelineError> {
    let n = g.len();
    let k = g.degrees();
    let mut comm: Vec<usize> = (0..n).collect();
    // Sum of weighted degrees per community.
    let mut tot = k.clone();
    let mut improved = false;

    loop {
        if *passes_used == pass_budget {
            return Err(PipelineError::BudgetExhausted {
                passes: pass_budget,
            });
        }
        *passes_used += 1;

        let mut moved = false;
        for i in 0..n {
            let current = comm[i];
            tot[current] -= k[i];

            let mut links: CommunityLinks = SmallVec::new();
            for &(nb, w) in &g.adj[i] {
                let c = comm[nb];
                match links.iter_mut().find(|(cc, _)| *cc == c) {
                    Some((_, acc)) => *acc += w,
                    None => links.push((c, w)),
                }
            }
            let weight_to = |c: usize| {
                links
                    .iter()
                    .find(|(cc, _)| *cc == c)
                    .map(|(_, w)| *w)
                    .unwrap_or(0.0)
            };

            let mut best = current;
            let mut best_gain = weight_to(current) - tot[current] * k[i] / two_m;
            for &(c, w) in &links {
                if c == current {
                    continue;
                }
                let gain = w - tot[c] * k[i] / two_m;
                if gain > best_gain + GAIN_EPS
                    || ((gain - best_gain).abs() <= GAIN_EPS && c < best)
                {
                    best_gain = gain;
                    best = c;
                }
            }

            tot[best] += k[i];
            if best != current {
                comm[i] = best;
                moved = true;
            }
        }

        if !moved {
            break;
        }
        improved = true;
    }

    Ok((comm, improved))
}

/// Densely renumbers community labels in order of smallest member index.
fn renumber(comm: &[usize]) -> (Vec<usize>, usize) {
    let mut remap = vec![usize::MAX; comm.len()];
    let mut next = 0;
    for &c in comm {
        if remap[c] == usize::MAX {
            remap[c] = next;
            next += 1;
        }
    }
    (remap, next)
}

/// Collapses each community into a super-node; intra-community weight
/// becomes the super-node's self-loop.
fn aggregate(g: &LevelGraph, comm: &[usize], remap: &[usize], count: usize) -> LevelGraph {
    let mut self_weight = vec![0.0; count];
    for (i, &w) in g.self_weight.iter().enumerate() {
        self_weight[remap[comm[i]]] += w;
    }

    let mut between: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    for (i, neighbors) in g.adj.iter().enumerate() {
        let ci = remap[comm[i]];
        for &(j, w) in neighbors {
            let cj = remap[comm[j]];
            if ci == cj {
                // Every undirected edge appears in both adjacency lists.
                self_weight[ci] += w / 2.0;
            } else if ci < cj {
                *between.entry((ci, cj)).or_insert(0.0) += w;
            }
        }
    }

    let mut adj = vec![Vec::new(); count];
    for (&(a, b), &w) in &between {
        adj[a].push((b, w));
        adj[b].push((a, w));
    }
    LevelGraph { adj, self_weight }
}

/// Applies the grouping policy: size-descending ids for multi-node groups,
/// ties on smallest member index, all singletons merged into one trailing
/// unassociated bucket.
fn assign_groups(node_to_comm: &[usize], n: usize) -> CommunityAssignment {
    let mut members: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for node in 0..n {
        members.entry(node_to_comm[node]).or_default().push(node);
    }
    let mut groups: Vec<Vec<usize>> = members.into_values().collect();
    // Member lists are ascending, so group[0] is the smallest member.
    groups.sort_by(|a, b| b.len().cmp(&a.len()).then(a[0].cmp(&b[0])));

    let mut group_of = vec![0u32; n];
    let mut colors = BTreeMap::new();
    let mut next_id: u32 = 1;
    let mut singletons: Vec<usize> = Vec::new();
    for group in &groups {
        if group.len() > 1 {
            for &node in group {
                group_of[node] = next_id;
            }
            colors.insert(next_id, palette::group_color(next_id).to_string());
            next_id += 1;
        } else {
            singletons.push(group[0]);
        }
    }

    let unassociated = if singletons.is_empty() {
        None
    } else {
        for &node in &singletons {
            group_of[node] = next_id;
        }
        colors.insert(next_id, palette::NEUTRAL.to_string());
        Some(next_id)
    };

    CommunityAssignment {
        group_of,
        colors,
        unassociated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_from_edges(nodes: usize, edges: &[(usize, usize, f64)]) -> UnGraph<String, f64> {
        let mut g = UnGraph::with_capacity(nodes, edges.len());
        let idx: Vec<_> = (0..nodes).map(|i| g.add_node(format!("N{i}"))).collect();
        for &(a, b, w) in edges {
            g.add_edge(idx[a], idx[b], w);
        }
        g
    }

    #[test]
    fn test_partition_covers_every_node_exactly_once() {
        let g = graph_from_edges(
            6,
            &[
                (0, 1, 1.0),
                (1, 2, 1.0),
                (0, 2, 1.0),
                (3, 4, 1.0),
                (4, 5, 1.0),
                (3, 5, 1.0),
            ],
        );
        let a = detect(&g, DEFAULT_PASS_BUDGET).unwrap();
        assert_eq!(a.node_count(), 6);
        for node in 0..6 {
            let id = a.group_of(node);
            assert!(id >= 1);
            assert!(a.color_of(id).is_some());
        }
    }

    #[test]
    fn test_two_cliques_form_two_groups() {
        let g = graph_from_edges(
            6,
            &[
                (0, 1, 1.0),
                (1, 2, 1.0),
                (0, 2, 1.0),
                (3, 4, 1.0),
                (4, 5, 1.0),
                (3, 5, 1.0),
            ],
        );
        let a = detect(&g, DEFAULT_PASS_BUDGET).unwrap();
        // Equal sizes: the group containing node 0 wins the tie.
        assert_eq!(a.group_of(0), 1);
        assert_eq!(a.group_of(1), 1);
        assert_eq!(a.group_of(2), 1);
        assert_eq!(a.group_of(3), 2);
        assert_eq!(a.group_of(4), 2);
        assert_eq!(a.group_of(5), 2);
        assert_eq!(a.unassociated_group(), None);
        assert_eq!(a.group_count(), 2);
    }

    #[test]
    fn test_larger_group_gets_lower_id() {
        // Sizes 3 and 2; the pair sits at lower indices but must get id 2.
        let g = graph_from_edges(
            5,
            &[(0, 1, 1.0), (2, 3, 1.0), (3, 4, 1.0), (2, 4, 1.0)],
        );
        let a = detect(&g, DEFAULT_PASS_BUDGET).unwrap();
        assert_eq!(a.group_of(2), 1);
        assert_eq!(a.group_of(3), 1);
        assert_eq!(a.group_of(4), 1);
        assert_eq!(a.group_of(0), 2);
        assert_eq!(a.group_of(1), 2);
    }

    #[test]
    fn test_isolated_nodes_merge_into_one_unassociated_group() {
        let g = graph_from_edges(5, &[]);
        let a = detect(&g, DEFAULT_PASS_BUDGET).unwrap();
        assert_eq!(a.group_count(), 1);
        assert_eq!(a.unassociated_group(), Some(1));
        for node in 0..5 {
            assert_eq!(a.group_of(node), 1);
        }
        assert_eq!(a.color_of(1), Some(palette::NEUTRAL));
    }

    #[test]
    fn test_edgeless_graph_never_fails_even_with_zero_budget() {
        let g = graph_from_edges(3, &[]);
        assert!(detect(&g, 0).is_ok());
    }

    #[test]
    fn test_singletons_join_unassociated_bucket_after_real_groups() {
        // A pair plus two isolated nodes: group 1 is the pair, group 2 the
        // unassociated bucket with both loners.
        let g = graph_from_edges(4, &[(0, 1, 2.0)]);
        let a = detect(&g, DEFAULT_PASS_BUDGET).unwrap();
        assert_eq!(a.group_of(0), 1);
        assert_eq!(a.group_of(1), 1);
        assert_eq!(a.group_of(2), 2);
        assert_eq!(a.group_of(3), 2);
        assert_eq!(a.unassociated_group(), Some(2));
        assert_eq!(a.color_of(1), Some(palette::group_color(1)));
        assert_eq!(a.color_of(2), Some(palette::NEUTRAL));
    }

    #[test]
    fn test_budget_exhaustion_is_a_hard_failure() {
        let g = graph_from_edges(3, &[(0, 1, 1.0), (1, 2, 1.0)]);
        match detect(&g, 0) {
            Err(PipelineError::BudgetExhausted { passes }) => assert_eq!(passes, 0),
            other => panic!("expected BudgetExhausted, got {other:?}"),
        }
    }

    #[test]
    fn test_detection_is_deterministic() {
        let g = graph_from_edges(
            7,
            &[
                (0, 1, 0.9),
                (1, 2, 0.8),
                (0, 2, 0.7),
                (3, 4, 0.6),
                (4, 5, 0.9),
                (3, 5, 0.5),
                (2, 3, 0.1),
            ],
        );
        let a1 = detect(&g, DEFAULT_PASS_BUDGET).unwrap();
        let a2 = detect(&g, DEFAULT_PASS_BUDGET).unwrap();
        assert_eq!(a1, a2);
    }

    #[test]
    fn test_empty_graph() {
        let g = graph_from_edges(0, &[]);
        let a = detect(&g, DEFAULT_PASS_BUDGET).unwrap();
        assert_eq!(a.node_count(), 0);
        assert_eq!(a.group_count(), 0);
        assert_eq!(a.unassociated_group(), None);
    }
}
