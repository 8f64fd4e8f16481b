use crate::core::models::ids::ClusterId;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum GraphError {
    #[error("Edge weight {weight} between {source_id} and {target} is outside [0, 1]")]
    InvalidWeight {
        source_id: ClusterId,
        target: ClusterId,
        weight: f64,
    },
    #[error("Self-loop on node {0} is not allowed")]
    SelfLoop(ClusterId),
    #[error("Top-k filtering requires k >= 1")]
    InvalidTopK,
}

/// An undirected weighted edge, reported with `source < target`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub source: ClusterId,
    pub target: ClusterId,
    pub weight: f64,
}

/// Undirected weighted graph over cluster ids.
///
/// Each node maps to its neighbours and the shared edge weight. [`SimilarityGraph::add_edge`]
/// writes both directions at once, so adjacency stays symmetric for every graph built
/// through this API. Iteration order is by ascending cluster id, which makes every
/// traversal and tie-break below deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimilarityGraph {
    adjacency: BTreeMap<ClusterId, BTreeMap<ClusterId, f64>>,
}

impl SimilarityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: ClusterId) {
        self.adjacency.entry(node).or_default();
    }

    /// Inserts (or overwrites) the undirected edge `a - b`, adding missing endpoints.
    pub fn add_edge(&mut self, a: ClusterId, b: ClusterId, weight: f64) -> Result<(), GraphError> {
        if a == b {
            return Err(GraphError::SelfLoop(a));
        }
        if !(0.0..=1.0).contains(&weight) {
            return Err(GraphError::InvalidWeight {
                source_id: a,
                target: b,
                weight,
            });
        }
        self.adjacency.entry(a).or_default().insert(b, weight);
        self.adjacency.entry(b).or_default().insert(a, weight);
        Ok(())
    }

    /// Removes the edge `a - b` from both endpoints and returns its weight.
    pub fn remove_edge(&mut self, a: ClusterId, b: ClusterId) -> Option<f64> {
        let weight = self.adjacency.get_mut(&a)?.remove(&b);
        if let Some(neighbors) = self.adjacency.get_mut(&b) {
            neighbors.remove(&a);
        }
        weight
    }

    pub fn contains_node(&self, node: ClusterId) -> bool {
        self.adjacency.contains_key(&node)
    }

    pub fn weight(&self, a: ClusterId, b: ClusterId) -> Option<f64> {
        self.adjacency.get(&a)?.get(&b).copied()
    }

    pub fn n_nodes(&self) -> usize {
        self.adjacency.len()
    }

    pub fn n_edges(&self) -> usize {
        self.edges().len()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = ClusterId> + '_ {
        self.adjacency.keys().copied()
    }

    pub fn neighbors(&self, node: ClusterId) -> impl Iterator<Item = (ClusterId, f64)> + '_ {
        self.adjacency
            .get(&node)
            .into_iter()
            .flat_map(|n| n.iter().map(|(&id, &w)| (id, w)))
    }

    pub fn degree(&self, node: ClusterId) -> usize {
        self.adjacency.get(&node).map_or(0, BTreeMap::len)
    }

    /// Every undirected edge exactly once, ordered by `(source, target)`.
    ///
    /// An edge seen from either endpoint counts, so a damaged one-sided entry is still
    /// reported.
    pub fn edges(&self) -> Vec<Edge> {
        let mut seen = BTreeSet::new();
        let mut edges = Vec::new();
        for (&a, neighbors) in &self.adjacency {
            for (&b, &weight) in neighbors {
                let key = (a.min(b), a.max(b));
                if seen.insert(key) {
                    edges.push(Edge {
                        source: key.0,
                        target: key.1,
                        weight,
                    });
                }
            }
        }
        edges.sort_by_key(|e| (e.source, e.target));
        edges
    }

    /// Directed entries `(a, b)` whose reverse entry is missing or carries another weight.
    pub fn asymmetric_entries(&self) -> Vec<(ClusterId, ClusterId)> {
        let mut found = Vec::new();
        for (&a, neighbors) in &self.adjacency {
            for (&b, &weight) in neighbors {
                if self.weight(b, a) != Some(weight) {
                    found.push((a, b));
                }
            }
        }
        found
    }

    /// Logs a warning for every asymmetric adjacency entry and returns how many there are.
    pub fn check_symmetry(&self) -> usize {
        let asymmetric = self.asymmetric_entries();
        for (a, b) in &asymmetric {
            warn!(source = %a, target = %b, "Adjacency entry has no matching reverse entry.");
        }
        asymmetric.len()
    }

    /// Keeps an edge only when each endpoint ranks the other among its `k` strongest
    /// neighbours.
    ///
    /// Neighbours are ranked by descending weight, ties broken by ascending cluster id.
    /// Both endpoints apply the same rule to the same pair, so the result is symmetric.
    /// Every node is kept, including those left without edges.
    pub fn topk_filter(&self, k: usize) -> Result<SimilarityGraph, GraphError> {
        if k == 0 {
            return Err(GraphError::InvalidTopK);
        }

        let ranks: HashMap<ClusterId, HashMap<ClusterId, usize>> = self
            .adjacency
            .iter()
            .map(|(&node, neighbors)| {
                let mut ordered: Vec<(ClusterId, f64)> =
                    neighbors.iter().map(|(&id, &w)| (id, w)).collect();
                ordered.sort_by(|x, y| y.1.total_cmp(&x.1).then(x.0.cmp(&y.0)));
                let rank = ordered
                    .into_iter()
                    .enumerate()
                    .map(|(pos, (id, _))| (id, pos))
                    .collect();
                (node, rank)
            })
            .collect();
        let rank_of = |node: ClusterId, neighbor: ClusterId| {
            ranks
                .get(&node)
                .and_then(|r| r.get(&neighbor))
                .copied()
                .unwrap_or(usize::MAX)
        };

        let mut filtered = SimilarityGraph::new();
        for (&node, neighbors) in &self.adjacency {
            filtered.add_node(node);
            for (&neighbor, &weight) in neighbors {
                if node < neighbor && rank_of(node, neighbor) < k && rank_of(neighbor, node) < k {
                    filtered.add_edge(node, neighbor, weight)?;
                }
            }
        }
        Ok(filtered)
    }

    /// Nodes reachable from `start`, following edges recorded at either endpoint.
    pub fn reachable_from(&self, start: ClusterId) -> BTreeSet<ClusterId> {
        self.reachable_with(start, &self.reverse_only_entries())
    }

    fn reachable_with(
        &self,
        start: ClusterId,
        reverse: &HashMap<ClusterId, Vec<ClusterId>>,
    ) -> BTreeSet<ClusterId> {
        let mut visited = BTreeSet::new();
        if !self.contains_node(start) {
            return visited;
        }
        let mut stack = vec![start];
        visited.insert(start);
        while let Some(current) = stack.pop() {
            let forward = self.neighbors(current).map(|(id, _)| id);
            let backward = reverse.get(&current).into_iter().flatten().copied();
            for next in forward.chain(backward) {
                if visited.insert(next) {
                    stack.push(next);
                }
            }
        }
        visited
    }

    /// Splits the graph into its connected components, ordered by smallest member id.
    ///
    /// Every node lands in exactly one component; each component keeps all of its
    /// internal edges.
    pub fn connected_components(&self) -> Vec<SimilarityGraph> {
        let mut unvisited: BTreeSet<ClusterId> = self.adjacency.keys().copied().collect();
        let reverse = self.reverse_only_entries();
        let mut components = Vec::new();
        while let Some(&start) = unvisited.iter().next() {
            let members = self.reachable_with(start, &reverse);
            for member in &members {
                unvisited.remove(member);
            }
            components.push(self.subgraph(&members));
        }
        components
    }

    pub fn n_connected_components(&self) -> usize {
        self.connected_components().len()
    }

    /// The induced subgraph on `nodes`.
    pub fn subgraph(&self, nodes: &BTreeSet<ClusterId>) -> SimilarityGraph {
        let adjacency = nodes
            .iter()
            .filter_map(|node| {
                self.adjacency.get(node).map(|neighbors| {
                    let kept = neighbors
                        .iter()
                        .filter(|(id, _)| nodes.contains(id))
                        .map(|(&id, &w)| (id, w))
                        .collect();
                    (*node, kept)
                })
            })
            .collect();
        SimilarityGraph { adjacency }
    }

    /// The lowest-weight edge; ties go to the first edge in `(source, target)` order.
    pub fn weakest_edge(&self) -> Option<Edge> {
        self.edges()
            .into_iter()
            .fold(None, |best: Option<Edge>, edge| match best {
                Some(b) if b.weight <= edge.weight => Some(b),
                _ => Some(edge),
            })
    }

    /// Removes the weakest edge from both endpoints and returns it.
    pub fn remove_weakest_edge(&mut self) -> Option<Edge> {
        let edge = self.weakest_edge()?;
        self.remove_edge(edge.source, edge.target);
        Some(edge)
    }

    fn reverse_only_entries(&self) -> HashMap<ClusterId, Vec<ClusterId>> {
        let mut reverse: HashMap<ClusterId, Vec<ClusterId>> = HashMap::new();
        for (a, b) in self.asymmetric_entries() {
            if self.weight(b, a).is_none() {
                reverse.entry(b).or_default().push(a);
            }
        }
        reverse
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: usize) -> ClusterId {
        ClusterId(n)
    }

    fn graph(edges: &[(usize, usize, f64)]) -> SimilarityGraph {
        let mut g = SimilarityGraph::new();
        for &(a, b, w) in edges {
            g.add_edge(id(a), id(b), w).unwrap();
        }
        g
    }

    fn node_ids(g: &SimilarityGraph) -> Vec<usize> {
        g.nodes().map(|n| n.0).collect()
    }

    #[test]
    fn add_edge_is_symmetric() {
        let g = graph(&[(1, 2, 0.7)]);
        assert_eq!(g.weight(id(1), id(2)), Some(0.7));
        assert_eq!(g.weight(id(2), id(1)), Some(0.7));
        assert_eq!(g.n_edges(), 1);
        assert!(g.asymmetric_entries().is_empty());
        assert_eq!(g.check_symmetry(), 0);
    }

    #[test]
    fn add_edge_rejects_self_loops_and_bad_weights() {
        let mut g = SimilarityGraph::new();
        assert_eq!(g.add_edge(id(1), id(1), 0.5), Err(GraphError::SelfLoop(id(1))));
        assert!(matches!(
            g.add_edge(id(1), id(2), 1.5),
            Err(GraphError::InvalidWeight { .. })
        ));
        assert!(g.is_empty());
    }

    #[test]
    fn new_graphs_do_not_share_storage() {
        let mut first = SimilarityGraph::new();
        first.add_edge(id(1), id(2), 0.9).unwrap();
        let second = SimilarityGraph::new();
        assert!(second.is_empty());
    }

    #[test]
    fn topk_keeps_only_mutual_strong_edges() {
        // Node 0 is a hub; with k = 1 only its best partner survives, and 3 - 4 stays
        // because both sides rank each other first.
        let g = graph(&[
            (0, 1, 0.9),
            (0, 2, 0.8),
            (0, 3, 0.7),
            (2, 3, 0.6),
            (3, 4, 0.95),
        ]);
        let filtered = g.topk_filter(1).unwrap();

        let edges: Vec<(usize, usize)> = filtered
            .edges()
            .iter()
            .map(|e| (e.source.0, e.target.0))
            .collect();
        assert_eq!(edges, vec![(0, 1), (3, 4)]);
        assert_eq!(node_ids(&filtered), vec![0, 1, 2, 3, 4]);
        assert!(filtered.asymmetric_entries().is_empty());
    }

    #[test]
    fn topk_ties_are_broken_by_id() {
        let g = graph(&[(0, 1, 0.8), (0, 2, 0.8)]);
        let filtered = g.topk_filter(1).unwrap();
        assert_eq!(filtered.weight(id(0), id(1)), Some(0.8));
        assert_eq!(filtered.weight(id(0), id(2)), None);
    }

    #[test]
    fn topk_with_large_k_is_identity() {
        let g = graph(&[(0, 1, 0.9), (1, 2, 0.8), (0, 2, 0.7)]);
        assert_eq!(g.topk_filter(10).unwrap(), g);
        assert_eq!(g.topk_filter(0), Err(GraphError::InvalidTopK));
    }

    #[test]
    fn connected_components_partition_nodes() {
        let mut g = graph(&[(0, 1, 0.9), (2, 3, 0.8), (3, 4, 0.7)]);
        g.add_node(id(5));
        let components = g.connected_components();

        let sets: Vec<Vec<usize>> = components.iter().map(node_ids).collect();
        assert_eq!(sets, vec![vec![0, 1], vec![2, 3, 4], vec![5]]);
        assert_eq!(components[1].n_edges(), 2);
        assert_eq!(components[2].n_edges(), 0);
    }

    #[test]
    fn components_follow_one_sided_entries() {
        let mut g = graph(&[(0, 1, 0.9)]);
        g.adjacency.entry(id(2)).or_default().insert(id(1), 0.5);
        assert_eq!(g.check_symmetry(), 1);

        let components = g.connected_components();
        assert_eq!(components.len(), 1);
        assert_eq!(node_ids(&components[0]), vec![0, 1, 2]);
    }

    #[test]
    fn weakest_edge_is_removed_from_both_sides() {
        let mut g = graph(&[(1, 2, 0.9), (1, 3, 0.3), (2, 3, 0.3)]);
        let removed = g.remove_weakest_edge().unwrap();

        assert_eq!((removed.source, removed.target), (id(1), id(3)));
        assert_eq!(g.weight(id(3), id(1)), None);
        assert_eq!(g.n_edges(), 2);
        assert!(SimilarityGraph::new().remove_weakest_edge().is_none());
    }
}
