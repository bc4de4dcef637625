//! Keyed directed graph with deterministic traversal order.
//!
//! [`IndexedGraph`] maps domain keys (change-unit identities, in this crate) to dense
//! [`NodeId`] indices and keeps both successor and predecessor sets per node. Every
//! traversal is ordered by key, so results do not depend on insertion order.
//!
//! # Examples
//!
//! ```rust,ignore
//! use hwid_changeset::utils::graph::IndexedGraph;
//!
//! let mut graph: IndexedGraph<&str> = IndexedGraph::new();
//! graph.add_edge("A", "B");
//! graph.add_edge("B", "C");
//!
//! assert_eq!(graph.topological_sort(), Some(vec!["A", "B", "C"]));
//!
//! graph.add_edge("C", "A"); // Creates a cycle
//! assert!(graph.topological_sort().is_none());
//! if let Some(cycle) = graph.find_cycle() {
//!     println!("Found cycle: {:?}", cycle); // ["A", "B", "C", "A"]
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Dense index of a node inside one [`IndexedGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in insertion order
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Node state during cycle discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White, // Unvisited
    Gray,  // On the current DFS path
    Black, // Fully explored
}

/// A directed graph over keys of type `K`.
#[derive(Debug, Clone)]
pub struct IndexedGraph<K>
where
    K: Ord + Clone,
{
    /// Keys in insertion order, indexed by `NodeId`
    keys: Vec<K>,
    /// Map from domain key to `NodeId`
    key_to_node: BTreeMap<K, NodeId>,
    /// Outgoing edges per node
    successors: Vec<BTreeSet<NodeId>>,
    /// Incoming edges per node
    predecessors: Vec<BTreeSet<NodeId>>,
}

impl<K> Default for IndexedGraph<K>
where
    K: Ord + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> IndexedGraph<K>
where
    K: Ord + Clone,
{
    /// Creates a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            key_to_node: BTreeMap::new(),
            successors: Vec::new(),
            predecessors: Vec::new(),
        }
    }

    /// Adds a node with the given key, or returns the existing `NodeId` if already present.
    pub fn add_node(&mut self, key: K) -> NodeId {
        if let Some(&node_id) = self.key_to_node.get(&key) {
            return node_id;
        }

        let node_id = NodeId(self.keys.len());
        self.keys.push(key.clone());
        self.key_to_node.insert(key, node_id);
        self.successors.push(BTreeSet::new());
        self.predecessors.push(BTreeSet::new());
        node_id
    }

    /// Adds a directed edge `from -> to`, creating missing nodes.
    ///
    /// # Returns
    ///
    /// `true` if the edge is new, `false` if it already existed.
    pub fn add_edge(&mut self, from: K, to: K) -> bool {
        let from_node = self.add_node(from);
        let to_node = self.add_node(to);

        if !self.successors[from_node.0].insert(to_node) {
            return false;
        }
        self.predecessors[to_node.0].insert(from_node);
        true
    }

    /// Returns the `NodeId` for a given key, if it exists.
    #[must_use]
    pub fn get_node_id(&self, key: &K) -> Option<NodeId> {
        self.key_to_node.get(key).copied()
    }

    /// Returns the key for a given `NodeId`, if it exists.
    #[must_use]
    pub fn get_key(&self, node_id: NodeId) -> Option<&K> {
        self.keys.get(node_id.0)
    }

    /// Returns `true` if `key` is a node of the graph.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.key_to_node.contains_key(key)
    }

    /// Returns the number of nodes in the graph.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.keys.len()
    }

    /// Returns the number of edges in the graph.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.successors.iter().map(BTreeSet::len).sum()
    }

    /// Returns `true` if the graph contains no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// All keys, ascending.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.key_to_node.keys()
    }

    /// Direct successors of `key`, ascending by key.
    #[must_use]
    pub fn successors(&self, key: &K) -> BTreeSet<&K> {
        self.neighbours(key, &self.successors)
    }

    /// Direct predecessors of `key`, ascending by key.
    #[must_use]
    pub fn predecessors(&self, key: &K) -> BTreeSet<&K> {
        self.neighbours(key, &self.predecessors)
    }

    fn neighbours<'a>(&'a self, key: &K, edges: &'a [BTreeSet<NodeId>]) -> BTreeSet<&'a K> {
        self.get_node_id(key)
            .map(|node| edges[node.0].iter().map(|n| &self.keys[n.0]).collect())
            .unwrap_or_default()
    }

    /// Every node `key` is reachable from, excluding `key` itself unless it lies on a cycle.
    #[must_use]
    pub fn ancestors(&self, key: &K) -> BTreeSet<&K> {
        let mut seen = BTreeSet::new();
        let Some(start) = self.get_node_id(key) else {
            return BTreeSet::new();
        };

        let mut queue: VecDeque<NodeId> = self.predecessors[start.0].iter().copied().collect();
        while let Some(node) = queue.pop_front() {
            if seen.insert(node) {
                queue.extend(self.predecessors[node.0].iter().copied());
            }
        }
        seen.into_iter().map(|node| &self.keys[node.0]).collect()
    }

    /// Adjacency map: every key with its successors.
    #[must_use]
    pub fn to_adjacency(&self) -> BTreeMap<K, BTreeSet<K>> {
        self.key_to_node
            .iter()
            .map(|(key, node)| {
                let successors = self.successors[node.0]
                    .iter()
                    .map(|n| self.keys[n.0].clone())
                    .collect();
                (key.clone(), successors)
            })
            .collect()
    }

    /// Topological order using Kahn's algorithm.
    ///
    /// Among the nodes ready at any step the smallest key goes first, which makes the
    /// order unique for a given graph.
    ///
    /// # Returns
    ///
    /// `None` if the graph contains a cycle.
    #[must_use]
    pub fn topological_sort(&self) -> Option<Vec<K>> {
        let mut in_degree: Vec<usize> = self.predecessors.iter().map(BTreeSet::len).collect();
        let mut ready: BTreeSet<&K> = self
            .key_to_node
            .iter()
            .filter(|(_, node)| in_degree[node.0] == 0)
            .map(|(key, _)| key)
            .collect();

        let mut order = Vec::with_capacity(self.keys.len());
        while let Some(key) = ready.pop_first() {
            let node = self.key_to_node[key];
            order.push(key.clone());

            for successor in &self.successors[node.0] {
                in_degree[successor.0] -= 1;
                if in_degree[successor.0] == 0 {
                    ready.insert(&self.keys[successor.0]);
                }
            }
        }

        (order.len() == self.keys.len()).then_some(order)
    }

    /// Finds one cycle using a three-color depth-first search.
    ///
    /// # Returns
    ///
    /// The nodes of the cycle with the first node repeated at the end, or `None` if the
    /// graph is acyclic.
    #[must_use]
    pub fn find_cycle(&self) -> Option<Vec<K>> {
        let mut colors = vec![Color::White; self.keys.len()];
        let mut path = Vec::new();

        for node in self.key_to_node.values() {
            if colors[node.0] == Color::White {
                if let Some(cycle) = self.dfs_visit(*node, &mut colors, &mut path) {
                    return Some(cycle.into_iter().map(|n| self.keys[n.0].clone()).collect());
                }
            }
        }
        None
    }

    fn dfs_visit(
        &self,
        node: NodeId,
        colors: &mut [Color],
        path: &mut Vec<NodeId>,
    ) -> Option<Vec<NodeId>> {
        colors[node.0] = Color::Gray;
        path.push(node);

        for &successor in &self.successors[node.0] {
            match colors[successor.0] {
                Color::Gray => {
                    let start = path.iter().position(|&n| n == successor)?;
                    let mut cycle = path[start..].to_vec();
                    cycle.push(successor);
                    return Some(cycle);
                }
                Color::White => {
                    if let Some(cycle) = self.dfs_visit(successor, colors, path) {
                        return Some(cycle);
                    }
                }
                Color::Black => {}
            }
        }

        colors[node.0] = Color::Black;
        path.pop();
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_edge_dedup() {
        let mut graph: IndexedGraph<&str> = IndexedGraph::new();
        assert!(graph.add_edge("A", "B"));
        assert!(!graph.add_edge("A", "B"));
        graph.add_node("C");

        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 1);
        let node = graph.add_node("A");
        assert_eq!(node.index(), 0);
        assert_eq!(graph.get_key(node), Some(&"A"));
        assert!(graph.contains(&"C"));
        assert!(graph.successors(&"C").is_empty());
        assert_eq!(graph.predecessors(&"B").into_iter().collect::<Vec<_>>(), vec![&"A"]);
    }

    #[test]
    fn test_topological_sort_tie_break() {
        let mut graph: IndexedGraph<u32> = IndexedGraph::new();
        graph.add_node(9);
        graph.add_edge(5, 1);
        graph.add_edge(3, 1);
        graph.add_node(4);

        assert_eq!(graph.topological_sort(), Some(vec![3, 4, 5, 1, 9]));
        assert!(graph.find_cycle().is_none());
    }

    #[test]
    fn test_cycle() {
        let mut graph: IndexedGraph<&str> = IndexedGraph::new();
        graph.add_edge("A", "B");
        graph.add_edge("B", "C");
        graph.add_edge("C", "A");
        graph.add_edge("D", "A");

        assert!(graph.topological_sort().is_none());
        let cycle = graph.find_cycle().unwrap();
        assert_eq!(cycle.first(), cycle.last());
        assert_eq!(cycle.len(), 4);
    }

    #[test]
    fn test_ancestors_and_adjacency() {
        let mut graph: IndexedGraph<&str> = IndexedGraph::new();
        graph.add_edge("A", "B");
        graph.add_edge("B", "C");
        graph.add_edge("D", "C");
        graph.add_node("E");

        let ancestors: Vec<_> = graph.ancestors(&"C").into_iter().copied().collect();
        assert_eq!(ancestors, vec!["A", "B", "D"]);
        assert!(graph.ancestors(&"E").is_empty());

        let adjacency = graph.to_adjacency();
        assert_eq!(adjacency.len(), 5);
        assert!(adjacency[&"E"].is_empty());
        assert_eq!(adjacency[&"A"], BTreeSet::from(["B"]));
    }
}
