// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Random static network topology generation.
//!
//! In a real-life network, connections are constantly made and broken, and
//! peers use various discovery mechanisms (multicast-DNS, distributed hash
//! tables, ...) to find each other. To simplify the simulation we assume the
//! graph is static throughout a run, and that peers are randomly connected
//! with a fixed expected degree.

use rand::Rng;
use thiserror::Error;

use crate::{NodeId, SimRng};

/// Expected degree of every node in the generated graph.
///
/// NOTE: Graphs of order at most `AVG_DEG` cannot have nodes of this degree,
/// but the generation algorithm already handles this.
pub const AVG_DEG: usize = 16;

/// Errors that may occur during topology generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("must create at least two nodes to create a network topology")]
    TooFewNodes,
}

/// Undirected simple graph over nodes with integer IDs `0..n`.
///
/// Adjacency is final once the driver has wired it.
pub struct Graph {
    adjacency: Vec<Vec<NodeId>>,
}

impl Graph {
    fn new(num_nodes: usize) -> Self {
        Self {
            adjacency: vec![Vec::new(); num_nodes],
        }
    }

    /// Returns the number of nodes in the graph.
    pub fn num_nodes(&self) -> usize {
        self.adjacency.len()
    }

    /// Iterates over all node IDs in ascending order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.adjacency.len()).map(|id| id as NodeId)
    }

    /// Returns the neighbors of the given node in insertion order.
    pub fn neighbors(&self, node: NodeId) -> &[NodeId] {
        &self.adjacency[node as usize]
    }

    fn add_edge(&mut self, u: usize, v: usize) {
        self.adjacency[u].push(v as NodeId);
        self.adjacency[v].push(u as NodeId);
    }
}

/// Generates an undirected random graph with `num_nodes` nodes and an
/// expected degree of [`AVG_DEG`] per node.
///
/// # Errors
///
/// Returns [`TopologyError::TooFewNodes`] if `num_nodes < 2`.
pub fn new_graph(num_nodes: usize, rng: &SimRng) -> Result<Graph, TopologyError> {
    if num_nodes < 2 {
        return Err(TopologyError::TooFewNodes);
    }
    let mut graph = Graph::new(num_nodes);
    add_edges(&mut graph, AVG_DEG, rng);
    Ok(graph)
}

/// Chung-Lu algorithm generating a simple undirected graph in which every
/// node has an expected degree of `deg`.
///
/// Described in the paper "Efficient Generation of Networks with Given
/// Expected Degrees" <http://aric.hagberg.org/papers/miller-2011-efficient.pdf>.
fn add_edges(graph: &mut Graph, deg: usize, rng: &SimRng) {
    // tolerance is chosen so that the log of 1-p stays well-behaved
    let tolerance = 1e-2;
    let num_nodes = graph.num_nodes();
    let edge_count = num_nodes * deg;

    let mut rng = rng.borrow_mut();
    for u in 0..num_nodes - 1 {
        let mut v = u + 1;
        let p = ((deg * deg) as f64 / edge_count as f64).min(1.0);
        while v < num_nodes && p > 0.0 {
            if p < 1.0 - tolerance {
                let r: f64 = rng.random_range(0.0..1.0);
                v = v.saturating_add((r.ln() / (1.0 - p).ln()) as usize);
            }
            if v < num_nodes {
                // here q == p since the expected degrees of all nodes are
                // the same, so the second test always passes
                let r: f64 = rng.random_range(0.0..1.0);
                if r < 1.0 {
                    graph.add_edge(u, v);
                }
                v += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::RefCell;
    use std::rc::Rc;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn rng(seed: u64) -> SimRng {
        Rc::new(RefCell::new(StdRng::seed_from_u64(seed)))
    }

    #[test]
    fn too_few_nodes() {
        assert_eq!(new_graph(0, &rng(4)).err(), Some(TopologyError::TooFewNodes));
        assert_eq!(new_graph(1, &rng(1)).err(), Some(TopologyError::TooFewNodes));
    }

    #[test]
    fn expected_degree() {
        for num_nodes in [10, 100, 1000] {
            let graph = new_graph(num_nodes, &rng(314)).unwrap();
            let expected_degree = AVG_DEG.min(num_nodes - 1);
            let actual: usize = graph
                .node_ids()
                .map(|id| graph.neighbors(id).len())
                .sum();
            let expected = expected_degree * num_nodes;
            assert!(
                actual.abs_diff(expected) <= 2 * num_nodes,
                "total degree {actual}, expected {expected}"
            );
        }
    }

    #[test]
    fn edges_are_symmetric() {
        let graph = new_graph(50, &rng(7)).unwrap();
        for u in graph.node_ids() {
            for &v in graph.neighbors(u) {
                assert!(graph.neighbors(v).contains(&u));
            }
        }
    }
}
