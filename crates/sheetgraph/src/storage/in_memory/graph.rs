//! Dependency graph traversals using petgraph.
//!
//! This module provides the graph algorithms for the in-memory store:
//! - Dependent discovery (BFS over incoming edges)
//! - Path enumeration into a cell (DFS over incoming edges)
//!
//! Neighbors are always visited in edge creation order so results are
//! deterministic. Both walks are depth bounded and check the deadline as
//! they go.

use crate::domain::{CellAddress, DependsOn, EdgeId};
use crate::error::Result;
use crate::storage::{Deadline, check_deadline};
use petgraph::Direction;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{HashSet, VecDeque};

type CellGraph = DiGraph<CellAddress, DependsOn>;

/// A path found by [`paths_into`], as graph indices.
///
/// `nodes[0]` is the target; `edges[i]` runs from `nodes[i + 1]` to `nodes[i]`.
#[derive(Debug, Clone)]
pub(super) struct RawPath {
    pub(super) nodes: Vec<NodeIndex>,
    pub(super) edges: Vec<EdgeIndex>,
}

/// Incoming edges of `node` as (edge, dependent) pairs, oldest edge first.
fn incoming(graph: &CellGraph, node: NodeIndex) -> Vec<(EdgeIndex, NodeIndex)> {
    let mut edges: Vec<(EdgeId, EdgeIndex, NodeIndex)> = graph
        .edges_directed(node, Direction::Incoming)
        .map(|edge| (edge.weight().id, edge.id(), edge.source()))
        .collect();
    edges.sort_unstable_by_key(|(id, _, _)| *id);
    edges
        .into_iter()
        .map(|(_, edge, source)| (edge, source))
        .collect()
}

/// Nodes transitively depending on `start`, in BFS discovery order.
///
/// The start node is marked visited up front, so it never appears in the
/// result even when a cycle leads back to it.
pub(super) fn dependents_bfs(
    graph: &CellGraph,
    start: NodeIndex,
    max_depth: usize,
    deadline: Option<&Deadline>,
) -> Result<Vec<NodeIndex>> {
    let mut result = Vec::new();
    if max_depth == 0 {
        return Ok(result);
    }

    let mut visited = HashSet::from([start]);
    let mut queue: VecDeque<(NodeIndex, usize)> = VecDeque::from([(start, 0)]);

    while let Some((current, depth)) = queue.pop_front() {
        check_deadline(deadline, result.len())?;
        if depth >= max_depth {
            continue;
        }

        for (_, dependent) in incoming(graph, current) {
            if visited.insert(dependent) {
                result.push(dependent);
                queue.push_back((dependent, depth + 1));
            }
        }
    }

    Ok(result)
}

/// Every path of 1..=`max_depth` edges leading into `target`.
///
/// An edge is used at most once per path; nodes may repeat.
pub(super) fn paths_into(
    graph: &CellGraph,
    target: NodeIndex,
    max_depth: usize,
    deadline: Option<&Deadline>,
) -> Result<Vec<RawPath>> {
    let mut paths = Vec::new();
    let mut current = RawPath {
        nodes: vec![target],
        edges: Vec::new(),
    };
    walk_back(graph, &mut current, max_depth, deadline, &mut paths)?;
    Ok(paths)
}

fn walk_back(
    graph: &CellGraph,
    current: &mut RawPath,
    max_depth: usize,
    deadline: Option<&Deadline>,
    paths: &mut Vec<RawPath>,
) -> Result<()> {
    if current.edges.len() >= max_depth {
        return Ok(());
    }
    let Some(&tip) = current.nodes.last() else {
        return Ok(());
    };

    for (edge, dependent) in incoming(graph, tip) {
        if current.edges.contains(&edge) {
            continue;
        }
        check_deadline(deadline, paths.len())?;

        current.nodes.push(dependent);
        current.edges.push(edge);
        paths.push(current.clone());
        walk_back(graph, current, max_depth, deadline, paths)?;
        current.nodes.pop();
        current.edges.pop();
    }
    Ok(())
}

/// All edges in creation order, up to `limit`.
pub(super) fn edges_in_order(graph: &CellGraph, limit: Option<usize>) -> Vec<EdgeIndex> {
    let mut edges: Vec<(EdgeId, EdgeIndex)> = graph
        .edge_references()
        .map(|edge| (edge.weight().id, edge.id()))
        .collect();
    edges.sort_unstable_by_key(|(id, _)| *id);
    edges
        .into_iter()
        .map(|(_, edge)| edge)
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(graph: &mut CellGraph, from: NodeIndex, to: NodeIndex, id: u64) {
        graph.add_edge(
            from,
            to,
            DependsOn {
                id: EdgeId(id),
                formula_text: String::new(),
            },
        );
    }

    /// `A1 <- A2 <- A3`, plus `A3 -> A1` directly.
    fn chain() -> (CellGraph, [NodeIndex; 3]) {
        let mut graph = CellGraph::new();
        let a1 = graph.add_node(CellAddress::parse("A1"));
        let a2 = graph.add_node(CellAddress::parse("A2"));
        let a3 = graph.add_node(CellAddress::parse("A3"));
        edge(&mut graph, a2, a1, 1);
        edge(&mut graph, a3, a2, 2);
        edge(&mut graph, a3, a1, 3);
        (graph, [a1, a2, a3])
    }

    #[test]
    fn test_bfs_dedupes_and_respects_depth() {
        let (graph, [a1, a2, a3]) = chain();
        assert_eq!(dependents_bfs(&graph, a1, 10, None).unwrap(), vec![a2, a3]);
        assert_eq!(dependents_bfs(&graph, a2, 1, None).unwrap(), vec![a3]);
        assert!(dependents_bfs(&graph, a1, 0, None).unwrap().is_empty());
    }

    #[test]
    fn test_bfs_terminates_on_cycle() {
        let mut graph = CellGraph::new();
        let a1 = graph.add_node(CellAddress::parse("A1"));
        let a2 = graph.add_node(CellAddress::parse("A2"));
        edge(&mut graph, a1, a2, 1);
        edge(&mut graph, a2, a1, 2);

        assert_eq!(dependents_bfs(&graph, a1, 10, None).unwrap(), vec![a2]);
    }

    #[test]
    fn test_paths_into_enumerates_every_prefix() {
        let (graph, [a1, a2, a3]) = chain();
        let paths = paths_into(&graph, a1, 5, None).unwrap();
        let nodes: Vec<Vec<NodeIndex>> = paths.into_iter().map(|p| p.nodes).collect();
        assert_eq!(nodes, vec![vec![a1, a2], vec![a1, a2, a3], vec![a1, a3]]);
    }

    #[test]
    fn test_paths_into_bounded_on_cycle() {
        let mut graph = CellGraph::new();
        let a1 = graph.add_node(CellAddress::parse("A1"));
        let a2 = graph.add_node(CellAddress::parse("A2"));
        edge(&mut graph, a1, a2, 1);
        edge(&mut graph, a2, a1, 2);

        // A1 <- A2 <- A1, then both edges are used up
        let paths = paths_into(&graph, a1, 5, None).unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[1].nodes, vec![a1, a2, a1]);
    }

    #[test]
    fn test_expired_deadline_aborts() {
        let (graph, [a1, ..]) = chain();
        let deadline = Deadline::after(std::time::Duration::ZERO);
        assert!(dependents_bfs(&graph, a1, 10, Some(&deadline)).is_err());
        assert!(paths_into(&graph, a1, 5, Some(&deadline)).is_err());
    }

    #[test]
    fn test_edges_in_creation_order_with_limit() {
        let (graph, _) = chain();
        let ids: Vec<EdgeId> = edges_in_order(&graph, Some(2))
            .into_iter()
            .map(|e| graph[e].id)
            .collect();
        assert_eq!(ids, vec![EdgeId(1), EdgeId(2)]);
    }
}
