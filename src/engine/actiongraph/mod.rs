//! The plan of a commit: every action needed to turn the probed devicegraph
//! (LHS) into the staging devicegraph (RHS), with the order they must run in.

use std::{
    cmp::Reverse,
    collections::{BinaryHeap, HashSet},
};

use log::{debug, trace};
use petgraph::{
    algo::has_path_connecting,
    graph::{DiGraph, NodeIndex},
    visit::EdgeRef,
    Direction,
};

use strata_api::{
    error::{InternalError, StorageError},
    features::UsedFeatures,
    text::{Tense, Text},
    Devicegraph, Sid,
};

pub mod action;
mod dependencies;
mod graphviz;
mod synthesis;

pub use action::{Action, ActionKind, Affect, ResizeMode, Side};

/// The type of the graph used to store actions and their ordering. An edge
/// u → v means u is committed before v.
pub(crate) type ActionPetgraph = DiGraph<Action, ()>;

#[derive(Debug)]
pub struct Actiongraph<'a> {
    lhs: &'a Devicegraph,
    rhs: &'a Devicegraph,
    graph: ActionPetgraph,

    /// Commit order, a topological sort of `graph`.
    order: Vec<NodeIndex>,
}

impl<'a> Actiongraph<'a> {
    /// Compares `lhs` and `rhs` and builds the ordered actions between them.
    #[tracing::instrument(skip_all, fields(lhs_devices = lhs.num_devices(), rhs_devices = rhs.num_devices()))]
    pub fn new(lhs: &'a Devicegraph, rhs: &'a Devicegraph) -> Result<Self, StorageError> {
        debug!("Building actiongraph");

        trace!("Synthesizing actions");
        let synthesis = synthesis::synthesize(lhs, rhs)?;

        trace!("Adding dependencies");
        let edges = {
            let index = dependencies::Index::new(lhs, rhs, &synthesis)?;
            let mut edges = Vec::new();
            for vertex in synthesis.graph.node_indices() {
                edges.extend(dependencies::add_dependencies(vertex, &index)?);
            }
            edges
        };

        let mut graph = synthesis.graph;
        let mut seen = graph
            .edge_references()
            .map(|e| (e.source(), e.target()))
            .collect::<HashSet<_>>();
        for (from, to) in edges {
            if from != to && seen.insert((from, to)) {
                graph.add_edge(from, to, ());
            }
        }

        let order = commit_order(&graph)?;

        let actiongraph = Self {
            lhs,
            rhs,
            graph,
            order,
        };
        trace!("Built actiongraph:\n{}", actiongraph.describe());
        debug!(
            "Actiongraph built with {} actions and {} dependencies",
            actiongraph.graph.node_count(),
            actiongraph.graph.edge_count()
        );
        Ok(actiongraph)
    }

    pub fn lhs(&self) -> &'a Devicegraph {
        self.lhs
    }

    pub fn rhs(&self) -> &'a Devicegraph {
        self.rhs
    }

    pub fn graph(&self, side: Side) -> &'a Devicegraph {
        match side {
            Side::Lhs => self.lhs,
            Side::Rhs => self.rhs,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn num_actions(&self) -> usize {
        self.graph.node_count()
    }

    pub fn num_dependencies(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn action(&self, vertex: NodeIndex) -> &Action {
        &self.graph[vertex]
    }

    pub fn commit_order(&self) -> &[NodeIndex] {
        &self.order
    }

    /// Actions in commit order.
    pub fn actions(&self) -> impl Iterator<Item = &Action> + '_ {
        self.order.iter().map(|v| &self.graph[*v])
    }

    /// Whether `before` is ordered before `after` by an edge.
    pub fn has_dependency(&self, before: NodeIndex, after: NodeIndex) -> bool {
        self.graph.contains_edge(before, after)
    }

    /// Whether `before` is ordered before `after`, directly or transitively.
    pub fn has_path(&self, before: NodeIndex, after: NodeIndex) -> bool {
        before != after && has_path_connecting(&self.graph, before, after, None)
    }

    /// Vertices of all actions affecting `sid`, in commit order.
    pub fn vertices_of(&self, sid: Sid) -> Vec<NodeIndex> {
        self.order
            .iter()
            .copied()
            .filter(|v| self.graph[*v].sid() == sid)
            .collect()
    }

    /// Features the system needs to run the commit.
    pub fn used_features(&self) -> UsedFeatures {
        self.actions()
            .fold(UsedFeatures::empty(), |features, action| {
                features | action.used_features(self)
            })
    }

    /// Texts of all actions in commit order.
    pub fn texts(&self, tense: Tense) -> Result<Vec<Text>, StorageError> {
        self.actions().map(|action| action.text(self, tense)).collect()
    }

    fn describe(&self) -> String {
        let mut buf: Vec<String> = Vec::new();
        for vertex in &self.order {
            buf.push(format!("[{}] {}", vertex.index(), self.graph[*vertex]));
            for edge in self.graph.edges(*vertex) {
                buf.push(format!(
                    "  -> [{}] {}",
                    edge.target().index(),
                    self.graph[edge.target()]
                ));
            }
        }
        buf.join("\n")
    }
}

/// Kahn's algorithm. Among the actions ready to run, the one with the lowest
/// sid goes first, then the one added first.
fn commit_order(graph: &ActionPetgraph) -> Result<Vec<NodeIndex>, StorageError> {
    let mut in_degree = graph
        .node_indices()
        .map(|v| graph.edges_directed(v, Direction::Incoming).count())
        .collect::<Vec<_>>();

    let key = |v: NodeIndex| Reverse((graph[v].sid(), v.index()));
    let mut ready = graph
        .node_indices()
        .filter(|v| in_degree[v.index()] == 0)
        .map(key)
        .collect::<BinaryHeap<_>>();

    let mut order = Vec::with_capacity(graph.node_count());
    while let Some(Reverse((_, index))) = ready.pop() {
        let vertex = NodeIndex::new(index);
        order.push(vertex);
        for next in graph.neighbors_directed(vertex, Direction::Outgoing) {
            in_degree[next.index()] -= 1;
            if in_degree[next.index()] == 0 {
                ready.push(key(next));
            }
        }
    }

    if order.len() != graph.node_count() {
        let stuck = graph
            .node_indices()
            .find(|v| in_degree[v.index()] > 0)
            .map(|v| graph[v].sid())
            .unwrap_or(Sid(0));
        return Err(StorageError::new(InternalError::ActiongraphCycle { sid: stuck }));
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use strata_api::error::ErrorKind;

    use super::*;

    #[test]
    fn test_commit_order_breaks_ties_by_sid() {
        let mut graph = ActionPetgraph::new();
        let c = graph.add_node(Action::new(ActionKind::Create, Affect::Device(Sid(30))));
        let a = graph.add_node(Action::new(ActionKind::Create, Affect::Device(Sid(10))));
        let b = graph.add_node(Action::new(ActionKind::Create, Affect::Device(Sid(20))));
        assert_eq!(commit_order(&graph).unwrap(), vec![a, b, c]);

        graph.add_edge(c, a, ());
        assert_eq!(commit_order(&graph).unwrap(), vec![b, c, a]);
    }

    #[test]
    fn test_commit_order_cycle() {
        let mut graph = ActionPetgraph::new();
        let a = graph.add_node(Action::new(ActionKind::Create, Affect::Device(Sid(1))));
        let b = graph.add_node(Action::new(ActionKind::Delete, Affect::Device(Sid(2))));
        graph.add_edge(a, b, ());
        graph.add_edge(b, a, ());

        let err = commit_order(&graph).unwrap_err();
        assert!(err.is_internal());
        assert!(matches!(
            err.kind(),
            ErrorKind::Internal(InternalError::ActiongraphCycle { .. })
        ));
    }

    #[test]
    fn test_empty() {
        let graph = Devicegraph::new();
        let actiongraph = Actiongraph::new(&graph, &graph).unwrap();
        assert!(actiongraph.is_empty());
        assert_eq!(actiongraph.used_features(), UsedFeatures::empty());
    }
}
