//! Workflow graph model.
//!
//! Nodes live in one ordered `Vec`; edges are identifier lookups resolved
//! through an id -> position index. Decoding only checks that each record is
//! well-formed for its type. Business rules (reachability, reference
//! integrity, rule ordering) belong to the validator, because a well-formed
//! but semantically broken graph is exactly what draft editing produces.
//!
//! Reachability queries build a `petgraph` view on demand. Duplicate ids and
//! edges to missing nodes are left out of that view; the validator reports
//! them separately.

use std::collections::{HashMap, HashSet};

use formflow_types::error::WorkflowError;
use formflow_types::workflow::{Node, NodeKind, NodeType};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed};
use uuid::Uuid;

/// A decoded workflow graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
    nodes: Vec<Node>,
    /// Position of the first node carrying each id.
    index: HashMap<String, usize>,
}

impl Graph {
    /// Decode a JSON node list.
    pub fn parse(bytes: &[u8]) -> Result<Self, WorkflowError> {
        let nodes: Vec<Node> = serde_json::from_slice(bytes)
            .map_err(|e| WorkflowError::MalformedGraph(e.to_string()))?;
        Ok(Self::from_nodes(nodes))
    }

    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        let mut graph = Self {
            nodes,
            index: HashMap::new(),
        };
        graph.reindex();
        graph
    }

    /// The graph every form starts with: `start -> end`.
    pub fn initial() -> Self {
        let end_id = new_node_id();
        Self::from_nodes(vec![Node::start(new_node_id(), end_id.clone()), Node::end(end_id)])
    }

    /// Encode back to the persisted JSON shape, preserving node order.
    pub fn serialize(&self) -> Result<Vec<u8>, WorkflowError> {
        serde_json::to_vec(&self.nodes).map_err(|e| WorkflowError::MalformedGraph(e.to_string()))
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn into_nodes(self) -> Vec<Node> {
        self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn by_id(&self, id: &str) -> Result<&Node, WorkflowError> {
        self.get(id)
            .ok_or_else(|| WorkflowError::NodeNotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Distinct successor ids of `node`; empty for `end`.
    pub fn successors<'a>(&self, node: &'a Node) -> Vec<&'a str> {
        let mut out: Vec<&str> = Vec::with_capacity(2);
        for next in node.successors() {
            if !out.contains(&next) {
                out.push(next);
            }
        }
        out
    }

    /// All `start` nodes in list order. A valid graph has exactly one.
    pub fn start_nodes(&self) -> Vec<&Node> {
        self.nodes
            .iter()
            .filter(|n| n.node_type() == NodeType::Start)
            .collect()
    }

    // -----------------------------------------------------------------------
    // Reachability
    // -----------------------------------------------------------------------

    /// Ids reachable from the first `start` node (including it). Empty when
    /// the graph has no start.
    pub fn reachable_from_start(&self) -> HashSet<&str> {
        match self.start_nodes().first() {
            Some(start) => self.reachable_from(&start.id),
            None => HashSet::new(),
        }
    }

    /// Ids reachable from `id`, including `id` itself.
    pub fn reachable_from(&self, id: &str) -> HashSet<&str> {
        let view = self.view();
        let Some(&from) = view.indices.get(id) else {
            return HashSet::new();
        };
        let mut seen = HashSet::new();
        let mut dfs = Dfs::new(&view.graph, from);
        while let Some(nx) = dfs.next(&view.graph) {
            seen.insert(view.graph[nx]);
        }
        seen
    }

    /// Ids of nodes with a path to `id`. `id` itself is only included when it
    /// sits on a cycle.
    pub fn ancestors(&self, id: &str) -> HashSet<&str> {
        let view = self.view();
        let Some(&target) = view.indices.get(id) else {
            return HashSet::new();
        };
        let reversed = Reversed(&view.graph);
        let mut seen = HashSet::new();
        let mut dfs = Dfs::new(reversed, target);
        while let Some(nx) = dfs.next(reversed) {
            if nx != target {
                seen.insert(view.graph[nx]);
            }
        }
        // A successor that can reach `id` closes a cycle through it.
        let on_cycle = view
            .graph
            .neighbors(target)
            .any(|s| s == target || seen.contains(view.graph[s]));
        if on_cycle {
            seen.insert(view.graph[target]);
        }
        seen
    }

    /// Ids of nodes with a path to some `end` node (including the ends).
    pub fn nodes_reaching_end(&self) -> HashSet<&str> {
        let view = self.view();
        let reversed = Reversed(&view.graph);
        let mut seen = HashSet::new();
        for node in self.nodes.iter().filter(|n| n.node_type() == NodeType::End) {
            let Some(&end) = view.indices.get(node.id.as_str()) else {
                continue;
            };
            let mut dfs = Dfs::new(reversed, end);
            while let Some(nx) = dfs.next(reversed) {
                seen.insert(view.graph[nx]);
            }
        }
        seen
    }

    fn view(&self) -> GraphView<'_> {
        let mut graph = DiGraph::<&str, ()>::new();
        let mut indices: HashMap<&str, NodeIndex> = HashMap::new();
        for node in &self.nodes {
            if !indices.contains_key(node.id.as_str()) {
                indices.insert(node.id.as_str(), graph.add_node(node.id.as_str()));
            }
        }
        for (id, &pos) in &self.index {
            let from = indices[id.as_str()];
            for next in self.successors(&self.nodes[pos]) {
                if let Some(&to) = indices.get(next) {
                    graph.update_edge(from, to, ());
                }
            }
        }
        GraphView { graph, indices }
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Insert a new `section` or `condition` directly after `start`, taking
    /// over start's outgoing edge. Returns the new node's id.
    pub fn insert_node(&mut self, node_type: NodeType) -> Result<String, WorkflowError> {
        if !node_type.is_creatable() {
            return Err(WorkflowError::InvalidNodeOperation(format!(
                "{node_type} nodes cannot be created individually"
            )));
        }
        let id = new_node_id();
        let (start_pos, old_next) = self
            .nodes
            .iter_mut()
            .enumerate()
            .find_map(|(i, n)| match &mut n.kind {
                NodeKind::Start { next } => Some((i, std::mem::replace(next, id.clone()))),
                _ => None,
            })
            .ok_or_else(|| {
                WorkflowError::InvalidNodeOperation("graph has no start node".to_string())
            })?;

        let node = match node_type {
            NodeType::Section => Node::section(id.clone(), "New Section", old_next),
            _ => Node::condition(id.clone(), old_next.clone(), old_next, None),
        };
        self.nodes.insert(start_pos + 1, node);
        self.reindex();
        Ok(id)
    }

    /// Remove a `section` or `condition` node and repair references to it.
    ///
    /// Edges that pointed at the removed node are redirected to its `next`
    /// (sections) or `nextTrue` (conditions; `nextFalse` when `nextTrue` loops
    /// back). A node whose only successor is itself cannot be removed.
    /// Condition rules that tested the removed node are cleared back to
    /// unconfigured.
    pub fn remove_node(&mut self, id: &str) -> Result<Node, WorkflowError> {
        let pos = *self
            .index
            .get(id)
            .ok_or_else(|| WorkflowError::NodeNotFound(id.to_string()))?;

        let candidates: Vec<&str> = match &self.nodes[pos].kind {
            NodeKind::Section { next } => vec![next.as_str()],
            NodeKind::Condition {
                next_true,
                next_false,
                ..
            } => vec![next_true.as_str(), next_false.as_str()],
            NodeKind::Start { .. } | NodeKind::End => {
                return Err(WorkflowError::InvalidNodeOperation(format!(
                    "{} nodes cannot be deleted",
                    self.nodes[pos].node_type()
                )));
            }
        };
        // Self-loops cannot carry traffic past the removed node.
        let bypass = candidates
            .into_iter()
            .find(|next| *next != id)
            .map(str::to_string)
            .ok_or_else(|| {
                WorkflowError::InvalidNodeOperation(format!(
                    "node '{id}' has no successor other than itself to route around it"
                ))
            })?;

        let removed = self.nodes.remove(pos);
        for node in &mut self.nodes {
            for next in node.successors_mut() {
                if *next == id {
                    *next = bypass.clone();
                }
            }
            if let NodeKind::Condition { rule, .. } = &mut node.kind {
                if rule.as_ref().is_some_and(|r| r.node_id == id) {
                    *rule = None;
                }
            }
        }
        self.reindex();
        Ok(removed)
    }

    /// Change a node's display label. No structural effect.
    pub fn rename_node(&mut self, id: &str, label: &str) -> Result<(), WorkflowError> {
        let pos = *self
            .index
            .get(id)
            .ok_or_else(|| WorkflowError::NodeNotFound(id.to_string()))?;
        self.nodes[pos].label = label.to_string();
        Ok(())
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (i, node) in self.nodes.iter().enumerate() {
            self.index.entry(node.id.clone()).or_insert(i);
        }
    }
}

struct GraphView<'a> {
    graph: DiGraph<&'a str, ()>,
    indices: HashMap<&'a str, NodeIndex>,
}

fn new_node_id() -> String {
    Uuid::now_v7().to_string()
}
