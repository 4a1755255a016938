use crate::model::{ExecutionConfig, Extensions, Metadata, Node, Relation};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One adjacency entry: the neighbor's node index plus the index of the
/// relation that produced the edge, so strength lookups during weighted
/// averaging stay O(1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub node: usize,
    pub relation: usize,
}

/// Structural complexity metrics computed at compile time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Complexity {
    /// Longest chain found by BFS over the forward graph, in edges.
    pub max_depth: u32,
    /// Mean out-degree across nodes with at least one outgoing edge.
    pub avg_branching: f64,
    /// Number of DFS back edges in the propagation graph.
    pub cycle_count: u32,
}

/// Compile-time annotation carried on every compiled graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilationInfo {
    pub timestamp: String,
    pub node_count: usize,
    pub relation_count: usize,
    pub complexity: Complexity,
}

/// An execution-ready graph: dense node and relation arenas plus id→index
/// maps and forward/reverse adjacency.
///
/// Bidirectional relations appear in both directions in *both* adjacency
/// structures, which doubles their contribution to branching metrics;
/// this mirrors the documented source behavior. `contains` relations are
/// stored but excluded from adjacency: they are structural and take part
/// in neither cycle detection nor value propagation.
#[derive(Debug, Clone)]
pub struct CompiledGraph {
    pub metadata: Metadata,
    pub execution: ExecutionConfig,
    pub(crate) nodes: Vec<Node>,
    pub(crate) relations: Vec<Relation>,
    pub(crate) node_index: AHashMap<String, usize>,
    pub(crate) relation_index: AHashMap<String, usize>,
    pub(crate) forward: Vec<Vec<Edge>>,
    pub(crate) reverse: Vec<Vec<Edge>>,
    pub entry_points: Vec<String>,
    pub exit_points: Vec<String>,
    pub compilation: CompilationInfo,
    pub extensions: Extensions,
}

impl CompiledGraph {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn complexity(&self) -> &Complexity {
        &self.compilation.complexity
    }

    pub fn node_idx(&self, id: &str) -> Option<usize> {
        self.node_index.get(id).copied()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.node_idx(id).map(|i| &self.nodes[i])
    }

    pub fn node_at(&self, idx: usize) -> &Node {
        &self.nodes[idx]
    }

    pub fn relation(&self, id: &str) -> Option<&Relation> {
        self.relation_index.get(id).map(|&i| &self.relations[i])
    }

    pub fn relation_at(&self, idx: usize) -> &Relation {
        &self.relations[idx]
    }

    /// Outgoing edges of the node at `idx` in the propagation graph.
    pub fn successors(&self, idx: usize) -> &[Edge] {
        &self.forward[idx]
    }

    /// Incoming edges of the node at `idx` in the propagation graph.
    pub fn predecessors(&self, idx: usize) -> &[Edge] {
        &self.reverse[idx]
    }

    /// Serializes the graph to JSON with id-keyed maps rendered as
    /// objects, the exchange shape expected by external clients.
    pub fn to_json(&self) -> Value {
        let mut nodes = serde_json::Map::new();
        for node in &self.nodes {
            nodes.insert(node.id.clone(), serde_json::to_value(node).unwrap_or(Value::Null));
        }
        let mut relations = serde_json::Map::new();
        for relation in &self.relations {
            relations.insert(
                relation.id.clone(),
                serde_json::to_value(relation).unwrap_or(Value::Null),
            );
        }
        let mut forward = serde_json::Map::new();
        let mut reverse = serde_json::Map::new();
        for (idx, node) in self.nodes.iter().enumerate() {
            let targets: Vec<&str> = self.forward[idx]
                .iter()
                .map(|e| self.nodes[e.node].id.as_str())
                .collect();
            let sources: Vec<&str> = self.reverse[idx]
                .iter()
                .map(|e| self.nodes[e.node].id.as_str())
                .collect();
            forward.insert(node.id.clone(), json!(targets));
            reverse.insert(node.id.clone(), json!(sources));
        }

        json!({
            "metadata": self.metadata,
            "execution": self.execution,
            "nodes": nodes,
            "relations": relations,
            "forward": forward,
            "reverse": reverse,
            "entry_points": self.entry_points,
            "exit_points": self.exit_points,
            "compilation": self.compilation,
            "extensions": self.extensions,
        })
    }
}
