//! Lowering of validated documents to execution-ready graphs.
//!
//! Compilation deep-copies the document, fills node/relation defaults,
//! builds the arena and adjacency structures, infers entry and exit
//! points, and computes complexity metrics. The compiler is pure: equal
//! inputs yield equal outputs, and wherever iteration order could matter
//! it follows the original input order.

mod graph;
mod optimizer;

pub use graph::{CompilationInfo, CompiledGraph, Complexity, Edge};
pub use optimizer::OptimizationMode;

use crate::error::CompileError;
use crate::model::{Document, ExecutionConfig, NodeState, NodeType};
use crate::validator::cycles;
use ahash::AHashMap;
use std::collections::VecDeque;

/// Compiles validated documents. Stateless; one instance serves any
/// number of documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct Compiler;

impl Compiler {
    pub fn new() -> Self {
        Self
    }

    /// Lowers a validated document to a [`CompiledGraph`].
    pub fn compile(&self, document: &Document) -> Result<CompiledGraph, CompileError> {
        if document.nodes.is_empty() {
            return Err(CompileError::EmptyDocument(document.metadata.id.clone()));
        }

        let mut doc = document.clone();

        // Entry inference keys off the state the author declared, not the
        // `active` default applied below, otherwise every node would
        // qualify as an entry point.
        let declared_active: Vec<bool> = doc
            .nodes
            .iter()
            .map(|n| n.data.state == Some(NodeState::Active))
            .collect();

        for node in &mut doc.nodes {
            node.data.confidence.get_or_insert(1.0);
            node.data.weight.get_or_insert(1.0);
            node.data.state.get_or_insert(NodeState::Active);
        }
        for relation in &mut doc.relations {
            relation.strength.get_or_insert(1.0);
            relation.bidirectional.get_or_insert(false);
        }

        let mut node_index = AHashMap::with_capacity(doc.nodes.len());
        for (idx, node) in doc.nodes.iter().enumerate() {
            if node_index.insert(node.id.clone(), idx).is_some() {
                return Err(CompileError::DuplicateNode(node.id.clone()));
            }
        }
        let mut relation_index = AHashMap::with_capacity(doc.relations.len());
        for (idx, relation) in doc.relations.iter().enumerate() {
            if relation_index.insert(relation.id.clone(), idx).is_some() {
                return Err(CompileError::DuplicateRelation(relation.id.clone()));
            }
        }

        let mut forward: Vec<Vec<Edge>> = vec![Vec::new(); doc.nodes.len()];
        let mut reverse: Vec<Vec<Edge>> = vec![Vec::new(); doc.nodes.len()];
        for (idx, relation) in doc.relations.iter().enumerate() {
            if relation.relation_type.is_structural() {
                continue;
            }
            let source = *node_index.get(&relation.source).ok_or_else(|| {
                CompileError::MissingEndpoint {
                    relation_id: relation.id.clone(),
                    node_id: relation.source.clone(),
                }
            })?;
            let target = *node_index.get(&relation.target).ok_or_else(|| {
                CompileError::MissingEndpoint {
                    relation_id: relation.id.clone(),
                    node_id: relation.target.clone(),
                }
            })?;
            forward[source].push(Edge { node: target, relation: idx });
            reverse[target].push(Edge { node: source, relation: idx });
            if relation.bidirectional.unwrap_or(false) {
                forward[target].push(Edge { node: source, relation: idx });
                reverse[source].push(Edge { node: target, relation: idx });
            }
        }

        let execution = doc.execution.clone().unwrap_or_else(ExecutionConfig::default);

        let entry_points = if execution.entry_points.is_empty() {
            infer_entry_points(&doc, &reverse, &declared_active)
        } else {
            execution.entry_points.clone()
        };
        let exit_points = if execution.exit_points.is_empty() {
            infer_exit_points(&doc, &forward)
        } else {
            execution.exit_points.clone()
        };

        let complexity = compute_complexity(&forward, &reverse);
        let compilation = CompilationInfo {
            timestamp: chrono::Utc::now().to_rfc3339(),
            node_count: doc.nodes.len(),
            relation_count: doc.relations.len(),
            complexity,
        };

        log::info!(
            "compiled '{}': {} nodes, {} relations, depth {}, {} cycle(s)",
            doc.metadata.id,
            compilation.node_count,
            compilation.relation_count,
            complexity.max_depth,
            complexity.cycle_count
        );

        Ok(CompiledGraph {
            metadata: doc.metadata,
            execution,
            nodes: doc.nodes,
            relations: doc.relations,
            node_index,
            relation_index,
            forward,
            reverse,
            entry_points,
            exit_points,
            compilation,
            extensions: doc.extensions,
        })
    }

    /// Applies an optimization mode to a compiled graph. Idempotent for
    /// each mode up to the tag timestamp.
    pub fn optimize(&self, graph: CompiledGraph, mode: OptimizationMode) -> CompiledGraph {
        optimizer::optimize(graph, mode)
    }
}

/// Entry points: no incoming edges, or of type `event`, or explicitly
/// declared `active`. Falls back to the first node so the scheduler
/// always has somewhere to start.
fn infer_entry_points(
    doc: &Document,
    reverse: &[Vec<Edge>],
    declared_active: &[bool],
) -> Vec<String> {
    let mut entries: Vec<String> = doc
        .nodes
        .iter()
        .enumerate()
        .filter(|(idx, node)| {
            reverse[*idx].is_empty()
                || node.node_type == NodeType::Event
                || declared_active[*idx]
        })
        .map(|(_, node)| node.id.clone())
        .collect();
    if entries.is_empty() {
        entries.push(doc.nodes[0].id.clone());
    }
    entries
}

/// Exit points: no outgoing edges, or actions with at most one outgoing
/// edge.
fn infer_exit_points(doc: &Document, forward: &[Vec<Edge>]) -> Vec<String> {
    let mut exits: Vec<String> = doc
        .nodes
        .iter()
        .enumerate()
        .filter(|(idx, node)| {
            forward[*idx].is_empty()
                || (node.node_type == NodeType::Action && forward[*idx].len() <= 1)
        })
        .map(|(_, node)| node.id.clone())
        .collect();
    if exits.is_empty() {
        exits.push(doc.nodes[doc.nodes.len() - 1].id.clone());
    }
    exits
}

fn compute_complexity(forward: &[Vec<Edge>], reverse: &[Vec<Edge>]) -> Complexity {
    let plain: Vec<Vec<usize>> = forward
        .iter()
        .map(|edges| edges.iter().map(|e| e.node).collect())
        .collect();

    Complexity {
        max_depth: max_depth(&plain, reverse),
        avg_branching: avg_branching(forward),
        cycle_count: cycles::count_back_edges(plain.len(), &plain),
    }
}

/// Longest BFS chain in edges. Roots are the in-degree-zero nodes;
/// components unreachable from any root (pure cycles) are swept by
/// starting a fresh BFS from their first unvisited node in input order.
fn max_depth(forward: &[Vec<usize>], reverse: &[Vec<Edge>]) -> u32 {
    let n = forward.len();
    let mut visited = vec![false; n];
    let mut deepest = 0u32;

    let mut bfs = |start: usize, visited: &mut Vec<bool>| -> u32 {
        let mut queue = VecDeque::new();
        queue.push_back((start, 0u32));
        visited[start] = true;
        let mut local_max = 0;
        while let Some((node, depth)) = queue.pop_front() {
            local_max = local_max.max(depth);
            for &next in &forward[node] {
                if !visited[next] {
                    visited[next] = true;
                    queue.push_back((next, depth + 1));
                }
            }
        }
        local_max
    };

    for start in 0..n {
        if reverse[start].is_empty() && !visited[start] {
            deepest = deepest.max(bfs(start, &mut visited));
        }
    }
    for start in 0..n {
        if !visited[start] {
            deepest = deepest.max(bfs(start, &mut visited));
        }
    }
    deepest
}

fn avg_branching(forward: &[Vec<Edge>]) -> f64 {
    let branching: Vec<usize> = forward
        .iter()
        .map(|edges| edges.len())
        .filter(|&d| d > 0)
        .collect();
    if branching.is_empty() {
        0.0
    } else {
        branching.iter().sum::<usize>() as f64 / branching.len() as f64
    }
}
