use super::graph::CompiledGraph;
use crate::model::{NodeState, NodeType};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Post-compilation optimization modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationMode {
    /// Sort each adjacency list by descending relation strength so the
    /// strongest edges are visited first.
    Speed,
    /// Strip fields that still hold their defaults.
    Memory,
    /// Speed sort plus a conservative strip of default confidence on
    /// nodes whose evaluation never reads it.
    Balanced,
}

impl OptimizationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            OptimizationMode::Speed => "speed",
            OptimizationMode::Memory => "memory",
            OptimizationMode::Balanced => "balanced",
        }
    }
}

pub(super) fn optimize(mut graph: CompiledGraph, mode: OptimizationMode) -> CompiledGraph {
    match mode {
        OptimizationMode::Speed => sort_by_strength(&mut graph),
        OptimizationMode::Memory => strip_defaults(&mut graph),
        OptimizationMode::Balanced => {
            sort_by_strength(&mut graph);
            for node in &mut graph.nodes {
                let keeps_confidence =
                    matches!(node.node_type, NodeType::Condition | NodeType::Formula);
                if !keeps_confidence && node.data.confidence == Some(1.0) {
                    node.data.confidence = None;
                }
            }
        }
    }

    graph.extensions.insert(
        "optimization".to_string(),
        json!({
            "type": mode.as_str(),
            "applied": true,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }),
    );
    graph
}

fn sort_by_strength(graph: &mut CompiledGraph) {
    let strengths: Vec<f64> = graph
        .relations
        .iter()
        .map(|r| r.strength.unwrap_or(1.0))
        .collect();
    for edges in &mut graph.forward {
        // Stable sort keeps input order among equal strengths.
        edges.sort_by(|a, b| {
            strengths[b.relation]
                .partial_cmp(&strengths[a.relation])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }
}

fn strip_defaults(graph: &mut CompiledGraph) {
    for node in &mut graph.nodes {
        if node.data.confidence == Some(1.0) {
            node.data.confidence = None;
        }
        if node.data.weight == Some(1.0) {
            node.data.weight = None;
        }
        if node.data.state == Some(NodeState::Active) {
            node.data.state = None;
        }
    }
    for relation in &mut graph.relations {
        if relation.strength == Some(1.0) {
            relation.strength = None;
        }
        if relation.bidirectional == Some(false) {
            relation.bidirectional = None;
        }
    }
}
