use crate::compiler::CompiledGraph;
use crate::error::RuntimeError;
use crate::model::{ExecutionMode, NodeState};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Instant;

/// What a trace step records about a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceAction {
    Evaluate,
    Execute,
    Trigger,
    Complete,
}

/// One record in the ordered execution log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceStep {
    pub step: u64,
    pub node_id: String,
    pub action: TraceAction,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub input: Value,
    pub output: Value,
    pub duration_ms: u64,
}

/// Aggregate counters for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionMetrics {
    pub iterations_completed: u32,
    pub nodes_evaluated: u64,
    pub elapsed_ms: u64,
    /// The configured mode.
    pub mode: ExecutionMode,
    /// The discipline actually driven, after any adaptive choice.
    pub strategy: String,
}

/// Immutable snapshot of a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub document_id: String,
    pub success: bool,
    /// Final value per node id; serialized as an object keyed by id.
    pub final_state: BTreeMap<String, Value>,
    pub trace: Vec<TraceStep>,
    pub metrics: ExecutionMetrics,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<RuntimeError>,
    /// Milliseconds since the Unix epoch at run start.
    pub started_at: i64,
}

impl ExecutionResult {
    /// The key this result is stored under in execution history.
    pub fn history_key(&self) -> String {
        format!("{}_{}", self.document_id, self.started_at)
    }
}

/// Mutable bookkeeping for a run in flight. Owned exclusively by the
/// scheduler; node evaluators only ever see the `values` slice.
pub(crate) struct RunState {
    pub values: Vec<Value>,
    pub node_states: Vec<NodeState>,
    pub last_fired: Vec<Option<i64>>,
    pub trace: Vec<TraceStep>,
    pub errors: Vec<RuntimeError>,
    pub iteration: u32,
    pub nodes_evaluated: u64,
    next_step: u64,
    pub started: Instant,
    pub started_at: i64,
}

impl RunState {
    pub fn new(graph: &CompiledGraph) -> Self {
        let n = graph.node_count();
        Self {
            values: vec![Value::Null; n],
            node_states: graph
                .nodes()
                .iter()
                .map(|node| node.data.state.unwrap_or(NodeState::Active))
                .collect(),
            last_fired: vec![None; n],
            trace: Vec::new(),
            errors: Vec::new(),
            iteration: 0,
            nodes_evaluated: 0,
            next_step: 1,
            started: Instant::now(),
            started_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Appends a trace step with the next strictly monotonic step number.
    pub fn record(
        &mut self,
        node_id: &str,
        action: TraceAction,
        input: Value,
        output: Value,
        duration_ms: u64,
    ) {
        let step = self.next_step;
        self.next_step += 1;
        self.trace.push(TraceStep {
            step,
            node_id: node_id.to_string(),
            action,
            timestamp: chrono::Utc::now().timestamp_millis(),
            input,
            output,
            duration_ms,
        });
    }
}

/// Change detection: primitive equality for primitives, canonical JSON
/// text comparison for composites. Numbers compare by value, so `1` and
/// `1.0` are equal.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => {
            x.as_f64().zip(y.as_f64()).is_some_and(|(x, y)| x == y)
        }
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Array(_) | Value::Object(_), Value::Array(_) | Value::Object(_)) => {
            a.to_string() == b.to_string()
        }
        _ => false,
    }
}

/// JS-style truthiness used for action gating and condition fallbacks.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
