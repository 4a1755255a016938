//! Per-type node evaluation.
//!
//! Evaluators receive a read-only snapshot of the state map and return a
//! new value; all writes are applied by the scheduler. An evaluation
//! error leaves the node's value unchanged and is collected on the run.

use crate::compiler::CompiledGraph;
use crate::error::{ExprError, RuntimeError, RuntimeErrorKind};
use crate::expr::{self, logic, ExprEvaluator};
use crate::model::{ActivationCondition, ConditionOperator, Node, NodeType, Relation};
use ahash::AHashMap;
use serde_json::Value;

use super::state::{is_truthy, values_equal};

/// Evaluator for a user-extended node type, looked up by the node's
/// `custom_type` tag. Implementations must be thread-safe: parallel mode
/// may invoke them concurrently for nodes of the same level.
pub trait CustomNodeEvaluator: Send + Sync {
    fn evaluate(
        &self,
        node: &Node,
        graph: &CompiledGraph,
        state: &StateView<'_>,
    ) -> Result<Value, String>;
}

/// Table of custom evaluators handed to the scheduler. There is no
/// global registry.
#[derive(Default)]
pub struct CustomRegistry {
    evaluators: AHashMap<String, Box<dyn CustomNodeEvaluator>>,
}

impl CustomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        custom_type: impl Into<String>,
        evaluator: Box<dyn CustomNodeEvaluator>,
    ) {
        self.evaluators.insert(custom_type.into(), evaluator);
    }

    pub fn is_empty(&self) -> bool {
        self.evaluators.is_empty()
    }

    fn get(&self, custom_type: &str) -> Option<&dyn CustomNodeEvaluator> {
        self.evaluators.get(custom_type).map(|b| b.as_ref())
    }
}

/// Read-only view of the state map, keyed by node id.
pub struct StateView<'a> {
    graph: &'a CompiledGraph,
    values: &'a [Value],
}

impl<'a> StateView<'a> {
    pub(crate) fn new(graph: &'a CompiledGraph, values: &'a [Value]) -> Self {
        Self { graph, values }
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.graph.node_idx(id).map(|idx| &self.values[idx])
    }
}

/// What one evaluation produced. `fired_at` is set when a time-triggered
/// event fired, so the scheduler can update its bookkeeping.
pub(crate) struct NodeEvalOutcome {
    pub value: Value,
    pub fired_at: Option<i64>,
}

impl NodeEvalOutcome {
    fn value(value: Value) -> Self {
        Self {
            value,
            fired_at: None,
        }
    }
}

pub(crate) struct EvalContext<'a> {
    pub graph: &'a CompiledGraph,
    pub values: &'a [Value],
    pub last_fired: &'a [Option<i64>],
    pub expr: &'a ExprEvaluator,
    pub custom: &'a CustomRegistry,
}

/// Evaluates the node at `idx` against the snapshot in `ctx`.
pub(crate) fn evaluate_node(
    ctx: &EvalContext<'_>,
    idx: usize,
) -> Result<NodeEvalOutcome, RuntimeError> {
    let node = ctx.graph.node_at(idx);
    match node.node_type {
        NodeType::Concept => Ok(NodeEvalOutcome::value(eval_concept(ctx, idx, node))),
        NodeType::Condition => eval_condition(ctx, idx, node).map(NodeEvalOutcome::value),
        NodeType::Action => eval_action(ctx, idx, node).map(NodeEvalOutcome::value),
        NodeType::Event => eval_event(ctx, idx, node),
        NodeType::Formula => eval_formula(ctx, idx, node).map(NodeEvalOutcome::value),
        NodeType::Custom => eval_custom(ctx, idx, node).map(NodeEvalOutcome::value),
    }
}

/// Concepts with predecessors take the strength-weighted average of the
/// numeric predecessor values; non-numeric predecessors are skipped.
fn eval_concept(ctx: &EvalContext<'_>, idx: usize, node: &Node) -> Value {
    let current = &ctx.values[idx];
    let predecessors = ctx.graph.predecessors(idx);
    if predecessors.is_empty() {
        return node
            .data
            .value
            .clone()
            .unwrap_or_else(|| current.clone());
    }

    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;
    for edge in predecessors {
        let Some(value) = ctx.values[edge.node].as_f64() else {
            continue;
        };
        let strength = ctx.graph.relation_at(edge.relation).strength.unwrap_or(1.0);
        weighted_sum += value * strength;
        total_weight += strength;
    }
    if total_weight == 0.0 {
        return current.clone();
    }
    number_value(weighted_sum / total_weight)
}

/// Conditions prefer an explicit `parameters.logic` boolean expression;
/// otherwise any predecessor whose relation's activation conditions hold
/// makes the condition true; with no predecessors the stored value's
/// truthiness wins.
fn eval_condition(ctx: &EvalContext<'_>, idx: usize, node: &Node) -> Result<Value, RuntimeError> {
    if let Some(source) = node.data.parameters.get("logic").and_then(|v| v.as_str()) {
        let view = StateView::new(ctx.graph, ctx.values);
        let result = logic::evaluate_logic(source, |id| view.get(id).map(is_truthy));
        return match result {
            Ok(b) => Ok(Value::Bool(b)),
            Err(e) => Err(RuntimeError::for_node(
                RuntimeErrorKind::ConditionError,
                &node.id,
                e.to_string(),
            )),
        };
    }

    let predecessors = ctx.graph.predecessors(idx);
    if predecessors.is_empty() {
        return Ok(Value::Bool(is_truthy(&ctx.values[idx])));
    }
    let satisfied = predecessors.iter().any(|edge| {
        let relation = ctx.graph.relation_at(edge.relation);
        activation_holds(relation, &ctx.values[edge.node])
    });
    Ok(Value::Bool(satisfied))
}

/// Actions gate on prerequisites: every predecessor must be truthy and
/// its relation's activation conditions must hold. A closed gate keeps
/// the current value.
fn eval_action(ctx: &EvalContext<'_>, idx: usize, node: &Node) -> Result<Value, RuntimeError> {
    let open = ctx.graph.predecessors(idx).iter().all(|edge| {
        let relation = ctx.graph.relation_at(edge.relation);
        is_truthy(&ctx.values[edge.node]) && activation_holds(relation, &ctx.values[edge.node])
    });
    if !open {
        return Ok(ctx.values[idx].clone());
    }

    let operation = node.data.parameters.get("operation").and_then(|v| v.as_str());
    let Some(operation) = operation else {
        return Ok(Value::Bool(true));
    };

    let inputs: Vec<&Value> = node
        .data
        .parameters
        .get("inputs")
        .and_then(|v| v.as_array())
        .map(|ids| {
            ids.iter()
                .filter_map(|id| id.as_str())
                .filter_map(|id| ctx.graph.node_idx(id))
                .map(|i| &ctx.values[i])
                .collect()
        })
        .unwrap_or_default();

    match operation {
        "sum" => {
            let total: f64 = inputs
                .iter()
                .filter_map(|v| expr::coerce_number(v).ok())
                .sum();
            Ok(number_value(total))
        }
        "multiply" => {
            let product: f64 = inputs
                .iter()
                .filter_map(|v| expr::coerce_number(v).ok())
                .product();
            Ok(number_value(product))
        }
        "transform" => Ok(Value::Array(inputs.into_iter().cloned().collect())),
        other => Err(RuntimeError::for_node(
            RuntimeErrorKind::NodeExecution,
            &node.id,
            format!("unknown action operation '{}'", other),
        )),
    }
}

/// Events fire on a time interval or when a watched node reaches a
/// trigger value; anything else keeps the current value.
fn eval_event(
    ctx: &EvalContext<'_>,
    idx: usize,
    node: &Node,
) -> Result<NodeEvalOutcome, RuntimeError> {
    let trigger_type = node
        .data
        .parameters
        .get("triggerType")
        .and_then(|v| v.as_str());
    match trigger_type {
        Some("time") => {
            let interval = node
                .data
                .parameters
                .get("interval")
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0) as i64;
            let now = chrono::Utc::now().timestamp_millis();
            let due = match ctx.last_fired[idx] {
                Some(last) => now - last >= interval,
                None => true,
            };
            if due {
                Ok(NodeEvalOutcome {
                    value: Value::Bool(true),
                    fired_at: Some(now),
                })
            } else {
                Ok(NodeEvalOutcome::value(ctx.values[idx].clone()))
            }
        }
        Some("state") => {
            let watched = node
                .data
                .parameters
                .get("watch")
                .and_then(|v| v.as_str())
                .and_then(|id| ctx.graph.node_idx(id));
            let trigger_value = node.data.parameters.get("triggerValue");
            match (watched, trigger_value) {
                (Some(watch_idx), Some(expected))
                    if values_equal(&ctx.values[watch_idx], expected) =>
                {
                    Ok(NodeEvalOutcome::value(Value::Bool(true)))
                }
                _ => Ok(NodeEvalOutcome::value(ctx.values[idx].clone())),
            }
        }
        _ => Ok(NodeEvalOutcome::value(ctx.values[idx].clone())),
    }
}

/// Formulas evaluate `parameters.expression` (or `formula`) in the
/// sandbox, with the node's own value and every predecessor value bound
/// by id.
fn eval_formula(ctx: &EvalContext<'_>, idx: usize, node: &Node) -> Result<Value, RuntimeError> {
    let source = node
        .data
        .parameters
        .get("expression")
        .or_else(|| node.data.parameters.get("formula"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            RuntimeError::for_node(
                RuntimeErrorKind::FormulaError,
                &node.id,
                "formula node has no expression parameter",
            )
        })?;

    let mut variables = AHashMap::new();
    variables.insert(node.id.clone(), ctx.values[idx].clone());
    for edge in ctx.graph.predecessors(idx) {
        let predecessor = ctx.graph.node_at(edge.node);
        variables.insert(predecessor.id.clone(), ctx.values[edge.node].clone());
    }

    let outcome = ctx.expr.evaluate(source, &variables);
    if outcome.success {
        return Ok(outcome.value);
    }

    let error = outcome.error.unwrap_or(ExprError::UnexpectedEnd);
    let kind = match error {
        ExprError::Timeout(_) => RuntimeErrorKind::FormulaTimeout,
        ExprError::MemoryExceeded(_) => RuntimeErrorKind::FormulaMemory,
        _ => RuntimeErrorKind::FormulaError,
    };
    Err(RuntimeError::for_node(kind, &node.id, error.to_string()))
}

/// Custom nodes delegate to the registered evaluator for their
/// `custom_type`; unregistered types keep the current value.
fn eval_custom(ctx: &EvalContext<'_>, idx: usize, node: &Node) -> Result<Value, RuntimeError> {
    let Some(custom_type) = node.custom_type.as_deref() else {
        return Ok(ctx.values[idx].clone());
    };
    let Some(evaluator) = ctx.custom.get(custom_type) else {
        return Ok(ctx.values[idx].clone());
    };
    let view = StateView::new(ctx.graph, ctx.values);
    evaluator
        .evaluate(node, ctx.graph, &view)
        .map_err(|message| {
            RuntimeError::for_node(RuntimeErrorKind::ExtensionError, &node.id, message)
        })
}

/// Every `{field, operator, value}` triple on the relation must hold
/// against the source node's current value. A relation with no
/// conditions is always active.
pub(crate) fn activation_holds(relation: &Relation, source_value: &Value) -> bool {
    relation
        .conditions
        .iter()
        .all(|condition| condition_holds(condition, source_value))
}

fn condition_holds(condition: &ActivationCondition, source_value: &Value) -> bool {
    let Some(actual) = resolve_field(source_value, &condition.field) else {
        return false;
    };
    match condition.operator {
        ConditionOperator::Eq => values_equal(actual, &condition.value),
        ConditionOperator::Neq => !values_equal(actual, &condition.value),
        ConditionOperator::Gt => numeric_cmp(actual, &condition.value, |a, b| a > b),
        ConditionOperator::Lt => numeric_cmp(actual, &condition.value, |a, b| a < b),
        ConditionOperator::Gte => numeric_cmp(actual, &condition.value, |a, b| a >= b),
        ConditionOperator::Lte => numeric_cmp(actual, &condition.value, |a, b| a <= b),
        ConditionOperator::Contains => match (actual, &condition.value) {
            (Value::String(haystack), Value::String(needle)) => haystack.contains(needle.as_str()),
            (Value::Array(items), needle) => items.iter().any(|item| values_equal(item, needle)),
            _ => false,
        },
    }
}

/// Resolves a condition's field path against a node's current value.
/// `data.value` and plain `value` address the value itself; deeper paths
/// navigate into object fields.
fn resolve_field<'a>(value: &'a Value, field: &str) -> Option<&'a Value> {
    let mut path = field.strip_prefix("data.").unwrap_or(field);
    if path == "value" || path.is_empty() {
        return Some(value);
    }
    if let Some(rest) = path.strip_prefix("value.") {
        path = rest;
    }
    let mut current = value;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

fn numeric_cmp(actual: &Value, expected: &Value, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (expr::coerce_number(actual), expr::coerce_number(expected)) {
        (Ok(a), Ok(b)) => cmp(a, b),
        _ => false,
    }
}

fn number_value(n: f64) -> Value {
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
