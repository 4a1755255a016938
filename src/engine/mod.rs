//! The scheduler: drives node evaluation to a fixed point.
//!
//! A run repeats passes over the graph until a full pass produces no
//! value change, the iteration cap is hit, or the wall-clock budget runs
//! out. Three disciplines are available: sequential (dependency-first
//! order on a single thread), parallel (dependency levels evaluated with
//! rayon against a pre-level snapshot, writes applied after the level
//! completes), and hybrid (strongly-connected components iterated to an
//! internal fixed point). Adaptive mode picks one per graph.

mod levels;
mod nodes;
mod state;

pub use nodes::{CustomNodeEvaluator, CustomRegistry, StateView};
pub use state::{
    is_truthy, values_equal, ExecutionMetrics, ExecutionResult, TraceAction, TraceStep,
};

use crate::compiler::CompiledGraph;
use crate::error::{RuntimeError, RuntimeErrorKind};
use crate::expr::{ExprEvaluator, ExprLimits};
use crate::model::{ConfigOverrides, ExecutionConfig, ExecutionMode, NodeState};
use nodes::{evaluate_node, EvalContext, NodeEvalOutcome};
use rayon::prelude::*;
use serde_json::Value;
use state::RunState;
use std::collections::BTreeMap;
use std::time::Instant;

/// Inputs seeded into a run, keyed by node id.
pub type InputMap = serde_json::Map<String, Value>;

/// Rounds a cyclic component is iterated per pass in hybrid mode.
const MAX_COMPONENT_ROUNDS: usize = 10;

/// The discipline actually driven, after any adaptive choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Discipline {
    Sequential,
    Parallel,
    Hybrid,
}

impl Discipline {
    fn as_str(self) -> &'static str {
        match self {
            Discipline::Sequential => "sequential",
            Discipline::Parallel => "parallel",
            Discipline::Hybrid => "hybrid",
        }
    }
}

enum Plan {
    Sequential(Vec<usize>),
    Parallel(Vec<Vec<usize>>),
    Hybrid(Vec<Vec<usize>>),
}

/// Drives executions over compiled graphs. Holds the sandbox evaluator
/// and the custom-evaluator table; the graph and the state map stay
/// outside so one scheduler serves any number of runs.
pub struct Scheduler {
    expr: ExprEvaluator,
    custom: CustomRegistry,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            expr: ExprEvaluator::new(),
            custom: CustomRegistry::new(),
        }
    }

    pub fn with_custom_evaluators(custom: CustomRegistry) -> Self {
        Self {
            expr: ExprEvaluator::new(),
            custom,
        }
    }

    pub fn with_expr_limits(mut self, limits: ExprLimits) -> Self {
        self.expr = ExprEvaluator::with_limits(limits);
        self
    }

    /// Runs a graph to a fixed point from the given inputs. Never fails
    /// outright: fatal conditions are reported through `success = false`
    /// with the partial state and trace collected so far.
    pub fn execute(
        &self,
        graph: &CompiledGraph,
        inputs: &InputMap,
        overrides: Option<&ConfigOverrides>,
    ) -> ExecutionResult {
        let config = overrides
            .map(|o| o.apply(&graph.execution))
            .unwrap_or_else(|| graph.execution.clone());

        let mut run = RunState::new(graph);
        self.seed(graph, inputs, &mut run);

        let discipline = match config.mode {
            ExecutionMode::Sequential => Discipline::Sequential,
            ExecutionMode::Parallel => Discipline::Parallel,
            ExecutionMode::Adaptive => choose_discipline(graph),
        };
        log::debug!(
            "executing '{}' with {} discipline",
            graph.metadata.id,
            discipline.as_str()
        );

        let plan = match discipline {
            Discipline::Sequential => Plan::Sequential(sequential_order(graph)),
            Discipline::Parallel => match levels::compute_levels(graph) {
                Ok(levels) => Plan::Parallel(levels),
                Err(e) => {
                    run.errors.push(e);
                    return finish(graph, run, &config, discipline);
                }
            },
            Discipline::Hybrid => Plan::Hybrid(levels::strongly_connected_components(graph)),
        };

        loop {
            if run.iteration >= config.max_iterations {
                run.errors.push(RuntimeError::new(
                    RuntimeErrorKind::InfiniteLoop,
                    format!("no fixed point after {} iterations", config.max_iterations),
                ));
                break;
            }
            if run.elapsed_ms() > config.timeout_ms {
                run.errors.push(RuntimeError::new(
                    RuntimeErrorKind::ExecutionTimeout,
                    format!("execution exceeded its {} ms budget", config.timeout_ms),
                ));
                break;
            }

            let pass = match &plan {
                Plan::Sequential(order) => Some(self.sequential_pass(graph, order, &mut run)),
                Plan::Parallel(levels) => self.parallel_pass(graph, levels, &config, &mut run),
                Plan::Hybrid(components) => Some(self.hybrid_pass(graph, components, &mut run)),
            };
            // A mid-pass fatal (level-boundary timeout) is already recorded.
            let Some(changed) = pass else { break };

            run.iteration += 1;
            if !changed {
                break;
            }
        }

        finish(graph, run, &config, discipline)
    }

    /// Seeds the state map: supplied inputs first (each with an
    /// `evaluate` trace step), then stored node values, then per-type
    /// defaults.
    fn seed(&self, graph: &CompiledGraph, inputs: &InputMap, run: &mut RunState) {
        for (idx, node) in graph.nodes().iter().enumerate() {
            if let Some(value) = inputs.get(&node.id) {
                run.values[idx] = value.clone();
                let output = value.clone();
                run.record(&node.id, TraceAction::Evaluate, Value::Null, output, 0);
            } else if let Some(value) = &node.data.value {
                run.values[idx] = value.clone();
            } else {
                run.values[idx] = node.node_type.default_value();
            }
        }
    }

    fn sequential_pass(&self, graph: &CompiledGraph, order: &[usize], run: &mut RunState) -> bool {
        let mut changed = false;
        for &idx in order {
            changed |= self.step_node(graph, idx, run);
        }
        changed
    }

    /// One pass over the dependency levels. Within a level every node
    /// sees the same pre-level snapshot; writes are deferred until the
    /// whole level has been evaluated. Returns `None` on a level-boundary
    /// timeout.
    fn parallel_pass(
        &self,
        graph: &CompiledGraph,
        levels: &[Vec<usize>],
        config: &ExecutionConfig,
        run: &mut RunState,
    ) -> Option<bool> {
        let mut changed = false;
        for level in levels {
            if run.elapsed_ms() > config.timeout_ms {
                run.errors.push(RuntimeError::new(
                    RuntimeErrorKind::ExecutionTimeout,
                    format!("execution exceeded its {} ms budget", config.timeout_ms),
                ));
                return None;
            }

            let results: Vec<(usize, u64, Result<NodeEvalOutcome, RuntimeError>)> = {
                let ctx = EvalContext {
                    graph,
                    values: &run.values,
                    last_fired: &run.last_fired,
                    expr: &self.expr,
                    custom: &self.custom,
                };
                level
                    .par_iter()
                    .map(|&idx| {
                        let started = Instant::now();
                        let result = evaluate_node(&ctx, idx);
                        (idx, started.elapsed().as_millis() as u64, result)
                    })
                    .collect()
            };

            run.nodes_evaluated += level.len() as u64;
            for (idx, duration, result) in results {
                changed |= apply_outcome(graph, idx, duration, result, run);
            }
        }
        Some(changed)
    }

    /// One pass over the condensation: singleton components evaluate
    /// once, cyclic components iterate to an internal fixed point.
    fn hybrid_pass(
        &self,
        graph: &CompiledGraph,
        components: &[Vec<usize>],
        run: &mut RunState,
    ) -> bool {
        let mut changed = false;
        for component in components {
            if component.len() == 1 {
                changed |= self.step_node(graph, component[0], run);
                continue;
            }
            for _ in 0..MAX_COMPONENT_ROUNDS {
                let mut inner = false;
                for &idx in component {
                    inner |= self.step_node(graph, idx, run);
                }
                changed |= inner;
                if !inner {
                    break;
                }
            }
        }
        changed
    }

    fn step_node(&self, graph: &CompiledGraph, idx: usize, run: &mut RunState) -> bool {
        let started = Instant::now();
        let result = {
            let ctx = EvalContext {
                graph,
                values: &run.values,
                last_fired: &run.last_fired,
                expr: &self.expr,
                custom: &self.custom,
            };
            evaluate_node(&ctx, idx)
        };
        run.nodes_evaluated += 1;
        apply_outcome(graph, idx, started.elapsed().as_millis() as u64, result, run)
    }
}

/// Applies one evaluation result to the run: stores the value if it
/// changed, records the trace step, marks the node completed. Errors are
/// collected and leave the value untouched so independent nodes can
/// still make progress.
fn apply_outcome(
    graph: &CompiledGraph,
    idx: usize,
    duration_ms: u64,
    result: Result<NodeEvalOutcome, RuntimeError>,
    run: &mut RunState,
) -> bool {
    let node_id = &graph.node_at(idx).id;
    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            log::warn!("node '{}' failed to evaluate: {}", node_id, e.message);
            run.errors.push(e);
            run.node_states[idx] = NodeState::Failed;
            return false;
        }
    };

    let fired = outcome.fired_at.is_some();
    if let Some(at) = outcome.fired_at {
        run.last_fired[idx] = Some(at);
    }

    let previous = run.values[idx].clone();
    if values_equal(&previous, &outcome.value) {
        return false;
    }
    run.values[idx] = outcome.value.clone();
    let action = if fired {
        TraceAction::Trigger
    } else {
        TraceAction::Execute
    };
    let node_id = node_id.clone();
    run.record(&node_id, action, previous, outcome.value, duration_ms);
    run.node_states[idx] = NodeState::Completed;
    true
}

/// Adaptive heuristic: small or narrow graphs run sequentially, large
/// acyclic graphs run in parallel, everything else takes the
/// cycle-aware hybrid path.
fn choose_discipline(graph: &CompiledGraph) -> Discipline {
    let complexity = graph.complexity();
    let node_count = graph.node_count();
    if node_count < 10 || complexity.avg_branching < 2.0 {
        Discipline::Sequential
    } else if complexity.cycle_count == 0 && node_count > 20 {
        Discipline::Parallel
    } else {
        Discipline::Hybrid
    }
}

/// Processing order for sequential passes: DFS post-order over the
/// reverse adjacency, so dependencies come first. Ties follow input
/// order.
fn sequential_order(graph: &CompiledGraph) -> Vec<usize> {
    fn visit(idx: usize, graph: &CompiledGraph, visited: &mut [bool], order: &mut Vec<usize>) {
        if visited[idx] {
            return;
        }
        visited[idx] = true;
        for edge in graph.predecessors(idx) {
            visit(edge.node, graph, visited, order);
        }
        order.push(idx);
    }

    let n = graph.node_count();
    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);
    for idx in 0..n {
        visit(idx, graph, &mut visited, &mut order);
    }
    order
}

fn finish(
    graph: &CompiledGraph,
    run: RunState,
    config: &ExecutionConfig,
    discipline: Discipline,
) -> ExecutionResult {
    let elapsed_ms = run.elapsed_ms();
    let final_state: BTreeMap<String, Value> = graph
        .nodes()
        .iter()
        .enumerate()
        .map(|(idx, node)| (node.id.clone(), run.values[idx].clone()))
        .collect();

    let success = run.errors.is_empty();
    if !success {
        log::info!(
            "execution of '{}' finished with {} error(s) after {} iteration(s)",
            graph.metadata.id,
            run.errors.len(),
            run.iteration
        );
    }

    ExecutionResult {
        document_id: graph.metadata.id.clone(),
        success,
        final_state,
        trace: run.trace,
        metrics: ExecutionMetrics {
            iterations_completed: run.iteration,
            nodes_evaluated: run.nodes_evaluated,
            elapsed_ms,
            mode: config.mode,
            strategy: discipline.as_str().to_string(),
        },
        errors: run.errors,
        started_at: run.started_at,
    }
}
