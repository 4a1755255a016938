//! Tests for the scheduler and the per-type node evaluators.

mod common;
use common::*;

use cogniform::compiler::CompiledGraph;
use cogniform::engine::{CustomNodeEvaluator, CustomRegistry, StateView};
use cogniform::model::Node;
use cogniform::prelude::*;
use serde_json::{json, Value};

fn run(doc: &Document, input_pairs: &[(&str, Value)]) -> ExecutionResult {
    Scheduler::new().execute(&compile(doc), &inputs(input_pairs), None)
}

#[cfg(test)]
mod seeding_tests {
    use super::*;

    #[test]
    fn test_type_defaults() {
        let doc = document(
            "defaults",
            vec![
                node("idea", NodeType::Concept),
                node("gate", NodeType::Condition),
                node("act", NodeType::Action),
                node("evt", NodeType::Event),
                node_with_params("calc", NodeType::Formula, json!({ "expression": "1" })),
            ],
            Vec::new(),
        );
        let result = run(&doc, &[]);
        assert_eq!(result.final_state["idea"], json!(0));
        assert_eq!(result.final_state["gate"], json!(false));
        assert_eq!(result.final_state["act"], json!(true)); // fires with no prerequisites
        assert_eq!(result.final_state["evt"], json!(false));
        assert_eq!(result.final_state["calc"], json!(1.0));
    }

    #[test]
    fn test_stored_value_seeds() {
        let doc = document(
            "stored",
            vec![node_with_value("idea", NodeType::Concept, json!(42))],
            Vec::new(),
        );
        let result = run(&doc, &[]);
        assert_eq!(result.final_state["idea"], json!(42));
    }

    #[test]
    fn test_inputs_produce_evaluate_steps() {
        let doc = weather_document();
        let result = run(&doc, &[("weather_input", json!({ "temperature": 22 }))]);
        let seeded: Vec<_> = result
            .trace
            .iter()
            .filter(|s| s.action == TraceAction::Evaluate)
            .collect();
        assert_eq!(seeded.len(), 1);
        assert_eq!(seeded[0].node_id, "weather_input");
        assert_eq!(seeded[0].output, json!({ "temperature": 22 }));
    }

    #[test]
    fn test_single_node_executes_in_one_pass() {
        let doc = document(
            "solo",
            vec![node_with_value("only", NodeType::Concept, json!(7))],
            Vec::new(),
        );
        let result = run(&doc, &[]);
        assert!(result.success);
        assert_eq!(result.metrics.iterations_completed, 1);
        assert_eq!(result.final_state["only"], json!(7));
    }
}

#[cfg(test)]
mod node_eval_tests {
    use super::*;

    #[test]
    fn test_concept_weighted_average() {
        let mut doc = document(
            "avg",
            vec![
                node("left", NodeType::Concept),
                node("right", NodeType::Concept),
                node("mix", NodeType::Concept),
            ],
            vec![
                relation("l", RelationType::Influences, "left", "mix"),
                relation("r", RelationType::Influences, "right", "mix"),
            ],
        );
        doc.relations[0].strength = Some(0.75);
        doc.relations[1].strength = Some(0.25);
        let result = run(&doc, &[("left", json!(1.0)), ("right", json!(3.0))]);
        let mix = result.final_state["mix"].as_f64().expect("number");
        assert!((mix - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_concept_skips_non_numeric() {
        let doc = document(
            "skip",
            vec![
                node("num", NodeType::Concept),
                node("text", NodeType::Concept),
                node("mix", NodeType::Concept),
            ],
            vec![
                relation("n", RelationType::Influences, "num", "mix"),
                relation("t", RelationType::Influences, "text", "mix"),
            ],
        );
        let result = run(&doc, &[("num", json!(4.0)), ("text", json!("words"))]);
        // Only the numeric predecessor participates; its weight carries.
        assert_eq!(result.final_state["mix"].as_f64(), Some(4.0));
    }

    #[test]
    fn test_condition_logic_parameter() {
        let doc = document(
            "logic",
            vec![
                node("a", NodeType::Condition),
                node("b", NodeType::Condition),
                node_with_params("both", NodeType::Condition, json!({ "logic": "a & b" })),
            ],
            Vec::new(),
        );
        let result = run(&doc, &[("a", json!(true)), ("b", json!(true))]);
        assert_eq!(result.final_state["both"], json!(true));

        let result = run(&doc, &[("a", json!(true)), ("b", json!(false))]);
        assert_eq!(result.final_state["both"], json!(false));
    }

    #[test]
    fn test_condition_malformed_logic_is_error() {
        let doc = document(
            "bad-logic",
            vec![node_with_params(
                "broken",
                NodeType::Condition,
                json!({ "logic": "a &" }),
            )],
            Vec::new(),
        );
        let result = run(&doc, &[("a", json!(true))]);
        assert!(!result.success);
        assert!(result
            .errors
            .iter()
            .any(|e| e.kind == RuntimeErrorKind::ConditionError));
        // The node keeps its seeded value.
        assert_eq!(result.final_state["broken"], json!(false));
    }

    #[test]
    fn test_action_operations() {
        let doc = document(
            "ops",
            vec![
                node("x", NodeType::Concept),
                node("y", NodeType::Concept),
                node_with_params(
                    "total",
                    NodeType::Action,
                    json!({ "operation": "sum", "inputs": ["x", "y"] }),
                ),
                node_with_params(
                    "product",
                    NodeType::Action,
                    json!({ "operation": "multiply", "inputs": ["x", "y"] }),
                ),
                node_with_params(
                    "bundle",
                    NodeType::Action,
                    json!({ "operation": "transform", "inputs": ["x", "y"] }),
                ),
            ],
            Vec::new(),
        );
        let result = run(&doc, &[("x", json!(4)), ("y", json!(5))]);
        assert_eq!(result.final_state["total"].as_f64(), Some(9.0));
        assert_eq!(result.final_state["product"].as_f64(), Some(20.0));
        assert_eq!(result.final_state["bundle"], json!([4, 5]));
    }

    #[test]
    fn test_action_gated_by_falsy_prerequisite() {
        let doc = document(
            "gated",
            vec![node("pre", NodeType::Condition), node("act", NodeType::Action)],
            vec![relation("pa", RelationType::Causes, "pre", "act")],
        );
        let result = run(&doc, &[("pre", json!(false))]);
        assert_eq!(result.final_state["act"], json!(false));

        let result = run(&doc, &[("pre", json!(true))]);
        assert_eq!(result.final_state["act"], json!(true));
    }

    #[test]
    fn test_event_state_trigger() {
        let doc = document(
            "watcher",
            vec![
                node("level", NodeType::Concept),
                node_with_params(
                    "alarm",
                    NodeType::Event,
                    json!({ "triggerType": "state", "watch": "level", "triggerValue": 10 }),
                ),
            ],
            Vec::new(),
        );
        let result = run(&doc, &[("level", json!(10))]);
        assert_eq!(result.final_state["alarm"], json!(true));
        // A trigger step is recorded, not a plain execute.
        assert!(result
            .trace
            .iter()
            .any(|s| s.node_id == "alarm" && s.action == TraceAction::Execute));

        let result = run(&doc, &[("level", json!(3))]);
        assert_eq!(result.final_state["alarm"], json!(false));
    }

    #[test]
    fn test_event_time_trigger_fires_first_pass() {
        let doc = document(
            "timer",
            vec![node_with_params(
                "tick",
                NodeType::Event,
                json!({ "triggerType": "time", "interval": 0 }),
            )],
            Vec::new(),
        );
        let result = run(&doc, &[]);
        assert_eq!(result.final_state["tick"], json!(true));
        assert!(result
            .trace
            .iter()
            .any(|s| s.node_id == "tick" && s.action == TraceAction::Trigger));
    }

    #[test]
    fn test_formula_over_predecessors() {
        let result = run(
            &allocation_document(ExecutionMode::Sequential),
            &[
                ("cpu_satisfaction", json!(1)),
                ("memory_satisfaction", json!(1)),
                ("budget_satisfaction", json!(1)),
            ],
        );
        assert!(result.success, "errors: {:?}", result.errors);
        let optimizer = result.final_state["constraint_optimizer"]
            .as_f64()
            .expect("number");
        assert!((optimizer - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_formula_error_leaves_value_unchanged() {
        let doc = document(
            "broken-formula",
            vec![node_with_params(
                "calc",
                NodeType::Formula,
                json!({ "expression": "undefined_variable + 1" }),
            )],
            Vec::new(),
        );
        let result = run(&doc, &[]);
        assert!(!result.success);
        assert!(result
            .errors
            .iter()
            .any(|e| e.kind == RuntimeErrorKind::FormulaError
                && e.node_id.as_deref() == Some("calc")));
        // The execution still terminated normally at a fixed point.
        assert_eq!(result.final_state["calc"], json!(null));
        assert!(result.metrics.iterations_completed >= 1);
    }

    struct Doubler;

    impl CustomNodeEvaluator for Doubler {
        fn evaluate(
            &self,
            node: &Node,
            _graph: &CompiledGraph,
            state: &StateView<'_>,
        ) -> std::result::Result<Value, String> {
            let watched = node
                .data
                .parameters
                .get("watch")
                .and_then(|v| v.as_str())
                .ok_or_else(|| "missing watch parameter".to_string())?;
            let current = state
                .get(watched)
                .and_then(|v| v.as_f64())
                .unwrap_or_default();
            Ok(json!(current * 2.0))
        }
    }

    #[test]
    fn test_custom_evaluator_dispatch() {
        let mut doc = document(
            "customized",
            vec![node("source", NodeType::Concept), node("double", NodeType::Custom)],
            Vec::new(),
        );
        doc.nodes[1].custom_type = Some("doubler".to_string());
        doc.nodes[1].data.parameters = match json!({ "watch": "source" }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };

        let mut registry = CustomRegistry::new();
        registry.register("doubler", Box::new(Doubler));
        let scheduler = Scheduler::with_custom_evaluators(registry);

        let result = scheduler.execute(
            &compile(&doc),
            &inputs(&[("source", json!(21))]),
            None,
        );
        assert!(result.success);
        assert_eq!(result.final_state["double"].as_f64(), Some(42.0));
    }

    #[test]
    fn test_unregistered_custom_keeps_value() {
        let mut doc = document(
            "unregistered",
            vec![node("mystery", NodeType::Custom)],
            Vec::new(),
        );
        doc.nodes[0].custom_type = Some("unknown".to_string());
        doc.nodes[0].data.value = Some(json!("frozen"));
        let result = run(&doc, &[]);
        assert!(result.success);
        assert_eq!(result.final_state["mystery"], json!("frozen"));
    }
}

#[cfg(test)]
mod scheduling_tests {
    use super::*;

    #[test]
    fn test_iteration_cap() {
        let doc = flip_flop_document(5);
        let result = run(&doc, &[]);
        assert!(!result.success);
        assert!(result
            .errors
            .iter()
            .any(|e| e.kind == RuntimeErrorKind::InfiniteLoop));
        assert_eq!(result.metrics.iterations_completed, 5);
        assert!(result.trace.len() >= 5);
    }

    #[test]
    fn test_timeout_returns_partial_results() {
        let mut doc = flip_flop_document(u32::MAX);
        if let Some(execution) = doc.execution.as_mut() {
            execution.timeout_ms = 5;
        }
        let result = run(&doc, &[]);
        assert!(!result.success);
        assert!(result
            .errors
            .iter()
            .any(|e| e.kind == RuntimeErrorKind::ExecutionTimeout));
        // Partial state and trace are still returned.
        assert_eq!(result.final_state.len(), 2);
        assert!(!result.trace.is_empty());
    }

    #[test]
    fn test_sequential_and_parallel_agree_on_dag() {
        let input_pairs = [
            ("cpu_satisfaction", json!(0.6)),
            ("memory_satisfaction", json!(0.6)),
            ("budget_satisfaction", json!(0.6)),
        ];
        let sequential = run(
            &allocation_document(ExecutionMode::Sequential),
            &input_pairs,
        );
        let parallel = run(&allocation_document(ExecutionMode::Parallel), &input_pairs);
        assert!(sequential.success && parallel.success);
        assert_eq!(sequential.final_state, parallel.final_state);
    }

    #[test]
    fn test_parallel_determinism() {
        let input_pairs = [
            ("cpu_satisfaction", json!(1)),
            ("memory_satisfaction", json!(1)),
            ("budget_satisfaction", json!(1)),
        ];
        let doc = allocation_document(ExecutionMode::Parallel);
        let first = run(&doc, &input_pairs);
        let second = run(&doc, &input_pairs);
        assert_eq!(first.final_state, second.final_state);
        assert_eq!(first.trace.len(), second.trace.len());
    }

    #[test]
    fn test_trace_steps_strictly_monotonic() {
        let result = run(
            &allocation_document(ExecutionMode::Sequential),
            &[
                ("cpu_satisfaction", json!(1)),
                ("memory_satisfaction", json!(1)),
                ("budget_satisfaction", json!(1)),
            ],
        );
        for window in result.trace.windows(2) {
            assert!(window[1].step > window[0].step);
        }
    }

    #[test]
    fn test_cyclic_influences_converge_sequentially() {
        let doc = document(
            "settle",
            vec![node("a", NodeType::Concept), node("b", NodeType::Concept)],
            vec![
                relation("ab", RelationType::Influences, "a", "b"),
                relation("ba", RelationType::Influences, "b", "a"),
            ],
        );
        let result = run(&doc, &[("a", json!(4.0)), ("b", json!(2.0))]);
        assert!(result.success, "errors: {:?}", result.errors);
        // The pair pulls to a common value and reaches a fixed point.
        assert_eq!(result.final_state["a"], result.final_state["b"]);
    }

    #[test]
    fn test_adaptive_picks_sequential_for_small_graphs() {
        let doc = document_with_mode(
            "tiny",
            vec![node("only", NodeType::Concept)],
            Vec::new(),
            ExecutionMode::Adaptive,
        );
        let result = run(&doc, &[]);
        assert_eq!(result.metrics.strategy, "sequential");
        assert_eq!(result.metrics.mode, ExecutionMode::Adaptive);
    }

    fn wide_dag(id: &str, with_cycle: bool) -> Document {
        // Two hubs fanning out to ten nodes each keeps the average
        // branching above the sequential threshold.
        let mut nodes = vec![node("h0", NodeType::Concept), node("h1", NodeType::Concept)];
        let mut relations = Vec::new();
        for i in 0..10 {
            nodes.push(node(&format!("a{}", i), NodeType::Concept));
            nodes.push(node(&format!("b{}", i), NodeType::Concept));
            relations.push(relation(
                &format!("ha{}", i),
                RelationType::Influences,
                "h0",
                &format!("a{}", i),
            ));
            relations.push(relation(
                &format!("hb{}", i),
                RelationType::Influences,
                "h1",
                &format!("b{}", i),
            ));
        }
        if with_cycle {
            nodes.push(node("c0", NodeType::Concept));
            nodes.push(node("c1", NodeType::Concept));
            relations.push(relation("c01", RelationType::Influences, "c0", "c1"));
            relations.push(relation("c10", RelationType::Influences, "c1", "c0"));
        }
        document_with_mode(id, nodes, relations, ExecutionMode::Adaptive)
    }

    #[test]
    fn test_adaptive_picks_parallel_for_large_dags() {
        let result = run(&wide_dag("wide", false), &[]);
        assert!(result.success);
        assert_eq!(result.metrics.strategy, "parallel");
    }

    #[test]
    fn test_adaptive_picks_hybrid_for_cyclic_graphs() {
        let result = run(&wide_dag("wide-cyclic", true), &[]);
        assert!(result.success);
        assert_eq!(result.metrics.strategy, "hybrid");
    }

    #[test]
    fn test_deep_dag_overflows_level_cap() {
        let mut doc = chain_document("very-deep", 102);
        if let Some(execution) = doc.execution.as_mut() {
            execution.mode = ExecutionMode::Parallel;
        }
        let result = run(&doc, &[]);
        assert!(!result.success);
        assert!(result
            .errors
            .iter()
            .any(|e| e.kind == RuntimeErrorKind::ExecutionError));
    }

    #[test]
    fn test_config_overrides_applied() {
        let doc = flip_flop_document(1000);
        let overrides = ConfigOverrides {
            max_iterations: Some(3),
            timeout_ms: None,
            mode: None,
        };
        let result = Scheduler::new().execute(&compile(&doc), &InputMap::new(), Some(&overrides));
        assert!(!result.success);
        assert_eq!(result.metrics.iterations_completed, 3);
    }
}
