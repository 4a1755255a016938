//! # Cogniform - Cognitive Model Compilation and Execution Engine
//!
//! **Cogniform** reads declarative cognitive model documents - directed
//! graphs of typed nodes (concepts, conditions, actions, events,
//! formulas, user-extended) connected by typed relations (causal,
//! triggering, blocking, containment, dependency, soft influence) - and
//! turns them into an executable state-propagation engine. Given initial
//! inputs, the engine drives the graph to a fixed point, or reports
//! termination by iteration cap or timeout, emitting a step-by-step
//! trace, per-node final values, and aggregate metrics.
//!
//! ## Core Workflow
//!
//! 1.  **Load**: Parse a `.form` JSON document into a [`model::Document`].
//! 2.  **Validate**: Run the [`validator::Validator`] over it. Schema,
//!     reference, and structural checks produce a result envelope; a
//!     document is valid iff no error-severity issue was found.
//! 3.  **Compile**: Lower the validated document with
//!     [`compiler::Compiler`] into a [`compiler::CompiledGraph`]:
//!     dense arenas, forward/reverse adjacency, inferred entry and exit
//!     points, and complexity metrics.
//! 4.  **Execute**: Hand the graph to the [`engine::Scheduler`] with an
//!     input map. Formula nodes evaluate inside the sandboxed
//!     [`expr::ExprEvaluator`] under time and memory caps.
//!
//! The [`platform::Platform`] facade wires all of this together with a
//! compiled-graph cache and an execution history.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cogniform::prelude::*;
//!
//! fn main() -> Result<()> {
//!     // 1. Load a document from disk.
//!     let document = Document::from_file("model.form")?;
//!
//!     // 2. Validate it.
//!     let validator = Validator::new();
//!     let validation = validator.validate(&document);
//!     if !validation.valid {
//!         for issue in &validation.errors {
//!             eprintln!("error: {}", issue.message);
//!         }
//!         return Ok(());
//!     }
//!
//!     // 3. Compile to an execution-ready graph.
//!     let compiler = Compiler::new();
//!     let graph = compiler.compile(&document)?;
//!
//!     // 4. Execute with inputs.
//!     let scheduler = Scheduler::new();
//!     let mut inputs = InputMap::new();
//!     inputs.insert(
//!         "weather_input".to_string(),
//!         serde_json::json!({ "temperature": 22, "precipitation": 0 }),
//!     );
//!     let result = scheduler.execute(&graph, &inputs, None);
//!
//!     println!(
//!         "fixed point after {} iteration(s), {} trace step(s)",
//!         result.metrics.iterations_completed,
//!         result.trace.len()
//!     );
//!     for (node_id, value) in &result.final_state {
//!         println!("  {} = {}", node_id, value);
//!     }
//!     Ok(())
//! }
//! ```

pub mod compiler;
pub mod engine;
pub mod error;
pub mod expr;
pub mod model;
pub mod platform;
pub mod prelude;
pub mod validator;
