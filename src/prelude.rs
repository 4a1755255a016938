//! Prelude module for convenient imports
//!
//! Re-exports the most commonly used types from the cogniform crate.
//! Import this module to get access to the core pipeline without having
//! to name each module individually.
//!
//! # Example
//!
//! ```rust,no_run
//! use cogniform::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let document = Document::from_file("model.form")?;
//! let validation = Validator::new().validate(&document);
//! assert!(validation.valid);
//!
//! let graph = Compiler::new().compile(&document)?;
//! let result = Scheduler::new().execute(&graph, &InputMap::new(), None);
//! println!("success: {}", result.success);
//! # Ok(())
//! # }
//! ```

// Document model
pub use crate::model::{
    ActivationCondition, ConditionOperator, ConfigOverrides, Document, ExecutionConfig,
    ExecutionMode, Metadata, Node, NodeData, NodeState, NodeType, Relation, RelationType,
};

// Validation
pub use crate::validator::{
    IssueKind, Severity, ValidationIssue, ValidationResult, ValidationSummary, Validator,
};

// Compilation
pub use crate::compiler::{CompiledGraph, Compiler, Complexity, OptimizationMode};

// Execution
pub use crate::engine::{
    CustomNodeEvaluator, CustomRegistry, ExecutionMetrics, ExecutionResult, InputMap, Scheduler,
    StateView, TraceAction, TraceStep,
};

// Expression sandbox
pub use crate::expr::{ExprEvaluator, ExprLimits, ExprOutcome};

// Platform facade
pub use crate::platform::{AnalysisResult, ComplexityBucket, ExportFormat, Platform};

// Error types
pub use crate::error::{
    CompileError, DocumentError, ExprError, PlatformError, RuntimeError, RuntimeErrorKind,
};

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
