use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading or parsing a document file.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("failed to read document '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse document JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors that can occur while lowering a validated document to a compiled graph.
///
/// These indicate a document that slipped past validation, which is a bug in
/// the caller's pipeline rather than a user-facing condition.
#[derive(Error, Debug, Clone)]
pub enum CompileError {
    #[error("duplicate node identifier '{0}' in document")]
    DuplicateNode(String),

    #[error("duplicate relation identifier '{0}' in document")]
    DuplicateRelation(String),

    #[error("relation '{relation_id}' references missing node '{node_id}'")]
    MissingEndpoint {
        relation_id: String,
        node_id: String,
    },

    #[error("document '{0}' contains no nodes")]
    EmptyDocument(String),
}

/// Errors produced by the sandboxed expression evaluator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("expression contains forbidden character '{0}'")]
    ForbiddenChar(char),

    #[error("expression contains unsafe token '{0}'")]
    UnsafeToken(String),

    #[error("unbalanced parentheses in expression")]
    UnbalancedParens,

    #[error("unexpected token '{token}' at offset {offset}")]
    UnexpectedToken { token: String, offset: usize },

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("function '{name}' expects {expected} argument(s), got {got}")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("cannot coerce {0} to a number")]
    NotNumeric(String),

    #[error("expression evaluation exceeded the {0} ms time limit")]
    Timeout(u64),

    #[error("expression result exceeded the {0} byte memory limit")]
    MemoryExceeded(usize),
}

/// Errors surfaced by the platform facade.
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("no compiled graph is loaded under id '{0}'")]
    UnknownGraph(String),

    #[error("document '{id}' failed validation with {error_count} error(s)")]
    InvalidDocument { id: String, error_count: usize },

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("failed to write '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize graph: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Classification of errors collected while an execution is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeErrorKind {
    /// Wall-clock budget for the whole run was exhausted.
    ExecutionTimeout,
    /// The iteration cap was reached without a fixed point.
    InfiniteLoop,
    /// A formula evaluation hit its own time limit.
    FormulaTimeout,
    /// A formula result exceeded the memory cap.
    FormulaMemory,
    /// A formula failed to parse or evaluate.
    FormulaError,
    /// A condition node's logic expression was malformed.
    ConditionError,
    /// A registered custom evaluator returned an error.
    ExtensionError,
    /// Any other per-node evaluation failure.
    NodeExecution,
    /// A structural fault in the run itself, e.g. an unlayerable graph.
    ExecutionError,
}

/// One error collected during execution. Non-fatal kinds leave the offending
/// node's value unchanged and the run continues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_id: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            node_id: None,
            relation_id: None,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn for_node(kind: RuntimeErrorKind, node_id: &str, message: impl Into<String>) -> Self {
        Self {
            node_id: Some(node_id.to_string()),
            ..Self::new(kind, message)
        }
    }
}
