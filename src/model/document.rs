use crate::error::DocumentError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Open-ended extension mapping carried at every layer of the document.
/// The core preserves these round-trip and never interprets them.
pub type Extensions = serde_json::Map<String, Value>;

fn extensions_empty(ext: &Extensions) -> bool {
    ext.is_empty()
}

/// A serialized cognitive model: a typed graph plus metadata and an
/// optional execution configuration. Conventional file extension: `.form`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub metadata: Metadata,
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub relations: Vec<Relation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionConfig>,
    #[serde(default, skip_serializing_if = "extensions_empty")]
    pub extensions: Extensions,
}

impl Document {
    /// Parses a document from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a document from a `.form` file on disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| DocumentError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Creates an empty template document with defaults filled in and
    /// creation/update timestamps set to now.
    pub fn template(id: &str, name: &str, author: Option<&str>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            metadata: Metadata {
                id: id.to_string(),
                name: name.to_string(),
                description: None,
                version: "1.0.0".to_string(),
                created_at: now.clone(),
                updated_at: now,
                author: author.map(str::to_string),
                tags: Vec::new(),
                dependencies: Vec::new(),
                extensions: Extensions::new(),
            },
            nodes: Vec::new(),
            relations: Vec::new(),
            execution: Some(ExecutionConfig::default()),
            extensions: Extensions::new(),
        }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn relation(&self, id: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.id == id)
    }
}

/// Document-level metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Semantic version, `MAJOR.MINOR.PATCH`.
    pub version: String,
    /// ISO-8601 creation timestamp.
    pub created_at: String,
    /// ISO-8601 last-update timestamp.
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<DocumentDependency>,
    #[serde(default, skip_serializing_if = "extensions_empty")]
    pub extensions: Extensions,
}

/// A cross-document dependency, pinned to a version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentDependency {
    pub id: String,
    pub version: String,
}

/// The closed set of node types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Concept,
    Condition,
    Action,
    Event,
    Formula,
    Custom,
}

impl NodeType {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Concept => "concept",
            NodeType::Condition => "condition",
            NodeType::Action => "action",
            NodeType::Event => "event",
            NodeType::Formula => "formula",
            NodeType::Custom => "custom",
        }
    }

    /// The value a node of this type is seeded with when it carries no
    /// stored value and no input is supplied.
    pub fn default_value(self) -> Value {
        match self {
            NodeType::Concept => Value::from(0),
            NodeType::Condition | NodeType::Action | NodeType::Event => Value::Bool(false),
            NodeType::Formula | NodeType::Custom => Value::Null,
        }
    }
}

/// Lifecycle state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Active,
    Inactive,
    Pending,
    Completed,
    Failed,
}

/// A typed vertex in the model graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub data: NodeData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Required when `type = custom`; indexes the custom evaluator table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_type: Option<String>,
    #[serde(default, skip_serializing_if = "extensions_empty")]
    pub extensions: Extensions,
}

/// The value-bearing payload of a node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Confidence in [0, 1].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "extensions_empty")]
    pub parameters: Extensions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<NodeState>,
}

/// Layout hint for visual front-ends; the core carries it untouched.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// The closed set of relation types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    Causes,
    Triggers,
    Blocks,
    Contains,
    DependsOn,
    Influences,
    Custom,
}

impl RelationType {
    pub fn as_str(self) -> &'static str {
        match self {
            RelationType::Causes => "causes",
            RelationType::Triggers => "triggers",
            RelationType::Blocks => "blocks",
            RelationType::Contains => "contains",
            RelationType::DependsOn => "depends_on",
            RelationType::Influences => "influences",
            RelationType::Custom => "custom",
        }
    }

    /// Relation types whose subgraph must stay acyclic.
    pub fn is_causal(self) -> bool {
        matches!(
            self,
            RelationType::Causes | RelationType::Triggers | RelationType::DependsOn
        )
    }

    /// `contains` is structural: it participates in neither cycle
    /// detection nor value propagation.
    pub fn is_structural(self) -> bool {
        matches!(self, RelationType::Contains)
    }
}

/// A typed, directed edge, optionally bidirectional, optionally guarded
/// by activation conditions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub id: String,
    #[serde(rename = "type")]
    pub relation_type: RelationType,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Strength in [0, 1].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strength: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bidirectional: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<ActivationCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_type: Option<String>,
    #[serde(default, skip_serializing_if = "extensions_empty")]
    pub extensions: Extensions,
}

/// A `{field, operator, value}` predicate that must hold on the source
/// node's current value for the relation to be active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationCondition {
    pub field: String,
    pub operator: ConditionOperator,
    pub value: Value,
}

/// The allowed activation-condition operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Eq,
    Neq,
    Gt,
    Lt,
    Gte,
    Lte,
    Contains,
}

/// Execution scheduling discipline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Sequential,
    Parallel,
    #[default]
    Adaptive,
}

pub const DEFAULT_MAX_ITERATIONS: u32 = 1000;
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

fn default_max_iterations() -> u32 {
    DEFAULT_MAX_ITERATIONS
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// Per-document execution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entry_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exit_points: Vec<String>,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub mode: ExecutionMode,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            entry_points: Vec::new(),
            exit_points: Vec::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            mode: ExecutionMode::Adaptive,
        }
    }
}

/// Partial execution config merged over a compiled graph's stored config
/// at execution time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ExecutionMode>,
}

impl ConfigOverrides {
    pub fn apply(&self, base: &ExecutionConfig) -> ExecutionConfig {
        ExecutionConfig {
            entry_points: base.entry_points.clone(),
            exit_points: base.exit_points.clone(),
            max_iterations: self.max_iterations.unwrap_or(base.max_iterations),
            timeout_ms: self.timeout_ms.unwrap_or(base.timeout_ms),
            mode: self.mode.unwrap_or(base.mode),
        }
    }
}

/// Checks the `[A-Za-z0-9_-]+` identifier pattern used for document,
/// node, and relation ids.
pub fn is_valid_identifier(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Checks the `MAJOR.MINOR.PATCH` version shape.
pub fn is_valid_version(version: &str) -> bool {
    let parts: Vec<&str> = version.split('.').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}
