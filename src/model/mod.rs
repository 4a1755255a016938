//! The document data model: cognitive model graphs as they appear on disk.

mod document;

pub use document::{
    ActivationCondition, ConditionOperator, ConfigOverrides, Document, DocumentDependency,
    ExecutionConfig, Extensions, Metadata, Node, NodeData, NodeState, NodeType, Position,
    Relation, RelationType,
};
pub use document::{is_valid_identifier, is_valid_version, ExecutionMode};
