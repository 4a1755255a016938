//! Schema, reference, and structural consistency checking over raw
//! documents.
//!
//! Validation runs in four phases: structural/schema checks, reference
//! resolution, structural consistency (cycles, formula safety), and
//! non-fatal warnings. Schema failures return early with a basic summary;
//! a document is valid iff no error-severity issue was recorded.

pub(crate) mod cycles;

use crate::expr;
use crate::model::{
    is_valid_identifier, is_valid_version, Document, NodeType, RelationType,
};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Where in the pipeline an issue was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Schema,
    Reference,
    Cycle,
    Logic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// One validation finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_id: Option<String>,
}

impl ValidationIssue {
    fn error(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Error,
            message: message.into(),
            path: None,
            node_id: None,
            relation_id: None,
        }
    }

    fn warning(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(kind, message)
        }
    }

    fn at_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    fn for_node(mut self, node_id: &str) -> Self {
        self.node_id = Some(node_id.to_string());
        self
    }

    fn for_relation(mut self, relation_id: &str) -> Self {
        self.relation_id = Some(relation_id.to_string());
        self
    }
}

/// Basic counts reported with every validation, successful or not.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub node_count: usize,
    pub relation_count: usize,
    pub entry_points: usize,
    pub exit_points: usize,
}

/// The outcome of validating one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub summary: ValidationSummary,
}

impl ValidationResult {
    fn from_issues(issues: Vec<ValidationIssue>, summary: ValidationSummary) -> Self {
        let (errors, warnings): (Vec<_>, Vec<_>) = issues
            .into_iter()
            .partition(|i| i.severity == Severity::Error);
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
            summary,
        }
    }
}

/// Validates documents before they reach the compiler.
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator;

/// Any simple directed path longer than this many nodes draws a warning.
const LONG_PATH_THRESHOLD: usize = 10;
/// Node confidence below this draws a warning.
const LOW_CONFIDENCE_THRESHOLD: f64 = 0.3;

impl Validator {
    pub fn new() -> Self {
        Self
    }

    /// Runs all phases over an already-parsed document.
    pub fn validate(&self, document: &Document) -> ValidationResult {
        let summary = summarize(document);
        let mut issues = Vec::new();

        self.check_schema(document, &mut issues);
        if issues.iter().any(|i| i.severity == Severity::Error) {
            return ValidationResult::from_issues(issues, summary);
        }

        self.check_references(document, &mut issues);
        self.check_structure(document, &mut issues);
        self.collect_warnings(document, &mut issues);

        ValidationResult::from_issues(issues, summary)
    }

    /// Loads and validates a file; IO and parse failures become `schema`
    /// errors so callers always receive a result envelope.
    pub fn validate_file(&self, path: impl AsRef<Path>) -> ValidationResult {
        match Document::from_file(path.as_ref()) {
            Ok(document) => self.validate(&document),
            Err(e) => ValidationResult {
                valid: false,
                errors: vec![ValidationIssue::error(IssueKind::Schema, e.to_string())
                    .at_path(path.as_ref().display().to_string())],
                warnings: Vec::new(),
                summary: ValidationSummary::default(),
            },
        }
    }

    // Phase 1: required fields, identifier patterns, numeric bounds,
    // timestamp and version shapes.
    fn check_schema(&self, document: &Document, issues: &mut Vec<ValidationIssue>) {
        let meta = &document.metadata;
        if !is_valid_identifier(&meta.id) {
            issues.push(
                ValidationIssue::error(
                    IssueKind::Schema,
                    format!("metadata id '{}' does not match [A-Za-z0-9_-]+", meta.id),
                )
                .at_path("metadata.id"),
            );
        }
        if meta.name.trim().is_empty() {
            issues.push(
                ValidationIssue::error(IssueKind::Schema, "metadata name must not be empty")
                    .at_path("metadata.name"),
            );
        }
        if !is_valid_version(&meta.version) {
            issues.push(
                ValidationIssue::error(
                    IssueKind::Schema,
                    format!("version '{}' is not MAJOR.MINOR.PATCH", meta.version),
                )
                .at_path("metadata.version"),
            );
        }
        for (field, value) in [
            ("metadata.created_at", &meta.created_at),
            ("metadata.updated_at", &meta.updated_at),
        ] {
            if chrono::DateTime::parse_from_rfc3339(value).is_err() {
                issues.push(
                    ValidationIssue::error(
                        IssueKind::Schema,
                        format!("'{}' is not an ISO-8601 timestamp", value),
                    )
                    .at_path(field),
                );
            }
        }
        for dependency in &meta.dependencies {
            if !is_valid_version(&dependency.version) {
                issues.push(
                    ValidationIssue::error(
                        IssueKind::Schema,
                        format!(
                            "dependency '{}' version '{}' is not MAJOR.MINOR.PATCH",
                            dependency.id, dependency.version
                        ),
                    )
                    .at_path("metadata.dependencies"),
                );
            }
        }

        if document.nodes.is_empty() {
            issues.push(
                ValidationIssue::error(IssueKind::Schema, "document must contain at least one node")
                    .at_path("nodes"),
            );
        }

        for node in &document.nodes {
            if !is_valid_identifier(&node.id) {
                issues.push(
                    ValidationIssue::error(
                        IssueKind::Schema,
                        format!("node id '{}' does not match [A-Za-z0-9_-]+", node.id),
                    )
                    .for_node(&node.id),
                );
            }
            if let Some(confidence) = node.data.confidence {
                if !(0.0..=1.0).contains(&confidence) {
                    issues.push(
                        ValidationIssue::error(
                            IssueKind::Schema,
                            format!("confidence {} is outside [0, 1]", confidence),
                        )
                        .for_node(&node.id),
                    );
                }
            }
            if let Some(weight) = node.data.weight {
                if !weight.is_finite() {
                    issues.push(
                        ValidationIssue::error(IssueKind::Schema, "weight must be finite")
                            .for_node(&node.id),
                    );
                }
            }
            if node.node_type == NodeType::Custom && node.custom_type.is_none() {
                issues.push(
                    ValidationIssue::error(
                        IssueKind::Schema,
                        "custom node is missing its custom_type tag",
                    )
                    .for_node(&node.id),
                );
            }
        }

        for relation in &document.relations {
            if !is_valid_identifier(&relation.id) {
                issues.push(
                    ValidationIssue::error(
                        IssueKind::Schema,
                        format!("relation id '{}' does not match [A-Za-z0-9_-]+", relation.id),
                    )
                    .for_relation(&relation.id),
                );
            }
            if let Some(strength) = relation.strength {
                if !(0.0..=1.0).contains(&strength) {
                    issues.push(
                        ValidationIssue::error(
                            IssueKind::Schema,
                            format!("strength {} is outside [0, 1]", strength),
                        )
                        .for_relation(&relation.id),
                    );
                }
            }
            if relation.relation_type == RelationType::Custom && relation.custom_type.is_none() {
                issues.push(
                    ValidationIssue::error(
                        IssueKind::Schema,
                        "custom relation is missing its custom_type tag",
                    )
                    .for_relation(&relation.id),
                );
            }
        }

        if let Some(execution) = &document.execution {
            if execution.max_iterations == 0 {
                issues.push(
                    ValidationIssue::error(IssueKind::Schema, "max_iterations must be at least 1")
                        .at_path("execution.max_iterations"),
                );
            }
        }
    }

    // Phase 2: duplicate ids and dangling references.
    fn check_references(&self, document: &Document, issues: &mut Vec<ValidationIssue>) {
        let mut node_ids: AHashMap<&str, usize> = AHashMap::new();
        for node in &document.nodes {
            *node_ids.entry(node.id.as_str()).or_default() += 1;
        }
        for (id, count) in &node_ids {
            if *count > 1 {
                issues.push(
                    ValidationIssue::error(
                        IssueKind::Reference,
                        format!("node id '{}' is declared {} times", id, count),
                    )
                    .for_node(id),
                );
            }
        }

        let mut relation_ids: AHashMap<&str, usize> = AHashMap::new();
        for relation in &document.relations {
            *relation_ids.entry(relation.id.as_str()).or_default() += 1;
        }
        for (id, count) in &relation_ids {
            if *count > 1 {
                issues.push(
                    ValidationIssue::error(
                        IssueKind::Reference,
                        format!("relation id '{}' is declared {} times", id, count),
                    )
                    .for_relation(id),
                );
            }
        }

        for relation in &document.relations {
            for (role, endpoint) in [("source", &relation.source), ("target", &relation.target)] {
                if !node_ids.contains_key(endpoint.as_str()) {
                    issues.push(
                        ValidationIssue::error(
                            IssueKind::Reference,
                            format!(
                                "relation '{}' {} references missing node '{}'",
                                relation.id, role, endpoint
                            ),
                        )
                        .for_relation(&relation.id),
                    );
                }
            }
        }

        if let Some(execution) = &document.execution {
            for (role, points) in [
                ("entry point", &execution.entry_points),
                ("exit point", &execution.exit_points),
            ] {
                for point in points {
                    if !node_ids.contains_key(point.as_str()) {
                        issues.push(ValidationIssue::error(
                            IssueKind::Reference,
                            format!("{} '{}' references a missing node", role, point),
                        ));
                    }
                }
            }
        }
    }

    // Phase 3: causal-subgraph cycles and formula safety.
    fn check_structure(&self, document: &Document, issues: &mut Vec<ValidationIssue>) {
        let index: AHashMap<&str, usize> = document
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.as_str(), i))
            .collect();

        let mut causal = vec![Vec::new(); document.nodes.len()];
        for relation in &document.relations {
            if !relation.relation_type.is_causal() {
                continue;
            }
            if let (Some(&from), Some(&to)) = (
                index.get(relation.source.as_str()),
                index.get(relation.target.as_str()),
            ) {
                causal[from].push(to);
            }
        }

        for cycle in cycles::find_cycles(document.nodes.len(), &causal) {
            let path: Vec<&str> = cycle.iter().map(|&i| document.nodes[i].id.as_str()).collect();
            issues.push(
                ValidationIssue::error(
                    IssueKind::Cycle,
                    format!("dependency cycle detected: {}", path.join(" -> ")),
                )
                .at_path(path.join(" -> "))
                .for_node(path[0]),
            );
        }

        for node in &document.nodes {
            if node.node_type != NodeType::Formula {
                continue;
            }
            let expression = node
                .data
                .parameters
                .get("expression")
                .or_else(|| node.data.parameters.get("formula"))
                .and_then(|v| v.as_str());
            match expression {
                Some(source) => {
                    if let Err(e) = expr::scan_source(source) {
                        issues.push(
                            ValidationIssue::error(IssueKind::Logic, e.to_string())
                                .for_node(&node.id),
                        );
                    }
                }
                None => {
                    issues.push(
                        ValidationIssue::warning(
                            IssueKind::Logic,
                            "formula node has no expression parameter",
                        )
                        .for_node(&node.id),
                    );
                }
            }
        }
    }

    // Phase 4: non-fatal lints.
    fn collect_warnings(&self, document: &Document, issues: &mut Vec<ValidationIssue>) {
        for node in &document.nodes {
            if let Some(confidence) = node.data.confidence {
                if confidence < LOW_CONFIDENCE_THRESHOLD {
                    issues.push(
                        ValidationIssue::warning(
                            IssueKind::Logic,
                            format!("node confidence {} is below {}", confidence, LOW_CONFIDENCE_THRESHOLD),
                        )
                        .for_node(&node.id),
                    );
                }
            }
        }

        let mut incident = vec![false; document.nodes.len()];
        let index: AHashMap<&str, usize> = document
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.as_str(), i))
            .collect();
        let mut adjacency = vec![Vec::new(); document.nodes.len()];
        for relation in &document.relations {
            if let (Some(&from), Some(&to)) = (
                index.get(relation.source.as_str()),
                index.get(relation.target.as_str()),
            ) {
                incident[from] = true;
                incident[to] = true;
                adjacency[from].push(to);
                if relation.bidirectional.unwrap_or(false) {
                    adjacency[to].push(from);
                }
            }
        }

        for (i, has_relation) in incident.iter().enumerate() {
            if !has_relation {
                issues.push(
                    ValidationIssue::warning(IssueKind::Logic, "node has no incident relations")
                        .for_node(&document.nodes[i].id),
                );
            }
        }

        if has_long_simple_path(&adjacency) {
            issues.push(ValidationIssue::warning(
                IssueKind::Logic,
                format!(
                    "graph contains a simple path longer than {} nodes",
                    LONG_PATH_THRESHOLD
                ),
            ));
        }
    }
}

fn summarize(document: &Document) -> ValidationSummary {
    let (entry_points, exit_points) = document
        .execution
        .as_ref()
        .map(|e| (e.entry_points.len(), e.exit_points.len()))
        .unwrap_or((0, 0));
    ValidationSummary {
        node_count: document.nodes.len(),
        relation_count: document.relations.len(),
        entry_points,
        exit_points,
    }
}

/// Looks for any simple directed path spanning more than
/// [`LONG_PATH_THRESHOLD`] nodes. The search is depth-bounded, so it
/// terminates even on dense or cyclic graphs.
fn has_long_simple_path(adjacency: &[Vec<usize>]) -> bool {
    fn dfs(node: usize, adjacency: &[Vec<usize>], on_path: &mut [bool], length: usize) -> bool {
        if length > LONG_PATH_THRESHOLD {
            return true;
        }
        on_path[node] = true;
        for &next in &adjacency[node] {
            if !on_path[next] && dfs(next, adjacency, on_path, length + 1) {
                on_path[node] = false;
                return true;
            }
        }
        on_path[node] = false;
        false
    }

    let mut on_path = vec![false; adjacency.len()];
    (0..adjacency.len()).any(|start| dfs(start, adjacency, &mut on_path, 1))
}
