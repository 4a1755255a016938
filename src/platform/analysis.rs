//! Document analysis and report generation.

use crate::compiler::Complexity;
use crate::model::Document;
use crate::validator::ValidationResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Coarse complexity classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityBucket {
    Low,
    Medium,
    High,
}

impl ComplexityBucket {
    pub fn as_str(self) -> &'static str {
        match self {
            ComplexityBucket::Low => "low",
            ComplexityBucket::Medium => "medium",
            ComplexityBucket::High => "high",
        }
    }
}

/// The outcome of analyzing one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub complexity: ComplexityBucket,
    pub metrics: Complexity,
    pub node_count: usize,
    pub relation_count: usize,
    pub node_types: BTreeMap<String, usize>,
    pub relation_types: BTreeMap<String, usize>,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
}

pub(super) fn bucket(metrics: &Complexity, node_count: usize) -> ComplexityBucket {
    if metrics.max_depth > 10 || metrics.avg_branching > 3.0 || node_count > 50 {
        ComplexityBucket::High
    } else if metrics.max_depth > 5 || metrics.avg_branching > 2.0 || node_count > 20 {
        ComplexityBucket::Medium
    } else {
        ComplexityBucket::Low
    }
}

pub(super) fn analyze(
    document: &Document,
    validation: &ValidationResult,
    metrics: Complexity,
) -> AnalysisResult {
    let mut node_types: BTreeMap<String, usize> = BTreeMap::new();
    for node in &document.nodes {
        *node_types
            .entry(node.node_type.as_str().to_string())
            .or_default() += 1;
    }
    let mut relation_types: BTreeMap<String, usize> = BTreeMap::new();
    for relation in &document.relations {
        *relation_types
            .entry(relation.relation_type.as_str().to_string())
            .or_default() += 1;
    }

    let issues: Vec<String> = validation
        .errors
        .iter()
        .chain(validation.warnings.iter())
        .map(|issue| issue.message.clone())
        .collect();

    let complexity = bucket(&metrics, document.nodes.len());
    let recommendations = recommend(document, &metrics, complexity);

    AnalysisResult {
        complexity,
        metrics,
        node_count: document.nodes.len(),
        relation_count: document.relations.len(),
        node_types,
        relation_types,
        issues,
        recommendations,
    }
}

fn recommend(
    document: &Document,
    metrics: &Complexity,
    complexity: ComplexityBucket,
) -> Vec<String> {
    let mut recommendations = Vec::new();
    if complexity == ComplexityBucket::High {
        recommendations
            .push("consider splitting the model into smaller linked documents".to_string());
    }
    if metrics.cycle_count > 0 {
        recommendations.push(
            "cyclic influence relations detected; hybrid execution will iterate them".to_string(),
        );
    }
    if metrics.cycle_count == 0 && document.nodes.len() > 20 {
        recommendations
            .push("large acyclic graph; parallel execution mode will help".to_string());
    }
    if metrics.avg_branching > 3.0 {
        recommendations.push(
            "high branching factor; the speed optimization mode prioritizes strong edges"
                .to_string(),
        );
    }
    if document.relations.is_empty() && document.nodes.len() > 1 {
        recommendations.push("document declares no relations between its nodes".to_string());
    }
    recommendations
}

/// Renders a human-readable report combining validation status and
/// analysis.
pub(super) fn render_report(
    document: &Document,
    validation: &ValidationResult,
    analysis: &AnalysisResult,
) -> String {
    let mut report = String::new();
    let meta = &document.metadata;

    let _ = writeln!(report, "# Model Report: {}", meta.name);
    let _ = writeln!(report, "\n- id: `{}`", meta.id);
    let _ = writeln!(report, "- version: {}", meta.version);
    if let Some(author) = &meta.author {
        let _ = writeln!(report, "- author: {}", author);
    }

    let _ = writeln!(report, "\n## Validation\n");
    let status = if validation.valid { "VALID" } else { "INVALID" };
    let _ = writeln!(
        report,
        "Status: **{}** ({} error(s), {} warning(s))",
        status,
        validation.errors.len(),
        validation.warnings.len()
    );
    for issue in &validation.errors {
        let _ = writeln!(report, "- error: {}", issue.message);
    }
    for issue in &validation.warnings {
        let _ = writeln!(report, "- warning: {}", issue.message);
    }

    let _ = writeln!(report, "\n## Analysis\n");
    let _ = writeln!(report, "- complexity: {}", analysis.complexity.as_str());
    let _ = writeln!(
        report,
        "- nodes: {} / relations: {}",
        analysis.node_count, analysis.relation_count
    );
    let _ = writeln!(report, "- max depth: {}", analysis.metrics.max_depth);
    let _ = writeln!(
        report,
        "- average branching: {:.2}",
        analysis.metrics.avg_branching
    );
    let _ = writeln!(report, "- cycles: {}", analysis.metrics.cycle_count);

    let _ = writeln!(report, "\n### Node types\n");
    for (node_type, count) in &analysis.node_types {
        let _ = writeln!(report, "- {}: {}", node_type, count);
    }
    if !analysis.relation_types.is_empty() {
        let _ = writeln!(report, "\n### Relation types\n");
        for (relation_type, count) in &analysis.relation_types {
            let _ = writeln!(report, "- {}: {}", relation_type, count);
        }
    }

    if !analysis.recommendations.is_empty() {
        let _ = writeln!(report, "\n## Recommendations\n");
        for recommendation in &analysis.recommendations {
            let _ = writeln!(report, "- {}", recommendation);
        }
    }

    report
}
