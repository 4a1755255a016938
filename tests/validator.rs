//! Tests for the validation phases: schema, references, structural
//! consistency, and warnings.

mod common;
use common::*;

use cogniform::prelude::*;
use serde_json::json;

fn errors_of_kind(result: &ValidationResult, kind: IssueKind) -> usize {
    result.errors.iter().filter(|i| i.kind == kind).count()
}

#[cfg(test)]
mod schema_tests {
    use super::*;

    #[test]
    fn test_valid_document_passes() {
        let result = Validator::new().validate(&weather_document());
        assert!(result.valid, "unexpected errors: {:?}", result.errors);
        assert_eq!(result.summary.node_count, 4);
        assert_eq!(result.summary.relation_count, 3);
    }

    #[test]
    fn test_bad_version_shape() {
        let mut doc = weather_document();
        doc.metadata.version = "1.0".to_string();
        let result = Validator::new().validate(&doc);
        assert!(!result.valid);
        assert!(errors_of_kind(&result, IssueKind::Schema) > 0);
    }

    #[test]
    fn test_bad_identifier_pattern() {
        let mut doc = weather_document();
        doc.metadata.id = "has spaces!".to_string();
        let result = Validator::new().validate(&doc);
        assert!(!result.valid);
        assert_eq!(result.errors[0].kind, IssueKind::Schema);
        assert_eq!(result.errors[0].path.as_deref(), Some("metadata.id"));
    }

    #[test]
    fn test_bad_timestamp() {
        let mut doc = weather_document();
        doc.metadata.created_at = "yesterday".to_string();
        let result = Validator::new().validate(&doc);
        assert!(!result.valid);
        assert!(errors_of_kind(&result, IssueKind::Schema) > 0);
    }

    #[test]
    fn test_confidence_out_of_bounds() {
        let mut doc = weather_document();
        doc.nodes[0].data.confidence = Some(1.5);
        let result = Validator::new().validate(&doc);
        assert!(!result.valid);
        assert_eq!(result.errors[0].node_id.as_deref(), Some("weather_input"));
    }

    #[test]
    fn test_custom_node_requires_tag() {
        let mut doc = weather_document();
        doc.nodes.push(node("widget", NodeType::Custom));
        let result = Validator::new().validate(&doc);
        assert!(!result.valid);
        assert!(result.errors[0].message.contains("custom_type"));
    }

    #[test]
    fn test_empty_document_rejected() {
        let doc = document("empty", Vec::new(), Vec::new());
        let result = Validator::new().validate(&doc);
        assert!(!result.valid);
        assert_eq!(result.summary.node_count, 0);
    }

    #[test]
    fn test_schema_failure_returns_early() {
        // A schema error plus a dangling reference: only the schema
        // phase runs.
        let mut doc = weather_document();
        doc.metadata.version = "broken".to_string();
        doc.relations[0].target = "nowhere".to_string();
        let result = Validator::new().validate(&doc);
        assert!(!result.valid);
        assert_eq!(errors_of_kind(&result, IssueKind::Reference), 0);
        assert!(errors_of_kind(&result, IssueKind::Schema) > 0);
    }
}

#[cfg(test)]
mod reference_tests {
    use super::*;

    #[test]
    fn test_duplicate_node_ids() {
        let mut doc = weather_document();
        doc.nodes.push(node("weather_input", NodeType::Concept));
        let result = Validator::new().validate(&doc);
        assert!(!result.valid);
        assert!(errors_of_kind(&result, IssueKind::Reference) > 0);
    }

    #[test]
    fn test_duplicate_relation_ids() {
        let mut doc = weather_document();
        let mut duplicate = doc.relations[0].clone();
        duplicate.source = "good_weather_condition".to_string();
        duplicate.target = "outdoor_activity".to_string();
        doc.relations.push(duplicate);
        let result = Validator::new().validate(&doc);
        assert!(!result.valid);
        assert!(errors_of_kind(&result, IssueKind::Reference) > 0);
    }

    #[test]
    fn test_dangling_endpoint() {
        let mut doc = weather_document();
        doc.relations[0].target = "missing_node".to_string();
        let result = Validator::new().validate(&doc);
        assert!(!result.valid);
        let issue = &result.errors[0];
        assert_eq!(issue.kind, IssueKind::Reference);
        assert!(issue.message.contains("missing_node"));
        assert_eq!(issue.relation_id.as_deref(), Some("weather-triggers-check"));
    }

    #[test]
    fn test_dangling_entry_point() {
        let mut doc = weather_document();
        doc.execution.as_mut().unwrap().entry_points = vec!["ghost".to_string()];
        let result = Validator::new().validate(&doc);
        assert!(!result.valid);
        assert!(errors_of_kind(&result, IssueKind::Reference) > 0);
    }

    #[test]
    fn test_validated_document_revalidates() {
        // Reference validation is stable: validating twice yields the
        // same verdict.
        let doc = allocation_document(ExecutionMode::Sequential);
        let first = Validator::new().validate(&doc);
        let second = Validator::new().validate(&doc);
        assert_eq!(first.valid, second.valid);
        assert_eq!(first.errors.len(), second.errors.len());
    }
}

#[cfg(test)]
mod structure_tests {
    use super::*;

    #[test]
    fn test_depends_on_cycle_rejected() {
        let doc = document(
            "cyclic",
            vec![
                node("a", NodeType::Concept),
                node("b", NodeType::Concept),
                node("c", NodeType::Concept),
            ],
            vec![
                relation("ab", RelationType::DependsOn, "a", "b"),
                relation("bc", RelationType::DependsOn, "b", "c"),
                relation("ca", RelationType::DependsOn, "c", "a"),
            ],
        );
        let result = Validator::new().validate(&doc);
        assert!(!result.valid);

        let cycles: Vec<_> = result
            .errors
            .iter()
            .filter(|i| i.kind == IssueKind::Cycle)
            .collect();
        assert_eq!(cycles.len(), 1);

        // The reported path closes on itself and names every node.
        let path = cycles[0].path.as_deref().expect("cycle path");
        let hops: Vec<&str> = path.split(" -> ").collect();
        assert_eq!(hops.len(), 4);
        assert_eq!(hops.first(), hops.last());
        for id in ["a", "b", "c"] {
            assert!(hops.contains(&id), "cycle path must name '{}'", id);
        }
    }

    #[test]
    fn test_causal_mix_cycle_rejected() {
        let doc = document(
            "mixed-cycle",
            vec![node("a", NodeType::Concept), node("b", NodeType::Concept)],
            vec![
                relation("ab", RelationType::Causes, "a", "b"),
                relation("ba", RelationType::Triggers, "b", "a"),
            ],
        );
        let result = Validator::new().validate(&doc);
        assert!(!result.valid);
        assert!(errors_of_kind(&result, IssueKind::Cycle) > 0);
    }

    #[test]
    fn test_influences_cycle_allowed() {
        let doc = document(
            "influence-loop",
            vec![node("a", NodeType::Concept), node("b", NodeType::Concept)],
            vec![
                relation("ab", RelationType::Influences, "a", "b"),
                relation("ba", RelationType::Influences, "b", "a"),
            ],
        );
        let result = Validator::new().validate(&doc);
        assert!(result.valid, "influence cycles are legal: {:?}", result.errors);
    }

    #[test]
    fn test_contains_cycle_allowed() {
        let doc = document(
            "contains-loop",
            vec![node("a", NodeType::Concept), node("b", NodeType::Concept)],
            vec![
                relation("ab", RelationType::Contains, "a", "b"),
                relation("ba", RelationType::Contains, "b", "a"),
            ],
        );
        let result = Validator::new().validate(&doc);
        assert!(result.valid);
    }

    #[test]
    fn test_unsafe_formula_rejected() {
        let doc = document(
            "escape",
            vec![node_with_params(
                "payload",
                NodeType::Formula,
                json!({ "expression": "require('fs').readFileSync('/etc/passwd')" }),
            )],
            Vec::new(),
        );
        let result = Validator::new().validate(&doc);
        assert!(!result.valid);
        let issue = result
            .errors
            .iter()
            .find(|i| i.kind == IssueKind::Logic)
            .expect("logic error");
        assert!(issue.message.contains("require"));
        assert_eq!(issue.node_id.as_deref(), Some("payload"));
    }

    #[test]
    fn test_unbalanced_formula_rejected() {
        let doc = document(
            "lopsided",
            vec![node_with_params(
                "calc",
                NodeType::Formula,
                json!({ "expression": "(a + b" }),
            )],
            Vec::new(),
        );
        let result = Validator::new().validate(&doc);
        assert!(!result.valid);
        assert!(errors_of_kind(&result, IssueKind::Logic) > 0);
    }

    #[test]
    fn test_formula_alias_parameter_accepted() {
        let doc = document(
            "aliased",
            vec![node_with_params(
                "calc",
                NodeType::Formula,
                json!({ "formula": "1 + 2" }),
            )],
            Vec::new(),
        );
        let result = Validator::new().validate(&doc);
        assert!(result.valid);
    }
}

#[cfg(test)]
mod warning_tests {
    use super::*;

    #[test]
    fn test_low_confidence_warning() {
        let mut doc = weather_document();
        doc.nodes[0].data.confidence = Some(0.2);
        let result = Validator::new().validate(&doc);
        assert!(result.valid, "warnings must not invalidate");
        assert!(result
            .warnings
            .iter()
            .any(|w| w.node_id.as_deref() == Some("weather_input")));
    }

    #[test]
    fn test_isolated_node_warning() {
        let mut doc = weather_document();
        doc.nodes.push(node("loner", NodeType::Concept));
        let result = Validator::new().validate(&doc);
        assert!(result.valid);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.node_id.as_deref() == Some("loner")));
    }

    #[test]
    fn test_long_path_warning() {
        let doc = chain_document("long-chain", 12);
        let result = Validator::new().validate(&doc);
        assert!(result.valid);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.message.contains("longer than")));
    }

    #[test]
    fn test_short_path_no_warning() {
        let doc = chain_document("short-chain", 5);
        let result = Validator::new().validate(&doc);
        assert!(result.valid);
        assert!(!result
            .warnings
            .iter()
            .any(|w| w.message.contains("longer than")));
    }
}

#[cfg(test)]
mod file_tests {
    use super::*;

    #[test]
    fn test_validate_file_missing() {
        let result = Validator::new().validate_file("/nonexistent/model.form");
        assert!(!result.valid);
        assert_eq!(result.errors[0].kind, IssueKind::Schema);
        // A failing validation still produces a summary.
        assert_eq!(result.summary.node_count, 0);
    }

    #[test]
    fn test_validate_file_bad_json() {
        let path = std::env::temp_dir().join("cogniform-bad.form");
        std::fs::write(&path, "{ not json").expect("write temp file");
        let result = Validator::new().validate_file(&path);
        assert!(!result.valid);
        assert_eq!(result.errors[0].kind, IssueKind::Schema);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_validate_file_round_trip() {
        let path = std::env::temp_dir().join("cogniform-good.form");
        let text = serde_json::to_string_pretty(&weather_document()).expect("serialize");
        std::fs::write(&path, text).expect("write temp file");
        let result = Validator::new().validate_file(&path);
        assert!(result.valid, "errors: {:?}", result.errors);
        let _ = std::fs::remove_file(&path);
    }
}
