//! Common test utilities for building model documents.
use cogniform::prelude::*;
use serde_json::{json, Value};

/// Fixed timestamp so documents built here are reproducible.
pub const TEST_TIMESTAMP: &str = "2024-01-10T08:00:00Z";

#[allow(dead_code)]
pub fn metadata(id: &str) -> Metadata {
    Metadata {
        id: id.to_string(),
        name: format!("{} model", id),
        description: None,
        version: "1.0.0".to_string(),
        created_at: TEST_TIMESTAMP.to_string(),
        updated_at: TEST_TIMESTAMP.to_string(),
        author: Some("tests".to_string()),
        tags: Vec::new(),
        dependencies: Vec::new(),
        extensions: Default::default(),
    }
}

#[allow(dead_code)]
pub fn node(id: &str, node_type: NodeType) -> Node {
    Node {
        id: id.to_string(),
        node_type,
        label: id.to_string(),
        description: None,
        data: NodeData::default(),
        position: None,
        custom_type: None,
        extensions: Default::default(),
    }
}

#[allow(dead_code)]
pub fn node_with_value(id: &str, node_type: NodeType, value: Value) -> Node {
    let mut n = node(id, node_type);
    n.data.value = Some(value);
    n
}

#[allow(dead_code)]
pub fn node_with_params(id: &str, node_type: NodeType, params: Value) -> Node {
    let mut n = node(id, node_type);
    if let Value::Object(map) = params {
        n.data.parameters = map;
    }
    n
}

#[allow(dead_code)]
pub fn relation(id: &str, relation_type: RelationType, source: &str, target: &str) -> Relation {
    Relation {
        id: id.to_string(),
        relation_type,
        source: source.to_string(),
        target: target.to_string(),
        label: None,
        strength: None,
        bidirectional: None,
        conditions: Vec::new(),
        custom_type: None,
        extensions: Default::default(),
    }
}

#[allow(dead_code)]
pub fn guarded(
    id: &str,
    relation_type: RelationType,
    source: &str,
    target: &str,
    conditions: Vec<ActivationCondition>,
) -> Relation {
    let mut r = relation(id, relation_type, source, target);
    r.conditions = conditions;
    r
}

#[allow(dead_code)]
pub fn condition(field: &str, operator: ConditionOperator, value: Value) -> ActivationCondition {
    ActivationCondition {
        field: field.to_string(),
        operator,
        value,
    }
}

#[allow(dead_code)]
pub fn document(id: &str, nodes: Vec<Node>, relations: Vec<Relation>) -> Document {
    document_with_mode(id, nodes, relations, ExecutionMode::Sequential)
}

#[allow(dead_code)]
pub fn document_with_mode(
    id: &str,
    nodes: Vec<Node>,
    relations: Vec<Relation>,
    mode: ExecutionMode,
) -> Document {
    Document {
        metadata: metadata(id),
        nodes,
        relations,
        execution: Some(ExecutionConfig {
            mode,
            ..ExecutionConfig::default()
        }),
        extensions: Default::default(),
    }
}

/// The weather-decision scenario: an event triggers a condition that
/// routes to one of two actions through guarded `causes` relations.
#[allow(dead_code)]
pub fn weather_document() -> Document {
    let nodes = vec![
        node_with_value("weather_input", NodeType::Event, Value::Null),
        node_with_params(
            "good_weather_condition",
            NodeType::Condition,
            json!({
                "temperature_min": 15,
                "temperature_max": 30,
                "precipitation_max": 0.1,
                "wind_speed_max": 25
            }),
        ),
        node("outdoor_activity", NodeType::Action),
        node("indoor_activity", NodeType::Action),
    ];
    let relations = vec![
        relation(
            "weather-triggers-check",
            RelationType::Triggers,
            "weather_input",
            "good_weather_condition",
        ),
        guarded(
            "good-weather-outdoor",
            RelationType::Causes,
            "good_weather_condition",
            "outdoor_activity",
            vec![condition("data.value", ConditionOperator::Eq, json!(true))],
        ),
        guarded(
            "bad-weather-indoor",
            RelationType::Causes,
            "good_weather_condition",
            "indoor_activity",
            vec![condition("data.value", ConditionOperator::Eq, json!(false))],
        ),
    ];
    document("weather-decision", nodes, relations)
}

/// The multi-path resource allocation scenario: three satisfaction
/// scores feed a formula whose result gates two allocation actions.
#[allow(dead_code)]
pub fn allocation_document(mode: ExecutionMode) -> Document {
    let nodes = vec![
        node("cpu_satisfaction", NodeType::Concept),
        node("memory_satisfaction", NodeType::Concept),
        node("budget_satisfaction", NodeType::Concept),
        node_with_params(
            "constraint_optimizer",
            NodeType::Formula,
            json!({
                "expression":
                    "cpu_satisfaction*0.4 + memory_satisfaction*0.3 + budget_satisfaction*0.3"
            }),
        ),
        node("optimal_allocation", NodeType::Action),
        node("degraded_allocation", NodeType::Action),
    ];
    let relations = vec![
        relation(
            "cpu-influences",
            RelationType::Influences,
            "cpu_satisfaction",
            "constraint_optimizer",
        ),
        relation(
            "memory-influences",
            RelationType::Influences,
            "memory_satisfaction",
            "constraint_optimizer",
        ),
        relation(
            "budget-influences",
            RelationType::Influences,
            "budget_satisfaction",
            "constraint_optimizer",
        ),
        guarded(
            "optimizer-optimal",
            RelationType::Causes,
            "constraint_optimizer",
            "optimal_allocation",
            vec![condition("data.value", ConditionOperator::Gte, json!(0.9))],
        ),
        guarded(
            "optimizer-degraded",
            RelationType::Causes,
            "constraint_optimizer",
            "degraded_allocation",
            vec![
                condition("data.value", ConditionOperator::Lt, json!(0.9)),
                condition("data.value", ConditionOperator::Gte, json!(0.4)),
            ],
        ),
    ];
    document_with_mode("resource-allocation", nodes, relations, mode)
}

/// Two condition nodes whose logic expressions chase each other, so a
/// full pass always produces a change.
#[allow(dead_code)]
pub fn flip_flop_document(max_iterations: u32) -> Document {
    let nodes = vec![
        node_with_params("ping", NodeType::Condition, json!({ "logic": "!pong" })),
        node_with_params("pong", NodeType::Condition, json!({ "logic": "ping" })),
    ];
    let mut doc = document("flip-flop", nodes, Vec::new());
    if let Some(execution) = doc.execution.as_mut() {
        execution.max_iterations = max_iterations;
    }
    doc
}

/// A linear chain of `length` concepts joined by `influences` relations.
#[allow(dead_code)]
pub fn chain_document(id: &str, length: usize) -> Document {
    let nodes: Vec<Node> = (0..length)
        .map(|i| node(&format!("n{}", i), NodeType::Concept))
        .collect();
    let relations: Vec<Relation> = (0..length.saturating_sub(1))
        .map(|i| {
            relation(
                &format!("e{}", i),
                RelationType::Influences,
                &format!("n{}", i),
                &format!("n{}", i + 1),
            )
        })
        .collect();
    document(id, nodes, relations)
}

#[allow(dead_code)]
pub fn inputs(pairs: &[(&str, Value)]) -> InputMap {
    let mut map = InputMap::new();
    for (key, value) in pairs {
        map.insert(key.to_string(), value.clone());
    }
    map
}

#[allow(dead_code)]
pub fn compile(document: &Document) -> CompiledGraph {
    let validation = Validator::new().validate(document);
    assert!(
        validation.valid,
        "test document failed validation: {:?}",
        validation.errors
    );
    Compiler::new()
        .compile(document)
        .expect("compilation failed")
}
