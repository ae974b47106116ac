//! Shared test support utilities for integration tests

#![allow(dead_code)]

use protomorph_core::{Bindings, ConversionEngine, ConversionResult, EngineConfig, RemapConfig, TemplateRegistry};
use serde_json::{json, Value};
use std::sync::Arc;

/// Scenario template: telephone dial in family A
pub fn dial_template() -> Value {
    json!({
        "domain": "telephone",
        "action": "DIAL",
        "slots": {"category": "{{ phone_type }}", "name": "{{ person }}"}
    })
}

/// Matching input for [`dial_template`]
pub fn dial_input(phone_type: &str, person: &str) -> Value {
    json!({
        "domain": "telephone",
        "action": "DIAL",
        "slots": {"category": phone_type, "name": person}
    })
}

/// Batch input with `n` records under `data`
pub fn batch_input(n: usize) -> Value {
    let records: Vec<Value> = (0..n)
        .map(|i| json!({"name": format!("item{}", i), "value": i * 100}))
        .collect();
    json!({"domain": "batch", "operation": "process", "data": records})
}

/// Registry with telephone, batch and navigation templates in families A, B and C
pub fn registry() -> Arc<TemplateRegistry> {
    let registry = TemplateRegistry::new();
    let templates = [
        ("A-1", "A", dial_template()),
        ("A-2", "A", json!({"domain": "telephone", "action": "ANSWER", "slots": {"line": "{{ line }}"}})),
        (
            "A-3",
            "A",
            json!({
                "domain": "batch",
                "operation": "{{ operation }}",
                "data": ["{# array_dynamic: true #}", {"name": "{{ name }}", "value": "{{ value }}"}]
            }),
        ),
        ("A-4", "A", json!({"intent": "navigate", "destination": "${{ destination }}"})),
        (
            "B-1",
            "B",
            json!({"op": "call", "phone": {"kind": "{{ phone_type }}", "who": "{{ person }}"}, "sid": "{{ __sid }}"}),
        ),
        (
            "B-4",
            "B",
            json!({
                "service": "navigation",
                "intersection": {
                    "primary_road": "${{ intersection.primary_road }}",
                    "secondary_road": "${{ intersection.secondary_road }}"
                },
                "city": "${{ city }}",
                "district": "${{ district }}",
                "options": {"vehicle": "${{ vehicle_type }}", "avoid_tolls": "${{ avoid_tolls }}"}
            }),
        ),
        (
            "C-1",
            "C",
            json!({
                "intent": "call",
                "sid": "{{ __sid }}",
                "label": "{{ __label }}",
                "priority": "{{ __priority }}",
                "contact": {"name": "{{ person }}", "device": "{{ __device_type }}"}
            }),
        ),
        (
            "C-3",
            "C",
            json!({
                "op": "{{ operation | upper }}",
                "items": ["{# array_dynamic: true #}", {
                    "label": "{{ name }}",
                    "amount": "{{ value }}",
                    "session_id": "{{ __session_id }}",
                    "index": "{{ __array_index }}",
                    "total": "{{ __array_total }}",
                    "last": "{{ __is_last }}"
                }]
            }),
        ),
    ];
    for (id, family, tree) in templates {
        registry.load(id, family, tree).expect("fixture templates are valid");
    }
    Arc::new(registry)
}

/// Orders input: one order per entry of `lines_per_order`, each with that
/// many lines. Order `i` has id `o{i}` and its lines have skus `o{i}-l{j}`.
pub fn orders_input(lines_per_order: &[usize]) -> Value {
    let orders: Vec<Value> = lines_per_order
        .iter()
        .enumerate()
        .map(|(i, &count)| {
            let lines: Vec<Value> = (0..count).map(|j| json!({"sku": format!("o{}-l{}", i, j)})).collect();
            json!({"id": format!("o{}", i), "lines": lines})
        })
        .collect();
    json!({"domain": "orders", "orders": orders})
}

/// Engine over a registry of nested order templates: A-6 in family A and
/// C-6 in family C, where every C-6 line names the order that owns it
pub fn orders_engine() -> ConversionEngine {
    let registry = TemplateRegistry::new();
    registry
        .load(
            "A-6",
            "A",
            json!({
                "domain": "orders",
                "orders": ["{# array_dynamic: true #}", {
                    "id": "{{ id }}",
                    "lines": ["{# array_dynamic: true #}", {"sku": "{{ sku }}"}]
                }]
            }),
        )
        .expect("fixture templates are valid");
    registry
        .load(
            "C-6",
            "C",
            json!({
                "kind": "orders",
                "orders": ["{# array_dynamic: true #}", {
                    "id": "{{ id }}",
                    "lines": ["{# array_dynamic: true #}", {
                        "sku": "{{ sku }}",
                        "owner": "{{ id }}",
                        "position": "{{ __array_index }}"
                    }]
                }]
            }),
        )
        .expect("fixture templates are valid");
    ConversionEngine::builder()
        .registry(Arc::new(registry))
        .build()
        .expect("engine configuration is valid")
}

/// Engine over [`registry`] with the intersection remapping rules
pub fn engine() -> ConversionEngine {
    engine_with(EngineConfig {
        remapping: RemapConfig::intersection_routes(),
        ..EngineConfig::default()
    })
}

pub fn engine_with(config: EngineConfig) -> ConversionEngine {
    ConversionEngine::builder()
        .registry(registry())
        .config(config)
        .build()
        .expect("engine configuration is valid")
}

/// Convert and assert success, returning the result
pub fn assert_conversion_succeeds(engine: &ConversionEngine, source: &str, target: &str, input: &Value) -> ConversionResult {
    let result = engine.convert(source, target, input);
    assert!(
        result.success,
        "conversion {} -> {} failed: {:?}",
        source, target, result.error
    );
    assert!(result.result.is_some());
    result
}

pub fn bindings(value: Value) -> Bindings {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {}", other),
    }
}
