//! Property-based tests for the conversion engine
//!
//! These tests verify invariants that should hold for any input the
//! engine is given, matching or not.

mod test_support;

use proptest::prelude::*;
use serde_json::{json, Map, Value};
use test_support::{batch_input, dial_input, engine, orders_engine, orders_input};

/// Strategy for generating flat maps of short string fields
fn flat_object_strategy() -> impl Strategy<Value = Value> {
    prop::collection::btree_map("[a-z_]{1,8}", "[a-zA-Z0-9 ]{0,8}", 0..6).prop_map(|fields| {
        let map: Map<String, Value> = fields.into_iter().map(|(k, v)| (k, Value::String(v))).collect();
        Value::Object(map)
    })
}

/// Strategy for generating names without placeholder syntax
fn name_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9张李王三四]{1,12}"
}

proptest! {
    #[test]
    fn expanded_items_report_their_position(n in 1usize..25) {
        let engine = engine();
        let result = engine.convert("A", "C", &batch_input(n));
        prop_assert!(result.success);

        let output = result.result.unwrap();
        let items = output["items"].as_array().unwrap();
        prop_assert_eq!(items.len(), n);
        for (i, item) in items.iter().enumerate() {
            prop_assert_eq!(&item["index"], &json!(i.to_string()));
            prop_assert_eq!(&item["total"], &json!(n.to_string()));
            prop_assert_eq!(&item["last"], &json!((i + 1 == n).to_string()));
        }
    }

    #[test]
    fn nested_items_belong_to_their_own_order(lines_per_order in prop::collection::vec(0usize..4, 1..5)) {
        let engine = orders_engine();
        let result = engine.convert("A", "C", &orders_input(&lines_per_order));
        prop_assert!(result.success, "conversion failed: {:?}", result.error);

        let output = result.result.unwrap();
        let orders = output["orders"].as_array().unwrap();
        prop_assert_eq!(orders.len(), lines_per_order.len());
        for (i, order) in orders.iter().enumerate() {
            let lines = order["lines"].as_array().unwrap();
            prop_assert_eq!(lines.len(), lines_per_order[i]);
            for (j, line) in lines.iter().enumerate() {
                prop_assert_eq!(&line["owner"], &json!(format!("o{}", i)));
                prop_assert_eq!(&line["sku"], &json!(format!("o{}-l{}", i, j)));
            }
        }
    }

    #[test]
    fn matched_values_reach_the_target(phone_type in name_strategy(), person in name_strategy()) {
        let engine = engine();
        let result = engine.convert("A", "B", &dial_input(&phone_type, &person));
        prop_assert!(result.success);

        let output = result.result.unwrap();
        prop_assert_eq!(&output["phone"]["kind"], &json!(phone_type));
        prop_assert_eq!(&output["phone"]["who"], &json!(person));
    }

    #[test]
    fn convert_always_reports_an_outcome(input in flat_object_strategy()) {
        let engine = engine();
        let result = engine.convert("A", "C", &input);

        prop_assert!(result.metadata.conversion_id.starts_with("conv_"));
        prop_assert_eq!(result.success, result.error.is_none());
        prop_assert_eq!(result.success, result.result.is_some());
    }
}
