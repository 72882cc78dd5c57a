#![no_main]

use jsonschema_mapper_core::{map_json, MapOptions, ModelSet};
use libfuzzer_sys::fuzz_target;

const SOURCE_SCHEMA: &str = include_str!("../../tests/schemas/ecommerce_order.json");
const TARGET_SCHEMA: &str = include_str!("../../tests/schemas/accounting_order.json");

// Accepts arbitrary bytes, attempts to parse as JSON, then uses the value
// both as a schema and as source data for the ecommerce → accounting mapping.
// Goal: no panics, even on malformed input.
fuzz_target!(|data: &[u8]| {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };

    let _ = ModelSet::from_schema(&value);

    let (Ok(source_schema), Ok(target_schema)) = (
        serde_json::from_str::<serde_json::Value>(SOURCE_SCHEMA),
        serde_json::from_str::<serde_json::Value>(TARGET_SCHEMA),
    ) else {
        return;
    };
    let options = MapOptions::with_max_iterations(8);
    let _ = map_json(&source_schema, &value, &target_schema, &options);
});
