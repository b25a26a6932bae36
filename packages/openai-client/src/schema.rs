//! JSON-schema generation for structured outputs.

use schemars::{schema_for, JsonSchema};
use serde_json::Value;

/// Build a strict-mode response schema for `T`.
///
/// The structured-outputs endpoint requires every object schema to set
/// `additionalProperties: false` and list all properties as required;
/// schemars does not emit either, so both are stamped on here. Optional
/// fields survive because schemars renders them as nullable types.
pub fn response_schema<T: JsonSchema>() -> Value {
    let root = schema_for!(T);
    let mut value = serde_json::to_value(root.schema).unwrap_or(Value::Null);
    let definitions = serde_json::to_value(root.definitions).unwrap_or(Value::Null);

    if let (Value::Object(schema), Value::Object(defs)) = (&mut value, definitions) {
        if !defs.is_empty() {
            schema.insert("definitions".to_string(), Value::Object(defs));
        }
    }

    enforce_strict_objects(&mut value);
    value
}

fn enforce_strict_objects(value: &mut Value) {
    match value {
        Value::Object(map) => {
            let property_names: Vec<String> = map
                .get("properties")
                .and_then(Value::as_object)
                .map(|props| props.keys().cloned().collect())
                .unwrap_or_default();

            if !property_names.is_empty() {
                map.insert("additionalProperties".to_string(), Value::Bool(false));
                map.insert(
                    "required".to_string(),
                    Value::Array(property_names.into_iter().map(Value::String).collect()),
                );
            }

            for nested in map.values_mut() {
                enforce_strict_objects(nested);
            }
        }
        Value::Array(items) => {
            for item in items {
                enforce_strict_objects(item);
            }
        }
        _ => {}
    }
}
