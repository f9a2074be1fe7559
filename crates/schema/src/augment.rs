//! Parameter-schema augmentation.
//!
//! Synthesized schemas are filled in so every object node states its `required` list, whether it
//! accepts extra keys, and which properties a UI should surface (`visible`). `visible` is not a
//! JSON Schema keyword, so [`remove_custom_fields`] produces the copy that gets validated.

use serde_json::{Map, Value};

/// Non-standard key listing the properties shown to users.
pub const VISIBLE_KEY: &str = "visible";

const COMPOSITION_KEYWORDS: [&str; 3] = ["allOf", "oneOf", "anyOf"];

/// Whether an endpoint's top-level schema should accept undeclared keys.
///
/// True when the endpoint declares a request body with a non-empty `content` section.
#[must_use]
pub fn is_flexible(request_body: Option<&Value>) -> bool {
    request_body
        .and_then(|b| b.get("content"))
        .and_then(Value::as_object)
        .is_some_and(|content| !content.is_empty())
}

/// Augment `schema` in place. `flexible` only affects the top-level `additionalProperties`.
pub fn augment_schema(schema: &mut Value, flexible: bool) {
    let Some(obj) = schema.as_object_mut() else {
        return;
    };

    if is_object_typed(obj) {
        obj.entry("required")
            .or_insert_with(|| Value::Array(Vec::new()));
        obj.entry("additionalProperties")
            .or_insert(Value::Bool(flexible));

        let names: Vec<Value> = obj
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| props.keys().cloned().map(Value::String).collect())
            .unwrap_or_default();
        if !names.is_empty() {
            obj.entry(VISIBLE_KEY).or_insert(Value::Array(names));
        }

        if let Some(props) = obj.get_mut("properties").and_then(Value::as_object_mut) {
            for prop in props.values_mut() {
                augment_schema(prop, false);
            }
        }
    }

    if is_array_typed(obj)
        && let Some(items) = obj.get_mut("items")
        && items.is_object()
    {
        augment_schema(items, false);
    }

    for keyword in COMPOSITION_KEYWORDS {
        if let Some(members) = obj.get_mut(keyword).and_then(Value::as_array_mut) {
            for member in members {
                augment_schema(member, flexible);
            }
        }
    }
}

/// Deep copy of `value` with every `visible` key removed.
#[must_use]
pub fn remove_custom_fields(value: &Value) -> Value {
    match value {
        Value::Object(obj) => Value::Object(
            obj.iter()
                .filter(|(k, _)| k.as_str() != VISIBLE_KEY)
                .map(|(k, v)| (k.clone(), remove_custom_fields(v)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(remove_custom_fields).collect()),
        other => other.clone(),
    }
}

fn type_includes(obj: &Map<String, Value>, ty: &str) -> bool {
    match obj.get("type") {
        Some(Value::String(s)) => s == ty,
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some(ty)),
        _ => false,
    }
}

fn is_object_typed(obj: &Map<String, Value>) -> bool {
    type_includes(obj, "object")
}

fn is_array_typed(obj: &Map<String, Value>) -> bool {
    type_includes(obj, "array")
}
