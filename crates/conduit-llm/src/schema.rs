//! Required-property filling from JSON Schema

use serde_json::{Map, Value};

/// Insert a placeholder for every required property missing from `arguments`
///
/// Returns the names that were filled. Non-object arguments are left alone.
pub fn fill_required(arguments: &mut Value, schema: &Value) -> Vec<String> {
    let Some(object) = arguments.as_object_mut() else {
        return Vec::new();
    };

    let Some(required) = schema.get("required").and_then(Value::as_array) else {
        return Vec::new();
    };

    let properties = schema.get("properties").and_then(Value::as_object);
    let mut filled = Vec::new();

    for name in required.iter().filter_map(Value::as_str) {
        if object.contains_key(name) {
            continue;
        }

        let placeholder = properties
            .and_then(|props| props.get(name))
            .map_or(Value::Null, placeholder_for);

        object.insert(name.to_owned(), placeholder);
        filled.push(name.to_owned());
    }

    filled
}

/// Declared default, else a zero value for the property's type
fn placeholder_for(property: &Value) -> Value {
    if let Some(default) = property.get("default") {
        return default.clone();
    }

    let nullable = property.get("nullable").and_then(Value::as_bool) == Some(true);
    let union = property.get("anyOf").is_some() || property.get("oneOf").is_some();
    if nullable || union {
        return Value::Null;
    }

    match property.get("type").and_then(Value::as_str) {
        Some("string") => Value::String(String::new()),
        Some("number" | "integer") => Value::from(0),
        Some("boolean") => Value::Bool(false),
        Some("array") => Value::Array(Vec::new()),
        Some("object") => Value::Object(Map::new()),
        // `null`, a type array, or no type at all
        _ => Value::Null,
    }
}
