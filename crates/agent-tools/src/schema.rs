//! Minimal JSON Schema validation for tool arguments.
//!
//! Supports the subset tool schemas use: an object root with `properties`,
//! `required`, primitive `type`s, `enum`, `default`, `minimum`/`maximum` and
//! `format: "email"`. Unknown keywords are ignored.

use serde_json::{Map, Value};

use crate::error::ToolError;

/// Validate `arguments` against `schema` and return them with defaults applied.
///
/// `null` arguments are treated as an empty object.
pub fn validate(schema: &Value, arguments: &Value) -> Result<Map<String, Value>, ToolError> {
    let mut params = match arguments {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        _ => {
            return Err(ToolError::InvalidParameter {
                name: "arguments".to_string(),
                reason: "expected an object".to_string(),
            })
        }
    };

    let empty = Map::new();
    let properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    for (name, property) in properties {
        if !params.contains_key(name) {
            if let Some(default) = property.get("default") {
                params.insert(name.clone(), default.clone());
            }
        }
    }

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            match params.get(name) {
                None | Some(Value::Null) => {
                    return Err(ToolError::MissingParameter(name.to_string()))
                }
                _ => {}
            }
        }
    }

    for (name, value) in &params {
        if let Some(property) = properties.get(name) {
            check_property(name, property, value)?;
        }
    }

    Ok(params)
}

fn check_property(name: &str, property: &Value, value: &Value) -> Result<(), ToolError> {
    let invalid = |reason: String| ToolError::InvalidParameter {
        name: name.to_string(),
        reason,
    };

    if let Some(expected) = property.get("type").and_then(Value::as_str) {
        if !matches_type(expected, value) {
            return Err(invalid(format!("expected {}", expected)));
        }
    }

    if let Some(allowed) = property.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            let options: Vec<String> = allowed.iter().map(|v| v.to_string()).collect();
            return Err(invalid(format!("must be one of {}", options.join(", "))));
        }
    }

    if let Some(number) = value.as_f64() {
        if let Some(min) = property.get("minimum").and_then(Value::as_f64) {
            if number < min {
                return Err(invalid(format!("must be at least {}", min)));
            }
        }
        if let Some(max) = property.get("maximum").and_then(Value::as_f64) {
            if number > max {
                return Err(invalid(format!("must be at most {}", max)));
            }
        }
    }

    if property.get("format").and_then(Value::as_str) == Some("email") {
        if let Some(text) = value.as_str() {
            if !looks_like_email(text) {
                return Err(invalid("expected an email address".to_string()));
            }
        }
    }

    Ok(())
}

fn matches_type(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn looks_like_email(text: &str) -> bool {
    match text.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !text.contains(char::is_whitespace)
        }
        None => false,
    }
}
