//! Shape validation for caller-supplied JSON-LD metadata.
//!
//! This is not a full JSON-LD processor: it checks that the document is a
//! node object with well-formed `@context` and `@type` keywords, recursing
//! into nested node objects. Failures are aggregated so a caller sees every
//! violation at once.

use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ValidationFailure {
    pub property: String,
    pub reason: String,
}

impl ValidationFailure {
    pub fn new(property: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.property, self.reason)
    }
}

/// Validate a metadata document, appending every violation to `failures`.
pub fn validate(metadata: &Value, failures: &mut Vec<ValidationFailure>) {
    validate_node("metadata", metadata, failures);
}

fn validate_node(path: &str, value: &Value, failures: &mut Vec<ValidationFailure>) {
    let Value::Object(object) = value else {
        failures.push(ValidationFailure::new(path, "must be a JSON object"));
        return;
    };

    for (key, entry) in object {
        let child_path = format!("{path}.{key}");
        match key.as_str() {
            "" => failures.push(ValidationFailure::new(
                path,
                "property names must not be empty",
            )),
            "@context" => validate_context(&child_path, entry, failures),
            "@type" | "type" => validate_type(&child_path, entry, failures),
            _ => validate_value(&child_path, entry, failures),
        }
    }
}

fn validate_value(path: &str, value: &Value, failures: &mut Vec<ValidationFailure>) {
    match value {
        Value::Object(_) => validate_node(path, value, failures),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                if item.is_object() {
                    validate_node(&format!("{path}[{i}]"), item, failures);
                }
            }
        }
        _ => {}
    }
}

fn validate_context(path: &str, value: &Value, failures: &mut Vec<ValidationFailure>) {
    match value {
        Value::String(_) | Value::Object(_) => {}
        Value::Array(items) => {
            if !items
                .iter()
                .all(|item| item.is_string() || item.is_object())
            {
                failures.push(ValidationFailure::new(
                    path,
                    "array entries must be strings or objects",
                ));
            }
        }
        _ => failures.push(ValidationFailure::new(
            path,
            "must be a string, array or object",
        )),
    }
}

fn validate_type(path: &str, value: &Value, failures: &mut Vec<ValidationFailure>) {
    match value {
        Value::String(_) => {}
        Value::Array(items) => {
            if !items.iter().all(Value::is_string) {
                failures.push(ValidationFailure::new(
                    path,
                    "array entries must be strings",
                ));
            }
        }
        _ => failures.push(ValidationFailure::new(
            path,
            "must be a string or array of strings",
        )),
    }
}
