//! Field extraction from example JSON documents, plus dotted-path access.
//!
//! Example responses and payloads are only schema samples: every key at every
//! nesting level becomes a connectable [`Field`]. Objects are walked pre-order
//! (parent before children); arrays are opaque and yield a single `array`
//! field.

use serde_json::{Map, Value};

use crate::types::{Field, FieldType};

/// Flatten a JSON document into its addressable fields.
///
/// Never fails: malformed text, blank text, and non-object documents all
/// yield an empty list.
pub fn extract_fields(json_text: &str) -> Vec<Field> {
    match parse_lenient(json_text) {
        Some(value) => extract_fields_from_value(&value),
        None => Vec::new(),
    }
}

/// Flatten an already-parsed document. Non-objects yield nothing.
pub fn extract_fields_from_value(value: &Value) -> Vec<Field> {
    let mut fields = Vec::new();
    if let Value::Object(map) = value {
        walk(map, None, &mut fields);
    }
    fields
}

fn walk(map: &Map<String, Value>, prefix: Option<&str>, out: &mut Vec<Field>) {
    for (key, value) in map {
        let path = match prefix {
            Some(p) => format!("{p}.{key}"),
            None => key.clone(),
        };
        out.push(Field::new(path.clone(), FieldType::of(value)));

        // null classifies as object but has nothing to descend into
        if let Value::Object(child) = value {
            walk(child, Some(&path), out);
        }
    }
}

/// Parse JSON text, treating blank or malformed input as absent.
pub fn parse_lenient(text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }
    match serde_json::from_str(text) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!("Ignoring malformed JSON sample: {e}");
            None
        }
    }
}

/// Follow a dot-delimited path through nested objects.
///
/// Returns `None` ("missing") when the path is empty, a segment is absent, or
/// an intermediate value is not an object. A present JSON `null` is `Some`.
pub fn get_nested_value<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    path.split('.')
        .try_fold(value, |current, segment| current.as_object()?.get(segment))
}

/// Write `value` at a dot-delimited path, creating intermediate objects.
///
/// Intermediate values that are not objects are replaced.
pub fn set_nested_value(target: &mut Map<String, Value>, path: &str, value: Value) {
    let mut segments = path.split('.').peekable();
    let mut current = target;
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            current.insert(segment.to_string(), value);
            return;
        }
        let slot = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        current = match slot {
            Value::Object(map) => map,
            _ => return,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn paths(fields: &[Field]) -> Vec<(&str, FieldType)> {
        fields
            .iter()
            .map(|f| (f.path.as_str(), f.field_type))
            .collect()
    }

    #[test]
    fn test_extract_nested_preorder() {
        let fields = extract_fields(r#"{"user":{"id":1,"name":"Bo"}}"#);
        assert_eq!(
            paths(&fields),
            vec![
                ("user", FieldType::Object),
                ("user.id", FieldType::Number),
                ("user.name", FieldType::String),
            ]
        );
    }

    #[test]
    fn test_extract_keeps_document_key_order() {
        let fields = extract_fields(r#"{"zeta":true,"alpha":"a","mid":2.5}"#);
        assert_eq!(
            paths(&fields),
            vec![
                ("zeta", FieldType::Boolean),
                ("alpha", FieldType::String),
                ("mid", FieldType::Number),
            ]
        );
    }

    #[test]
    fn test_extract_does_not_enter_arrays() {
        let fields = extract_fields(r#"{"items":[{"sku":"a"}],"count":1}"#);
        assert_eq!(
            paths(&fields),
            vec![("items", FieldType::Array), ("count", FieldType::Number)]
        );
    }

    #[test]
    fn test_extract_null_is_object_without_children() {
        let fields = extract_fields(r#"{"meta":null}"#);
        assert_eq!(paths(&fields), vec![("meta", FieldType::Object)]);
    }

    #[test]
    fn test_extract_invalid_or_non_object() {
        assert!(extract_fields("{bad").is_empty());
        assert!(extract_fields("").is_empty());
        assert!(extract_fields("[1,2,3]").is_empty());
        assert!(extract_fields("\"text\"").is_empty());
        assert!(extract_fields("42").is_empty());
    }

    #[test]
    fn test_get_nested_value() {
        let doc = json!({"user": {"name": "Bo", "tags": ["a"], "nick": null}});
        assert_eq!(get_nested_value(&doc, "user.name"), Some(&json!("Bo")));
        assert_eq!(get_nested_value(&doc, "user.nick"), Some(&Value::Null));
        assert_eq!(get_nested_value(&doc, "user.missing"), None);
        assert_eq!(get_nested_value(&doc, "user.name.first"), None);
        assert_eq!(get_nested_value(&doc, "user.tags.0"), None);
        assert_eq!(get_nested_value(&doc, ""), None);
    }

    #[test]
    fn test_set_nested_value_creates_intermediates() {
        let mut payload = Map::new();
        set_nested_value(&mut payload, "profile.name.first", json!("Bo"));
        set_nested_value(&mut payload, "profile.age", json!(30));
        set_nested_value(&mut payload, "flat", json!(true));
        assert_eq!(
            Value::Object(payload),
            json!({"profile": {"name": {"first": "Bo"}, "age": 30}, "flat": true})
        );
    }

    #[test]
    fn test_set_nested_value_replaces_scalar_parent() {
        let mut payload = Map::new();
        set_nested_value(&mut payload, "a", json!(1));
        set_nested_value(&mut payload, "a.b", json!(2));
        assert_eq!(Value::Object(payload), json!({"a": {"b": 2}}));
    }
}
