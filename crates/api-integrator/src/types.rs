//! Core data types: sources, fields, and field-level mappings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};

use crate::error::{IntegratorError, IntegratorResult};
use crate::schema::parse_lenient;

/// Identifier of a source, unique within a registry for its lifetime.
pub type SourceId = u64;

/// Kind of source. Only HTTP APIs are supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SourceKind {
    #[default]
    #[serde(rename = "API")]
    Api,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Api => "API",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = IntegratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "API" => Ok(SourceKind::Api),
            other => Err(IntegratorError::Validation(format!(
                "unsupported source type: {other}"
            ))),
        }
    }
}

/// HTTP method used to pull data from a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReceiveMethod {
    #[default]
    Get,
    Post,
}

impl ReceiveMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiveMethod::Get => "GET",
            ReceiveMethod::Post => "POST",
        }
    }
}

impl fmt::Display for ReceiveMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReceiveMethod {
    type Err = IntegratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(ReceiveMethod::Get),
            "POST" => Ok(ReceiveMethod::Post),
            other => Err(IntegratorError::Validation(format!(
                "unsupported receive method: {other} (use GET or POST)"
            ))),
        }
    }
}

/// HTTP method used to push mapped data into a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UpdateMethod {
    #[default]
    Post,
    Put,
    Patch,
}

impl UpdateMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateMethod::Post => "POST",
            UpdateMethod::Put => "PUT",
            UpdateMethod::Patch => "PATCH",
        }
    }
}

impl fmt::Display for UpdateMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateMethod {
    type Err = IntegratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "POST" => Ok(UpdateMethod::Post),
            "PUT" => Ok(UpdateMethod::Put),
            "PATCH" => Ok(UpdateMethod::Patch),
            other => Err(IntegratorError::Validation(format!(
                "unsupported update method: {other} (use POST, PUT or PATCH)"
            ))),
        }
    }
}

/// A configured API with a receive side and an update side.
///
/// Headers, payloads and the response example are kept as the raw JSON text
/// the user entered; they are parsed leniently wherever they are consumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub id: SourceId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receive_endpoint: Option<String>,
    #[serde(default)]
    pub receive_method: ReceiveMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receive_payload: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receive_headers: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receive_response_example: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_endpoint: Option<String>,
    #[serde(default)]
    pub update_method: UpdateMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_headers: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_payload: Option<String>,
}

impl Source {
    /// Build a source from a patch, requiring a non-blank name and a type.
    pub fn from_patch(id: SourceId, patch: SourcePatch) -> IntegratorResult<Self> {
        let name = match patch.name {
            Some(ref n) if !n.trim().is_empty() => n.clone(),
            _ => {
                return Err(IntegratorError::Validation(
                    "source name is required".to_string(),
                ))
            }
        };
        let kind = patch.kind.ok_or_else(|| {
            IntegratorError::Validation("source type is required".to_string())
        })?;

        let mut source = Source {
            id,
            name,
            kind,
            receive_endpoint: None,
            receive_method: ReceiveMethod::default(),
            receive_payload: None,
            receive_headers: None,
            receive_response_example: None,
            update_endpoint: None,
            update_method: UpdateMethod::default(),
            update_headers: None,
            update_payload: None,
        };
        source.apply(patch);
        Ok(source)
    }

    /// Merge a partial update. Fields absent from the patch are retained.
    pub fn apply(&mut self, patch: SourcePatch) {
        let SourcePatch {
            name,
            kind,
            receive_endpoint,
            receive_method,
            receive_payload,
            receive_headers,
            receive_response_example,
            update_endpoint,
            update_method,
            update_headers,
            update_payload,
        } = patch;

        if let Some(v) = name {
            self.name = v;
        }
        if let Some(v) = kind {
            self.kind = v;
        }
        if let Some(v) = receive_endpoint {
            self.receive_endpoint = Some(v);
        }
        if let Some(v) = receive_method {
            self.receive_method = v;
        }
        if let Some(v) = receive_payload {
            self.receive_payload = Some(v);
        }
        if let Some(v) = receive_headers {
            self.receive_headers = Some(v);
        }
        if let Some(v) = receive_response_example {
            self.receive_response_example = Some(v);
        }
        if let Some(v) = update_endpoint {
            self.update_endpoint = Some(v);
        }
        if let Some(v) = update_method {
            self.update_method = v;
        }
        if let Some(v) = update_headers {
            self.update_headers = Some(v);
        }
        if let Some(v) = update_payload {
            self.update_payload = Some(v);
        }
    }

    /// The receive endpoint, if configured (non-blank after trimming).
    pub fn receive_url(&self) -> Option<&str> {
        configured(self.receive_endpoint.as_deref())
    }

    /// The update endpoint, if configured (non-blank after trimming).
    pub fn update_url(&self) -> Option<&str> {
        configured(self.update_endpoint.as_deref())
    }

    /// A source with no configured endpoint takes no part in integration runs.
    pub fn is_inert(&self) -> bool {
        self.receive_url().is_none() && self.update_url().is_none()
    }

    pub fn receive_header_pairs(&self) -> Vec<(String, String)> {
        header_pairs(self.receive_headers.as_deref())
    }

    pub fn update_header_pairs(&self) -> Vec<(String, String)> {
        header_pairs(self.update_headers.as_deref())
    }

    /// Request body for the receive call. Only POST receives carry one.
    pub fn receive_body(&self) -> Option<Value> {
        match self.receive_method {
            ReceiveMethod::Get => None,
            ReceiveMethod::Post => Some(
                self.receive_payload
                    .as_deref()
                    .and_then(parse_lenient)
                    .unwrap_or_else(|| json!({})),
            ),
        }
    }

    /// Parsed response example; malformed or absent examples read as `{}`.
    pub fn response_sample(&self) -> Value {
        self.receive_response_example
            .as_deref()
            .and_then(parse_lenient)
            .unwrap_or_else(|| json!({}))
    }
}

fn configured(endpoint: Option<&str>) -> Option<&str> {
    endpoint.map(str::trim).filter(|e| !e.is_empty())
}

/// Flatten a JSON headers object into name/value pairs.
///
/// Non-string values are rendered as their JSON text. Anything that is not
/// an object yields no headers.
pub fn header_pairs(text: Option<&str>) -> Vec<(String, String)> {
    match text.and_then(parse_lenient) {
        Some(Value::Object(map)) => map
            .into_iter()
            .map(|(k, v)| {
                let v = match v {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (k, v)
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Partial set of source fields, used both for creation and for merge updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<SourceKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receive_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receive_method: Option<ReceiveMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receive_payload: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receive_headers: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receive_response_example: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_method: Option<UpdateMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_headers: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_payload: Option<String>,
}

impl SourcePatch {
    /// A patch carrying just a name and the API type.
    pub fn api(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            kind: Some(SourceKind::Api),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == SourcePatch::default()
    }
}

/// A source definition as imported from a file: an optional fixed id plus fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<SourceId>,
    #[serde(flatten)]
    pub fields: SourcePatch,
}

/// JSON type of a field, as shown on connection endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Array,
    Object,
    #[serde(other)]
    Other,
}

impl FieldType {
    /// Classify a JSON value. `null` reads as `object`, like `typeof null`.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::String(_) => FieldType::String,
            Value::Number(_) => FieldType::Number,
            Value::Bool(_) => FieldType::Boolean,
            Value::Array(_) => FieldType::Array,
            Value::Object(_) | Value::Null => FieldType::Object,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Array => "array",
            FieldType::Object => "object",
            FieldType::Other => "other",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An addressable location inside an example document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub path: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl Field {
    pub fn new(path: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            path: path.into(),
            field_type,
        }
    }
}

/// One end of a connection: a field on a particular source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    pub id: SourceId,
    pub field: String,
    pub field_type: FieldType,
}

impl FieldRef {
    pub fn new(id: SourceId, field: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            id,
            field: field.into(),
            field_type,
        }
    }
}

/// Directed binding from a response field of one source to an update field of another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mapping {
    pub source_id: SourceId,
    pub source_field: String,
    pub source_type: FieldType,
    pub target_id: SourceId,
    pub target_field: String,
    pub target_type: FieldType,
}

impl Mapping {
    pub fn key(&self) -> MappingKey {
        MappingKey::new(self.source_id, self.target_id)
    }

    pub fn connection_id(&self) -> String {
        connection_id(&self.key(), &self.source_field, &self.target_field)
    }
}

/// Bucket key: the (source, target) pair a group of mappings shares.
///
/// Displayed and serialized as `"<source>-><target>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MappingKey {
    pub source: SourceId,
    pub target: SourceId,
}

impl MappingKey {
    pub fn new(source: SourceId, target: SourceId) -> Self {
        Self { source, target }
    }

    /// Whether either half of the key refers to `id`.
    pub fn involves(&self, id: SourceId) -> bool {
        self.source == id || self.target == id
    }
}

impl fmt::Display for MappingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.source, self.target)
    }
}

impl FromStr for MappingKey {
    type Err = IntegratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || IntegratorError::InvalidMappingKey(s.to_string());
        let (source, target) = s.split_once("->").ok_or_else(invalid)?;
        let source = source.trim().parse().map_err(|_| invalid())?;
        let target = target.trim().parse().map_err(|_| invalid())?;
        Ok(MappingKey { source, target })
    }
}

impl Serialize for MappingKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MappingKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Identity of a single mapping in the connection list: `key|sourceField|targetField`.
pub fn connection_id(key: &MappingKey, source_field: &str, target_field: &str) -> String {
    format!("{key}|{source_field}|{target_field}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_key_display_and_parse() {
        let key = MappingKey::new(17, 42);
        assert_eq!(key.to_string(), "17->42");
        assert_eq!("17->42".parse::<MappingKey>().unwrap(), key);
        assert!("17-42".parse::<MappingKey>().is_err());
        assert!("a->2".parse::<MappingKey>().is_err());
    }

    #[test]
    fn test_mapping_key_serializes_as_string() {
        let key = MappingKey::new(1, 2);
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"1->2\"");
        let back: MappingKey = serde_json::from_str("\"1->2\"").unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn test_source_from_patch_requires_name() {
        let err = Source::from_patch(1, SourcePatch::default()).unwrap_err();
        assert!(err.is_validation());

        let blank = SourcePatch {
            name: Some("   ".to_string()),
            kind: Some(SourceKind::Api),
            ..Default::default()
        };
        assert!(Source::from_patch(1, blank).is_err());
    }

    #[test]
    fn test_source_from_patch_requires_type() {
        let patch = SourcePatch {
            name: Some("CRM".to_string()),
            ..Default::default()
        };
        assert!(Source::from_patch(1, patch).unwrap_err().is_validation());
    }

    #[test]
    fn test_apply_retains_unspecified_fields() {
        let mut source = Source::from_patch(
            1,
            SourcePatch {
                receive_endpoint: Some("https://a/x".to_string()),
                update_endpoint: Some("https://a/y".to_string()),
                ..SourcePatch::api("A")
            },
        )
        .unwrap();

        source.apply(SourcePatch {
            update_method: Some(UpdateMethod::Put),
            ..Default::default()
        });

        assert_eq!(source.name, "A");
        assert_eq!(source.receive_url(), Some("https://a/x"));
        assert_eq!(source.update_url(), Some("https://a/y"));
        assert_eq!(source.update_method, UpdateMethod::Put);
    }

    #[test]
    fn test_blank_endpoints_are_not_configured() {
        let source = Source::from_patch(
            1,
            SourcePatch {
                receive_endpoint: Some("   ".to_string()),
                ..SourcePatch::api("Blank")
            },
        )
        .unwrap();
        assert!(source.receive_url().is_none());
        assert!(source.is_inert());
    }

    #[test]
    fn test_header_pairs_lenient() {
        assert!(header_pairs(Some("{bad")).is_empty());
        assert!(header_pairs(Some("[1,2]")).is_empty());
        assert!(header_pairs(None).is_empty());

        let pairs = header_pairs(Some(r#"{"Authorization":"Bearer t","X-Retry":3}"#));
        assert_eq!(
            pairs,
            vec![
                ("Authorization".to_string(), "Bearer t".to_string()),
                ("X-Retry".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn test_receive_body_only_for_post() {
        let mut source = Source::from_patch(1, SourcePatch::api("A")).unwrap();
        assert!(source.receive_body().is_none());

        source.receive_method = ReceiveMethod::Post;
        assert_eq!(source.receive_body(), Some(json!({})));

        source.receive_payload = Some(r#"{"page":2}"#.to_string());
        assert_eq!(source.receive_body(), Some(json!({"page": 2})));
    }

    #[test]
    fn test_source_serializes_camel_case() {
        let source = Source::from_patch(
            7,
            SourcePatch {
                receive_endpoint: Some("https://a/x".to_string()),
                ..SourcePatch::api("A")
            },
        )
        .unwrap();
        let value = serde_json::to_value(&source).unwrap();
        assert_eq!(value["type"], "API");
        assert_eq!(value["receiveEndpoint"], "https://a/x");
        assert_eq!(value["receiveMethod"], "GET");
        assert_eq!(value["updateMethod"], "POST");
    }

    #[test]
    fn test_field_type_unknown_tag_reads_as_other() {
        let t: FieldType = serde_json::from_str("\"undefined\"").unwrap();
        assert_eq!(t, FieldType::Other);
        assert_eq!(FieldType::of(&Value::Null), FieldType::Object);
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("post".parse::<ReceiveMethod>().unwrap(), ReceiveMethod::Post);
        assert_eq!("Patch".parse::<UpdateMethod>().unwrap(), UpdateMethod::Patch);
        assert!("DELETE".parse::<UpdateMethod>().is_err());
    }
}
