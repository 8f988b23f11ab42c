//! Tool abstraction types shared by the registry, the built-in tools and any
//! backend that wants to describe tools to a model.

use crate::error::AppError;
use crate::scope::CallScope;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Parameters passed into a tool, and the result map it hands back.
pub type ParamMap = BTreeMap<String, ParamValue>;

// ============================================================================
// Parameter values
// ============================================================================

/// The closed set of values a tool parameter can carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    String(String),
    List(Vec<ParamValue>),
    Map(BTreeMap<String, ParamValue>),
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ParamValue]> {
        match self {
            ParamValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Bool(_) => "bool",
            ParamValue::Int(_) => "int",
            ParamValue::String(_) => "string",
            ParamValue::List(_) => "array",
            ParamValue::Map(_) => "map",
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::String(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::String(s)
    }
}

impl From<i64> for ParamValue {
    fn from(n: i64) -> Self {
        ParamValue::Int(n)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(items: Vec<T>) -> Self {
        ParamValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<ParamValue> for Value {
    fn from(v: ParamValue) -> Self {
        match v {
            ParamValue::Bool(b) => Value::Bool(b),
            ParamValue::Int(n) => Value::from(n),
            ParamValue::String(s) => Value::String(s),
            ParamValue::List(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            ParamValue::Map(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl TryFrom<Value> for ParamValue {
    type Error = AppError;

    /// Null and floating point numbers have no parameter representation.
    fn try_from(v: Value) -> Result<Self, Self::Error> {
        match v {
            Value::Bool(b) => Ok(ParamValue::Bool(b)),
            Value::String(s) => Ok(ParamValue::String(s)),
            Value::Number(n) => n
                .as_i64()
                .map(ParamValue::Int)
                .ok_or_else(|| AppError::invalid_params(format!("unsupported number: {}", n))),
            Value::Array(items) => items
                .into_iter()
                .map(ParamValue::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map(ParamValue::List),
            Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| ParamValue::try_from(v).map(|v| (k, v)))
                .collect::<Result<BTreeMap<_, _>, _>>()
                .map(ParamValue::Map),
            Value::Null => Err(AppError::invalid_params("null is not a valid parameter value")),
        }
    }
}

/// Convert a JSON object into a parameter map.
pub fn params_from_json(v: Value) -> Result<ParamMap, AppError> {
    match v {
        Value::Object(map) => map
            .into_iter()
            .map(|(k, v)| ParamValue::try_from(v).map(|v| (k, v)))
            .collect(),
        Value::Null => Ok(ParamMap::new()),
        other => Err(AppError::invalid_params(format!(
            "parameters must be a JSON object, got {}",
            other
        ))),
    }
}

/// Convert a tool result into a JSON object map for response data.
pub fn params_to_json(params: ParamMap) -> serde_json::Map<String, Value> {
    params.into_iter().map(|(k, v)| (k, Value::from(v))).collect()
}

// ============================================================================
// Schema
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    String,
    Int,
    Bool,
    Array,
    Enum,
}

impl ParamKind {
    /// Enum values travel as strings; membership is checked separately.
    pub fn accepts(&self, value: &ParamValue) -> bool {
        matches!(
            (self, value),
            (ParamKind::String, ParamValue::String(_))
                | (ParamKind::Enum, ParamValue::String(_))
                | (ParamKind::Int, ParamValue::Int(_))
                | (ParamKind::Bool, ParamValue::Bool(_))
                | (ParamKind::Array, ParamValue::List(_))
        )
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParamKind::String => "string",
            ParamKind::Int => "int",
            ParamKind::Bool => "bool",
            ParamKind::Array => "array",
            ParamKind::Enum => "enum",
        };
        f.write_str(s)
    }
}

/// One declared parameter of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ParamValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed: Vec<String>,
}

impl ParamSpec {
    pub fn new(name: &str, kind: ParamKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: false,
            description: String::new(),
            default: None,
            allowed: Vec::new(),
        }
    }

    pub fn string(name: &str) -> Self {
        Self::new(name, ParamKind::String)
    }

    pub fn int(name: &str) -> Self {
        Self::new(name, ParamKind::Int)
    }

    pub fn bool(name: &str) -> Self {
        Self::new(name, ParamKind::Bool)
    }

    pub fn array(name: &str) -> Self {
        Self::new(name, ParamKind::Array)
    }

    pub fn enumeration<I, S>(name: &str, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut spec = Self::new(name, ParamKind::Enum);
        spec.allowed = allowed.into_iter().map(Into::into).collect();
        spec
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_default(mut self, value: impl Into<ParamValue>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// Name, description and schema of a registered tool, for diagnostics and
/// for backends that advertise tools to a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub schema: Vec<ParamSpec>,
}

// ============================================================================
// Tool trait
// ============================================================================

/// A named capability with a declared parameter schema.
///
/// `execute` runs on its own task. The scope it receives carries a
/// cancellation token that fires when the registry gives up on the call;
/// long-running bodies should select on `scope.cancelled()`.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Unique name used for lookup and dispatch.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Declared parameters, in order.
    fn schema(&self) -> Vec<ParamSpec>;

    /// Run the tool. `params` has already been validated against `schema()`.
    async fn execute(&self, scope: &CallScope, params: ParamMap) -> Result<ParamMap, AppError>;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            schema: self.schema(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_params_from_json_object() {
        let params = params_from_json(json!({
            "text": "hi",
            "count": 3,
            "loud": true,
            "tags": ["a", "b"],
            "nested": {"k": "v"}
        }))
        .unwrap();
        assert_eq!(params["text"], ParamValue::from("hi"));
        assert_eq!(params["count"].as_i64(), Some(3));
        assert_eq!(params["loud"].as_bool(), Some(true));
        assert_eq!(params["tags"].as_list().map(|l| l.len()), Some(2));
        assert_eq!(params["nested"].type_name(), "map");
    }

    #[test]
    fn test_params_from_json_rejects_floats_and_null() {
        assert!(params_from_json(json!({"x": 1.5})).is_err());
        assert!(params_from_json(json!({"x": null})).is_err());
        assert!(params_from_json(json!("not an object")).is_err());
        assert!(params_from_json(Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_params_to_json() {
        let mut params = ParamMap::new();
        params.insert("text".into(), "hi".into());
        params.insert("tags".into(), vec!["a", "b"].into());
        let json = Value::Object(params_to_json(params));
        assert_eq!(json, json!({"text": "hi", "tags": ["a", "b"]}));
    }

    #[test]
    fn test_kind_accepts() {
        assert!(ParamKind::String.accepts(&"x".into()));
        assert!(ParamKind::Enum.accepts(&"x".into()));
        assert!(ParamKind::Int.accepts(&5i64.into()));
        assert!(!ParamKind::Int.accepts(&"5".into()));
        assert!(!ParamKind::Bool.accepts(&ParamValue::Int(1)));
        assert!(ParamKind::Array.accepts(&vec![1i64].into()));
    }

    #[test]
    fn test_param_spec_builders() {
        let spec = ParamSpec::enumeration("mode", ["fast", "slow"])
            .required()
            .describe("speed")
            .with_default("fast");
        assert_eq!(spec.kind, ParamKind::Enum);
        assert!(spec.required);
        assert_eq!(spec.allowed, vec!["fast", "slow"]);
        assert_eq!(spec.default, Some(ParamValue::from("fast")));
    }

    #[test]
    fn test_untagged_deserialize_order() {
        let v: ParamValue = serde_json::from_str("true").unwrap();
        assert_eq!(v, ParamValue::Bool(true));
        let v: ParamValue = serde_json::from_str("42").unwrap();
        assert_eq!(v, ParamValue::Int(42));
        let v: ParamValue = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(v, ParamValue::String("42".into()));
    }
}
