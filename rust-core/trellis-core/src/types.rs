//! # Parameter Type System
//!
//! Declared parameter types, the tagged value union every capture and bound
//! argument is expressed in, and the cast rules between them.
//!
//! ## Cast policy
//!
//! Casts are strict: `"abc"` never becomes `0`. A failed cast yields `None`
//! and the binder decides whether that is a 400 (required parameter) or a
//! fallback to the declared default (optional parameter).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Declared parameter types
///
/// Used in typed placeholders (`{id:int}`) and in `ParamSpec`.
/// Default is `String`; unknown specifiers also map to `String`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// String type (default) - no conversion
    #[default]
    String,
    /// Integer type - parses to i64
    #[serde(alias = "integer", alias = "i64")]
    Int,
    /// Float type - parses to f64
    #[serde(alias = "double", alias = "f64", alias = "number")]
    Float,
    /// Boolean type - parses "true"/"false", "1"/"0", "yes"/"no", "on"/"off"
    #[serde(alias = "boolean")]
    Bool,
    /// List of values
    #[serde(alias = "list")]
    Array,
    /// String-keyed map of values
    #[serde(alias = "map")]
    Object,
    /// Any value, passed through unchanged
    #[serde(alias = "any")]
    Mixed,
}

impl ParamType {
    /// Parse type specifier from route pattern (e.g., "int" from "{id:int}")
    #[must_use]
    pub fn from_specifier(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "int" | "integer" | "i64" => Self::Int,
            "float" | "double" | "f64" | "number" => Self::Float,
            "bool" | "boolean" => Self::Bool,
            "array" | "list" => Self::Array,
            "object" | "map" => Self::Object,
            "mixed" | "any" => Self::Mixed,
            _ => Self::String,
        }
    }

    /// Get the type name for error messages
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Array => "array",
            Self::Object => "object",
            Self::Mixed => "mixed",
        }
    }

    /// Whether values of this type are structured rather than scalar
    #[must_use]
    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Array | Self::Object | Self::Mixed)
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Typed parameter value
///
/// Captures start out as `String`/`List` and are cast by the binder
/// according to the parameter's declared type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Absent value
    #[default]
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (i64)
    Int(i64),
    /// Float value (f64)
    Float(f64),
    /// String value
    String(String),
    /// Ordered list, e.g. a catch-all capture
    List(Vec<ParamValue>),
    /// String-keyed map, e.g. a JSON body
    Object(BTreeMap<String, ParamValue>),
}

impl ParamValue {
    /// Render the value as text
    ///
    /// Lists are joined with `/` so a catch-all renders back into a path.
    #[must_use]
    pub fn as_string(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::String(s) => s.clone(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Bool(b) => b.to_string(),
            Self::List(items) => items
                .iter()
                .map(Self::as_string)
                .collect::<Vec<_>>()
                .join("/"),
            Self::Object(_) => serde_json::to_string(self).unwrap_or_default(),
        }
    }

    /// Check if value is null
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Check if value is a string
    #[must_use]
    pub fn is_string(&self) -> bool {
        matches!(self, Self::String(_))
    }

    /// Borrow as str if String variant
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as i64 if Int variant
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as f64 if Float variant
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get as bool if Bool variant
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Borrow the items if List variant
    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow the map if Object variant
    #[must_use]
    pub fn as_object(&self) -> Option<&BTreeMap<String, Self>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for ParamValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or(Self::Null),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// Convert raw string to typed value based on `ParamType`
///
/// Returns `None` when the text is not a valid value of that type.
#[must_use]
pub fn convert_param(raw: &str, param_type: ParamType) -> Option<ParamValue> {
    coerce(&ParamValue::String(raw.to_string()), param_type)
}

/// Cast a value to the declared type
///
/// Order of cast rules: int, bool, float, array, object, mixed, then string.
#[must_use]
pub fn coerce(value: &ParamValue, param_type: ParamType) -> Option<ParamValue> {
    match param_type {
        ParamType::Int => to_int(value).map(ParamValue::Int),
        ParamType::Bool => to_bool(value).map(ParamValue::Bool),
        ParamType::Float => to_float(value).map(ParamValue::Float),
        ParamType::Array => to_array(value),
        ParamType::Object => to_object(value),
        ParamType::Mixed => Some(value.clone()),
        ParamType::String => match value {
            ParamValue::Object(_) => None,
            other => Some(ParamValue::String(other.as_string())),
        },
    }
}

#[allow(clippy::cast_possible_truncation)]
fn to_int(value: &ParamValue) -> Option<i64> {
    match value {
        ParamValue::Int(i) => Some(*i),
        ParamValue::Bool(b) => Some(i64::from(*b)),
        ParamValue::String(s) => s.trim().parse::<i64>().ok(),
        ParamValue::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
        _ => None,
    }
}

fn to_bool(value: &ParamValue) -> Option<bool> {
    match value {
        ParamValue::Bool(b) => Some(*b),
        ParamValue::Int(0) => Some(false),
        ParamValue::Int(1) => Some(true),
        ParamValue::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[allow(clippy::cast_precision_loss)]
fn to_float(value: &ParamValue) -> Option<f64> {
    match value {
        ParamValue::Float(f) => Some(*f),
        ParamValue::Int(i) => Some(*i as f64),
        ParamValue::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn to_array(value: &ParamValue) -> Option<ParamValue> {
    match value {
        ParamValue::List(_) => Some(value.clone()),
        ParamValue::Object(_) | ParamValue::Null => None,
        ParamValue::String(s) if s.trim_start().starts_with('[') => {
            match serde_json::from_str::<serde_json::Value>(s) {
                Ok(json @ serde_json::Value::Array(_)) => Some(ParamValue::from(json)),
                _ => None,
            }
        }
        scalar => Some(ParamValue::List(vec![scalar.clone()])),
    }
}

fn to_object(value: &ParamValue) -> Option<ParamValue> {
    match value {
        ParamValue::Object(_) => Some(value.clone()),
        ParamValue::String(s) => match serde_json::from_str::<serde_json::Value>(s) {
            Ok(json @ serde_json::Value::Object(_)) => Some(ParamValue::from(json)),
            _ => None,
        },
        _ => None,
    }
}

/// Where a parameter's value is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingSource {
    /// Route captures and reserved tokens (default)
    #[default]
    Route,
    /// Query string
    Query,
    /// Request header
    Header,
    /// Request body (JSON or text)
    Body,
    /// Service registry
    Services,
    /// `application/x-www-form-urlencoded` body
    Form,
}

impl fmt::Display for BindingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Route => "route",
            Self::Query => "query",
            Self::Header => "header",
            Self::Body => "body",
            Self::Services => "services",
            Self::Form => "form",
        };
        f.write_str(name)
    }
}

/// Binding declaration for one action parameter
///
/// Plain data: it is persisted verbatim in the route cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Parameter name, also the default lookup key
    pub name: String,
    /// Declared type
    #[serde(rename = "type", default)]
    pub ty: ParamType,
    /// Binding source
    #[serde(default)]
    pub source: BindingSource,
    /// May be absent
    #[serde(default)]
    pub optional: bool,
    /// May be null
    #[serde(default)]
    pub nullable: bool,
    /// Value used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ParamValue>,
    /// Lookup key in the source when it differs from `name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl ParamSpec {
    /// Create a parameter bound from the given source
    pub fn new(name: impl Into<String>, ty: ParamType, source: BindingSource) -> Self {
        Self {
            name: name.into(),
            ty,
            source,
            optional: false,
            nullable: false,
            default: None,
            key: None,
        }
    }

    /// Route-bound parameter
    pub fn route(name: impl Into<String>, ty: ParamType) -> Self {
        Self::new(name, ty, BindingSource::Route)
    }

    /// Query-bound parameter
    pub fn query(name: impl Into<String>, ty: ParamType) -> Self {
        Self::new(name, ty, BindingSource::Query)
    }

    /// Header-bound parameter
    pub fn header(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::String, BindingSource::Header)
    }

    /// Body-bound parameter
    pub fn body(name: impl Into<String>, ty: ParamType) -> Self {
        Self::new(name, ty, BindingSource::Body)
    }

    /// Form-field parameter
    pub fn form(name: impl Into<String>, ty: ParamType) -> Self {
        Self::new(name, ty, BindingSource::Form)
    }

    /// Service resolved from the registry
    pub fn service(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Mixed, BindingSource::Services)
    }

    /// Mark as optional
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Mark as nullable
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Set the value used when absent
    #[must_use]
    pub fn with_default(mut self, value: impl Into<ParamValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Read from a differently named key in the source
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Key used to look the value up in its source
    #[must_use]
    pub fn lookup_key(&self) -> &str {
        self.key.as_deref().unwrap_or(&self.name)
    }

    /// Absence is an error
    #[must_use]
    pub fn is_required(&self) -> bool {
        !self.optional && !self.nullable && self.default.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_type_from_specifier() {
        assert_eq!(ParamType::from_specifier("int"), ParamType::Int);
        assert_eq!(ParamType::from_specifier("INT"), ParamType::Int);
        assert_eq!(ParamType::from_specifier("integer"), ParamType::Int);
        assert_eq!(ParamType::from_specifier("float"), ParamType::Float);
        assert_eq!(ParamType::from_specifier("bool"), ParamType::Bool);
        assert_eq!(ParamType::from_specifier("array"), ParamType::Array);
        assert_eq!(ParamType::from_specifier("unknown"), ParamType::String);
    }

    #[test]
    fn test_convert_int() {
        assert_eq!(convert_param("123", ParamType::Int), Some(ParamValue::Int(123)));
        assert_eq!(convert_param("-456", ParamType::Int), Some(ParamValue::Int(-456)));
    }

    #[test]
    fn test_convert_int_is_strict() {
        assert_eq!(convert_param("abc", ParamType::Int), None);
        assert_eq!(convert_param("12abc", ParamType::Int), None);
        assert_eq!(convert_param("", ParamType::Int), None);
    }

    #[test]
    fn test_convert_float() {
        assert_eq!(convert_param("2.5", ParamType::Float), Some(ParamValue::Float(2.5)));
        assert_eq!(convert_param("NaN", ParamType::Float), None);
    }

    #[test]
    fn test_convert_bool() {
        assert_eq!(convert_param("true", ParamType::Bool), Some(ParamValue::Bool(true)));
        assert_eq!(convert_param("OFF", ParamType::Bool), Some(ParamValue::Bool(false)));
        assert_eq!(convert_param("1", ParamType::Bool), Some(ParamValue::Bool(true)));
        assert_eq!(convert_param("maybe", ParamType::Bool), None);
    }

    #[test]
    fn test_coerce_array() {
        let list = ParamValue::List(vec!["a".into(), "b".into()]);
        assert_eq!(coerce(&list, ParamType::Array), Some(list.clone()));
        assert_eq!(
            coerce(&"solo".into(), ParamType::Array),
            Some(ParamValue::List(vec!["solo".into()]))
        );
        assert_eq!(
            convert_param("[1,2]", ParamType::Array),
            Some(ParamValue::List(vec![ParamValue::Int(1), ParamValue::Int(2)]))
        );
    }

    #[test]
    fn test_coerce_object() {
        let parsed = convert_param(r#"{"a":1}"#, ParamType::Object).unwrap();
        assert_eq!(
            parsed.as_object().and_then(|m| m.get("a")),
            Some(&ParamValue::Int(1))
        );
        assert_eq!(convert_param("[1]", ParamType::Object), None);
    }

    #[test]
    fn test_list_to_string_joins_path() {
        let list = ParamValue::List(vec!["docs".into(), "a.txt".into()]);
        assert_eq!(coerce(&list, ParamType::String), Some("docs/a.txt".into()));
    }

    #[test]
    fn test_param_value_as_string() {
        assert_eq!(ParamValue::Int(42).as_string(), "42");
        assert_eq!(ParamValue::Float(2.5).as_string(), "2.5");
        assert_eq!(ParamValue::Bool(true).as_string(), "true");
        assert_eq!(ParamValue::Null.as_string(), "");
    }

    #[test]
    fn test_param_value_from_json() {
        let value = ParamValue::from(serde_json::json!({"tags": ["a", 1], "ok": true}));
        let map = value.as_object().unwrap();
        assert_eq!(map.get("ok"), Some(&ParamValue::Bool(true)));
        assert_eq!(
            map.get("tags"),
            Some(&ParamValue::List(vec!["a".into(), ParamValue::Int(1)]))
        );
    }

    #[test]
    fn test_param_spec_requiredness() {
        assert!(ParamSpec::route("id", ParamType::Int).is_required());
        assert!(!ParamSpec::query("page", ParamType::Int).optional().is_required());
        assert!(!ParamSpec::query("page", ParamType::Int).with_default(1_i64).is_required());
        assert_eq!(ParamSpec::header("ua").with_key("user-agent").lookup_key(), "user-agent");
    }

    #[test]
    fn test_param_spec_serde_defaults() {
        let spec: ParamSpec = serde_json::from_str(r#"{"name":"id","type":"integer"}"#).unwrap();
        assert_eq!(spec.ty, ParamType::Int);
        assert_eq!(spec.source, BindingSource::Route);
        assert!(spec.is_required());
    }
}
