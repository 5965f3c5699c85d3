//! # JSON Module
//!
//! Request bodies are parsed with simd-json; responses and the route cache
//! are written with serde_json.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Parse a JSON string to a typed value using simd-json
///
/// # Errors
///
/// Returns `Error::MalformedJson` if parsing fails
pub fn parse_json<T: DeserializeOwned>(json_str: &str) -> Result<T> {
    let mut bytes = json_str.as_bytes().to_vec();
    parse_json_bytes(&mut bytes)
}

/// Parse JSON bytes in place using simd-json
///
/// simd-json rewrites the buffer while parsing; callers holding shared bytes
/// must copy first.
///
/// # Errors
///
/// Returns `Error::MalformedJson` if parsing fails
pub fn parse_json_bytes<T: DeserializeOwned>(bytes: &mut [u8]) -> Result<T> {
    simd_json::from_slice(bytes).map_err(|e| Error::MalformedJson {
        reason: e.to_string(),
    })
}

/// Serialize a value to a JSON string
///
/// # Errors
///
/// Returns `Error::Json` if the value cannot be represented as JSON
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Serialize a value to a pretty-printed JSON string
///
/// # Errors
///
/// Returns `Error::Json` if the value cannot be represented as JSON
pub fn to_json_pretty<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ParamValue;
    use serde::Deserialize;
    use std::collections::BTreeMap;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Payload {
        name: String,
        qty: i64,
    }

    #[test]
    fn test_parse_json_object() {
        let data: Payload = parse_json(r#"{"name": "lamp", "qty": 3}"#).unwrap();
        assert_eq!(data.name, "lamp");
        assert_eq!(data.qty, 3);
    }

    #[test]
    fn test_parse_json_into_param_values() {
        let map: BTreeMap<String, ParamValue> =
            parse_json(r#"{"tags": ["a", "b"], "price": 9.5, "gift": false}"#).unwrap();
        assert_eq!(map.get("gift"), Some(&ParamValue::Bool(false)));
        assert_eq!(map.get("tags").and_then(ParamValue::as_list).map(<[_]>::len), Some(2));
    }

    #[test]
    fn test_parse_json_bytes() {
        let mut bytes = br#"{"name": "desk", "qty": 1}"#.to_vec();
        let data: Payload = parse_json_bytes(&mut bytes).unwrap();
        assert_eq!(data.name, "desk");
    }

    #[test]
    fn test_to_json() {
        let json = to_json(&Payload {
            name: "chair".to_string(),
            qty: 4,
        })
        .unwrap();
        assert_eq!(json, r#"{"name":"chair","qty":4}"#);
        assert!(to_json_pretty(&ParamValue::Null).is_ok());
    }

    #[test]
    fn test_invalid_json() {
        let err = parse_json::<Payload>("not valid json").unwrap_err();
        assert_eq!(err.status(), 400);
        assert_eq!(err.code(), "MALFORMED_JSON");
    }
}
