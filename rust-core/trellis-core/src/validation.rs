//! # Validation Module
//!
//! Structured field errors produced while binding action parameters.
//! A failed binding surfaces as a 400 response listing every offending
//! parameter, not just the first one.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Error code for categorizing binding failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    /// Required parameter is missing from its source
    Required,
    /// Value cannot be cast to the declared type
    InvalidType,
    /// Value has the right type but unusable content (e.g. malformed JSON)
    InvalidFormat,
    /// Custom validation failed
    Custom,
}

/// A single validation error for a specific parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Parameter name (e.g., "id", "payload.email")
    pub field: String,
    /// Human-readable error message
    pub message: String,
    /// Machine-readable error code
    pub code: ValidationCode,
}

impl FieldError {
    /// Create a new field error
    pub fn new(field: impl Into<String>, message: impl Into<String>, code: ValidationCode) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code,
        }
    }

    /// Create a "required parameter" error
    pub fn required(field: impl Into<String>) -> Self {
        let field_str = field.into();
        Self {
            message: format!("{field_str} is required"),
            field: field_str,
            code: ValidationCode::Required,
        }
    }

    /// Create an "invalid type" error
    pub fn invalid_type(field: impl Into<String>, expected: &str) -> Self {
        let field_str = field.into();
        Self {
            message: format!("{field_str} must be {expected}"),
            field: field_str,
            code: ValidationCode::InvalidType,
        }
    }

    /// Create an "invalid format" error
    pub fn invalid_format(field: impl Into<String>, reason: &str) -> Self {
        let field_str = field.into();
        Self {
            message: format!("{field_str} is malformed: {reason}"),
            field: field_str,
            code: ValidationCode::InvalidFormat,
        }
    }
}

/// Collection of validation errors
///
/// Allows aggregating multiple field errors for a single request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    /// List of field-level errors
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// Create an empty error collection
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field error
    pub fn add(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    /// Add a required field error
    pub fn add_required(&mut self, field: impl Into<String>) {
        self.add(FieldError::required(field));
    }

    /// Check if there are any errors
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Get the number of errors
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Names of the offending parameters, in the order they failed
    #[must_use]
    pub fn fields(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.field.as_str()).collect()
    }

    /// Convert to JSON response body
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"errors":[]}"#.to_string())
    }

    /// Group errors by field
    #[must_use]
    pub fn by_field(&self) -> HashMap<String, Vec<&FieldError>> {
        let mut map: HashMap<String, Vec<&FieldError>> = HashMap::new();
        for error in &self.errors {
            map.entry(error.field.clone()).or_default().push(error);
        }
        map
    }

    /// `Ok(value)` when empty, otherwise the collected errors
    ///
    /// # Errors
    ///
    /// Returns `self` when at least one field failed.
    pub fn into_result<T>(self, value: T) -> ValidationResult<T> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.errors.iter().map(|e| e.message.as_str()).collect();
        write!(f, "{}", messages.join("; "))
    }
}

/// Result type for validation operations
pub type ValidationResult<T> = std::result::Result<T, ValidationErrors>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_error_required() {
        let error = FieldError::required("id");
        assert_eq!(error.field, "id");
        assert_eq!(error.code, ValidationCode::Required);
        assert!(error.message.contains("required"));
    }

    #[test]
    fn test_validation_errors_add() {
        let mut errors = ValidationErrors::new();
        assert!(errors.is_empty());

        errors.add_required("id");
        errors.add(FieldError::invalid_type("page", "int"));

        assert_eq!(errors.len(), 2);
        assert_eq!(errors.fields(), vec!["id", "page"]);
    }

    #[test]
    fn test_validation_errors_json() {
        let mut errors = ValidationErrors::new();
        errors.add_required("email");

        let json = errors.to_json();
        assert!(json.contains("email"));
        assert!(json.contains("REQUIRED"));
    }

    #[test]
    fn test_display_joins_messages() {
        let mut errors = ValidationErrors::new();
        errors.add_required("id");
        errors.add(FieldError::invalid_type("page", "int"));
        assert_eq!(errors.to_string(), "id is required; page must be int");
    }

    #[test]
    fn test_by_field() {
        let mut errors = ValidationErrors::new();
        errors.add(FieldError::required("email"));
        errors.add(FieldError::invalid_format("email", "bad json"));
        errors.add(FieldError::required("name"));

        let grouped = errors.by_field();
        assert_eq!(grouped.get("email").map(Vec::len), Some(2));
        assert_eq!(grouped.get("name").map(Vec::len), Some(1));
    }

    #[test]
    fn test_into_result() {
        assert_eq!(ValidationErrors::new().into_result(5), Ok(5));
        let mut errors = ValidationErrors::new();
        errors.add_required("x");
        assert!(errors.into_result(5).is_err());
    }
}
