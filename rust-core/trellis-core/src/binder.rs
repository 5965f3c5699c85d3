//! # Parameter Binder
//!
//! Turns a matched route into typed action arguments. Every parameter is
//! read from exactly the source its [`ParamSpec`] names and cast to its
//! declared type.
//!
//! ## Failure policy
//!
//! - Missing required parameter: `REQUIRED` field error.
//! - Cast failure on a required parameter: `INVALID_TYPE` field error.
//!   There is no fallback to zero or an empty string.
//! - Optional and nullable parameters fall back to their default, else null.
//!
//! Field errors are collected for all parameters and reported together as
//! one 400 response. A missing required service is a server error instead.

use crate::error::{Error, Result};
use crate::json::parse_json_bytes;
use crate::matcher::RouteMatchContext;
use crate::request::Request;
use crate::services::Services;
use crate::types::{coerce, BindingSource, ParamSpec, ParamType, ParamValue};
use crate::validation::{FieldError, ValidationErrors};
use std::any::Any;
use std::cell::OnceCell;
use std::collections::HashMap;
use std::sync::Arc;

/// One bound argument
#[derive(Clone)]
pub enum Argument {
    /// Plain value
    Value(ParamValue),
    /// Service from the registry
    Service(Arc<dyn Any + Send + Sync>),
}

impl Argument {
    /// Borrow the value, if this is not a service
    #[must_use]
    pub fn as_value(&self) -> Option<&ParamValue> {
        match self {
            Self::Value(value) => Some(value),
            Self::Service(_) => None,
        }
    }
}

impl std::fmt::Debug for Argument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Service(_) => f.write_str("Service(..)"),
        }
    }
}

/// Bound arguments in declaration order
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    items: Vec<(String, Argument)>,
}

impl Arguments {
    /// Create an empty argument list
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an argument
    pub fn push(&mut self, name: impl Into<String>, argument: Argument) {
        self.items.push((name.into(), argument));
    }

    /// Argument by parameter name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Argument> {
        self.items.iter().find(|(n, _)| n == name).map(|(_, a)| a)
    }

    /// Plain value by parameter name
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&ParamValue> {
        self.get(name).and_then(Argument::as_value)
    }

    /// Integer argument
    #[must_use]
    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.value(name).and_then(ParamValue::as_int)
    }

    /// Float argument
    #[must_use]
    pub fn get_float(&self, name: &str) -> Option<f64> {
        self.value(name).and_then(ParamValue::as_float)
    }

    /// Boolean argument
    #[must_use]
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.value(name).and_then(ParamValue::as_bool)
    }

    /// String argument
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(ParamValue::as_str)
    }

    /// List argument
    #[must_use]
    pub fn get_list(&self, name: &str) -> Option<&[ParamValue]> {
        self.value(name).and_then(ParamValue::as_list)
    }

    /// Typed service argument
    #[must_use]
    pub fn service<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        match self.get(name)? {
            Argument::Service(service) => Arc::clone(service).downcast::<T>().ok(),
            Argument::Value(_) => None,
        }
    }

    /// Number of arguments
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if there are no arguments
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Argument)> {
        self.items.iter().map(|(n, a)| (n.as_str(), a))
    }
}

/// Bind every parameter of a matched route
///
/// # Errors
///
/// Returns `Error::Binding` with one field error per offending parameter,
/// or `Error::ServiceUnavailable` when a required service is not registered.
pub fn bind(
    params: &[ParamSpec],
    context: &RouteMatchContext,
    request: &Request,
    services: &Services,
) -> Result<Arguments> {
    let sources = Sources::new(context, request);
    let mut arguments = Arguments::new();
    let mut errors = ValidationErrors::new();

    for spec in params {
        if spec.source == BindingSource::Services {
            arguments.push(&spec.name, bind_service(spec, services)?);
            continue;
        }
        match sources.lookup(spec) {
            Ok(raw) => {
                if let Some(value) = resolve(spec, raw, &mut errors) {
                    arguments.push(&spec.name, Argument::Value(value));
                }
            }
            Err(error) => errors.add(error),
        }
    }

    errors.into_result(arguments).map_err(Error::Binding)
}

fn bind_service(spec: &ParamSpec, services: &Services) -> Result<Argument> {
    match services.get_any(spec.lookup_key()) {
        Some(service) => Ok(Argument::Service(service)),
        None if spec.optional || spec.nullable => Ok(Argument::Value(ParamValue::Null)),
        None => Err(Error::ServiceUnavailable {
            name: spec.lookup_key().to_string(),
        }),
    }
}

/// Cast a looked-up value, falling back per the failure policy
///
/// Returns `None` after recording a field error.
fn resolve(spec: &ParamSpec, raw: Option<ParamValue>, errors: &mut ValidationErrors) -> Option<ParamValue> {
    let fallback = || {
        spec.default
            .as_ref()
            .map_or(ParamValue::Null, |d| coerce(d, spec.ty).unwrap_or_else(|| d.clone()))
    };

    match raw {
        Some(ParamValue::Null) if spec.nullable => Some(ParamValue::Null),
        None | Some(ParamValue::Null) => {
            if spec.is_required() {
                errors.add_required(&spec.name);
                None
            } else {
                Some(fallback())
            }
        }
        Some(value) => match coerce(&value, spec.ty) {
            Some(cast) => Some(cast),
            None if spec.is_required() => {
                errors.add(FieldError::invalid_type(&spec.name, spec.ty.type_name()));
                None
            }
            None => Some(fallback()),
        },
    }
}

/// Request-side sources, parsed on first use
struct Sources<'a> {
    context: &'a RouteMatchContext,
    request: &'a Request,
    json: OnceCell<std::result::Result<ParamValue, String>>,
    form: OnceCell<HashMap<String, String>>,
}

impl<'a> Sources<'a> {
    fn new(context: &'a RouteMatchContext, request: &'a Request) -> Self {
        Self {
            context,
            request,
            json: OnceCell::new(),
            form: OnceCell::new(),
        }
    }

    fn lookup(&self, spec: &ParamSpec) -> std::result::Result<Option<ParamValue>, FieldError> {
        let key = spec.lookup_key();
        let value = match spec.source {
            BindingSource::Route => self.context.get(key).cloned(),
            BindingSource::Query => self.request.query(key).map(ParamValue::from),
            BindingSource::Header => self
                .request
                .header(key)
                .or_else(|| self.request.header(&key.replace('_', "-")))
                .map(ParamValue::from),
            BindingSource::Form if self.request.is_form() => self
                .form
                .get_or_init(|| self.request.form_map())
                .get(key)
                .map(|v| ParamValue::from(v.as_str())),
            BindingSource::Form => None,
            BindingSource::Body => return self.body(spec),
            BindingSource::Services => None,
        };
        Ok(value)
    }

    /// Whole body, or one field of a JSON object body when `key` is set
    fn body(&self, spec: &ParamSpec) -> std::result::Result<Option<ParamValue>, FieldError> {
        if self.request.body_bytes().is_none() {
            return Ok(None);
        }

        let wants_json = spec.key.is_some() || spec.ty.is_structured() || spec.ty == ParamType::Mixed;
        if !wants_json {
            return Ok(self.request.body_str().map(ParamValue::from));
        }

        match self.json() {
            Ok(document) => Ok(match &spec.key {
                Some(key) => document.as_object().and_then(|map| map.get(key)).cloned(),
                None => Some(document.clone()),
            }),
            Err(_) if spec.ty == ParamType::Mixed && spec.key.is_none() => {
                Ok(self.request.body_str().map(ParamValue::from))
            }
            Err(reason) => Err(FieldError::invalid_format(&spec.name, reason)),
        }
    }

    fn json(&self) -> std::result::Result<&ParamValue, &str> {
        self.json
            .get_or_init(|| {
                let mut bytes = self.request.body_bytes().unwrap_or_default().to_vec();
                parse_json_bytes::<ParamValue>(&mut bytes).map_err(|e| e.to_string())
            })
            .as_ref()
            .map_err(String::as_str)
    }
}
