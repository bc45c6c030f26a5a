//! Per-request caller input.
//!
//! [`RequestInput`] is the transport-neutral view of one inbound request:
//! the HTTP verb plus the merged query-string and body parameters. Lookups
//! accept dotted paths (`meta.title`) the same way validation rules do.

use std::collections::BTreeMap;

use http::Method;

use crate::types::Value;

/// Verb + parameters of one inbound request.
#[derive(Debug, Clone)]
pub struct RequestInput {
    method: Method,
    params: BTreeMap<String, Value>,
}

impl Default for RequestInput {
    fn default() -> Self {
        Self::new(Method::GET)
    }
}

impl RequestInput {
    #[must_use]
    pub fn new(method: Method) -> Self {
        Self {
            method,
            params: BTreeMap::new(),
        }
    }

    /// Builder-style parameter insertion.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Builds input from decoded query-string pairs and an optional JSON body.
    ///
    /// Body keys win over query-string keys of the same name. A non-object
    /// body is ignored.
    #[must_use]
    pub fn from_parts(
        method: Method,
        query: impl IntoIterator<Item = (String, String)>,
        body: Option<serde_json::Value>,
    ) -> Self {
        let mut input = Self::new(method);
        for (name, value) in query {
            input.params.insert(name, Value::String(value));
        }
        if let Some(serde_json::Value::Object(map)) = body {
            for (name, value) in map {
                input.params.insert(name, Value::from(value));
            }
        }
        input
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn is_method(&self, method: &Method) -> bool {
        &self.method == method
    }

    /// Looks up a parameter. Exact keys take precedence over dotted paths.
    #[must_use]
    pub fn input(&self, name: &str) -> Option<&Value> {
        if let Some(value) = self.params.get(name) {
            return Some(value);
        }
        let (head, rest) = name.split_once('.')?;
        self.params.get(head)?.get_path(rest)
    }

    /// Whether the parameter is present, even if null or empty.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.input(name).is_some()
    }

    /// Whether the parameter is present and not blank.
    #[must_use]
    pub fn filled(&self, name: &str) -> bool {
        self.input(name).is_some_and(|v| !v.is_blank())
    }

    /// Integer parameter with a default for absent or unparsable values.
    #[must_use]
    pub fn integer(&self, name: &str, default: i64) -> i64 {
        self.input(name).and_then(Value::as_i64).unwrap_or(default)
    }

    /// Text rendering of a parameter; empty when absent.
    #[must_use]
    pub fn string(&self, name: &str) -> String {
        self.input(name).map(Value::to_text).unwrap_or_default()
    }

    /// Inserts or replaces a top-level parameter.
    pub fn merge(&mut self, name: impl Into<String>, value: Value) {
        self.params.insert(name.into(), value);
    }

    #[must_use]
    pub fn params(&self) -> &BTreeMap<String, Value> {
        &self.params
    }
}

/// `true` when the input is absent or blank (see [`Value::is_blank`]).
#[must_use]
pub fn is_blank(value: Option<&Value>) -> bool {
    value.is_none_or(Value::is_blank)
}
