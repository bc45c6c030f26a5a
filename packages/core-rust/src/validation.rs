//! Input validation against per-field rule lists.
//!
//! Rules come from an enumerated set and can be parsed from the familiar
//! pipe-separated notation (`"required|string|max:255"`). A [`Validator`]
//! checks a [`RequestInput`] against an ordered rule map and yields either
//! the validated data or a field-keyed [`ValidationErrors`] report.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Serialize;

use crate::input::RequestInput;
use crate::types::{Fields, RecordKey, Value};

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static email pattern")
});

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Uniqueness lookup backing the `unique` rule.
///
/// Implemented by record store adapters; `ignore` excludes the record being
/// updated from the check.
pub trait UniqueCheck: Send + Sync {
    /// Whether another record already holds `value` in `column`.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    fn exists(&self, column: &str, value: &Value, ignore: Option<&RecordKey>)
        -> anyhow::Result<bool>;
}

/// Caller-supplied rule: returns an error message on failure.
pub type CustomCheck = Arc<dyn Fn(&str, &Value) -> Result<(), String> + Send + Sync>;

/// `unique` rule bound to a lookup.
#[derive(Clone)]
pub struct UniqueRule {
    pub check: Arc<dyn UniqueCheck>,
    /// Column to check. `None` uses the field name.
    pub column: Option<String>,
    pub ignore: Option<RecordKey>,
}

impl fmt::Debug for UniqueRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UniqueRule")
            .field("column", &self.column)
            .field("ignore", &self.ignore)
            .finish_non_exhaustive()
    }
}

/// A single validation rule.
#[derive(Clone)]
pub enum Rule {
    Required,
    Nullable,
    String,
    Integer,
    Numeric,
    Boolean,
    Array,
    Email,
    Min(f64),
    Max(f64),
    In(Vec<String>),
    Regex(Regex),
    Unique(UniqueRule),
    Custom(CustomCheck),
}

impl Rule {
    /// Short name used for message lookup (`"field.rule"` / `"rule"`).
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Rule::Required => "required",
            Rule::Nullable => "nullable",
            Rule::String => "string",
            Rule::Integer => "integer",
            Rule::Numeric => "numeric",
            Rule::Boolean => "boolean",
            Rule::Array => "array",
            Rule::Email => "email",
            Rule::Min(_) => "min",
            Rule::Max(_) => "max",
            Rule::In(_) => "in",
            Rule::Regex(_) => "regex",
            Rule::Unique(_) => "unique",
            Rule::Custom(_) => "custom",
        }
    }

    /// Builds a closure-backed rule.
    pub fn custom(check: impl Fn(&str, &Value) -> Result<(), String> + Send + Sync + 'static) -> Self {
        Rule::Custom(Arc::new(check))
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Min(n) => write!(f, "Min({n})"),
            Rule::Max(n) => write!(f, "Max({n})"),
            Rule::In(options) => f.debug_tuple("In").field(options).finish(),
            Rule::Regex(re) => f.debug_tuple("Regex").field(&re.as_str()).finish(),
            Rule::Unique(rule) => f.debug_tuple("Unique").field(rule).finish(),
            other => f.write_str(other.name()),
        }
    }
}

/// Error parsing a pipe-separated rule string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleParseError {
    #[error("unknown validation rule: {0}")]
    Unknown(String),
    #[error("rule `{rule}` has an invalid argument: {argument}")]
    InvalidArgument { rule: String, argument: String },
}

impl FromStr for Rule {
    type Err = RuleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, arg) = match s.split_once(':') {
            Some((name, arg)) => (name.trim(), Some(arg)),
            None => (s.trim(), None),
        };
        let invalid = || RuleParseError::InvalidArgument {
            rule: name.to_string(),
            argument: arg.unwrap_or_default().to_string(),
        };
        let number = || arg.and_then(|a| a.trim().parse::<f64>().ok()).ok_or_else(invalid);

        match name {
            "required" => Ok(Rule::Required),
            "nullable" => Ok(Rule::Nullable),
            "string" => Ok(Rule::String),
            "integer" => Ok(Rule::Integer),
            "numeric" => Ok(Rule::Numeric),
            "boolean" => Ok(Rule::Boolean),
            "array" => Ok(Rule::Array),
            "email" => Ok(Rule::Email),
            "min" => Ok(Rule::Min(number()?)),
            "max" => Ok(Rule::Max(number()?)),
            "in" => {
                let options = arg.ok_or_else(invalid)?;
                Ok(Rule::In(options.split(',').map(str::to_string).collect()))
            }
            "regex" => {
                let raw = arg.ok_or_else(invalid)?;
                let pattern = raw
                    .strip_prefix('/')
                    .and_then(|p| p.strip_suffix('/'))
                    .unwrap_or(raw);
                Regex::new(pattern).map(Rule::Regex).map_err(|_| invalid())
            }
            other => Err(RuleParseError::Unknown(other.to_string())),
        }
    }
}

/// Ordered rule list for one field.
#[derive(Debug, Clone, Default)]
pub struct FieldRules(pub Vec<Rule>);

impl FieldRules {
    /// Parses `"required|string|max:255"`. Blank segments are skipped.
    ///
    /// Patterns containing `|` must be built with [`Rule::Regex`] directly.
    ///
    /// # Errors
    ///
    /// Returns the first segment that is not a known rule.
    pub fn parse(spec: &str) -> Result<Self, RuleParseError> {
        spec.split('|')
            .filter(|segment| !segment.trim().is_empty())
            .map(str::parse::<Rule>)
            .collect::<Result<Vec<_>, _>>()
            .map(FieldRules)
    }

    /// Appends a rule.
    #[must_use]
    pub fn with(mut self, rule: Rule) -> Self {
        self.0.push(rule);
        self
    }

    fn has(&self, name: &str) -> bool {
        self.0.iter().any(|rule| rule.name() == name)
    }

    fn is_numeric_context(&self) -> bool {
        self.has("numeric") || self.has("integer")
    }
}

impl From<Vec<Rule>> for FieldRules {
    fn from(rules: Vec<Rule>) -> Self {
        FieldRules(rules)
    }
}

impl From<Rule> for FieldRules {
    fn from(rule: Rule) -> Self {
        FieldRules(vec![rule])
    }
}

/// Extra validator configuration: custom messages and attribute names.
///
/// Message keys are `"field.rule"` (most specific) or `"rule"`. Messages may
/// reference `:attribute`.
#[derive(Debug, Clone, Default)]
pub struct ValidatorOptions {
    pub messages: BTreeMap<String, String>,
    pub attributes: BTreeMap<String, String>,
}

impl ValidatorOptions {
    #[must_use]
    pub fn message(mut self, key: impl Into<String>, message: impl Into<String>) -> Self {
        self.messages.insert(key.into(), message.into());
        self
    }

    #[must_use]
    pub fn attribute(mut self, field: impl Into<String>, name: impl Into<String>) -> Self {
        self.attributes.insert(field.into(), name.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Field-keyed validation failure report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    errors: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-message report.
    #[must_use]
    pub fn with_message(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.errors.get(field).map(Vec::as_slice)
    }

    #[must_use]
    pub fn fields(&self) -> Vec<&str> {
        self.errors.keys().map(String::as_str).collect()
    }

    /// First message in field order, used as the summary line.
    #[must_use]
    pub fn first_message(&self) -> Option<&str> {
        self.errors.values().flatten().next().map(String::as_str)
    }

    #[must_use]
    pub fn as_map(&self) -> &BTreeMap<String, Vec<String>> {
        &self.errors
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = self.fields().join(", ");
        write!(f, "validation failed for: {fields}")
    }
}

impl std::error::Error for ValidationErrors {}

/// Why [`Validator::validate`] rejected the input.
#[derive(Debug, thiserror::Error)]
pub enum ValidateError {
    /// One or more rules failed; the report is keyed by field.
    #[error(transparent)]
    Invalid(#[from] ValidationErrors),

    /// A rule could not be evaluated because its backing lookup failed.
    #[error("validation lookup failed: {0}")]
    Store(#[source] anyhow::Error),
}

/// Outcome of a single failed rule.
enum RuleFailure {
    Message(String),
    Store(anyhow::Error),
}

impl From<String> for RuleFailure {
    fn from(message: String) -> Self {
        RuleFailure::Message(message)
    }
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

/// Checks input against an ordered `(field, rules)` list.
pub struct Validator<'a> {
    rules: &'a [(String, FieldRules)],
    options: &'a ValidatorOptions,
}

impl<'a> Validator<'a> {
    #[must_use]
    pub fn new(rules: &'a [(String, FieldRules)], options: &'a ValidatorOptions) -> Self {
        Self { rules, options }
    }

    /// Validates `input`, returning only the fields that carry rules and
    /// are present. Dotted rule keys produce nested maps.
    ///
    /// # Errors
    ///
    /// Returns [`ValidateError::Invalid`] with every failing rule message,
    /// keyed by field, or [`ValidateError::Store`] as soon as a uniqueness
    /// lookup fails.
    pub fn validate(&self, input: &RequestInput) -> Result<Fields, ValidateError> {
        let mut data = Fields::new();
        let mut errors = ValidationErrors::new();

        for (field, rules) in self.rules {
            let value = input.input(field);
            let required = rules.has("required");

            let Some(value) = value else {
                if required {
                    errors.add(field, self.message(field, &Rule::Required));
                }
                continue;
            };

            if value.is_blank() {
                if required {
                    errors.add(field, self.message(field, &Rule::Required));
                    continue;
                }
                if rules.has("nullable") || matches!(value, Value::String(_)) {
                    set_path(&mut data, field, value.clone());
                    continue;
                }
            }

            let before = errors.get(field).map_or(0, <[String]>::len);
            for rule in &rules.0 {
                match self.check(field, rule, rules, value) {
                    Ok(()) => {}
                    Err(RuleFailure::Message(message)) => errors.add(field, message),
                    Err(RuleFailure::Store(err)) => return Err(ValidateError::Store(err)),
                }
            }
            if errors.get(field).map_or(0, <[String]>::len) == before {
                set_path(&mut data, field, value.clone());
            }
        }

        if errors.is_empty() {
            Ok(data)
        } else {
            Err(ValidateError::Invalid(errors))
        }
    }

    fn check(&self, field: &str, rule: &Rule, rules: &FieldRules, value: &Value) -> Result<(), RuleFailure> {
        let passes = match rule {
            Rule::Required | Rule::Nullable => true,
            Rule::String => matches!(value, Value::String(_)),
            Rule::Integer => value.as_i64().is_some(),
            Rule::Numeric => value.as_f64().is_some(),
            Rule::Boolean => matches!(
                value,
                Value::Bool(_) | Value::Int(0 | 1)
            ) || matches!(value.as_str(), Some("0" | "1" | "true" | "false")),
            Rule::Array => matches!(value, Value::Array(_) | Value::Map(_)),
            Rule::Email => value.as_str().is_some_and(|s| EMAIL.is_match(s)),
            Rule::Min(min) => size_of(value, rules).is_some_and(|size| size >= *min),
            Rule::Max(max) => size_of(value, rules).is_some_and(|size| size <= *max),
            Rule::In(options) => {
                let text = value.to_text();
                options.iter().any(|option| *option == text)
            }
            Rule::Regex(re) => value.as_str().is_some_and(|s| re.is_match(s)),
            Rule::Unique(unique) => {
                let column = unique.column.as_deref().unwrap_or(field);
                match unique.check.exists(column, value, unique.ignore.as_ref()) {
                    Ok(taken) => !taken,
                    Err(err) => {
                        tracing::warn!(field, error = %err, "unique lookup failed");
                        return Err(RuleFailure::Store(err));
                    }
                }
            }
            Rule::Custom(check) => return check(field, value).map_err(RuleFailure::from),
        };
        if passes {
            Ok(())
        } else {
            Err(RuleFailure::Message(self.message(field, rule)))
        }
    }

    fn attribute(&self, field: &str) -> String {
        self.options
            .attributes
            .get(field)
            .cloned()
            .unwrap_or_else(|| field.replace('_', " "))
    }

    fn message(&self, field: &str, rule: &Rule) -> String {
        let attribute = self.attribute(field);
        let custom = self
            .options
            .messages
            .get(&format!("{field}.{}", rule.name()))
            .or_else(|| self.options.messages.get(rule.name()));
        if let Some(template) = custom {
            return template.replace(":attribute", &attribute);
        }
        match rule {
            Rule::Required => format!("The {attribute} field is required."),
            Rule::String => format!("The {attribute} field must be a string."),
            Rule::Integer => format!("The {attribute} field must be an integer."),
            Rule::Numeric => format!("The {attribute} field must be a number."),
            Rule::Boolean => format!("The {attribute} field must be true or false."),
            Rule::Array => format!("The {attribute} field must be an array."),
            Rule::Email => format!("The {attribute} field must be a valid email address."),
            Rule::Min(min) => format!("The {attribute} field must be at least {min}."),
            Rule::Max(max) => format!("The {attribute} field must not be greater than {max}."),
            Rule::In(_) => format!("The selected {attribute} is invalid."),
            Rule::Regex(_) => format!("The {attribute} field format is invalid."),
            Rule::Unique(_) => format!("The {attribute} has already been taken."),
            Rule::Nullable | Rule::Custom(_) => format!("The {attribute} field is invalid."),
        }
    }
}

/// Size used by `min`/`max`: numeric value in a numeric context, character
/// count for strings, element count for arrays and maps.
#[allow(clippy::cast_precision_loss)]
fn size_of(value: &Value, rules: &FieldRules) -> Option<f64> {
    if rules.is_numeric_context() {
        return value.as_f64();
    }
    match value {
        Value::String(s) => Some(s.chars().count() as f64),
        Value::Array(items) => Some(items.len() as f64),
        Value::Map(map) => Some(map.len() as f64),
        Value::Int(_) | Value::Float(_) => value.as_f64(),
        Value::Null | Value::Bool(_) => None,
    }
}

/// Inserts `value` at a dotted path, creating intermediate maps.
pub fn set_path(data: &mut Fields, path: &str, value: Value) {
    let Some((head, rest)) = path.split_once('.') else {
        data.insert(path.to_string(), value);
        return;
    };
    let slot = data
        .entry(head.to_string())
        .or_insert_with(|| Value::Map(BTreeMap::new()));
    if !matches!(slot, Value::Map(_)) {
        *slot = Value::Map(BTreeMap::new());
    }
    if let Value::Map(inner) = slot {
        set_path(inner, rest, value);
    }
}
