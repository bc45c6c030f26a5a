//! Filter specification and compilation.
//!
//! A field descriptor is either a plain attribute (`status`) or a relation
//! path ending in an attribute (`admin.name`, `author.team.name`). Relation
//! descriptors always compile to relation-existence sub-queries and read
//! their input from the descriptor with dots replaced by underscores
//! (`admin_name`) unless the operator names another input key.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use apikit_core::{CompareOp, Predicate, QueryBuilder, RequestInput, Value};

use super::SearchError;

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

/// Shorthand filter operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
    Compare(CompareOp),
    /// `%input%` containment.
    Like,
    /// Membership; string input is split on `,`.
    In,
    /// Inclusive range; string input is split on `,` and must yield two values.
    Between,
    /// Named extension registered on the [`FilterCompiler`].
    Extension(String),
}

impl FromStr for Operator {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(Operator::Like),
            "in" => Ok(Operator::In),
            "between" => Ok(Operator::Between),
            other => {
                if let Ok(op) = other.parse::<CompareOp>() {
                    return Ok(Operator::Compare(op));
                }
                let is_identifier = other
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                    && other.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
                if is_identifier {
                    Ok(Operator::Extension(other.to_string()))
                } else {
                    Err(SearchError::UnknownOperator(other.to_string()))
                }
            }
        }
    }
}

/// Custom predicate builder for one field. Receives the query and the
/// resolved (non-blank) input; its predicates are grouped conjunctively.
pub trait FilterClause: Send + Sync {
    fn apply(&self, query: &mut QueryBuilder, input: &Value);
}

impl<F> FilterClause for F
where
    F: Fn(&mut QueryBuilder, &Value) + Send + Sync,
{
    fn apply(&self, query: &mut QueryBuilder, input: &Value) {
        self(query, input);
    }
}

/// Shared named operator, invoked with the attribute name and raw input.
pub trait FilterExtension: Send + Sync {
    fn apply(&self, query: &mut QueryBuilder, field: &str, input: &Value);
}

impl<F> FilterExtension for F
where
    F: Fn(&mut QueryBuilder, &str, &Value) + Send + Sync,
{
    fn apply(&self, query: &mut QueryBuilder, field: &str, input: &Value) {
        self(query, field, input);
    }
}

/// How one field descriptor compiles.
#[derive(Clone)]
pub enum FilterOperator {
    Shorthand(Operator),
    /// Shorthand operator reading its input from `input_key`.
    Keyed { op: Operator, input_key: String },
    Custom(Arc<dyn FilterClause>),
}

impl FilterOperator {
    /// # Errors
    ///
    /// Returns [`SearchError::UnknownOperator`] for unparsable operators.
    pub fn keyed(op: &str, input_key: impl Into<String>) -> Result<Self, SearchError> {
        Ok(FilterOperator::Keyed {
            op: op.parse()?,
            input_key: input_key.into(),
        })
    }

    pub fn custom(clause: impl Fn(&mut QueryBuilder, &Value) + Send + Sync + 'static) -> Self {
        FilterOperator::Custom(Arc::new(clause))
    }
}

impl FromStr for FilterOperator {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(FilterOperator::Shorthand)
    }
}

impl fmt::Debug for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterOperator::Shorthand(op) => f.debug_tuple("Shorthand").field(op).finish(),
            FilterOperator::Keyed { op, input_key } => f
                .debug_struct("Keyed")
                .field("op", op)
                .field("input_key", input_key)
                .finish(),
            FilterOperator::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

// ---------------------------------------------------------------------------
// FilterSpec
// ---------------------------------------------------------------------------

/// Ordered field descriptor → operator mapping.
#[derive(Debug, Clone, Default)]
pub struct FilterSpec {
    entries: Vec<(String, FilterOperator)>,
}

impl FilterSpec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `(descriptor, shorthand)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::UnknownOperator`] for the first bad operator.
    pub fn parse<'a>(
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, SearchError> {
        let entries = pairs
            .into_iter()
            .map(|(field, op)| {
                op.parse::<FilterOperator>()
                    .map(|op| (field.to_string(), op))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    #[must_use]
    pub fn with(mut self, descriptor: impl Into<String>, op: FilterOperator) -> Self {
        self.entries.push((descriptor.into(), op));
        self
    }

    #[must_use]
    pub fn custom(
        self,
        descriptor: impl Into<String>,
        clause: impl Fn(&mut QueryBuilder, &Value) + Send + Sync + 'static,
    ) -> Self {
        self.with(descriptor, FilterOperator::custom(clause))
    }

    #[must_use]
    pub fn entries(&self) -> &[(String, FilterOperator)] {
        &self.entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Compiler
// ---------------------------------------------------------------------------

/// Predicates compiled from one request. All are combined with AND.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledFilter {
    pub predicates: Vec<Predicate>,
}

impl CompiledFilter {
    pub fn apply(&self, query: &mut QueryBuilder) {
        for predicate in &self.predicates {
            query.push(predicate.clone());
        }
    }
}

/// Compiles [`FilterSpec`]s, resolving named extensions.
#[derive(Clone, Default)]
pub struct FilterCompiler {
    extensions: HashMap<String, Arc<dyn FilterExtension>>,
}

impl FilterCompiler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a named operator usable as a shorthand in any spec.
    #[must_use]
    pub fn with_extension(
        mut self,
        name: impl Into<String>,
        extension: impl Fn(&mut QueryBuilder, &str, &Value) + Send + Sync + 'static,
    ) -> Self {
        self.extensions.insert(name.into(), Arc::new(extension));
        self
    }

    /// Compiles `spec` against `input`. Fields whose input is blank are skipped.
    ///
    /// # Errors
    ///
    /// [`SearchError::UnknownExtension`] for an unregistered named operator
    /// and [`SearchError::BetweenArity`] for a malformed range input.
    pub fn compile(
        &self,
        spec: &FilterSpec,
        input: &RequestInput,
    ) -> Result<CompiledFilter, SearchError> {
        let mut scratch = QueryBuilder::default();
        for (descriptor, operator) in &spec.entries {
            let (relations, attribute) = split_descriptor(descriptor);

            let input_key = match operator {
                FilterOperator::Keyed { input_key, .. } => input_key.clone(),
                _ if relations.is_empty() => descriptor.clone(),
                _ => descriptor.replace('.', "_"),
            };
            let value = match input.input(&input_key) {
                Some(value) if !value.is_blank() => value,
                _ => {
                    tracing::debug!(field = %descriptor, input = %input_key, "blank filter input skipped");
                    continue;
                }
            };

            let op = match operator {
                FilterOperator::Custom(clause) => {
                    scratch.where_all(|group| clause.apply(group, value));
                    continue;
                }
                FilterOperator::Shorthand(op) | FilterOperator::Keyed { op, .. } => op,
            };

            let mut leaf = QueryBuilder::default();
            self.apply_operator(&mut leaf, descriptor, attribute, op, value)?;
            let predicates = relations
                .iter()
                .rev()
                .fold(leaf.predicates, |predicates, relation| {
                    vec![Predicate::Exists {
                        relation: (*relation).to_string(),
                        predicates,
                    }]
                });
            for predicate in predicates {
                scratch.push(predicate);
            }
        }
        Ok(CompiledFilter {
            predicates: scratch.predicates,
        })
    }

    fn apply_operator(
        &self,
        query: &mut QueryBuilder,
        descriptor: &str,
        attribute: &str,
        op: &Operator,
        value: &Value,
    ) -> Result<(), SearchError> {
        match op {
            Operator::Compare(cmp) => {
                query.where_cmp(attribute, *cmp, value.clone());
            }
            Operator::Like => {
                query.where_like(attribute, format!("%{}%", value.to_text()));
            }
            Operator::In => {
                query.where_in(attribute, split_list(value));
            }
            Operator::Between => {
                let bounds = split_list(value);
                let [low, high] = <[Value; 2]>::try_from(bounds).map_err(|bounds| {
                    SearchError::BetweenArity {
                        field: descriptor.to_string(),
                        count: bounds.len(),
                    }
                })?;
                query.where_between(attribute, low, high);
            }
            Operator::Extension(name) => {
                let extension =
                    self.extensions
                        .get(name)
                        .ok_or_else(|| SearchError::UnknownExtension {
                            field: descriptor.to_string(),
                            name: name.clone(),
                        })?;
                extension.apply(query, attribute, value);
            }
        }
        Ok(())
    }
}

/// Splits `a.b.attr` into relation path `[a, b]` and attribute `attr`.
fn split_descriptor(descriptor: &str) -> (Vec<&str>, &str) {
    match descriptor.rsplit_once('.') {
        Some((path, attribute)) => (path.split('.').collect(), attribute),
        None => (Vec::new(), descriptor),
    }
}

/// List input as given, or a string split on `,`.
fn split_list(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        other => other
            .to_text()
            .split(',')
            .map(|part| Value::String(part.to_string()))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(spec: &FilterSpec, input: RequestInput) -> Vec<Predicate> {
        FilterCompiler::new().compile(spec, &input).unwrap().predicates
    }

    #[test]
    fn equality_on_plain_field() {
        let spec = FilterSpec::parse([("status", "=")]).unwrap();
        let predicates = compile(&spec, RequestInput::default().with("status", "42"));
        assert_eq!(
            predicates,
            vec![Predicate::Compare {
                field: "status".into(),
                op: CompareOp::Eq,
                value: Value::from("42"),
            }]
        );
    }

    #[test]
    fn blank_input_adds_nothing() {
        let spec = FilterSpec::parse([("status", "="), ("tags", "in")]).unwrap();
        assert!(compile(&spec, RequestInput::default()).is_empty());
        let input = RequestInput::default()
            .with("status", "")
            .with("tags", Value::Array(Vec::new()));
        assert!(compile(&spec, input).is_empty());
    }

    #[test]
    fn relation_descriptor_compiles_to_exists() {
        let spec = FilterSpec::parse([("admin.name", "like")]).unwrap();
        let predicates = compile(&spec, RequestInput::default().with("admin_name", "john"));
        assert_eq!(
            predicates,
            vec![Predicate::Exists {
                relation: "admin".into(),
                predicates: vec![Predicate::Like {
                    field: "name".into(),
                    pattern: "%john%".into(),
                }],
            }]
        );
    }

    #[test]
    fn nested_relation_path_nests_exists() {
        let spec = FilterSpec::parse([("author.team.name", "=")]).unwrap();
        let predicates = compile(&spec, RequestInput::default().with("author_team_name", "core"));
        let Predicate::Exists { relation, predicates } = &predicates[0] else {
            panic!("expected exists");
        };
        assert_eq!(relation, "author");
        assert!(matches!(
            &predicates[0],
            Predicate::Exists { relation, .. } if relation == "team"
        ));
    }

    #[test]
    fn keyed_operator_reads_another_input() {
        let spec = FilterSpec::new().with(
            "category_id",
            FilterOperator::keyed("=", "cate_id").unwrap(),
        );
        let predicates = compile(
            &spec,
            RequestInput::default()
                .with("category_id", "1")
                .with("cate_id", "7"),
        );
        assert!(matches!(
            &predicates[0],
            Predicate::Compare { value, .. } if *value == Value::from("7")
        ));
    }

    #[test]
    fn in_and_between_split_strings() {
        let spec = FilterSpec::parse([("id", "in"), ("price", "between")]).unwrap();
        let predicates = compile(
            &spec,
            RequestInput::default()
                .with("id", "1,2,3")
                .with("price", Value::Array(vec![Value::Int(10), Value::Int(20)])),
        );
        assert!(matches!(&predicates[0], Predicate::In { values, .. } if values.len() == 3));
        assert!(matches!(
            &predicates[1],
            Predicate::Between { low, high, .. } if *low == Value::Int(10) && *high == Value::Int(20)
        ));
    }

    #[test]
    fn between_with_wrong_arity_is_rejected() {
        let spec = FilterSpec::parse([("price", "between")]).unwrap();
        let err = FilterCompiler::new()
            .compile(&spec, &RequestInput::default().with("price", "1,2,3"))
            .unwrap_err();
        assert_eq!(
            err,
            SearchError::BetweenArity {
                field: "price".into(),
                count: 3
            }
        );
    }

    #[test]
    fn custom_clause_gets_a_group() {
        let spec = FilterSpec::new().custom("keyword", |query, input| {
            let pattern = format!("%{}%", input.to_text());
            query.where_any(|any| {
                any.where_like("title", pattern.clone())
                    .where_like("body", pattern.clone());
            });
        });
        let predicates = compile(&spec, RequestInput::default().with("keyword", "rust"));
        assert_eq!(predicates.len(), 1);
        assert!(matches!(&predicates[0], Predicate::Group { .. }));
    }

    #[test]
    fn extensions_resolve_by_name() {
        let compiler = FilterCompiler::new().with_extension("whereLower", |query, field, input| {
            query.where_eq(field, input.to_text().to_lowercase());
        });
        let spec = FilterSpec::parse([("email", "whereLower"), ("admin.email", "whereLower")]).unwrap();
        let input = RequestInput::default()
            .with("email", "ADA@X.IO")
            .with("admin_email", "B@X.IO");
        let predicates = compiler.compile(&spec, &input).unwrap().predicates;
        assert!(matches!(
            &predicates[0],
            Predicate::Compare { value, .. } if *value == Value::from("ada@x.io")
        ));
        assert!(matches!(&predicates[1], Predicate::Exists { .. }));

        let err = FilterCompiler::new().compile(&spec, &input).unwrap_err();
        assert!(matches!(err, SearchError::UnknownExtension { .. }));
    }

    #[test]
    fn malformed_operators_are_rejected_at_parse() {
        assert_eq!(
            FilterSpec::parse([("a", "=~")]).unwrap_err(),
            SearchError::UnknownOperator("=~".into())
        );
        assert!("<>".parse::<Operator>().is_ok());
        assert_eq!(
            "scopeActive".parse::<Operator>().unwrap(),
            Operator::Extension("scopeActive".into())
        );
    }
}
