//! Query builder model consumed by record store adapters.
//!
//! A [`QueryBuilder`] is a plain description of a read: a conjunction of
//! [`Predicate`]s, an ordered list of [`Order`] keys, and optional
//! offset/limit. Adapters own evaluation; this module only builds the tree.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::Value;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Literal comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Neq => "!=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
        }
    }
}

impl FromStr for CompareOp {
    type Err = UnknownToken;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "=" | "==" => Ok(CompareOp::Eq),
            "!=" | "<>" => Ok(CompareOp::Neq),
            ">" => Ok(CompareOp::Gt),
            ">=" => Ok(CompareOp::Gte),
            "<" => Ok(CompareOp::Lt),
            "<=" => Ok(CompareOp::Lte),
            other => Err(UnknownToken(other.to_string())),
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort direction for query ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl FromStr for SortDirection {
    type Err = UnknownToken;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(UnknownToken(other.to_string())),
        }
    }
}

/// How the members of a predicate group combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Boolean {
    And,
    Or,
}

/// A token that is not part of an enumerated grammar.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown token: {0}")]
pub struct UnknownToken(pub String);

// ---------------------------------------------------------------------------
// Predicate tree
// ---------------------------------------------------------------------------

/// A single filter condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Predicate {
    /// `field <op> value`
    Compare {
        field: String,
        op: CompareOp,
        value: Value,
    },
    /// `field IN (values)`
    In { field: String, values: Vec<Value> },
    /// `field BETWEEN low AND high` (inclusive).
    Between {
        field: String,
        low: Value,
        high: Value,
    },
    /// SQL `LIKE` with `%` and `_` wildcards.
    Like { field: String, pattern: String },
    /// Holds when at least one record reachable through `relation`
    /// satisfies every predicate in `predicates`.
    Exists {
        relation: String,
        predicates: Vec<Predicate>,
    },
    /// Nested group, combined with `boolean`.
    Group {
        boolean: Boolean,
        predicates: Vec<Predicate>,
    },
}

/// One ordering key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub field: String,
    pub direction: SortDirection,
}

// ---------------------------------------------------------------------------
// QueryBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for a read against one named collection.
///
/// Top-level predicates combine conjunctively.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryBuilder {
    pub collection: String,
    pub predicates: Vec<Predicate>,
    pub orders: Vec<Order>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl QueryBuilder {
    #[must_use]
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ..Self::default()
        }
    }

    pub fn push(&mut self, predicate: Predicate) -> &mut Self {
        self.predicates.push(predicate);
        self
    }

    pub fn where_cmp(
        &mut self,
        field: impl Into<String>,
        op: CompareOp,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.push(Predicate::Compare {
            field: field.into(),
            op,
            value: value.into(),
        })
    }

    pub fn where_eq(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.where_cmp(field, CompareOp::Eq, value)
    }

    pub fn where_in(&mut self, field: impl Into<String>, values: Vec<Value>) -> &mut Self {
        self.push(Predicate::In {
            field: field.into(),
            values,
        })
    }

    pub fn where_between(
        &mut self,
        field: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> &mut Self {
        self.push(Predicate::Between {
            field: field.into(),
            low: low.into(),
            high: high.into(),
        })
    }

    pub fn where_like(&mut self, field: impl Into<String>, pattern: impl Into<String>) -> &mut Self {
        self.push(Predicate::Like {
            field: field.into(),
            pattern: pattern.into(),
        })
    }

    /// Adds a relation-existence sub-query. The closure receives a builder
    /// scoped to the related collection.
    pub fn where_has(
        &mut self,
        relation: impl Into<String>,
        build: impl FnOnce(&mut QueryBuilder),
    ) -> &mut Self {
        let relation = relation.into();
        let mut sub = QueryBuilder::new(relation.clone());
        build(&mut sub);
        self.push(Predicate::Exists {
            relation,
            predicates: sub.predicates,
        })
    }

    /// Adds a parenthesized conjunction. Empty groups are dropped.
    pub fn where_all(&mut self, build: impl FnOnce(&mut QueryBuilder)) -> &mut Self {
        self.group(Boolean::And, build)
    }

    /// Adds a parenthesized disjunction. Empty groups are dropped.
    pub fn where_any(&mut self, build: impl FnOnce(&mut QueryBuilder)) -> &mut Self {
        self.group(Boolean::Or, build)
    }

    fn group(&mut self, boolean: Boolean, build: impl FnOnce(&mut QueryBuilder)) -> &mut Self {
        let mut sub = QueryBuilder::new(self.collection.clone());
        build(&mut sub);
        if sub.predicates.is_empty() {
            return self;
        }
        self.push(Predicate::Group {
            boolean,
            predicates: sub.predicates,
        })
    }

    pub fn order_by(&mut self, field: impl Into<String>, direction: SortDirection) -> &mut Self {
        self.orders.push(Order {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn skip(&mut self, offset: usize) -> &mut Self {
        self.offset = Some(offset);
        self
    }

    pub fn take(&mut self, limit: usize) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    /// Copy of this query without ordering or paging, for `count` calls.
    #[must_use]
    pub fn without_paging(&self) -> Self {
        Self {
            collection: self.collection.clone(),
            predicates: self.predicates.clone(),
            orders: Vec::new(),
            offset: None,
            limit: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_op_parses_aliases() {
        assert_eq!("=".parse::<CompareOp>().unwrap(), CompareOp::Eq);
        assert_eq!("<>".parse::<CompareOp>().unwrap(), CompareOp::Neq);
        assert_eq!(">=".parse::<CompareOp>().unwrap(), CompareOp::Gte);
        assert!("like".parse::<CompareOp>().is_err());
    }

    #[test]
    fn sort_direction_is_case_sensitive() {
        assert_eq!("asc".parse::<SortDirection>().unwrap(), SortDirection::Asc);
        assert!("ASC".parse::<SortDirection>().is_err());
    }

    #[test]
    fn where_has_scopes_sub_predicates() {
        let mut q = QueryBuilder::new("posts");
        q.where_has("admin", |sub| {
            sub.where_like("name", "%john%");
        });
        assert_eq!(
            q.predicates,
            vec![Predicate::Exists {
                relation: "admin".to_string(),
                predicates: vec![Predicate::Like {
                    field: "name".to_string(),
                    pattern: "%john%".to_string(),
                }],
            }]
        );
    }

    #[test]
    fn empty_groups_are_dropped() {
        let mut q = QueryBuilder::new("posts");
        q.where_any(|_| {});
        assert!(q.predicates.is_empty());

        q.where_any(|sub| {
            sub.where_eq("a", 1).where_eq("b", 2);
        });
        assert!(matches!(
            &q.predicates[0],
            Predicate::Group { boolean: Boolean::Or, predicates } if predicates.len() == 2
        ));
    }

    #[test]
    fn without_paging_keeps_predicates_only() {
        let mut q = QueryBuilder::new("users");
        q.where_eq("status", 1)
            .order_by("id", SortDirection::Desc)
            .skip(30)
            .take(15);
        let count_query = q.without_paging();
        assert_eq!(count_query.predicates.len(), 1);
        assert!(count_query.orders.is_empty());
        assert_eq!(count_query.offset, None);
        assert_eq!(count_query.limit, None);
    }

    #[test]
    fn predicate_serializes_with_kind_tag() {
        let p = Predicate::Compare {
            field: "status".to_string(),
            op: CompareOp::Eq,
            value: Value::Int(42),
        };
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["kind"], "compare");
        assert_eq!(json["op"], "eq");
        assert_eq!(json["value"], 42);
    }
}
