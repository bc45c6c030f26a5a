//! `sort_by` parsing against an allow-list.
//!
//! The parameter is a comma-separated list of `asc(field)` / `desc(field)`
//! tokens. Tokens naming fields outside the [`SortSpec`], and text that is
//! not a token at all, are ignored.

use std::sync::{Arc, LazyLock};

use apikit_core::{QueryBuilder, RequestInput, SortDirection};
use regex::Regex;

/// Input parameter carrying sort tokens.
pub const SORT_PARAM: &str = "sort_by";

static SORT_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(asc|desc)\((.*?)\)").expect("static sort pattern"));

/// Custom ordering for one allow-listed name.
pub trait SortClause: Send + Sync {
    fn apply(&self, query: &mut QueryBuilder, direction: SortDirection);
}

impl<F> SortClause for F
where
    F: Fn(&mut QueryBuilder, SortDirection) + Send + Sync,
{
    fn apply(&self, query: &mut QueryBuilder, direction: SortDirection) {
        self(query, direction);
    }
}

#[derive(Clone)]
pub enum SortEntry {
    /// Order by the column of the same name.
    Field,
    Custom(Arc<dyn SortClause>),
}

/// Names the caller may sort by.
#[derive(Clone, Default)]
pub struct SortSpec {
    entries: Vec<(String, SortEntry)>,
}

impl SortSpec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.entries.push((name.into(), SortEntry::Field));
        self
    }

    #[must_use]
    pub fn fields<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names.into_iter().fold(self, |spec, name| spec.field(name))
    }

    #[must_use]
    pub fn custom(
        mut self,
        name: impl Into<String>,
        clause: impl Fn(&mut QueryBuilder, SortDirection) + Send + Sync + 'static,
    ) -> Self {
        self.entries
            .push((name.into(), SortEntry::Custom(Arc::new(clause))));
        self
    }

    fn entry(&self, name: &str) -> Option<&SortEntry> {
        self.entries
            .iter()
            .find(|(allowed, _)| allowed == name)
            .map(|(_, entry)| entry)
    }

    /// Applies the caller's `sort_by` tokens in order. Without the
    /// parameter the query's ordering is left untouched.
    pub fn apply(&self, query: &mut QueryBuilder, input: &RequestInput) {
        let raw = input.string(SORT_PARAM);
        if raw.trim().is_empty() {
            return;
        }
        for (direction, field) in parse_sort(&raw) {
            match self.entry(&field) {
                Some(SortEntry::Field) => {
                    query.order_by(field, direction);
                }
                Some(SortEntry::Custom(clause)) => clause.apply(query, direction),
                None => tracing::debug!(field = %field, "sort field not allowed, ignored"),
            }
        }
    }
}

/// Extracts `(direction, field)` pairs from a `sort_by` value.
#[must_use]
pub fn parse_sort(raw: &str) -> Vec<(SortDirection, String)> {
    SORT_TOKEN
        .captures_iter(raw)
        .filter_map(|caps| {
            let direction = caps.get(1)?.as_str().parse().ok()?;
            Some((direction, caps.get(2)?.as_str().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use apikit_core::Order;

    use super::*;

    fn orders(spec: &SortSpec, sort_by: &str) -> Vec<Order> {
        let mut query = QueryBuilder::new("users");
        spec.apply(&mut query, &RequestInput::default().with(SORT_PARAM, sort_by));
        query.orders
    }

    #[test]
    fn unknown_fields_are_dropped() {
        let spec = SortSpec::new().field("email");
        assert_eq!(
            orders(&spec, "asc(email),desc(unknown)"),
            vec![Order {
                field: "email".into(),
                direction: SortDirection::Asc
            }]
        );
    }

    #[test]
    fn custom_entries_receive_direction() {
        let spec = SortSpec::new()
            .fields(["name"])
            .custom("price", |query, direction| {
                query.order_by("total_price", direction);
            });
        let result = orders(&spec, "desc(price),asc(name)");
        assert_eq!(result[0].field, "total_price");
        assert_eq!(result[0].direction, SortDirection::Desc);
        assert_eq!(result[1].field, "name");
    }

    #[test]
    fn malformed_tokens_are_ignored() {
        let spec = SortSpec::new().field("email");
        assert!(orders(&spec, "up(email),ASC(email),email").is_empty());
        assert_eq!(parse_sort("asc(a)desc(b)").len(), 2);
    }

    #[test]
    fn missing_parameter_keeps_default_order() {
        let spec = SortSpec::new().field("email");
        let mut query = QueryBuilder::new("users");
        query.order_by("id", SortDirection::Desc);
        spec.apply(&mut query, &RequestInput::default());
        assert_eq!(query.orders.len(), 1);
    }
}
