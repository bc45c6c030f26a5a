//! Declarative filter and sort compilation for list endpoints.
//!
//! A [`FilterSpec`] maps field descriptors to operators; the
//! [`FilterCompiler`] turns it plus the caller's [`RequestInput`] into
//! predicates. A [`SortSpec`] allow-lists the fields the `sort_by`
//! parameter may order by. [`Pagination`] reads `page`/`limit`.

pub mod error;
pub mod filter;
pub mod pagination;
pub mod sort;

use apikit_core::{QueryBuilder, RequestInput};

pub use error::SearchError;
pub use filter::{
    CompiledFilter, FilterClause, FilterCompiler, FilterExtension, FilterOperator, FilterSpec,
    Operator,
};
pub use pagination::{paginate, Page, Pagination};
pub use sort::{parse_sort, SortClause, SortEntry, SortSpec, SORT_PARAM};

use crate::storage::RecordStore;

/// Builds a query against `store` from the caller's filter and sort input.
///
/// # Errors
///
/// Returns [`SearchError`] when the filter specification cannot be applied
/// to the input.
pub fn search(
    store: &dyn RecordStore,
    compiler: &FilterCompiler,
    filters: &FilterSpec,
    sorts: &SortSpec,
    input: &RequestInput,
) -> Result<QueryBuilder, SearchError> {
    let mut query = store.query();
    compiler.compile(filters, input)?.apply(&mut query);
    sorts.apply(&mut query, input);
    Ok(query)
}

#[cfg(test)]
mod tests {
    use apikit_core::{Fields, Value};

    use super::*;
    use crate::storage::{CollectionDef, MemoryDatabase, Relation};

    #[test]
    fn search_filters_and_orders_records() {
        let db = MemoryDatabase::new();
        let admins = db.define(CollectionDef::new("admins"));
        let posts = db.define(CollectionDef::new("posts"));
        db.relate("posts", "admin", Relation::belongs_to("admins", "admin_id"));
        for name in ["John", "Ada"] {
            admins
                .create(Fields::from([("name".to_string(), Value::from(name))]))
                .unwrap();
        }
        for (title, admin) in [("b", 1), ("a", 1), ("c", 2)] {
            posts
                .create(Fields::from([
                    ("title".to_string(), Value::from(title)),
                    ("admin_id".to_string(), Value::Int(admin)),
                ]))
                .unwrap();
        }

        let filters = FilterSpec::parse([("admin.name", "like")]).unwrap();
        let sorts = SortSpec::new().field("title");
        let input = RequestInput::default()
            .with("admin_name", "joh")
            .with(SORT_PARAM, "asc(title)");
        let query = search(posts.as_ref(), &FilterCompiler::new(), &filters, &sorts, &input).unwrap();

        let titles: Vec<String> = posts
            .fetch(&query)
            .unwrap()
            .iter()
            .map(|r| r.fields["title"].to_text())
            .collect();
        assert_eq!(titles, vec!["a", "b"]);
    }
}
