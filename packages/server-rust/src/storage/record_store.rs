//! Record store adapter traits.
//!
//! Defines [`RecordStore`], the interface the form engine, the search
//! compiler, and the config store use to reach persisted records, and
//! [`TransactionScope`], the atomicity boundary a controller wraps a whole
//! mutation batch in. Both are consumed, not owned: production adapters
//! wrap a real database; [`MemoryDatabase`](super::MemoryDatabase) is the
//! in-process implementation.

use std::sync::Arc;

use apikit_core::{CompareOp, Fields, QueryBuilder, Record, RecordKey, UniqueCheck, Value};

/// CRUD + query access to one named collection.
///
/// All operations are synchronous. Errors are adapter failures (constraint
/// violations, connectivity) and must reach the caller untranslated.
///
/// Used as `Arc<dyn RecordStore>`.
pub trait RecordStore: Send + Sync {
    /// Name of the collection this store manages.
    fn name(&self) -> &str;

    /// Primary key column.
    fn primary_key(&self) -> &str;

    /// Starts a query against this collection.
    fn query(&self) -> QueryBuilder {
        QueryBuilder::new(self.name())
    }

    /// Fetches one record by primary key.
    fn find(&self, key: &RecordKey) -> anyhow::Result<Option<Record>>;

    /// Inserts a new record and returns it with its assigned key.
    fn create(&self, fields: Fields) -> anyhow::Result<Record>;

    /// Applies `fields` to an existing record and returns the stored result.
    fn update(&self, key: &RecordKey, fields: Fields) -> anyhow::Result<Record>;

    /// Removes a record. Returns `false` if nothing was removed.
    fn delete(&self, key: &RecordKey) -> anyhow::Result<bool>;

    /// Runs a query: predicates, then ordering, then offset/limit.
    fn fetch(&self, query: &QueryBuilder) -> anyhow::Result<Vec<Record>>;

    /// Counts records matching the query's predicates.
    fn count(&self, query: &QueryBuilder) -> anyhow::Result<u64>;
}

/// Transaction boundary supplied by the adapter.
///
/// `begin` hands out one [`Transaction`] per unit of work. Concurrent
/// transactions must not observe or undo each other's writes; a handle
/// dropped without `commit` is rolled back.
pub trait TransactionScope: Send + Sync {
    fn begin(&self) -> anyhow::Result<Box<dyn Transaction + '_>>;
}

/// One open transaction. Finished by exactly one `commit` or `rollback`.
pub trait Transaction {
    fn commit(self: Box<Self>) -> anyhow::Result<()>;

    fn rollback(self: Box<Self>) -> anyhow::Result<()>;
}

/// Runs `body` inside a transaction: commit on `Ok`, rollback on `Err`.
///
/// A rollback failure is logged and the body's error is returned.
///
/// # Errors
///
/// Returns the body's error, or the adapter's `begin`/`commit` failure.
pub fn transaction<T, E>(
    scope: &dyn TransactionScope,
    body: impl FnOnce() -> Result<T, E>,
) -> Result<T, E>
where
    E: From<anyhow::Error>,
{
    let tx = scope.begin()?;
    match body() {
        Ok(value) => {
            tx.commit()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback() {
                tracing::error!(error = %rollback_err, "transaction rollback failed");
            }
            Err(err)
        }
    }
}

/// [`UniqueCheck`] backed by a record store: counts records holding the
/// value, excluding the ignored key.
pub struct StoreUniqueCheck {
    store: Arc<dyn RecordStore>,
}

impl StoreUniqueCheck {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }
}

impl UniqueCheck for StoreUniqueCheck {
    fn exists(
        &self,
        column: &str,
        value: &Value,
        ignore: Option<&RecordKey>,
    ) -> anyhow::Result<bool> {
        let mut query = self.store.query();
        query.where_eq(column, value.clone());
        if let Some(key) = ignore {
            query.where_cmp(self.store.primary_key(), CompareOp::Neq, key.to_value());
        }
        Ok(self.store.count(&query)? > 0)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::storage::{CollectionDef, MemoryDatabase};

    #[derive(Default)]
    struct CountingScope {
        begins: AtomicU32,
        commits: AtomicU32,
        rollbacks: AtomicU32,
    }

    struct CountingTx<'a>(&'a CountingScope);

    impl TransactionScope for CountingScope {
        fn begin(&self) -> anyhow::Result<Box<dyn Transaction + '_>> {
            self.begins.fetch_add(1, Ordering::Relaxed);
            Ok(Box::new(CountingTx(self)))
        }
    }

    impl Transaction for CountingTx<'_> {
        fn commit(self: Box<Self>) -> anyhow::Result<()> {
            self.0.commits.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        fn rollback(self: Box<Self>) -> anyhow::Result<()> {
            self.0.rollbacks.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    #[test]
    fn transaction_commits_on_ok() {
        let scope = CountingScope::default();
        let result: anyhow::Result<u8> = transaction(&scope, || Ok(7));
        assert_eq!(result.unwrap(), 7);
        assert_eq!(scope.commits.load(Ordering::Relaxed), 1);
        assert_eq!(scope.rollbacks.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn transaction_rolls_back_on_err() {
        let scope = CountingScope::default();
        let result: anyhow::Result<()> = transaction(&scope, || Err(anyhow::anyhow!("boom")));
        assert!(result.is_err());
        assert_eq!(scope.begins.load(Ordering::Relaxed), 1);
        assert_eq!(scope.commits.load(Ordering::Relaxed), 0);
        assert_eq!(scope.rollbacks.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn unique_check_ignores_own_key() {
        let db = MemoryDatabase::new();
        let users = db.define(CollectionDef::new("users"));
        let ada = users
            .create(Fields::from([("email".to_string(), Value::from("ada@example.com"))]))
            .unwrap();

        let check = StoreUniqueCheck::new(users);
        let email = Value::from("ada@example.com");
        assert!(check.exists("email", &email, None).unwrap());
        assert!(!check.exists("email", &email, Some(&ada.key)).unwrap());
        assert!(!check.exists("email", &Value::from("bob@example.com"), None).unwrap());
    }
}
