//! CRUD resource controller.

use std::sync::Arc;

use apikit_core::{Record, RecordKey, RequestInput};
use serde_json::{json, Value as JsonValue};

use super::{ApiError, ApiReply};
use crate::config::PaginationConfig;
use crate::form::{FormError, FormSession, Scene};
use crate::search::{paginate, search, FilterCompiler, FilterSpec, Pagination, SortSpec};
use crate::storage::{transaction, RecordStore, TransactionScope};

/// Default batch ceiling for multi-key update and delete.
pub const DEFAULT_BATCH_LIMIT: usize = 100;

/// Splits a comma-separated key list.
///
/// # Errors
///
/// Returns [`FormError::BatchTooLarge`] when more than `max` keys are given.
pub fn split_ids(ids: &str, max: usize) -> Result<Vec<RecordKey>, FormError> {
    let keys: Vec<RecordKey> = ids
        .split(',')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(RecordKey::parse)
        .collect();
    if keys.len() > max {
        return Err(FormError::BatchTooLarge {
            count: keys.len(),
            max,
        });
    }
    Ok(keys)
}

/// A resource exposed as list/create/update/delete endpoints.
///
/// Implementors describe the resource (store, form hooks, filters, sorts);
/// the provided methods run the verbs. Every mutation runs inside one
/// transaction, and batch requests touch nothing unless every key succeeds.
pub trait ResourceController: Send + Sync {
    fn records(&self) -> Arc<dyn RecordStore>;

    fn transactions(&self) -> &dyn TransactionScope;

    /// Builds a session with this resource's hooks. Scene and key are set by
    /// the caller.
    fn form(&self, input: RequestInput) -> FormSession;

    fn batch_limit(&self) -> usize {
        DEFAULT_BATCH_LIMIT
    }

    fn filters(&self) -> FilterSpec {
        FilterSpec::new()
    }

    fn sorts(&self) -> SortSpec {
        SortSpec::new()
    }

    fn compiler(&self) -> FilterCompiler {
        FilterCompiler::new()
    }

    fn pagination(&self) -> PaginationConfig {
        PaginationConfig::default()
    }

    /// JSON shape of one record in listings.
    fn present(&self, record: Record) -> JsonValue {
        record.to_json()
    }

    /// Filtered, sorted, paginated listing.
    ///
    /// # Errors
    ///
    /// Search compilation failures and store errors.
    fn index(&self, input: &RequestInput) -> Result<ApiReply, ApiError> {
        let store = self.records();
        let query = search(
            store.as_ref(),
            &self.compiler(),
            &self.filters(),
            &self.sorts(),
            input,
        )?;
        let pagination = Pagination::from_input(input, &self.pagination());
        let page = paginate(store.as_ref(), &query, pagination)?;
        Ok(ApiReply::paginate(page, |record| self.present(record), None))
    }

    /// Creates one record. Replies 201 with `{<primary key>: key}`.
    ///
    /// # Errors
    ///
    /// Any [`FormError`] from the save pipeline.
    fn store(&self, input: RequestInput) -> Result<ApiReply, ApiError> {
        let record = transaction(self.transactions(), || {
            self.form(input).set_scene(Scene::Create).save()
        })?;
        let primary_key = self.records().primary_key().to_string();
        Ok(ApiReply::created(json!({ primary_key: record.key })))
    }

    /// Updates every record in the comma-separated `ids`.
    ///
    /// # Errors
    ///
    /// `BatchTooLarge` before anything is touched; otherwise the first
    /// failing key's error, with the whole batch rolled back.
    fn update(&self, ids: &str, input: RequestInput) -> Result<ApiReply, ApiError> {
        let keys = split_ids(ids, self.batch_limit())?;
        transaction(self.transactions(), || {
            let mut form = self.form(input);
            form.set_scene(Scene::Update);
            for key in keys {
                form.set_key(key).save()?;
            }
            Ok::<_, FormError>(())
        })?;
        Ok(ApiReply::ok())
    }

    /// Deletes every record in the comma-separated `ids`.
    ///
    /// # Errors
    ///
    /// As for [`update`](Self::update).
    fn destroy(&self, ids: &str, input: RequestInput) -> Result<ApiReply, ApiError> {
        let keys = split_ids(ids, self.batch_limit())?;
        transaction(self.transactions(), || {
            let mut form = self.form(input);
            form.set_scene(Scene::Delete);
            for key in keys {
                form.set_key(key).delete()?;
            }
            Ok::<_, FormError>(())
        })?;
        Ok(ApiReply::ok())
    }
}

#[cfg(test)]
mod tests {
    use apikit_core::{Fields, Value};
    use http::{Method, StatusCode};

    use super::*;
    use crate::form::ValidateConfig;
    use crate::storage::{CollectionDef, MemoryDatabase};

    struct Users {
        db: MemoryDatabase,
        store: Arc<dyn RecordStore>,
    }

    impl Users {
        fn with_rows(count: i64) -> Self {
            let db = MemoryDatabase::new();
            let store = db.define(CollectionDef::new("users"));
            for n in 1..=count {
                store
                    .create(Fields::from([
                        ("name".to_string(), Value::from(format!("user{n}"))),
                        ("status".to_string(), Value::Int(n % 2)),
                    ]))
                    .unwrap();
            }
            Self { db, store }
        }
    }

    impl ResourceController for Users {
        fn records(&self) -> Arc<dyn RecordStore> {
            self.store.clone()
        }

        fn transactions(&self) -> &dyn TransactionScope {
            &self.db
        }

        fn form(&self, input: RequestInput) -> FormSession {
            let mut form = FormSession::new(self.store.clone(), input);
            form.validate(
                ValidateConfig::parse([("name", "required|string|max:20"), ("status", "integer")])
                    .unwrap(),
            )
            .inline_update(["status"]);
            form
        }

        fn filters(&self) -> FilterSpec {
            FilterSpec::parse([("status", "="), ("name", "like")]).unwrap()
        }

        fn sorts(&self) -> SortSpec {
            SortSpec::new().field("name")
        }
    }

    fn count(users: &Users) -> u64 {
        users.store.count(&users.store.query()).unwrap()
    }

    #[test]
    fn split_ids_enforces_the_ceiling() {
        let ids: Vec<String> = (1..=101).map(|n| n.to_string()).collect();
        let err = split_ids(&ids.join(","), 100).unwrap_err();
        assert!(matches!(err, FormError::BatchTooLarge { count: 101, max: 100 }));
        assert_eq!(split_ids(&ids[..100].join(","), 100).unwrap().len(), 100);
        assert_eq!(split_ids("1, 2,,abc", 100).unwrap(), vec![
            RecordKey::Int(1),
            RecordKey::Int(2),
            RecordKey::Str("abc".into())
        ]);
    }

    #[test]
    fn store_replies_created_with_key() {
        let users = Users::with_rows(0);
        let reply = users
            .store(RequestInput::new(Method::POST).with("name", "ada"))
            .unwrap();
        assert_eq!(reply.status, StatusCode::CREATED);
        assert_eq!(reply.body, json!({"id": 1}));
    }

    #[test]
    fn batch_of_exactly_the_limit_is_processed() {
        let users = Users::with_rows(100);
        let ids: Vec<String> = (1..=100).map(|n| n.to_string()).collect();
        users
            .destroy(&ids.join(","), RequestInput::new(Method::DELETE))
            .unwrap();
        assert_eq!(count(&users), 0);
    }

    #[test]
    fn oversized_batch_touches_nothing() {
        let users = Users::with_rows(101);
        let ids: Vec<String> = (1..=101).map(|n| n.to_string()).collect();
        let err = users
            .destroy(&ids.join(","), RequestInput::new(Method::DELETE))
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(count(&users), 101);
    }

    #[test]
    fn failing_key_rolls_back_the_whole_batch() {
        let users = Users::with_rows(3);
        let err = users
            .update("1,2,99", RequestInput::new(Method::PUT).with("name", "renamed"))
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        let first = users.store.find(&RecordKey::Int(1)).unwrap().unwrap();
        assert_eq!(first.get("name"), Some(&Value::from("user1")));
    }

    #[test]
    fn concurrent_batches_do_not_undo_each_other() {
        let users = Users::with_rows(3);
        std::thread::scope(|scope| {
            let failing = scope.spawn(|| {
                users.update("1,99", RequestInput::new(Method::PUT).with("name", "lost"))
            });
            let succeeding = scope.spawn(|| {
                users.update("2", RequestInput::new(Method::PUT).with("name", "kept"))
            });
            assert!(failing.join().unwrap().is_err());
            assert!(succeeding.join().unwrap().is_ok());
        });
        let first = users.store.find(&RecordKey::Int(1)).unwrap().unwrap();
        let second = users.store.find(&RecordKey::Int(2)).unwrap().unwrap();
        assert_eq!(first.get("name"), Some(&Value::from("user1")));
        assert_eq!(second.get("name"), Some(&Value::from("kept")));
    }

    #[test]
    fn inline_patch_updates_every_key() {
        let users = Users::with_rows(2);
        users
            .update(
                "1,2",
                RequestInput::new(Method::PATCH)
                    .with("field", "status")
                    .with("value", 7),
            )
            .unwrap();
        for key in [1, 2] {
            let record = users.store.find(&RecordKey::Int(key)).unwrap().unwrap();
            assert_eq!(record.get("status"), Some(&Value::Int(7)));
        }
    }

    #[test]
    fn index_filters_sorts_and_paginates() {
        let users = Users::with_rows(5);
        let input = RequestInput::default()
            .with("status", "1")
            .with("sort_by", "desc(name)")
            .with("limit", 2);
        let reply = users.index(&input).unwrap();
        assert_eq!(reply.body["meta"]["total"], 3);
        assert_eq!(reply.body["meta"]["last_page"], 2);
        let names: Vec<&str> = reply.body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|row| row["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["user5", "user3"]);
    }
}
