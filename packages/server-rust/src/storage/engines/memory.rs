//! In-memory [`RecordStore`] implementation backed by [`DashMap`].
//!
//! [`MemoryDatabase`] holds a set of named collections plus the relations
//! between them, evaluates predicate trees (including relation-existence
//! sub-queries), and provides snapshot-based transactions. Suitable for
//! development, tests, and small deployments where all data fits in memory.
//!
//! Writes are serialized through one reentrant write lock. An open
//! transaction holds that lock until it finishes, so writers on other
//! threads wait for it and a rollback only ever reverts the owner's own
//! writes. Readers are not blocked and may observe uncommitted rows.

use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use apikit_core::{
    Boolean, CompareOp, Fields, Predicate, QueryBuilder, Record, RecordKey, SortDirection, Value,
};
use dashmap::DashMap;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use quick_cache::sync::Cache;
use regex::Regex;

use crate::storage::record_store::{RecordStore, Transaction, TransactionScope};

/// Returns the current wall-clock time as milliseconds since the Unix epoch.
#[allow(clippy::cast_possible_truncation)]
fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// How new primary keys are assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMode {
    /// Integer keys from a per-collection counter. Caller-supplied keys are ignored.
    AutoIncrement,
    /// The caller supplies the key in the primary key column (e.g. `slug`).
    Provided,
}

/// Collection definition.
#[derive(Debug, Clone)]
pub struct CollectionDef {
    pub name: String,
    pub primary_key: String,
    pub key_mode: KeyMode,
    /// Stamp `created_at` / `updated_at` (millis since epoch) on writes.
    pub timestamps: bool,
}

impl CollectionDef {
    /// Auto-increment `id` collection with timestamps.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: "id".to_string(),
            key_mode: KeyMode::AutoIncrement,
            timestamps: true,
        }
    }

    /// Collection keyed by a caller-supplied column.
    #[must_use]
    pub fn keyed_by(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self.key_mode = KeyMode::Provided;
        self
    }

    #[must_use]
    pub fn without_timestamps(mut self) -> Self {
        self.timestamps = false;
        self
    }
}

/// Relation from one collection to another, used by `Exists` predicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relation {
    /// `self.foreign_key` references `target.owner_key`.
    BelongsTo {
        target: String,
        foreign_key: String,
        owner_key: String,
    },
    /// `target.foreign_key` references `self.local_key`.
    HasMany {
        target: String,
        foreign_key: String,
        local_key: String,
    },
}

impl Relation {
    #[must_use]
    pub fn belongs_to(target: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Relation::BelongsTo {
            target: target.into(),
            foreign_key: foreign_key.into(),
            owner_key: "id".to_string(),
        }
    }

    #[must_use]
    pub fn has_many(target: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Relation::HasMany {
            target: target.into(),
            foreign_key: foreign_key.into(),
            local_key: "id".to_string(),
        }
    }

    fn target(&self) -> &str {
        match self {
            Relation::BelongsTo { target, .. } | Relation::HasMany { target, .. } => target,
        }
    }

    /// Whether `related` (a row of the target collection) is linked to `owner`.
    fn links(&self, owner: &Fields, related: &Fields) -> bool {
        let (mine, theirs) = match self {
            Relation::BelongsTo {
                foreign_key,
                owner_key,
                ..
            } => (owner.get(foreign_key), related.get(owner_key)),
            Relation::HasMany {
                foreign_key,
                local_key,
                ..
            } => (owner.get(local_key), related.get(foreign_key)),
        };
        match (mine, theirs) {
            (Some(a), Some(b)) => a.loose_eq(b),
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

struct Table {
    def: CollectionDef,
    rows: DashMap<RecordKey, Fields>,
    next_id: AtomicI64,
}

impl Table {
    fn new(def: CollectionDef) -> Self {
        Self {
            def,
            rows: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    /// Rows in primary key order, the default ordering of every fetch.
    fn sorted_rows(&self) -> Vec<(RecordKey, Fields)> {
        let mut rows: Vec<(RecordKey, Fields)> = self
            .rows
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        rows
    }
}

struct TableSnapshot {
    rows: Vec<(RecordKey, Fields)>,
    next_id: i64,
}

/// Compiled `like` patterns kept per database.
const LIKE_PATTERN_CAPACITY: usize = 256;

struct Inner {
    tables: DashMap<String, Arc<Table>>,
    relations: DashMap<(String, String), Relation>,
    write_lock: ReentrantMutex<()>,
    like_patterns: Cache<String, Regex>,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            tables: DashMap::new(),
            relations: DashMap::new(),
            write_lock: ReentrantMutex::new(()),
            like_patterns: Cache::new(LIKE_PATTERN_CAPACITY),
        }
    }
}

impl Inner {
    fn snapshot(&self) -> HashMap<String, TableSnapshot> {
        self.tables
            .iter()
            .map(|entry| {
                let table = entry.value();
                (
                    entry.key().clone(),
                    TableSnapshot {
                        rows: table.sorted_rows(),
                        next_id: table.next_id.load(Ordering::SeqCst),
                    },
                )
            })
            .collect()
    }

    fn restore(&self, snapshot: HashMap<String, TableSnapshot>) {
        for (name, state) in snapshot {
            if let Some(table) = self.tables.get(&name) {
                table.rows.clear();
                for (key, row) in state.rows {
                    table.rows.insert(key, row);
                }
                table.next_id.store(state.next_id, Ordering::SeqCst);
            }
        }
    }

    fn like_regex(&self, pattern: &str) -> anyhow::Result<Regex> {
        if let Some(compiled) = self.like_patterns.get(pattern) {
            return Ok(compiled);
        }
        let compiled = compile_like(pattern)?;
        self.like_patterns.insert(pattern.to_string(), compiled.clone());
        Ok(compiled)
    }

    fn table(&self, name: &str) -> anyhow::Result<Arc<Table>> {
        self.tables
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| anyhow::anyhow!("unknown collection `{name}`"))
    }

    fn relation(&self, collection: &str, name: &str) -> anyhow::Result<Relation> {
        self.relations
            .get(&(collection.to_string(), name.to_string()))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| anyhow::anyhow!("collection `{collection}` has no relation `{name}`"))
    }

    fn matches_all(
        &self,
        collection: &str,
        row: &Fields,
        predicates: &[Predicate],
    ) -> anyhow::Result<bool> {
        for predicate in predicates {
            if !self.matches(collection, row, predicate)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn matches(&self, collection: &str, row: &Fields, predicate: &Predicate) -> anyhow::Result<bool> {
        let matched = match predicate {
            Predicate::Compare { field, op, value } => row
                .get(field)
                .and_then(|actual| actual.loose_cmp(value))
                .is_some_and(|ord| compare_holds(*op, ord)),
            Predicate::In { field, values } => row
                .get(field)
                .is_some_and(|actual| values.iter().any(|v| actual.loose_eq(v))),
            Predicate::Between { field, low, high } => row.get(field).is_some_and(|actual| {
                actual.loose_cmp(low).is_some_and(CmpOrdering::is_ge)
                    && actual.loose_cmp(high).is_some_and(CmpOrdering::is_le)
            }),
            Predicate::Like { field, pattern } => match row.get(field) {
                Some(Value::Null) | None => false,
                Some(actual) => self.like_regex(pattern)?.is_match(&actual.to_text()),
            },
            Predicate::Exists {
                relation,
                predicates,
            } => {
                let relation_def = self.relation(collection, relation)?;
                let target = self.table(relation_def.target())?;
                for (_, related) in target.sorted_rows() {
                    if relation_def.links(row, &related)
                        && self.matches_all(&target.def.name, &related, predicates)?
                    {
                        return Ok(true);
                    }
                }
                false
            }
            Predicate::Group {
                boolean: Boolean::And,
                predicates,
            } => self.matches_all(collection, row, predicates)?,
            Predicate::Group {
                boolean: Boolean::Or,
                predicates,
            } => {
                for inner in predicates {
                    if self.matches(collection, row, inner)? {
                        return Ok(true);
                    }
                }
                false
            }
        };
        Ok(matched)
    }

    fn filter(&self, query: &QueryBuilder) -> anyhow::Result<Vec<(RecordKey, Fields)>> {
        let table = self.table(&query.collection)?;
        let mut matched = Vec::new();
        for (key, row) in table.sorted_rows() {
            if self.matches_all(&query.collection, &row, &query.predicates)? {
                matched.push((key, row));
            }
        }
        Ok(matched)
    }
}

fn compare_holds(op: CompareOp, ord: CmpOrdering) -> bool {
    match op {
        CompareOp::Eq => ord.is_eq(),
        CompareOp::Neq => ord.is_ne(),
        CompareOp::Gt => ord.is_gt(),
        CompareOp::Gte => ord.is_ge(),
        CompareOp::Lt => ord.is_lt(),
        CompareOp::Lte => ord.is_le(),
    }
}

/// Translates a SQL `LIKE` pattern into an anchored, case-insensitive regex.
/// Caller-supplied keys are stored verbatim: `"007"` stays a string key.
fn provided_key(value: &Value) -> Option<RecordKey> {
    match value {
        Value::Int(i) => Some(RecordKey::Int(*i)),
        Value::String(s) if !s.is_empty() => Some(RecordKey::Str(s.clone())),
        _ => None,
    }
}

fn compile_like(pattern: &str) -> anyhow::Result<Regex> {
    let mut re = String::from("(?is)^");
    for ch in pattern.chars() {
        match ch {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    Ok(Regex::new(&re)?)
}

/// Ordering for sort keys: nulls and missing values first, then loose order.
fn order_values(a: Option<&Value>, b: Option<&Value>) -> CmpOrdering {
    let a = a.filter(|v| !matches!(v, Value::Null));
    let b = b.filter(|v| !matches!(v, Value::Null));
    match (a, b) {
        (None, None) => CmpOrdering::Equal,
        (None, Some(_)) => CmpOrdering::Less,
        (Some(_), None) => CmpOrdering::Greater,
        (Some(a), Some(b)) => a.loose_cmp(b).unwrap_or(CmpOrdering::Equal),
    }
}

// ---------------------------------------------------------------------------
// MemoryDatabase
// ---------------------------------------------------------------------------

/// A set of in-memory collections sharing relations and a write lock.
///
/// Cloning is cheap; clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    inner: Arc<Inner>,
}

impl MemoryDatabase {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates (or replaces) a collection and returns a store handle for it.
    #[must_use]
    pub fn define(&self, def: CollectionDef) -> Arc<dyn RecordStore> {
        let handle = MemoryCollection {
            name: def.name.clone(),
            primary_key: def.primary_key.clone(),
            inner: self.inner.clone(),
        };
        self.inner.tables.insert(def.name.clone(), Arc::new(Table::new(def)));
        Arc::new(handle)
    }

    /// Store handle for an already defined collection.
    #[must_use]
    pub fn collection(&self, name: &str) -> Option<Arc<dyn RecordStore>> {
        let table = self.inner.tables.get(name)?;
        Some(Arc::new(MemoryCollection {
            name: table.def.name.clone(),
            primary_key: table.def.primary_key.clone(),
            inner: self.inner.clone(),
        }))
    }

    /// Registers relation `name` on `collection`.
    pub fn relate(&self, collection: impl Into<String>, name: impl Into<String>, relation: Relation) {
        self.inner
            .relations
            .insert((collection.into(), name.into()), relation);
    }
}

impl TransactionScope for MemoryDatabase {
    fn begin(&self) -> anyhow::Result<Box<dyn Transaction + '_>> {
        let guard = self.inner.write_lock.lock();
        Ok(Box::new(MemoryTransaction {
            inner: &self.inner,
            snapshot: Some(self.inner.snapshot()),
            _guard: guard,
        }))
    }
}

/// Open transaction on a [`MemoryDatabase`]. Holds the write lock and the
/// table state at `begin`; dropping it unfinished rolls back.
struct MemoryTransaction<'a> {
    inner: &'a Inner,
    snapshot: Option<HashMap<String, TableSnapshot>>,
    _guard: ReentrantMutexGuard<'a, ()>,
}

impl Transaction for MemoryTransaction<'_> {
    fn commit(mut self: Box<Self>) -> anyhow::Result<()> {
        self.snapshot = None;
        Ok(())
    }

    fn rollback(mut self: Box<Self>) -> anyhow::Result<()> {
        if let Some(snapshot) = self.snapshot.take() {
            self.inner.restore(snapshot);
            tracing::debug!("memory transaction rolled back");
        }
        Ok(())
    }
}

impl Drop for MemoryTransaction<'_> {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            tracing::warn!("memory transaction dropped unfinished, rolling back");
            self.inner.restore(snapshot);
        }
    }
}

/// Store handle for one collection of a [`MemoryDatabase`].
pub struct MemoryCollection {
    name: String,
    primary_key: String,
    inner: Arc<Inner>,
}

impl MemoryCollection {
    fn table(&self) -> anyhow::Result<Arc<Table>> {
        self.inner.table(&self.name)
    }
}

impl RecordStore for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn primary_key(&self) -> &str {
        &self.primary_key
    }

    fn find(&self, key: &RecordKey) -> anyhow::Result<Option<Record>> {
        let table = self.table()?;
        Ok(table.rows.get(key).map(|row| Record {
            key: key.clone(),
            fields: row.value().clone(),
        }))
    }

    fn create(&self, mut fields: Fields) -> anyhow::Result<Record> {
        let _write = self.inner.write_lock.lock();
        let table = self.table()?;
        let pk = table.def.primary_key.clone();
        let key = match table.def.key_mode {
            KeyMode::AutoIncrement => RecordKey::Int(table.next_id.fetch_add(1, Ordering::SeqCst)),
            KeyMode::Provided => fields
                .get(&pk)
                .and_then(provided_key)
                .ok_or_else(|| anyhow::anyhow!("`{}` requires a value for `{pk}`", self.name))?,
        };
        if table.rows.contains_key(&key) {
            anyhow::bail!("duplicate key `{key}` in `{}`", self.name);
        }
        fields.insert(pk, key.to_value());
        if table.def.timestamps {
            let now = Value::Int(now_millis());
            fields.insert("created_at".to_string(), now.clone());
            fields.insert("updated_at".to_string(), now);
        }
        table.rows.insert(key.clone(), fields.clone());
        Ok(Record { key, fields })
    }

    fn update(&self, key: &RecordKey, fields: Fields) -> anyhow::Result<Record> {
        let _write = self.inner.write_lock.lock();
        let table = self.table()?;
        let pk = &table.def.primary_key;
        let mut row = table
            .rows
            .get_mut(key)
            .ok_or_else(|| anyhow::anyhow!("no record `{key}` in `{}`", self.name))?;
        for (field, value) in fields {
            if &field != pk {
                row.insert(field, value);
            }
        }
        if table.def.timestamps {
            row.insert("updated_at".to_string(), Value::Int(now_millis()));
        }
        Ok(Record {
            key: key.clone(),
            fields: row.value().clone(),
        })
    }

    fn delete(&self, key: &RecordKey) -> anyhow::Result<bool> {
        let _write = self.inner.write_lock.lock();
        Ok(self.table()?.rows.remove(key).is_some())
    }

    fn fetch(&self, query: &QueryBuilder) -> anyhow::Result<Vec<Record>> {
        let mut rows = self.inner.filter(query)?;
        if !query.orders.is_empty() {
            rows.sort_by(|(_, a), (_, b)| {
                query
                    .orders
                    .iter()
                    .map(|order| {
                        let ord = order_values(a.get(&order.field), b.get(&order.field));
                        match order.direction {
                            SortDirection::Asc => ord,
                            SortDirection::Desc => ord.reverse(),
                        }
                    })
                    .find(|ord| ord.is_ne())
                    .unwrap_or(CmpOrdering::Equal)
            });
        }
        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(key, fields)| Record { key, fields })
            .collect())
    }

    fn count(&self, query: &QueryBuilder) -> anyhow::Result<u64> {
        Ok(self.inner.filter(query)?.len() as u64)
    }
}
