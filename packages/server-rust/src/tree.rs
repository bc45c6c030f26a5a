//! Adjacency-list trees with a materialized path.
//!
//! Each node stores its parent key (`pid`, 0 or absent for roots), its depth
//! (`tree_level`, roots are 1), and the dash-joined keys from the root down
//! to itself (`tree_path`, e.g. `1-4-9`). [`install_tree_hooks`] keeps the
//! last two in step with `pid` as nodes are saved through a [`FormSession`].
//! Moving a node does not rewrite its descendants' paths.

use apikit_core::{Fields, Record, RecordKey, Value};

use crate::form::{FormError, FormSession};
use crate::storage::RecordStore;

pub use apikit_core::{list_to_tree, TreeShape};

/// Column names of a tree collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeColumns {
    pub pid: String,
    pub level: String,
    pub path: String,
}

impl Default for TreeColumns {
    fn default() -> Self {
        Self {
            pid: "pid".to_string(),
            level: "tree_level".to_string(),
            path: "tree_path".to_string(),
        }
    }
}

impl TreeColumns {
    fn parent_of(&self, fields: &Fields) -> i64 {
        fields.get(&self.pid).and_then(Value::as_i64).unwrap_or(0)
    }

    /// Query for every descendant of the node at `path`.
    fn descendants(&self, store: &dyn RecordStore, path: &str) -> apikit_core::QueryBuilder {
        let mut query = store.query();
        query.where_like(self.path.clone(), format!("{path}-%"));
        query
    }
}

/// Installs the parent guard as the `saving` hook and path maintenance as
/// the `saved` hook. Replaces any hooks already set for those stages.
pub fn install_tree_hooks(form: &mut FormSession, columns: TreeColumns) -> &mut FormSession {
    let guard = columns.clone();
    form.saving(move |session| check_parent(session, &guard))
        .saved(move |session| refresh_path(session, &columns))
}

/// Rejects a missing parent on create and a cyclic parent on update.
///
/// # Errors
///
/// [`FormError::Rejected`] for an invalid parent, `Store` on read failures.
pub fn check_parent(session: &FormSession, columns: &TreeColumns) -> Result<(), FormError> {
    let store = session.store();
    let Some(existing) = session.record() else {
        let pid = columns.parent_of(session.validated());
        if pid > 0 && store.find(&RecordKey::Int(pid))?.is_none() {
            return Err(FormError::Rejected(
                "The selected parent does not exist.".to_string(),
            ));
        }
        return Ok(());
    };

    let Some(requested) = session.validated().get(&columns.pid) else {
        return Ok(());
    };
    let pid = requested.as_i64().unwrap_or(0);
    if pid == columns.parent_of(&existing.fields) || pid <= 0 {
        return Ok(());
    }

    let cyclic = RecordKey::Int(pid) == existing.key || {
        let path = existing.get(&columns.path).map(Value::to_text).unwrap_or_default();
        let mut query = columns.descendants(store.as_ref(), &path);
        query.where_eq(store.primary_key().to_string(), pid);
        !path.is_empty() && store.count(&query)? > 0
    };
    if cyclic {
        tracing::debug!(key = %existing.key, pid, "tree move rejected");
        return Err(FormError::Rejected(
            "A node cannot be moved under itself or its descendants.".to_string(),
        ));
    }
    Ok(())
}

/// Recomputes level and path of the saved node when its path is unset or
/// its parent was part of the submitted data.
///
/// # Errors
///
/// `NotFound` when the parent vanished, `Store` on persistence failures.
pub fn refresh_path(session: &mut FormSession, columns: &TreeColumns) -> Result<(), FormError> {
    let Some(record) = session.record() else {
        return Ok(());
    };
    let has_path = record.get(&columns.path).is_some_and(|path| !path.is_blank());
    if has_path && !session.validated().contains_key(&columns.pid) {
        return Ok(());
    }

    let store = session.store().clone();
    let (level, path) = placement(store.as_ref(), columns, record)?;
    let fields = Fields::from([
        (columns.level.clone(), Value::Int(level)),
        (columns.path.clone(), Value::String(path)),
    ]);
    let updated = store.update(&record.key, fields)?;
    session.set_record(updated);
    Ok(())
}

fn placement(
    store: &dyn RecordStore,
    columns: &TreeColumns,
    record: &Record,
) -> Result<(i64, String), FormError> {
    let pid = columns.parent_of(&record.fields);
    if pid <= 0 {
        return Ok((1, record.key.to_string()));
    }
    let parent_key = RecordKey::Int(pid);
    let parent = store
        .find(&parent_key)?
        .ok_or(FormError::NotFound { key: parent_key })?;
    let level = parent.get(&columns.level).and_then(Value::as_i64).unwrap_or(0) + 1;
    let parent_path = parent.get(&columns.path).map(Value::to_text).unwrap_or_default();
    Ok((level, format!("{parent_path}-{}", record.key)))
}
