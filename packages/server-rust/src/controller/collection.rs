//! Resource controller configured from data instead of a dedicated type.

use std::sync::Arc;

use apikit_core::RequestInput;

use super::resource::{ResourceController, DEFAULT_BATCH_LIMIT};
use crate::config::{KitConfig, PaginationConfig};
use crate::form::{FormSession, ValidateConfig};
use crate::search::{FilterCompiler, FilterSpec, SortSpec};
use crate::storage::{RecordStore, TransactionScope};

/// Extra session wiring (hooks) applied to every form the resource builds.
pub type SessionSetup = Arc<dyn Fn(&mut FormSession) + Send + Sync>;

/// A [`ResourceController`] over one collection with fixed rules, filters,
/// and sorts.
pub struct CollectionResource {
    store: Arc<dyn RecordStore>,
    transactions: Arc<dyn TransactionScope>,
    rules: ValidateConfig,
    inline: Vec<String>,
    filters: FilterSpec,
    sorts: SortSpec,
    compiler: FilterCompiler,
    pagination: PaginationConfig,
    batch_limit: usize,
    setup: Option<SessionSetup>,
}

impl CollectionResource {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, transactions: Arc<dyn TransactionScope>) -> Self {
        Self {
            store,
            transactions,
            rules: ValidateConfig::new(),
            inline: Vec::new(),
            filters: FilterSpec::new(),
            sorts: SortSpec::new(),
            compiler: FilterCompiler::new(),
            pagination: PaginationConfig::default(),
            batch_limit: DEFAULT_BATCH_LIMIT,
            setup: None,
        }
    }

    /// Takes pagination bounds and the batch ceiling from `config`.
    #[must_use]
    pub fn configured(mut self, config: &KitConfig) -> Self {
        self.pagination = config.pagination;
        self.batch_limit = config.batch_limit;
        self
    }

    #[must_use]
    pub fn with_rules(mut self, rules: ValidateConfig) -> Self {
        self.rules = rules;
        self
    }

    /// Fields editable through an inline PATCH.
    #[must_use]
    pub fn with_inline<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inline = fields.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_filters(mut self, filters: FilterSpec) -> Self {
        self.filters = filters;
        self
    }

    #[must_use]
    pub fn with_sorts(mut self, sorts: SortSpec) -> Self {
        self.sorts = sorts;
        self
    }

    #[must_use]
    pub fn with_compiler(mut self, compiler: FilterCompiler) -> Self {
        self.compiler = compiler;
        self
    }

    #[must_use]
    pub fn with_session(mut self, setup: impl Fn(&mut FormSession) + Send + Sync + 'static) -> Self {
        self.setup = Some(Arc::new(setup));
        self
    }
}

impl ResourceController for CollectionResource {
    fn records(&self) -> Arc<dyn RecordStore> {
        Arc::clone(&self.store)
    }

    fn transactions(&self) -> &dyn TransactionScope {
        self.transactions.as_ref()
    }

    fn form(&self, input: RequestInput) -> FormSession {
        let mut form = FormSession::new(Arc::clone(&self.store), input);
        form.validate(self.rules.clone())
            .inline_update(self.inline.iter().cloned());
        if let Some(setup) = &self.setup {
            setup(&mut form);
        }
        form
    }

    fn batch_limit(&self) -> usize {
        self.batch_limit
    }

    fn filters(&self) -> FilterSpec {
        self.filters.clone()
    }

    fn sorts(&self) -> SortSpec {
        self.sorts.clone()
    }

    fn compiler(&self) -> FilterCompiler {
        self.compiler.clone()
    }

    fn pagination(&self) -> PaginationConfig {
        self.pagination
    }
}

#[cfg(test)]
mod tests {
    use apikit_core::Value;
    use http::{Method, StatusCode};

    use super::*;
    use crate::storage::{CollectionDef, MemoryDatabase};
    use crate::tree::{install_tree_hooks, TreeColumns};

    #[test]
    fn configured_limits_apply() {
        let db = MemoryDatabase::new();
        let store = db.define(CollectionDef::new("tags"));
        let config = KitConfig {
            batch_limit: 2,
            ..KitConfig::default()
        };
        let resource = CollectionResource::new(store, Arc::new(db)).configured(&config);
        let err = resource
            .destroy("1,2,3", RequestInput::new(Method::DELETE))
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn session_setup_installs_hooks() {
        let db = MemoryDatabase::new();
        let store = db.define(CollectionDef::new("menus"));
        let resource = CollectionResource::new(store.clone(), Arc::new(db))
            .with_rules(ValidateConfig::parse([("title", "required"), ("pid", "integer")]).unwrap())
            .with_session(|form| {
                install_tree_hooks(form, TreeColumns::default());
            });

        resource
            .store(RequestInput::new(Method::POST).with("title", "root"))
            .unwrap();
        let root = store.find(&apikit_core::RecordKey::Int(1)).unwrap().unwrap();
        assert_eq!(root.get("tree_path"), Some(&Value::from("1")));
    }
}
