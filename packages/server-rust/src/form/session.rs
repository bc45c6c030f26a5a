//! Per-request form session and its save/delete pipelines.

use std::collections::BTreeSet;
use std::sync::Arc;

use apikit_core::{
    Fields, Record, RecordKey, RequestInput, Rule, UniqueRule, ValidationErrors, Validator,
};
use http::Method;

use super::hooks::{AuthHook, Hook, HookName, Hooks, ValidateHook};
use super::rules::{self, ValidateConfig};
use super::{FormError, Scene};
use crate::storage::{RecordStore, StoreUniqueCheck};

/// Input parameter naming the field of an inline edit.
pub const INLINE_FIELD_PARAM: &str = "field";
/// Input parameter carrying the new value of an inline edit.
pub const INLINE_VALUE_PARAM: &str = "value";

/// Unit of work for one create, update, or delete.
///
/// Configured through fluent setters, then driven by [`save`](Self::save)
/// or [`delete`](Self::delete). Hooks receive the session itself and may
/// read the input, the target record, and the validated data.
pub struct FormSession {
    store: Arc<dyn RecordStore>,
    input: RequestInput,
    scene: Option<Scene>,
    key: Option<RecordKey>,
    record: Option<Record>,
    hooks: Hooks,
    inline_fields: BTreeSet<String>,
    validated: Fields,
}

impl FormSession {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, input: RequestInput) -> Self {
        Self {
            store,
            input,
            scene: None,
            key: None,
            record: None,
            hooks: Hooks::default(),
            inline_fields: BTreeSet::new(),
            validated: Fields::new(),
        }
    }

    // -- configuration -----------------------------------------------------

    pub fn set_scene(&mut self, scene: Scene) -> &mut Self {
        self.scene = Some(scene);
        self
    }

    pub fn set_key(&mut self, key: impl Into<RecordKey>) -> &mut Self {
        self.key = Some(key.into());
        self
    }

    /// Fields that may be edited through a PATCH inline update.
    pub fn inline_update<I, S>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inline_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn auth(&mut self, allow: bool) -> &mut Self {
        self.hooks.auth = AuthHook::Allow(allow);
        self
    }

    pub fn auth_with(
        &mut self,
        check: impl Fn(&FormSession) -> Result<bool, FormError> + Send + Sync + 'static,
    ) -> &mut Self {
        self.hooks.auth = AuthHook::Check(Arc::new(check));
        self
    }

    pub fn validate(&mut self, config: ValidateConfig) -> &mut Self {
        self.hooks.validate = ValidateHook::Static(config);
        self
    }

    /// Computes the rule set from the session when the pipeline runs, so
    /// rules may depend on the scene or key (see [`unique`](Self::unique)).
    pub fn validate_with(
        &mut self,
        build: impl Fn(&FormSession) -> Result<ValidateConfig, FormError> + Send + Sync + 'static,
    ) -> &mut Self {
        self.hooks.validate = ValidateHook::Dynamic(Arc::new(build));
        self
    }

    pub fn prepare_input(
        &mut self,
        f: impl Fn(&mut FormSession) -> Result<(), FormError> + Send + Sync + 'static,
    ) -> &mut Self {
        self.hooks.prepare_input = Some(Arc::new(f));
        self
    }

    pub fn saving(
        &mut self,
        f: impl Fn(&mut FormSession) -> Result<(), FormError> + Send + Sync + 'static,
    ) -> &mut Self {
        self.hooks.saving = Some(Arc::new(f));
        self
    }

    pub fn saved(
        &mut self,
        f: impl Fn(&mut FormSession) -> Result<(), FormError> + Send + Sync + 'static,
    ) -> &mut Self {
        self.hooks.saved = Some(Arc::new(f));
        self
    }

    pub fn deleting(
        &mut self,
        f: impl Fn(&mut FormSession) -> Result<(), FormError> + Send + Sync + 'static,
    ) -> &mut Self {
        self.hooks.deleting = Some(Arc::new(f));
        self
    }

    pub fn deleted(
        &mut self,
        f: impl Fn(&mut FormSession) -> Result<(), FormError> + Send + Sync + 'static,
    ) -> &mut Self {
        self.hooks.deleted = Some(Arc::new(f));
        self
    }

    /// Installs a hook by name, for forms configured from data.
    ///
    /// # Errors
    ///
    /// [`FormError::UnknownHook`] for names outside [`HookName`], and
    /// [`FormError::HookSignature`] when the handler does not fit the hook.
    pub fn register(&mut self, name: &str, hook: Hook) -> Result<&mut Self, FormError> {
        let name: HookName = name.parse()?;
        self.hooks.set(name, hook)?;
        Ok(self)
    }

    // -- accessors ---------------------------------------------------------

    #[must_use]
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    #[must_use]
    pub fn input(&self) -> &RequestInput {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut RequestInput {
        &mut self.input
    }

    #[must_use]
    pub fn scene(&self) -> Option<Scene> {
        self.scene
    }

    #[must_use]
    pub fn key(&self) -> Option<&RecordKey> {
        self.key.as_ref()
    }

    /// The target record: fetched on update/delete, persisted after save.
    #[must_use]
    pub fn record(&self) -> Option<&Record> {
        self.record.as_ref()
    }

    /// Replaces the session's record, e.g. after a hook rewrote it.
    pub fn set_record(&mut self, record: Record) {
        self.record = Some(record);
    }

    /// Data that passed validation, including validate-only fields.
    #[must_use]
    pub fn validated(&self) -> &Fields {
        &self.validated
    }

    pub fn validated_mut(&mut self) -> &mut Fields {
        &mut self.validated
    }

    #[must_use]
    pub fn inline_fields(&self) -> &BTreeSet<String> {
        &self.inline_fields
    }

    #[must_use]
    pub fn is_create(&self) -> bool {
        self.scene == Some(Scene::Create)
    }

    #[must_use]
    pub fn is_update(&self) -> bool {
        self.scene == Some(Scene::Update)
    }

    #[must_use]
    pub fn is_delete(&self) -> bool {
        self.scene == Some(Scene::Delete)
    }

    /// Update requested with PATCH.
    #[must_use]
    pub fn is_inline_update(&self) -> bool {
        self.is_update() && self.input.is_method(&Method::PATCH)
    }

    /// `unique` rule against this session's store. In the update scene the
    /// target record is excluded from the check.
    #[must_use]
    pub fn unique(&self, column: Option<&str>) -> Rule {
        Rule::Unique(UniqueRule {
            check: Arc::new(StoreUniqueCheck::new(self.store.clone())),
            column: column.map(str::to_string),
            ignore: if self.is_update() { self.key.clone() } else { None },
        })
    }

    // -- pipelines ---------------------------------------------------------

    /// Runs the create/update pipeline and returns the persisted record.
    ///
    /// # Errors
    ///
    /// `NotFound` if the update target is missing, `Validation` on invalid
    /// input, `Forbidden` when `auth` declines, any error a hook returns, and
    /// `Store` for persistence failures.
    pub fn save(&mut self) -> Result<Record, FormError> {
        let scene = self.scene.ok_or(FormError::MissingScene)?;
        if scene == Scene::Delete {
            return Err(FormError::InvalidScene {
                scene,
                operation: "save",
            });
        }
        let span = tracing::info_span!("form", scene = %scene, key = ?self.key);
        let _entered = span.enter();

        self.validated.clear();
        self.record = None;

        let target = if scene == Scene::Update {
            let key = self.key.clone().ok_or(FormError::MissingKey { scene })?;
            self.record = Some(self.fetch(&key)?);
            Some(key)
        } else {
            None
        };

        let inline_field = if self.is_inline_update() {
            Some(self.resolve_inline_field()?)
        } else {
            None
        };
        let resolved = rules::resolve(self.validate_config()?, inline_field.as_deref());
        tracing::debug!(rules = resolved.rules.len(), inline = ?inline_field, "validating input");
        self.validated = Validator::new(&resolved.rules, &resolved.options).validate(&self.input)?;

        if !self.authorize()? {
            tracing::debug!("auth hook declined");
            return Err(FormError::Forbidden);
        }

        self.run_stage(HookName::PrepareInput)?;
        self.run_stage(HookName::Saving)?;

        let persist: Fields = self
            .validated
            .iter()
            .filter(|(field, _)| !resolved.erase.contains(*field))
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect();
        let record = match target {
            Some(key) => self.store.update(&key, persist)?,
            None => self.store.create(persist)?,
        };
        tracing::debug!(key = %record.key, "record persisted");
        self.record = Some(record);

        self.run_stage(HookName::Saved)?;

        self.record
            .clone()
            .ok_or_else(|| FormError::Store(anyhow::anyhow!("saved hook cleared the record")))
    }

    /// Runs the delete pipeline. Returns whether the store removed a record.
    ///
    /// # Errors
    ///
    /// `NotFound` if the target is missing, `Forbidden` when `auth`
    /// declines, any error a hook returns, and `Store` for persistence
    /// failures.
    pub fn delete(&mut self) -> Result<bool, FormError> {
        let scene = self.scene.ok_or(FormError::MissingScene)?;
        if scene != Scene::Delete {
            return Err(FormError::InvalidScene {
                scene,
                operation: "delete",
            });
        }
        let key = self.key.clone().ok_or(FormError::MissingKey { scene })?;
        let span = tracing::info_span!("form", scene = %scene, key = %key);
        let _entered = span.enter();

        self.validated.clear();
        self.record = Some(self.fetch(&key)?);

        if !self.authorize()? {
            tracing::debug!("auth hook declined");
            return Err(FormError::Forbidden);
        }

        self.run_stage(HookName::Deleting)?;
        let removed = self.store.delete(&key)?;
        tracing::debug!(removed, "record deleted");
        self.run_stage(HookName::Deleted)?;
        Ok(removed)
    }

    fn fetch(&self, key: &RecordKey) -> Result<Record, FormError> {
        self.store
            .find(key)?
            .ok_or_else(|| FormError::NotFound { key: key.clone() })
    }

    /// Checks the `field`/`value` pair of an inline edit and merges the
    /// value into the input under the field's name.
    fn resolve_inline_field(&mut self) -> Result<String, FormError> {
        let mut missing = ValidationErrors::new();
        if !self.input.filled(INLINE_FIELD_PARAM) {
            missing.add(INLINE_FIELD_PARAM, "The field field is required.");
        }
        if !self.input.has(INLINE_VALUE_PARAM) {
            missing.add(INLINE_VALUE_PARAM, "The value field is required.");
        }
        if !missing.is_empty() {
            return Err(missing.into());
        }

        let field = self.input.string(INLINE_FIELD_PARAM);
        if !self.inline_fields.contains(&field) {
            let message = format!("The {field} field cannot be edited inline.");
            return Err(ValidationErrors::with_message(field, message).into());
        }
        let value = self
            .input
            .input(INLINE_VALUE_PARAM)
            .cloned()
            .unwrap_or_default();
        self.input.merge(field.clone(), value);
        Ok(field)
    }

    fn validate_config(&self) -> Result<ValidateConfig, FormError> {
        match &self.hooks.validate {
            ValidateHook::Static(config) => Ok(config.clone()),
            ValidateHook::Dynamic(build) => build(self),
        }
    }

    fn authorize(&self) -> Result<bool, FormError> {
        match &self.hooks.auth {
            AuthHook::Allow(allow) => Ok(*allow),
            AuthHook::Check(check) => check(self),
        }
    }

    fn run_stage(&mut self, name: HookName) -> Result<(), FormError> {
        if let Some(hook) = self.hooks.stage(name) {
            tracing::debug!(hook = %name, "running hook");
            hook(self)?;
        }
        Ok(())
    }
}
