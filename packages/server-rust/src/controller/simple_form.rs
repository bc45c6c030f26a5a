//! Single-endpoint forms addressed by route name and scene.
//!
//! A GET replies with the form's current defaults. A POST validates the
//! input through [`SimpleForm::policy`], hands the result to
//! [`SimpleForm::handle`] inside one transaction, then replies with the
//! refreshed defaults.

use std::collections::HashMap;
use std::sync::Arc;

use apikit_core::{Fields, RequestInput, Validator};
use http::Method;
use serde_json::{Map, Value as JsonValue};

use super::{ApiError, ApiReply};
use crate::form::{rules, FormError, ValidateConfig};
use crate::storage::{transaction, TransactionScope};
use crate::sysconfig::ConfigStore;

/// A config-driven form with no record identity.
pub trait SimpleForm: Send {
    /// Validates the request and returns the accepted data.
    ///
    /// # Errors
    ///
    /// Validation or authorization failures.
    fn policy(&self, input: &RequestInput) -> Result<Fields, ApiError>;

    /// Applies accepted data.
    ///
    /// # Errors
    ///
    /// Any failure aborts and rolls back the surrounding transaction.
    fn handle(&self, data: Fields) -> Result<(), ApiError>;

    /// Current values shown to the caller.
    ///
    /// # Errors
    ///
    /// Failures reading the backing data.
    fn defaults(&self) -> Result<JsonValue, ApiError>;
}

/// Builds a fresh form instance per request.
pub type SimpleFormFactory = Arc<dyn Fn() -> Box<dyn SimpleForm> + Send + Sync>;

/// Routes `(name, scene)` pairs to simple forms.
pub struct SimpleFormRegistry {
    forms: HashMap<(String, String), SimpleFormFactory>,
    transactions: Arc<dyn TransactionScope>,
}

impl SimpleFormRegistry {
    #[must_use]
    pub fn new(transactions: Arc<dyn TransactionScope>) -> Self {
        Self {
            forms: HashMap::new(),
            transactions,
        }
    }

    #[must_use]
    pub fn register(
        mut self,
        name: impl Into<String>,
        scene: impl Into<String>,
        factory: impl Fn() -> Box<dyn SimpleForm> + Send + Sync + 'static,
    ) -> Self {
        self.forms
            .insert((name.into(), scene.into()), Arc::new(factory));
        self
    }

    #[must_use]
    pub fn contains(&self, name: &str, scene: &str) -> bool {
        self.forms
            .contains_key(&(name.to_string(), scene.to_string()))
    }

    /// Serves one request for the form registered under `name`/`scene`.
    ///
    /// # Errors
    ///
    /// [`ApiError::RouteNotFound`] for an unregistered pair, otherwise the
    /// form's own failures.
    pub fn dispatch(
        &self,
        name: &str,
        scene: &str,
        input: &RequestInput,
    ) -> Result<ApiReply, ApiError> {
        let factory = self
            .forms
            .get(&(name.to_string(), scene.to_string()))
            .ok_or(ApiError::RouteNotFound)?;
        let form = factory();

        if input.is_method(&Method::POST) {
            tracing::debug!(form = name, scene, "handling simple form submission");
            transaction(self.transactions.as_ref(), || {
                form.handle(form.policy(input)?)
            })?;
        }
        Ok(ApiReply::success(form.defaults()?))
    }
}

// ---------------------------------------------------------------------------
// ConfigForm
// ---------------------------------------------------------------------------

/// Edits system configuration slugs through the cached [`ConfigStore`].
///
/// Rule keys are config slugs. Keys carrying the erase marker are
/// validated but not written.
pub struct ConfigForm {
    store: Arc<ConfigStore>,
    rules: ValidateConfig,
}

impl ConfigForm {
    #[must_use]
    pub fn new(store: Arc<ConfigStore>, rules: ValidateConfig) -> Self {
        Self { store, rules }
    }
}

impl SimpleForm for ConfigForm {
    fn policy(&self, input: &RequestInput) -> Result<Fields, ApiError> {
        let resolved = rules::resolve(self.rules.clone(), None);
        let mut data = Validator::new(&resolved.rules, &resolved.options)
            .validate(input)
            .map_err(FormError::from)?;
        data.retain(|slug, _| !resolved.erase.contains(slug));
        Ok(data)
    }

    fn handle(&self, data: Fields) -> Result<(), ApiError> {
        self.store.set_many(
            data.into_iter()
                .map(|(slug, value)| (slug, JsonValue::from(value))),
        )?;
        Ok(())
    }

    fn defaults(&self) -> Result<JsonValue, ApiError> {
        let values: Map<String, JsonValue> = self
            .store
            .get_all()?
            .iter()
            .map(|(slug, value)| (slug.clone(), value.to_json()))
            .collect();
        Ok(JsonValue::Object(values))
    }
}
