//! Named extension points of the form pipeline.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::rules::ValidateConfig;
use super::{FormError, FormSession};

/// Identifier of a form hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookName {
    Auth,
    Validate,
    PrepareInput,
    Saving,
    Saved,
    Deleting,
    Deleted,
}

impl HookName {
    pub const ALL: [HookName; 7] = [
        HookName::Auth,
        HookName::Validate,
        HookName::PrepareInput,
        HookName::Saving,
        HookName::Saved,
        HookName::Deleting,
        HookName::Deleted,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HookName::Auth => "auth",
            HookName::Validate => "validate",
            HookName::PrepareInput => "prepareInput",
            HookName::Saving => "saving",
            HookName::Saved => "saved",
            HookName::Deleting => "deleting",
            HookName::Deleted => "deleted",
        }
    }
}

impl fmt::Display for HookName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HookName {
    type Err = FormError;

    /// Accepts `prepareInput` and `prepare_input` spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prepare_input" => Ok(HookName::PrepareInput),
            other => HookName::ALL
                .into_iter()
                .find(|name| name.as_str() == other)
                .ok_or_else(|| FormError::UnknownHook(other.to_string())),
        }
    }
}

pub type AuthFn = Arc<dyn Fn(&FormSession) -> Result<bool, FormError> + Send + Sync>;
pub type ValidateFn = Arc<dyn Fn(&FormSession) -> Result<ValidateConfig, FormError> + Send + Sync>;
/// Stage hook: runs with mutable access to the session.
pub type StageFn = Arc<dyn Fn(&mut FormSession) -> Result<(), FormError> + Send + Sync>;

/// `auth` hook: a fixed answer or a check against the session.
#[derive(Clone)]
pub enum AuthHook {
    Allow(bool),
    Check(AuthFn),
}

/// `validate` hook: a fixed rule set or one computed from the session.
#[derive(Clone)]
pub enum ValidateHook {
    Static(ValidateConfig),
    Dynamic(ValidateFn),
}

/// A handler for any hook, used by name-based registration.
#[derive(Clone)]
pub enum Hook {
    Auth(AuthHook),
    Validate(ValidateHook),
    Stage(StageFn),
}

impl Hook {
    pub fn stage(
        f: impl Fn(&mut FormSession) -> Result<(), FormError> + Send + Sync + 'static,
    ) -> Self {
        Hook::Stage(Arc::new(f))
    }
}

/// The hook table of one session. Unset stage hooks are no-ops.
#[derive(Clone)]
pub struct Hooks {
    pub(super) auth: AuthHook,
    pub(super) validate: ValidateHook,
    pub(super) prepare_input: Option<StageFn>,
    pub(super) saving: Option<StageFn>,
    pub(super) saved: Option<StageFn>,
    pub(super) deleting: Option<StageFn>,
    pub(super) deleted: Option<StageFn>,
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            auth: AuthHook::Allow(true),
            validate: ValidateHook::Static(ValidateConfig::default()),
            prepare_input: None,
            saving: None,
            saved: None,
            deleting: None,
            deleted: None,
        }
    }
}

impl Hooks {
    /// Installs `hook` under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::HookSignature`] when the handler kind does not
    /// fit the named hook.
    pub fn set(&mut self, name: HookName, hook: Hook) -> Result<(), FormError> {
        match (name, hook) {
            (HookName::Auth, Hook::Auth(auth)) => self.auth = auth,
            (HookName::Validate, Hook::Validate(validate)) => self.validate = validate,
            (stage, Hook::Stage(f)) => match self.stage_slot(stage) {
                Some(slot) => *slot = Some(f),
                None => return Err(FormError::HookSignature { name }),
            },
            _ => return Err(FormError::HookSignature { name }),
        }
        Ok(())
    }

    pub(super) fn stage(&self, name: HookName) -> Option<StageFn> {
        match name {
            HookName::PrepareInput => self.prepare_input.clone(),
            HookName::Saving => self.saving.clone(),
            HookName::Saved => self.saved.clone(),
            HookName::Deleting => self.deleting.clone(),
            HookName::Deleted => self.deleted.clone(),
            HookName::Auth | HookName::Validate => None,
        }
    }

    fn stage_slot(&mut self, name: HookName) -> Option<&mut Option<StageFn>> {
        match name {
            HookName::PrepareInput => Some(&mut self.prepare_input),
            HookName::Saving => Some(&mut self.saving),
            HookName::Saved => Some(&mut self.saved),
            HookName::Deleting => Some(&mut self.deleting),
            HookName::Deleted => Some(&mut self.deleted),
            HookName::Auth | HookName::Validate => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_names_parse_both_spellings() {
        assert_eq!("prepareInput".parse::<HookName>().unwrap(), HookName::PrepareInput);
        assert_eq!("prepare_input".parse::<HookName>().unwrap(), HookName::PrepareInput);
        for name in HookName::ALL {
            assert_eq!(name.as_str().parse::<HookName>().unwrap(), name);
        }
    }

    #[test]
    fn unknown_hook_name_is_rejected() {
        let err = "beforeSave".parse::<HookName>().unwrap_err();
        assert!(matches!(err, FormError::UnknownHook(ref name) if name == "beforeSave"));
    }

    #[test]
    fn mismatched_handler_is_rejected() {
        let mut hooks = Hooks::default();
        let err = hooks
            .set(HookName::Auth, Hook::stage(|_| Ok(())))
            .unwrap_err();
        assert!(matches!(err, FormError::HookSignature { name: HookName::Auth }));
        assert!(hooks
            .set(HookName::Saving, Hook::Auth(AuthHook::Allow(false)))
            .is_err());
        assert!(hooks.set(HookName::Saving, Hook::stage(|_| Ok(()))).is_ok());
        assert!(hooks.stage(HookName::Saving).is_some());
        assert!(hooks.stage(HookName::Saved).is_none());
    }
}
