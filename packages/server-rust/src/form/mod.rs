//! Scene-based form lifecycle engine.
//!
//! A [`FormSession`] drives one create, update, or delete through a fixed
//! hook pipeline:
//!
//! - `save()`: fetch (update) → validate → `auth` → `prepareInput` →
//!   `saving` → persist → `saved`
//! - `delete()`: fetch → `auth` → `deleting` → delete → `deleted`
//!
//! Validation, authorization, and not-found failures abort the pipeline
//! before anything is persisted. Store errors propagate untranslated.

pub mod error;
pub mod hooks;
pub mod rules;
pub mod session;

use std::fmt;
use std::str::FromStr;

pub use error::FormError;
pub use hooks::{AuthHook, Hook, HookName, Hooks, StageFn, ValidateHook};
pub use rules::{ValidateConfig, ERASE_MARKER};
pub use session::FormSession;

/// Operation mode of a form session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scene {
    Create,
    Update,
    Delete,
}

impl Scene {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Scene::Create => "create",
            Scene::Update => "update",
            Scene::Delete => "delete",
        }
    }
}

impl fmt::Display for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scene {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Scene::Create),
            "update" => Ok(Scene::Update),
            "delete" => Ok(Scene::Delete),
            other => Err(format!("unknown scene `{other}`")),
        }
    }
}
