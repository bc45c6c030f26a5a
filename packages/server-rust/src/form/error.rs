use apikit_core::{RecordKey, RuleParseError, ValidateError, ValidationErrors};
use http::StatusCode;

use super::{HookName, Scene};

/// Errors raised by a [`FormSession`](super::FormSession) pipeline.
///
/// `Validation`, `Forbidden`, `NotFound`, and `BatchTooLarge` are caller
/// facing. `Store` wraps record store failures verbatim. The remaining
/// variants indicate a misconfigured form.
#[derive(Debug, thiserror::Error)]
pub enum FormError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("this action is unauthorized")]
    Forbidden,

    #[error("record `{key}` not found")]
    NotFound { key: RecordKey },

    #[error("batch of {count} keys exceeds the limit of {max}")]
    BatchTooLarge { count: usize, max: usize },

    /// A hook stage rejected the input with a client-facing message.
    #[error("{0}")]
    Rejected(String),

    #[error("unknown form hook `{0}`")]
    UnknownHook(String),

    #[error("handler does not fit hook `{name}`")]
    HookSignature { name: HookName },

    #[error("form scene is not set")]
    MissingScene,

    #[error("{scene} scene requires a key")]
    MissingKey { scene: Scene },

    #[error("cannot {operation} in {scene} scene")]
    InvalidScene {
        scene: Scene,
        operation: &'static str,
    },

    #[error(transparent)]
    InvalidRules(#[from] RuleParseError),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl From<ValidateError> for FormError {
    fn from(err: ValidateError) -> Self {
        match err {
            ValidateError::Invalid(errors) => FormError::Validation(errors),
            ValidateError::Store(err) => FormError::Store(err),
        }
    }
}

impl FormError {
    /// Transport status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            FormError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            FormError::Forbidden => StatusCode::FORBIDDEN,
            FormError::NotFound { .. } => StatusCode::NOT_FOUND,
            FormError::BatchTooLarge { .. } | FormError::Rejected(_) => StatusCode::BAD_REQUEST,
            FormError::UnknownHook(_)
            | FormError::HookSignature { .. }
            | FormError::MissingScene
            | FormError::MissingKey { .. }
            | FormError::InvalidScene { .. }
            | FormError::InvalidRules(_)
            | FormError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_facing_errors_map_to_client_statuses() {
        let validation = FormError::from(ValidationErrors::with_message("name", "required"));
        assert_eq!(validation.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(FormError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            FormError::NotFound { key: RecordKey::Int(1) }.status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            FormError::BatchTooLarge { count: 101, max: 100 }.status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn store_errors_pass_through_untranslated() {
        let err = FormError::from(anyhow::anyhow!("unique constraint violated"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "unique constraint violated");
    }

    #[test]
    fn failed_lookup_during_validation_is_a_server_error() {
        let err = FormError::from(ValidateError::Store(anyhow::anyhow!("pool timed out")));
        assert!(matches!(err, FormError::Store(_)));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let invalid = FormError::from(ValidateError::Invalid(ValidationErrors::with_message("name", "required")));
        assert_eq!(invalid.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
