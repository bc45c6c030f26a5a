//! Validation configuration and its resolution into a rule set.
//!
//! A rule key prefixed with [`ERASE_MARKER`] is validated like any other
//! field but left out of the persistence write. Only top-level keys are
//! erased; a marked nested path (`!meta.title`) keeps its rule and is
//! persisted with its parent.

use std::collections::BTreeSet;

use apikit_core::{FieldRules, RuleParseError, ValidatorOptions};

/// Prefix marking a field as validate-only.
pub const ERASE_MARKER: char = '!';

/// Rules returned by the `validate` hook plus extra validator options.
#[derive(Debug, Clone, Default)]
pub struct ValidateConfig {
    pub rules: Vec<(String, FieldRules)>,
    pub options: ValidatorOptions,
}

impl ValidateConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `(field, "rule|rule:arg")` pairs.
    ///
    /// # Errors
    ///
    /// Returns the first rule string that fails to parse.
    pub fn parse<'a>(
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, RuleParseError> {
        let rules = pairs
            .into_iter()
            .map(|(field, spec)| FieldRules::parse(spec).map(|rules| (field.to_string(), rules)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            rules,
            options: ValidatorOptions::default(),
        })
    }

    #[must_use]
    pub fn rule(mut self, field: impl Into<String>, rules: impl Into<FieldRules>) -> Self {
        self.rules.push((field.into(), rules.into()));
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: ValidatorOptions) -> Self {
        self.options = options;
        self
    }
}

/// Rule set ready for the validator, plus the fields to drop before persisting.
#[derive(Debug, Default)]
pub(crate) struct ResolvedRules {
    pub rules: Vec<(String, FieldRules)>,
    pub options: ValidatorOptions,
    pub erase: BTreeSet<String>,
}

/// Strips erase markers and, for inline edits, keeps only the rules of
/// `inline_field` and its nested paths.
pub(crate) fn resolve(config: ValidateConfig, inline_field: Option<&str>) -> ResolvedRules {
    let mut resolved = ResolvedRules {
        options: config.options,
        ..ResolvedRules::default()
    };
    for (key, rules) in config.rules {
        let field = match key.strip_prefix(ERASE_MARKER) {
            Some(real) => {
                if !real.contains('.') {
                    resolved.erase.insert(real.to_string());
                }
                real.to_string()
            }
            None => key,
        };
        if let Some(target) = inline_field {
            if !targets_field(&field, target) {
                continue;
            }
        }
        resolved.rules.push((field, rules));
    }
    resolved
}

fn targets_field(key: &str, field: &str) -> bool {
    key == field
        || key
            .strip_prefix(field)
            .is_some_and(|rest| rest.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ValidateConfig {
        ValidateConfig::parse([
            ("name", "required|string"),
            ("!password_confirmation", "required"),
            ("!meta.secret", "string"),
            ("status", "integer"),
            ("status_note", "string"),
        ])
        .unwrap()
    }

    fn keys(resolved: &ResolvedRules) -> Vec<&str> {
        resolved.rules.iter().map(|(k, _)| k.as_str()).collect()
    }

    #[test]
    fn erase_marker_applies_to_top_level_keys_only() {
        let resolved = resolve(config(), None);
        assert_eq!(
            keys(&resolved),
            vec!["name", "password_confirmation", "meta.secret", "status", "status_note"]
        );
        assert_eq!(
            resolved.erase.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["password_confirmation"]
        );
    }

    #[test]
    fn inline_mode_keeps_only_the_target_field() {
        let resolved = resolve(config(), Some("status"));
        assert_eq!(keys(&resolved), vec!["status"]);

        let resolved = resolve(config(), Some("meta"));
        assert_eq!(keys(&resolved), vec!["meta.secret"]);

        let resolved = resolve(config(), Some("password_confirmation"));
        assert_eq!(keys(&resolved), vec!["password_confirmation"]);
        assert!(resolved.erase.contains("password_confirmation"));
    }

    #[test]
    fn invalid_rule_strings_fail_to_parse() {
        assert!(ValidateConfig::parse([("name", "required|bogus")]).is_err());
    }
}
