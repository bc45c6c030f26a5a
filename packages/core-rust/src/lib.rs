//! `apikit` Core: record values, query builder model, validation rules, and
//! the configuration value codec.

pub mod config_value;
pub mod input;
pub mod query;
pub mod tree;
pub mod types;
pub mod validation;

pub use config_value::{ConfigNumber, ConfigValue};
pub use input::{is_blank, RequestInput};
pub use query::{Boolean, CompareOp, Order, Predicate, QueryBuilder, SortDirection, UnknownToken};
pub use tree::{list_to_tree, TreeShape};
pub use types::{Fields, Record, RecordKey, Value};
pub use validation::{
    FieldRules, Rule, RuleParseError, UniqueCheck, UniqueRule, ValidateError, ValidationErrors,
    Validator, ValidatorOptions,
};

