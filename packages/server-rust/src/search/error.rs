use http::StatusCode;

/// Errors raised while compiling a filter specification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    #[error("unknown filter operator `{0}`")]
    UnknownOperator(String),

    #[error("filter on `{field}` uses unregistered extension `{name}`")]
    UnknownExtension { field: String, name: String },

    #[error("`between` filter on `{field}` needs two values, got {count}")]
    BetweenArity { field: String, count: usize },
}

impl SearchError {
    /// A missing extension is a server misconfiguration; the rest come from
    /// the filter declaration or the caller's values.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            SearchError::UnknownExtension { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            SearchError::UnknownOperator(_) | SearchError::BetweenArity { .. } => {
                StatusCode::BAD_REQUEST
            }
        }
    }
}
