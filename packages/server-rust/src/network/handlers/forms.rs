//! Simple form endpoint.

use std::sync::Arc;

use axum::extract::{Path, State};

use super::{blocking, AppState, Input};
use crate::controller::{ApiError, ApiReply};

/// `GET|POST /forms/{name}/{scene}`.
pub async fn simple_form_handler(
    State(state): State<AppState>,
    Path((name, scene)): Path<(String, String)>,
    Input(input): Input,
) -> Result<ApiReply, ApiError> {
    let forms = Arc::clone(&state.forms);
    blocking(move || forms.dispatch(&name, &scene, &input)).await
}
