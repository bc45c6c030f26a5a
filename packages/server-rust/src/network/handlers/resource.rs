//! Resource endpoints: list, create, batch update, batch delete.

use std::sync::Arc;

use axum::extract::{Path, State};

use super::{blocking, AppState, Input};
use crate::controller::{ApiError, ApiReply};

/// `GET /`: filtered, sorted, paginated listing.
pub async fn index_handler(
    State(state): State<AppState>,
    Input(input): Input,
) -> Result<ApiReply, ApiError> {
    let resource = Arc::clone(&state.resource);
    blocking(move || resource.index(&input)).await
}

/// `POST /`: creates one record.
pub async fn store_handler(
    State(state): State<AppState>,
    Input(input): Input,
) -> Result<ApiReply, ApiError> {
    let resource = Arc::clone(&state.resource);
    blocking(move || resource.store(input)).await
}

/// `PUT|PATCH /{ids}`: updates every listed record.
pub async fn update_handler(
    State(state): State<AppState>,
    Path(ids): Path<String>,
    Input(input): Input,
) -> Result<ApiReply, ApiError> {
    let resource = Arc::clone(&state.resource);
    blocking(move || resource.update(&ids, input)).await
}

/// `DELETE /{ids}`: deletes every listed record.
pub async fn destroy_handler(
    State(state): State<AppState>,
    Path(ids): Path<String>,
    Input(input): Input,
) -> Result<ApiReply, ApiError> {
    let resource = Arc::clone(&state.resource);
    blocking(move || resource.destroy(&ids, input)).await
}
