//! HTTP handlers and the shared state they extract.

pub mod forms;
pub mod health;
pub mod input;
pub mod resource;

pub use forms::simple_form_handler;
pub use health::health_handler;
pub use input::Input;
pub use resource::{destroy_handler, index_handler, store_handler, update_handler};

use std::sync::Arc;
use std::time::Instant;

use crate::controller::{ApiError, ApiReply, ResourceController, SimpleFormRegistry};

/// Shared application state passed to all axum handlers via `State` extraction.
#[derive(Clone)]
pub struct AppState {
    /// The resource served under the configured prefix.
    pub resource: Arc<dyn ResourceController>,
    /// Simple forms served under `/forms/{name}/{scene}`.
    pub forms: Arc<SimpleFormRegistry>,
    /// Server process start time, used for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    #[must_use]
    pub fn new(resource: Arc<dyn ResourceController>, forms: SimpleFormRegistry) -> Self {
        Self {
            resource,
            forms: Arc::new(forms),
            start_time: Instant::now(),
        }
    }
}

/// Runs synchronous controller work off the async runtime.
async fn blocking<F>(work: F) -> Result<ApiReply, ApiError>
where
    F: FnOnce() -> Result<ApiReply, ApiError> + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result,
        Err(err) => Err(ApiError::Store(anyhow::Error::new(err))),
    }
}
