//! Network module with deferred startup lifecycle.
//!
//! `new()` takes the application state, `start()` binds the TCP listener,
//! and `serve()` accepts connections until the shutdown future resolves.

use std::future::Future;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use super::config::NetworkConfig;
use super::handlers::{
    destroy_handler, health_handler, index_handler, simple_form_handler, store_handler,
    update_handler, AppState,
};
use super::middleware::api_layers;

/// Owns the router state and the listener of one HTTP server.
pub struct NetworkModule {
    config: NetworkConfig,
    state: AppState,
    listener: Option<TcpListener>,
}

impl NetworkModule {
    #[must_use]
    pub fn new(config: NetworkConfig, state: AppState) -> Self {
        Self {
            config,
            state,
            listener: None,
        }
    }

    /// Assembles the axum router with all routes and middleware.
    ///
    /// Routes:
    /// - `GET /health`
    /// - `GET|POST {prefix}` list and create
    /// - `PUT|PATCH|DELETE {prefix}/{ids}` batch update and delete
    /// - `GET|POST /forms/{name}/{scene}` simple forms
    pub fn build_router(&self) -> Router {
        let resource = Router::new()
            .route("/", get(index_handler).post(store_handler))
            .route(
                "/{ids}",
                axum::routing::put(update_handler)
                    .patch(update_handler)
                    .delete(destroy_handler),
            );

        Router::new()
            .route("/health", get(health_handler))
            .route(
                "/forms/{name}/{scene}",
                get(simple_form_handler).post(simple_form_handler),
            )
            .nest(&self.config.resource_prefix, resource)
            .layer(api_layers(&self.config))
            .with_state(self.state.clone())
    }

    /// Binds the TCP listener to the configured host and port.
    ///
    /// Returns the actual bound port, which differs from the configured one
    /// when port 0 is used.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();
        info!(host = %self.config.host, port, "TCP listener bound");
        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves connections until `shutdown` resolves, then lets in-flight
    /// requests finish.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called or the server hits a
    /// fatal I/O error.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let router = self.build_router();
        let listener = self
            .listener
            .take()
            .ok_or_else(|| anyhow::anyhow!("start() must be called before serve()"))?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;
        info!("server stopped");
        Ok(())
    }
}
