//! HTTP transport: router, middleware, and request extraction.

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod module;

pub use config::NetworkConfig;
pub use handlers::{AppState, Input};
pub use module::NetworkModule;
