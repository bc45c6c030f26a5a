//! `apikit` Server: scene-based form lifecycle engine, declarative search
//! compiler, cache-aside configuration store, and the HTTP glue exposing
//! them as resource and simple-form endpoints.

pub mod cache;
pub mod config;
pub mod controller;
pub mod form;
pub mod network;
pub mod search;
pub mod storage;
pub mod sysconfig;
pub mod tree;

pub use config::KitConfig;
pub use controller::{ApiError, ApiReply, ResourceController};
pub use form::{FormError, FormSession, Scene};
pub use storage::{MemoryDatabase, RecordStore, TransactionScope};
pub use sysconfig::ConfigStore;
