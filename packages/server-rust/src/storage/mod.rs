//! Record storage for the `apikit` server.
//!
//! - [`RecordStore`]: per-collection CRUD and query access consumed by the
//!   form engine, the search compiler, and the config store
//! - [`TransactionScope`]: atomicity boundary around a mutation batch
//! - [`MemoryDatabase`]: in-process implementation of both, with relations
//!   for `Exists` predicates

pub mod engines;
pub mod record_store;

pub use engines::memory::{CollectionDef, KeyMode, MemoryCollection, MemoryDatabase, Relation};
pub use record_store::*;
