//! Storage engine implementations.

pub mod memory;
