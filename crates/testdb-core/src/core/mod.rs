//! Internal implementation modules for `testdb-core`.
//!
//! Most callers should go through `testdb_core::api` rather than importing
//! these modules directly.

pub mod config;
pub mod fixtures;
pub mod runtime;
pub mod tooling;
