//! Data storage service: a key/value store of opaque byte blobs.
//!
//! ## Design
//!
//! - Writes stream through a sink returned by `put`, reads through a source
//!   returned by `get`
//! - Keys are opaque strings validated by `depot_core::validate_key`
//! - Blobs know nothing about jobs; the job engine is the only place that ties
//!   a key to a job's lifecycle
//!
//! ## Components
//!
//! - `DataStorageService`: the storage abstraction
//! - `LocalDataStorageService`: one file per key in a directory
//! - `InMemoryDataStorageService`: map-backed store for tests/dev

pub mod config;
pub mod error;
pub mod in_memory;
pub mod local;
pub mod service;

pub use config::StorageConfig;
pub use error::StorageError;
pub use in_memory::InMemoryDataStorageService;
pub use local::LocalDataStorageService;
pub use service::{ByteSink, ByteSource, DataStorageService};
