//! Asynchronous job orchestration engine.
//!
//! ## Design
//!
//! - A job is an immutable, typed specification plus mutable run-state
//! - Submissions can coalesce onto an equivalent queued/started job
//! - One runner per job type code, registered once at startup
//! - Runners execute on a fixed pool of worker threads, off the caller's path
//! - Runner output is stored as opaque blobs in a `DataStorageService` and
//!   purged together with the job once its time-to-live elapses
//!
//! ## Components
//!
//! - `JobSpecification`: what to run (type code, guid, owner, inputs, ttl)
//! - `Job`: snapshot of a specification and its lifecycle timestamps
//! - `JobRunner` / `JobRunnerRegistry`: per-type execution
//! - `JobService`: submission, coalescing, dispatch, queries, expiry
//! - `JobMaintenance`: periodic expiry sweep

pub mod api;
pub mod config;
pub mod data;
pub mod error;
pub mod job;
pub mod maintenance;
pub mod query;
pub mod runner;
pub mod runners;
pub mod service;
pub mod specification;

pub use config::{ConfigError, JobServiceConfig};
pub use data::{JobData, JobDataEncoding, JobDataWithByteSink};
pub use error::{JobRunnerError, JobServiceError};
pub use job::{Job, JobStatus};
pub use maintenance::{JobMaintenance, JobMaintenanceHandle};
pub use query::JobQuery;
pub use runner::{JobRunner, JobRunnerRegistry};
pub use service::{CoalesceMode, JobService};
pub use specification::{JobSpecification, SpecificationBase};
