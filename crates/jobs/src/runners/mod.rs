//! Runners shipped with the engine.

pub mod download;
pub mod line_count;

pub use download::{DownloadJobRunner, DownloadJobSpecification};
pub use line_count::{LineCountJobRunner, LineCountJobSpecification};
