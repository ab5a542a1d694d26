//! Primitives shared by the storage and job crates.
//!
//! No IO and no threading lives here.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{new_guid, validate_key};
