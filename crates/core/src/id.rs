//! Guid generation and key validation.
//!
//! Job guids and storage keys are plain strings. Anything the engine
//! generates is a UUIDv7, but callers (and tests) may use any string that
//! passes [`validate_key`], so nothing downstream parses them.

use uuid::Uuid;

use crate::error::{DomainError, DomainResult};

/// Generate a fresh guid.
///
/// Uses UUIDv7 (time-ordered) so generated keys sort roughly by creation.
pub fn new_guid() -> String {
    Uuid::now_v7().to_string()
}

/// Check that `key` is usable both as a guid and as a storage key.
///
/// Allowed: ASCII alphanumerics, `-`, `_` and `.`; must be non-empty and must
/// not start with `.` (keeps keys from addressing anything outside a storage
/// directory).
pub fn validate_key(key: &str) -> DomainResult<()> {
    if key.is_empty() {
        return Err(DomainError::invalid_id("key must not be empty"));
    }

    if key.starts_with('.') {
        return Err(DomainError::invalid_id(format!("key must not start with '.': {key}")));
    }

    if let Some(c) = key
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(DomainError::invalid_id(format!(
            "key contains illegal character {c:?}: {key}"
        )));
    }

    Ok(())
}
