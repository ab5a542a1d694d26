//! Tracing/logging setup shared by the depot binaries.

/// Initialize process-wide logging.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Initialize logging for tests: human-readable output captured by the test
/// harness, `debug` unless `RUST_LOG` says otherwise.
pub fn init_for_tests() {
    tracing::init_for_tests();
}

/// Subscriber configuration (filters, layers).
pub mod tracing;
