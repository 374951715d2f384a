//! Process-wide tracing setup shared by the gateway binary and its tests.

/// Initialize process-wide observability (tracing/logging).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(LogFormat::from_env());
}

/// Install a subscriber that writes through the test harness capture.
pub fn init_for_tests() {
    tracing::init_for_tests();
}

pub use self::tracing::LogFormat;

/// Subscriber construction (filters, formats).
pub mod tracing;
