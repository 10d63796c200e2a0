//! Process-wide tracing setup shared by the gateway binary and its tests.

pub mod tracing;

pub use crate::tracing::LogFormat;

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init(format: LogFormat) {
    tracing::init(format);
}
