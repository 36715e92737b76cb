//! Process-wide tracing/logging setup shared by every binary and test harness.

pub mod tracing;

pub use crate::tracing::{LogFormat, init_with};

/// Initialize tracing from the environment.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    crate::tracing::init();
}
