//! Tracing/logging setup shared by binaries, benches and tests that embed the
//! access-control manager.

pub mod tracing;

pub use self::tracing::{LogFormat, TracingConfig};

/// Initialize process-wide tracing from the environment.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(&TracingConfig::from_env());
}
