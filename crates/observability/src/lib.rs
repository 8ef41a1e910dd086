//! `jobhub-observability` — process-level tracing/logging setup.

mod tracing_init;

pub use tracing_init::init;
