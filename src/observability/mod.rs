//! Observability: structured logging for workflow runs.

pub mod logging;

pub use logging::{init_default_logging, init_logging, LogFormat};
