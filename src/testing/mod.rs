//! Testing utilities
//!
//! Mock adapters and fixtures to enable testing without external services.

pub mod mocks;
