//! Slidecut Common Utilities
//!
//! Shared infrastructure for all Slidecut crates:
//! - Error types and result aliases
//! - Pipeline configuration loading and validation
//! - Injectable random source for transition and color choices
//! - Tracing/logging initialization

pub mod config;
pub mod error;
pub mod logging;
pub mod random;

pub use config::*;
pub use error::*;
pub use random::*;
