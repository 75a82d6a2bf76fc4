//! Rowcast Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Pieces shared by every rowcast binary:
//!
//! - **Logging**: `tracing` subscriber setup driven by `LOG_*` variables
//! - **Environment**: typed lookups for required and defaulted variables

pub mod env;
pub mod logging;

pub use env::EnvError;
