//! evimport Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging setup for the evimport workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`ImportError`] and the [`Result`] alias
//! - **Logging**: tracing subscriber configuration shared by every binary
//!
//! # Example
//!
//! ```no_run
//! use evimport_common::logging::{init_logging, LogConfig};
//! use evimport_common::{ImportError, Result};
//!
//! fn setup() -> Result<()> {
//!     let config = LogConfig::from_env().map_err(|e| ImportError::Config(e.to_string()))?;
//!     init_logging(&config).map_err(|e| ImportError::Config(e.to_string()))?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{ImportError, Result};
