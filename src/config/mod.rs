//! Configuration loaded from environment variables.
//!
//! # Example
//!
//! ```rust,ignore
//! use exchange_ctx::config::{ContextConfig, LoggingConfig};
//!
//! let logging = LoggingConfig::from_env()?;
//! let config = ContextConfig::from_env()?.with_host("example.org");
//! ```

mod context;
mod error;
mod logging;
mod parse;

pub use context::{ContextConfig, RequestIdConfig};
pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use parse::parse_duration;
