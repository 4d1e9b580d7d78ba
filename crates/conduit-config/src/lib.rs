#![allow(clippy::must_use_candidate)]

//! Configuration for the Conduit completion engine
//!
//! A [`Config`] is loaded once from TOML and then treated as an immutable
//! snapshot: callers replace it wholesale instead of patching fields.

pub mod catalog;
mod env;
pub mod limits;
mod loader;
pub mod logging;
pub mod retry;
pub mod sampling;
pub mod server;
pub mod tools;

use serde::Deserialize;

pub use catalog::*;
pub use limits::*;
pub use logging::*;
pub use retry::*;
pub use sampling::*;
pub use server::*;
pub use tools::*;

/// Top-level Conduit configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Inference server connection
    #[serde(default)]
    pub server: ServerConfig,
    /// Context window and output token limits
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Tool-calling behaviour
    #[serde(default)]
    pub tools: ToolsConfig,
    /// Sampling parameters forwarded on every request
    #[serde(default)]
    pub sampling: SamplingConfig,
    /// Retry and backoff parameters
    #[serde(default)]
    pub retry: RetryConfig,
    /// Log level and format
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Model list caching
    #[serde(default)]
    pub catalog: CatalogConfig,
}
