//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, deserialize, environment overrides)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Environment variables override file values

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load, load_config, load_from_env, ConfigError, ConfigOverrides, LoadedConfig};
pub use schema::{
    AppConfig, BodyLimits, ObservabilityConfig, PipelineSettings, RoutesConfig, RuntimeMode,
    ServerConfig, ShutdownConfig,
};
pub use validation::ValidationError;
