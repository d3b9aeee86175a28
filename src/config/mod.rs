//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)          CLI flags / GRPC_* env vars
//!     → loader.rs (parse)         │
//!     → BootstrapConfig ◀─────────┘ overrides
//!     → validation.rs (semantic checks, sentinel resolution)
//!     → ServerConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once validated
//! - All raw fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BootstrapConfig, GatewayPort, LimitsConfig, LogFormat, ObservabilityConfig, ServerConfig,
    ServerSettings, Transport,
};
pub use validation::{validate_config, ValidationError};
