//! Configuration loading and validation
//!
//! Configuration comes from a TOML file with kebab-case keys. Every option
//! has a default, so an empty file is a valid (if not very useful) config.

mod parser;
mod types;
mod validation;

pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use types::{Config, EngineConfig, FetcherConfig, StorageConfig};
pub use validation::validate;
