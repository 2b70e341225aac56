//! Kumo: a polite, concurrent web crawler
//!
//! Kumo turns a set of seed URLs into a controlled stream of fetches. It
//! applies admission policy (depth, domain allow/deny, robots.txt, URL
//! deduplication), schedules work across concurrent workers with per-domain
//! politeness, retries transient failures with back-off, and can checkpoint
//! and resume its state atomically.

pub mod config;
pub mod engine;
pub mod extract;
pub mod fetcher;
pub mod pipeline;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Kumo operations
#[derive(Debug, Error)]
pub enum KumoError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Admission rejected: {0}")]
    Admission(#[from] engine::AdmissionError),

    #[error("Engine is {state}, cannot {operation}")]
    InvalidState {
        state: engine::EngineState,
        operation: &'static str,
    },

    #[error("All seed URLs were rejected during admission")]
    NoSeeds,

    #[error("Fetch error: {0}")]
    Fetch(#[from] fetcher::FetchError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid seed URL: {0}")]
    InvalidSeed(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Kumo operations
pub type Result<T> = std::result::Result<T, KumoError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use engine::{Engine, EngineHandle, EngineState, Request, Response};
pub use pipeline::Item;
pub use url::{canonicalize, fingerprint};
