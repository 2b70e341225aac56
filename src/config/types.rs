use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Kumo
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Core engine behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct EngineConfig {
    /// Number of concurrent crawl workers
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Maximum depth to crawl from seed URLs (seeds are depth 0)
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Minimum time between requests to the same authority (milliseconds)
    #[serde(default)]
    pub politeness_delay_ms: u64,

    /// Whether to fetch and honor robots.txt
    #[serde(default = "default_true")]
    pub respect_robots: bool,

    /// Maximum retries per request before it is dropped
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay between retries (milliseconds; reserved for back-off)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Checkpoint save interval in seconds; 0 disables checkpointing
    #[serde(default)]
    pub checkpoint_interval_secs: u64,

    /// Directory for checkpoint files
    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: String,

    /// User-Agent strings, rotated round-robin per request
    #[serde(default = "default_user_agents")]
    pub user_agents: Vec<String>,

    /// If non-empty, only these authorities are crawled
    #[serde(default)]
    pub allowed_domains: Vec<String>,

    /// Authorities that are never crawled (ignored when an allowlist is set)
    #[serde(default)]
    pub disallowed_domains: Vec<String>,

    /// Stop after this many requests have been sent; 0 means unlimited
    #[serde(default)]
    pub max_requests: u64,

    /// Seed URLs to start the crawl from
    #[serde(default)]
    pub seeds: Vec<String>,
}

/// HTTP fetcher behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FetcherConfig {
    /// Follow HTTP redirects automatically
    #[serde(default = "default_true")]
    pub follow_redirects: bool,

    /// Redirect hop limit when following is enabled
    #[serde(default = "default_max_redirects")]
    pub max_redirects: u32,

    /// Response body size cap in bytes
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

/// Output storage behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct StorageConfig {
    /// Output format: "jsonl" or "json"
    #[serde(default = "default_storage_format")]
    pub format: String,

    /// Output file path
    #[serde(default = "default_output_path")]
    pub output_path: String,

    /// Number of items written per storage batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl EngineConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.politeness_delay_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Checkpoint interval, or None when checkpointing is disabled
    pub fn checkpoint_interval(&self) -> Option<Duration> {
        (self.checkpoint_interval_secs > 0)
            .then(|| Duration::from_secs(self.checkpoint_interval_secs))
    }

    /// The primary User-Agent, used for robots.txt fetching and matching
    pub fn primary_user_agent(&self) -> &str {
        self.user_agents
            .first()
            .map(String::as_str)
            .unwrap_or("kumo")
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_depth: default_max_depth(),
            request_timeout_ms: default_request_timeout_ms(),
            politeness_delay_ms: 0,
            respect_robots: true,
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            checkpoint_interval_secs: 0,
            checkpoint_dir: default_checkpoint_dir(),
            user_agents: default_user_agents(),
            allowed_domains: Vec::new(),
            disallowed_domains: Vec::new(),
            max_requests: 0,
            seeds: Vec::new(),
        }
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            follow_redirects: true,
            max_redirects: default_max_redirects(),
            max_body_size: default_max_body_size(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            format: default_storage_format(),
            output_path: default_output_path(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    10
}

fn default_max_depth() -> u32 {
    5
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    5_000
}

fn default_checkpoint_dir() -> String {
    crate::engine::DEFAULT_CHECKPOINT_DIR.to_string()
}

fn default_user_agents() -> Vec<String> {
    vec![concat!("kumo/", env!("CARGO_PKG_VERSION")).to_string()]
}

fn default_max_redirects() -> u32 {
    10
}

fn default_max_body_size() -> usize {
    10 * 1024 * 1024
}

fn default_storage_format() -> String {
    "jsonl".to_string()
}

fn default_output_path() -> String {
    "./output.jsonl".to_string()
}

fn default_batch_size() -> usize {
    50
}
