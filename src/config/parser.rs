use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads, parses, and validates a TOML configuration file
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Used to detect whether the configuration changed between a checkpointed
/// run and its resume.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns it together with its content hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const VALID_CONFIG: &str = r#"
[engine]
concurrency = 4
max-depth = 2
politeness-delay-ms = 250
respect-robots = false
user-agents = ["TestBot/1.0"]
seeds = ["http://example.com/"]

[storage]
format = "jsonl"
output-path = "./out.jsonl"
batch-size = 10
"#;

    #[test]
    fn test_load_valid_config() {
        let file = create_temp_config(VALID_CONFIG);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.engine.concurrency, 4);
        assert_eq!(config.engine.max_depth, 2);
        assert_eq!(
            config.engine.politeness_delay(),
            std::time::Duration::from_millis(250)
        );
        assert!(!config.engine.respect_robots);
        assert_eq!(config.engine.seeds, vec!["http://example.com/"]);
        assert_eq!(config.storage.batch_size, 10);
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let file = create_temp_config("");
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.engine.concurrency, 10);
        assert_eq!(config.engine.max_depth, 5);
        assert!(config.engine.respect_robots);
        assert_eq!(config.engine.max_requests, 0);
        assert!(config.engine.checkpoint_interval().is_none());
        assert_eq!(config.storage.format, "jsonl");
    }

    #[test]
    fn test_invalid_toml_rejected() {
        let file = create_temp_config("[engine\nconcurrency = ");
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let file = create_temp_config("[engine]\nmax-deepness = 3\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_validation_applied_on_load() {
        let file = create_temp_config("[engine]\nconcurrency = 0\n");
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_config_hash_stable_and_sensitive() {
        let file = create_temp_config(VALID_CONFIG);
        let h1 = compute_config_hash(file.path()).unwrap();
        let h2 = compute_config_hash(file.path()).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);

        let other = create_temp_config("[engine]\nconcurrency = 2\n");
        let h3 = compute_config_hash(other.path()).unwrap();
        assert_ne!(h1, h3);
    }

    #[test]
    fn test_load_with_hash() {
        let file = create_temp_config(VALID_CONFIG);
        let (config, hash) = load_config_with_hash(file.path()).unwrap();
        assert_eq!(config.engine.concurrency, 4);
        assert_eq!(hash, compute_config_hash(file.path()).unwrap());
    }
}
