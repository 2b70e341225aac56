use crate::config::Config;
use crate::ConfigError;
use url::Url;

/// Validates a loaded configuration
///
/// Checks the constraints the engine assumes at runtime so misconfiguration
/// fails at startup instead of mid-crawl.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.engine.concurrency == 0 {
        return Err(ConfigError::Validation(
            "engine.concurrency must be at least 1".to_string(),
        ));
    }

    if config.engine.request_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "engine.request-timeout-ms must be positive".to_string(),
        ));
    }

    if config.engine.user_agents.is_empty()
        || config.engine.user_agents.iter().any(|ua| ua.trim().is_empty())
    {
        return Err(ConfigError::Validation(
            "engine.user-agents must contain at least one non-empty entry".to_string(),
        ));
    }

    for domain in &config.engine.allowed_domains {
        if config.engine.disallowed_domains.contains(domain) {
            return Err(ConfigError::Validation(format!(
                "domain {:?} is both allowed and disallowed",
                domain
            )));
        }
    }

    for seed in &config.engine.seeds {
        let url = Url::parse(seed).map_err(|_| ConfigError::InvalidSeed(seed.clone()))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidSeed(seed.clone()));
        }
    }

    if config.storage.batch_size == 0 {
        return Err(ConfigError::Validation(
            "storage.batch-size must be at least 1".to_string(),
        ));
    }

    match config.storage.format.as_str() {
        "jsonl" | "json" => {}
        other => {
            return Err(ConfigError::Validation(format!(
                "storage.format must be \"jsonl\" or \"json\", got {:?}",
                other
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = Config::default();
        config.engine.concurrency = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = Config::default();
        config.engine.request_timeout_ms = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_user_agents_rejected() {
        let mut config = Config::default();
        config.engine.user_agents = Vec::new();
        assert!(validate(&config).is_err());

        config.engine.user_agents = vec!["  ".to_string()];
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_domain_in_both_lists_rejected() {
        let mut config = Config::default();
        config.engine.allowed_domains = vec!["example.com".to_string()];
        config.engine.disallowed_domains = vec!["example.com".to_string()];
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_bad_seed_rejected() {
        let mut config = Config::default();
        config.engine.seeds = vec!["ftp://example.com/".to_string()];
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidSeed(_))
        ));

        config.engine.seeds = vec!["not a url".to_string()];
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_good_seeds_accepted() {
        let mut config = Config::default();
        config.engine.seeds = vec![
            "http://example.com/".to_string(),
            "https://example.org/page".to_string(),
        ];
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut config = Config::default();
        config.storage.batch_size = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_unknown_storage_format_rejected() {
        let mut config = Config::default();
        config.storage.format = "xml".to_string();
        assert!(validate(&config).is_err());
    }
}
