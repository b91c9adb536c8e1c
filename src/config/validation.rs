use crate::config::types::{
    ChunkingConfig, Config, LimitConfig, PoolConfig, ProxyConfig, SearchConfig, UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_search_config(&config.search)?;
    validate_proxy_config(&config.proxy)?;
    validate_pool_config(&config.pools)?;
    validate_limit_config(&config.limits)?;
    validate_chunking_config(&config.chunking)?;
    validate_user_agent_config(&config.user_agent)?;

    if config.output.root.is_empty() {
        return Err(ConfigError::Validation(
            "output root cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates the search endpoint template
fn validate_search_config(config: &SearchConfig) -> Result<(), ConfigError> {
    if !config.endpoint.contains("{query}") {
        return Err(ConfigError::Validation(format!(
            "search endpoint must contain a {{query}} placeholder, got '{}'",
            config.endpoint
        )));
    }

    // Substitute a dummy query to check the rest of the template parses
    let probe = config.endpoint.replace("{query}", "probe");
    Url::parse(&probe)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid search endpoint: {}", e)))?;

    if config.result_limit == 0 {
        return Err(ConfigError::Validation(
            "result-limit must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates proxy endpoints and backoff parameters
fn validate_proxy_config(config: &ProxyConfig) -> Result<(), ConfigError> {
    for endpoint in &config.endpoints {
        let url = Url::parse(endpoint)
            .map_err(|e| ConfigError::InvalidProxy(format!("'{}': {}", endpoint, e)))?;
        if url.scheme() != "http" && url.scheme() != "https" && url.scheme() != "socks5" {
            return Err(ConfigError::InvalidProxy(format!(
                "'{}': unsupported scheme '{}'",
                endpoint,
                url.scheme()
            )));
        }
    }

    if config.backoff_base_ms == 0 {
        return Err(ConfigError::Validation(
            "backoff-base-ms must be >= 1".to_string(),
        ));
    }

    if config.backoff_cap_ms < config.backoff_base_ms {
        return Err(ConfigError::Validation(format!(
            "backoff-cap-ms ({}) must be >= backoff-base-ms ({})",
            config.backoff_cap_ms, config.backoff_base_ms
        )));
    }

    if config.request_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "request-timeout-ms must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates worker pool sizes
fn validate_pool_config(config: &PoolConfig) -> Result<(), ConfigError> {
    for (name, size) in [
        ("discovery", config.discovery),
        ("expansion", config.expansion),
        ("crawl", config.crawl),
    ] {
        if size < 1 || size > 100 {
            return Err(ConfigError::Validation(format!(
                "pools.{} must be between 1 and 100, got {}",
                name, size
            )));
        }
    }
    Ok(())
}

/// Validates retry and watchdog limits
fn validate_limit_config(config: &LimitConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(
            "max-attempts must be >= 1".to_string(),
        ));
    }

    if config.sitemap_max_depth < 1 {
        return Err(ConfigError::Validation(
            "sitemap-max-depth must be >= 1".to_string(),
        ));
    }

    if config.stall_window_secs < 1 {
        return Err(ConfigError::Validation(
            "stall-window-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates chunking parameters
fn validate_chunking_config(config: &ChunkingConfig) -> Result<(), ConfigError> {
    if config.chunk_size < 1 {
        return Err(ConfigError::Validation(
            "chunk-size must be >= 1".to_string(),
        ));
    }

    if config.chunk_overlap >= config.chunk_size {
        return Err(ConfigError::Validation(format!(
            "chunk-overlap ({}) must be smaller than chunk-size ({})",
            config.chunk_overlap, config.chunk_size
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    Ok(())
}
