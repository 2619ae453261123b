use crate::config::types::{Config, CrawlerConfig, Destination, JobConfig, LogConfig, OutputConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_job_config(&config.job)?;
    validate_output_config(&config.output)?;
    validate_log_config(&config.log)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 || config.concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 100, got {}",
            config.concurrency
        )));
    }

    if config.request_timeout < 1 {
        return Err(ConfigError::Validation(
            "request-timeout must be >= 1 second".to_string(),
        ));
    }

    if config.stats_interval < 1 {
        return Err(ConfigError::Validation(
            "stats-interval must be >= 1 second".to_string(),
        ));
    }

    for proxy in &config.proxies {
        Url::parse(proxy)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy '{}': {}", proxy, e)))?;
    }

    for name in config.headers.keys() {
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(ConfigError::Validation(format!(
                "Invalid header name '{}'",
                name
            )));
        }
    }

    Ok(())
}

/// Validates the job source: exactly one of server-url and directory
fn validate_job_config(config: &JobConfig) -> Result<(), ConfigError> {
    match (&config.server_url, &config.directory) {
        (Some(server_url), None) => {
            Url::parse(server_url).map_err(|e| {
                ConfigError::InvalidUrl(format!("Invalid server-url '{}': {}", server_url, e))
            })?;
            Ok(())
        }
        (None, Some(directory)) if !directory.is_empty() => Ok(()),
        (None, Some(_)) => Err(ConfigError::Validation(
            "job directory cannot be empty".to_string(),
        )),
        (Some(_), Some(_)) => Err(ConfigError::Validation(
            "set only one of job.server-url and job.directory".to_string(),
        )),
        (None, None) => Err(ConfigError::Validation(
            "one of job.server-url and job.directory is required".to_string(),
        )),
    }
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.destination == Destination::Local
        && config.file.as_deref().map_or(true, str::is_empty)
    {
        return Err(ConfigError::Validation(
            "output.file must be specified for the local destination".to_string(),
        ));
    }

    Ok(())
}

/// Validates the per-job log file settings
fn validate_log_config(config: &LogConfig) -> Result<(), ConfigError> {
    if !config.enabled {
        return Ok(());
    }

    if config.directory.is_empty() {
        return Err(ConfigError::Validation(
            "log.directory cannot be empty".to_string(),
        ));
    }

    if config.max_file_size < 1024 {
        return Err(ConfigError::Validation(format!(
            "log.max-file-size must be at least 1024 bytes, got {}",
            config.max_file_size
        )));
    }

    Ok(())
}
