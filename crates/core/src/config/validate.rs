use std::collections::HashSet;

use super::{types::Config, ConfigError};

/// Validate configuration beyond what serde enforces.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.index.token.is_empty() {
        return Err(ConfigError::ValidationError(
            "index.token is required for cross-seed lookups".to_string(),
        ));
    }

    if !config.run.include_trackers.is_empty() && !config.run.exclude_trackers.is_empty() {
        return Err(ConfigError::ValidationError(
            "run.include_trackers and run.exclude_trackers cannot both be set".to_string(),
        ));
    }

    let mut names = HashSet::new();
    for client in &config.clients {
        if client.name.is_empty() {
            return Err(ConfigError::ValidationError(
                "client name cannot be empty".to_string(),
            ));
        }
        if !names.insert(client.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate client name: {}",
                client.name
            )));
        }
    }

    let mut names = HashSet::new();
    for tracker in &config.trackers {
        if tracker.name.is_empty() {
            return Err(ConfigError::ValidationError(
                "tracker name cannot be empty".to_string(),
            ));
        }
        if !names.insert(tracker.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate tracker name: {}",
                tracker.name
            )));
        }
    }

    if config.index.staleness_secs < 0 {
        return Err(ConfigError::ValidationError(
            "index.staleness_secs cannot be negative".to_string(),
        ));
    }

    Ok(())
}
