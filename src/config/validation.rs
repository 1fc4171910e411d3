use crate::errors::{ConfigError, ConfigResult};

use super::LoadTestConfig;

/// Check the merged configuration before any traffic is generated
///
/// Login behaviors need the full credential set; everything else only needs
/// the site URL, which `merge` already enforces.
pub(crate) fn validate(config: &LoadTestConfig) -> ConfigResult<()> {
    if config.needs_login() {
        validate_credentials(config)?;
    }
    validate_pacing(config)?;
    validate_scenarios(config)
}

fn validate_credentials(config: &LoadTestConfig) -> ConfigResult<()> {
    if config.username.is_none() {
        return Err(ConfigError::MissingVariable("WPUSERNAME"));
    }
    if config.password.is_none() {
        return Err(ConfigError::MissingVariable("WPPASSWORD"));
    }
    let start = config
        .username_range_start
        .ok_or(ConfigError::MissingVariable("WPUSERNAMERANGESTART"))?;
    let end = config
        .username_range_end
        .ok_or(ConfigError::MissingVariable("WPUSERNAMERANGEEND"))?;
    if end < start {
        return Err(ConfigError::InvalidValue {
            name: "WPUSERNAMERANGEEND",
            reason: format!("range end {end} is below range start {start}"),
        });
    }
    Ok(())
}

fn validate_pacing(config: &LoadTestConfig) -> ConfigResult<()> {
    if config.max_pause < config.min_pause {
        return Err(ConfigError::InvalidValue {
            name: "MAXPAUSE",
            reason: format!(
                "{:?} is shorter than the minimum pause {:?}",
                config.max_pause, config.min_pause
            ),
        });
    }
    Ok(())
}

fn validate_scenarios(config: &LoadTestConfig) -> ConfigResult<()> {
    if config.scenarios.is_empty() {
        return Err(ConfigError::InvalidValue {
            name: "scenarios",
            reason: "no scenarios configured".to_string(),
        });
    }

    let mut seen = std::collections::HashSet::new();
    for scenario in &config.scenarios {
        if !seen.insert(scenario.name.as_str()) {
            return Err(ConfigError::InvalidScenario {
                name: scenario.name.clone(),
                reason: "duplicate scenario name".to_string(),
            });
        }
    }
    Ok(())
}
