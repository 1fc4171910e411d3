use std::time::Duration;

use url::Url;

use crate::core::vu::DEFAULT_ASSET_BATCH;
use crate::errors::{ConfigError, ConfigResult};
use crate::scheduler::{RampSchedule, RampStage};
use crate::utils::{ensure_trailing_slash, parse_duration};

use super::env::EnvConfig;
use super::yaml::{ScenarioYaml, YamlConfig};
use super::{
    DEFAULT_CUSTOM_HEADER_NAME, DEFAULT_CUSTOM_HEADER_VALUE, DEFAULT_DOMAIN_FILTER,
    DEFAULT_DURATION, DEFAULT_MAX_PAUSE, DEFAULT_MIN_PAUSE, DEFAULT_WP_LOGIN, LoadTestConfig,
    Profile, ScenarioSettings, profile_scenarios,
};

/// Merge environment values (base) with YAML overrides, then fill defaults
///
/// `profile` comes from the command line and wins over both sources.
pub(crate) fn merge_config(
    mut env: EnvConfig,
    yaml: Option<YamlConfig>,
    profile: Option<Profile>,
) -> ConfigResult<LoadTestConfig> {
    let yaml = yaml.unwrap_or_default();
    let site = yaml.site.unwrap_or_default();
    let mut credentials = yaml.credentials.unwrap_or_default();
    let pacing = yaml.pacing.unwrap_or_default();
    let assets = yaml.assets.unwrap_or_default();
    let load = yaml.load.unwrap_or_default();

    let site_url = site
        .url
        .or_else(|| env.site_url.take())
        .ok_or(ConfigError::MissingVariable("TARGET"))?;
    let site_url = parse_site_url(&site_url)?;

    let min_pause = match pacing.min {
        Some(raw) => parse_duration(&raw)?,
        None => env.min_pause.unwrap_or(DEFAULT_MIN_PAUSE),
    };
    let max_pause = match pacing.max {
        Some(raw) => parse_duration(&raw)?,
        None => env.max_pause.unwrap_or(DEFAULT_MAX_PAUSE),
    };
    let duration = match load.duration {
        Some(raw) => parse_duration(&raw)?,
        None => env.duration.unwrap_or(DEFAULT_DURATION),
    };

    let mut config = LoadTestConfig {
        profile: profile.or(yaml.profile).or(env.profile).unwrap_or_default(),
        site_url,

        username: credentials.username.take().or_else(|| env.username.take()),
        password: credentials.password.take().or_else(|| env.password.take()),
        username_range_start: credentials.range_start.or(env.username_range_start),
        username_range_end: credentials.range_end.or(env.username_range_end),
        wp_login: site
            .wp_login
            .or_else(|| env.wp_login.take())
            .unwrap_or_else(|| DEFAULT_WP_LOGIN.to_string()),

        custom_header_name: site
            .custom_header_name
            .or_else(|| env.custom_header_name.take())
            .unwrap_or_else(|| DEFAULT_CUSTOM_HEADER_NAME.to_string()),
        custom_header_value: site
            .custom_header_value
            .or_else(|| env.custom_header_value.take())
            .unwrap_or_else(|| DEFAULT_CUSTOM_HEADER_VALUE.to_string()),
        bypass_cache: site.bypass_cache.or(env.bypass_cache).unwrap_or(false),
        insecure_tls: site
            .insecure_skip_tls_verify
            .or(env.insecure_tls)
            .unwrap_or(false),

        domain_filter: site
            .domain_filter
            .or_else(|| env.domain_filter.take())
            .unwrap_or_else(|| DEFAULT_DOMAIN_FILTER.iter().map(|d| d.to_string()).collect()),
        strip_asset_versions: assets
            .strip_versions
            .or(env.strip_asset_versions)
            .unwrap_or(false),
        asset_retention: assets
            .retention
            .or(env.asset_retention)
            .unwrap_or_default(),
        asset_batch: assets.batch_size.unwrap_or(DEFAULT_ASSET_BATCH),

        min_pause,
        max_pause,

        vusers: load.vusers.or(env.vusers).unwrap_or(1),
        duration,
        vusers_home: load.home.or(env.vusers_home).unwrap_or(1),
        vusers_browser: load.browser.or(env.vusers_browser).unwrap_or(1),
        vusers_buyer: load.buyer.or(env.vusers_buyer).unwrap_or(1),
        vusers_customer: load.customer.or(env.vusers_customer).unwrap_or(1),

        scenarios: Vec::new(),
    };

    config.scenarios = match yaml.scenarios {
        Some(scenarios) => scenarios
            .iter()
            .map(scenario_from_yaml)
            .collect::<ConfigResult<Vec<_>>>()?,
        None => profile_scenarios(&config)?,
    };

    Ok(config)
}

fn parse_site_url(raw: &str) -> ConfigResult<Url> {
    let url = Url::parse(&ensure_trailing_slash(raw)).map_err(|e| ConfigError::InvalidValue {
        name: "TARGET",
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidValue {
            name: "TARGET",
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    Ok(url)
}

fn scenario_from_yaml(raw: &ScenarioYaml) -> ConfigResult<ScenarioSettings> {
    let invalid = |e: ConfigError| ConfigError::InvalidScenario {
        name: raw.name.clone(),
        reason: e.to_string(),
    };

    let stages = raw
        .stages
        .iter()
        .map(RampStage::try_from)
        .collect::<ConfigResult<Vec<_>>>()
        .map_err(invalid)?;
    let schedule = RampSchedule::new(raw.start.unwrap_or(1), stages).map_err(invalid)?;
    let graceful_stop = raw
        .graceful_stop
        .as_deref()
        .map(parse_duration)
        .transpose()
        .map_err(invalid)?
        .unwrap_or(Duration::ZERO);

    let mut settings = ScenarioSettings::new(raw.name.clone(), raw.behavior, schedule);
    settings.graceful_stop = graceful_stop;
    Ok(settings)
}
