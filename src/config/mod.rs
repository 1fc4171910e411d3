//! Configuration module for loadstorm
//!
//! This module handles load-test configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Per-profile required settings
//!
//! # Example
//! ```rust,no_run
//! use loadstorm::config::LoadTestConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = LoadTestConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config = LoadTestConfig::from_file(&PathBuf::from("loadstorm.yaml"))?;
//!
//! println!("Testing {}", config.site_url);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use url::Url;

use crate::core::{AssetIndex, AssetRetention, Credentials, Pacing, SessionSettings, SiteContext};
use crate::errors::{ConfigError, ConfigResult};
use crate::scenarios::BehaviorKind;
use crate::scheduler::{RampSchedule, RampStage, ScenarioConfig};

mod env;
mod merge;
mod validation;
mod yaml;

pub use yaml::{ScenarioYaml, YamlConfig};

pub const DEFAULT_CUSTOM_HEADER_NAME: &str = "X-CustomHeader";
pub const DEFAULT_CUSTOM_HEADER_VALUE: &str = "1";
pub const DEFAULT_WP_LOGIN: &str = "wp-login.php";
pub const DEFAULT_DOMAIN_FILTER: &[&str] = &["gravatar.com", "googleapis.com", "stats.wp.com"];
pub const DEFAULT_MIN_PAUSE: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_PAUSE: Duration = Duration::from_secs(10);
pub const DEFAULT_DURATION: Duration = Duration::from_secs(15 * 60);

/// Built-in test plans
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Single GET of the site root per iteration
    Static,
    /// Homepage, wp-login, then every page from the sitemap
    #[default]
    #[value(name = "wordpress")]
    WordPress,
    /// Concurrent homepage / browser / buyer / customer populations
    #[value(name = "woocommerce")]
    WooCommerce,
}

impl Profile {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::WordPress => "wordpress",
            Self::WooCommerce => "woocommerce",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(Self::Static),
            "wordpress" | "loadstorm" => Ok(Self::WordPress),
            "woocommerce" | "woo" => Ok(Self::WooCommerce),
            other => Err(ConfigError::InvalidValue {
                name: "PROFILE",
                reason: format!("unknown profile '{other}'"),
            }),
        }
    }
}

/// A scenario as configured, before its behavior is instantiated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioSettings {
    pub name: String,
    pub behavior: BehaviorKind,
    pub schedule: RampSchedule,
    pub graceful_stop: Duration,
}

impl ScenarioSettings {
    pub fn new(name: impl Into<String>, behavior: BehaviorKind, schedule: RampSchedule) -> Self {
        Self {
            name: name.into(),
            behavior,
            schedule,
            graceful_stop: Duration::ZERO,
        }
    }
}

/// Load-test configuration
///
/// Contains everything needed to run a test:
/// - Target site and request decoration (custom header, cache-bypass cookies)
/// - Login credentials and username range
/// - Pacing bounds and asset discovery settings
/// - Scenario populations
#[derive(Debug, Clone)]
pub struct LoadTestConfig {
    pub profile: Profile,
    /// Site root, always ending in `/`
    pub site_url: Url,

    // Login
    pub username: Option<String>,
    pub password: Option<String>,
    pub username_range_start: Option<u32>,
    pub username_range_end: Option<u32>,
    pub wp_login: String,

    // Request decoration
    pub custom_header_name: String,
    pub custom_header_value: String,
    pub bypass_cache: bool,
    /// Accept invalid TLS certificates
    pub insecure_tls: bool,

    // Asset discovery
    pub domain_filter: Vec<String>,
    pub strip_asset_versions: bool,
    pub asset_retention: AssetRetention,
    pub asset_batch: usize,

    pub min_pause: Duration,
    pub max_pause: Duration,

    // Population
    pub vusers: usize,
    pub duration: Duration,
    pub vusers_home: usize,
    pub vusers_browser: usize,
    pub vusers_buyer: usize,
    pub vusers_customer: usize,

    pub scenarios: Vec<ScenarioSettings>,
}

/// Zeroize the password when the configuration is dropped
impl Drop for LoadTestConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        if let Some(ref mut password) = self.password {
            password.zeroize();
        }
    }
}

impl LoadTestConfig {
    /// Load configuration from environment variables and defaults
    ///
    /// # Errors
    /// Returns an error if a variable cannot be parsed or a setting the
    /// selected profile needs is missing.
    pub fn from_env() -> ConfigResult<Self> {
        Self::load(None, None)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if the YAML file cannot be read or is malformed, or
    /// the merged configuration fails validation.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        Self::load(Some(path), None)
    }

    /// Load with an optional YAML file and an optional profile that takes
    /// precedence over both sources (the `--profile` flag)
    pub fn load(path: Option<&Path>, profile: Option<Profile>) -> ConfigResult<Self> {
        // .env is loaded into the process environment by main
        let yaml_config = path.map(yaml::YamlConfig::from_file).transpose()?;
        let env_config = env::EnvConfig::load()?;

        let config = merge::merge_config(env_config, yaml_config, profile)?;
        validation::validate(&config)?;

        Ok(config)
    }

    /// Whether any configured scenario logs in
    pub fn needs_login(&self) -> bool {
        self.scenarios.iter().any(|s| s.behavior.needs_login())
    }

    /// Whether any configured scenario browses the sitemap
    pub fn needs_sitemap(&self) -> bool {
        self.scenarios.iter().any(|s| s.behavior.needs_sitemap())
    }

    /// Credentials for login behaviors, when configured
    pub fn credentials(&self) -> Option<Credentials> {
        let username = self.username.clone()?;
        let password = self.password.clone()?;
        Some(Credentials {
            username_base: username,
            range_start: self.username_range_start.unwrap_or(1),
            range_end: self.username_range_end.unwrap_or(1),
            password,
        })
    }

    /// Default headers sent with every request
    pub fn headers(&self) -> ConfigResult<HeaderMap> {
        let name = HeaderName::from_bytes(self.custom_header_name.as_bytes()).map_err(|e| {
            ConfigError::InvalidValue {
                name: "CUSTOMHEADERNAME",
                reason: e.to_string(),
            }
        })?;
        let value = HeaderValue::from_str(&self.custom_header_value).map_err(|e| {
            ConfigError::InvalidValue {
                name: "CUSTOMHEADERVALUE",
                reason: e.to_string(),
            }
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(name, value);
        Ok(headers)
    }

    pub fn session_settings(&self) -> ConfigResult<SessionSettings> {
        let mut settings = SessionSettings::new(self.site_url.clone());
        settings.headers = self.headers()?;
        settings.pacing = Pacing::new(self.min_pause, self.max_pause);
        settings.bypass_cache = self.bypass_cache;
        settings.insecure_tls = self.insecure_tls;
        settings.assets = AssetIndex::new(self.domain_filter.clone(), self.strip_asset_versions);
        settings.retention = self.asset_retention;
        Ok(settings)
    }

    /// Shared per-run site context; `pages` is filled in by setup
    pub fn site_context(&self) -> ConfigResult<SiteContext> {
        let mut site = SiteContext::new(self.session_settings()?);
        site.credentials = self.credentials();
        site.wp_login = self.wp_login.clone();
        site.asset_batch = self.asset_batch;
        Ok(site)
    }

    /// Instantiate the behaviors of every configured scenario
    pub fn scenario_configs(&self) -> Vec<ScenarioConfig> {
        self.scenarios
            .iter()
            .map(|s| {
                ScenarioConfig::new(s.name.clone(), s.behavior.build(), s.schedule.clone())
                    .with_graceful_stop(s.graceful_stop)
            })
            .collect()
    }
}

/// Scenario list of a built-in profile
pub fn profile_scenarios(config: &LoadTestConfig) -> ConfigResult<Vec<ScenarioSettings>> {
    let duration = config.duration;
    let scenarios = match config.profile {
        Profile::Static => vec![ScenarioSettings::new(
            "static",
            BehaviorKind::Static,
            RampSchedule::new(1, vec![RampStage::new(duration, config.vusers)])?,
        )],
        Profile::WordPress => vec![ScenarioSettings::new(
            "wordpress",
            BehaviorKind::WordPress,
            RampSchedule::constant(config.vusers, duration),
        )],
        Profile::WooCommerce => {
            // ramp for two thirds of the run, hold for the rest
            let ramp = duration * 2 / 3;
            let hold = duration.saturating_sub(ramp);
            [
                (BehaviorKind::Homepage, config.vusers_home),
                (BehaviorKind::Browser, config.vusers_browser),
                (BehaviorKind::Buyer, config.vusers_buyer),
                (BehaviorKind::Customer, config.vusers_customer),
            ]
            .into_iter()
            .map(|(kind, vusers)| {
                let stages = vec![RampStage::new(ramp, vusers), RampStage::new(hold, vusers)];
                Ok(ScenarioSettings::new(kind.as_str(), kind, RampSchedule::new(1, stages)?))
            })
            .collect::<ConfigResult<Vec<_>>>()?
        }
    };
    Ok(scenarios)
}
