use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::core::AssetRetention;
use crate::errors::{ConfigError, ConfigResult};
use crate::utils::parse_duration;

use super::Profile;

/// Values read from the process environment (`.env` already applied by `main`)
///
/// Every field is optional here; defaults and YAML overrides are applied in
/// `merge`.
#[derive(Debug, Default)]
pub(crate) struct EnvConfig {
    pub profile: Option<Profile>,
    pub site_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub username_range_start: Option<u32>,
    pub username_range_end: Option<u32>,
    pub custom_header_name: Option<String>,
    pub custom_header_value: Option<String>,
    pub wp_login: Option<String>,
    pub domain_filter: Option<Vec<String>>,
    pub min_pause: Option<Duration>,
    pub max_pause: Option<Duration>,
    pub vusers: Option<usize>,
    pub duration: Option<Duration>,
    pub vusers_home: Option<usize>,
    pub vusers_browser: Option<usize>,
    pub vusers_buyer: Option<usize>,
    pub vusers_customer: Option<usize>,
    pub bypass_cache: Option<bool>,
    pub insecure_tls: Option<bool>,
    pub strip_asset_versions: Option<bool>,
    pub asset_retention: Option<AssetRetention>,
}

impl Drop for EnvConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        if let Some(ref mut password) = self.password {
            password.zeroize();
        }
    }
}

impl EnvConfig {
    pub fn load() -> ConfigResult<Self> {
        Ok(Self {
            profile: parse_var("PROFILE")?,
            // TARGET is the newer name; SITE_URL is what older scripts exported
            site_url: var("TARGET").or_else(|| var("SITE_URL")),
            username: var("WPUSERNAME"),
            password: var("WPPASSWORD"),
            username_range_start: parse_var("WPUSERNAMERANGESTART")?,
            username_range_end: parse_var("WPUSERNAMERANGEEND")?,
            custom_header_name: var("CUSTOMHEADERNAME"),
            custom_header_value: var("CUSTOMHEADERVALUE"),
            wp_login: var("WPLOGIN"),
            domain_filter: var("DOMAINFILTER").map(|v| split_list(&v)),
            min_pause: seconds_var("MINPAUSE")?,
            max_pause: seconds_var("MAXPAUSE")?,
            vusers: parse_var("VUSERS")?,
            duration: var("DURATION").map(|v| parse_duration(&v)).transpose()?,
            vusers_home: parse_var("VUSERSHOME")?,
            vusers_browser: parse_var("VUSERSBROWSER")?,
            vusers_buyer: parse_var("VUSERSBUYER")?,
            vusers_customer: parse_var("VUSERSCUSTOMER")?,
            bypass_cache: var("BYPASS_CACHE").map(|v| truthy(&v)),
            insecure_tls: var("INSECURE_SKIP_TLS_VERIFY").map(|v| truthy(&v)),
            strip_asset_versions: var("STRIP_ASSET_VERSIONS").map(|v| truthy(&v)),
            asset_retention: parse_var("ASSET_RETENTION")?,
        })
    }
}

/// Non-empty value of `name`
fn var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T>(name: &'static str) -> ConfigResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    var(name)
        .map(|v| {
            v.parse::<T>().map_err(|e| ConfigError::InvalidValue {
                name,
                reason: e.to_string(),
            })
        })
        .transpose()
}

/// Pause bounds are given as (possibly fractional) seconds
fn seconds_var(name: &'static str) -> ConfigResult<Option<Duration>> {
    match parse_var::<f64>(name)? {
        Some(secs) if secs.is_finite() && secs >= 0.0 => Ok(Some(Duration::from_secs_f64(secs))),
        Some(secs) => Err(ConfigError::InvalidValue {
            name,
            reason: format!("{secs} is not a valid number of seconds"),
        }),
        None => Ok(None),
    }
}

pub(crate) fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Any set value other than an explicit false switches a flag on
fn truthy(value: &str) -> bool {
    !matches!(
        value.to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}
