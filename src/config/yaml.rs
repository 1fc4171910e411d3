use serde::Deserialize;
use std::path::Path;

use crate::core::AssetRetention;
use crate::errors::{ConfigError, ConfigResult};
use crate::scenarios::BehaviorKind;
use crate::scheduler::RampStageYaml;

use super::Profile;

/// Complete YAML configuration structure
///
/// All fields are optional; anything present overrides the environment.
///
/// # Example YAML structure
/// ```yaml
/// profile: woocommerce
///
/// site:
///   url: "https://shop.example.com"
///   wp_login: "wp-login.php"
///   custom_header_name: "X-Load-Test"
///   custom_header_value: "1"
///   domain_filter: ["gravatar.com", "googleapis.com"]
///   bypass_cache: true
///   insecure_skip_tls_verify: false
///
/// credentials:
///   username: "loadtest"
///   password: "secret"
///   range_start: 1
///   range_end: 100
///
/// pacing:
///   min: "5s"
///   max: "10s"
///
/// assets:
///   strip_versions: true
///   retention: vu
///   batch_size: 20
///
/// load:
///   vusers: 50
///   duration: "15m"
///   home: 10
///   browser: 10
///   buyer: 5
///   customer: 5
///
/// scenarios:
///   - name: "browsers"
///     behavior: browser
///     start: 1
///     graceful_stop: "30s"
///     stages:
///       - duration: "10m"
///         target: 20
///       - duration: "5m"
///         target: 20
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub profile: Option<Profile>,
    pub site: Option<SiteYaml>,
    pub credentials: Option<CredentialsYaml>,
    pub pacing: Option<PacingYaml>,
    pub assets: Option<AssetsYaml>,
    pub load: Option<LoadYaml>,
    /// Replaces the profile's scenario list entirely
    pub scenarios: Option<Vec<ScenarioYaml>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SiteYaml {
    pub url: Option<String>,
    pub wp_login: Option<String>,
    pub custom_header_name: Option<String>,
    pub custom_header_value: Option<String>,
    pub domain_filter: Option<Vec<String>>,
    pub bypass_cache: Option<bool>,
    pub insecure_skip_tls_verify: Option<bool>,
}

/// Missing keys read as `None`. Must not carry `#[serde(default)]` while it has a `Drop`
#[derive(Clone, Deserialize, Default)]
pub struct CredentialsYaml {
    pub username: Option<String>,
    pub password: Option<String>,
    pub range_start: Option<u32>,
    pub range_end: Option<u32>,
}

impl std::fmt::Debug for CredentialsYaml {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsYaml")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("range_start", &self.range_start)
            .field("range_end", &self.range_end)
            .finish()
    }
}

impl Drop for CredentialsYaml {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        if let Some(ref mut password) = self.password {
            password.zeroize();
        }
    }
}

/// Think-time bounds; bare numbers are seconds
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PacingYaml {
    pub min: Option<String>,
    pub max: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AssetsYaml {
    pub strip_versions: Option<bool>,
    pub retention: Option<AssetRetention>,
    pub batch_size: Option<usize>,
}

/// Population sizes used by the built-in profiles
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LoadYaml {
    pub vusers: Option<usize>,
    pub duration: Option<String>,
    pub home: Option<usize>,
    pub browser: Option<usize>,
    pub buyer: Option<usize>,
    pub customer: Option<usize>,
}

/// One explicitly configured scenario
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioYaml {
    pub name: String,
    pub behavior: BehaviorKind,
    #[serde(default)]
    pub start: Option<usize>,
    #[serde(default)]
    pub graceful_stop: Option<String>,
    pub stages: Vec<RampStageYaml>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the YAML is malformed
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.display().to_string(),
            source,
        })?;

        let config: YamlConfig = serde_yaml::from_str(&contents)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_config_full() {
        let yaml = r#"
profile: woocommerce
site:
  url: "https://shop.example.com"
  domain_filter: ["gravatar.com"]
  bypass_cache: true
credentials:
  username: "loadtest"
  password: "secret"
  range_start: 1
  range_end: 50
pacing:
  min: "1s"
  max: "2"
assets:
  retention: vu
  batch_size: 8
load:
  vusers: 10
  duration: "5m"
scenarios:
  - name: "buyers"
    behavior: buyer
    stages:
      - duration: "1m"
        target: 5
"#;
        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.profile, Some(Profile::WooCommerce));
        let site = config.site.as_ref().unwrap();
        assert_eq!(site.url.as_deref(), Some("https://shop.example.com"));
        assert_eq!(site.bypass_cache, Some(true));
        assert_eq!(config.credentials.as_ref().unwrap().range_end, Some(50));
        assert_eq!(config.pacing.as_ref().unwrap().max.as_deref(), Some("2"));
        let assets = config.assets.as_ref().unwrap();
        assert_eq!(assets.retention, Some(AssetRetention::VirtualUser));
        assert_eq!(assets.batch_size, Some(8));

        let scenarios = config.scenarios.as_ref().unwrap();
        assert_eq!(scenarios.len(), 1);
        assert_eq!(scenarios[0].behavior, BehaviorKind::Buyer);
        assert_eq!(scenarios[0].stages[0].target, 5);
        assert!(scenarios[0].start.is_none());
    }

    #[test]
    fn test_yaml_config_empty() {
        let config: YamlConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.site.is_none());
        assert!(config.scenarios.is_none());
    }

    #[test]
    fn test_unknown_behavior_rejected() {
        let yaml = r#"
scenarios:
  - name: "x"
    behavior: shoplifter
    stages: []
"#;
        assert!(serde_yaml::from_str::<YamlConfig>(yaml).is_err());
    }

    #[test]
    fn test_partial_credentials_block() {
        let yaml = r#"
credentials:
  username: "loadtest"
"#;
        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();
        let creds = config.credentials.as_ref().unwrap();
        assert_eq!(creds.username.as_deref(), Some("loadtest"));
        assert!(creds.password.is_none());
        assert!(creds.range_start.is_none());
        assert!(creds.range_end.is_none());
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = CredentialsYaml {
            username: Some("loadtest".to_string()),
            password: Some("hunter2".to_string()),
            range_start: None,
            range_end: None,
        };
        assert!(!format!("{creds:?}").contains("hunter2"));
    }

    #[test]
    fn test_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "site:\n  url: \"https://example.com\"\n").unwrap();

        let config = YamlConfig::from_file(&path).unwrap();
        assert_eq!(
            config.site.unwrap().url.as_deref(),
            Some("https://example.com")
        );
    }

    #[test]
    fn test_from_file_not_found() {
        let err = YamlConfig::from_file(Path::new("/nonexistent/loadstorm.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_from_file_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "site: [unclosed").unwrap();

        let err = YamlConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }
}
