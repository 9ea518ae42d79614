//! Configuration of the egress IP provisioner
//!
//! The configuration is a YAML file carrying the failure domains and the
//! provisioner selection. The environment variables known from the operator
//! deployment override the provisioner part:
//!
//! - `EGRESSIP_PROVISIONER`: `cloud`, `ocp-static` or `ocp-dynamic`
//! - `CLOUD_PROVIDER`: `aws`
//! - `CLOUD_FAILURE_REGION`: region of the cloud API
//! - `CLOUD_MAX_IPS_PER_INSTANCE`: address limit per network interface

pub mod error;

pub use error::*;

use egressip_core::FailureDomain;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const DEFAULT_FAILURE_REGION: &str = "Kunchom";
pub const DEFAULT_MAX_IPS_PER_INSTANCE: usize = 8;
pub const DEFAULT_STATE_FILE: &str = ".egressip/host-subnets.json";

pub const ENV_CONFIG_PATH: &str = "EGRESSIP_CONFIG_PATH";
pub const ENV_PROVISIONER: &str = "EGRESSIP_PROVISIONER";
pub const ENV_CLOUD_PROVIDER: &str = "CLOUD_PROVIDER";
pub const ENV_FAILURE_REGION: &str = "CLOUD_FAILURE_REGION";
pub const ENV_MAX_IPS_PER_INSTANCE: &str = "CLOUD_MAX_IPS_PER_INSTANCE";

/// Which backends the coordinator is composed of
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ProvisionerConfig {
    /// Addresses owned by a cloud, routed by statically managed host subnets.
    Cloud { cloud: CloudConfig },
    /// No cloud, individual addresses on host subnets.
    OcpStatic,
    /// No cloud, whole ranges per host.
    OcpDynamic,
}

impl ProvisionerConfig {
    pub fn name(&self) -> &'static str {
        match self {
            ProvisionerConfig::Cloud { .. } => "cloud",
            ProvisionerConfig::OcpStatic => "ocp-static",
            ProvisionerConfig::OcpDynamic => "ocp-dynamic",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum CloudConfig {
    Aws {
        #[serde(default = "default_failure_region")]
        failure_region: String,
        #[serde(default = "default_max_ips_per_instance")]
        max_ips_per_instance: usize,
    },
}

impl CloudConfig {
    /// Defaults for the named provider.
    pub fn for_provider(provider: &str) -> Result<Self> {
        match provider {
            "aws" => Ok(CloudConfig::Aws {
                failure_region: default_failure_region(),
                max_ips_per_instance: DEFAULT_MAX_IPS_PER_INSTANCE,
            }),
            other => Err(ConfigError::UnknownCloudProvider(other.to_string())),
        }
    }
}

fn default_failure_region() -> String {
    DEFAULT_FAILURE_REGION.to_string()
}

fn default_max_ips_per_instance() -> usize {
    DEFAULT_MAX_IPS_PER_INSTANCE
}

fn default_state_file() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_FILE)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EgressIpConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioner: Option<ProvisionerConfig>,

    #[serde(default)]
    pub failure_domains: Vec<FailureDomain>,

    /// Host subnet state file of the static and dynamic cluster backends
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
}

impl Default for EgressIpConfig {
    fn default() -> Self {
        Self {
            provisioner: None,
            failure_domains: Vec::new(),
            state_file: default_state_file(),
        }
    }
}

impl EgressIpConfig {
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Load the config file if there is one, apply the process environment
    /// and validate the result.
    pub fn discover() -> Result<Self> {
        let mut config = match find_config_file() {
            Ok(path) => {
                tracing::debug!("Loading config from {}", path.display());
                Self::load(&path)?
            }
            Err(ConfigError::ConfigFileNotFound) => {
                tracing::debug!("No config file found, using environment only");
                Self::default()
            }
            Err(e) => return Err(e),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(kind) = lookup(ENV_PROVISIONER) {
            let provisioner = match kind.trim() {
                "cloud" => {
                    let cloud = match (lookup(ENV_CLOUD_PROVIDER), &self.provisioner) {
                        (Some(provider), _) => CloudConfig::for_provider(provider.trim())?,
                        (None, Some(ProvisionerConfig::Cloud { cloud })) => cloud.clone(),
                        (None, _) => return Err(ConfigError::NoCloudProvider),
                    };
                    ProvisionerConfig::Cloud { cloud }
                }
                "ocp-static" => ProvisionerConfig::OcpStatic,
                "ocp-dynamic" => ProvisionerConfig::OcpDynamic,
                other => return Err(ConfigError::UnknownProvisioner(other.to_string())),
            };
            self.provisioner = Some(provisioner);
        }

        if let Some(ProvisionerConfig::Cloud {
            cloud:
                CloudConfig::Aws {
                    failure_region,
                    max_ips_per_instance,
                },
        }) = &mut self.provisioner
        {
            if let Some(region) = lookup(ENV_FAILURE_REGION) {
                *failure_region = region;
            }
            if let Some(max) = lookup(ENV_MAX_IPS_PER_INSTANCE) {
                *max_ips_per_instance = match max.trim().parse() {
                    Ok(max) => max,
                    Err(_) => {
                        tracing::warn!(
                            "Ignoring invalid {}='{}', using {}",
                            ENV_MAX_IPS_PER_INSTANCE,
                            max,
                            DEFAULT_MAX_IPS_PER_INSTANCE
                        );
                        DEFAULT_MAX_IPS_PER_INSTANCE
                    }
                };
            }
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let provisioner = self.provisioner()?;

        if let ProvisionerConfig::Cloud {
            cloud:
                CloudConfig::Aws {
                    failure_region,
                    max_ips_per_instance,
                },
        } = provisioner
        {
            if failure_region.trim().is_empty() {
                return Err(ConfigError::Invalid("failure region is empty".to_string()));
            }
            if *max_ips_per_instance == 0 {
                return Err(ConfigError::Invalid(
                    "max_ips_per_instance must be at least 1".to_string(),
                ));
            }
        }

        let mut seen = HashSet::new();
        for domain in &self.failure_domains {
            if domain.name.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "failure domain without name".to_string(),
                ));
            }
            if !seen.insert(domain.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "failure domain '{}' is defined twice",
                    domain.name
                )));
            }
        }

        Ok(())
    }

    pub fn provisioner(&self) -> Result<&ProvisionerConfig> {
        self.provisioner.as_ref().ok_or(ConfigError::NoProvisioner)
    }
}

/// Find the config file
///
/// Search order:
/// 1. `EGRESSIP_CONFIG_PATH` (direct path)
/// 2. `./egressip.yaml`
/// 3. `~/.config/egressip/config.yaml`
pub fn find_config_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(ENV_CONFIG_PATH) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
    }

    let local = std::env::current_dir()?.join("egressip.yaml");
    if local.exists() {
        return Ok(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("egressip").join("config.yaml");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::ConfigFileNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;
    use std::fs;

    const SAMPLE: &str = r#"
provisioner:
  type: cloud
  cloud:
    provider: aws
    failure_region: eu-central-1
failure_domains:
  - name: eu-central-1a
    cidr: 10.1.1.0/24
    node_selector:
      match_labels:
        topology.kubernetes.io/zone: eu-central-1a
  - name: eu-central-1b
state_file: /var/lib/egressip/subnets.json
"#;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_parse_sample() {
        let config = EgressIpConfig::from_yaml(SAMPLE).unwrap();

        assert_eq!(
            config.provisioner,
            Some(ProvisionerConfig::Cloud {
                cloud: CloudConfig::Aws {
                    failure_region: "eu-central-1".to_string(),
                    max_ips_per_instance: DEFAULT_MAX_IPS_PER_INSTANCE,
                }
            })
        );
        assert_eq!(config.failure_domains.len(), 2);
        assert!(config.failure_domains[1].cidr.is_none());
        assert_eq!(config.state_file, PathBuf::from("/var/lib/egressip/subnets.json"));
        config.validate().unwrap();
    }

    #[test]
    fn test_defaults() {
        let config = EgressIpConfig::from_yaml("provisioner:\n  type: ocp-dynamic\n").unwrap();
        assert_eq!(config.provisioner, Some(ProvisionerConfig::OcpDynamic));
        assert_eq!(config.state_file, PathBuf::from(DEFAULT_STATE_FILE));
        assert!(config.failure_domains.is_empty());
    }

    #[test]
    fn test_env_selects_cloud_with_defaults() {
        let mut config = EgressIpConfig::default();
        config
            .apply_overrides(env(&[(ENV_PROVISIONER, "cloud"), (ENV_CLOUD_PROVIDER, "aws")]))
            .unwrap();

        assert_eq!(
            config.provisioner().unwrap(),
            &ProvisionerConfig::Cloud {
                cloud: CloudConfig::Aws {
                    failure_region: DEFAULT_FAILURE_REGION.to_string(),
                    max_ips_per_instance: DEFAULT_MAX_IPS_PER_INSTANCE,
                }
            }
        );
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = EgressIpConfig::from_yaml(SAMPLE).unwrap();
        config
            .apply_overrides(env(&[
                (ENV_FAILURE_REGION, "us-east-1"),
                (ENV_MAX_IPS_PER_INSTANCE, "30"),
            ]))
            .unwrap();

        assert_eq!(
            config.provisioner().unwrap(),
            &ProvisionerConfig::Cloud {
                cloud: CloudConfig::Aws {
                    failure_region: "us-east-1".to_string(),
                    max_ips_per_instance: 30,
                }
            }
        );

        config
            .apply_overrides(env(&[(ENV_PROVISIONER, "ocp-static")]))
            .unwrap();
        assert_eq!(config.provisioner().unwrap(), &ProvisionerConfig::OcpStatic);
    }

    #[test]
    fn test_invalid_max_ips_falls_back_to_default() {
        let mut config = EgressIpConfig::from_yaml(SAMPLE).unwrap();
        config
            .apply_overrides(env(&[(ENV_MAX_IPS_PER_INSTANCE, "many")]))
            .unwrap();

        match config.provisioner().unwrap() {
            ProvisionerConfig::Cloud {
                cloud: CloudConfig::Aws {
                    max_ips_per_instance,
                    ..
                },
            } => assert_eq!(*max_ips_per_instance, DEFAULT_MAX_IPS_PER_INSTANCE),
            other => panic!("unexpected provisioner {:?}", other),
        }
    }

    #[test]
    fn test_env_errors() {
        let mut config = EgressIpConfig::default();

        let err = config
            .apply_overrides(env(&[(ENV_PROVISIONER, "gcp-magic")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProvisioner(ref p) if p == "gcp-magic"));

        let err = config
            .apply_overrides(env(&[(ENV_PROVISIONER, "cloud")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::NoCloudProvider));

        let err = config
            .apply_overrides(env(&[(ENV_PROVISIONER, "cloud"), (ENV_CLOUD_PROVIDER, "azure")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownCloudProvider(_)));

        assert!(matches!(config.validate(), Err(ConfigError::NoProvisioner)));
    }

    #[test]
    fn test_validate_rejects_duplicate_domains() {
        let config = EgressIpConfig::from_yaml(
            r#"
provisioner:
  type: ocp-static
failure_domains:
  - name: zone-a
  - name: zone-a
"#,
        )
        .unwrap();

        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    #[serial]
    fn test_find_config_file_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("egressip.yaml"), "provisioner:\n  type: ocp-static\n")
            .unwrap();

        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_config_file();

        std::env::set_current_dir(original_dir).unwrap();
        assert!(result.unwrap().ends_with("egressip.yaml"));
    }

    #[test]
    #[serial]
    fn test_discover_with_env_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("custom.yaml");
        fs::write(&config_path, SAMPLE).unwrap();

        unsafe {
            std::env::set_var(ENV_CONFIG_PATH, config_path.to_str().unwrap());
            std::env::set_var(ENV_PROVISIONER, "ocp-dynamic");
        }

        assert_eq!(find_config_file().unwrap(), config_path);
        let result = EgressIpConfig::discover();

        unsafe {
            std::env::remove_var(ENV_CONFIG_PATH);
            std::env::remove_var(ENV_PROVISIONER);
        }

        let config = result.unwrap();
        assert_eq!(config.provisioner().unwrap(), &ProvisionerConfig::OcpDynamic);
        assert_eq!(config.failure_domains.len(), 2);
    }
}
