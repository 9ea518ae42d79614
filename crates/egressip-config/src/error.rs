use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "config file not found. Looked at:\n\
        - $EGRESSIP_CONFIG_PATH\n\
        - ./egressip.yaml\n\
        - ~/.config/egressip/config.yaml"
    )]
    ConfigFileNotFound,

    #[error("no provisioner defined - please set environment 'EGRESSIP_PROVISIONER'")]
    NoProvisioner,

    #[error(
        "provisioner type '{0}' is not defined - please use one of: 'cloud', 'ocp-dynamic', or 'ocp-static'"
    )]
    UnknownProvisioner(String),

    #[error("no cloud provider type defined - please set environment 'CLOUD_PROVIDER'")]
    NoCloudProvider,

    #[error("cloud provider type '{0}' is not defined - please use 'aws'")]
    UnknownCloudProvider(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
