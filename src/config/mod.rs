//! # Configuration Management
//!
//! Loads the control plane's process-lifetime configuration from layered
//! sources. Kubernetes object state (HTTPProxy, Ingress, ...) is never
//! configuration — it flows through the [`crate::cache`]/[`crate::dag`]
//! pipeline instead.

pub mod settings;
pub mod tls;

pub use settings::{
    AppConfig, ControlPlaneConfig, KubernetesConfig, ListenerConfig, ObservabilityConfig,
    TlsVersionFloor, XdsConfig,
};
pub use tls::XdsTlsConfig;

use crate::errors::{Error, Result};
use config::{Config, Environment, File};
use std::path::Path;

/// Load application configuration from multiple sources.
///
/// Configuration is loaded in the following order (later sources override
/// earlier ones):
/// 1. Default values
/// 2. Configuration file (if specified)
/// 3. Environment variables with a `GLIDEPATH_` prefix
/// 4. Command-line arguments (via clap, layered on top by the caller)
pub fn load_config<P: AsRef<Path>>(config_path: Option<P>) -> Result<AppConfig> {
    let mut builder = Config::builder();

    builder = builder.add_source(Config::try_from(&AppConfig::default())?);

    if let Some(path) = config_path {
        let path = path.as_ref();
        if path.exists() {
            builder = builder.add_source(File::from(path));
        } else {
            return Err(Error::config(format!("configuration file not found: {}", path.display())));
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("GLIDEPATH").separator("_").try_parsing(true),
    );

    let config = builder
        .build()
        .map_err(|e| Error::config_with_source("failed to build configuration", Box::new(e)))?;

    let mut app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| Error::config_with_source("failed to deserialize configuration", Box::new(e)))?;

    app_config.xds.tls = XdsTlsConfig::from_env()?;
    app_config.validate()?;

    Ok(app_config)
}

/// Load configuration from environment variables only. Useful for
/// containerized deployments that inject config entirely via env.
pub fn load_config_from_env() -> Result<AppConfig> {
    load_config::<&str>(None)
}

/// Load configuration from a YAML file, layered with defaults and env.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    load_config(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Environment variables are process-global; serialize tests that mutate them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn load_default_config() {
        let _guard = ENV_LOCK.lock().unwrap();
        let config = load_config_from_env().unwrap();
        assert_eq!(config.listeners.bind_address, "0.0.0.0");
        assert_eq!(config.listeners.insecure_port, 8080);
        assert_eq!(config.xds.port, 18000);
    }

    #[test]
    fn load_config_from_env_vars() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("GLIDEPATH_XDS_PORT", "19000");
        env::set_var("GLIDEPATH_LISTENERS_INSECURE_PORT", "8090");

        let config = load_config_from_env().unwrap();
        assert_eq!(config.xds.port, 19000);
        assert_eq!(config.listeners.insecure_port, 8090);

        env::remove_var("GLIDEPATH_XDS_PORT");
        env::remove_var("GLIDEPATH_LISTENERS_INSECURE_PORT");
    }

    #[test]
    fn load_config_from_yaml_file() {
        let _guard = ENV_LOCK.lock().unwrap();
        let yaml_content = r#"
listeners:
  bind_address: "127.0.0.1"
  insecure_port: 8081
  secure_port: 8444
  admin_port: 9002
  access_log_path: "/dev/stdout"
  access_log_format: json
  access_log_level: info
xds:
  bind_address: "127.0.0.1"
  port: 18010
  shutdown_deadline_seconds: 5
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml_content.as_bytes()).unwrap();

        let config = load_config_from_file(temp_file.path()).unwrap();
        assert_eq!(config.listeners.bind_address, "127.0.0.1");
        assert_eq!(config.listeners.insecure_port, 8081);
        assert_eq!(config.xds.port, 18010);
    }

    #[test]
    fn load_config_nonexistent_file() {
        let _guard = ENV_LOCK.lock().unwrap();
        let result = load_config_from_file("/nonexistent/file.yaml");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("configuration error"));
    }

    #[test]
    fn env_vars_override_file_which_overrides_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("GLIDEPATH_XDS_PORT", "17777");

        let yaml_content = r#"
listeners:
  bind_address: "10.0.0.1"
  insecure_port: 8080
  secure_port: 8443
  admin_port: 9001
  access_log_path: "/dev/stdout"
  access_log_format: json
  access_log_level: info
xds:
  bind_address: "0.0.0.0"
  port: 18888
  shutdown_deadline_seconds: 5
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml_content.as_bytes()).unwrap();

        let config = load_config_from_file(temp_file.path()).unwrap();

        assert_eq!(config.xds.port, 17777, "env var should override file");
        assert_eq!(config.listeners.bind_address, "10.0.0.1", "file should override default");

        env::remove_var("GLIDEPATH_XDS_PORT");
    }
}
