//! # Configuration Settings
//!
//! Defines the process-lifetime configuration surface for the control
//! plane: the recognized options of SPEC_FULL.md §6 plus the ambient
//! fields (xDS bind/TLS, logging, metrics, Kubernetes client) a runnable
//! binary needs on top of them.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Top-level configuration, loaded once at startup and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct AppConfig {
    #[validate(nested)]
    pub listeners: ListenerConfig,

    #[validate(nested)]
    pub xds: XdsConfig,

    #[validate(nested)]
    pub observability: ObservabilityConfig,

    #[validate(nested)]
    pub kubernetes: KubernetesConfig,

    #[validate(nested)]
    pub control_plane: ControlPlaneConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(Error::from)?;
        self.validate_custom()?;
        Ok(())
    }

    fn validate_custom(&self) -> Result<()> {
        if self.listeners.insecure_port == self.listeners.secure_port {
            return Err(Error::validation("insecure and secure listener ports must differ"));
        }
        if self.listeners.insecure_port == self.xds.port {
            return Err(Error::validation("insecure listener and xDS ports cannot be the same"));
        }
        if self.control_plane.tls_min_version > self.control_plane.tls_max_version {
            return Err(Error::validation("tls_min_version cannot exceed tls_max_version"));
        }
        Ok(())
    }
}

/// Insecure/secure/admin listener addresses Envoy itself will bind, as
/// configured on the control plane (the control plane does not open these
/// sockets — it only tells Envoy, via the DAG, to).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ListenerConfig {
    #[validate(length(min = 1))]
    pub bind_address: String,

    #[validate(range(min = 1, max = 65535))]
    pub insecure_port: u16,

    #[validate(range(min = 1, max = 65535))]
    pub secure_port: u16,

    #[validate(range(min = 1, max = 65535))]
    pub admin_port: u16,

    pub access_log_path: String,
    pub access_log_format: AccessLogFormat,
    pub access_log_level: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            insecure_port: 8080,
            secure_port: 8443,
            admin_port: 9001,
            access_log_path: "/dev/stdout".to_string(),
            access_log_format: AccessLogFormat::Json,
            access_log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLogFormat {
    Json,
    Text,
}

/// Process-lifetime control-plane behaviour: TLS floors, header handling,
/// socket options, and the cross-cutting policy bindings named in §6.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ControlPlaneConfig {
    pub tls_min_version: TlsVersionFloor,
    pub tls_max_version: TlsVersionFloor,
    pub cipher_suites: Vec<String>,

    #[validate(range(max = 255))]
    pub xff_trusted_hops: u32,

    pub proxy_protocol_enabled: bool,
    pub server_header_transformation: ServerHeaderTransformation,
    pub socket_options: SocketOptionsConfig,

    pub fallback_certificate: Option<NamespacedName>,
    pub global_ext_authz: Option<ExtensionServiceRef>,
    pub global_rate_limit: Option<RateLimitServiceRef>,

    /// Empty means "all namespaces are root namespaces".
    pub root_namespaces: Vec<String>,
    pub leader_election_namespace: String,
    pub strip_trailing_host_dot: bool,
    pub external_name_enabled: bool,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            tls_min_version: TlsVersionFloor::V1_2,
            tls_max_version: TlsVersionFloor::V1_3,
            cipher_suites: Vec::new(),
            xff_trusted_hops: 0,
            proxy_protocol_enabled: false,
            server_header_transformation: ServerHeaderTransformation::Overwrite,
            socket_options: SocketOptionsConfig::default(),
            fallback_certificate: None,
            global_ext_authz: None,
            global_rate_limit: None,
            root_namespaces: Vec::new(),
            leader_election_namespace: "glidepath-system".to_string(),
            strip_trailing_host_dot: false,
            external_name_enabled: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TlsVersionFloor {
    #[serde(rename = "1.2")]
    V1_2,
    #[serde(rename = "1.3")]
    V1_3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerHeaderTransformation {
    Overwrite,
    AppendIfAbsent,
    PassThrough,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketOptionsConfig {
    pub tcp_keepalive: bool,
    pub ipv4_tos: Option<u8>,
    pub ipv6_traffic_class: Option<u8>,
}

impl Default for SocketOptionsConfig {
    fn default() -> Self {
        Self { tcp_keepalive: true, ipv4_tos: None, ipv6_traffic_class: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespacedName {
    pub namespace: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionServiceRef {
    pub namespace: String,
    pub name: String,
    pub fail_open: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitServiceRef {
    pub namespace: String,
    pub name: String,
    pub domain: String,
}

/// xDS gRPC server bind address, port, and optional TLS.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct XdsConfig {
    #[validate(length(min = 1))]
    pub bind_address: String,

    #[validate(range(min = 1, max = 65535))]
    pub port: u16,

    /// Graceful-shutdown drain deadline; bounded per §5.
    #[validate(range(min = 1, max = 300))]
    pub shutdown_deadline_seconds: u64,

    #[serde(skip)]
    pub tls: Option<super::tls::XdsTlsConfig>,
}

impl Default for XdsConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 18000,
            shutdown_deadline_seconds: 5,
            tls: None,
        }
    }
}

impl XdsConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn shutdown_deadline(&self) -> Duration {
        Duration::from_secs(self.shutdown_deadline_seconds)
    }
}

/// Logging/metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,

    #[validate(length(min = 1))]
    pub log_level: String,

    /// 0 disables the metrics listener.
    #[validate(range(max = 65535))]
    pub metrics_port: u16,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { log_format: LogFormat::Text, log_level: "info".to_string(), metrics_port: 9090 }
    }
}

impl ObservabilityConfig {
    pub fn metrics_bind_address(&self) -> Option<String> {
        (self.metrics_port != 0).then(|| format!("0.0.0.0:{}", self.metrics_port))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Json,
    Text,
}

/// How the process reaches the Kubernetes API.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct KubernetesConfig {
    pub kubeconfig_path: Option<String>,
    pub in_cluster: bool,
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self { kubeconfig_path: None, in_cluster: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn xds_bind_addr_formats_host_and_port() {
        let config = XdsConfig { bind_address: "127.0.0.1".to_string(), port: 18000, ..Default::default() };
        assert_eq!(config.bind_addr(), "127.0.0.1:18000");
    }

    #[test]
    fn metrics_bind_address_is_none_when_disabled() {
        let config = ObservabilityConfig { metrics_port: 0, ..Default::default() };
        assert_eq!(config.metrics_bind_address(), None);
    }

    #[test]
    fn rejects_clashing_insecure_and_secure_ports() {
        let mut config = AppConfig::default();
        config.listeners.secure_port = config.listeners.insecure_port;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_inverted_tls_version_floor() {
        let mut config = AppConfig::default();
        config.control_plane.tls_min_version = TlsVersionFloor::V1_3;
        config.control_plane.tls_max_version = TlsVersionFloor::V1_2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn tls_version_floor_orders_1_2_below_1_3() {
        assert!(TlsVersionFloor::V1_2 < TlsVersionFloor::V1_3);
    }
}
