//! # Error Handling
//!
//! Crate-wide error type for process-level failures: configuration load
//! failure, gRPC transport setup failure, Kubernetes client/watch failure,
//! and internal invariant violations.
//!
//! Per-object validation failures (an invalid `HTTPProxy`, an unresolvable
//! TLS secret, ...) are never represented here — those are `ObjectStatus`
//! values produced by the DAG builder, not `Result::Err`. This type is only
//! for failures that should stop or degrade the process itself.

pub mod tls;

pub use tls::TlsError;

/// Result type for control-plane operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Configuration load or validation errors.
    #[error("configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// I/O errors with additional context.
    #[error("I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    /// Serialization/deserialization errors (config files, CRD payloads).
    #[error("serialization error: {context}")]
    Serialization {
        #[source]
        source: serde_json::Error,
        context: String,
    },

    /// Configuration/CLI validation errors.
    #[error("validation error: {message}")]
    Validation { message: String, field: Option<String> },

    /// xDS protocol / gRPC transport errors.
    #[error("xDS error: {message}")]
    Xds { message: String, node_id: Option<String> },

    /// Kubernetes client or watch-stream errors.
    #[error("kubernetes error: {context}")]
    Kubernetes {
        #[source]
        source: kube::Error,
        context: String,
    },

    /// Internal invariants that should never happen.
    #[error("internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Transport/bind errors for the xDS gRPC server.
    #[error("transport error: {0}")]
    Transport(String),

    /// Parsing/decoding errors.
    #[error("parse error: {context}")]
    Parse {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), source: None }
    }

    pub fn config_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Config { message: message.into(), source: Some(source) }
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into(), field: None }
    }

    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation { message: message.into(), field: Some(field.into()) }
    }

    pub fn xds<S: Into<String>>(message: S) -> Self {
        Self::Xds { message: message.into(), node_id: None }
    }

    pub fn xds_with_node<S: Into<String>, N: Into<String>>(message: S, node_id: N) -> Self {
        Self::Xds { message: message.into(), node_id: Some(node_id.into()) }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport(message.into())
    }

    pub fn parse<S: Into<String>>(context: S) -> Self {
        Self::Parse { context: context.into(), source: None }
    }

    pub fn parse_with_source<S: Into<String>>(
        context: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Parse { context: context.into(), source: Some(source) }
    }

    pub fn kubernetes<S: Into<String>>(source: kube::Error, context: S) -> Self {
        Self::Kubernetes { source, context: context.into() }
    }

    /// Whether the external collaborator that produced this error should
    /// retry with backoff rather than the process treating it as fatal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Io { .. } | Error::Kubernetes { .. } | Error::Transport(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io { source: error, context: "I/O operation failed".to_string() }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization { source: error, context: "JSON serialization failed".to_string() }
    }
}

impl From<config::ConfigError> for Error {
    fn from(error: config::ConfigError) -> Self {
        Self::config_with_source("configuration loading failed", Box::new(error))
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| {
                        e.message.as_ref().map_or("invalid value".to_string(), |m| m.to_string())
                    })
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::validation(format!("validation failed: {}", message))
    }
}

impl From<TlsError> for Error {
    fn from(error: TlsError) -> Self {
        Self::Config { message: error.to_string(), source: None }
    }
}

impl From<kube::Error> for Error {
    fn from(error: kube::Error) -> Self {
        Self::kubernetes(error, "kubernetes client operation failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_formats_message() {
        let error = Error::config("bad listener address");
        assert!(matches!(error, Error::Config { .. }));
        assert_eq!(error.to_string(), "configuration error: bad listener address");
    }

    #[test]
    fn validation_error_carries_field() {
        let error = Error::validation_field("must not be empty", "fqdn");
        match error {
            Error::Validation { field, .. } => assert_eq!(field, Some("fqdn".to_string())),
            _ => panic!("expected Validation variant"),
        }
    }

    #[test]
    fn io_errors_are_retryable_transport_errors_are_not_fatal_but_retryable() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let error: Error = io.into();
        assert!(error.is_retryable());
        assert!(!Error::validation("test").is_retryable());
    }

    #[test]
    fn io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: Error = io_error.into();
        assert!(matches!(error, Error::Io { .. }));
    }
}
