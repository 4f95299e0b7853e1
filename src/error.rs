//! Error types for gantry

use std::time::Duration;

use thiserror::Error;

/// Main error type for install and composition operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Invalid or missing configuration (values file, overrides)
    #[error("config error: {0}")]
    Config(String),

    /// Control-plane login failure (network, non-2xx, malformed body)
    #[error("bootstrap error: {0}")]
    Bootstrap(String),

    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// HTTP transport error from the control-plane client
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Values file parse error
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A composed resource was rejected by the cluster API
    #[error("apply failed for {kind}/{name}: {message}")]
    Apply {
        /// Resource kind
        kind: String,
        /// Resource name
        name: String,
        /// Error message from the API server
        message: String,
    },

    /// The readiness gate did not open within the configured deadline
    #[error("timed out after {waited:?} waiting for pods matching '{selector}' to be Ready")]
    ReadyTimeout {
        /// Label selector the gate was watching
        selector: String,
        /// How long the gate waited before giving up
        waited: Duration,
    },

    /// The downstream ingestion job could not be triggered or exited non-zero
    #[error("ingestion error: {0}")]
    Ingestion(String),
}

impl Error {
    /// Create a config error with the given message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a bootstrap error with the given message
    pub fn bootstrap(msg: impl Into<String>) -> Self {
        Self::Bootstrap(msg.into())
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create an ingestion error with the given message
    pub fn ingestion(msg: impl Into<String>) -> Self {
        Self::Ingestion(msg.into())
    }

    /// Create an apply error for the given resource
    pub fn apply(kind: impl Into<String>, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Apply {
            kind: kind.into(),
            name: name.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Story: configuration problems surface before anything touches the cluster
    ///
    /// A missing values file or an unresolvable override aborts the run with
    /// a clear message, before bootstrap or provisioning starts.
    #[test]
    fn story_config_errors_abort_before_side_effects() {
        let err = Error::config("values file not found: ./values.yaml");
        assert!(err.to_string().contains("config error"));
        assert!(err.to_string().contains("values.yaml"));

        match Error::config("any message") {
            Error::Config(msg) => assert_eq!(msg, "any message"),
            _ => panic!("Expected Config variant"),
        }
    }

    /// Story: login failures carry the control-plane response
    ///
    /// A 401 from the session endpoint or a body without a token field is
    /// fatal; the message tells the operator what the control plane said.
    #[test]
    fn story_bootstrap_errors_are_fatal_and_descriptive() {
        let err = Error::bootstrap("login failed: HTTP 401 Unauthorized");
        assert!(err.to_string().contains("bootstrap error"));
        assert!(err.to_string().contains("401"));

        let err = Error::bootstrap("session response has no 'token' field");
        assert!(err.to_string().contains("token"));
    }

    /// Story: apply failures name the rejected resource
    #[test]
    fn story_apply_errors_identify_the_resource() {
        let err = Error::apply("Deployment", "chat-tools-argocd", "admission denied");
        let msg = err.to_string();
        assert!(msg.contains("Deployment/chat-tools-argocd"));
        assert!(msg.contains("admission denied"));
    }

    /// Story: the readiness gate reports a typed timeout instead of stalling
    #[test]
    fn story_readiness_timeout_is_a_typed_result() {
        let err = Error::ReadyTimeout {
            selector: "app.kubernetes.io/instance=chat".to_string(),
            waited: Duration::from_secs(600),
        };
        let msg = err.to_string();
        assert!(msg.contains("600"));
        assert!(msg.contains("app.kubernetes.io/instance=chat"));
    }

    /// Story: error constructors accept both String and &str
    #[test]
    fn story_error_construction_ergonomics() {
        let dynamic = format!("secret {} unreadable", "tool-tokens");
        let err = Error::config(dynamic);
        assert!(err.to_string().contains("tool-tokens"));

        let err = Error::ingestion("pipeline trigger exited with status 2");
        assert!(err.to_string().contains("status 2"));
    }
}
