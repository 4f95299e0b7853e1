//! Install configuration and the tool-server registry
//!
//! Settings are loaded from a YAML values file into one explicit struct that
//! is passed by value through the orchestrator - no ambient globals. The
//! operator password never lives in the values file; it arrives via CLI flag
//! or environment variable.
//!
//! Env values in a [`ServerSpec`] may contain `${NAME}` placeholders that the
//! orchestrator resolves from bootstrap output before composition. A
//! placeholder with no bound value resolves to the empty string - the servers
//! consume these best-effort, so a missing value is never an error.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::compose::ResourceRequirements;
use crate::{Error, Result};

/// Placeholder name bound to the control-plane base URL after bootstrap
pub const PLACEHOLDER_CONTROL_PLANE_URL: &str = "CONTROL_PLANE_URL";

/// Placeholder name bound to the control-plane session token after bootstrap
pub const PLACEHOLDER_CONTROL_PLANE_TOKEN: &str = "CONTROL_PLANE_TOKEN";

/// The tool-server registry: server name to spec.
///
/// A BTreeMap keys entries uniquely and iterates in name order, which keeps
/// composition independent of declaration order in the values file.
pub type Registry = BTreeMap<String, ServerSpec>;

/// One entry in the tool-server registry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSpec {
    /// Include this server in composition. Disabled entries are omitted
    /// entirely - no placeholder resource is emitted.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Container image reference
    #[serde(default)]
    pub image: String,
    /// Environment variables; values may be literals or `${NAME}` placeholders
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Single container port exposed by the workload
    #[serde(default = "default_port")]
    pub port: u16,
    /// Compose an externally reachable Route in addition to the Service
    #[serde(default)]
    pub expose_route: bool,
    /// Container args
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    /// Resource requests/limits; defaults are applied when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
}

fn default_enabled() -> bool {
    true
}

fn default_port() -> u16 {
    8080
}

/// GitOps control-plane connection settings
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlPlaneSettings {
    /// Base URL of the control-plane API
    pub base_url: String,
    /// Admin username for session login
    pub username: String,
    /// Name of the secret to provision with the session result
    /// (keys `url` and `token`). Skipped when unset.
    #[serde(default)]
    pub token_secret: Option<String>,
}

/// Readiness gate tuning
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessSettings {
    /// Seconds between pod polls
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Maximum seconds to wait before the gate fails with a timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_interval_secs() -> u64 {
    1
}

fn default_timeout_secs() -> u64 {
    600
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Downstream ingestion job settings
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionSettings {
    /// Command to invoke once the readiness gate opens
    pub command: String,
    /// Arguments for the command
    #[serde(default)]
    pub args: Vec<String>,
    /// Route whose host becomes `INGESTION_ENDPOINT`
    pub endpoint_route: String,
    /// Secret whose `token` key becomes `INGESTION_BEARER_TOKEN`
    pub token_secret: String,
}

/// Complete install configuration loaded from the values file
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallSettings {
    /// Release identity, part of every derived resource name
    pub release: String,
    /// Chart identity, part of every derived resource name
    pub chart: String,
    /// Target namespace for all composed resources and secrets
    pub namespace: String,
    /// Control-plane connection
    pub control_plane: ControlPlaneSettings,
    /// Secrets to provision before apply: secret name to data map.
    /// Values may contain `${NAME}` placeholders.
    #[serde(default)]
    pub secrets: BTreeMap<String, BTreeMap<String, String>>,
    /// The tool-server registry
    #[serde(default)]
    pub servers: Registry,
    /// Readiness gate tuning
    #[serde(default)]
    pub readiness: ReadinessSettings,
    /// Downstream ingestion job; skipped when unset
    #[serde(default)]
    pub ingestion: Option<IngestionSettings>,
}

impl InstallSettings {
    /// Parse settings from YAML values-file content and validate them.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let settings: Self = serde_yaml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate identities and enabled registry entries.
    ///
    /// Disabled entries are not validated - they are excluded from
    /// composition entirely and may be partial.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("release", &self.release),
            ("chart", &self.chart),
            ("namespace", &self.namespace),
        ] {
            if value.is_empty() {
                return Err(Error::config(format!("'{}' must not be empty", field)));
            }
            if !is_dns_label(value) {
                return Err(Error::config(format!(
                    "'{}' value '{}' is not a valid DNS label",
                    field, value
                )));
            }
        }

        if self.control_plane.base_url.is_empty() {
            return Err(Error::config("controlPlane.baseUrl must not be empty"));
        }

        for (name, spec) in &self.servers {
            if !is_dns_label(name) {
                return Err(Error::config(format!(
                    "server name '{}' is not a valid DNS label",
                    name
                )));
            }
            if spec.enabled && spec.image.is_empty() {
                return Err(Error::config(format!(
                    "server '{}' is enabled but has no image",
                    name
                )));
            }
            if spec.enabled && spec.port == 0 {
                return Err(Error::config(format!(
                    "server '{}' is enabled but has no port",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Apply CLI/env overrides on top of the values file.
    pub fn apply_overrides(&mut self, namespace: Option<String>, base_url: Option<String>) {
        if let Some(namespace) = namespace {
            self.namespace = namespace;
        }
        if let Some(base_url) = base_url {
            self.control_plane.base_url = base_url;
        }
    }
}

/// Check that a string is a valid lowercase DNS label fragment.
fn is_dns_label(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= crate::naming::MAX_NAME_LEN
        && s.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !s.starts_with('-')
        && !s.ends_with('-')
}

/// Resolve `${NAME}` placeholders in a raw value.
///
/// Unknown placeholders resolve to the empty string. An unterminated
/// placeholder is kept verbatim.
pub fn resolve_value(raw: &str, vars: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find('}') {
            Some(end) => {
                let key = &rest[start + 2..start + 2 + end];
                if let Some(value) = vars.get(key) {
                    out.push_str(value);
                }
                rest = &rest[start + 2 + end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Resolve placeholders in every env value of the registry.
pub fn resolve_registry(registry: &Registry, vars: &BTreeMap<String, String>) -> Registry {
    registry
        .iter()
        .map(|(name, spec)| {
            let mut spec = spec.clone();
            spec.env = spec
                .env
                .iter()
                .map(|(k, v)| (k.clone(), resolve_value(v, vars)))
                .collect();
            (name.clone(), spec)
        })
        .collect()
}

/// Resolve placeholders in a secret data map.
pub fn resolve_data(
    data: &BTreeMap<String, String>,
    vars: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    data.iter()
        .map(|(k, v)| (k.clone(), resolve_value(v, vars)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_values() -> &'static str {
        r#"
release: chat
chart: tools
namespace: chat-system
controlPlane:
  baseUrl: https://gitops.apps.internal
  username: admin
  tokenSecret: control-plane-session
secrets:
  tool-tokens:
    token: ${CONTROL_PLANE_TOKEN}
servers:
  argocd:
    image: quay.io/example/argocd-tools:1.2
    port: 3000
    exposeRoute: true
    env:
      BASE_URL: ${CONTROL_PLANE_URL}
      API_TOKEN: ${CONTROL_PLANE_TOKEN}
  gh:
    enabled: false
ingestion:
  command: ingest-docs
  args: ["--once"]
  endpointRoute: pipeline-api
  tokenSecret: pipeline-token
"#
    }

    #[test]
    fn test_parses_values_file() {
        let settings = InstallSettings::from_yaml(sample_values()).unwrap();
        assert_eq!(settings.release, "chat");
        assert_eq!(settings.namespace, "chat-system");
        assert_eq!(settings.servers.len(), 2);

        let argocd = &settings.servers["argocd"];
        assert!(argocd.enabled);
        assert!(argocd.expose_route);
        assert_eq!(argocd.port, 3000);

        let gh = &settings.servers["gh"];
        assert!(!gh.enabled);
    }

    #[test]
    fn test_server_defaults() {
        let spec: ServerSpec = serde_yaml::from_str("image: img:1").unwrap();
        assert!(spec.enabled);
        assert_eq!(spec.port, 8080);
        assert!(!spec.expose_route);
        assert!(spec.env.is_empty());
    }

    #[test]
    fn test_readiness_defaults() {
        let settings = InstallSettings::from_yaml(sample_values()).unwrap();
        assert_eq!(settings.readiness.interval_secs, 1);
        assert_eq!(settings.readiness.timeout_secs, 600);
    }

    #[test]
    fn test_validate_rejects_enabled_server_without_image() {
        let yaml = r#"
release: chat
chart: tools
namespace: chat-system
controlPlane:
  baseUrl: https://gitops.apps.internal
  username: admin
servers:
  broken:
    port: 8080
"#;
        let err = InstallSettings::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("no image"));
    }

    #[test]
    fn test_validate_allows_partial_disabled_server() {
        let yaml = r#"
release: chat
chart: tools
namespace: chat-system
controlPlane:
  baseUrl: https://gitops.apps.internal
  username: admin
servers:
  off:
    enabled: false
"#;
        assert!(InstallSettings::from_yaml(yaml).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_dns_labels() {
        let yaml = r#"
release: Chat
chart: tools
namespace: chat-system
controlPlane:
  baseUrl: https://gitops.apps.internal
  username: admin
"#;
        let err = InstallSettings::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("DNS label"));
    }

    #[test]
    fn test_apply_overrides() {
        let mut settings = InstallSettings::from_yaml(sample_values()).unwrap();
        settings.apply_overrides(Some("other-ns".into()), None);
        assert_eq!(settings.namespace, "other-ns");
        assert_eq!(
            settings.control_plane.base_url,
            "https://gitops.apps.internal"
        );
    }

    #[test]
    fn test_resolve_value_substitutes_known_placeholders() {
        let mut vars = BTreeMap::new();
        vars.insert("CONTROL_PLANE_TOKEN".to_string(), "abc123".to_string());
        assert_eq!(
            resolve_value("Bearer ${CONTROL_PLANE_TOKEN}", &vars),
            "Bearer abc123"
        );
    }

    #[test]
    fn test_resolve_value_unknown_placeholder_is_empty() {
        let vars = BTreeMap::new();
        assert_eq!(resolve_value("${NOT_BOUND}", &vars), "");
        assert_eq!(resolve_value("x-${NOT_BOUND}-y", &vars), "x--y");
    }

    #[test]
    fn test_resolve_value_keeps_unterminated_placeholder() {
        let vars = BTreeMap::new();
        assert_eq!(resolve_value("${OOPS", &vars), "${OOPS");
    }

    #[test]
    fn test_resolve_registry_rewrites_env_only() {
        let settings = InstallSettings::from_yaml(sample_values()).unwrap();
        let mut vars = BTreeMap::new();
        vars.insert(
            PLACEHOLDER_CONTROL_PLANE_URL.to_string(),
            "https://gitops.apps.internal".to_string(),
        );
        vars.insert(
            PLACEHOLDER_CONTROL_PLANE_TOKEN.to_string(),
            "tok".to_string(),
        );

        let resolved = resolve_registry(&settings.servers, &vars);
        let argocd = &resolved["argocd"];
        assert_eq!(argocd.env["BASE_URL"], "https://gitops.apps.internal");
        assert_eq!(argocd.env["API_TOKEN"], "tok");
        // non-env fields untouched
        assert_eq!(argocd.image, settings.servers["argocd"].image);
    }
}
