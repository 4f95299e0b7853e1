//! The install orchestrator
//!
//! Sequences one install run as an explicit state machine:
//!
//! ```text
//! LoadConfig -> Bootstrap -> ProvisionSecrets -> Apply -> AwaitReady -> TriggerIngestion -> Done
//! ```
//!
//! Transitions are strictly sequential - no parallelism, no retries between
//! phases. Any error is fatal: the run aborts where it failed, nothing
//! downstream executes, and already-applied resources are not rolled back.
//! The ordering carries the real guarantees: credentials exist before any
//! composition that consumes them, secrets exist before the resources that
//! mount them, resources are applied before the readiness gate, and the gate
//! opens before the ingestion job fires.

use std::fmt;

use k8s_openapi::api::core::v1::Secret;
use kube::api::Api;
use kube::core::DynamicObject;
use kube::Client;
use tracing::info;

use crate::bootstrap::{self, CredentialSet};
use crate::config::{self, InstallSettings};
use crate::readiness::WaitPolicy;
use crate::{apply, compose, naming, provision};
use crate::{Error, Result};

/// Environment variable carrying the ingestion endpoint URL
pub const ENV_INGESTION_ENDPOINT: &str = "INGESTION_ENDPOINT";

/// Environment variable carrying the ingestion bearer token
pub const ENV_INGESTION_BEARER_TOKEN: &str = "INGESTION_BEARER_TOKEN";

/// Phases of one install run, in execution order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Values file loaded and validated
    LoadConfig,
    /// Control-plane session login
    Bootstrap,
    /// Idempotent secret provisioning
    ProvisionSecrets,
    /// Compose and server-side apply the tool-server resources
    Apply,
    /// Block until the labeled pod set is Ready
    AwaitReady,
    /// Invoke the downstream ingestion job
    TriggerIngestion,
    /// Install completed
    Done,
}

impl Phase {
    /// All phases in execution order
    pub const SEQUENCE: [Phase; 7] = [
        Phase::LoadConfig,
        Phase::Bootstrap,
        Phase::ProvisionSecrets,
        Phase::Apply,
        Phase::AwaitReady,
        Phase::TriggerIngestion,
        Phase::Done,
    ];
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::LoadConfig => "LoadConfig",
            Phase::Bootstrap => "Bootstrap",
            Phase::ProvisionSecrets => "ProvisionSecrets",
            Phase::Apply => "Apply",
            Phase::AwaitReady => "AwaitReady",
            Phase::TriggerIngestion => "TriggerIngestion",
            Phase::Done => "Done",
        };
        f.write_str(name)
    }
}

/// The install orchestrator
#[derive(Debug)]
pub struct Installer {
    settings: InstallSettings,
    admin_password: String,
}

impl Installer {
    /// Create an installer from validated settings and the operator password.
    ///
    /// The password comes from the CLI or environment, never from the values
    /// file.
    pub fn new(settings: InstallSettings, admin_password: String) -> Result<Self> {
        settings.validate()?;
        if admin_password.is_empty() {
            return Err(Error::config(
                "admin password is required (--admin-password or GANTRY_ADMIN_PASSWORD)",
            ));
        }
        Ok(Self {
            settings,
            admin_password,
        })
    }

    /// Run the install to completion.
    pub async fn run(&self) -> Result<()> {
        info!(phase = %Phase::LoadConfig, release = %self.settings.release, namespace = %self.settings.namespace, "Configuration loaded");

        info!(phase = %Phase::Bootstrap, "Bootstrapping control-plane credentials");
        let credentials = bootstrap::login(
            &self.settings.control_plane.base_url,
            &self.settings.control_plane.username,
            &self.admin_password,
        )
        .await?;

        let client = Client::try_default().await?;

        info!(phase = %Phase::ProvisionSecrets, "Provisioning secrets");
        self.provision_secrets(&client, &credentials).await?;

        info!(phase = %Phase::Apply, "Composing and applying tool-server resources");
        let registry = config::resolve_registry(&self.settings.servers, &credentials.placeholder_vars());
        let resources = compose::compose(
            &self.settings.release,
            &self.settings.chart,
            &self.settings.namespace,
            &registry,
        );
        apply::apply_all(&client, &self.settings.namespace, &resources).await?;

        info!(phase = %Phase::AwaitReady, "Waiting for tool servers to be Ready");
        self.await_ready(&client).await?;

        info!(phase = %Phase::TriggerIngestion, "Triggering downstream ingestion");
        self.trigger_ingestion(&client).await?;

        info!(phase = %Phase::Done, "Install complete");
        Ok(())
    }

    /// Provision the control-plane session secret and every configured
    /// secret, resolving placeholders from bootstrap output first.
    async fn provision_secrets(&self, client: &Client, credentials: &CredentialSet) -> Result<()> {
        if let Some(name) = &self.settings.control_plane.token_secret {
            provision::ensure_secret(
                client,
                &self.settings.namespace,
                name,
                &credentials.secret_data(),
            )
            .await?;
        }

        let vars = credentials.placeholder_vars();
        for (name, data) in &self.settings.secrets {
            let data = config::resolve_data(data, &vars);
            provision::ensure_secret(client, &self.settings.namespace, name, &data).await?;
        }

        Ok(())
    }

    /// Open the readiness gate over the whole install's pod set.
    ///
    /// Skipped when the registry has no enabled server - there is nothing to
    /// wait for, and the gate would otherwise time out on an empty selector.
    async fn await_ready(&self, client: &Client) -> Result<()> {
        if !self.settings.servers.values().any(|s| s.enabled) {
            info!("No enabled servers, skipping readiness gate");
            return Ok(());
        }

        let policy = WaitPolicy {
            interval: std::time::Duration::from_secs(self.settings.readiness.interval_secs),
            timeout: std::time::Duration::from_secs(self.settings.readiness.timeout_secs),
        };
        let selector = naming::install_selector(&self.settings.release);
        crate::readiness::wait_ready(client, &self.settings.namespace, &selector, policy).await
    }

    /// Discover the ingestion endpoint and token from cluster state, then
    /// run the configured command with them in its environment.
    async fn trigger_ingestion(&self, client: &Client) -> Result<()> {
        let Some(ingestion) = &self.settings.ingestion else {
            info!("No ingestion job configured, skipping");
            return Ok(());
        };

        let endpoint = self
            .discover_route_endpoint(client, &ingestion.endpoint_route)
            .await?;
        let token = self
            .read_token_secret(client, &ingestion.token_secret)
            .await?;

        info!(command = %ingestion.command, endpoint = %endpoint, "Invoking ingestion job");

        let status = tokio::process::Command::new(&ingestion.command)
            .args(&ingestion.args)
            .env(ENV_INGESTION_ENDPOINT, &endpoint)
            .env(ENV_INGESTION_BEARER_TOKEN, &token)
            .status()
            .await
            .map_err(|e| {
                Error::ingestion(format!("failed to start '{}': {}", ingestion.command, e))
            })?;

        if !status.success() {
            return Err(Error::ingestion(format!(
                "'{}' exited with {}",
                ingestion.command, status
            )));
        }

        info!("Ingestion job completed");
        Ok(())
    }

    /// Resolve a Route name to an https endpoint via its admitted host.
    async fn discover_route_endpoint(&self, client: &Client, route_name: &str) -> Result<String> {
        let api_resource = apply::api_resource_for("route.openshift.io/v1", "Route");
        let api: Api<DynamicObject> =
            Api::namespaced_with(client.clone(), &self.settings.namespace, &api_resource);

        let route = api.get(route_name).await?;
        let host = route.data["spec"]["host"]
            .as_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| {
                Error::ingestion(format!("route '{}' has no spec.host", route_name))
            })?;

        Ok(format!("https://{}", host))
    }

    /// Read the bearer token from a secret's `token` key.
    async fn read_token_secret(&self, client: &Client, secret_name: &str) -> Result<String> {
        let api: Api<Secret> = Api::namespaced(client.clone(), &self.settings.namespace);
        let secret = api.get(secret_name).await?;

        let token = secret
            .data
            .as_ref()
            .and_then(|d| d.get("token"))
            .ok_or_else(|| {
                Error::ingestion(format!("secret '{}' has no 'token' key", secret_name))
            })?;

        String::from_utf8(token.0.clone()).map_err(|e| {
            Error::ingestion(format!("secret '{}' token is not UTF-8: {}", secret_name, e))
        })
    }
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
servers:
  argocd:
    image: quay.io/example/argocd-tools:1.2
    port: 3000
    exposeRoute: true
"#
    }

    #[test]
    fn test_phase_sequence_order() {
        // Credential bootstrap strictly precedes provisioning, provisioning
        // precedes apply, apply precedes the gate, the gate precedes ingestion.
        let position = |phase: Phase| {
            Phase::SEQUENCE
                .iter()
                .position(|p| *p == phase)
                .expect("phase in sequence")
        };

        assert!(position(Phase::Bootstrap) < position(Phase::ProvisionSecrets));
        assert!(position(Phase::ProvisionSecrets) < position(Phase::Apply));
        assert!(position(Phase::Apply) < position(Phase::AwaitReady));
        assert!(position(Phase::AwaitReady) < position(Phase::TriggerIngestion));
        assert_eq!(Phase::SEQUENCE.last(), Some(&Phase::Done));
    }

    #[test]
    fn test_phase_display_names() {
        assert_eq!(Phase::Bootstrap.to_string(), "Bootstrap");
        assert_eq!(Phase::TriggerIngestion.to_string(), "TriggerIngestion");
    }

    #[test]
    fn test_installer_requires_password() {
        let settings = InstallSettings::from_yaml(sample_values()).unwrap();
        let err = Installer::new(settings, String::new()).unwrap_err();
        assert!(err.to_string().contains("admin password"));
    }

    #[test]
    fn test_installer_accepts_valid_settings() {
        let settings = InstallSettings::from_yaml(sample_values()).unwrap();
        let installer = Installer::new(settings, "hunter2".to_string()).unwrap();
        assert_eq!(installer.settings.release, "chat");
    }

    #[test]
    fn test_installer_rejects_invalid_settings() {
        let mut settings = InstallSettings::from_yaml(sample_values()).unwrap();
        settings.release = String::new();
        assert!(Installer::new(settings, "hunter2".to_string()).is_err());
    }
}
