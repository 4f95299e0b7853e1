//! Idempotent secret provisioning
//!
//! Secrets are created once and never mutated afterwards: the only read
//! before a write is an existence check, so repeated install runs are safe.
//! Rotation therefore requires deleting the secret manually first - a known
//! limitation, kept for parity with how operators manage these credentials.
//!
//! The check-then-create sequence is not atomic; two installs racing against
//! the same target can still collide on the create. Concurrent installs are
//! unsupported.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, ObjectMeta, PostParams};
use kube::Client;
use tracing::info;

use crate::naming::MANAGED_BY;
use crate::Result;

/// Ensure a secret exists, creating it only if absent.
///
/// Returns `true` if the secret was created, `false` if it already existed
/// (a success no-op, logged and skipped). Existing secrets are never updated.
pub async fn ensure_secret(
    client: &Client,
    namespace: &str,
    name: &str,
    data: &BTreeMap<String, String>,
) -> Result<bool> {
    let api: Api<Secret> = Api::namespaced(client.clone(), namespace);

    match api.get(name).await {
        Ok(_) => {
            info!(secret = %name, namespace = %namespace, "Secret already exists, skipping");
            Ok(false)
        }
        Err(err) if is_not_found(&err) => {
            let secret = build_secret(namespace, name, data);
            api.create(&PostParams::default(), &secret).await?;
            info!(secret = %name, namespace = %namespace, "Secret created");
            Ok(true)
        }
        Err(err) => Err(err.into()),
    }
}

/// Whether a kube error is a 404 for the requested object.
fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(response) if response.code == 404)
}

/// Build an Opaque secret carrying the given string data.
fn build_secret(namespace: &str, name: &str, data: &BTreeMap<String, String>) -> Secret {
    let mut labels = BTreeMap::new();
    labels.insert(
        "app.kubernetes.io/managed-by".to_string(),
        MANAGED_BY.to_string(),
    );

    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        type_: Some("Opaque".to_string()),
        string_data: Some(data.clone()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: "test".to_string(),
            reason: "test".to_string(),
            code,
        })
    }

    #[test]
    fn test_404_classified_as_absent() {
        assert!(is_not_found(&api_error(404)));
    }

    #[test]
    fn test_other_api_errors_are_not_absence() {
        // A 403 must propagate, not trigger a create
        assert!(!is_not_found(&api_error(403)));
        assert!(!is_not_found(&api_error(500)));
    }

    #[test]
    fn test_build_secret_shape() {
        let mut data = BTreeMap::new();
        data.insert("token".to_string(), "tok".to_string());

        let secret = build_secret("chat-system", "control-plane-session", &data);

        assert_eq!(
            secret.metadata.name.as_deref(),
            Some("control-plane-session")
        );
        assert_eq!(secret.metadata.namespace.as_deref(), Some("chat-system"));
        assert_eq!(secret.type_.as_deref(), Some("Opaque"));
        assert_eq!(
            secret
                .string_data
                .as_ref()
                .and_then(|d| d.get("token"))
                .map(String::as_str),
            Some("tok")
        );
        assert_eq!(
            secret
                .metadata
                .labels
                .as_ref()
                .and_then(|l| l.get("app.kubernetes.io/managed-by"))
                .map(String::as_str),
            Some(MANAGED_BY)
        );
    }
}
