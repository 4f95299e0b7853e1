//! Server-side apply of composed resources
//!
//! Each composed resource is serialized and applied as a `DynamicObject`
//! with a forced server-side apply patch under the `gantry` field manager.
//! Application is bulk and fail-fast: the first rejection aborts the run and
//! nothing already applied is rolled back.

use kube::api::{Api, Patch, PatchParams};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::Client;
use tracing::{debug, info};

use crate::compose::ComposedResource;
use crate::{Error, Result, FIELD_MANAGER};

/// Apply every composed resource to the cluster, in order.
pub async fn apply_all(
    client: &Client,
    namespace: &str,
    resources: &[ComposedResource],
) -> Result<()> {
    for resource in resources {
        apply_one(client, namespace, resource).await?;
    }
    info!(count = resources.len(), namespace = %namespace, "Resources applied");
    Ok(())
}

async fn apply_one(client: &Client, namespace: &str, resource: &ComposedResource) -> Result<()> {
    let value = resource.to_value()?;
    let object: DynamicObject = serde_json::from_value(value)
        .map_err(|e| Error::serialization(format!("composed resource is not an object: {}", e)))?;

    let api_resource = api_resource_for(resource.api_version(), resource.kind());
    let api: Api<DynamicObject> = Api::namespaced_with(client.clone(), namespace, &api_resource);

    debug!(
        kind = resource.kind(),
        name = resource.name(),
        namespace = %namespace,
        "Applying resource"
    );

    api.patch(
        resource.name(),
        &PatchParams::apply(FIELD_MANAGER).force(),
        &Patch::Apply(&object),
    )
    .await
    .map_err(|e| Error::apply(resource.kind(), resource.name(), e.to_string()))?;

    Ok(())
}

/// Build the dynamic API resource for an apiVersion/kind pair.
///
/// Naive pluralization is sufficient for the kinds gantry composes
/// (deployments, services, routes).
pub(crate) fn api_resource_for(api_version: &str, kind: &str) -> ApiResource {
    let (group, version) = match api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    };
    ApiResource::from_gvk(&GroupVersionKind::gvk(group, version, kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_group_resources() {
        let ar = api_resource_for("v1", "Service");
        assert_eq!(ar.group, "");
        assert_eq!(ar.version, "v1");
        assert_eq!(ar.kind, "Service");
    }

    #[test]
    fn test_grouped_resources() {
        let ar = api_resource_for("apps/v1", "Deployment");
        assert_eq!(ar.group, "apps");
        assert_eq!(ar.version, "v1");

        let ar = api_resource_for("route.openshift.io/v1", "Route");
        assert_eq!(ar.group, "route.openshift.io");
        assert_eq!(ar.api_version, "route.openshift.io/v1");
    }

    #[test]
    fn test_composed_resources_deserialize_as_dynamic_objects() {
        use crate::compose::{compose, ComposedResource};
        use crate::config::{Registry, ServerSpec};
        use std::collections::BTreeMap;

        let mut registry = Registry::new();
        registry.insert(
            "argo".to_string(),
            ServerSpec {
                enabled: true,
                image: "img:1".to_string(),
                env: BTreeMap::new(),
                port: 8080,
                expose_route: true,
                args: None,
                resources: None,
            },
        );

        for resource in compose("chat", "tools", "chat-system", &registry) {
            let value = resource.to_value().unwrap();
            let object: DynamicObject =
                serde_json::from_value(value).expect("composed resource should be a valid object");
            assert_eq!(object.metadata.name.as_deref(), Some(resource.name()));
            match resource {
                ComposedResource::Deployment(_) => assert!(object.data["spec"]["template"].is_object()),
                ComposedResource::Service(_) => assert!(object.data["spec"]["ports"].is_array()),
                ComposedResource::Route(_) => assert!(object.data["spec"]["to"].is_object()),
            }
        }
    }
}
