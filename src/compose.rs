//! Resource composition for tool servers
//!
//! Turns the tool-server registry into concrete resource descriptions:
//! one Deployment and one Service per enabled server, plus one Route when
//! `exposeRoute` is set. Disabled servers are omitted entirely.
//!
//! Composition is a pure function - it returns descriptions and applies
//! nothing. It is total on well-formed input: long names truncate, absent
//! env values are empty strings, and the output is byte-identical for equal
//! input (the registry is a BTreeMap, so iteration order is canonical).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{Registry, ServerSpec};
use crate::naming;
use crate::{Error, Result};

/// Default CPU request applied when a server declares no resources
pub const DEFAULT_CPU_REQUEST: &str = "100m";
/// Default memory request applied when a server declares no resources
pub const DEFAULT_MEMORY_REQUEST: &str = "128Mi";
/// Default CPU limit applied when a server declares no resources
pub const DEFAULT_CPU_LIMIT: &str = "500m";
/// Default memory limit applied when a server declares no resources
pub const DEFAULT_MEMORY_LIMIT: &str = "512Mi";

// =============================================================================
// Resource types
// =============================================================================

/// Standard Kubernetes ObjectMeta (the subset composition needs)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Resource name
    pub name: String,
    /// Resource namespace
    pub namespace: String,
    /// Labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

/// Kubernetes Deployment
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    /// API version
    pub api_version: String,
    /// Kind
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    pub spec: DeploymentSpec,
}

/// Deployment spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSpec {
    /// Number of replicas
    pub replicas: u32,
    /// Label selector
    pub selector: LabelSelector,
    /// Pod template
    pub template: PodTemplateSpec,
}

/// Label selector
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    /// Match labels
    pub match_labels: BTreeMap<String, String>,
}

/// Pod template spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodTemplateSpec {
    /// Pod metadata
    pub metadata: PodMeta,
    /// Pod spec
    pub spec: PodSpec,
}

/// Pod metadata (labels only)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodMeta {
    /// Labels
    pub labels: BTreeMap<String, String>,
}

/// Pod spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    /// Containers
    pub containers: Vec<Container>,
}

/// Container spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    /// Container name
    pub name: String,
    /// Image
    pub image: String,
    /// Args
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    /// Environment variables
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
    /// Ports
    pub ports: Vec<ContainerPort>,
    /// Resource requirements
    pub resources: ResourceRequirements,
}

/// Environment variable
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnvVar {
    /// Variable name
    pub name: String,
    /// Variable value
    pub value: String,
}

/// Container port
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPort {
    /// Port name
    pub name: String,
    /// Port number
    pub container_port: u16,
    /// Protocol
    pub protocol: String,
}

/// Resource requirements
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequirements {
    /// Requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests: Option<ResourceQuantity>,
    /// Limits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<ResourceQuantity>,
}

/// Resource quantity
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceQuantity {
    /// CPU
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    /// Memory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
}

/// Kubernetes Service
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    /// API version
    pub api_version: String,
    /// Kind
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    pub spec: ServiceSpec,
}

/// Service spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    /// Selector
    pub selector: BTreeMap<String, String>,
    /// Ports
    pub ports: Vec<ServicePort>,
}

/// Service port
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServicePort {
    /// Port name
    pub name: String,
    /// Port number
    pub port: u16,
    /// Target port
    pub target_port: u16,
    /// Protocol
    pub protocol: String,
}

/// OpenShift Route (external endpoint)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    /// API version
    pub api_version: String,
    /// Kind
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    pub spec: RouteSpec,
}

/// Route spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteSpec {
    /// Backing service reference
    pub to: RouteTarget,
    /// Port to route to
    pub port: RoutePort,
    /// TLS termination
    pub tls: RouteTls,
}

/// Route target reference
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteTarget {
    /// Target kind (always Service)
    pub kind: String,
    /// Target name
    pub name: String,
}

/// Route port selection
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoutePort {
    /// Service port name to route to
    pub target_port: String,
}

/// Route TLS configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteTls {
    /// Termination mode
    pub termination: String,
    /// What to do with plain HTTP
    pub insecure_edge_termination_policy: String,
}

// =============================================================================
// Composed resource
// =============================================================================

/// One composed cluster resource
#[derive(Clone, Debug, PartialEq)]
pub enum ComposedResource {
    /// Workload resource
    Deployment(Deployment),
    /// Internal network endpoint
    Service(Service),
    /// External endpoint
    Route(Route),
}

impl ComposedResource {
    /// API version of the underlying resource
    pub fn api_version(&self) -> &str {
        match self {
            Self::Deployment(d) => &d.api_version,
            Self::Service(s) => &s.api_version,
            Self::Route(r) => &r.api_version,
        }
    }

    /// Kind of the underlying resource
    pub fn kind(&self) -> &str {
        match self {
            Self::Deployment(d) => &d.kind,
            Self::Service(s) => &s.kind,
            Self::Route(r) => &r.kind,
        }
    }

    /// Name of the underlying resource
    pub fn name(&self) -> &str {
        match self {
            Self::Deployment(d) => &d.metadata.name,
            Self::Service(s) => &s.metadata.name,
            Self::Route(r) => &r.metadata.name,
        }
    }

    /// Serialize the resource body to a JSON value for apply.
    pub fn to_value(&self) -> Result<serde_json::Value> {
        let value = match self {
            Self::Deployment(d) => serde_json::to_value(d),
            Self::Service(s) => serde_json::to_value(s),
            Self::Route(r) => serde_json::to_value(r),
        };
        value.map_err(|e| Error::serialization(e.to_string()))
    }
}

// =============================================================================
// Composer
// =============================================================================

/// Compose the full resource set for a registry.
///
/// Emits, per enabled server: a Deployment, a Service, and a Route iff
/// `exposeRoute` is set. Disabled servers contribute nothing.
pub fn compose(release: &str, chart: &str, namespace: &str, registry: &Registry) -> Vec<ComposedResource> {
    let mut resources = Vec::new();

    for (server, spec) in registry {
        if !spec.enabled {
            continue;
        }

        let name = naming::derive_name(release, chart, server);
        resources.push(ComposedResource::Deployment(compose_deployment(
            &name, namespace, release, server, spec,
        )));
        resources.push(ComposedResource::Service(compose_service(
            &name, namespace, release, server, spec,
        )));
        if spec.expose_route {
            resources.push(ComposedResource::Route(compose_route(
                &name, namespace, release, server,
            )));
        }
    }

    resources
}

fn compose_deployment(
    name: &str,
    namespace: &str,
    release: &str,
    server: &str,
    spec: &ServerSpec,
) -> Deployment {
    let env: Vec<EnvVar> = spec
        .env
        .iter()
        .map(|(k, v)| EnvVar {
            name: k.clone(),
            value: v.clone(),
        })
        .collect();

    let resources = spec.resources.clone().unwrap_or_else(default_resources);

    Deployment {
        api_version: "apps/v1".to_string(),
        kind: "Deployment".to_string(),
        metadata: ObjectMeta {
            name: name.to_string(),
            namespace: namespace.to_string(),
            labels: naming::labels(release, server),
        },
        spec: DeploymentSpec {
            replicas: 1,
            selector: LabelSelector {
                match_labels: naming::selector_labels(release, server),
            },
            template: PodTemplateSpec {
                metadata: PodMeta {
                    labels: naming::labels(release, server),
                },
                spec: PodSpec {
                    containers: vec![Container {
                        name: server.to_string(),
                        image: spec.image.clone(),
                        args: spec.args.clone(),
                        env,
                        ports: vec![ContainerPort {
                            name: "http".to_string(),
                            container_port: spec.port,
                            protocol: "TCP".to_string(),
                        }],
                        resources,
                    }],
                },
            },
        },
    }
}

fn compose_service(
    name: &str,
    namespace: &str,
    release: &str,
    server: &str,
    spec: &ServerSpec,
) -> Service {
    Service {
        api_version: "v1".to_string(),
        kind: "Service".to_string(),
        metadata: ObjectMeta {
            name: name.to_string(),
            namespace: namespace.to_string(),
            labels: naming::labels(release, server),
        },
        spec: ServiceSpec {
            selector: naming::selector_labels(release, server),
            ports: vec![ServicePort {
                name: "http".to_string(),
                port: spec.port,
                target_port: spec.port,
                protocol: "TCP".to_string(),
            }],
        },
    }
}

fn compose_route(name: &str, namespace: &str, release: &str, server: &str) -> Route {
    Route {
        api_version: "route.openshift.io/v1".to_string(),
        kind: "Route".to_string(),
        metadata: ObjectMeta {
            name: name.to_string(),
            namespace: namespace.to_string(),
            labels: naming::labels(release, server),
        },
        spec: RouteSpec {
            to: RouteTarget {
                kind: "Service".to_string(),
                name: name.to_string(),
            },
            port: RoutePort {
                target_port: "http".to_string(),
            },
            tls: RouteTls {
                termination: "edge".to_string(),
                insecure_edge_termination_policy: "Redirect".to_string(),
            },
        },
    }
}

fn default_resources() -> ResourceRequirements {
    ResourceRequirements {
        requests: Some(ResourceQuantity {
            cpu: Some(DEFAULT_CPU_REQUEST.to_string()),
            memory: Some(DEFAULT_MEMORY_REQUEST.to_string()),
        }),
        limits: Some(ResourceQuantity {
            cpu: Some(DEFAULT_CPU_LIMIT.to_string()),
            memory: Some(DEFAULT_MEMORY_LIMIT.to_string()),
        }),
    }
}

// =============================================================================
// Tests
// =============================================================================
