//! Gantry - tool-server composition and install orchestration for OpenShift
//!
//! Gantry turns a declarative registry of tool-server definitions into a
//! consistent set of cluster resources and installs them in one shot:
//!
//! 1. Load the values file into an explicit settings struct
//! 2. Log in to the GitOps control plane and obtain a short-lived token
//! 3. Provision secrets idempotently (existing secrets are never touched)
//! 4. Compose and server-side apply the tool-server resources
//! 5. Wait for the labeled pod set to report Ready
//! 6. Trigger the downstream document-ingestion job
//!
//! Gantry is apply-once, not a controller: there is no reconciliation loop,
//! no rollback, and no support for concurrent installs against the same
//! target.
//!
//! # Modules
//!
//! - [`config`] - Values file loading, the tool-server registry, env placeholders
//! - [`naming`] - Resource name and label derivation (DNS-label safe)
//! - [`compose`] - Registry to resource composition (Deployment, Service, Route)
//! - [`bootstrap`] - Control-plane session login
//! - [`provision`] - Idempotent secret creation
//! - [`apply`] - Server-side apply of composed resources
//! - [`readiness`] - Bounded pod-readiness polling
//! - [`install`] - The phase-sequenced install orchestrator
//! - [`error`] - Error types

#![deny(missing_docs)]

pub mod apply;
pub mod bootstrap;
pub mod compose;
pub mod config;
pub mod error;
pub mod install;
pub mod naming;
pub mod provision;
pub mod readiness;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Field manager used for all server-side apply patches
pub const FIELD_MANAGER: &str = "gantry";
