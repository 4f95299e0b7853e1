//! Bounded pod-readiness polling
//!
//! The readiness gate blocks the orchestrator until every pod matching a
//! label selector reports condition `Ready == True`, polling on a fixed
//! interval. The wait is bounded: exceeding the deadline yields a typed
//! [`Error::ReadyTimeout`] instead of blocking forever, so unattended and CI
//! runs fail instead of hanging.
//!
//! Transient list errors do not abort the gate; they are logged and the next
//! poll retries.

use std::time::{Duration, Instant};

use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ListParams};
use kube::Client;
use tracing::{debug, warn};

use crate::{Error, Result};

/// Polling policy for the readiness gate
#[derive(Clone, Copy, Debug)]
pub struct WaitPolicy {
    /// Delay between polls
    pub interval: Duration,
    /// Deadline after which the gate fails with a timeout
    pub timeout: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(600),
        }
    }
}

/// Block until every pod matching `selector` is Ready.
///
/// The gate requires at least one matching pod: a selector that matches
/// nothing keeps polling until the deadline and then fails, it never opens
/// vacuously.
pub async fn wait_ready(
    client: &Client,
    namespace: &str,
    selector: &str,
    policy: WaitPolicy,
) -> Result<()> {
    let pods: Api<Pod> = Api::namespaced(client.clone(), namespace);
    let params = ListParams::default().labels(selector);
    let start = Instant::now();

    debug!(selector = %selector, namespace = %namespace, "Waiting for pods to be Ready");

    loop {
        if start.elapsed() > policy.timeout {
            return Err(Error::ReadyTimeout {
                selector: selector.to_string(),
                waited: policy.timeout,
            });
        }

        match pods.list(&params).await {
            Ok(list) => {
                let ready = list.items.iter().filter(|p| is_pod_ready(p)).count();
                let total = list.items.len();
                if all_ready(&list.items) {
                    debug!(selector = %selector, pods = total, "All pods Ready");
                    return Ok(());
                }
                debug!(selector = %selector, ready = ready, total = total, "Pods not Ready yet");
            }
            Err(err) => {
                warn!(error = %err, selector = %selector, "Pod list failed, will retry");
            }
        }

        tokio::time::sleep(policy.interval).await;
    }
}

/// Whether a non-empty pod set is entirely Ready.
pub(crate) fn all_ready(pods: &[Pod]) -> bool {
    !pods.is_empty() && pods.iter().all(is_pod_ready)
}

/// Whether a single pod reports condition `Ready == True`.
fn is_pod_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .and_then(|conds| conds.iter().find(|c| c.type_ == "Ready"))
        .map(|c| c.status == "True")
        .unwrap_or(false)
}
