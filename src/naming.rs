//! Resource name and label derivation
//!
//! Pure functions mapping (release, chart, server) identities to DNS-label
//! safe resource names and the standard label sets shared by every resource
//! composed for the same server. Multiple resource kinds for one server must
//! share a name and selector, so everything here is deterministic: same
//! inputs, byte-identical outputs.

use std::collections::BTreeMap;

/// Maximum length of a Kubernetes resource name (DNS label)
pub const MAX_NAME_LEN: usize = 63;

/// Label value identifying resources managed by gantry
pub const MANAGED_BY: &str = "gantry";

/// Derive the canonical resource name for a tool server.
///
/// Joins `release-chart-server`, truncates to [`MAX_NAME_LEN`] and strips
/// trailing separators so the result stays a valid DNS label. Truncation is
/// silent: composition must never fail on a long name.
pub fn derive_name(release: &str, chart: &str, server: &str) -> String {
    let mut name = format!("{}-{}-{}", release, chart, server);
    if name.len() > MAX_NAME_LEN {
        let mut end = MAX_NAME_LEN;
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        name.truncate(end);
    }
    while name.ends_with('-') {
        name.pop();
    }
    name
}

/// Standard labels applied to every composed resource for a server.
pub fn labels(release: &str, server: &str) -> BTreeMap<String, String> {
    let mut labels = selector_labels(release, server);
    labels.insert(
        "app.kubernetes.io/managed-by".to_string(),
        MANAGED_BY.to_string(),
    );
    labels
}

/// The label subset used for pod selection.
///
/// Services and the readiness gate match on these, so they must be a strict
/// subset of [`labels`].
pub fn selector_labels(release: &str, server: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert("app.kubernetes.io/name".to_string(), server.to_string());
    labels.insert("app.kubernetes.io/instance".to_string(), release.to_string());
    labels
}

/// Label selector string matching every pod of an install (all servers).
///
/// This is what the readiness gate watches after apply.
pub fn install_selector(release: &str) -> String {
    format!(
        "app.kubernetes.io/instance={},app.kubernetes.io/managed-by={}",
        release, MANAGED_BY
    )
}
