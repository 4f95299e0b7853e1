//! Control-plane session login
//!
//! One-shot acquisition of a short-lived bearer token from the GitOps
//! control plane: `POST {base_url}/api/v1/session` with the operator's admin
//! credentials, extracting `token` from the JSON response. Any failure -
//! network, non-2xx, missing field - is fatal to the install run; there is
//! no retry and no partial credential.
//!
//! Certificate validation is deliberately disabled: the control plane sits
//! behind a self-signed internal endpoint in the target environment. This is
//! a trust boundary inherited from the operational setup, not an oversight.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use crate::config::{PLACEHOLDER_CONTROL_PLANE_TOKEN, PLACEHOLDER_CONTROL_PLANE_URL};
use crate::{Error, Result};

/// Session login request body
#[derive(Debug, Serialize)]
struct SessionRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// Result of a successful bootstrap login.
///
/// Held in orchestrator memory for the duration of one run, never persisted.
/// The token expires on the control plane's schedule; nothing here refreshes
/// it.
#[derive(Clone, Debug)]
pub struct CredentialSet {
    /// Control-plane base URL the token is valid against
    pub base_url: String,
    /// Short-lived bearer token
    pub token: String,
}

impl CredentialSet {
    /// Placeholder bindings for env/secret resolution.
    pub fn placeholder_vars(&self) -> BTreeMap<String, String> {
        let mut vars = BTreeMap::new();
        vars.insert(
            PLACEHOLDER_CONTROL_PLANE_URL.to_string(),
            self.base_url.clone(),
        );
        vars.insert(PLACEHOLDER_CONTROL_PLANE_TOKEN.to_string(), self.token.clone());
        vars
    }

    /// Secret data for the provisioned session secret.
    pub fn secret_data(&self) -> BTreeMap<String, String> {
        let mut data = BTreeMap::new();
        data.insert("url".to_string(), self.base_url.clone());
        data.insert("token".to_string(), self.token.clone());
        data
    }
}

/// Log in to the control plane and return the session credentials.
pub async fn login(base_url: &str, username: &str, password: &str) -> Result<CredentialSet> {
    let client = reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .build()?;

    let base_url = base_url.trim_end_matches('/').to_string();
    let url = format!("{}/api/v1/session", base_url);

    info!(url = %url, username = %username, "Logging in to control plane");

    let response = client
        .post(&url)
        .json(&SessionRequest { username, password })
        .send()
        .await
        .map_err(|e| Error::bootstrap(format!("login request to {} failed: {}", url, e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::bootstrap(format!("login failed: HTTP {}", status)));
    }

    let body: serde_json::Value = response
        .json()
        .await
        .map_err(|e| Error::bootstrap(format!("invalid session response body: {}", e)))?;

    let token = extract_token(&body)?;
    info!("Control-plane login succeeded");

    Ok(CredentialSet { base_url, token })
}

/// Extract the bearer token from a session response body.
fn extract_token(body: &serde_json::Value) -> Result<String> {
    body["token"]
        .as_str()
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::bootstrap("session response has no 'token' field"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_token_from_session_body() {
        let body = json!({"token": "eyJhbGciOi"});
        assert_eq!(extract_token(&body).unwrap(), "eyJhbGciOi");
    }

    #[test]
    fn test_missing_token_field_is_fatal() {
        let body = json!({"sessionToken": "nope"});
        let err = extract_token(&body).unwrap_err();
        assert!(err.to_string().contains("no 'token' field"));
    }

    #[test]
    fn test_empty_token_is_fatal() {
        let body = json!({"token": ""});
        assert!(extract_token(&body).is_err());
    }

    #[test]
    fn test_non_string_token_is_fatal() {
        let body = json!({"token": 42});
        assert!(extract_token(&body).is_err());
    }

    #[test]
    fn test_placeholder_vars_bind_url_and_token() {
        let creds = CredentialSet {
            base_url: "https://gitops.apps.internal".to_string(),
            token: "tok".to_string(),
        };

        let vars = creds.placeholder_vars();
        assert_eq!(
            vars.get(PLACEHOLDER_CONTROL_PLANE_URL).map(String::as_str),
            Some("https://gitops.apps.internal")
        );
        assert_eq!(
            vars.get(PLACEHOLDER_CONTROL_PLANE_TOKEN).map(String::as_str),
            Some("tok")
        );
    }

    #[test]
    fn test_secret_data_has_url_and_token_keys() {
        let creds = CredentialSet {
            base_url: "https://gitops.apps.internal".to_string(),
            token: "tok".to_string(),
        };

        let data = creds.secret_data();
        assert_eq!(data.get("url").map(String::as_str), Some("https://gitops.apps.internal"));
        assert_eq!(data.get("token").map(String::as_str), Some("tok"));
    }
}
