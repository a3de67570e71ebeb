//! Provider responses.

use crate::{keys, DataBag, UnitName};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Credentials issued to one requesting unit.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Issued role identifier.
    pub role_id: String,

    /// One-shot token used to retrieve the actual secret id.
    pub token: String,
}

impl Credentials {
    /// Create a credential pair.
    pub fn new(role_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            role_id: role_id.into(),
            token: token.into(),
        }
    }
}

// Tokens must not end up in logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("role_id", &self.role_id)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Provider response as seen by one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Endpoint URL.
    pub vault_url: Option<String>,

    /// Base64-encoded CA certificate.
    pub vault_ca: Option<String>,

    /// Role id issued to the unit.
    pub role_id: Option<String>,

    /// One-shot token issued to the unit.
    pub token: Option<String>,
}

impl Response {
    /// Extract the response addressed to `unit` from the provider's data.
    pub fn for_unit(data: &DataBag, unit: &UnitName) -> Self {
        let get = |key: &str| data.get(key).map(str::to_string);
        Self {
            vault_url: get(keys::VAULT_URL),
            vault_ca: get(keys::VAULT_CA),
            role_id: get(&keys::role_id_key(unit)),
            token: get(&keys::token_key(unit)),
        }
    }

    /// Issued credentials, if both halves are present.
    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.role_id, &self.token) {
            (Some(role_id), Some(token)) => Some(Credentials::new(role_id, token)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_for_unit() {
        let data: DataBag = [
            ("vault_url", "https://10.0.0.1:8200"),
            ("mysql/0_role_id", "r1"),
            ("mysql/0_token", "t1"),
            ("mysql/1_role_id", "r2"),
        ]
        .into_iter()
        .collect();

        let response = Response::for_unit(&data, &"mysql/0".into());
        assert_eq!(response.vault_url.as_deref(), Some("https://10.0.0.1:8200"));
        assert_eq!(response.vault_ca, None);
        assert_eq!(response.credentials(), Some(Credentials::new("r1", "t1")));

        let other = Response::for_unit(&data, &"mysql/1".into());
        assert_eq!(other.role_id.as_deref(), Some("r2"));
        assert_eq!(other.credentials(), None);
    }

    #[test]
    fn test_credentials_debug_redacts_token() {
        let rendered = format!("{:?}", Credentials::new("role-123", "tok-abc"));
        assert!(rendered.contains("role-123"));
        assert!(!rendered.contains("tok-abc"));
    }
}
