//! Backend requests published by requiring units.

use crate::{keys, DataBag, RelationId, UnitName};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a unit's published data does not yet form a request.
///
/// These are not protocol errors: the provider skips the unit and waits
/// for a later change that completes the set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IncompleteRequest {
    /// A required field is absent or empty.
    #[error("field {0} is missing or empty")]
    Missing(&'static str),

    /// `isolated` is present but is not a boolean.
    #[error("field isolated has unrecognised value {0:?}")]
    InvalidIsolated(String),
}

/// A complete backend request from one remote unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Relation the request arrived on.
    pub relation_id: RelationId,

    /// Transport-level identity of the remote unit.
    pub unit: UnitName,

    /// Name the unit declared for itself, if any.
    ///
    /// Differs from `unit` when the relation crosses a model boundary.
    pub declared_name: Option<UnitName>,

    /// Backend to create or access.
    pub secret_backend: String,

    /// Address the unit published for itself.
    pub access_address: String,

    /// Address reported by the transport, when present.
    pub ingress_address: Option<String>,

    /// Host name of the requesting unit.
    pub hostname: String,

    /// Whether the unit's backend must be isolated from other units.
    pub isolated: bool,
}

impl Request {
    /// Build a request from the data a remote unit has published.
    ///
    /// `secret_backend`, `access_address` and `hostname` must be non-empty
    /// and `isolated` must be explicitly present. `isolated = false` is a
    /// complete value.
    pub fn from_unit_data(
        relation_id: RelationId,
        unit: UnitName,
        data: &DataBag,
    ) -> Result<Self, IncompleteRequest> {
        let required = |key: &'static str| {
            data.get_non_empty(key)
                .map(str::to_string)
                .ok_or(IncompleteRequest::Missing(key))
        };

        let secret_backend = required(keys::SECRET_BACKEND)?;
        let access_address = required(keys::ACCESS_ADDRESS)?;
        let hostname = required(keys::HOSTNAME)?;

        let raw_isolated = data
            .get(keys::ISOLATED)
            .ok_or(IncompleteRequest::Missing(keys::ISOLATED))?;
        let isolated = keys::decode_bool(raw_isolated)
            .ok_or_else(|| IncompleteRequest::InvalidIsolated(raw_isolated.to_string()))?;

        Ok(Self {
            relation_id,
            unit,
            declared_name: data.get_non_empty(keys::UNIT_NAME).map(UnitName::from),
            secret_backend,
            access_address,
            ingress_address: data.get_non_empty(keys::INGRESS_ADDRESS).map(str::to_string),
            hostname,
            isolated,
        })
    }

    /// Name under which credentials for this unit are published.
    pub fn credential_owner(&self) -> &UnitName {
        self.declared_name.as_ref().unwrap_or(&self.unit)
    }

    /// Address used for network binding checks (ingress, else access).
    pub fn reachable_address(&self) -> &str {
        self.ingress_address
            .as_deref()
            .unwrap_or(&self.access_address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_data() -> DataBag {
        [
            (keys::SECRET_BACKEND, "charm-mysql"),
            (keys::ACCESS_ADDRESS, "10.0.0.5"),
            (keys::HOSTNAME, "mysql-0"),
            (keys::ISOLATED, "true"),
            (keys::UNIT_NAME, "mysql/0"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_complete_request() {
        let request =
            Request::from_unit_data(RelationId(1), "mysql/0".into(), &complete_data()).unwrap();
        assert_eq!(request.secret_backend, "charm-mysql");
        assert_eq!(request.access_address, "10.0.0.5");
        assert_eq!(request.hostname, "mysql-0");
        assert!(request.isolated);
        assert_eq!(request.credential_owner().as_str(), "mysql/0");
        assert_eq!(request.reachable_address(), "10.0.0.5");
    }

    #[test]
    fn test_isolated_false_is_complete() {
        let mut data = complete_data();
        data.set(keys::ISOLATED, Some("false".into()));
        let request = Request::from_unit_data(RelationId(1), "mysql/0".into(), &data).unwrap();
        assert!(!request.isolated);
    }

    #[test]
    fn test_missing_fields_are_incomplete() {
        for key in [
            keys::SECRET_BACKEND,
            keys::ACCESS_ADDRESS,
            keys::HOSTNAME,
            keys::ISOLATED,
        ] {
            let mut data = complete_data();
            data.set(key, None);
            assert_eq!(
                Request::from_unit_data(RelationId(1), "mysql/0".into(), &data),
                Err(IncompleteRequest::Missing(key))
            );
        }
    }

    #[test]
    fn test_empty_fields_are_incomplete() {
        for key in [keys::SECRET_BACKEND, keys::ACCESS_ADDRESS, keys::HOSTNAME] {
            let mut data = complete_data();
            data.set(key, Some(String::new()));
            assert!(Request::from_unit_data(RelationId(1), "mysql/0".into(), &data).is_err());
        }

        let mut data = complete_data();
        data.set(keys::ISOLATED, Some("maybe".into()));
        assert_eq!(
            Request::from_unit_data(RelationId(1), "mysql/0".into(), &data),
            Err(IncompleteRequest::InvalidIsolated("maybe".into()))
        );
    }

    #[test]
    fn test_declared_name_overrides_transport_identity() {
        let mut data = complete_data();
        data.set(keys::INGRESS_ADDRESS, Some("192.168.1.9".into()));
        let request =
            Request::from_unit_data(RelationId(2), "remote-1a2b/0".into(), &data).unwrap();
        assert_eq!(request.unit.as_str(), "remote-1a2b/0");
        assert_eq!(request.credential_owner().as_str(), "mysql/0");
        assert_eq!(request.reachable_address(), "192.168.1.9");

        data.set(keys::UNIT_NAME, None);
        let request =
            Request::from_unit_data(RelationId(2), "remote-1a2b/0".into(), &data).unwrap();
        assert_eq!(request.credential_owner().as_str(), "remote-1a2b/0");
    }

    #[test]
    fn test_request_serializes_field_names() {
        let request =
            Request::from_unit_data(RelationId(3), "mysql/0".into(), &complete_data()).unwrap();
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["secret_backend"], "charm-mysql");
        assert_eq!(json["isolated"], true);
        assert_eq!(json["relation_id"], 3);
    }
}
