//! Fixtures shared by the protocol crates' tests.

use std::net::IpAddr;
use std::sync::Arc;
use vaultkv_core::{Action, StaticEnvironment};
use vaultkv_types::{keys, DataDelta, RelationId};

/// Build a commit from `(key, value)` pairs.
pub fn delta(pairs: &[(&str, Option<&str>)]) -> DataDelta {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
        .collect()
}

/// A complete request commit without a declared unit name.
pub fn request_delta(backend: &str, address: &str, hostname: &str, isolated: bool) -> DataDelta {
    let isolated = keys::encode_bool(isolated);
    delta(&[
        (keys::SECRET_BACKEND, Some(backend)),
        (keys::ACCESS_ADDRESS, Some(address)),
        (keys::HOSTNAME, Some(hostname)),
        (keys::ISOLATED, Some(isolated.as_str())),
    ])
}

/// A complete request commit that also declares `unit_name`.
pub fn named_request_delta(
    unit_name: &str,
    backend: &str,
    address: &str,
    hostname: &str,
    isolated: bool,
) -> DataDelta {
    let mut delta = request_delta(backend, address, hostname, isolated);
    delta.insert(keys::UNIT_NAME.to_string(), Some(unit_name.to_string()));
    delta
}

/// Parse an address literal.
pub fn ip(address: &str) -> IpAddr {
    address.parse().expect("valid IP literal")
}

/// Leader Vault unit with a `secrets` binding on 10.0.0.1/24 and an
/// `external` binding on 192.168.0.1/24.
pub fn provider_env() -> Arc<StaticEnvironment> {
    Arc::new(
        StaticEnvironment::new("vault/0")
            .with_hostname("vault-0")
            .with_private_address(ip("10.0.0.1"))
            .with_interface("10.0.0.1/24".parse().expect("valid CIDR"))
            .with_interface("192.168.0.1/24".parse().expect("valid CIDR"))
            .with_binding("secrets", ip("10.0.0.1"))
            .with_binding("external", ip("192.168.0.1"))
            .with_leader(true),
    )
}

/// Requiring unit `unit` whose `secrets` binding resolves to `address`.
pub fn requirer_env(unit: &str, address: &str) -> Arc<StaticEnvironment> {
    Arc::new(
        StaticEnvironment::new(unit)
            .with_private_address(ip("172.16.0.99"))
            .with_binding("secrets", ip(address)),
    )
}

/// Values published on `relation_id`, in action order.
pub fn published_on(actions: &[Action], relation_id: RelationId) -> Vec<(String, Option<String>)> {
    actions
        .iter()
        .filter_map(|action| match action {
            Action::Publish {
                relation_id: rel,
                key,
                value,
            } if *rel == relation_id => Some((key.clone(), value.clone())),
            _ => None,
        })
        .collect()
}
