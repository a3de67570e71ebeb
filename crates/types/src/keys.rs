//! Wire keys exchanged over the relation.
//!
//! Field names are part of the protocol and must not change.

use crate::UnitName;

/// Address at which the requesting unit can reach the provider's backend.
pub const ACCESS_ADDRESS: &str = "access_address";

/// Address the host transport reports for the remote unit.
pub const INGRESS_ADDRESS: &str = "ingress-address";

/// Name of the secret backend to create or access.
pub const SECRET_BACKEND: &str = "secret_backend";

/// Host name of the requesting unit.
pub const HOSTNAME: &str = "hostname";

/// Whether the backend must be isolated per unit.
pub const ISOLATED: &str = "isolated";

/// Self-declared unit name of the requester.
pub const UNIT_NAME: &str = "unit_name";

/// Provider endpoint URL.
pub const VAULT_URL: &str = "vault_url";

/// Base64-encoded provider CA certificate.
pub const VAULT_CA: &str = "vault_ca";

/// The received fields whose change marks a new request.
pub const REQUEST_FIELDS: [&str; 4] = [ACCESS_ADDRESS, SECRET_BACKEND, HOSTNAME, ISOLATED];

/// Per-unit role id key (`mysql/0_role_id`).
pub fn role_id_key(unit: &UnitName) -> String {
    format!("{}_role_id", unit)
}

/// Per-unit one-shot token key (`mysql/0_token`).
pub fn token_key(unit: &UnitName) -> String {
    format!("{}_token", unit)
}

/// Wire encoding of a boolean field.
pub fn encode_bool(value: bool) -> String {
    if value { "true" } else { "false" }.to_string()
}

/// Decode a boolean field. Anything other than `true`/`false` is `None`.
pub fn decode_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "true" | "True" => Some(true),
        "false" | "False" => Some(false),
        _ => None,
    }
}
