//! Credential issuance for the simulated Vault.

use std::collections::HashMap;
use vaultkv_types::{Credentials, Request, UnitName};

/// Source of AppRole credentials.
///
/// The relation only carries what an issuer hands out; creating roles and
/// secret ids in Vault itself happens behind this trait.
pub trait CredentialIssuer: Send {
    /// Issue credentials for `request`.
    ///
    /// Called on every serve round, so a unit that is served again gets a
    /// fresh token.
    fn issue(&mut self, request: &Request) -> Credentials;
}

/// Deterministic issuer: role ids `r1, r2, ...` stable per owner, tokens
/// `t1, t2, ...` fresh on every call.
#[derive(Debug, Default)]
pub struct SequentialIssuer {
    roles: HashMap<UnitName, String>,
    tokens_issued: u64,
}

impl SequentialIssuer {
    /// Create an issuer that has issued nothing yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tokens handed out so far.
    pub fn tokens_issued(&self) -> u64 {
        self.tokens_issued
    }
}

impl CredentialIssuer for SequentialIssuer {
    fn issue(&mut self, request: &Request) -> Credentials {
        let next_role = self.roles.len() + 1;
        let role_id = self
            .roles
            .entry(request.credential_owner().clone())
            .or_insert_with(|| format!("r{next_role}"))
            .clone();

        self.tokens_issued += 1;
        Credentials::new(role_id, format!("t{}", self.tokens_issued))
    }
}
