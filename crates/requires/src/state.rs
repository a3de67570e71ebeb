//! Requirer state machine.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use vaultkv_core::{
    Action, AddressError, DispatchTable, Event, EventKind, HostEnvironment, Phase, Signal,
    SignalSet, StateMachine,
};
use vaultkv_relation::Endpoint;
use vaultkv_types::{keys, BindingName, RelationId, Response};

use crate::{RequireError, RequirerConfig};

static HANDLERS: DispatchTable<RequirerState> = DispatchTable::new(
    "requirer",
    &[
        (EventKind::PeerJoined, RequirerState::on_peer_joined),
        (EventKind::PeerLeft, RequirerState::on_peer_left),
        (EventKind::RelationBroken, RequirerState::on_relation_broken),
        (EventKind::RelationChanged, RequirerState::on_relation_changed),
    ],
);

/// Backend request last submitted by the local unit.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SubmittedRequest {
    secret_backend: String,
    isolated: bool,
}

/// Requirer (client) side of the relation.
pub struct RequirerState {
    /// Configuration.
    config: RequirerConfig,

    /// Local host queries (unit name, host name, addresses).
    env: Arc<dyn HostEnvironment>,

    /// Relation data view.
    endpoint: Endpoint,

    /// Raised indicators.
    signals: SignalSet,

    /// Re-announced to relations that join after submission.
    submitted: Option<SubmittedRequest>,
}

impl RequirerState {
    /// Create a requirer with no relations.
    pub fn new(config: RequirerConfig, env: Arc<dyn HostEnvironment>) -> Self {
        Self {
            endpoint: Endpoint::new(config.endpoint.clone()),
            config,
            env,
            signals: SignalSet::new(),
            submitted: None,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════════════

    /// Get the configuration.
    pub fn config(&self) -> &RequirerConfig {
        &self.config
    }

    /// Get the relation data view.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Check if at least one relation is established.
    pub fn is_connected(&self) -> bool {
        self.signals.is_set(Signal::Connected)
    }

    /// Check if the backend is ready to use.
    pub fn is_available(&self) -> bool {
        self.signals.is_set(Signal::Available)
    }

    /// Current protocol phase.
    pub fn phase(&self) -> Phase {
        self.signals.phase()
    }

    /// Role id issued to the local unit.
    pub fn unit_role_id(&self) -> Option<&str> {
        let key = keys::role_id_key(&self.env.local_unit());
        self.endpoint.first_received(&key)
    }

    /// One-shot token issued to the local unit.
    pub fn unit_token(&self) -> Option<&str> {
        let key = keys::token_key(&self.env.local_unit());
        self.endpoint.first_received(&key)
    }

    /// Provider endpoint URL.
    pub fn vault_url(&self) -> Option<&str> {
        self.endpoint.first_received(keys::VAULT_URL)
    }

    /// Provider CA certificate, decoded.
    ///
    /// No published CA is `Ok(None)`, not an error. Line breaks and other
    /// ASCII whitespace in the encoded value are ignored.
    pub fn vault_ca(&self) -> Result<Option<Vec<u8>>, RequireError> {
        let Some(encoded) = self.endpoint.first_received(keys::VAULT_CA) else {
            return Ok(None);
        };
        let compact: String = encoded
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        if compact.is_empty() {
            return Ok(None);
        }
        Ok(Some(STANDARD.decode(compact)?))
    }

    /// Everything the provider has told the local unit, as one record.
    pub fn response(&self) -> Response {
        Response {
            vault_url: self.vault_url().map(str::to_string),
            vault_ca: self
                .endpoint
                .first_received(keys::VAULT_CA)
                .map(str::to_string),
            role_id: self.unit_role_id().map(str::to_string),
            token: self.unit_token().map(str::to_string),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Operations
    // ═══════════════════════════════════════════════════════════════════════════

    /// Address the local unit publishes as `access_address`.
    ///
    /// Uses the binding-aware primary address of this endpoint, falling
    /// back to the private address when the host cannot answer.
    pub fn local_address(&self) -> IpAddr {
        let binding = BindingName::from(&self.config.endpoint);
        match self.env.primary_address(&binding) {
            Ok(address) => address,
            Err(AddressError::Unsupported) => {
                debug!(%binding, "Binding lookup unsupported, using private address");
                self.env.private_address()
            }
            Err(err) => {
                warn!(%binding, error = %err, "Binding lookup failed, using private address");
                self.env.private_address()
            }
        }
    }

    /// Ask the provider for a secret backend named `name`.
    ///
    /// Writes the request to every established relation and remembers it
    /// for relations joined later. Safe to call repeatedly.
    pub fn submit_request(&mut self, name: &str, isolated: bool) -> Vec<Action> {
        self.submitted = Some(SubmittedRequest {
            secret_backend: name.to_string(),
            isolated,
        });
        info!(backend = name, isolated, "Requesting secret backend");

        self.endpoint
            .relation_ids()
            .into_iter()
            .flat_map(|relation_id| self.announce(relation_id))
            .collect::<Vec<_>>()
    }

    /// Recompute the available indicator from received data.
    ///
    /// Available iff role id and URL (and, under the token-bearing
    /// contract, the token) are all non-empty.
    pub fn readiness_check(&mut self) -> Vec<Action> {
        let present = |value: Option<&str>| value.is_some_and(|v| !v.is_empty());

        let mut ready = present(self.unit_role_id()) && present(self.vault_url());
        if self.config.contract.requires_token() {
            ready = ready && present(self.unit_token());
        }
        // Indicators never outlive the connection
        ready = ready && self.is_connected();

        let action = self.signals.toggle(Signal::Available, ready);
        match &action {
            Some(Action::SignalRaised(_)) => {
                info!(endpoint = %self.config.endpoint, "Secret backend available")
            }
            Some(_) => {
                info!(endpoint = %self.config.endpoint, "Secret backend no longer available")
            }
            None => {}
        }
        action.into_iter().collect()
    }

    /// Write the submitted request to one relation.
    fn announce(&mut self, relation_id: RelationId) -> Vec<Action> {
        let Some(request) = self.submitted.clone() else {
            return vec![];
        };

        let fields = [
            (keys::SECRET_BACKEND, request.secret_backend),
            (keys::ACCESS_ADDRESS, self.local_address().to_string()),
            (keys::HOSTNAME, self.env.hostname()),
            (keys::ISOLATED, keys::encode_bool(request.isolated)),
            (keys::UNIT_NAME, self.env.local_unit().to_string()),
        ];

        fields
            .into_iter()
            .filter_map(|(key, value)| {
                match self.endpoint.publish(relation_id, key, Some(value.clone())) {
                    Some(true) => Some(Action::Publish {
                        relation_id,
                        key: key.to_string(),
                        value: Some(value),
                    }),
                    _ => None,
                }
            })
            .collect()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Event handlers
    // ═══════════════════════════════════════════════════════════════════════════

    fn on_peer_joined(&mut self, event: Event) -> Vec<Action> {
        let Event::PeerJoined { relation_id, unit } = event else {
            return vec![];
        };

        let mut actions = vec![];
        if self.endpoint.join(relation_id, unit.clone()) {
            info!(relation = %relation_id, unit = %unit, "Relation established");
            actions.extend(self.announce(relation_id));
        }
        actions.extend(self.signals.raise(Signal::Connected));
        actions
    }

    fn on_peer_left(&mut self, event: Event) -> Vec<Action> {
        let Event::PeerLeft { relation_id, unit } = event else {
            return vec![];
        };

        self.endpoint.depart(relation_id, &unit);
        debug!(relation = %relation_id, unit = %unit, "Unit departed");
        self.readiness_check()
    }

    fn on_relation_broken(&mut self, event: Event) -> Vec<Action> {
        let Event::RelationBroken { relation_id } = event else {
            return vec![];
        };

        self.endpoint.break_relation(relation_id);
        info!(relation = %relation_id, "Relation broken");

        if self.endpoint.is_joined() {
            return self.readiness_check();
        }

        let mut actions = vec![];
        actions.extend(self.signals.clear(Signal::Available));
        actions.extend(self.signals.clear(Signal::Connected));
        actions
    }

    fn on_relation_changed(&mut self, event: Event) -> Vec<Action> {
        let Event::RelationChanged {
            relation_id,
            unit,
            delta,
        } = event
        else {
            return vec![];
        };

        let mut actions = vec![];
        if self.endpoint.join(relation_id, unit.clone()) {
            actions.extend(self.announce(relation_id));
            actions.extend(self.signals.raise(Signal::Connected));
        }

        let changed = self.endpoint.apply_remote(relation_id, &unit, &delta);
        debug!(
            relation = %relation_id,
            unit = %unit,
            changed = changed.len(),
            "Relation data changed"
        );

        actions.extend(self.readiness_check());
        actions
    }
}

impl StateMachine for RequirerState {
    fn handle(&mut self, event: Event) -> Vec<Action> {
        HANDLERS.dispatch(self, event)
    }

    fn signals(&self) -> &SignalSet {
        &self.signals
    }
}

impl std::fmt::Debug for RequirerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequirerState")
            .field("config", &self.config)
            .field("relations", &self.endpoint.len())
            .field("signals", &self.signals)
            .field("submitted", &self.submitted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReadinessContract;
    use tracing_test::traced_test;
    use vaultkv_core::StaticEnvironment;
    use vaultkv_test_helpers::{delta, ip, published_on, requirer_env};
    use vaultkv_types::DataDelta;

    fn make_test_state(config: RequirerConfig) -> RequirerState {
        RequirerState::new(config, requirer_env("mysql/0", "10.0.0.5"))
    }

    fn from_vault(state: &mut RequirerState, delta: DataDelta) -> Vec<Action> {
        state.handle(Event::RelationChanged {
            relation_id: RelationId(1),
            unit: "vault/0".into(),
            delta,
        })
    }

    fn full_response() -> DataDelta {
        delta(&[
            ("vault_url", Some("https://10.0.0.1:8200")),
            ("mysql/0_role_id", Some("r1")),
            ("mysql/0_token", Some("t1")),
        ])
    }

    #[traced_test]
    #[test]
    fn test_submit_request_writes_every_relation() {
        let mut state = make_test_state(RequirerConfig::default());
        state.handle(Event::PeerJoined {
            relation_id: RelationId(1),
            unit: "vault/0".into(),
        });
        state.handle(Event::PeerJoined {
            relation_id: RelationId(2),
            unit: "vault-b/0".into(),
        });

        let actions = state.submit_request("charm-mysql", true);
        let expected = vec![
            ("secret_backend".to_string(), Some("charm-mysql".to_string())),
            ("access_address".to_string(), Some("10.0.0.5".to_string())),
            ("hostname".to_string(), Some("mysql-0".to_string())),
            ("isolated".to_string(), Some("true".to_string())),
            ("unit_name".to_string(), Some("mysql/0".to_string())),
        ];
        assert_eq!(published_on(&actions, RelationId(1)), expected);
        assert_eq!(published_on(&actions, RelationId(2)), expected);

        // Repeating the same request changes nothing
        assert!(state.submit_request("charm-mysql", true).is_empty());

        // Last write wins per key
        let actions = state.submit_request("charm-mysql", false);
        assert_eq!(
            published_on(&actions, RelationId(1)),
            vec![("isolated".to_string(), Some("false".to_string()))]
        );
    }

    #[traced_test]
    #[test]
    fn test_request_announced_to_late_relation() {
        let mut state = make_test_state(RequirerConfig::default());
        assert!(state.submit_request("charm-mysql", true).is_empty());

        let actions = state.handle(Event::PeerJoined {
            relation_id: RelationId(5),
            unit: "vault/0".into(),
        });
        assert_eq!(published_on(&actions, RelationId(5)).len(), 5);
        assert_eq!(actions.last(), Some(&Action::SignalRaised(Signal::Connected)));
    }

    #[traced_test]
    #[test]
    fn test_local_address_falls_back_to_private() {
        let state = make_test_state(RequirerConfig::default());
        assert_eq!(state.local_address(), ip("10.0.0.5"));

        let legacy = RequirerState::new(
            RequirerConfig::default(),
            Arc::new(
                StaticEnvironment::new("mysql/0")
                    .with_private_address(ip("172.16.0.4"))
                    .with_binding("secrets", ip("10.0.0.5"))
                    .without_binding_lookup(),
            ),
        );
        assert_eq!(legacy.local_address(), ip("172.16.0.4"));

        let unbound = RequirerState::new(
            RequirerConfig::default().with_endpoint("other"),
            requirer_env("mysql/0", "10.0.0.5"),
        );
        assert_eq!(unbound.local_address(), ip("172.16.0.99"));
        assert!(logs_contain("Binding lookup failed"));
    }

    #[traced_test]
    #[test]
    fn test_readiness_requires_all_fields() {
        let mut state = make_test_state(RequirerConfig::default());

        from_vault(&mut state, delta(&[("vault_url", Some("https://10.0.0.1:8200"))]));
        assert!(!state.is_available());

        from_vault(&mut state, delta(&[("mysql/0_role_id", Some("r1"))]));
        assert!(!state.is_available());

        let actions = from_vault(&mut state, delta(&[("mysql/0_token", Some("t1"))]));
        assert_eq!(actions, vec![Action::SignalRaised(Signal::Available)]);
        assert_eq!(state.phase(), Phase::Ready);

        // Flipping any one field to empty clears readiness
        for key in ["vault_url", "mysql/0_role_id", "mysql/0_token"] {
            let actions = from_vault(&mut state, delta(&[(key, Some(""))]));
            assert_eq!(actions, vec![Action::SignalCleared(Signal::Available)]);
            from_vault(&mut state, full_response());
            assert!(state.is_available());
        }
    }

    #[traced_test]
    #[test]
    fn test_readiness_without_token_contract() {
        let mut state = make_test_state(
            RequirerConfig::default().with_contract(ReadinessContract::V1RoleId),
        );
        from_vault(
            &mut state,
            delta(&[
                ("vault_url", Some("https://10.0.0.1:8200")),
                ("mysql/0_role_id", Some("r1")),
            ]),
        );
        assert!(state.is_available());
    }

    #[traced_test]
    #[test]
    fn test_retraction_clears_readiness() {
        let mut state = make_test_state(RequirerConfig::default());
        from_vault(&mut state, full_response());
        assert!(state.is_available());

        let actions = from_vault(
            &mut state,
            delta(&[("mysql/0_role_id", None), ("mysql/0_token", None)]),
        );
        assert_eq!(actions, vec![Action::SignalCleared(Signal::Available)]);
        assert_eq!(state.unit_role_id(), None);
        assert_eq!(state.unit_token(), None);
        assert_eq!(state.phase(), Phase::Connected);
    }

    #[traced_test]
    #[test]
    fn test_credentials_for_other_unit_are_ignored() {
        let mut state = make_test_state(RequirerConfig::default());
        from_vault(
            &mut state,
            delta(&[
                ("vault_url", Some("https://10.0.0.1:8200")),
                ("mysql/1_role_id", Some("r2")),
                ("mysql/1_token", Some("t2")),
            ]),
        );
        assert_eq!(state.unit_role_id(), None);
        assert_eq!(state.unit_token(), None);
        assert!(!state.is_available());
    }

    #[traced_test]
    #[test]
    fn test_vault_ca_decoding() {
        let mut state = make_test_state(RequirerConfig::default());
        assert_eq!(state.vault_ca(), Ok(None));

        from_vault(&mut state, delta(&[("vault_ca", Some("Q0EtREFUQQ=="))]));
        assert_eq!(state.vault_ca(), Ok(Some(b"CA-DATA".to_vec())));

        from_vault(&mut state, delta(&[("vault_ca", Some("not base64!"))]));
        assert!(matches!(state.vault_ca(), Err(RequireError::InvalidCa(_))));
    }

    #[traced_test]
    #[test]
    fn test_vault_ca_line_wrapped() {
        let mut state = make_test_state(RequirerConfig::default());
        from_vault(&mut state, delta(&[("vault_ca", Some("Q0Et\nREFUQQ==\n"))]));
        assert_eq!(state.vault_ca(), Ok(Some(b"CA-DATA".to_vec())));

        from_vault(&mut state, delta(&[("vault_ca", Some("Q0Et\r\n  REFU\tQQ=="))]));
        assert_eq!(state.vault_ca(), Ok(Some(b"CA-DATA".to_vec())));

        from_vault(&mut state, delta(&[("vault_ca", Some(" \n"))]));
        assert_eq!(state.vault_ca(), Ok(None));
    }

    #[traced_test]
    #[test]
    fn test_disconnect_clears_everything() {
        let mut state = make_test_state(RequirerConfig::default());
        from_vault(&mut state, full_response());
        assert!(state.is_available());

        let actions = state.handle(Event::RelationBroken {
            relation_id: RelationId(1),
        });
        assert_eq!(
            actions,
            vec![
                Action::SignalCleared(Signal::Available),
                Action::SignalCleared(Signal::Connected),
            ]
        );
        assert_eq!(state.phase(), Phase::Disconnected);
        assert_eq!(state.vault_url(), None);
    }

    #[traced_test]
    #[test]
    fn test_provider_unit_leaving_clears_readiness() {
        let mut state = make_test_state(RequirerConfig::default());
        from_vault(&mut state, full_response());

        let actions = state.handle(Event::PeerLeft {
            relation_id: RelationId(1),
            unit: "vault/0".into(),
        });
        assert_eq!(actions, vec![Action::SignalCleared(Signal::Available)]);
        assert!(state.is_connected());
    }

    #[traced_test]
    #[test]
    fn test_leadership_events_are_ignored() {
        let mut state = make_test_state(RequirerConfig::default());
        from_vault(&mut state, full_response());
        assert!(state.handle(Event::LeadershipLost).is_empty());
        assert!(state.is_available());
    }

    #[traced_test]
    #[test]
    fn test_response_record() {
        let mut state = make_test_state(RequirerConfig::default());
        from_vault(&mut state, full_response());
        let response = state.response();
        assert_eq!(response.vault_url.as_deref(), Some("https://10.0.0.1:8200"));
        assert_eq!(response.role_id.as_deref(), Some("r1"));
        assert_eq!(response.token.as_deref(), Some("t1"));
        assert_eq!(response.vault_ca, None);
    }
}
