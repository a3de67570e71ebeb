//! Provider state machine.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use vaultkv_core::{
    Action, DispatchTable, Event, EventKind, HostEnvironment, Phase, Signal, SignalSet,
    StateMachine,
};
use vaultkv_relation::Endpoint;
use vaultkv_types::{keys, BindingName, Credentials, DataBag, RelationId, Request, UnitName};

use crate::binding::relation_in_network;
use crate::{ProvideError, ProviderConfig};

static HANDLERS: DispatchTable<ProviderState> = DispatchTable::new(
    "provider",
    &[
        (EventKind::PeerJoined, ProviderState::on_peer_joined),
        (EventKind::PeerLeft, ProviderState::on_peer_left),
        (EventKind::RelationBroken, ProviderState::on_relation_broken),
        (EventKind::RelationChanged, ProviderState::on_relation_changed),
        (EventKind::LeadershipLost, ProviderState::on_leadership_lost),
    ],
);

/// Provider (Vault server) side of the relation.
///
/// Watches remote units for backend requests and publishes the endpoint
/// URL, CA certificate and per-unit credentials. Credential writes are
/// gated on leadership; losing it retracts everything this unit issued.
pub struct ProviderState {
    /// Configuration.
    config: ProviderConfig,

    /// Local host queries (leadership, bindings).
    env: Arc<dyn HostEnvironment>,

    /// Relation data view.
    endpoint: Endpoint,

    /// Raised indicators.
    signals: SignalSet,

    /// Owner names credentials were published under, per relation and
    /// transport unit. A unit may re-declare its name after issuance.
    issued: BTreeMap<(RelationId, UnitName), BTreeSet<UnitName>>,
}

impl ProviderState {
    /// Create a provider with no relations.
    pub fn new(config: ProviderConfig, env: Arc<dyn HostEnvironment>) -> Self {
        Self {
            endpoint: Endpoint::new(config.endpoint.clone()),
            config,
            env,
            signals: SignalSet::new(),
            issued: BTreeMap::new(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════════════

    /// Get the configuration.
    pub fn config(&self) -> &ProviderConfig {
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

    /// Check if a request change is waiting to be processed.
    pub fn has_new_request(&self) -> bool {
        self.signals.is_set(Signal::NewRequest)
    }

    /// Current protocol phase.
    pub fn phase(&self) -> Phase {
        self.signals.phase()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Request detection
    // ═══════════════════════════════════════════════════════════════════════════

    /// Turn pending request-field changes into a new-request indicator.
    ///
    /// If any of `access_address`, `secret_backend`, `hostname` or
    /// `isolated` changed, all four markers are acknowledged together and
    /// the indicator is raised. Without a fresh change this does nothing.
    pub fn observe_change(&mut self) -> Vec<Action> {
        let changed = self.endpoint.changed_among(&keys::REQUEST_FIELDS);
        if changed.is_empty() {
            return vec![];
        }

        debug!(fields = ?changed, "Request fields changed");
        self.endpoint.acknowledge(&keys::REQUEST_FIELDS);

        let action = self.signals.raise(Signal::NewRequest);
        if action.is_some() {
            info!(endpoint = %self.config.endpoint, "New secret backend request");
        }
        action.into_iter().collect()
    }

    /// Mark the current request set as processed.
    ///
    /// Called by the host once it has acted on [`Self::collect_requests`].
    pub fn acknowledge_requests(&mut self) -> Vec<Action> {
        self.signals.clear(Signal::NewRequest).into_iter().collect()
    }

    /// All complete requests across every relation and unit, in join order.
    ///
    /// Units whose data does not yet form a complete request are skipped.
    pub fn collect_requests(&self) -> Vec<Request> {
        self.endpoint
            .all_joined_units()
            .filter_map(|(relation_id, unit, data)| {
                match Request::from_unit_data(relation_id, unit.clone(), data) {
                    Ok(request) => Some(request),
                    Err(reason) => {
                        debug!(
                            relation = %relation_id,
                            unit = %unit,
                            %reason,
                            "Skipping incomplete request"
                        );
                        None
                    }
                }
            })
            .collect()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Publishing
    // ═══════════════════════════════════════════════════════════════════════════

    /// Publish the endpoint URL to every relation.
    ///
    /// With a `binding`, a relation only receives the URL if its first
    /// unit's address lies in the network the binding resolves to
    /// locally. Relations without units are not filtered.
    pub fn publish_url(
        &mut self,
        url: &str,
        binding: Option<&BindingName>,
    ) -> Result<Vec<Action>, ProvideError> {
        let network = match binding {
            Some(binding) => Some(
                self.env
                    .binding_network(binding)
                    .ok_or_else(|| ProvideError::UnresolvedBinding(binding.clone()))?,
            ),
            None => None,
        };

        let mut actions = vec![];
        for relation_id in self.endpoint.relation_ids() {
            if let Some(network) = &network {
                let in_network = self
                    .endpoint
                    .relation(relation_id)
                    .is_some_and(|relation| relation_in_network(relation, network));
                if !in_network {
                    debug!(
                        relation = %relation_id,
                        %network,
                        "Remote unit outside bound network, not publishing URL"
                    );
                    continue;
                }
            }
            actions.extend(self.publish(relation_id, keys::VAULT_URL, Some(url.to_string())));
        }
        Ok(actions)
    }

    /// Publish the base64-encoded CA certificate to every relation.
    pub fn publish_ca(&mut self, encoded_ca: &str) -> Vec<Action> {
        self.endpoint
            .relation_ids()
            .into_iter()
            .filter_map(|relation_id| {
                self.publish(relation_id, keys::VAULT_CA, Some(encoded_ca.to_string()))
            })
            .collect()
    }

    /// Encode raw CA bytes and publish them to every relation.
    pub fn publish_ca_pem(&mut self, ca: &[u8]) -> Vec<Action> {
        let encoded = STANDARD.encode(ca);
        self.publish_ca(&encoded)
    }

    /// Publish credentials for the unit that made `request`.
    ///
    /// Keys are namespaced by the unit's declared name, falling back to its
    /// transport identity.
    pub fn issue_credentials(
        &mut self,
        request: &Request,
        credentials: &Credentials,
    ) -> Result<Vec<Action>, ProvideError> {
        if !self.env.is_leader() {
            warn!(unit = %request.unit, "Not the leader, refusing to issue credentials");
            return Err(ProvideError::NotLeader);
        }
        if self.endpoint.relation(request.relation_id).is_none() {
            return Err(ProvideError::UnknownRelation(request.relation_id));
        }

        let owner = request.credential_owner();
        self.issued
            .entry((request.relation_id, request.unit.clone()))
            .or_default()
            .insert(owner.clone());
        info!(
            relation = %request.relation_id,
            unit = %request.unit,
            owner = %owner,
            "Issuing credentials"
        );

        let mut actions = vec![];
        actions.extend(self.publish(
            request.relation_id,
            &keys::role_id_key(owner),
            Some(credentials.role_id.clone()),
        ));
        actions.extend(self.publish(
            request.relation_id,
            &keys::token_key(owner),
            Some(credentials.token.clone()),
        ));
        Ok(actions)
    }

    /// Withdraw every role id and token published by this unit.
    ///
    /// Runs when leadership is lost. Never fails; keys that were never
    /// issued produce no writes.
    pub fn retract_all_credentials(&mut self) -> Vec<Action> {
        let mut targets: BTreeSet<(RelationId, UnitName)> = self
            .endpoint
            .all_joined_units()
            .flat_map(|(relation_id, unit, data)| {
                credential_owners(unit, data)
                    .into_iter()
                    .map(move |owner| (relation_id, owner))
            })
            .collect();
        for ((relation_id, _), owners) in std::mem::take(&mut self.issued) {
            targets.extend(owners.into_iter().map(|owner| (relation_id, owner)));
        }

        let mut actions = vec![];
        for (relation_id, owner) in targets {
            actions.extend(self.clear_credentials(relation_id, &owner));
        }

        info!(
            endpoint = %self.config.endpoint,
            writes = actions.len(),
            "Retracted all credentials"
        );
        actions
    }

    /// Withdraw the credentials of one unit (administrator revocation).
    pub fn revoke_credentials(&mut self, relation_id: RelationId, unit: &UnitName) -> Vec<Action> {
        let data = self
            .endpoint
            .relation(relation_id)
            .and_then(|relation| relation.received(unit))
            .cloned();
        self.clear_unit_credentials(relation_id, unit, data.as_ref())
    }

    /// Clear every name `unit`'s credentials were, or may have been,
    /// published under, and forget them.
    fn clear_unit_credentials(
        &mut self,
        relation_id: RelationId,
        unit: &UnitName,
        data: Option<&DataBag>,
    ) -> Vec<Action> {
        let mut owners: BTreeSet<UnitName> = match data {
            Some(data) => credential_owners(unit, data).into_iter().collect(),
            None => BTreeSet::from([unit.clone()]),
        };
        if let Some(issued) = self.issued.remove(&(relation_id, unit.clone())) {
            owners.extend(issued);
        }

        owners
            .iter()
            .flat_map(|owner| self.clear_credentials(relation_id, owner))
            .collect()
    }

    fn clear_credentials(&mut self, relation_id: RelationId, owner: &UnitName) -> Vec<Action> {
        let mut actions = vec![];
        actions.extend(self.publish(relation_id, &keys::role_id_key(owner), None));
        actions.extend(self.publish(relation_id, &keys::token_key(owner), None));
        actions
    }

    /// Record a write locally, returning the action if it changed anything.
    fn publish(
        &mut self,
        relation_id: RelationId,
        key: &str,
        value: Option<String>,
    ) -> Option<Action> {
        match self.endpoint.publish(relation_id, key, value.clone()) {
            Some(true) => Some(Action::Publish {
                relation_id,
                key: key.to_string(),
                value,
            }),
            Some(false) => None,
            None => {
                debug!(relation = %relation_id, key, "Relation gone, dropping write");
                None
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Event handlers
    // ═══════════════════════════════════════════════════════════════════════════

    fn on_peer_joined(&mut self, event: Event) -> Vec<Action> {
        let Event::PeerJoined { relation_id, unit } = event else {
            return vec![];
        };

        if self.endpoint.join(relation_id, unit.clone()) {
            info!(relation = %relation_id, unit = %unit, "Relation established");
        } else {
            debug!(relation = %relation_id, unit = %unit, "Unit joined");
        }
        self.signals.raise(Signal::Connected).into_iter().collect()
    }

    fn on_peer_left(&mut self, event: Event) -> Vec<Action> {
        let Event::PeerLeft { relation_id, unit } = event else {
            return vec![];
        };

        let Some(data) = self.endpoint.depart(relation_id, &unit) else {
            debug!(relation = %relation_id, unit = %unit, "Unknown unit left");
            return vec![];
        };

        info!(relation = %relation_id, unit = %unit, "Unit departed, clearing its credentials");
        self.clear_unit_credentials(relation_id, &unit, Some(&data))
    }

    fn on_relation_broken(&mut self, event: Event) -> Vec<Action> {
        let Event::RelationBroken { relation_id } = event else {
            return vec![];
        };

        self.endpoint.break_relation(relation_id);
        self.issued.retain(|(issued_on, _), _| *issued_on != relation_id);
        info!(relation = %relation_id, "Relation broken");

        if self.endpoint.is_joined() {
            return vec![];
        }

        let mut actions = vec![];
        actions.extend(self.signals.clear(Signal::NewRequest));
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
            actions.extend(self.signals.raise(Signal::Connected));
        }

        let changed = self.endpoint.apply_remote(relation_id, &unit, &delta);
        debug!(
            relation = %relation_id,
            unit = %unit,
            changed = changed.len(),
            "Relation data changed"
        );

        actions.extend(self.observe_change());
        actions
    }

    fn on_leadership_lost(&mut self, _event: Event) -> Vec<Action> {
        info!("Leadership lost, retracting issued credentials");
        self.retract_all_credentials()
    }
}

impl StateMachine for ProviderState {
    fn handle(&mut self, event: Event) -> Vec<Action> {
        HANDLERS.dispatch(self, event)
    }

    fn signals(&self) -> &SignalSet {
        &self.signals
    }
}

impl std::fmt::Debug for ProviderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderState")
            .field("config", &self.config)
            .field("relations", &self.endpoint.len())
            .field("signals", &self.signals)
            .finish()
    }
}

/// Names a unit's credentials may have been published under.
fn credential_owners(unit: &UnitName, data: &DataBag) -> Vec<UnitName> {
    let mut owners = vec![unit.clone()];
    if let Some(declared) = data.get_non_empty(keys::UNIT_NAME) {
        if declared != unit.as_str() {
            owners.insert(0, UnitName::new(declared));
        }
    }
    owners
}
