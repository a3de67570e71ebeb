//! Simulation runner.

use indexmap::IndexMap;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use vaultkv_core::{Action, Event, HostEnvironment, Signal, StateMachine, StaticEnvironment};
use vaultkv_provides::{ProvideError, ProviderState};
use vaultkv_requires::RequirerState;
use vaultkv_types::{DataDelta, RelationId, UnitName};

use crate::{CredentialIssuer, SequentialIssuer, SimulationConfig};

/// Which state machine an event is delivered to.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Provider,
    Requirer(UnitName),
}

/// One queued delivery.
#[derive(Debug)]
struct Delivery {
    target: Target,
    event: Event,
}

/// A requiring unit and the relation it currently takes part in.
struct RequirerUnit {
    state: RequirerState,
    /// Name the provider sees the unit under.
    transport: UnitName,
    relation: Option<RelationId>,
}

/// Statistics collected during a run.
#[derive(Debug, Clone, Default)]
pub struct SimulationStats {
    /// Events handled by either side.
    pub events_processed: u64,

    /// Grouped commits delivered to remote units.
    pub commits_delivered: u64,

    /// Times the simulated Vault reacted to `new-request`.
    pub serve_rounds: u64,

    /// Credential pairs published.
    pub credentials_issued: u64,

    /// Credential pairs the provider refused to publish.
    pub credentials_refused: u64,
}

/// Plays the orchestrator between one Vault unit and any number of
/// requiring units.
///
/// Every application is related to the provider at most once. Writes one
/// side makes while handling a single event are delivered to the other
/// side as one commit per relation, in FIFO order.
pub struct SimulationRunner {
    config: SimulationConfig,
    provider: ProviderState,
    provider_env: Arc<StaticEnvironment>,
    requirers: IndexMap<UnitName, RequirerUnit>,
    /// Application related on each relation.
    relations: IndexMap<RelationId, String>,
    next_relation: u64,
    queue: VecDeque<Delivery>,
    issuer: Box<dyn CredentialIssuer>,
    stats: SimulationStats,
}

impl SimulationRunner {
    /// Create a runner around the provider unit described by `provider_env`.
    pub fn new(config: SimulationConfig, provider_env: StaticEnvironment) -> Self {
        let provider_env = Arc::new(provider_env);
        let provider = ProviderState::new(
            config.provider.clone(),
            Arc::clone(&provider_env) as Arc<dyn HostEnvironment>,
        );
        info!(unit = %provider_env.local_unit(), "Created simulation provider");

        Self {
            config,
            provider,
            provider_env,
            requirers: IndexMap::new(),
            relations: IndexMap::new(),
            next_relation: 0,
            queue: VecDeque::new(),
            issuer: Box::new(SequentialIssuer::new()),
            stats: SimulationStats::default(),
        }
    }

    /// Replace the credential issuer.
    pub fn with_issuer(mut self, issuer: Box<dyn CredentialIssuer>) -> Self {
        self.issuer = issuer;
        self
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════════════

    /// The provider state machine.
    pub fn provider(&self) -> &ProviderState {
        &self.provider
    }

    /// A requirer state machine.
    pub fn requirer(&self, unit: &UnitName) -> Option<&RequirerState> {
        self.requirers.get(unit).map(|u| &u.state)
    }

    /// Registered requiring units, in registration order.
    pub fn requirer_units(&self) -> impl Iterator<Item = &UnitName> {
        self.requirers.keys()
    }

    /// The relation `application` is related on, if any.
    pub fn relation_of(&self, application: &str) -> Option<RelationId> {
        self.relations
            .iter()
            .find(|(_, app)| app.as_str() == application)
            .map(|(id, _)| *id)
    }

    /// Statistics so far.
    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    /// Number of queued deliveries.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Topology
    // ═══════════════════════════════════════════════════════════════════════════

    /// Register a requiring unit.
    ///
    /// If its application is already related the unit joins that relation.
    pub fn add_requirer(&mut self, env: StaticEnvironment) -> UnitName {
        let transport = env.local_unit();
        self.register(env, transport)
    }

    /// Register a requiring unit reached across models.
    ///
    /// The provider sees it as `transport` (for example `remote-1a2b/0`)
    /// while the unit declares its own name in its request. Applications
    /// are related by their transport name.
    pub fn add_cross_model_requirer(
        &mut self,
        env: StaticEnvironment,
        transport: UnitName,
    ) -> UnitName {
        self.register(env, transport)
    }

    fn register(&mut self, env: StaticEnvironment, transport: UnitName) -> UnitName {
        let unit = env.local_unit();
        let state = RequirerState::new(self.config.requirer.clone(), Arc::new(env));
        debug!(unit = %unit, transport = %transport, "Registered requirer unit");

        let application = transport.application().to_string();
        self.requirers.insert(
            unit.clone(),
            RequirerUnit {
                state,
                transport,
                relation: None,
            },
        );

        if let Some(relation_id) = self.relation_of(&application) {
            self.join(relation_id, &unit);
        }
        unit
    }

    /// Relate `application` to the provider, joining all its units.
    ///
    /// Relating an already related application returns the existing id.
    pub fn relate(&mut self, application: &str) -> RelationId {
        if let Some(relation_id) = self.relation_of(application) {
            return relation_id;
        }

        self.next_relation += 1;
        let relation_id = RelationId(self.next_relation);
        self.relations.insert(relation_id, application.to_string());
        info!(relation = %relation_id, application, "Related application");

        let units: Vec<UnitName> = self
            .requirers
            .iter()
            .filter(|(_, u)| u.transport.application() == application)
            .map(|(unit, _)| unit.clone())
            .collect();
        for unit in units {
            self.join(relation_id, &unit);
        }
        relation_id
    }

    /// A requiring unit leaves its relation.
    pub fn depart(&mut self, unit: &UnitName) {
        let Some((relation_id, transport)) = self
            .requirers
            .get_mut(unit)
            .and_then(|u| Some((u.relation.take()?, u.transport.clone())))
        else {
            warn!(unit = %unit, "Departing unit is not related");
            return;
        };

        self.enqueue(
            Target::Provider,
            Event::PeerLeft {
                relation_id,
                unit: transport,
            },
        );
        self.enqueue(Target::Requirer(unit.clone()), Event::RelationBroken { relation_id });
    }

    /// Remove a relation on both sides.
    pub fn break_relation(&mut self, relation_id: RelationId) {
        if self.relations.shift_remove(&relation_id).is_none() {
            warn!(relation = %relation_id, "Breaking unknown relation");
            return;
        }

        self.enqueue(Target::Provider, Event::RelationBroken { relation_id });
        let members: Vec<UnitName> = self
            .requirers
            .iter_mut()
            .filter(|(_, u)| u.relation == Some(relation_id))
            .map(|(unit, u)| {
                u.relation = None;
                unit.clone()
            })
            .collect();
        for unit in members {
            self.enqueue(Target::Requirer(unit), Event::RelationBroken { relation_id });
        }
    }

    fn join(&mut self, relation_id: RelationId, unit: &UnitName) {
        let Some(requirer) = self.requirers.get_mut(unit) else {
            return;
        };
        requirer.relation = Some(relation_id);
        let transport = requirer.transport.clone();
        let provider_unit = self.provider_env.local_unit();

        self.enqueue(
            Target::Provider,
            Event::PeerJoined {
                relation_id,
                unit: transport,
            },
        );
        self.enqueue(
            Target::Requirer(unit.clone()),
            Event::PeerJoined {
                relation_id,
                unit: provider_unit.clone(),
            },
        );

        // A unit joining late sees everything already published
        let snapshot: DataDelta = self
            .provider
            .endpoint()
            .published(relation_id)
            .map(|data| {
                data.iter()
                    .map(|(key, value)| (key.to_string(), Some(value.to_string())))
                    .collect()
            })
            .unwrap_or_default();
        if !snapshot.is_empty() {
            self.stats.commits_delivered += 1;
            self.enqueue(
                Target::Requirer(unit.clone()),
                Event::RelationChanged {
                    relation_id,
                    unit: provider_unit,
                    delta: snapshot,
                },
            );
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Operations
    // ═══════════════════════════════════════════════════════════════════════════

    /// Have `unit` request a secret backend.
    pub fn submit_request(&mut self, unit: &UnitName, backend: &str, isolated: bool) {
        let Some(requirer) = self.requirers.get_mut(unit) else {
            warn!(unit = %unit, "Request from unknown unit");
            return;
        };
        let actions = requirer.state.submit_request(backend, isolated);
        self.process_actions(Target::Requirer(unit.clone()), actions);
    }

    /// The provider unit loses leadership.
    pub fn revoke_leadership(&mut self) {
        self.provider_env.set_leader(false);
        self.enqueue(Target::Provider, Event::LeadershipLost);
    }

    /// The provider unit (re)gains leadership.
    ///
    /// Nothing is re-issued until the next request change.
    pub fn grant_leadership(&mut self) {
        self.provider_env.set_leader(true);
    }

    /// Withdraw every credential the provider published.
    pub fn retract_all_credentials(&mut self) {
        let actions = self.provider.retract_all_credentials();
        self.process_actions(Target::Provider, actions);
    }

    /// Withdraw the credentials of one unit.
    pub fn revoke_credentials(&mut self, unit: &UnitName) {
        let Some((relation_id, transport)) = self
            .requirers
            .get(unit)
            .and_then(|u| Some((u.relation?, u.transport.clone())))
        else {
            warn!(unit = %unit, "Revoking credentials of unrelated unit");
            return;
        };
        let actions = self.provider.revoke_credentials(relation_id, &transport);
        self.process_actions(Target::Provider, actions);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Event loop
    // ═══════════════════════════════════════════════════════════════════════════

    /// Process queued deliveries until none remain.
    ///
    /// Returns the number of events handled. Stops early with a warning
    /// once the configured event bound is reached.
    pub fn run_until_idle(&mut self) -> usize {
        let mut handled = 0;
        while let Some(delivery) = self.queue.pop_front() {
            if handled >= self.config.max_events {
                warn!(
                    max_events = self.config.max_events,
                    pending = self.queue.len() + 1,
                    "Event bound reached, stopping"
                );
                self.queue.push_front(delivery);
                break;
            }
            self.step(delivery);
            handled += 1;
        }
        debug!(handled, "Simulation idle");
        handled
    }

    fn step(&mut self, delivery: Delivery) {
        let Delivery { target, event } = delivery;
        trace!(to = ?target, event = event.type_name(), "Delivering event");
        self.stats.events_processed += 1;

        let actions = match &target {
            Target::Provider => self.provider.handle(event),
            Target::Requirer(unit) => match self.requirers.get_mut(unit) {
                Some(requirer) => requirer.state.handle(event),
                None => {
                    warn!(unit = %unit, "Event for unknown unit dropped");
                    return;
                }
            },
        };
        self.process_actions(target, actions);
    }

    fn enqueue(&mut self, target: Target, event: Event) {
        self.queue.push_back(Delivery { target, event });
    }

    /// Turn one batch of actions into commits for the other side.
    fn process_actions(&mut self, origin: Target, actions: Vec<Action>) {
        let mut commits: BTreeMap<RelationId, DataDelta> = BTreeMap::new();
        let mut serve = false;

        for action in actions {
            match action {
                Action::Publish {
                    relation_id,
                    key,
                    value,
                } => {
                    commits.entry(relation_id).or_default().insert(key, value);
                }
                Action::SignalRaised(signal) => {
                    debug!(origin = ?origin, signal = signal.as_str(), "Indicator raised");
                    if origin == Target::Provider && signal == Signal::NewRequest {
                        serve = true;
                    }
                }
                Action::SignalCleared(signal) => {
                    debug!(origin = ?origin, signal = signal.as_str(), "Indicator cleared");
                }
            }
        }

        for (relation_id, delta) in commits {
            self.deliver_commit(&origin, relation_id, delta);
        }

        if serve {
            self.serve_requests();
        }
    }

    fn deliver_commit(&mut self, origin: &Target, relation_id: RelationId, delta: DataDelta) {
        match origin {
            Target::Provider => {
                let provider_unit = self.provider_env.local_unit();
                let members: Vec<UnitName> = self
                    .requirers
                    .iter()
                    .filter(|(_, u)| u.relation == Some(relation_id))
                    .map(|(unit, _)| unit.clone())
                    .collect();
                for unit in members {
                    self.stats.commits_delivered += 1;
                    self.enqueue(
                        Target::Requirer(unit),
                        Event::RelationChanged {
                            relation_id,
                            unit: provider_unit.clone(),
                            delta: delta.clone(),
                        },
                    );
                }
            }
            Target::Requirer(unit) => {
                let transport = self
                    .requirers
                    .get(unit)
                    .filter(|u| u.relation == Some(relation_id))
                    .map(|u| u.transport.clone());
                let Some(transport) = transport else {
                    debug!(
                        relation = %relation_id,
                        unit = %unit,
                        "Commit on departed relation dropped"
                    );
                    return;
                };
                self.stats.commits_delivered += 1;
                self.enqueue(
                    Target::Provider,
                    Event::RelationChanged {
                        relation_id,
                        unit: transport,
                        delta,
                    },
                );
            }
        }
    }

    /// Simulated Vault reaction to `new-request`.
    ///
    /// Issues credentials for every complete request, publishes the URL and
    /// CA, then acknowledges the indicator.
    fn serve_requests(&mut self) {
        self.stats.serve_rounds += 1;
        let requests = self.provider.collect_requests();
        info!(requests = requests.len(), "Serving backend requests");

        let mut actions = vec![];
        for request in &requests {
            let credentials = self.issuer.issue(request);
            match self.provider.issue_credentials(request, &credentials) {
                Ok(published) => {
                    self.stats.credentials_issued += 1;
                    actions.extend(published);
                }
                Err(ProvideError::NotLeader) => {
                    self.stats.credentials_refused += 1;
                }
                Err(err) => {
                    self.stats.credentials_refused += 1;
                    warn!(unit = %request.unit, error = %err, "Failed to issue credentials");
                }
            }
        }

        match self
            .provider
            .publish_url(&self.config.vault_url, self.config.url_binding.as_ref())
        {
            Ok(published) => actions.extend(published),
            Err(err) => warn!(error = %err, "Failed to publish URL"),
        }
        if let Some(ca) = &self.config.vault_ca {
            actions.extend(self.provider.publish_ca_pem(ca));
        }
        actions.extend(self.provider.acknowledge_requests());

        self.process_actions(Target::Provider, actions);
    }
}

impl std::fmt::Debug for SimulationRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationRunner")
            .field("provider", &self.provider)
            .field("requirers", &self.requirers.len())
            .field("relations", &self.relations)
            .field("pending", &self.queue.len())
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;
    use vaultkv_test_helpers::ip;

    fn make_test_runner() -> SimulationRunner {
        let vault = StaticEnvironment::new("vault/0")
            .with_interface("10.0.0.1/24".parse().unwrap())
            .with_binding("secrets", ip("10.0.0.1"))
            .with_leader(true);
        SimulationRunner::new(SimulationConfig::default(), vault)
    }

    #[traced_test]
    #[test]
    fn test_writes_grouped_into_one_commit() {
        let mut runner = make_test_runner();
        let unit = runner.add_requirer(
            StaticEnvironment::new("mysql/0").with_binding("secrets", ip("10.0.0.5")),
        );
        runner.relate("mysql");
        runner.run_until_idle();
        assert_eq!(runner.stats().commits_delivered, 0);

        // Five request keys, one commit to the provider
        runner.submit_request(&unit, "charm-mysql", true);
        assert_eq!(runner.pending(), 1);
        assert_eq!(runner.stats().commits_delivered, 1);

        // Credentials, URL: one commit back
        runner.run_until_idle();
        assert_eq!(runner.stats().commits_delivered, 2);
        assert_eq!(runner.stats().events_processed, 4);
    }

    #[traced_test]
    #[test]
    fn test_relate_is_idempotent() {
        let mut runner = make_test_runner();
        runner.add_requirer(StaticEnvironment::new("mysql/0"));
        let first = runner.relate("mysql");
        let pending = runner.pending();
        assert_eq!(runner.relate("mysql"), first);
        assert_eq!(runner.pending(), pending);
        assert_ne!(runner.relate("web"), first);
    }

    #[traced_test]
    #[test]
    fn test_late_unit_receives_published_snapshot() {
        let mut runner = make_test_runner();
        let first = runner.add_requirer(
            StaticEnvironment::new("mysql/0").with_binding("secrets", ip("10.0.0.5")),
        );
        runner.relate("mysql");
        runner.submit_request(&first, "charm-mysql", true);
        runner.run_until_idle();

        let late = runner.add_requirer(
            StaticEnvironment::new("mysql/1").with_binding("secrets", ip("10.0.0.6")),
        );
        runner.run_until_idle();
        assert_eq!(
            runner.requirer(&late).and_then(|r| r.vault_url()),
            Some("https://10.0.0.1:8200")
        );
    }
}
