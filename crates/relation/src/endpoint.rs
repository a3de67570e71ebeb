//! Per-endpoint relation data.

use indexmap::IndexMap;
use std::collections::BTreeSet;
use tracing::debug;
use vaultkv_types::{DataBag, DataDelta, EndpointName, RelationId, UnitName};

/// One relation as seen from the local side.
#[derive(Debug, Clone)]
pub struct Relation {
    id: RelationId,
    /// Data the local side publishes on this relation.
    published: DataBag,
    /// Data received from each remote unit, in join order.
    units: IndexMap<UnitName, DataBag>,
}

impl Relation {
    fn new(id: RelationId) -> Self {
        Self {
            id,
            published: DataBag::new(),
            units: IndexMap::new(),
        }
    }

    /// Relation identifier.
    pub fn id(&self) -> RelationId {
        self.id
    }

    /// Data the local side has published.
    pub fn published(&self) -> &DataBag {
        &self.published
    }

    /// Data received from `unit`.
    pub fn received(&self, unit: &UnitName) -> Option<&DataBag> {
        self.units.get(unit)
    }

    /// Remote units with their received data, in join order.
    pub fn units(&self) -> impl Iterator<Item = (&UnitName, &DataBag)> {
        self.units.iter()
    }

    /// The earliest-joined remote unit still present.
    pub fn first_unit(&self) -> Option<(&UnitName, &DataBag)> {
        self.units.first()
    }

    /// Number of remote units.
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }
}

/// The local view of every relation on one endpoint.
///
/// Tracks change markers the way the host does: whenever a received key
/// takes a new value, its name is marked changed on the endpoint until a
/// handler acknowledges it. Re-sending an identical value marks nothing.
#[derive(Debug, Clone)]
pub struct Endpoint {
    name: EndpointName,
    relations: IndexMap<RelationId, Relation>,
    /// Received keys changed since last acknowledged.
    changed: BTreeSet<String>,
}

impl Endpoint {
    /// Create an endpoint with no relations.
    pub fn new(name: EndpointName) -> Self {
        Self {
            name,
            relations: IndexMap::new(),
            changed: BTreeSet::new(),
        }
    }

    /// Endpoint name.
    pub fn name(&self) -> &EndpointName {
        &self.name
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Membership
    // ═══════════════════════════════════════════════════════════════════════

    /// Record that `unit` joined `relation_id`.
    ///
    /// Returns true if the relation itself is new.
    pub fn join(&mut self, relation_id: RelationId, unit: UnitName) -> bool {
        let is_new = !self.relations.contains_key(&relation_id);
        let relation = self
            .relations
            .entry(relation_id)
            .or_insert_with(|| Relation::new(relation_id));
        relation.units.entry(unit).or_default();
        is_new
    }

    /// Remove `unit` from a relation, returning its last received data.
    ///
    /// The relation stays until it is broken, even with no units left.
    pub fn depart(&mut self, relation_id: RelationId, unit: &UnitName) -> Option<DataBag> {
        self.relations
            .get_mut(&relation_id)
            .and_then(|relation| relation.units.shift_remove(unit))
    }

    /// Drop a relation entirely.
    pub fn break_relation(&mut self, relation_id: RelationId) -> Option<Relation> {
        let removed = self.relations.shift_remove(&relation_id);
        if self.relations.is_empty() {
            // Nothing left for markers to refer to
            self.changed.clear();
        }
        removed
    }

    /// Check if at least one relation exists.
    pub fn is_joined(&self) -> bool {
        !self.relations.is_empty()
    }

    /// Look up a relation.
    pub fn relation(&self, relation_id: RelationId) -> Option<&Relation> {
        self.relations.get(&relation_id)
    }

    /// All relations, in creation order.
    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.relations.values()
    }

    /// Relation ids, in creation order.
    pub fn relation_ids(&self) -> Vec<RelationId> {
        self.relations.keys().copied().collect()
    }

    /// Number of relations.
    pub fn len(&self) -> usize {
        self.relations.len()
    }

    /// Check if there are no relations.
    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Received data
    // ═══════════════════════════════════════════════════════════════════════

    /// Apply a commit from a remote unit.
    ///
    /// Joins the unit if it is not known yet. Returns the keys whose value
    /// actually changed; those keys are also marked changed on the
    /// endpoint.
    pub fn apply_remote(
        &mut self,
        relation_id: RelationId,
        unit: &UnitName,
        delta: &DataDelta,
    ) -> BTreeSet<String> {
        if self.relation(relation_id).and_then(|r| r.received(unit)).is_none() {
            debug!(
                endpoint = %self.name,
                relation = %relation_id,
                unit = %unit,
                "Data from unit before join, joining implicitly"
            );
            self.join(relation_id, unit.clone());
        }

        let changed = self
            .relations
            .get_mut(&relation_id)
            .and_then(|relation| relation.units.get_mut(unit))
            .map(|data| data.apply(delta))
            .unwrap_or_default();

        self.changed.extend(changed.iter().cloned());
        changed
    }

    /// Every joined remote unit across all relations.
    pub fn all_joined_units(&self) -> impl Iterator<Item = (RelationId, &UnitName, &DataBag)> {
        self.relations.values().flat_map(|relation| {
            relation
                .units
                .iter()
                .map(move |(unit, data)| (relation.id, unit, data))
        })
    }

    /// First value any joined unit holds for `key`.
    pub fn first_received(&self, key: &str) -> Option<&str> {
        self.all_joined_units()
            .find_map(|(_, _, data)| data.get(key))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Change markers
    // ═══════════════════════════════════════════════════════════════════════

    /// Check if `key` changed since last acknowledged.
    pub fn is_changed(&self, key: &str) -> bool {
        self.changed.contains(key)
    }

    /// The subset of `keys` currently marked changed.
    pub fn changed_among<'a>(&self, keys: &[&'a str]) -> Vec<&'a str> {
        keys.iter()
            .copied()
            .filter(|key| self.changed.contains(*key))
            .collect()
    }

    /// Clear the markers for `keys`.
    pub fn acknowledge(&mut self, keys: &[&str]) {
        for key in keys {
            self.changed.remove(*key);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Published data
    // ═══════════════════════════════════════════════════════════════════════

    /// Record a write to the local data of a relation.
    ///
    /// Returns `None` if the relation does not exist, otherwise whether the
    /// stored value changed.
    pub fn publish(
        &mut self,
        relation_id: RelationId,
        key: &str,
        value: Option<String>,
    ) -> Option<bool> {
        self.relations
            .get_mut(&relation_id)
            .map(|relation| relation.published.set(key, value))
    }

    /// Local data published on a relation.
    pub fn published(&self, relation_id: RelationId) -> Option<&DataBag> {
        self.relation(relation_id).map(Relation::published)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultkv_test_helpers::{delta, request_delta};

    fn endpoint() -> Endpoint {
        Endpoint::new(EndpointName::new("secrets"))
    }

    #[test]
    fn test_join_depart_break() {
        let mut ep = endpoint();
        let rel = RelationId(1);

        assert!(ep.join(rel, "mysql/0".into()));
        assert!(!ep.join(rel, "mysql/1".into()));
        assert!(ep.is_joined());
        assert_eq!(ep.relation(rel).unwrap().unit_count(), 2);

        assert!(ep.depart(rel, &"mysql/0".into()).is_some());
        assert!(ep.depart(rel, &"mysql/0".into()).is_none());
        assert_eq!(
            ep.relation(rel).unwrap().first_unit().map(|(u, _)| u.as_str()),
            Some("mysql/1")
        );

        assert!(ep.break_relation(rel).is_some());
        assert!(!ep.is_joined());
    }

    #[test]
    fn test_apply_remote_marks_only_real_changes() {
        let mut ep = endpoint();
        let rel = RelationId(1);
        let unit = UnitName::new("mysql/0");
        ep.join(rel, unit.clone());

        let changed = ep.apply_remote(
            rel,
            &unit,
            &request_delta("charm-mysql", "10.0.0.5", "mysql-0", true),
        );
        assert!(changed.contains("secret_backend"));
        assert!(ep.is_changed("isolated"));

        ep.acknowledge(&["access_address", "secret_backend", "hostname", "isolated"]);
        assert!(ep
            .changed_among(&["access_address", "secret_backend", "hostname", "isolated"])
            .is_empty());

        // Re-announcing identical values marks nothing
        let changed = ep.apply_remote(
            rel,
            &unit,
            &request_delta("charm-mysql", "10.0.0.5", "mysql-0", true),
        );
        assert!(changed.is_empty());
        assert!(!ep.is_changed("hostname"));

        let changed = ep.apply_remote(rel, &unit, &delta(&[("hostname", Some("mysql-0b"))]));
        assert_eq!(changed.len(), 1);
        assert_eq!(ep.changed_among(&["hostname", "isolated"]), vec!["hostname"]);
    }

    #[test]
    fn test_apply_remote_joins_unknown_unit() {
        let mut ep = endpoint();
        let rel = RelationId(4);
        ep.apply_remote(rel, &"vault/0".into(), &delta(&[("vault_url", Some("https://v"))]));
        assert!(ep.is_joined());
        assert_eq!(ep.first_received("vault_url"), Some("https://v"));
    }

    #[test]
    fn test_first_received_across_relations() {
        let mut ep = endpoint();
        ep.apply_remote(RelationId(1), &"vault/0".into(), &delta(&[("a", Some("1"))]));
        ep.apply_remote(
            RelationId(2),
            &"vault/1".into(),
            &delta(&[("a", Some("2")), ("b", Some("3"))]),
        );

        assert_eq!(ep.first_received("a"), Some("1"));
        assert_eq!(ep.first_received("b"), Some("3"));
        assert_eq!(ep.first_received("c"), None);
        assert_eq!(ep.all_joined_units().count(), 2);
    }

    #[test]
    fn test_publish_requires_relation() {
        let mut ep = endpoint();
        assert_eq!(ep.publish(RelationId(1), "vault_url", Some("u".into())), None);

        ep.join(RelationId(1), "mysql/0".into());
        assert_eq!(ep.publish(RelationId(1), "vault_url", Some("u".into())), Some(true));
        assert_eq!(ep.publish(RelationId(1), "vault_url", Some("u".into())), Some(false));
        assert_eq!(
            ep.published(RelationId(1)).and_then(|d| d.get("vault_url")),
            Some("u")
        );
    }

    #[test]
    fn test_break_last_relation_clears_markers() {
        let mut ep = endpoint();
        ep.apply_remote(RelationId(1), &"mysql/0".into(), &delta(&[("hostname", Some("h"))]));
        assert!(ep.is_changed("hostname"));
        ep.break_relation(RelationId(1));
        assert!(!ep.is_changed("hostname"));
    }
}
