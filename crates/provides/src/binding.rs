//! Network binding filter for URL publication.

use ipnet::IpNet;
use std::net::IpAddr;
use vaultkv_relation::Relation;
use vaultkv_types::{keys, DataBag};

/// Address a remote unit can be reached at: `ingress-address` if present,
/// else `access_address`.
pub fn reachable_address(data: &DataBag) -> Option<&str> {
    data.get_non_empty(keys::INGRESS_ADDRESS)
        .or_else(|| data.get_non_empty(keys::ACCESS_ADDRESS))
}

/// Whether a relation should receive data published for `network`.
///
/// Only the relation's first unit is checked. A relation with no units
/// yet is not filtered. A unit with no address, or one that is not an IP
/// literal, is outside every network.
pub fn relation_in_network(relation: &Relation, network: &IpNet) -> bool {
    let Some((_, data)) = relation.first_unit() else {
        return true;
    };
    reachable_address(data)
        .and_then(|address| address.parse::<IpAddr>().ok())
        .is_some_and(|address| network.contains(&address))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingress_preferred_over_access() {
        let data: DataBag = [
            (keys::ACCESS_ADDRESS, "10.0.0.5"),
            (keys::INGRESS_ADDRESS, "192.168.0.5"),
        ]
        .into_iter()
        .collect();
        assert_eq!(reachable_address(&data), Some("192.168.0.5"));

        let data: DataBag = [(keys::ACCESS_ADDRESS, "10.0.0.5"), (keys::INGRESS_ADDRESS, "")]
            .into_iter()
            .collect();
        assert_eq!(reachable_address(&data), Some("10.0.0.5"));

        assert_eq!(reachable_address(&DataBag::new()), None);
    }
}
