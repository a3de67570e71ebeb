//! Local environment queries.
//!
//! Everything a state machine needs to know about the unit it runs on is
//! reached through [`HostEnvironment`], so tests can substitute a
//! [`StaticEnvironment`] for a real orchestrator.

use ipnet::IpNet;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use vaultkv_types::{BindingName, UnitName};

/// Errors from binding-aware address lookup.
///
/// Callers fall back to the private address on either variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// The host has no binding-aware address lookup (older hosts).
    #[error("binding-aware address lookup is not supported")]
    Unsupported,

    /// The lookup exists but yielded nothing for this binding.
    #[error("no address for binding {0}")]
    Unavailable(String),
}

/// Local environment capability injected into both state machines.
pub trait HostEnvironment: Send + Sync {
    /// Name of the local unit.
    fn local_unit(&self) -> UnitName;

    /// Local host name.
    fn hostname(&self) -> String;

    /// Primary address of the network space `binding` is bound to.
    fn primary_address(&self, binding: &BindingName) -> Result<IpAddr, AddressError>;

    /// Private address of the unit, always available.
    fn private_address(&self) -> IpAddr;

    /// Network (CIDR) of the local interface carrying `address`.
    fn resolve_network_cidr(&self, address: IpAddr) -> Option<IpNet>;

    /// Whether the local unit is the elected leader right now.
    fn is_leader(&self) -> bool;

    // Derived methods

    /// Network of the interface `binding` resolves to.
    fn binding_network(&self, binding: &BindingName) -> Option<IpNet> {
        self.primary_address(binding)
            .ok()
            .and_then(|address| self.resolve_network_cidr(address))
    }
}

/// Configured environment for standalone use and tests.
///
/// Interfaces are given as address/prefix pairs (`10.0.0.1/24`). A binding
/// maps to the address of one of them.
#[derive(Debug)]
pub struct StaticEnvironment {
    unit: UnitName,
    hostname: String,
    private_address: IpAddr,
    interfaces: Vec<IpNet>,
    bindings: HashMap<BindingName, IpAddr>,
    binding_lookup: bool,
    leader: AtomicBool,
}

impl StaticEnvironment {
    /// Create an environment for `unit` with no bindings.
    ///
    /// The host name defaults to the unit name with `/` replaced by `-`.
    pub fn new(unit: impl Into<UnitName>) -> Self {
        let unit = unit.into();
        Self {
            hostname: unit.as_str().replace('/', "-"),
            unit,
            private_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            interfaces: Vec::new(),
            bindings: HashMap::new(),
            binding_lookup: true,
            leader: AtomicBool::new(false),
        }
    }

    /// Set the host name.
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    /// Set the private address.
    pub fn with_private_address(mut self, address: IpAddr) -> Self {
        self.private_address = address;
        self
    }

    /// Add a local interface (`address/prefix`).
    pub fn with_interface(mut self, interface: IpNet) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// Bind `binding` to `address`.
    pub fn with_binding(mut self, binding: impl Into<BindingName>, address: IpAddr) -> Self {
        self.bindings.insert(binding.into(), address);
        self
    }

    /// Simulate a host without binding-aware lookup.
    pub fn without_binding_lookup(mut self) -> Self {
        self.binding_lookup = false;
        self
    }

    /// Set initial leadership.
    pub fn with_leader(self, leader: bool) -> Self {
        self.set_leader(leader);
        self
    }

    /// Change leadership.
    pub fn set_leader(&self, leader: bool) {
        self.leader.store(leader, Ordering::SeqCst);
    }
}

impl HostEnvironment for StaticEnvironment {
    fn local_unit(&self) -> UnitName {
        self.unit.clone()
    }

    fn hostname(&self) -> String {
        self.hostname.clone()
    }

    fn primary_address(&self, binding: &BindingName) -> Result<IpAddr, AddressError> {
        if !self.binding_lookup {
            return Err(AddressError::Unsupported);
        }
        self.bindings
            .get(binding)
            .copied()
            .ok_or_else(|| AddressError::Unavailable(binding.to_string()))
    }

    fn private_address(&self) -> IpAddr {
        self.private_address
    }

    fn resolve_network_cidr(&self, address: IpAddr) -> Option<IpNet> {
        self.interfaces
            .iter()
            .find(|interface| interface.addr() == address)
            .map(IpNet::trunc)
    }

    fn is_leader(&self) -> bool {
        self.leader.load(Ordering::SeqCst)
    }
}
