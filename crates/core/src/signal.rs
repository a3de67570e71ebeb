//! Derived state indicators.

use crate::Action;
use std::collections::BTreeSet;
use std::fmt;
use vaultkv_types::EndpointName;

/// An indicator the host application can react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Signal {
    /// At least one relation is established.
    Connected,

    /// A request-relevant field changed and has not been processed yet.
    NewRequest,

    /// The requirer holds everything it needs to talk to the backend.
    Available,
}

impl Signal {
    /// Wire-style name of the indicator.
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Connected => "connected",
            Signal::NewRequest => "new-request",
            Signal::Available => "available",
        }
    }

    /// Host flag name for this indicator on `endpoint`.
    pub fn flag(&self, endpoint: &EndpointName) -> String {
        match self {
            Signal::NewRequest => endpoint.expand("endpoint.{endpoint_name}.new-request"),
            Signal::Connected | Signal::Available => {
                format!("{}.{}", endpoint, self.as_str())
            }
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse protocol state shared by both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No relation exists.
    Disconnected,

    /// Related, nothing pending or available.
    Connected,

    /// Related and either a request is pending (provider) or the backend
    /// is available (requirer).
    Ready,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Disconnected => "disconnected",
            Phase::Connected => "connected",
            Phase::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// The set of currently raised indicators.
///
/// Setting an already-set indicator is a no-op, so only real transitions
/// produce actions.
#[derive(Debug, Clone, Default)]
pub struct SignalSet {
    raised: BTreeSet<Signal>,
}

impl SignalSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if an indicator is raised.
    pub fn is_set(&self, signal: Signal) -> bool {
        self.raised.contains(&signal)
    }

    /// Raise an indicator, returning the transition action if it was clear.
    pub fn raise(&mut self, signal: Signal) -> Option<Action> {
        self.raised
            .insert(signal)
            .then_some(Action::SignalRaised(signal))
    }

    /// Clear an indicator, returning the transition action if it was set.
    pub fn clear(&mut self, signal: Signal) -> Option<Action> {
        self.raised
            .remove(&signal)
            .then_some(Action::SignalCleared(signal))
    }

    /// Raise or clear depending on `on`.
    pub fn toggle(&mut self, signal: Signal, on: bool) -> Option<Action> {
        if on {
            self.raise(signal)
        } else {
            self.clear(signal)
        }
    }

    /// Derive the protocol phase.
    pub fn phase(&self) -> Phase {
        if !self.is_set(Signal::Connected) {
            Phase::Disconnected
        } else if self.is_set(Signal::NewRequest) || self.is_set(Signal::Available) {
            Phase::Ready
        } else {
            Phase::Connected
        }
    }

    /// Iterate over raised indicators.
    pub fn iter(&self) -> impl Iterator<Item = Signal> + '_ {
        self.raised.iter().copied()
    }
}
