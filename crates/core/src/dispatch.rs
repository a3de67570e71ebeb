//! Event dispatch by kind.

use crate::{Action, Event, EventKind};
use tracing::debug;

/// A handler for one kind of event.
pub type Handler<S> = fn(&mut S, Event) -> Vec<Action>;

/// The single handler-lookup table of a state machine.
///
/// Each [`EventKind`] maps to at most one handler. Events with no entry
/// are ignored.
pub struct DispatchTable<S: 'static> {
    name: &'static str,
    entries: &'static [(EventKind, Handler<S>)],
}

impl<S: 'static> DispatchTable<S> {
    /// Create a table from a static list of entries.
    pub const fn new(name: &'static str, entries: &'static [(EventKind, Handler<S>)]) -> Self {
        Self { name, entries }
    }

    /// Look up the handler for an event kind.
    pub fn handler(&self, kind: EventKind) -> Option<Handler<S>> {
        self.entries
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, handler)| *handler)
    }

    /// Route an event to its handler.
    pub fn dispatch(&self, state: &mut S, event: Event) -> Vec<Action> {
        match self.handler(event.kind()) {
            Some(handler) => handler(state, event),
            None => {
                debug!(
                    machine = self.name,
                    event = event.type_name(),
                    "No handler registered, ignoring event"
                );
                vec![]
            }
        }
    }

    /// Check if an event kind has a handler.
    pub fn handles(&self, kind: EventKind) -> bool {
        self.handler(kind).is_some()
    }
}
