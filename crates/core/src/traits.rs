//! Core traits for state machines.

use crate::{Action, Event, SignalSet};

/// A state machine that processes events.
///
/// Both ends of the relation are implemented as state machines that are:
///
/// - **Synchronous**: No async, no `.await`
/// - **Deterministic**: Same state + event = same actions
/// - **Pure-ish**: Mutates self, but performs no I/O beyond the injected
///   environment queries
///
/// # Example
///
/// ```ignore
/// impl StateMachine for ProviderState {
///     fn handle(&mut self, event: Event) -> Vec<Action> {
///         HANDLERS.dispatch(self, event)
///     }
///
///     fn signals(&self) -> &SignalSet {
///         &self.signals
///     }
/// }
/// ```
pub trait StateMachine {
    /// Process an event, returning actions to perform.
    ///
    /// # Guarantees
    ///
    /// - **Synchronous**: This method never blocks or awaits
    /// - **Run to completion**: The host delivers events serially, so no
    ///   two calls overlap for the same endpoint
    /// - **No transport I/O**: Relation writes are returned as
    ///   [`Action::Publish`] for the runner to deliver
    fn handle(&mut self, event: Event) -> Vec<Action>;

    /// Currently raised indicators.
    fn signals(&self) -> &SignalSet;
}
