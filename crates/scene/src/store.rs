use runtime::EventBus;

use crate::selection::{Action, SelectionState};

/// Actions kept for consumers reading the log.
pub const ACTION_LOG_CAPACITY: usize = 512;

/// The single mutable home of [`SelectionState`].
///
/// Every applied action is appended to a bounded [`EventBus`], which
/// downstream consumers (info box, tests) read instead of diffing state.
#[derive(Debug)]
pub struct Store {
    state: SelectionState,
    log: EventBus<Action>,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            state: SelectionState::default(),
            log: EventBus::with_capacity(ACTION_LOG_CAPACITY),
        }
    }
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn dispatch(&mut self, action: Action) {
        tracing::trace!("dispatch {action:?}");
        self.state.apply(action.clone());
        self.log.emit(action);
    }

    pub fn dispatch_all(&mut self, actions: impl IntoIterator<Item = Action>) {
        for action in actions {
            self.dispatch(action);
        }
    }

    pub fn log(&self) -> &EventBus<Action> {
        &self.log
    }
}
