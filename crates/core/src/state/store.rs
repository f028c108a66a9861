use std::collections::VecDeque;

use crate::state::action::Action;
use crate::state::app_state::AppState;
use crate::state::reducer::reduce;

/// Number of dispatched actions kept for tracing.
pub const DEFAULT_HISTORY_LIMIT: usize = 256;

/// Read the current state and submit actions.
///
/// Controllers take `&mut dyn Dispatch` rather than a concrete store so tests
/// can observe dispatched actions directly.
pub trait Dispatch {
    fn state(&self) -> &AppState;
    fn dispatch(&mut self, action: Action);
}

/// Owns the application state and applies actions in dispatch order.
pub struct Store {
    state: AppState,
    history: VecDeque<Action>,
    history_limit: usize,
}

impl Store {
    pub fn new() -> Self {
        Self::with_state(AppState::default())
    }

    pub fn with_state(state: AppState) -> Self {
        Self {
            state,
            history: VecDeque::new(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        while self.history.len() > limit {
            self.history.pop_front();
        }
        self
    }

    /// Most recent actions, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &Action> {
        self.history.iter()
    }

    pub fn into_state(self) -> AppState {
        self.state
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatch for Store {
    fn state(&self) -> &AppState {
        &self.state
    }

    fn dispatch(&mut self, action: Action) {
        log::debug!("dispatch {}", action.name());
        if self.history_limit > 0 {
            if self.history.len() == self.history_limit {
                self.history.pop_front();
            }
            self.history.push_back(action.clone());
        }
        let state = std::mem::take(&mut self.state);
        self.state = reduce(state, action);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_applies_in_order() {
        let mut store = Store::new();
        store.dispatch(Action::WebcamStart);
        store.dispatch(Action::WebcamStartSuccess);
        assert!(store.state().webcam.is_active);
        assert!(!store.state().webcam.is_loading);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut store = Store::new().with_history_limit(2);
        store.dispatch(Action::WebcamStart);
        store.dispatch(Action::ModelsLoadStart);
        store.dispatch(Action::DetectionStart);
        let names: Vec<_> = store.history().map(Action::name).collect();
        assert_eq!(names, vec!["MODELS_LOAD_START", "DETECTION_START"]);
    }

    #[test]
    fn test_zero_history_limit_records_nothing() {
        let mut store = Store::new().with_history_limit(0);
        store.dispatch(Action::WebcamStart);
        assert_eq!(store.history().count(), 0);
        assert!(store.state().webcam.is_loading);
    }
}
