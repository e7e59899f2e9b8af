use crate::types::ConnectionState;
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Clone)]
pub struct StateManager {
    state: Arc<RwLock<ConnectionState>>,
}

impl StateManager {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
        }
    }

    pub fn get(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn set(&self, new_state: ConnectionState) {
        let mut state = self.state.write();
        let old_state = *state;
        if old_state != new_state {
            tracing::info!("Connection state changed: {:?} -> {:?}", old_state, new_state);
            *state = new_state;
        }
    }

    pub fn is_online(&self) -> bool {
        self.get() == ConnectionState::Online
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}
