//! Session lifecycle: whether the world currently accepts players.
//!
//! Transitions are only ever triggered by client commands; there are no round timers.

use log::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: SessionState,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: SessionState::Running,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether new authentications may create players.
    pub fn is_accepting(&self) -> bool {
        self.state == SessionState::Running
    }

    /// Returns true if this call changed the state.
    pub fn stop(&mut self) -> bool {
        let changed = self.state != SessionState::Stopped;
        self.state = SessionState::Stopped;
        if changed {
            info!("Session stopped");
        }
        changed
    }

    pub fn reset(&mut self) {
        self.state = SessionState::Running;
        info!("Session reset, accepting players");
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
