// Recording session state machine

use serde::Serialize;

/// Session state reported to the collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    /// No session, ready to start
    Idle,
    /// Waiting for the user to grant capture
    Acquiring,
    /// Encoder running, segments accumulating
    Recording,
    /// Stop issued, waiting for the encoder's final segment
    Finalizing,
    /// Artifact produced
    Completed,
    /// Session ended without an artifact
    Failed,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Idle
    }
}

impl SessionState {
    /// A session in this state occupies the single active slot
    pub fn is_active(self) -> bool {
        matches!(
            self,
            SessionState::Acquiring | SessionState::Recording | SessionState::Finalizing
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed)
    }

    /// Valid transitions:
    /// - Idle -> Acquiring (start intent)
    /// - Acquiring -> Recording (stream composed, encoder running)
    /// - Acquiring -> Failed (capture or encoder construction failed)
    /// - Acquiring -> Idle (stopped before the stream existed)
    /// - Recording -> Finalizing (stop intent or source ended)
    /// - Recording -> Failed (encoder error)
    /// - Finalizing -> Completed (final segment delivered)
    /// - Finalizing -> Failed (encoder error while draining)
    pub fn can_transition_to(self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (SessionState::Idle, SessionState::Acquiring)
                | (SessionState::Acquiring, SessionState::Recording)
                | (SessionState::Acquiring, SessionState::Failed)
                | (SessionState::Acquiring, SessionState::Idle)
                | (SessionState::Recording, SessionState::Finalizing)
                | (SessionState::Recording, SessionState::Failed)
                | (SessionState::Finalizing, SessionState::Completed)
                | (SessionState::Finalizing, SessionState::Failed)
        )
    }
}

/// Errors that can occur during state transitions
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionStateError {
    /// Invalid state transition attempted
    #[error("Invalid state transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: SessionState,
        to: SessionState,
    },
}

/// Validated holder of a session's current state
#[derive(Debug, Default)]
pub struct SessionStateMachine {
    state: SessionState,
}

impl SessionStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_state(&self) -> SessionState {
        self.state
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow.
    /// The state is unchanged on error.
    #[must_use = "this returns a Result that should be handled"]
    pub fn transition_to(&mut self, next: SessionState) -> Result<(), SessionStateError> {
        if !self.state.can_transition_to(next) {
            return Err(SessionStateError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
