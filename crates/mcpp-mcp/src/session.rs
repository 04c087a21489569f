//! Per-connection session state machine.
//!
//! ```text
//! Spawned → Initializing → Ready ⇄ {ListingTools | CallingTool}
//!                            Ready → Closing → Closed
//! ```
//!
//! `Error` is reachable from every state except `Closed`, and an errored
//! session can still be closed.

use serde::Serialize;

use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Spawned,
    Initializing,
    Ready,
    ListingTools,
    CallingTool,
    Closing,
    Closed,
    Error,
}

impl SessionState {
    /// Check whether moving to `next` is legal.
    #[must_use]
    pub const fn can_transition(self, next: Self) -> bool {
        use SessionState::{
            CallingTool, Closed, Closing, Error, Initializing, ListingTools, Ready, Spawned,
        };
        match (self, next) {
            (Closed, _) => false,
            (_, Error | Closing)
            | (Spawned, Initializing)
            | (Initializing, Ready)
            | (Ready, ListingTools | CallingTool)
            | (ListingTools | CallingTool, Ready)
            | (Closing, Closed) => true,
            _ => false,
        }
    }

    /// Move to `next`, rejecting illegal transitions.
    pub fn transition(&mut self, next: Self, operation: &'static str) -> Result<(), ClientError> {
        if self.can_transition(next) {
            *self = next;
            Ok(())
        } else {
            Err(ClientError::InvalidState {
                state: *self,
                operation,
            })
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Spawned => "spawned",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::ListingTools => "listing_tools",
            Self::CallingTool => "calling_tool",
            Self::Closing => "closing",
            Self::Closed => "closed",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse connection status exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Ready,
    Closed,
    Error,
}

impl From<SessionState> for ConnectionStatus {
    fn from(state: SessionState) -> Self {
        match state {
            SessionState::Spawned | SessionState::Initializing => Self::Connecting,
            SessionState::Ready | SessionState::ListingTools | SessionState::CallingTool => {
                Self::Ready
            }
            SessionState::Closing | SessionState::Closed => Self::Closed,
            SessionState::Error => Self::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionState::*;

    #[test]
    fn test_happy_path() {
        let mut state = Spawned;
        for next in [Initializing, Ready, ListingTools, Ready, CallingTool, Ready, Closing, Closed] {
            state.transition(next, "test").unwrap();
        }
        assert!(state.is_terminal());
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!Spawned.can_transition(Ready));
        assert!(!Initializing.can_transition(CallingTool));
        assert!(!ListingTools.can_transition(CallingTool));
        assert!(!Closed.can_transition(Error));
        assert!(!Closed.can_transition(Closing));

        let mut state = Spawned;
        let err = state.transition(CallingTool, "call_tool").unwrap_err();
        assert!(matches!(err, ClientError::InvalidState { state: Spawned, .. }));
        assert_eq!(state, Spawned);
    }

    #[test]
    fn test_error_then_close() {
        let mut state = CallingTool;
        state.transition(Error, "timeout").unwrap();
        state.transition(Closing, "close").unwrap();
        state.transition(Closed, "close").unwrap();
    }

    #[test]
    fn test_connection_status() {
        assert_eq!(ConnectionStatus::from(Initializing), ConnectionStatus::Connecting);
        assert_eq!(ConnectionStatus::from(CallingTool), ConnectionStatus::Ready);
        assert_eq!(ConnectionStatus::from(Error), ConnectionStatus::Error);
    }
}
