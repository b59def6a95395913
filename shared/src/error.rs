use crate::types::{Side, StateLabel};
use thiserror::Error;

/// Failures raised by the match core.
///
/// None of these cross the host/peer boundary: the command router turns
/// every guard failure into an ignored request, and a missing collaborator
/// only disables the component that needed it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A write was attempted by a participant without write authority.
    #[error("participant is not authorized to {operation}")]
    NotAuthorized { operation: &'static str },

    /// The current state has no transition for the requested event.
    #[error("cannot {event} while {from}")]
    InvalidTransition { from: StateLabel, event: &'static str },

    /// A floor contact arrived before both a paddle and a table side were recorded.
    #[error("incomplete contact memory (paddle: {paddle:?}, table: {table:?})")]
    IncompleteContactMemory {
        paddle: Option<Side>,
        table: Option<Side>,
    },

    /// An external collaborator was absent when the component was set up.
    #[error("{component} is missing its {collaborator}; component disabled")]
    MissingCollaborator {
        component: &'static str,
        collaborator: &'static str,
    },
}

impl CoreError {
    /// Guard failures that the router downgrades to a silent no-op.
    pub fn is_guard_failure(&self) -> bool {
        matches!(
            self,
            CoreError::NotAuthorized { .. } | CoreError::InvalidTransition { .. }
        )
    }
}
