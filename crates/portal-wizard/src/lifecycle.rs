//! Wizard lifecycle phases
//!
//! The phase is derived from the persisted state, never stored. Every write
//! through the repository is checked against [`validate_transition`].

use crate::error::WizardError;
use serde::{Deserialize, Serialize};

/// Coarse lifecycle phase of a wizard state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Started, nothing saved yet
    New,
    /// At least one step saved
    InProgress,
    /// Review page reached
    Review,
    /// Confirmation code recorded
    Submitted,
}

impl Phase {
    /// Every phase
    pub const ALL: [Phase; 4] = [Phase::New, Phase::InProgress, Phase::Review, Phase::Submitted];

    /// Whether no further writes are possible
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        allowed_transitions(self).is_empty()
    }
}

/// Validates a phase transition for one persisted write
pub fn validate_transition(from: Phase, to: Phase) -> Result<(), WizardError> {
    if allowed(from, to) {
        Ok(())
    } else {
        Err(WizardError::IllegalTransition { from, to })
    }
}

/// Phases reachable from `from` in a single write, itself included
#[must_use]
pub fn allowed_transitions(from: Phase) -> Vec<Phase> {
    use Phase::{InProgress, New, Review, Submitted};
    match from {
        New => vec![New, InProgress],
        InProgress => vec![InProgress, Review],
        Review => vec![Review, Submitted],
        Submitted => vec![],
    }
}

fn allowed(from: Phase, to: Phase) -> bool {
    allowed_transitions(from).into_iter().any(|p| p == to)
}
