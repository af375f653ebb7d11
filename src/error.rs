// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;

/// A structural defect in an NFA graph. Reported by [`crate::Nfa::new`] before any matching starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NfaError {
    NoGroups,
    MissingEntry,
    StateIdMismatch { position: usize, id: usize },
    EntryOutOfRange { state: usize },
    TargetOutOfRange { state: usize, target: usize },
    GroupSlotOutOfRange { state: usize, slot: u32 },
    FinalStateHasTransitions { state: usize },
    TooManyStates,
}

impl std::error::Error for NfaError {}

impl fmt::Display for NfaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            NfaError::NoGroups => write!(f, "an NFA needs at least the implicit group 0"),
            NfaError::MissingEntry => write!(f, "no anchored or unanchored entry state"),
            NfaError::StateIdMismatch { position, id } => {
                write!(f, "state at position {position} claims id {id}")
            }
            NfaError::EntryOutOfRange { state } => {
                write!(f, "entry state {state} does not exist")
            }
            NfaError::TargetOutOfRange { state, target } => {
                write!(f, "state {state} has a transition to nonexistent state {target}")
            }
            NfaError::GroupSlotOutOfRange { state, slot } => {
                write!(f, "state {state} has a transition writing capture slot {slot}, which is out of range")
            }
            NfaError::FinalStateHasTransitions { state } => {
                write!(f, "final state {state} has outgoing transitions")
            }
            NfaError::TooManyStates => write!(f, "too many NFA states"),
        }
    }
}

/// An invalid pattern tree handed to the [`crate::Builder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    InvalidRepetition { min: u32, max: u32 },
    InvertedClassRange { start: u32, end: u32 },
    Nfa(NfaError),
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BuildError::Nfa(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::InvalidRepetition { min, max } => {
                write!(f, "invalid repetition {{{min},{max}}}: min exceeds max")
            }
            BuildError::InvertedClassRange { start, end } => {
                write!(f, "character class range {start:#X}-{end:#X} is out of order")
            }
            BuildError::Nfa(e) => write!(f, "malformed NFA: {e}"),
        }
    }
}

impl From<NfaError> for BuildError {
    fn from(e: NfaError) -> Self {
        BuildError::Nfa(e)
    }
}

/// A resource limit hit while matching. Only reported if a limit was configured in
/// [`crate::ExecConfig`]; without limits matching cannot fail, it can only not match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchError {
    StackLimitExceeded { frames: usize },
    StepLimitExceeded { steps: u64 },
}

impl std::error::Error for MatchError {}

impl fmt::Display for MatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MatchError::StackLimitExceeded { frames } => {
                write!(f, "backtracking stack limit of {frames} frames exceeded")
            }
            MatchError::StepLimitExceeded { steps } => {
                write!(f, "step limit of {steps} exceeded")
            }
        }
    }
}
