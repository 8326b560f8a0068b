//! Lease state machine (spec §4.4): the transition table and its guards.
//!
//! This module only knows about legal *shapes* of transition
//! (`Pending -> Active`, etc.); the business conditions that justify
//! firing a transition (all installments paid, third consecutive
//! failure) live in `coordinator.rs`.

use crate::{
    error::{Error, Result},
    types::LeaseStatus,
};

/// A requested lease transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Activate,
    Complete,
    Default,
}

/// Apply `transition` to `current`, returning the new status or
/// `InvalidTransitionError` if the transition is not legal from the
/// current state.
pub fn apply(current: LeaseStatus, transition: Transition) -> Result<LeaseStatus> {
    use LeaseStatus::*;
    use Transition::*;

    match (current, transition) {
        (Pending, Activate) => Ok(Active),
        (Active, Complete) => Ok(Completed),
        (Active, Default) => Ok(Defaulted),
        (Pending, Default) => Ok(Defaulted),
        (current, transition) => Err(Error::InvalidTransition(format!(
            "cannot apply {:?} to a lease in {:?}",
            transition, current
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_activates() {
        assert_eq!(
            apply(LeaseStatus::Pending, Transition::Activate).unwrap(),
            LeaseStatus::Active
        );
    }

    #[test]
    fn active_completes_or_defaults() {
        assert_eq!(
            apply(LeaseStatus::Active, Transition::Complete).unwrap(),
            LeaseStatus::Completed
        );
        assert_eq!(
            apply(LeaseStatus::Active, Transition::Default).unwrap(),
            LeaseStatus::Defaulted
        );
    }

    #[test]
    fn terminal_states_reject_every_transition() {
        for transition in [Transition::Activate, Transition::Complete, Transition::Default] {
            assert!(apply(LeaseStatus::Completed, transition).is_err());
            assert!(apply(LeaseStatus::Defaulted, transition).is_err());
        }
    }

    #[test]
    fn pending_cannot_complete_directly() {
        assert!(apply(LeaseStatus::Pending, Transition::Complete).is_err());
    }

    #[test]
    fn pending_can_default() {
        assert_eq!(
            apply(LeaseStatus::Pending, Transition::Default).unwrap(),
            LeaseStatus::Defaulted
        );
    }

    #[test]
    fn active_cannot_reactivate() {
        assert!(apply(LeaseStatus::Active, Transition::Activate).is_err());
    }
}
