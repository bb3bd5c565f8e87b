//! Case lifecycle.

use serde::Serialize;
use std::fmt;

use crate::errors::{Result, VerifyError};

/// Where a case is in its run.
///
/// Transitions are strictly sequential: `Built → Translated → Fetched →
/// Validated → (Resolved) → Concluded`. A fatal error jumps straight to
/// `Concluded`; nothing moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseState {
    /// Constructed and validated.
    #[default]
    Built,
    /// Query string rendered.
    Translated,
    /// Search pages fetched.
    Fetched,
    /// Primary predicates checked.
    Validated,
    /// Secondary links followed.
    Resolved,
    /// Verdict final.
    Concluded,
}

impl CaseState {
    /// Whether `next` may follow `self`.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Built, Self::Translated)
                | (Self::Translated, Self::Fetched)
                | (Self::Fetched, Self::Validated)
                | (Self::Validated, Self::Resolved | Self::Concluded)
                | (Self::Resolved, Self::Concluded)
        )
    }

    /// Moves to `next` or fails with an internal error.
    pub fn advance(&mut self, next: Self) -> Result<()> {
        if !self.can_advance_to(next) {
            return Err(VerifyError::Internal(format!(
                "invalid case transition {self} -> {next}"
            )));
        }
        *self = next;
        Ok(())
    }

    /// Ends the run from any state.
    pub fn abort(&mut self) {
        *self = Self::Concluded;
    }
}

impl fmt::Display for CaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Built => write!(f, "built"),
            Self::Translated => write!(f, "translated"),
            Self::Fetched => write!(f, "fetched"),
            Self::Validated => write!(f, "validated"),
            Self::Resolved => write!(f, "resolved"),
            Self::Concluded => write!(f, "concluded"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_transitions() {
        let mut state = CaseState::default();
        for next in [
            CaseState::Translated,
            CaseState::Fetched,
            CaseState::Validated,
            CaseState::Resolved,
            CaseState::Concluded,
        ] {
            state.advance(next).unwrap();
        }
        assert_eq!(state, CaseState::Concluded);
    }

    #[test]
    fn test_resolution_is_optional() {
        assert!(CaseState::Validated.can_advance_to(CaseState::Concluded));
    }

    #[test]
    fn test_no_skipping_or_going_back() {
        let mut state = CaseState::Translated;
        let err = state.advance(CaseState::Validated).unwrap_err();
        assert_eq!(err.kind(), "internal");
        assert_eq!(state, CaseState::Translated);

        assert!(!CaseState::Fetched.can_advance_to(CaseState::Translated));
        assert!(!CaseState::Concluded.can_advance_to(CaseState::Built));
    }

    #[test]
    fn test_abort_from_anywhere() {
        let mut state = CaseState::Fetched;
        state.abort();
        assert_eq!(state, CaseState::Concluded);
    }
}
