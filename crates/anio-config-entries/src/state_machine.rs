//! Config entry state machine
//!
//! Enforces valid state transitions for the ConfigEntry lifecycle:
//!
//! ```text
//! NotLoaded → SetupInProgress → Loaded
//!                            ↘ SetupError → SetupInProgress (reauth retry)
//!                            ↘ SetupRetry → SetupInProgress (auto-retry)
//!
//! Loaded/SetupError/SetupRetry → UnloadInProgress → NotLoaded
//! ```

use crate::entry::ConfigEntryState;
use thiserror::Error;

/// Error when an invalid state transition is attempted
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid state transition from {from:?} to {to:?}")]
pub struct InvalidTransition {
    pub from: ConfigEntryState,
    pub to: ConfigEntryState,
}

impl ConfigEntryState {
    /// Attempt a transition to a new state.
    ///
    /// Returns the new state if valid, or an error describing the attempted
    /// transition.
    pub fn try_transition(
        self,
        to: ConfigEntryState,
    ) -> Result<ConfigEntryState, InvalidTransition> {
        use ConfigEntryState::*;

        let valid = matches!(
            (self, to),
            (NotLoaded, SetupInProgress)
                | (SetupInProgress, Loaded)
                | (SetupInProgress, SetupError)
                | (SetupInProgress, SetupRetry)
                | (SetupError, SetupInProgress)
                | (SetupError, UnloadInProgress)
                | (SetupRetry, SetupInProgress)
                | (SetupRetry, UnloadInProgress)
                | (Loaded, UnloadInProgress)
                | (UnloadInProgress, NotLoaded)
        );

        if valid {
            Ok(to)
        } else {
            Err(InvalidTransition { from: self, to })
        }
    }

    /// Check if a transition is valid without performing it
    pub fn can_transition_to(self, to: ConfigEntryState) -> bool {
        self.try_transition(to).is_ok()
    }
}

/// Calculates retry delay with exponential backoff.
///
/// 2^min(tries, 4) * 5 + random jitter, giving 5s, 10s, 20s, 40s, 80s
/// (then staying at 80s).
pub fn calculate_retry_delay(tries: u32) -> f64 {
    let base_delay = 2_u32.pow(tries.min(4)) * 5;
    // Small jitter (0-100ms) to prevent thundering herd
    let jitter = rand::random::<f64>() * 0.1;
    base_delay as f64 + jitter
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConfigEntryState::*;

    #[test]
    fn test_full_setup_success_path() {
        let state = NotLoaded;
        let state = state.try_transition(SetupInProgress).unwrap();
        let state = state.try_transition(Loaded).unwrap();
        let state = state.try_transition(UnloadInProgress).unwrap();
        let state = state.try_transition(NotLoaded).unwrap();
        assert_eq!(state, NotLoaded);
    }

    #[test]
    fn test_setup_retry_path() {
        let state = NotLoaded;
        let state = state.try_transition(SetupInProgress).unwrap();
        let state = state.try_transition(SetupRetry).unwrap();
        let state = state.try_transition(SetupInProgress).unwrap();
        let state = state.try_transition(Loaded).unwrap();
        assert_eq!(state, Loaded);
    }

    #[test]
    fn test_setup_error_recovery_path() {
        let state = NotLoaded;
        let state = state.try_transition(SetupInProgress).unwrap();
        let state = state.try_transition(SetupError).unwrap();
        let state = state.try_transition(SetupInProgress).unwrap();
        let state = state.try_transition(Loaded).unwrap();
        assert_eq!(state, Loaded);
    }

    #[test]
    fn test_unload_from_setup_error() {
        let state = SetupError;
        let state = state.try_transition(UnloadInProgress).unwrap();
        assert_eq!(state.try_transition(NotLoaded), Ok(NotLoaded));
    }

    #[test]
    fn test_invalid_jumps() {
        assert!(!NotLoaded.can_transition_to(Loaded));
        assert!(!NotLoaded.can_transition_to(SetupError));
        assert!(!Loaded.can_transition_to(NotLoaded));
        assert!(!Loaded.can_transition_to(SetupInProgress));
        assert!(!SetupInProgress.can_transition_to(NotLoaded));
        assert!(!UnloadInProgress.can_transition_to(Loaded));
    }

    #[test]
    fn test_error_reports_both_states() {
        let err = NotLoaded.try_transition(Loaded).unwrap_err();
        assert_eq!(err.from, NotLoaded);
        assert_eq!(err.to, Loaded);
        let message = format!("{err}");
        assert!(message.contains("NotLoaded"));
        assert!(message.contains("Loaded"));
    }

    #[test]
    fn test_retry_delay_exponential_backoff() {
        // Base delays: 5, 10, 20, 40, 80, then capped at 80
        assert!((5.0..5.2).contains(&calculate_retry_delay(0)));
        assert!((10.0..10.2).contains(&calculate_retry_delay(1)));
        assert!((20.0..20.2).contains(&calculate_retry_delay(2)));
        assert!((40.0..40.2).contains(&calculate_retry_delay(3)));
        assert!((80.0..80.2).contains(&calculate_retry_delay(4)));
        assert!((80.0..80.2).contains(&calculate_retry_delay(9)));
    }
}
