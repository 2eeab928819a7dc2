//! Task state machine enforcement.
//!
//! ```text
//! Working -> InputRequired | Completed | Failed | Cancelled
//! InputRequired -> Working | Completed | Failed | Cancelled
//! Completed/Failed/Cancelled -> ERROR (terminal, no further transitions)
//! ```

use crate::error::TaskStorageError;
use relay_mcp_protocol::TaskStatus;

/// Validate a task status transition.
pub fn validate_transition(from: TaskStatus, to: TaskStatus) -> Result<(), TaskStorageError> {
    if is_terminal(from) {
        return Err(TaskStorageError::TerminalState(from));
    }
    if from == to {
        return Err(TaskStorageError::InvalidTransition {
            current: from,
            requested: to,
        });
    }
    Ok(())
}

/// Returns `true` if the status is a terminal state (no further transitions allowed).
pub fn is_terminal(status: TaskStatus) -> bool {
    matches!(
        status,
        TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_working_transitions() {
        for target in [
            TaskStatus::InputRequired,
            TaskStatus::Completed,
            TaskStatus::Failed,
            TaskStatus::Cancelled,
        ] {
            assert!(validate_transition(TaskStatus::Working, target).is_ok());
        }
    }

    #[test]
    fn test_input_required_round_trip() {
        let waiting = TaskStatus::InputRequired;
        assert!(validate_transition(TaskStatus::Working, waiting).is_ok());
        assert!(validate_transition(waiting, TaskStatus::Working).is_ok());
        assert!(validate_transition(waiting, TaskStatus::Cancelled).is_ok());
    }

    #[test]
    fn test_self_transitions_rejected() {
        for status in [TaskStatus::Working, TaskStatus::InputRequired] {
            match validate_transition(status, status) {
                Err(TaskStorageError::InvalidTransition { current, requested }) => {
                    assert_eq!(current, status);
                    assert_eq!(requested, status);
                }
                other => panic!("Expected InvalidTransition, got: {:?}", other),
            }
        }
    }

    #[test]
    fn test_terminal_states_reject_all_transitions() {
        for terminal in [
            TaskStatus::Completed,
            TaskStatus::Failed,
            TaskStatus::Cancelled,
        ] {
            for target in [
                TaskStatus::Working,
                TaskStatus::InputRequired,
                TaskStatus::Completed,
                TaskStatus::Failed,
                TaskStatus::Cancelled,
            ] {
                match validate_transition(terminal, target) {
                    Err(TaskStorageError::TerminalState(s)) => assert_eq!(s, terminal),
                    other => panic!(
                        "Expected TerminalState for {} -> {}, got: {:?}",
                        terminal, target, other
                    ),
                }
            }
        }
    }

    #[test]
    fn test_is_terminal() {
        assert!(!is_terminal(TaskStatus::Working));
        assert!(!is_terminal(TaskStatus::InputRequired));
        assert!(is_terminal(TaskStatus::Completed));
        assert!(is_terminal(TaskStatus::Failed));
        assert!(is_terminal(TaskStatus::Cancelled));
    }
}
