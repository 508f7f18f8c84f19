use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentStatus};

/// The appointment status state machine.
#[derive(Debug, Default, Clone, Copy)]
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that a status transition is allowed
    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if !self.get_valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidStatusTransition {
                from: current_status,
                to: new_status,
            });
        }

        Ok(())
    }

    /// Get all valid next statuses for a given current status
    pub fn get_valid_transitions(&self, current_status: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Scheduled => vec![
                AppointmentStatus::Confirmed,
                AppointmentStatus::Cancelled,
                AppointmentStatus::NoShow,
            ],
            AppointmentStatus::Confirmed => vec![
                AppointmentStatus::InProgress,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::InProgress => vec![AppointmentStatus::Completed],
            // Terminal states - no transitions allowed
            AppointmentStatus::Completed | AppointmentStatus::Cancelled => vec![],
            AppointmentStatus::NoShow => vec![],
        }
    }

    /// Rescheduling keeps the appointment alive, so only appointments that
    /// have not started may move.
    pub fn can_reschedule(&self, current_status: AppointmentStatus) -> Result<(), AppointmentError> {
        match current_status {
            AppointmentStatus::Scheduled | AppointmentStatus::Confirmed => Ok(()),
            other => {
                warn!("Reschedule rejected for appointment in status {}", other);
                Err(AppointmentError::InvalidStatusTransition {
                    from: other,
                    to: AppointmentStatus::Scheduled,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const ALL: [AppointmentStatus; 6] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::Confirmed,
        AppointmentStatus::InProgress,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::NoShow,
    ];

    #[test]
    fn happy_path_is_allowed() {
        let lifecycle = AppointmentLifecycleService::new();

        assert!(lifecycle.validate_status_transition(AppointmentStatus::Scheduled, AppointmentStatus::Confirmed).is_ok());
        assert!(lifecycle.validate_status_transition(AppointmentStatus::Confirmed, AppointmentStatus::InProgress).is_ok());
        assert!(lifecycle.validate_status_transition(AppointmentStatus::InProgress, AppointmentStatus::Completed).is_ok());
    }

    #[test]
    fn terminal_states_have_no_outgoing_transitions() {
        let lifecycle = AppointmentLifecycleService::new();

        for terminal in [AppointmentStatus::Completed, AppointmentStatus::Cancelled, AppointmentStatus::NoShow] {
            assert!(lifecycle.get_valid_transitions(terminal).is_empty());
            for target in ALL {
                assert_matches!(
                    lifecycle.validate_status_transition(terminal, target),
                    Err(AppointmentError::InvalidStatusTransition { .. })
                );
            }
        }

        assert!(AppointmentStatus::Completed.is_terminal());
        assert!(AppointmentStatus::Cancelled.is_terminal());
    }

    #[test]
    fn cancellation_only_before_start() {
        let lifecycle = AppointmentLifecycleService::new();

        assert!(lifecycle.validate_status_transition(AppointmentStatus::Scheduled, AppointmentStatus::Cancelled).is_ok());
        assert!(lifecycle.validate_status_transition(AppointmentStatus::Confirmed, AppointmentStatus::Cancelled).is_ok());
        assert!(lifecycle.validate_status_transition(AppointmentStatus::InProgress, AppointmentStatus::Cancelled).is_err());
    }

    #[test]
    fn no_show_only_from_scheduled() {
        let lifecycle = AppointmentLifecycleService::new();

        assert!(lifecycle.validate_status_transition(AppointmentStatus::Scheduled, AppointmentStatus::NoShow).is_ok());
        assert!(lifecycle.validate_status_transition(AppointmentStatus::Confirmed, AppointmentStatus::NoShow).is_err());
    }

    #[test]
    fn reschedule_window() {
        let lifecycle = AppointmentLifecycleService::new();

        assert!(lifecycle.can_reschedule(AppointmentStatus::Scheduled).is_ok());
        assert!(lifecycle.can_reschedule(AppointmentStatus::Confirmed).is_ok());
        assert!(lifecycle.can_reschedule(AppointmentStatus::InProgress).is_err());
        assert!(lifecycle.can_reschedule(AppointmentStatus::Cancelled).is_err());
    }
}
