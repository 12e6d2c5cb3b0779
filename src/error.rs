/// Error types surfaced by the scheduling engine.

use crate::models::{AppointmentStatus, ConflictDetails};
use crate::store::StoreError;
use crate::time::TimeError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SchedulingError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Scheduling conflict: {}", .0.reason)]
    Conflict(Box<ConflictDetails>),

    #[error("Cannot {action} an appointment that is {from}")]
    InvalidTransition {
        from: AppointmentStatus,
        action: &'static str,
    },

    #[error("Appointment is already {0}")]
    AlreadyTerminal(AppointmentStatus),

    #[error("Appointment {0} was modified concurrently, please retry")]
    ConcurrentModification(Uuid),

    #[error("Storage failure: {0}")]
    Storage(String),
}

impl SchedulingError {
    pub fn appointment_not_found(id: Uuid) -> Self {
        SchedulingError::NotFound {
            kind: "Appointment",
            id: id.to_string(),
        }
    }

    pub fn doctor_not_found(id: &str) -> Self {
        SchedulingError::NotFound {
            kind: "Doctor",
            id: id.to_string(),
        }
    }

    /// The conflict payload, if this is a conflict.
    pub fn conflict(&self) -> Option<&ConflictDetails> {
        match self {
            SchedulingError::Conflict(details) => Some(details),
            _ => None,
        }
    }
}

impl From<TimeError> for SchedulingError {
    fn from(err: TimeError) -> Self {
        SchedulingError::Validation(err.to_string())
    }
}

impl From<StoreError> for SchedulingError {
    /// Slot and version clashes are translated by the scheduler before they
    /// get here; anything reaching this conversion is infrastructure.
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => SchedulingError::appointment_not_found(id),
            StoreError::StaleVersion { id, .. } => SchedulingError::ConcurrentModification(id),
            other => SchedulingError::Storage(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SchedulingError>;
