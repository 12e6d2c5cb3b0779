/// Persistence layer for appointments.
///
/// The store owns the interval-exclusion constraint: no two slot-blocking
/// appointments of the same doctor may overlap on the same date. The check
/// and the write happen under one lock, so concurrent bookings cannot both
/// commit. Every write is all-or-nothing per appointment.

use crate::models::{Appointment, AppointmentFilter};
use crate::time::ClockTime;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Doctor {doctor_id} already has an appointment overlapping {start_time}-{end_time} on {date}")]
    SlotTaken {
        doctor_id: String,
        date: NaiveDate,
        start_time: ClockTime,
        end_time: ClockTime,
    },

    #[error("Appointment {id} is at version {actual}, write expected {expected}")]
    StaleVersion { id: Uuid, expected: u64, actual: u64 },

    #[error("Appointment not found: {0}")]
    NotFound(Uuid),

    #[error("Appointment {0} already exists")]
    DuplicateId(Uuid),

    #[error("Appointment store unavailable: {0}")]
    Unavailable(String),
}

/// Storage backend for appointments.
///
/// `insert` and `update` must reject a write that would leave two
/// slot-blocking appointments of one doctor overlapping, with
/// `StoreError::SlotTaken`. `update` is a compare-and-swap on `version`.
pub trait AppointmentStore: Send + Sync {
    fn insert(&self, appointment: Appointment) -> Result<Appointment, StoreError>;

    fn update(&self, appointment: Appointment) -> Result<Appointment, StoreError>;

    fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError>;

    /// Appointments matching the filter, ordered by date then start time.
    fn find(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, StoreError>;

    /// Slot-blocking appointments of a doctor on one date, ordered by start.
    fn blocking_on(
        &self,
        doctor_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError> {
        let filter = AppointmentFilter {
            doctor_id: Some(doctor_id.to_string()),
            date_from: Some(date),
            date_to: Some(date),
            ..Default::default()
        };
        Ok(self
            .find(&filter)?
            .into_iter()
            .filter(Appointment::blocks_slot)
            .collect())
    }
}

/// Process-local store backed by a locked map.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    appointments: RwLock<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.read().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<Uuid, Appointment>>, StoreError> {
        self.appointments
            .read()
            .map_err(|_| StoreError::Unavailable("appointment lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<Uuid, Appointment>>, StoreError> {
        self.appointments
            .write()
            .map_err(|_| StoreError::Unavailable("appointment lock poisoned".to_string()))
    }

    /// Enforce the exclusion constraint for `candidate` against `existing`.
    fn check_exclusion(
        existing: &HashMap<Uuid, Appointment>,
        candidate: &Appointment,
    ) -> Result<(), StoreError> {
        if !candidate.blocks_slot() {
            return Ok(());
        }
        let clash = existing.values().find(|other| {
            other.id != candidate.id
                && other.blocks_slot()
                && other.doctor_id == candidate.doctor_id
                && other.overlaps_with(candidate.date, candidate.start_time, candidate.end_time)
        });
        match clash {
            Some(other) => {
                warn!(
                    "Exclusion constraint rejected {} for doctor {}: overlaps {}",
                    candidate.id, candidate.doctor_id, other.id
                );
                Err(StoreError::SlotTaken {
                    doctor_id: candidate.doctor_id.clone(),
                    date: candidate.date,
                    start_time: candidate.start_time,
                    end_time: candidate.end_time,
                })
            }
            None => Ok(()),
        }
    }
}

impl AppointmentStore for InMemoryAppointmentStore {
    fn insert(&self, mut appointment: Appointment) -> Result<Appointment, StoreError> {
        let mut map = self.write()?;
        if map.contains_key(&appointment.id) {
            return Err(StoreError::DuplicateId(appointment.id));
        }
        Self::check_exclusion(&map, &appointment)?;

        appointment.version = 1;
        map.insert(appointment.id, appointment.clone());
        debug!("Stored appointment {}", appointment.id);
        Ok(appointment)
    }

    fn update(&self, mut appointment: Appointment) -> Result<Appointment, StoreError> {
        let mut map = self.write()?;
        let current = map
            .get(&appointment.id)
            .ok_or(StoreError::NotFound(appointment.id))?;
        if current.version != appointment.version {
            return Err(StoreError::StaleVersion {
                id: appointment.id,
                expected: appointment.version,
                actual: current.version,
            });
        }
        Self::check_exclusion(&map, &appointment)?;

        appointment.version += 1;
        map.insert(appointment.id, appointment.clone());
        debug!(
            "Updated appointment {} to version {}",
            appointment.id, appointment.version
        );
        Ok(appointment)
    }

    fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(self.read()?.get(&id).cloned())
    }

    fn find(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, StoreError> {
        let mut found: Vec<Appointment> = self
            .read()?
            .values()
            .filter(|apt| filter.matches(apt))
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            (a.date, a.start_time, a.created_at).cmp(&(b.date, b.start_time, b.created_at))
        });
        Ok(found)
    }
}
