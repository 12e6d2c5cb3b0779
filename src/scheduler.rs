/// Appointment lifecycle service.
///
/// This module provides the AppointmentScheduler struct, the entry point for
/// every booking, reschedule and status change. Each write is preceded by an
/// availability check; the store's exclusion constraint is the final word
/// when two requests race for the same interval.

use crate::calendar::{DoctorCalendar, Exclusions};
use crate::clock::Clock;
use crate::config::SchedulerConfig;
use crate::directory::DoctorDirectory;
use crate::error::{Result, SchedulingError};
use crate::models::{
    end_time_for, Appointment, AppointmentFilter, AppointmentPatch, AppointmentStatus,
    Availability, ConflictDetails, Doctor, NewAppointment, Page, Slot,
};
use crate::store::{AppointmentStore, StoreError};
use crate::time::ClockTime;
use chrono::{Days, NaiveDate, Timelike};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct AppointmentScheduler {
    store: Arc<dyn AppointmentStore>,
    directory: Arc<dyn DoctorDirectory>,
    clock: Arc<dyn Clock>,
    calendar: DoctorCalendar,
}

impl AppointmentScheduler {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        directory: Arc<dyn DoctorDirectory>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        let calendar = DoctorCalendar::new(store.clone(), config);
        AppointmentScheduler {
            store,
            directory,
            clock,
            calendar,
        }
    }

    pub fn calendar(&self) -> &DoctorCalendar {
        &self.calendar
    }

    fn config(&self) -> &SchedulerConfig {
        self.calendar.config()
    }

    /// Book a new appointment.
    pub fn create(&self, booking: NewAppointment) -> Result<Appointment> {
        let appointment =
            Appointment::new(booking, self.clock.now()).map_err(SchedulingError::Validation)?;

        if self.directory.doctor(&appointment.doctor_id).is_none() {
            return Err(SchedulingError::doctor_not_found(&appointment.doctor_id));
        }

        let availability = self.calendar.check_availability(
            &appointment.doctor_id,
            appointment.date,
            appointment.start_time,
            appointment.end_time,
            None,
        )?;
        if !availability.available {
            warn!(
                "Rejected booking for doctor {} on {} at {}: slot taken",
                appointment.doctor_id, appointment.date, appointment.start_time
            );
            return Err(self.conflict(&appointment, None, availability));
        }

        let attempted = appointment.clone();
        match self.store.insert(appointment) {
            Ok(saved) => {
                info!(
                    "Booked appointment {} for doctor {} on {} {}-{}",
                    saved.id, saved.doctor_id, saved.date, saved.start_time, saved.end_time
                );
                Ok(saved)
            }
            Err(StoreError::SlotTaken { .. }) => Err(self.lost_race(&attempted, None)),
            Err(err) => Err(err.into()),
        }
    }

    pub fn get_by_id(&self, id: Uuid) -> Result<Appointment> {
        self.store
            .get(id)?
            .ok_or_else(|| SchedulingError::appointment_not_found(id))
    }

    /// Filtered listing, most recent first.
    pub fn list(&self, filter: &AppointmentFilter, page: usize, limit: usize) -> Result<Page<Appointment>> {
        if page == 0 {
            return Err(SchedulingError::Validation(
                "Page must be at least 1".to_string(),
            ));
        }
        let max_limit = self.config().max_page_size;
        if limit == 0 || limit > max_limit {
            return Err(SchedulingError::Validation(format!(
                "Limit must be between 1 and {}, got {}",
                max_limit, limit
            )));
        }

        let offset = (page - 1).checked_mul(limit).ok_or_else(|| {
            SchedulingError::Validation(format!("Page {} is out of range", page))
        })?;

        let mut matching = self.store.find(filter)?;
        matching.reverse();

        let total = matching.len();
        let items = matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect();

        Ok(Page {
            items,
            total,
            page,
            limit,
            total_pages: total.div_ceil(limit),
        })
    }

    /// Non-cancelled appointments of a doctor between two dates inclusive.
    pub fn doctor_schedule(
        &self,
        doctor_id: &str,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> Result<Vec<Appointment>> {
        if date_from > date_to {
            return Err(SchedulingError::Validation(format!(
                "Schedule range starts {} after it ends {}",
                date_from, date_to
            )));
        }
        let filter = AppointmentFilter {
            doctor_id: Some(doctor_id.to_string()),
            date_from: Some(date_from),
            date_to: Some(date_to),
            ..Default::default()
        };
        Ok(self
            .store
            .find(&filter)?
            .into_iter()
            .filter(Appointment::blocks_slot)
            .collect())
    }

    /// Open start times for a doctor on a date.
    pub fn check_availability(
        &self,
        doctor_id: &str,
        date: NaiveDate,
        duration: u16,
    ) -> Result<Vec<ClockTime>> {
        validate_duration(duration)?;
        Ok(self.calendar.available_slots(doctor_id, date, duration)?)
    }

    /// Whether a specific interval is free, with the conflicting bookings.
    pub fn check_slot(
        &self,
        doctor_id: &str,
        date: NaiveDate,
        start_time: ClockTime,
        duration: u16,
        exclude: Option<Uuid>,
    ) -> Result<Availability> {
        let end_time = end_time_for(start_time, duration).map_err(SchedulingError::Validation)?;
        Ok(self
            .calendar
            .check_availability(doctor_id, date, start_time, end_time, exclude)?)
    }

    pub fn suggest_alternatives(
        &self,
        doctor_id: &str,
        date: NaiveDate,
        duration: u16,
        max_results: usize,
    ) -> Result<Vec<Slot>> {
        validate_duration(duration)?;
        Ok(self
            .calendar
            .suggest_alternatives(doctor_id, date, duration, max_results)?)
    }

    pub fn find_available_doctors(
        &self,
        date: NaiveDate,
        start_time: ClockTime,
        end_time: ClockTime,
        specialization: Option<&str>,
    ) -> Result<Vec<Doctor>> {
        if start_time >= end_time {
            return Err(SchedulingError::Validation(format!(
                "Window start {} must be before end {}",
                start_time, end_time
            )));
        }
        Ok(self.calendar.find_available_doctors(
            self.directory.as_ref(),
            date,
            start_time,
            end_time,
            specialization,
        )?)
    }

    /// Apply a partial update. Moving the appointment re-checks availability.
    pub fn update(&self, id: Uuid, patch: AppointmentPatch) -> Result<Appointment> {
        if patch == AppointmentPatch::default() {
            return self.get_by_id(id);
        }

        self.modify(id, |appointment| {
            if appointment.status.is_terminal()
                && (patch.touches_slot() || patch.appointment_type.is_some())
            {
                return Err(SchedulingError::InvalidTransition {
                    from: appointment.status,
                    action: "modify",
                });
            }
            if patch.touches_slot() && !appointment.status.is_movable() {
                return Err(SchedulingError::InvalidTransition {
                    from: appointment.status,
                    action: "move",
                });
            }

            if patch.touches_slot() {
                let date = patch.date.unwrap_or(appointment.date);
                let start = patch.start_time.unwrap_or(appointment.start_time);
                let duration = patch.duration.unwrap_or(appointment.duration);
                self.move_to(appointment, date, start, duration)?;
            }
            if let Some(appointment_type) = patch.appointment_type {
                appointment.appointment_type = appointment_type;
            }
            if let Some(notes) = &patch.notes {
                appointment.notes = Some(notes.clone());
            }
            Ok(())
        })
    }

    pub fn confirm(&self, id: Uuid) -> Result<Appointment> {
        self.transition(id, AppointmentStatus::Confirmed, "confirm")
    }

    /// Mark a confirmed appointment as in progress.
    pub fn start(&self, id: Uuid) -> Result<Appointment> {
        self.transition(id, AppointmentStatus::InProgress, "start")
    }

    pub fn complete(&self, id: Uuid) -> Result<Appointment> {
        self.transition(id, AppointmentStatus::Completed, "complete")
    }

    pub fn mark_no_show(&self, id: Uuid) -> Result<Appointment> {
        self.transition(id, AppointmentStatus::NoShow, "mark as no-show")
    }

    /// Cancel with a mandatory reason. The slot becomes bookable again.
    pub fn cancel(&self, id: Uuid, reason: &str) -> Result<Appointment> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(SchedulingError::Validation(
                "Cancellation reason is required".to_string(),
            ));
        }

        self.modify(id, |appointment| {
            if appointment.status.is_terminal() {
                return Err(SchedulingError::AlreadyTerminal(appointment.status));
            }
            appointment.status = AppointmentStatus::Cancelled;
            appointment.cancel_reason = Some(reason.to_string());
            appointment.cancelled_at = Some(self.clock.now());
            Ok(())
        })
    }

    /// Move an appointment to a new slot. It starts over as scheduled and
    /// its reminder is re-armed.
    pub fn reschedule(
        &self,
        id: Uuid,
        new_date: NaiveDate,
        new_start_time: ClockTime,
        new_duration: Option<u16>,
    ) -> Result<Appointment> {
        self.modify(id, |appointment| {
            if !appointment.status.is_movable() {
                return Err(SchedulingError::InvalidTransition {
                    from: appointment.status,
                    action: "reschedule",
                });
            }
            let duration = new_duration.unwrap_or(appointment.duration);
            self.move_to(appointment, new_date, new_start_time, duration)?;
            appointment.status = AppointmentStatus::Scheduled;
            appointment.reminder_sent = false;
            Ok(())
        })
    }

    pub fn mark_reminder_sent(&self, id: Uuid) -> Result<Appointment> {
        self.modify(id, |appointment| {
            if appointment.status.is_terminal() {
                return Err(SchedulingError::InvalidTransition {
                    from: appointment.status,
                    action: "send a reminder for",
                });
            }
            appointment.reminder_sent = true;
            Ok(())
        })
    }

    /// Scheduled or confirmed appointments from now through `days` ahead.
    pub fn upcoming(
        &self,
        doctor_id: Option<&str>,
        patient_id: Option<&str>,
        days: u32,
    ) -> Result<Vec<Appointment>> {
        let now = self.clock.now();
        let today = now.date();
        let filter = AppointmentFilter {
            doctor_id: doctor_id.map(str::to_string),
            patient_id: patient_id.map(str::to_string),
            date_from: Some(today),
            date_to: Some(
                today
                    .checked_add_days(Days::new(days.into()))
                    .unwrap_or(NaiveDate::MAX),
            ),
            ..Default::default()
        };
        let current = ClockTime::from_minutes((now.hour() * 60 + now.minute()) as i64);

        Ok(self
            .store
            .find(&filter)?
            .into_iter()
            .filter(|apt| {
                matches!(
                    apt.status,
                    AppointmentStatus::Scheduled | AppointmentStatus::Confirmed
                )
            })
            .filter(|apt| apt.date > today || apt.start_time >= current)
            .collect())
    }

    /// Today's non-cancelled appointments for a doctor.
    pub fn today(&self, doctor_id: &str) -> Result<Vec<Appointment>> {
        let today = self.clock.today();
        self.doctor_schedule(doctor_id, today, today)
    }

    fn transition(
        &self,
        id: Uuid,
        next: AppointmentStatus,
        action: &'static str,
    ) -> Result<Appointment> {
        let saved = self.modify(id, |appointment| {
            if !appointment.status.can_transition_to(next) {
                warn!(
                    "Refused to {} appointment {} in state {}",
                    action, appointment.id, appointment.status
                );
                return Err(SchedulingError::InvalidTransition {
                    from: appointment.status,
                    action,
                });
            }
            appointment.status = next;
            if next == AppointmentStatus::Completed {
                appointment.completed_at = Some(self.clock.now());
            }
            Ok(())
        })?;
        info!("Appointment {} is now {}", saved.id, saved.status);
        Ok(saved)
    }

    /// Set a new slot on `appointment` after checking it is free, ignoring
    /// the appointment's own current occupancy.
    fn move_to(
        &self,
        appointment: &mut Appointment,
        date: NaiveDate,
        start_time: ClockTime,
        duration: u16,
    ) -> Result<()> {
        appointment
            .set_slot(date, start_time, duration)
            .map_err(SchedulingError::Validation)?;

        let id = appointment.id;
        let availability = self.calendar.check_availability(
            &appointment.doctor_id,
            date,
            appointment.start_time,
            appointment.end_time,
            Some(id),
        )?;
        if !availability.available {
            warn!(
                "Rejected move of appointment {} to {} {}: slot taken",
                id, date, start_time
            );
            return Err(self.conflict(appointment, Some(id), availability));
        }
        Ok(())
    }

    /// Read, change and write back one appointment. A stale write is
    /// retried once from a fresh read; a lost slot race becomes a conflict.
    fn modify<F>(&self, id: Uuid, mut change: F) -> Result<Appointment>
    where
        F: FnMut(&mut Appointment) -> Result<()>,
    {
        let mut retried = false;
        loop {
            let mut appointment = self.get_by_id(id)?;
            change(&mut appointment)?;
            appointment.updated_at = self.clock.now();

            let attempted = appointment.clone();
            match self.store.update(appointment) {
                Ok(saved) => return Ok(saved),
                Err(StoreError::StaleVersion { .. }) if !retried => {
                    debug!("Appointment {} changed underneath us, retrying once", id);
                    retried = true;
                }
                Err(StoreError::SlotTaken { .. }) => {
                    return Err(self.lost_race(&attempted, Some(id)))
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Build the conflict error for a rejected request, with alternatives.
    fn conflict(
        &self,
        attempted: &Appointment,
        exclude: Option<Uuid>,
        availability: Availability,
    ) -> SchedulingError {
        let reason = availability
            .reason
            .unwrap_or_else(|| "Requested slot is no longer available".to_string());
        let exclusions = Exclusions {
            appointment: exclude,
            requested: Some(attempted.slot()),
        };
        let alternatives = self
            .calendar
            .suggest_alternatives_excluding(
                &attempted.doctor_id,
                attempted.date,
                attempted.duration,
                self.config().max_alternatives,
                exclusions,
            )
            .unwrap_or_else(|err| {
                warn!("Could not compute alternatives: {}", err);
                Vec::new()
            });

        SchedulingError::Conflict(Box::new(ConflictDetails {
            reason,
            conflicts: availability.conflicts,
            alternatives,
        }))
    }

    /// The pre-check passed but the store refused the write because another
    /// request committed first. Re-query once to report what now holds the
    /// slot.
    fn lost_race(&self, attempted: &Appointment, exclude: Option<Uuid>) -> SchedulingError {
        warn!(
            "Lost booking race for doctor {} on {} at {}",
            attempted.doctor_id, attempted.date, attempted.start_time
        );
        let availability = self
            .calendar
            .check_availability(
                &attempted.doctor_id,
                attempted.date,
                attempted.start_time,
                attempted.end_time,
                exclude,
            )
            .unwrap_or_else(|err| {
                warn!("Re-check after lost race failed: {}", err);
                Availability {
                    available: false,
                    conflicts: Vec::new(),
                    reason: None,
                }
            });
        self.conflict(attempted, exclude, availability)
    }
}

fn validate_duration(duration: u16) -> Result<()> {
    end_time_for(ClockTime::from_minutes(0), duration)
        .map(|_| ())
        .map_err(SchedulingError::Validation)
}
