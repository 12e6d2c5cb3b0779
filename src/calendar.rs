/// Availability queries over a doctor's booked appointments.
///
/// This module provides the DoctorCalendar struct which answers whether a
/// doctor is free for an interval, which slots are still open on a day,
/// where to go instead when a request conflicts, and which doctors are free
/// for a fixed window. It only reads from the store.

use crate::config::SchedulerConfig;
use crate::directory::DoctorDirectory;
use crate::models::{Appointment, Availability, Doctor, Slot};
use crate::store::{AppointmentStore, StoreError};
use crate::time::{overlaps, ClockTime, MINUTES_PER_DAY};
use chrono::{Days, NaiveDate};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// What an alternative search must leave out.
#[derive(Debug, Clone, Copy, Default)]
pub struct Exclusions {
    /// Appointment whose own occupancy is ignored (rescheduling).
    pub appointment: Option<Uuid>,
    /// The rejected request, never offered back as an alternative.
    pub requested: Option<Slot>,
}

#[derive(Clone)]
pub struct DoctorCalendar {
    store: Arc<dyn AppointmentStore>,
    config: SchedulerConfig,
}

impl DoctorCalendar {
    pub fn new(store: Arc<dyn AppointmentStore>, config: SchedulerConfig) -> Self {
        DoctorCalendar { store, config }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Slot-blocking appointments of a doctor on a date, minus `exclude`.
    fn booked(
        &self,
        doctor_id: &str,
        date: NaiveDate,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let mut booked = self.store.blocking_on(doctor_id, date)?;
        if let Some(excluded) = exclude {
            booked.retain(|apt| apt.id != excluded);
        }
        Ok(booked)
    }

    /// Check whether `[start, end)` is free for the doctor on `date`.
    pub fn check_availability(
        &self,
        doctor_id: &str,
        date: NaiveDate,
        start: ClockTime,
        end: ClockTime,
        exclude: Option<Uuid>,
    ) -> Result<Availability, StoreError> {
        let conflicts: Vec<Appointment> = self
            .booked(doctor_id, date, exclude)?
            .into_iter()
            .filter(|apt| apt.overlaps_with(date, start, end))
            .collect();

        debug!(
            "Availability for doctor {} on {} {}-{}: {} conflict(s)",
            doctor_id,
            date,
            start,
            end,
            conflicts.len()
        );

        if conflicts.is_empty() {
            return Ok(Availability {
                available: true,
                conflicts,
                reason: None,
            });
        }

        let reason = conflict_reason(&conflicts);
        Ok(Availability {
            available: false,
            conflicts,
            reason: Some(reason),
        })
    }

    /// Open start times for an appointment of `duration` minutes.
    pub fn available_slots(
        &self,
        doctor_id: &str,
        date: NaiveDate,
        duration: u16,
    ) -> Result<Vec<ClockTime>, StoreError> {
        self.open_slots(doctor_id, date, duration, None)
    }

    /// Enumerate candidates from opening time at the configured granularity,
    /// keeping those that fit before closing and clash with nothing.
    pub fn open_slots(
        &self,
        doctor_id: &str,
        date: NaiveDate,
        duration: u16,
        exclude: Option<Uuid>,
    ) -> Result<Vec<ClockTime>, StoreError> {
        let duration = duration as u32;
        let step = self.config.slot_granularity_minutes as u32;
        if !self.config.is_working_day(date)
            || duration == 0
            || duration >= MINUTES_PER_DAY as u32
            || step == 0
        {
            return Ok(Vec::new());
        }

        let booked = self.booked(doctor_id, date, exclude)?;
        let close = self.config.close_time.minutes() as u32;
        let break_window = self.config.break_window();

        let mut slots = Vec::new();
        let mut current = self.config.open_time.minutes() as u32;

        while current + duration <= close {
            let start = ClockTime::from_minutes(current as i64);
            let end = ClockTime::from_minutes((current + duration) as i64);

            let in_break = break_window
                .map_or(false, |(break_start, break_end)| {
                    overlaps(start, end, break_start, break_end)
                });
            let taken = booked.iter().any(|apt| apt.overlaps_with(date, start, end));

            if !in_break && !taken {
                slots.push(start);
            }

            current += step;
        }

        debug!(
            "Doctor {} has {} open {}-minute slot(s) on {}",
            doctor_id,
            slots.len(),
            duration,
            date
        );
        Ok(slots)
    }

    /// Propose up to `max_results` free slots, on `date` first and then on
    /// the following days within the lookahead.
    pub fn suggest_alternatives(
        &self,
        doctor_id: &str,
        date: NaiveDate,
        duration: u16,
        max_results: usize,
    ) -> Result<Vec<Slot>, StoreError> {
        self.suggest_alternatives_excluding(
            doctor_id,
            date,
            duration,
            max_results,
            Exclusions::default(),
        )
    }

    pub fn suggest_alternatives_excluding(
        &self,
        doctor_id: &str,
        date: NaiveDate,
        duration: u16,
        max_results: usize,
        exclusions: Exclusions,
    ) -> Result<Vec<Slot>, StoreError> {
        let mut alternatives = Vec::new();
        if max_results == 0 {
            return Ok(alternatives);
        }

        for offset in 0..=self.config.lookahead_days {
            let Some(day) = date.checked_add_days(Days::new(offset.into())) else {
                break;
            };
            let mut starts = self.open_slots(doctor_id, day, duration, exclusions.appointment)?;

            // On the requested day, closest to the requested start comes first.
            if let Some(requested) = exclusions.requested.filter(|r| r.date == day) {
                let wanted = requested.start_time.minutes() as i32;
                starts.retain(|start| *start != requested.start_time);
                starts.sort_by_key(|start| ((start.minutes() as i32 - wanted).abs(), *start));
            }

            for start in starts {
                let slot = Slot {
                    date: day,
                    start_time: start,
                    end_time: start.add_minutes(duration as i64),
                };
                alternatives.push(slot);
                if alternatives.len() >= max_results {
                    return Ok(alternatives);
                }
            }
        }

        debug!(
            "Only {} alternative(s) for doctor {} within {} day(s) of {}",
            alternatives.len(),
            doctor_id,
            self.config.lookahead_days,
            date
        );
        Ok(alternatives)
    }

    /// Doctors with nothing booked inside `[start, end)` on `date`, ordered
    /// by name then ID.
    pub fn find_available_doctors(
        &self,
        directory: &dyn DoctorDirectory,
        date: NaiveDate,
        start: ClockTime,
        end: ClockTime,
        specialization: Option<&str>,
    ) -> Result<Vec<Doctor>, StoreError> {
        let mut available = Vec::new();
        for doctor in directory.doctors(specialization) {
            if self
                .check_availability(&doctor.doctor_id, date, start, end, None)?
                .available
            {
                available.push(doctor);
            }
        }
        available.sort_by(|a, b| (&a.name, &a.doctor_id).cmp(&(&b.name, &b.doctor_id)));
        Ok(available)
    }
}

fn conflict_reason(conflicts: &[Appointment]) -> String {
    let times: Vec<String> = conflicts
        .iter()
        .map(|apt| format!("{}-{}", apt.start_time, apt.end_time))
        .collect();
    if times.len() == 1 {
        format!("Doctor has a conflicting appointment at {}", times[0])
    } else {
        format!("Doctor has conflicting appointments at {}", times.join(", "))
    }
}
