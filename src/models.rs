/// Data models for the appointment scheduling engine.
///
/// This module defines the core data structures used throughout the system:
/// - AppointmentStatus: Closed lifecycle states and the transition table
/// - AppointmentType: Consultation or emergency visit
/// - Appointment: A persisted doctor/patient encounter
/// - NewAppointment / AppointmentPatch: Inputs for create and update
/// - Slot, Availability, ConflictDetails: Results of availability checks
/// - Doctor: Directory entry used by the doctor finder

use crate::time::ClockTime;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub const MIN_DURATION_MINUTES: u16 = 15;
pub const MAX_DURATION_MINUTES: u16 = 180;
pub const DEFAULT_DURATION_MINUTES: u16 = 30;

/// Lifecycle states of an appointment.
///
/// `Completed`, `Cancelled` and `NoShow` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    /// Convert a string to a status value.
    pub fn from_string(value: &str) -> Result<Self, String> {
        match value.to_lowercase().trim() {
            "scheduled" => Ok(AppointmentStatus::Scheduled),
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            "in-progress" => Ok(AppointmentStatus::InProgress),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            "no-show" => Ok(AppointmentStatus::NoShow),
            _ => Err(format!(
                "Invalid status: '{}'. Must be one of: scheduled, confirmed, in-progress, completed, cancelled, no-show",
                value
            )),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::InProgress => "in-progress",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no-show",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::NoShow
        )
    }

    /// Only appointments that have not started can change slot.
    pub fn is_movable(&self) -> bool {
        matches!(self, AppointmentStatus::Scheduled | AppointmentStatus::Confirmed)
    }

    /// Whether an appointment in this state still occupies its slot.
    ///
    /// Only cancellation frees a slot; completed and no-show visits keep
    /// their historical interval.
    pub fn blocks_slot(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }

    /// The single transition table for the lifecycle.
    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        use AppointmentStatus::*;
        matches!(
            (self, next),
            (Scheduled, Confirmed)
                | (Confirmed, InProgress)
                | (Scheduled | Confirmed | InProgress, Completed)
                | (Scheduled | Confirmed | InProgress, Cancelled)
                | (Scheduled | Confirmed, NoShow)
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentType {
    #[default]
    Consultation,
    Emergency,
}

impl AppointmentType {
    pub fn from_string(value: &str) -> Result<Self, String> {
        match value.to_lowercase().trim() {
            "consultation" => Ok(AppointmentType::Consultation),
            "emergency" => Ok(AppointmentType::Emergency),
            _ => Err(format!(
                "Invalid appointment type: '{}'. Must be one of: consultation, emergency",
                value
            )),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            AppointmentType::Consultation => "consultation",
            AppointmentType::Emergency => "emergency",
        }
    }
}

/// A booked doctor/patient encounter.
///
/// `end_time` is always `start_time + duration`; it is never set directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: String,
    pub doctor_id: String,
    pub date: NaiveDate,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
    pub duration: u16,
    pub status: AppointmentStatus,
    #[serde(rename = "type")]
    pub appointment_type: AppointmentType,
    pub notes: Option<String>,
    pub cancel_reason: Option<String>,
    pub created_by: String,
    pub reminder_sent: bool,
    pub completed_at: Option<NaiveDateTime>,
    pub cancelled_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    /// Bumped by the store on every successful write.
    pub version: u64,
}

impl Appointment {
    /// Create a new appointment from a validated booking.
    pub fn new(booking: NewAppointment, now: NaiveDateTime) -> Result<Self, String> {
        let end_time = end_time_for(booking.start_time, booking.duration)?;
        if booking.patient_id.trim().is_empty() {
            return Err("Patient ID cannot be empty".to_string());
        }
        if booking.doctor_id.trim().is_empty() {
            return Err("Doctor ID cannot be empty".to_string());
        }
        if booking.created_by.trim().is_empty() {
            return Err("Creator cannot be empty".to_string());
        }

        Ok(Appointment {
            id: Uuid::new_v4(),
            patient_id: booking.patient_id,
            doctor_id: booking.doctor_id,
            date: booking.date,
            start_time: booking.start_time,
            end_time,
            duration: booking.duration,
            status: AppointmentStatus::Scheduled,
            appointment_type: booking.appointment_type,
            notes: booking.notes,
            cancel_reason: None,
            created_by: booking.created_by,
            reminder_sent: false,
            completed_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    /// Move the appointment to a new date and time, recomputing the end.
    pub fn set_slot(
        &mut self,
        date: NaiveDate,
        start_time: ClockTime,
        duration: u16,
    ) -> Result<(), String> {
        self.end_time = end_time_for(start_time, duration)?;
        self.date = date;
        self.start_time = start_time;
        self.duration = duration;
        Ok(())
    }

    pub fn blocks_slot(&self) -> bool {
        self.status.blocks_slot()
    }

    /// Check if this appointment's interval overlaps another on the same day.
    pub fn overlaps_with(&self, date: NaiveDate, start: ClockTime, end: ClockTime) -> bool {
        self.date == date && crate::time::overlaps(self.start_time, self.end_time, start, end)
    }

    pub fn slot(&self) -> Slot {
        Slot {
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }
}

/// Validate a duration and derive the end of an interval starting at `start`.
pub fn end_time_for(start: ClockTime, duration: u16) -> Result<ClockTime, String> {
    if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&duration) {
        return Err(format!(
            "Duration must be between {} and {} minutes, got {}",
            MIN_DURATION_MINUTES, MAX_DURATION_MINUTES, duration
        ));
    }
    start.checked_add_minutes(duration).ok_or_else(|| {
        format!(
            "Appointment starting at {} with duration {} runs past midnight",
            start, duration
        )
    })
}

/// Input for booking a new appointment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAppointment {
    pub patient_id: String,
    pub doctor_id: String,
    pub date: NaiveDate,
    pub start_time: ClockTime,
    #[serde(default = "default_duration")]
    pub duration: u16,
    #[serde(default, rename = "type")]
    pub appointment_type: AppointmentType,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_by: String,
}

fn default_duration() -> u16 {
    DEFAULT_DURATION_MINUTES
}

impl NewAppointment {
    /// Booking with the default duration and type.
    pub fn new(
        patient_id: impl Into<String>,
        doctor_id: impl Into<String>,
        date: NaiveDate,
        start_time: ClockTime,
        created_by: impl Into<String>,
    ) -> Self {
        NewAppointment {
            patient_id: patient_id.into(),
            doctor_id: doctor_id.into(),
            date,
            start_time,
            duration: DEFAULT_DURATION_MINUTES,
            appointment_type: AppointmentType::default(),
            notes: None,
            created_by: created_by.into(),
        }
    }

    pub fn with_duration(mut self, duration: u16) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_type(mut self, appointment_type: AppointmentType) -> Self {
        self.appointment_type = appointment_type;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Partial update. Changing `date`, `start_time` or `duration` re-runs the
/// availability check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentPatch {
    pub date: Option<NaiveDate>,
    pub start_time: Option<ClockTime>,
    pub duration: Option<u16>,
    #[serde(rename = "type")]
    pub appointment_type: Option<AppointmentType>,
    pub notes: Option<String>,
}

impl AppointmentPatch {
    pub fn touches_slot(&self) -> bool {
        self.date.is_some() || self.start_time.is_some() || self.duration.is_some()
    }
}

/// A `[start_time, end_time)` interval on a given date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub date: NaiveDate,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
}

/// Outcome of an availability check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub available: bool,
    pub conflicts: Vec<Appointment>,
    pub reason: Option<String>,
}

/// Structured payload of a rejected booking or reschedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictDetails {
    pub reason: String,
    pub conflicts: Vec<Appointment>,
    pub alternatives: Vec<Slot>,
}

/// A doctor as seen by the scheduling engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    pub doctor_id: String,
    pub name: String,
    pub specialization: String,
}

impl Doctor {
    /// Create a new doctor with validation.
    pub fn new(doctor_id: String, name: String, specialization: String) -> Result<Self, String> {
        if doctor_id.is_empty() {
            return Err("Doctor ID cannot be empty".to_string());
        }
        if name.is_empty() {
            return Err("Doctor name cannot be empty".to_string());
        }

        Ok(Doctor {
            doctor_id,
            name,
            specialization,
        })
    }
}

/// Filters for listing appointments. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentFilter {
    pub patient_id: Option<String>,
    pub doctor_id: Option<String>,
    pub status: Option<AppointmentStatus>,
    #[serde(rename = "type")]
    pub appointment_type: Option<AppointmentType>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl AppointmentFilter {
    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.patient_id
            .as_ref()
            .map_or(true, |id| &appointment.patient_id == id)
            && self
                .doctor_id
                .as_ref()
                .map_or(true, |id| &appointment.doctor_id == id)
            && self.status.map_or(true, |s| appointment.status == s)
            && self
                .appointment_type
                .map_or(true, |t| appointment.appointment_type == t)
            && self.date_from.map_or(true, |d| appointment.date >= d)
            && self.date_to.map_or(true, |d| appointment.date <= d)
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub total_pages: usize,
}
