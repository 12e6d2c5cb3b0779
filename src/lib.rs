//! Conflict-free appointment scheduling for a single clinic.
//!
//! The engine books, reschedules and cancels doctor/patient appointments,
//! guarantees that no doctor holds two overlapping active appointments, and
//! offers alternative slots when a request cannot be honoured.

pub mod calendar;
pub mod clock;
pub mod config;
pub mod directory;
pub mod error;
pub mod models;
pub mod scheduler;
pub mod store;
pub mod time;

pub use calendar::DoctorCalendar;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, SchedulerConfig};
pub use directory::{DoctorDirectory, InMemoryDoctorDirectory};
pub use error::SchedulingError;
pub use models::{
    Appointment, AppointmentFilter, AppointmentPatch, AppointmentStatus, AppointmentType,
    Availability, ConflictDetails, Doctor, NewAppointment, Page, Slot,
};
pub use scheduler::AppointmentScheduler;
pub use store::{AppointmentStore, InMemoryAppointmentStore, StoreError};
pub use time::{add_minutes, overlaps, ClockTime, TimeError};
