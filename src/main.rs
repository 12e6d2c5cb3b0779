/// Command-line interface for the appointment scheduling engine.
///
/// This module provides an interactive CLI for registering doctors, booking
/// and moving appointments, and browsing open slots and schedules.

use chrono::{Datelike, Days, Duration, Local, NaiveDate};
use clinic_scheduler::{
    AppointmentFilter, AppointmentScheduler, AppointmentStatus, AppointmentType, ClockTime,
    Doctor, InMemoryAppointmentStore, InMemoryDoctorDirectory, NewAppointment, SchedulerConfig,
    SchedulingError, SystemClock,
};
use std::io::{self, Write};
use std::process;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const CONFIG_ENV: &str = "CLINIC_SCHEDULER_CONFIG";
const MAX_SCHEDULE_DAYS: i64 = 366;

struct AppointmentCLI {
    config: SchedulerConfig,
    store: Arc<InMemoryAppointmentStore>,
    directory: InMemoryDoctorDirectory,
    scheduler: AppointmentScheduler,
    running: bool,
}

impl AppointmentCLI {
    fn new(config: SchedulerConfig) -> Self {
        let store = Arc::new(InMemoryAppointmentStore::new());
        let directory = InMemoryDoctorDirectory::new();
        let scheduler = Self::build_scheduler(&store, &directory, &config);
        AppointmentCLI {
            config,
            store,
            directory,
            scheduler,
            running: true,
        }
    }

    fn build_scheduler(
        store: &Arc<InMemoryAppointmentStore>,
        directory: &InMemoryDoctorDirectory,
        config: &SchedulerConfig,
    ) -> AppointmentScheduler {
        AppointmentScheduler::new(
            store.clone(),
            Arc::new(directory.clone()),
            Arc::new(SystemClock),
            config.clone(),
        )
    }

    fn print_header(&self) {
        println!("\n{}", "=".repeat(60));
        println!("       CLINIC APPOINTMENT SCHEDULER");
        println!("{}", "=".repeat(60));
        println!(
            "Opening hours {} - {}, {}-minute grid",
            self.config.open_time, self.config.close_time, self.config.slot_granularity_minutes
        );
    }

    fn print_menu(&self) {
        println!("\n--- Main Menu ---");
        println!("1. Register doctor");
        println!("2. Book appointment");
        println!("3. View open slots");
        println!("4. View doctor schedule");
        println!("5. Find available doctors");
        println!("6. Confirm appointment");
        println!("7. Cancel appointment");
        println!("8. Reschedule appointment");
        println!("9. Run demo");
        println!("0. Exit");
        println!("{}", "-".repeat(20));
    }

    fn get_input(&self, prompt: &str, default: Option<&str>) -> String {
        if let Some(def) = default {
            print!("{} [{}]: ", prompt, def);
        } else {
            print!("{}: ", prompt);
        }
        // A failed flush only delays the prompt.
        let _ = io::stdout().flush();

        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() {
            return default.unwrap_or("").to_string();
        }
        let input = input.trim();

        if input.is_empty() {
            default.unwrap_or("").to_string()
        } else {
            input.to_string()
        }
    }

    fn get_int_input(&self, prompt: &str, default: Option<i64>) -> i64 {
        loop {
            let default_str = default.map(|d| d.to_string());
            let input = self.get_input(prompt, default_str.as_deref());

            if let Ok(value) = input.parse::<i64>() {
                return value;
            }
            println!("Please enter a valid number");
        }
    }

    fn get_date_input(&self, prompt: &str) -> NaiveDate {
        let default = self.next_working_day().format("%Y-%m-%d").to_string();
        loop {
            let input = self.get_input(prompt, Some(default.as_str()));
            match NaiveDate::parse_from_str(&input, "%Y-%m-%d") {
                Ok(date) => return date,
                Err(_) => println!("Please enter a date as YYYY-MM-DD"),
            }
        }
    }

    fn get_time_input(&self, prompt: &str, default: &str) -> ClockTime {
        loop {
            let input = self.get_input(prompt, Some(default));
            match input.parse::<ClockTime>() {
                Ok(time) => return time,
                Err(e) => println!("{}", e),
            }
        }
    }

    fn next_working_day(&self) -> NaiveDate {
        let mut date = Local::now().date_naive() + Duration::days(1);
        for _ in 0..7 {
            if self.config.is_working_day(date) {
                break;
            }
            date = date + Duration::days(1);
        }
        date
    }

    fn require_doctors(&self) -> bool {
        if self.directory.is_empty() {
            println!("\nPlease register a doctor first (option 1)");
            return false;
        }
        true
    }

    fn register_doctor(&mut self) {
        println!("\n--- Register Doctor ---");

        let name = self.get_input("Doctor name", Some("Dr. Smith"));
        let specialization = self.get_input("Specialization", Some("General Practice"));
        let doctor_id = format!("DR{:03}", self.directory.len() + 1);

        match Doctor::new(doctor_id.clone(), name.clone(), specialization) {
            Ok(doctor) => {
                self.directory.add(doctor);
                // The scheduler holds a snapshot of the directory.
                self.scheduler = Self::build_scheduler(&self.store, &self.directory, &self.config);
                println!("\nRegistered {} as {}", name, doctor_id);
            }
            Err(e) => println!("Error registering doctor: {}", e),
        }
    }

    fn book_appointment(&mut self) {
        if !self.require_doctors() {
            return;
        }

        println!("\n--- Book Appointment ---");

        let doctor_id = self.get_input("Doctor ID", Some("DR001"));
        let patient_id = self.get_input("Patient ID", None);
        let date = self.get_date_input("Date");
        let start = self.get_time_input("Start time", "09:00");
        let duration = self.get_int_input("Duration (minutes)", Some(30));
        let appointment_type = loop {
            let input = self.get_input("Type (consultation/emergency)", Some("consultation"));
            match AppointmentType::from_string(&input) {
                Ok(appointment_type) => break appointment_type,
                Err(e) => println!("{}", e),
            }
        };
        let notes = self.get_input("Notes", Some(""));

        let mut booking = NewAppointment::new(patient_id, doctor_id, date, start, "front-desk")
            .with_duration(duration.clamp(0, u16::MAX as i64) as u16)
            .with_type(appointment_type);
        if !notes.is_empty() {
            booking = booking.with_notes(notes);
        }

        match self.scheduler.create(booking) {
            Ok(apt) => {
                println!("\nBooked {} - {} on {}", apt.start_time, apt.end_time, apt.date);
                println!("  ID: {}", apt.id);
            }
            Err(e) => self.report_error(&e),
        }
    }

    fn view_open_slots(&self) {
        if !self.require_doctors() {
            return;
        }

        println!("\n--- Open Slots ---");

        let doctor_id = self.get_input("Doctor ID", Some("DR001"));
        let date = self.get_date_input("Date");
        let duration = self.get_int_input("Duration (minutes)", Some(30));

        match self
            .scheduler
            .check_availability(&doctor_id, date, duration.clamp(0, u16::MAX as i64) as u16)
        {
            Ok(slots) if slots.is_empty() => println!("\nNo open slots on {}", date),
            Ok(slots) => {
                println!("\n{} ({} open):", date.format("%A, %Y-%m-%d"), slots.len());
                let line: Vec<String> = slots.iter().map(|s| s.to_string()).collect();
                for chunk in line.chunks(8) {
                    println!("  {}", chunk.join("  "));
                }
            }
            Err(e) => self.report_error(&e),
        }
    }

    fn view_schedule(&self) {
        if !self.require_doctors() {
            return;
        }

        println!("\n--- Doctor Schedule ---");

        let doctor_id = self.get_input("Doctor ID", Some("DR001"));
        let from = self.get_date_input("From");
        let days = self.get_int_input("Number of days", Some(5));
        let to = schedule_end(from, days);

        let appointments = match self.scheduler.doctor_schedule(&doctor_id, from, to) {
            Ok(appointments) => appointments,
            Err(e) => {
                self.report_error(&e);
                return;
            }
        };

        if appointments.is_empty() {
            println!("\nNo appointments between {} and {}", from, to);
            return;
        }

        let mut current_date = None;
        for apt in &appointments {
            if Some(apt.date) != current_date {
                current_date = Some(apt.date);
                println!("\n{}:", apt.date.format("%A, %Y-%m-%d"));
            }
            println!(
                "  {} - {}  patient {} ({}, {})",
                apt.start_time,
                apt.end_time,
                apt.patient_id,
                apt.appointment_type.name(),
                apt.status
            );
        }
    }

    fn find_doctors(&self) {
        if !self.require_doctors() {
            return;
        }

        println!("\n--- Find Available Doctors ---");

        let date = self.get_date_input("Date");
        let start = self.get_time_input("From", "10:00");
        let end = self.get_time_input("Until", "10:30");
        let specialization = self.get_input("Specialization (blank for any)", Some(""));
        let specialization = Some(specialization.as_str()).filter(|s| !s.is_empty());

        match self
            .scheduler
            .find_available_doctors(date, start, end, specialization)
        {
            Ok(doctors) if doctors.is_empty() => println!("\nNobody is free in that window"),
            Ok(doctors) => {
                println!("\nAvailable {} - {} on {}:", start, end, date);
                for doctor in doctors {
                    println!("  {} {} ({})", doctor.doctor_id, doctor.name, doctor.specialization);
                }
            }
            Err(e) => self.report_error(&e),
        }
    }

    /// Let the user pick one active appointment from a numbered list.
    fn choose_appointment(&self, verb: &str) -> Option<uuid::Uuid> {
        let page = match self.scheduler.list(&AppointmentFilter::default(), 1, self.config.max_page_size) {
            Ok(page) => page,
            Err(e) => {
                self.report_error(&e);
                return None;
            }
        };
        let active: Vec<_> = page
            .items
            .into_iter()
            .filter(|apt| !apt.status.is_terminal())
            .collect();

        if active.is_empty() {
            println!("\nNo appointments to {}", verb);
            return None;
        }

        println!("\nCurrent appointments:");
        for (i, apt) in active.iter().enumerate() {
            println!(
                "  {}. {} {} {} - patient {} ({})",
                i + 1,
                apt.doctor_id,
                apt.date,
                apt.start_time,
                apt.patient_id,
                apt.status
            );
        }

        let prompt = format!("Select appointment to {} (0 to go back)", verb);
        let choice = self.get_int_input(&prompt, Some(0));
        if choice <= 0 || choice as usize > active.len() {
            return None;
        }
        Some(active[choice as usize - 1].id)
    }

    fn confirm_appointment(&mut self) {
        println!("\n--- Confirm Appointment ---");
        if let Some(id) = self.choose_appointment("confirm") {
            match self.scheduler.confirm(id) {
                Ok(apt) => println!("\nAppointment on {} at {} confirmed", apt.date, apt.start_time),
                Err(e) => self.report_error(&e),
            }
        }
    }

    fn cancel_appointment(&mut self) {
        println!("\n--- Cancel Appointment ---");
        if let Some(id) = self.choose_appointment("cancel") {
            let reason = self.get_input("Reason", None);
            match self.scheduler.cancel(id, &reason) {
                Ok(apt) => {
                    println!("\nAppointment for patient {} cancelled", apt.patient_id);
                    println!("Time slot is now available again");
                }
                Err(e) => self.report_error(&e),
            }
        }
    }

    fn reschedule_appointment(&mut self) {
        println!("\n--- Reschedule Appointment ---");
        if let Some(id) = self.choose_appointment("reschedule") {
            let date = self.get_date_input("New date");
            let start = self.get_time_input("New start time", "09:00");
            match self.scheduler.reschedule(id, date, start, None) {
                Ok(apt) => println!(
                    "\nRescheduled to {} {} - {}",
                    apt.date, apt.start_time, apt.end_time
                ),
                Err(e) => self.report_error(&e),
            }
        }
    }

    fn report_error(&self, err: &SchedulingError) {
        println!("\n{}", err);
        if let Some(details) = err.conflict() {
            for apt in &details.conflicts {
                println!(
                    "  Conflicts with {} - {} (patient {}, {})",
                    apt.start_time, apt.end_time, apt.patient_id, apt.status
                );
            }
            if details.alternatives.is_empty() {
                println!("  No alternatives within {} days", self.config.lookahead_days);
            } else {
                println!("  Alternatives:");
                for slot in &details.alternatives {
                    println!(
                        "    {} {} - {}",
                        slot.date.format("%a %Y-%m-%d"),
                        slot.start_time,
                        slot.end_time
                    );
                }
            }
        }
    }

    fn run_demo(&mut self) {
        println!("\n--- Running Demo ---");

        for (id, name, specialization) in [
            ("DEMO1", "Dr. Demo", "General Practice"),
            ("DEMO2", "Dr. Backup", "General Practice"),
        ] {
            if let Ok(doctor) = Doctor::new(id.to_string(), name.to_string(), specialization.to_string()) {
                self.directory.add(doctor);
            }
        }
        self.scheduler = Self::build_scheduler(&self.store, &self.directory, &self.config);

        let date = self.next_working_day();
        let nine = ClockTime::from_minutes(9 * 60);
        let quarter_past = ClockTime::from_minutes(9 * 60 + 15);

        println!("Booking John Smith with Dr. Demo on {} at 09:00", date);
        let first = match self
            .scheduler
            .create(NewAppointment::new("P001", "DEMO1", date, nine, "demo"))
        {
            Ok(apt) => apt,
            Err(e) => {
                self.report_error(&e);
                return;
            }
        };

        println!("\nBooking Jane Doe with Dr. Demo at 09:15 (overlaps)");
        if let Err(e) = self
            .scheduler
            .create(NewAppointment::new("P002", "DEMO1", date, quarter_past, "demo"))
        {
            self.report_error(&e);
        }

        println!("\nWho else is free 09:15 - 09:45?");
        if let Ok(doctors) = self.scheduler.find_available_doctors(
            date,
            quarter_past,
            quarter_past.add_minutes(30),
            None,
        ) {
            for doctor in doctors {
                println!("  {} ({})", doctor.name, doctor.doctor_id);
            }
        }

        println!("\nJohn Smith cancels; Jane Doe takes 09:00 instead");
        let rebooked = self
            .scheduler
            .cancel(first.id, "patient request")
            .and_then(|_| {
                self.scheduler
                    .create(NewAppointment::new("P002", "DEMO1", date, nine, "demo"))
            });
        match rebooked {
            Ok(apt) => println!("  Booked {} - {} ({})", apt.start_time, apt.end_time, apt.status),
            Err(e) => self.report_error(&e),
        }

        if let Ok(today) = self.scheduler.doctor_schedule("DEMO1", date, date) {
            let cancelled = self
                .scheduler
                .get_by_id(first.id)
                .map(|apt| apt.status == AppointmentStatus::Cancelled)
                .unwrap_or(false);
            println!(
                "\nDr. Demo has {} active appointment(s) on {} (original cancelled: {})",
                today.len(),
                date.format("%A"),
                cancelled
            );
        }
        info!("Demo finished for {}", date.weekday());
    }

    fn run(&mut self) {
        self.print_header();

        while self.running {
            self.print_menu();

            let choice = self.get_int_input("Enter choice", Some(9));

            match choice {
                1 => self.register_doctor(),
                2 => self.book_appointment(),
                3 => self.view_open_slots(),
                4 => self.view_schedule(),
                5 => self.find_doctors(),
                6 => self.confirm_appointment(),
                7 => self.cancel_appointment(),
                8 => self.reschedule_appointment(),
                9 => self.run_demo(),
                0 => {
                    self.running = false;
                    println!("\nGoodbye!");
                }
                _ => println!("Invalid choice"),
            }
        }
    }
}

fn load_config() -> SchedulerConfig {
    let Ok(path) = std::env::var(CONFIG_ENV) else {
        return SchedulerConfig::default();
    };
    match SchedulerConfig::from_json_file(&path) {
        Ok(config) => {
            info!("Loaded scheduler config from {}", path);
            config
        }
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let mut cli = AppointmentCLI::new(load_config());
    cli.run();
}

/// Last day of a schedule view of `days` days starting at `from`.
fn schedule_end(from: NaiveDate, days: i64) -> NaiveDate {
    let span = days.clamp(1, MAX_SCHEDULE_DAYS) - 1;
    from.checked_add_days(Days::new(span as u64)).unwrap_or(NaiveDate::MAX)
}
