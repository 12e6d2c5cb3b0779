use chrono::NaiveDate;
use clinic_scheduler::{
    AppointmentFilter, AppointmentPatch, AppointmentScheduler, AppointmentStatus,
    AppointmentType, ClockTime, Doctor, FixedClock, InMemoryAppointmentStore,
    InMemoryDoctorDirectory, NewAppointment, SchedulerConfig, SchedulingError,
};
use std::sync::Arc;
use uuid::Uuid;

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

fn t(value: &str) -> ClockTime {
    value.parse().unwrap()
}

fn scheduler() -> AppointmentScheduler {
    let directory = InMemoryDoctorDirectory::with_doctors([
        Doctor::new("D1".into(), "Dr. Adams".into(), "Cardiology".into()).unwrap(),
        Doctor::new("D2".into(), "Dr. Baker".into(), "Cardiology".into()).unwrap(),
        Doctor::new("D3".into(), "Dr. Chen".into(), "Dermatology".into()).unwrap(),
    ]);
    let clock = FixedClock(monday().and_hms_opt(8, 40, 0).unwrap());
    AppointmentScheduler::new(
        Arc::new(InMemoryAppointmentStore::new()),
        Arc::new(directory),
        Arc::new(clock),
        SchedulerConfig::default(),
    )
}

fn booking(patient: &str, doctor: &str, start: &str) -> NewAppointment {
    NewAppointment::new(patient, doctor, monday(), t(start), "staff-1")
}

#[test]
fn overlapping_booking_is_rejected_with_conflicts_and_alternatives() {
    let scheduler = scheduler();
    let existing = scheduler.create(booking("P1", "D1", "09:00")).unwrap();

    let err = scheduler.create(booking("P2", "D1", "09:15")).unwrap_err();
    let details = err.conflict().expect("expected a conflict");

    assert_eq!(details.conflicts.len(), 1);
    assert_eq!(details.conflicts[0].id, existing.id);
    assert_eq!(
        details.reason,
        "Doctor has a conflicting appointment at 09:00-09:30"
    );
    assert!(details
        .alternatives
        .iter()
        .any(|slot| slot.date == monday() && slot.start_time >= t("09:30")));
    assert!(details
        .alternatives
        .iter()
        .all(|slot| !(slot.date == monday() && slot.start_time == t("09:15"))));
    assert_eq!(details.alternatives[0].start_time, t("09:30"));
}

#[test]
fn cancelled_slot_can_be_rebooked() {
    let scheduler = scheduler();
    let existing = scheduler.create(booking("P1", "D1", "09:00")).unwrap();

    let cancelled = scheduler.cancel(existing.id, "patient request").unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
    assert_eq!(cancelled.cancel_reason.as_deref(), Some("patient request"));
    assert!(cancelled.cancelled_at.is_some());

    let rebooked = scheduler.create(booking("P2", "D1", "09:00")).unwrap();
    assert_eq!(rebooked.end_time, t("09:30"));
}

#[test]
fn open_slots_cover_the_whole_window_for_an_idle_doctor() {
    let scheduler = scheduler();
    let slots = scheduler.check_availability("D1", monday(), 30).unwrap();
    assert_eq!(slots.len(), 39);
    assert_eq!(slots[0], t("08:00"));
    assert_eq!(slots[38], t("17:30"));

    let err = scheduler.check_availability("D1", monday(), 10).unwrap_err();
    assert!(matches!(err, SchedulingError::Validation(_)));
}

#[test]
fn different_doctors_do_not_conflict() {
    let scheduler = scheduler();
    scheduler.create(booking("P1", "D1", "09:00")).unwrap();
    scheduler.create(booking("P2", "D2", "09:00")).unwrap();
    scheduler.create(booking("P3", "D1", "09:30")).unwrap();
}

#[test]
fn create_validates_input() {
    let scheduler = scheduler();

    let err = scheduler
        .create(booking("P1", "D1", "09:00").with_duration(200))
        .unwrap_err();
    assert!(matches!(err, SchedulingError::Validation(_)));

    let err = scheduler.create(booking("", "D1", "09:00")).unwrap_err();
    assert!(matches!(err, SchedulingError::Validation(_)));

    let err = scheduler.create(booking("P1", "D9", "09:00")).unwrap_err();
    assert!(matches!(err, SchedulingError::NotFound { kind: "Doctor", .. }));
}

#[test]
fn reschedule_into_own_slot_succeeds_and_resets_state() {
    let scheduler = scheduler();
    let apt = scheduler.create(booking("P1", "D1", "09:00")).unwrap();
    scheduler.confirm(apt.id).unwrap();
    scheduler.mark_reminder_sent(apt.id).unwrap();

    let moved = scheduler
        .reschedule(apt.id, monday(), t("09:15"), None)
        .unwrap();
    assert_eq!(moved.start_time, t("09:15"));
    assert_eq!(moved.end_time, t("09:45"));
    assert_eq!(moved.status, AppointmentStatus::Scheduled);
    assert!(!moved.reminder_sent);
    assert_eq!(moved.patient_id, apt.patient_id);
    assert_eq!(moved.created_by, apt.created_by);
}

#[test]
fn reschedule_onto_another_booking_is_a_conflict() {
    let scheduler = scheduler();
    let first = scheduler.create(booking("P1", "D1", "09:00")).unwrap();
    let second = scheduler.create(booking("P2", "D1", "10:00")).unwrap();

    let err = scheduler
        .reschedule(second.id, monday(), t("09:00"), Some(45))
        .unwrap_err();
    let details = err.conflict().expect("expected a conflict");
    assert_eq!(details.conflicts[0].id, first.id);
    assert!(!details.alternatives.is_empty());
    // The moving appointment's own slot is offered back.
    assert!(details
        .alternatives
        .iter()
        .any(|slot| slot.start_time == t("09:30")));

    let unchanged = scheduler.get_by_id(second.id).unwrap();
    assert_eq!(unchanged.start_time, t("10:00"));
}

#[test]
fn status_machine_is_enforced() {
    let scheduler = scheduler();
    let apt = scheduler.create(booking("P1", "D1", "09:00")).unwrap();

    let err = scheduler.start(apt.id).unwrap_err();
    assert!(matches!(
        err,
        SchedulingError::InvalidTransition {
            from: AppointmentStatus::Scheduled,
            ..
        }
    ));

    scheduler.confirm(apt.id).unwrap();
    let err = scheduler.confirm(apt.id).unwrap_err();
    assert!(matches!(err, SchedulingError::InvalidTransition { .. }));

    scheduler.start(apt.id).unwrap();
    let done = scheduler.complete(apt.id).unwrap();
    assert_eq!(done.status, AppointmentStatus::Completed);
    assert!(done.completed_at.is_some());

    let err = scheduler.cancel(apt.id, "too late").unwrap_err();
    assert!(matches!(
        err,
        SchedulingError::AlreadyTerminal(AppointmentStatus::Completed)
    ));
    let err = scheduler
        .reschedule(apt.id, monday(), t("11:00"), None)
        .unwrap_err();
    assert!(matches!(err, SchedulingError::InvalidTransition { .. }));
}

#[test]
fn completed_and_no_show_keep_their_slot() {
    let scheduler = scheduler();
    let done = scheduler.create(booking("P1", "D1", "09:00")).unwrap();
    scheduler.complete(done.id).unwrap();
    let missed = scheduler.create(booking("P2", "D1", "10:00")).unwrap();
    scheduler.mark_no_show(missed.id).unwrap();

    assert!(scheduler.create(booking("P3", "D1", "09:00")).is_err());
    assert!(scheduler.create(booking("P3", "D1", "10:00")).is_err());
}

#[test]
fn cancel_requires_a_reason() {
    let scheduler = scheduler();
    let apt = scheduler.create(booking("P1", "D1", "09:00")).unwrap();

    let err = scheduler.cancel(apt.id, "   ").unwrap_err();
    assert!(matches!(err, SchedulingError::Validation(_)));
    assert_eq!(
        scheduler.get_by_id(apt.id).unwrap().status,
        AppointmentStatus::Scheduled
    );

    scheduler.cancel(apt.id, "sick").unwrap();
    let err = scheduler.cancel(apt.id, "again").unwrap_err();
    assert!(matches!(
        err,
        SchedulingError::AlreadyTerminal(AppointmentStatus::Cancelled)
    ));
}

#[test]
fn unknown_ids_are_not_found() {
    let scheduler = scheduler();
    let missing = Uuid::new_v4();
    assert!(matches!(
        scheduler.get_by_id(missing).unwrap_err(),
        SchedulingError::NotFound { kind: "Appointment", .. }
    ));
    assert!(matches!(
        scheduler.confirm(missing).unwrap_err(),
        SchedulingError::NotFound { .. }
    ));
    assert!(matches!(
        scheduler
            .reschedule(missing, monday(), t("09:00"), None)
            .unwrap_err(),
        SchedulingError::NotFound { .. }
    ));
}

#[test]
fn update_rechecks_only_when_the_slot_moves() {
    let scheduler = scheduler();
    let first = scheduler.create(booking("P1", "D1", "09:00")).unwrap();
    let second = scheduler.create(booking("P2", "D1", "09:30")).unwrap();

    let noted = scheduler
        .update(
            second.id,
            AppointmentPatch {
                notes: Some("bring x-rays".to_string()),
                appointment_type: Some(AppointmentType::Emergency),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(noted.notes.as_deref(), Some("bring x-rays"));
    assert_eq!(noted.appointment_type, AppointmentType::Emergency);

    let err = scheduler
        .update(
            first.id,
            AppointmentPatch {
                duration: Some(45),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert_eq!(err.conflict().unwrap().conflicts[0].id, second.id);

    let longer = scheduler
        .update(
            second.id,
            AppointmentPatch {
                duration: Some(60),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(longer.end_time, t("10:30"));
}

#[test]
fn update_cannot_move_an_in_progress_visit() {
    let scheduler = scheduler();
    let apt = scheduler.create(booking("P1", "D1", "09:00")).unwrap();
    scheduler.confirm(apt.id).unwrap();
    scheduler.start(apt.id).unwrap();

    let err = scheduler
        .update(
            apt.id,
            AppointmentPatch {
                start_time: Some(t("14:00")),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(
        err,
        SchedulingError::InvalidTransition {
            from: AppointmentStatus::InProgress,
            ..
        }
    ));

    let noted = scheduler
        .update(
            apt.id,
            AppointmentPatch {
                notes: Some("running late".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(noted.start_time, t("09:00"));
    assert_eq!(noted.status, AppointmentStatus::InProgress);
}

#[test]
fn list_paginates_most_recent_first() {
    let scheduler = scheduler();
    for start in ["09:00", "10:00", "11:00", "12:00", "13:00"] {
        scheduler.create(booking("P1", "D1", start)).unwrap();
    }
    scheduler.create(booking("P2", "D2", "09:00")).unwrap();

    let filter = AppointmentFilter {
        patient_id: Some("P1".to_string()),
        ..Default::default()
    };
    let page = scheduler.list(&filter, 1, 2).unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.total_pages, 3);
    let starts: Vec<ClockTime> = page.items.iter().map(|a| a.start_time).collect();
    assert_eq!(starts, vec![t("13:00"), t("12:00")]);

    let last = scheduler.list(&filter, 3, 2).unwrap();
    assert_eq!(last.items.len(), 1);

    assert!(matches!(
        scheduler.list(&filter, 0, 2).unwrap_err(),
        SchedulingError::Validation(_)
    ));
    assert!(matches!(
        scheduler.list(&filter, 1, 0).unwrap_err(),
        SchedulingError::Validation(_)
    ));
    assert!(matches!(
        scheduler.list(&filter, 1, 1000).unwrap_err(),
        SchedulingError::Validation(_)
    ));
    assert!(matches!(
        scheduler.list(&filter, usize::MAX, 10).unwrap_err(),
        SchedulingError::Validation(_)
    ));
    assert!(scheduler.list(&filter, 100, 10).unwrap().items.is_empty());
}

#[test]
fn doctor_schedule_skips_cancelled_and_validates_range() {
    let scheduler = scheduler();
    let tuesday = monday().succ_opt().unwrap();
    scheduler.create(booking("P1", "D1", "11:00")).unwrap();
    let dropped = scheduler.create(booking("P2", "D1", "09:00")).unwrap();
    scheduler
        .create(NewAppointment::new("P3", "D1", tuesday, t("08:00"), "staff-1"))
        .unwrap();
    scheduler.cancel(dropped.id, "duplicate").unwrap();

    let schedule = scheduler.doctor_schedule("D1", monday(), tuesday).unwrap();
    let slots: Vec<(NaiveDate, ClockTime)> =
        schedule.iter().map(|a| (a.date, a.start_time)).collect();
    assert_eq!(slots, vec![(monday(), t("11:00")), (tuesday, t("08:00"))]);

    let err = scheduler
        .doctor_schedule("D1", tuesday, monday())
        .unwrap_err();
    assert!(matches!(err, SchedulingError::Validation(_)));
}

#[test]
fn finds_free_doctors_and_validates_window() {
    let scheduler = scheduler();
    scheduler.create(booking("P1", "D2", "10:00")).unwrap();

    let free: Vec<String> = scheduler
        .find_available_doctors(monday(), t("10:00"), t("10:30"), Some("Cardiology"))
        .unwrap()
        .into_iter()
        .map(|d| d.doctor_id)
        .collect();
    assert_eq!(free, ["D1"]);

    let err = scheduler
        .find_available_doctors(monday(), t("10:30"), t("10:00"), None)
        .unwrap_err();
    assert!(matches!(err, SchedulingError::Validation(_)));
}

#[test]
fn upcoming_and_today_views() {
    let scheduler = scheduler();
    let wednesday = NaiveDate::from_ymd_opt(2026, 10, 21).unwrap();
    let next_week = NaiveDate::from_ymd_opt(2026, 10, 28).unwrap();

    // The fixed clock reads 08:40 on Monday.
    scheduler.create(booking("P1", "D1", "08:00")).unwrap();
    let later = scheduler.create(booking("P1", "D1", "09:00")).unwrap();
    let midweek = scheduler
        .create(NewAppointment::new("P2", "D1", wednesday, t("10:00"), "staff-1"))
        .unwrap();
    scheduler
        .create(NewAppointment::new("P1", "D1", next_week, t("10:00"), "staff-1"))
        .unwrap();
    let cancelled = scheduler.create(booking("P3", "D1", "11:00")).unwrap();
    scheduler.cancel(cancelled.id, "moved away").unwrap();

    let upcoming: Vec<Uuid> = scheduler
        .upcoming(Some("D1"), None, 7)
        .unwrap()
        .into_iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(upcoming, vec![later.id, midweek.id]);

    let for_patient = scheduler.upcoming(None, Some("P2"), 7).unwrap();
    assert_eq!(for_patient.len(), 1);

    let unbounded = scheduler.upcoming(Some("D1"), None, u32::MAX).unwrap();
    assert_eq!(unbounded.len(), 3);

    let today = scheduler.today("D1").unwrap();
    let starts: Vec<ClockTime> = today.iter().map(|a| a.start_time).collect();
    assert_eq!(starts, vec![t("08:00"), t("09:00")]);
}

#[test]
fn conflict_payload_serializes_for_clients() {
    let scheduler = scheduler();
    scheduler.create(booking("P1", "D1", "09:00")).unwrap();
    let err = scheduler.create(booking("P2", "D1", "09:00")).unwrap_err();

    let json = serde_json::to_value(err.conflict().unwrap()).unwrap();
    assert_eq!(json["conflicts"][0]["startTime"], "09:00");
    assert_eq!(json["conflicts"][0]["status"], "scheduled");
    assert_eq!(json["conflicts"][0]["type"], "consultation");
    assert!(json["alternatives"][0]["startTime"].is_string());
}
