/// Doctor lookup, consumed from the user-management collaborator.

use crate::models::Doctor;
use std::collections::BTreeMap;

pub trait DoctorDirectory: Send + Sync {
    fn doctor(&self, doctor_id: &str) -> Option<Doctor>;

    /// All doctors, optionally restricted to one specialization
    /// (case-insensitive).
    fn doctors(&self, specialization: Option<&str>) -> Vec<Doctor>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryDoctorDirectory {
    doctors: BTreeMap<String, Doctor>,
}

impl InMemoryDoctorDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_doctors(doctors: impl IntoIterator<Item = Doctor>) -> Self {
        let mut directory = Self::new();
        for doctor in doctors {
            directory.add(doctor);
        }
        directory
    }

    /// Add or replace a doctor.
    pub fn add(&mut self, doctor: Doctor) {
        self.doctors.insert(doctor.doctor_id.clone(), doctor);
    }

    pub fn len(&self) -> usize {
        self.doctors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doctors.is_empty()
    }
}

impl DoctorDirectory for InMemoryDoctorDirectory {
    fn doctor(&self, doctor_id: &str) -> Option<Doctor> {
        self.doctors.get(doctor_id).cloned()
    }

    fn doctors(&self, specialization: Option<&str>) -> Vec<Doctor> {
        self.doctors
            .values()
            .filter(|doctor| {
                specialization.map_or(true, |wanted| {
                    doctor.specialization.eq_ignore_ascii_case(wanted.trim())
                })
            })
            .cloned()
            .collect()
    }
}
