// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Deterministic fixtures shared by the workspace test suites.

use intake_app::{
    DocumentDescriptor, PatientHit, PatientRecordId, SearchField, Suggestion, SuggestionRow,
};
use time::{Date, Month};

pub const CHIEF_COMPLAINTS: [&str; 16] = [
    "Abcess",
    "Abdominal pain",
    "Back pain",
    "Chest pain",
    "Cough",
    "Dizziness",
    "Fatigue",
    "Fever",
    "Headache",
    "Insomnia",
    "Nausea",
    "Neck pain",
    "Palpitations",
    "Rash",
    "Shortness of breath",
    "Sore throat",
];

pub const OCCUPATIONS: [&str; 14] = [
    "Accountant",
    "Carpenter",
    "Chef",
    "Electrician",
    "Farmer",
    "Firefighter",
    "Librarian",
    "Mechanic",
    "Nurse",
    "Pharmacist",
    "Plumber",
    "Teacher",
    "Truck driver",
    "Welder",
];

pub const SECRETARY_TAGS: [&str; 10] = [
    "Billing",
    "Follow-up",
    "Insurance pending",
    "Interpreter needed",
    "Lab results",
    "New patient",
    "Referral",
    "Urgent",
    "VIP",
    "Wheelchair access",
];

pub const FIRST_NAMES: [&str; 12] = [
    "Avery", "Jordan", "Taylor", "Riley", "Morgan", "Casey", "Alex", "Quinn", "Parker", "Drew",
    "Kai", "Rowan",
];

pub const LAST_NAMES: [&str; 12] = [
    "Walker", "Martin", "Hill", "Evans", "Lopez", "Gray", "Ward", "Young", "Diaz", "Reed",
    "Campbell", "Turner",
];

pub fn term_suggestion(id: i64, label: &str) -> Suggestion {
    Suggestion {
        id,
        label: label.to_owned(),
        row: SuggestionRow::Term,
    }
}

pub fn sample_patient_hit(id: i64, first_name: &str, last_name: &str) -> PatientHit {
    PatientHit {
        id: PatientRecordId::new(id),
        mrn: format!("{:06}", 100_000 + id),
        first_name: first_name.to_owned(),
        last_name: last_name.to_owned(),
        ssn: format!("***-**-{:04}", 1000 + id),
        date_of_birth: Date::from_calendar_date(1980, Month::January, 1).ok(),
    }
}

pub fn patient_suggestion(id: i64, first_name: &str, last_name: &str) -> Suggestion {
    Suggestion::from(sample_patient_hit(id, first_name, last_name))
}

pub fn sample_descriptor(key: &str) -> DocumentDescriptor {
    DocumentDescriptor {
        key: key.to_owned(),
        url: format!("https://docs.example/{key}"),
        token: format!("token-{key}"),
        title: format!("Document {key}"),
        permissions: serde_json::json!({ "edit": false, "download": true }),
        extension: "pdf".to_owned(),
        reference_data: String::new(),
    }
}

/// Case-insensitive contains over the fixture pools, capped at ten rows the
/// way the real search views are.
pub fn search_pool(field: SearchField, query: &str) -> Vec<Suggestion> {
    let query = query.to_ascii_lowercase();
    match field {
        SearchField::ChiefComplaint => filter_terms(&CHIEF_COMPLAINTS, &query),
        SearchField::Occupation => filter_terms(&OCCUPATIONS, &query),
        SearchField::SecretaryTags => filter_terms(&SECRETARY_TAGS, &query),
        SearchField::Patient => FIRST_NAMES
            .iter()
            .zip(LAST_NAMES.iter())
            .enumerate()
            .filter(|(_, (first, last))| {
                format!("{first} {last}").to_ascii_lowercase().contains(&query)
            })
            .take(10)
            .map(|(index, (first, last))| patient_suggestion(index as i64 + 1, first, last))
            .collect(),
    }
}

fn filter_terms(pool: &[&str], query: &str) -> Vec<Suggestion> {
    pool.iter()
        .enumerate()
        .filter(|(_, name)| name.to_ascii_lowercase().contains(query))
        .take(10)
        .map(|(index, name)| term_suggestion(index as i64 + 1, name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{search_pool, term_suggestion};
    use intake_app::SearchField;

    #[test]
    fn pool_search_is_case_insensitive_and_capped() {
        let hits = search_pool(SearchField::ChiefComplaint, "PAIN");
        assert!(!hits.is_empty());
        assert!(hits.len() <= 10);
        assert!(hits.iter().all(|hit| hit.label.to_lowercase().contains("pain")));
    }

    #[test]
    fn patient_pool_matches_on_full_name() {
        let hits = search_pool(SearchField::Patient, "avery w");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].label, "Avery Walker");
    }

    #[test]
    fn term_builder_assigns_requested_id() {
        assert_eq!(term_suggestion(7, "Fever").id, 7);
    }
}
