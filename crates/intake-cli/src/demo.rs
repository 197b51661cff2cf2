// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use intake_app::{
    DocumentDescriptor, EditorConfig, EditorSession, GenerateRequest, PatientHit, PatientRecordId,
    SearchField, Suggestion,
};
use intake_tui::AppRuntime;

const DEMO_COMPLAINTS: [&str; 8] = [
    "Abcess",
    "Abdominal pain",
    "Chest pain",
    "Cough",
    "Fever",
    "Headache",
    "Rash",
    "Sore throat",
];

const DEMO_OCCUPATIONS: [&str; 6] = [
    "Carpenter",
    "Chef",
    "Electrician",
    "Nurse",
    "Teacher",
    "Welder",
];

const DEMO_TAGS: [&str; 6] = [
    "Billing",
    "Follow-up",
    "New patient",
    "Referral",
    "Urgent",
    "VIP",
];

const DEMO_PATIENTS: [(&str, &str); 6] = [
    ("Avery", "Walker"),
    ("Jordan", "Martin"),
    ("Taylor", "Hill"),
    ("Riley", "Evans"),
    ("Morgan", "Lopez"),
    ("Casey", "Gray"),
];

/// Offline runtime for `--demo`: canned clinical data, no server. The default
/// synchronous `spawn_*` methods are kept on purpose so the demo behaves
/// deterministically.
#[derive(Debug, Default)]
pub struct DemoRuntime {
    generated: usize,
}

impl DemoRuntime {
    pub fn new() -> Self {
        Self::default()
    }
}

fn filter_terms(pool: &[&str], query: &str) -> Vec<Suggestion> {
    let query = query.to_ascii_lowercase();
    pool.iter()
        .enumerate()
        .filter(|(_, name)| name.to_ascii_lowercase().contains(&query))
        .take(10)
        .map(|(index, name)| Suggestion {
            id: index as i64 + 1,
            label: (*name).to_owned(),
            row: intake_app::SuggestionRow::Term,
        })
        .collect()
}

impl AppRuntime for DemoRuntime {
    fn run_search(&mut self, field: SearchField, query: &str) -> Result<Vec<Suggestion>> {
        let suggestions = match field {
            SearchField::ChiefComplaint => filter_terms(&DEMO_COMPLAINTS, query),
            SearchField::Occupation => filter_terms(&DEMO_OCCUPATIONS, query),
            SearchField::SecretaryTags => filter_terms(&DEMO_TAGS, query),
            SearchField::Patient => {
                let query = query.to_ascii_lowercase();
                DEMO_PATIENTS
                    .iter()
                    .enumerate()
                    .filter(|(_, (first, last))| {
                        format!("{first} {last}").to_ascii_lowercase().contains(&query)
                    })
                    .map(|(index, (first, last))| {
                        let id = index as i64 + 1;
                        Suggestion::from(PatientHit {
                            id: PatientRecordId::new(id),
                            mrn: format!("{:06}", 100_000 + id),
                            first_name: (*first).to_owned(),
                            last_name: (*last).to_owned(),
                            ssn: format!("***-**-{:04}", 1000 + id),
                            date_of_birth: None,
                        })
                    })
                    .collect()
            }
        };
        Ok(suggestions)
    }

    fn select_patient(&mut self, patient: PatientRecordId) -> Result<()> {
        tracing::info!("demo: patient {} selected", patient.get());
        Ok(())
    }

    fn list_documents(&mut self) -> Result<Vec<DocumentDescriptor>> {
        Ok(vec![DocumentDescriptor {
            key: "demo-referral".to_owned(),
            url: "https://docs.invalid/demo-referral".to_owned(),
            token: "demo".to_owned(),
            title: "Referral Letter".to_owned(),
            permissions: serde_json::Value::Null,
            extension: "pdf".to_owned(),
            reference_data: String::new(),
        }])
    }

    fn run_generate(&mut self, request: &GenerateRequest) -> Result<DocumentDescriptor> {
        self.generated += 1;
        let key = format!("demo-generated-{}", self.generated);
        Ok(DocumentDescriptor {
            url: format!("https://docs.invalid/{key}"),
            token: "demo".to_owned(),
            title: format!("Generated Document {}", self.generated),
            permissions: serde_json::Value::Null,
            extension: request.file_extension.clone(),
            reference_data: String::new(),
            key,
        })
    }

    fn instantiate_editor(
        &mut self,
        descriptor: &DocumentDescriptor,
        _config: &EditorConfig,
    ) -> Result<EditorSession> {
        Ok(EditorSession {
            preview: format!(
                "{}\n\n(demo preview; the real client fetches the {} document here)",
                descriptor.title, descriptor.extension
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::DemoRuntime;
    use anyhow::Result;
    use intake_app::{GenerateRequest, SearchField};
    use intake_tui::AppRuntime;

    #[test]
    fn demo_search_filters_case_insensitively() -> Result<()> {
        let mut runtime = DemoRuntime::new();
        let hits = runtime.run_search(SearchField::ChiefComplaint, "ABD")?;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].label, "Abdominal pain");
        Ok(())
    }

    #[test]
    fn demo_patient_search_matches_full_name() -> Result<()> {
        let mut runtime = DemoRuntime::new();
        let hits = runtime.run_search(SearchField::Patient, "jordan m")?;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].label, "Jordan Martin");
        Ok(())
    }

    #[test]
    fn demo_generation_yields_unique_keys() -> Result<()> {
        let mut runtime = DemoRuntime::new();
        let first = runtime.run_generate(&GenerateRequest::default())?;
        let second = runtime.run_generate(&GenerateRequest::default())?;
        assert_ne!(first.key, second.key);
        Ok(())
    }
}
