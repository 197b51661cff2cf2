// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use time::Date;

use crate::ids::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchField {
    ChiefComplaint,
    Occupation,
    Patient,
    SecretaryTags,
}

impl SearchField {
    pub const ALL: [Self; 4] = [
        Self::ChiefComplaint,
        Self::Occupation,
        Self::Patient,
        Self::SecretaryTags,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::ChiefComplaint => "chief complaint",
            Self::Occupation => "occupation",
            Self::Patient => "patient",
            Self::SecretaryTags => "secretary tags",
        }
    }
}

/// One selectable row in a typeahead dropdown. `id` is what a commit writes
/// into the bound selection target; `label` is the visible string; `row`
/// keeps the full server record where it is richer than a plain term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub id: i64,
    pub label: String,
    pub row: SuggestionRow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuggestionRow {
    Term,
    Patient(PatientHit),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChiefComplaintHit {
    pub id: ChiefComplaintId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupationHit {
    pub id: OccupationId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretaryTagHit {
    pub id: SecretaryTagId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientHit {
    pub id: PatientRecordId,
    pub mrn: String,
    pub first_name: String,
    pub last_name: String,
    pub ssn: String,
    pub date_of_birth: Option<Date>,
}

impl PatientHit {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl From<ChiefComplaintHit> for Suggestion {
    fn from(hit: ChiefComplaintHit) -> Self {
        Self {
            id: hit.id.get(),
            label: hit.name,
            row: SuggestionRow::Term,
        }
    }
}

impl From<OccupationHit> for Suggestion {
    fn from(hit: OccupationHit) -> Self {
        Self {
            id: hit.id.get(),
            label: hit.name,
            row: SuggestionRow::Term,
        }
    }
}

impl From<SecretaryTagHit> for Suggestion {
    fn from(hit: SecretaryTagHit) -> Self {
        Self {
            id: hit.id.get(),
            label: hit.name,
            row: SuggestionRow::Term,
        }
    }
}

impl From<PatientHit> for Suggestion {
    fn from(hit: PatientHit) -> Self {
        Self {
            id: hit.id.get(),
            label: hit.display_name(),
            row: SuggestionRow::Patient(hit),
        }
    }
}

/// Everything needed to open one document in the panel. `permissions` is an
/// opaque blob owned by the external editor contract and passed through
/// untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentDescriptor {
    pub key: String,
    pub url: String,
    pub token: String,
    pub title: String,
    pub permissions: serde_json::Value,
    pub extension: String,
    #[serde(default)]
    pub reference_data: String,
}

/// Opaque configuration block for the external document editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorConfig {
    pub mode: String,
    pub callback_url: String,
    pub user_id: String,
    pub user_name: String,
    pub theme: String,
    pub autosave: bool,
    pub forcesave: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            mode: "desktop".to_owned(),
            callback_url: String::new(),
            user_id: String::new(),
            user_name: String::new(),
            theme: "theme-light".to_owned(),
            autosave: true,
            forcesave: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub directory_path: String,
    pub file_extension: String,
}

impl Default for GenerateRequest {
    fn default() -> Self {
        Self {
            directory_path: "data".to_owned(),
            file_extension: "pdf".to_owned(),
        }
    }
}
