// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use intake_app::{
    ChiefComplaintHit, ChiefComplaintId, DocumentDescriptor, EditorConfig, EditorHost,
    EditorSession, GenerateRequest, OccupationHit, OccupationId, PatientHit, PatientRecordId,
    SecretaryTagHit, SecretaryTagId,
};
use reqwest::StatusCode;
use reqwest::blocking::Client as HttpClient;
use reqwest::cookie::{CookieStore, Jar};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use time::Date;
use time::macros::format_description;
use url::Url;

pub const SEARCH_CHIEF_COMPLAINTS_PATH: &str = "/ccpi/search-cc/";
pub const SEARCH_OCCUPATIONS_PATH: &str = "/identity/occupation-search/";
pub const SEARCH_SECRETARY_TAGS_PATH: &str = "/identity/secretary-tags-search/";
pub const SEARCH_PATIENTS_PATH: &str = "/my_dashboard/patient-search/";
pub const SELECT_PATIENT_PATH: &str = "/my_dashboard/select-patient/";
pub const GENERATE_DOCUMENT_PATH: &str = "/oneglance/generate-document/";

/// Longest editor preview kept in memory, in characters.
const PREVIEW_LIMIT: usize = 4_000;

/// Blocking client for the records server. Search endpoints return JSON
/// arrays; every record is validated into its typed hit at this boundary.
#[derive(Clone)]
pub struct ApiClient {
    base: Url,
    csrf_cookie: String,
    jar: Arc<Jar>,
    http: HttpClient,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        session_cookies: &str,
        csrf_cookie_name: &str,
    ) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/');
        if base_url.is_empty() {
            bail!("server.base_url must not be empty");
        }
        if csrf_cookie_name.trim().is_empty() {
            bail!("server.csrf_cookie_name must not be empty");
        }
        let base: Url = base_url
            .parse()
            .with_context(|| format!("parse server.base_url {base_url:?}"))?;

        let jar = Arc::new(Jar::default());
        for cookie in session_cookies.split(';') {
            let cookie = cookie.trim();
            if !cookie.is_empty() {
                jar.add_cookie_str(cookie, &base);
            }
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .cookie_provider(jar.clone())
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base,
            csrf_cookie: csrf_cookie_name.to_owned(),
            jar,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    pub fn search_chief_complaints(&self, query: &str) -> Result<Vec<ChiefComplaintHit>> {
        let records: Vec<ChiefComplaintRecord> =
            self.get_search(SEARCH_CHIEF_COMPLAINTS_PATH, query)?;
        records.into_iter().map(TryInto::try_into).collect()
    }

    pub fn search_occupations(&self, query: &str) -> Result<Vec<OccupationHit>> {
        let records: Vec<NamedRecord> = self.get_search(SEARCH_OCCUPATIONS_PATH, query)?;
        records
            .into_iter()
            .map(|record| {
                Ok(OccupationHit {
                    id: OccupationId::new(record.id),
                    name: record.name,
                })
            })
            .collect()
    }

    pub fn search_secretary_tags(&self, query: &str) -> Result<Vec<SecretaryTagHit>> {
        let records: Vec<NamedRecord> = self.get_search(SEARCH_SECRETARY_TAGS_PATH, query)?;
        records
            .into_iter()
            .map(|record| {
                Ok(SecretaryTagHit {
                    id: SecretaryTagId::new(record.id),
                    name: record.name,
                })
            })
            .collect()
    }

    pub fn search_patients(&self, query: &str) -> Result<Vec<PatientHit>> {
        let records: Vec<PatientRecord> = self.get_search(SEARCH_PATIENTS_PATH, query)?;
        records.into_iter().map(TryInto::try_into).collect()
    }

    /// Saves the selected patient in the server session. The CSRF token is
    /// read from the cookie jar and echoed back as a header; the caller is
    /// expected to reload its session view on success.
    pub fn select_patient(&self, patient_id: PatientRecordId) -> Result<serde_json::Value> {
        let token = self.csrf_token().ok_or_else(|| {
            anyhow!(
                "no {:?} cookie in the session -- set [server].session_cookie from a signed-in browser and retry",
                self.csrf_cookie
            )
        })?;

        let url = self.endpoint(SELECT_PATIENT_PATH)?;
        let response = self
            .http
            .post(url)
            .header("X-CSRFToken", token)
            .json(&serde_json::json!({ "patient_id": patient_id.get() }))
            .send()
            .map_err(|error| connection_error(self.base.as_str(), error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }
        response.json().context("decode select-patient acknowledgment")
    }

    /// Asks the server to generate a new document. A well-formed response
    /// with an `error` field is a business failure and maps to `Err`.
    pub fn generate_document(&self, request: &GenerateRequest) -> Result<DocumentDescriptor> {
        let mut url = self.endpoint(GENERATE_DOCUMENT_PATH)?;
        url.query_pairs_mut()
            .append_pair("directory_path", &request.directory_path)
            .append_pair("file_extension", &request.file_extension);

        let response = self
            .http
            .get(url)
            .header("X-Requested-With", "XMLHttpRequest")
            .send()
            .map_err(|error| connection_error(self.base.as_str(), error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }

        let record: GenerateRecord = response.json().context("decode generation response")?;
        if let Some(error) = record.error {
            bail!("document generation failed: {error}");
        }
        record.into_descriptor(&request.file_extension)
    }

    fn get_search<T: DeserializeOwned>(&self, path: &str, query: &str) -> Result<Vec<T>> {
        let mut url = self.endpoint(path)?;
        url.query_pairs_mut().append_pair("q", query);

        let response = self
            .http
            .get(url)
            .header("X-Requested-With", "XMLHttpRequest")
            .send()
            .map_err(|error| connection_error(self.base.as_str(), error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }

        response
            .json()
            .with_context(|| format!("decode search response from {path}"))
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .with_context(|| format!("build endpoint URL for {path}"))
    }

    fn csrf_token(&self) -> Option<String> {
        let header = self.jar.cookies(&self.base)?;
        let cookies = header.to_str().ok()?;
        cookies.split(';').find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == self.csrf_cookie).then(|| value.to_owned())
        })
    }
}

impl EditorHost for ApiClient {
    /// Binds an editor session by fetching the document with its bearer
    /// token. The editor configuration block is owned by the external editor
    /// contract; the fetch itself only needs the descriptor.
    fn instantiate(
        &mut self,
        descriptor: &DocumentDescriptor,
        _config: &EditorConfig,
    ) -> Result<EditorSession> {
        let response = self
            .http
            .get(&descriptor.url)
            .bearer_auth(&descriptor.token)
            .send()
            .map_err(|error| connection_error(&descriptor.url, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }

        let bytes = response.bytes().context("read document body")?;
        let preview = match std::str::from_utf8(&bytes) {
            Ok(text) => text.chars().take(PREVIEW_LIMIT).collect(),
            Err(_) => format!(
                "{} document, {} bytes (no text preview)",
                descriptor.extension,
                bytes.len()
            ),
        };
        Ok(EditorSession { preview })
    }
}

#[derive(Debug, Deserialize)]
struct NamedRecord {
    id: i64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ChiefComplaintRecord {
    id: i64,
    #[serde(default)]
    fname: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl TryFrom<ChiefComplaintRecord> for ChiefComplaintHit {
    type Error = anyhow::Error;

    fn try_from(record: ChiefComplaintRecord) -> Result<Self> {
        let name = [record.fname, record.name]
            .into_iter()
            .flatten()
            .find(|value| !value.trim().is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "chief complaint record {} has neither fname nor name",
                    record.id
                )
            })?;
        Ok(Self {
            id: ChiefComplaintId::new(record.id),
            name,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MrnValue {
    Number(i64),
    Text(String),
}

impl MrnValue {
    fn into_string(self) -> String {
        match self {
            Self::Number(value) => value.to_string(),
            Self::Text(value) => value,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PatientRecord {
    id: i64,
    patient_id: MrnValue,
    first_name: String,
    last_name: String,
    ssn: String,
    #[serde(default)]
    date_of_birth: Option<String>,
}

impl TryFrom<PatientRecord> for PatientHit {
    type Error = anyhow::Error;

    fn try_from(record: PatientRecord) -> Result<Self> {
        let date_of_birth = record
            .date_of_birth
            .as_deref()
            .filter(|raw| !raw.is_empty())
            .map(|raw| {
                Date::parse(raw, format_description!("[year]-[month]-[day]"))
                    .with_context(|| format!("parse date_of_birth {raw:?}"))
            })
            .transpose()?;
        Ok(Self {
            id: PatientRecordId::new(record.id),
            mrn: record.patient_id.into_string(),
            first_name: record.first_name,
            last_name: record.last_name,
            ssn: record.ssn,
            date_of_birth,
        })
    }
}

#[derive(Debug, Deserialize)]
struct GenerateRecord {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default, alias = "label")]
    title: Option<String>,
    #[serde(default)]
    extension: Option<String>,
    #[serde(default, alias = "perms")]
    permissions: Option<serde_json::Value>,
    #[serde(default)]
    reference_data: Option<String>,
}

impl GenerateRecord {
    fn into_descriptor(self, default_extension: &str) -> Result<DocumentDescriptor> {
        let key = self
            .key
            .ok_or_else(|| anyhow!("generation response is missing key"))?;
        let url = self
            .url
            .ok_or_else(|| anyhow!("generation response is missing url"))?;
        let token = self
            .token
            .ok_or_else(|| anyhow!("generation response is missing token"))?;
        let title = self
            .title
            .ok_or_else(|| anyhow!("generation response is missing title/label"))?;
        Ok(DocumentDescriptor {
            key,
            url,
            token,
            title,
            permissions: self.permissions.unwrap_or(serde_json::Value::Null),
            extension: self.extension.unwrap_or_else(|| default_extension.to_owned()),
            reference_data: self.reference_data.unwrap_or_default(),
        })
    }
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    anyhow!(
        "cannot reach {} -- check [server].base_url and your network ({})",
        base_url,
        error
    )
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body) {
        if let Some(error) = parsed.error.filter(|message| !message.is_empty()) {
            return anyhow!("server error ({}): {}", status.as_u16(), error);
        }
        if let Some(detail) = parsed.detail.filter(|message| !message.is_empty()) {
            return anyhow!("server error ({}): {}", status.as_u16(), detail);
        }
    }

    if body.len() < 100 && !body.contains('{') {
        return anyhow!("server error ({}): {}", status.as_u16(), body);
    }

    anyhow!("server returned {}", status.as_u16())
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}
