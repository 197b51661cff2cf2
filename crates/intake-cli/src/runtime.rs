// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use intake_app::{
    DocumentDescriptor, EditorConfig, EditorHost, EditorSession, GenerateRequest, PatientRecordId,
    SearchField, Suggestion,
};
use intake_http::ApiClient;
use intake_tui::{AppRuntime, GenerateEvent, InternalEvent, SearchEvent, UiOptions};
use std::sync::mpsc::Sender;
use std::thread;

/// Production runtime: every UI request goes to the records server. Searches
/// and generation run on worker threads so the UI thread never blocks on the
/// network; completions come back through the internal event channel.
pub struct HttpRuntime {
    client: ApiClient,
    ui: UiOptions,
    editor: EditorConfig,
    generate: GenerateRequest,
}

impl HttpRuntime {
    pub fn new(
        client: ApiClient,
        ui: UiOptions,
        editor: EditorConfig,
        generate: GenerateRequest,
    ) -> Self {
        Self {
            client,
            ui,
            editor,
            generate,
        }
    }
}

fn search_with(client: &ApiClient, field: SearchField, query: &str) -> Result<Vec<Suggestion>> {
    let suggestions = match field {
        SearchField::ChiefComplaint => client
            .search_chief_complaints(query)?
            .into_iter()
            .map(Suggestion::from)
            .collect(),
        SearchField::Occupation => client
            .search_occupations(query)?
            .into_iter()
            .map(Suggestion::from)
            .collect(),
        SearchField::Patient => client
            .search_patients(query)?
            .into_iter()
            .map(Suggestion::from)
            .collect(),
        SearchField::SecretaryTags => client
            .search_secretary_tags(query)?
            .into_iter()
            .map(Suggestion::from)
            .collect(),
    };
    Ok(suggestions)
}

impl AppRuntime for HttpRuntime {
    fn run_search(&mut self, field: SearchField, query: &str) -> Result<Vec<Suggestion>> {
        search_with(&self.client, field, query)
    }

    fn select_patient(&mut self, patient: PatientRecordId) -> Result<()> {
        let ack = self.client.select_patient(patient)?;
        tracing::debug!("patient {} selected: {ack}", patient.get());
        Ok(())
    }

    /// The server renders pre-existing document entries into its own pages;
    /// there is no listing endpoint, so a session starts with an empty list
    /// that grows through generation.
    fn list_documents(&mut self) -> Result<Vec<DocumentDescriptor>> {
        Ok(Vec::new())
    }

    fn run_generate(&mut self, request: &GenerateRequest) -> Result<DocumentDescriptor> {
        self.client.generate_document(request)
    }

    fn instantiate_editor(
        &mut self,
        descriptor: &DocumentDescriptor,
        config: &EditorConfig,
    ) -> Result<EditorSession> {
        EditorHost::instantiate(&mut self.client, descriptor, config)
    }

    fn ui_options(&mut self) -> UiOptions {
        self.ui
    }

    fn editor_config(&mut self) -> EditorConfig {
        self.editor.clone()
    }

    fn generate_request(&mut self) -> GenerateRequest {
        self.generate.clone()
    }

    fn spawn_search(
        &mut self,
        field: SearchField,
        request_id: u64,
        query: &str,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let client = self.client.clone();
        let query = query.to_owned();
        thread::spawn(move || {
            let event = match search_with(&client, field, &query) {
                Ok(items) => InternalEvent::Search(SearchEvent::Completed {
                    field,
                    request_id,
                    items,
                }),
                Err(error) => InternalEvent::Search(SearchEvent::Failed {
                    field,
                    request_id,
                    error: format!("{error:#}"),
                }),
            };
            let _ = tx.send(event);
        });
        Ok(())
    }

    fn spawn_generate(
        &mut self,
        request: &GenerateRequest,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let client = self.client.clone();
        let request = request.clone();
        thread::spawn(move || {
            let event = match client.generate_document(&request) {
                Ok(descriptor) => InternalEvent::Generate(GenerateEvent::Completed { descriptor }),
                Err(error) => InternalEvent::Generate(GenerateEvent::Failed {
                    error: format!("{error:#}"),
                }),
            };
            let _ = tx.send(event);
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::HttpRuntime;
    use anyhow::{Result, anyhow};
    use intake_app::{EditorConfig, GenerateRequest, SearchField};
    use intake_http::ApiClient;
    use intake_tui::{AppRuntime, InternalEvent, SearchEvent, UiOptions};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;
    use tiny_http::{Header, Response, Server};

    fn runtime_for(addr: &str) -> Result<HttpRuntime> {
        let client = ApiClient::new(addr, Duration::from_secs(1), "", "csrftoken")?;
        Ok(HttpRuntime::new(
            client,
            UiOptions::default(),
            EditorConfig::default(),
            GenerateRequest::default(),
        ))
    }

    #[test]
    fn spawned_search_reports_completion_through_channel() -> Result<()> {
        let server =
            Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
        let addr = format!("http://{}", server.server_addr());

        let handle = thread::spawn(move || {
            let request = server.recv().expect("request expected");
            assert_eq!(request.url(), "/identity/occupation-search/?q=nur");
            let response = Response::from_string(r#"[{"id":4,"name":"Nurse"}]"#)
                .with_status_code(200)
                .with_header(
                    Header::from_bytes("Content-Type", "application/json")
                        .expect("valid content type header"),
                );
            request.respond(response).expect("response should succeed");
        });

        let mut runtime = runtime_for(&addr)?;
        let (tx, rx) = mpsc::channel();
        runtime.spawn_search(SearchField::Occupation, 7, "nur", tx)?;

        let event = rx
            .recv_timeout(Duration::from_secs(2))
            .expect("search completion should arrive");
        match event {
            InternalEvent::Search(SearchEvent::Completed {
                field,
                request_id,
                items,
            }) => {
                assert_eq!(field, SearchField::Occupation);
                assert_eq!(request_id, 7);
                assert_eq!(items.len(), 1);
                assert_eq!(items[0].label, "Nurse");
            }
            other => panic!("unexpected event: {other:?}"),
        }

        handle.join().expect("server thread should join");
        Ok(())
    }

    #[test]
    fn spawned_search_failure_reports_field_and_request_id() -> Result<()> {
        let mut runtime = runtime_for("http://127.0.0.1:1")?;
        let (tx, rx) = mpsc::channel();
        runtime.spawn_search(SearchField::Patient, 3, "wal", tx)?;

        let event = rx
            .recv_timeout(Duration::from_secs(2))
            .expect("search failure should arrive");
        match event {
            InternalEvent::Search(SearchEvent::Failed {
                field, request_id, ..
            }) => {
                assert_eq!(field, SearchField::Patient);
                assert_eq!(request_id, 3);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn document_list_starts_empty() -> Result<()> {
        let mut runtime = runtime_for("http://127.0.0.1:1")?;
        assert!(runtime.list_documents()?.is_empty());
        Ok(())
    }
}
