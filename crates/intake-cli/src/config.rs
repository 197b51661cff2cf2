// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use intake_app::{EditorConfig, GenerateRequest};
use intake_tui::UiOptions;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_NAME: &str = "intake";

const CONFIG_VERSION: i64 = 2;
const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_CSRF_COOKIE: &str = "csrftoken";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub editor: Editor,
    #[serde(default)]
    pub generate: Generate,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            server: Server::default(),
            ui: Ui::default(),
            editor: Editor::default(),
            generate: Generate::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub base_url: Option<String>,
    pub timeout: Option<String>,
    pub session_cookie: Option<String>,
    pub csrf_cookie_name: Option<String>,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            base_url: Some(DEFAULT_BASE_URL.to_owned()),
            timeout: Some("5s".to_owned()),
            session_cookie: Some(String::new()),
            csrf_cookie_name: Some(DEFAULT_CSRF_COOKIE.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ui {
    pub min_query_length: Option<usize>,
    pub tag_placeholder: Option<bool>,
}

impl Default for Ui {
    fn default() -> Self {
        Self {
            min_query_length: Some(3),
            tag_placeholder: Some(true),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Editor {
    pub mode: Option<String>,
    pub callback_url: Option<String>,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub theme: Option<String>,
    pub autosave: Option<bool>,
    pub forcesave: Option<bool>,
}

impl Default for Editor {
    fn default() -> Self {
        Self {
            mode: Some("desktop".to_owned()),
            callback_url: Some(String::new()),
            user_id: Some(String::new()),
            user_name: Some(String::new()),
            theme: Some("theme-light".to_owned()),
            autosave: Some(true),
            forcesave: Some(true),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Generate {
    pub directory_path: Option<String>,
    pub file_extension: Option<String>,
}

impl Default for Generate {
    fn default() -> Self {
        Self {
            directory_path: Some("data".to_owned()),
            file_extension: Some("pdf".to_owned()),
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("INTAKE_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set INTAKE_CONFIG_PATH to the config file")
        })?;

        let app_dir = config_root.join(APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned for config v2. Add `version = 2` and move values under [server], [ui], [editor], and [generate]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 2. Migrate your config to the v2 schema",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if self.base_url().trim().is_empty() {
            bail!("server.base_url in {} must not be empty", path.display());
        }

        if let Some(timeout) = &self.server.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "server.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if let Some(min) = self.ui.min_query_length
            && min == 0
        {
            bail!(
                "ui.min_query_length in {} must be at least 1",
                path.display()
            );
        }

        if let Some(extension) = &self.generate.file_extension
            && extension.trim().is_empty()
        {
            bail!(
                "generate.file_extension in {} must not be empty",
                path.display()
            );
        }

        Ok(())
    }

    pub fn base_url(&self) -> &str {
        self.server
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    pub fn timeout(&self) -> Result<Duration> {
        parse_duration(self.server.timeout.as_deref().unwrap_or("5s"))
    }

    pub fn session_cookie(&self) -> &str {
        self.server.session_cookie.as_deref().unwrap_or("")
    }

    pub fn csrf_cookie_name(&self) -> &str {
        self.server
            .csrf_cookie_name
            .as_deref()
            .unwrap_or(DEFAULT_CSRF_COOKIE)
    }

    pub fn ui_options(&self) -> UiOptions {
        UiOptions {
            min_query_len: self.ui.min_query_length.unwrap_or(3),
            tag_placeholder: self.ui.tag_placeholder.unwrap_or(true),
        }
    }

    pub fn editor_config(&self) -> EditorConfig {
        let defaults = EditorConfig::default();
        EditorConfig {
            mode: self.editor.mode.clone().unwrap_or(defaults.mode),
            callback_url: self
                .editor
                .callback_url
                .clone()
                .unwrap_or(defaults.callback_url),
            user_id: self.editor.user_id.clone().unwrap_or(defaults.user_id),
            user_name: self.editor.user_name.clone().unwrap_or(defaults.user_name),
            theme: self.editor.theme.clone().unwrap_or(defaults.theme),
            autosave: self.editor.autosave.unwrap_or(defaults.autosave),
            forcesave: self.editor.forcesave.unwrap_or(defaults.forcesave),
        }
    }

    pub fn generate_request(&self) -> GenerateRequest {
        let defaults = GenerateRequest::default();
        GenerateRequest {
            directory_path: self
                .generate
                .directory_path
                .clone()
                .unwrap_or(defaults.directory_path),
            file_extension: self
                .generate
                .file_extension
                .clone()
                .unwrap_or(defaults.file_extension),
        }
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# intake config\n# Place this file at: {}\n\nversion = 2\n\n[server]\nbase_url = \"{}\"\ntimeout = \"5s\"\n# Paste the session cookies from a signed-in browser, e.g. \"sessionid=...; csrftoken=...\"\nsession_cookie = \"\"\ncsrf_cookie_name = \"{}\"\n\n[ui]\nmin_query_length = 3\ntag_placeholder = true\n\n[editor]\nmode = \"desktop\"\ncallback_url = \"\"\nuser_id = \"\"\nuser_name = \"\"\ntheme = \"theme-light\"\nautosave = true\nforcesave = true\n\n[generate]\ndirectory_path = \"data\"\nfile_extension = \"pdf\"\n",
            path.display(),
            DEFAULT_BASE_URL,
            DEFAULT_CSRF_COOKIE,
        )
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 5s)")
}
