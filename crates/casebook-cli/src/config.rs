// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use casebook_app::{DEFAULT_TABLES, ScopeId, TableDescriptor};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_NAME: &str = "casebook";
const CONFIG_VERSION: i64 = 1;
const DEFAULT_TIMEOUT: &str = "10s";
const DEFAULT_LOG_LEVEL: &str = "info";
const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];
pub const API_KEY_ENV: &str = "CASEBOOK_API_KEY";
const CONFIG_PATH_ENV: &str = "CASEBOOK_CONFIG_PATH";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub backend: BackendSection,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            backend: BackendSection::default(),
            ui: Ui::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendSection {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Option<String>,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            timeout: Some(DEFAULT_TIMEOUT.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ui {
    pub tables: Option<Vec<String>>,
    pub default_table: Option<String>,
    pub scope_id: Option<ScopeId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    pub level: Option<String>,
    pub path: Option<String>,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: Some(DEFAULT_LOG_LEVEL.to_owned()),
            path: None,
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set {CONFIG_PATH_ENV} to the config file")
        })?;
        Ok(config_root.join(APP_NAME).join("config.toml"))
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
                    "config file {} is not versioned. Add `version = 1` and put values under [backend], [ui], and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
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
        if let Some(url) = &self.backend.url {
            let trimmed = url.trim();
            if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
                bail!(
                    "backend.url in {} must start with http:// or https://, got {url:?}",
                    path.display()
                );
            }
        }

        if let Some(timeout) = &self.backend.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "backend.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if let Some(tables) = &self.ui.tables {
            if tables.is_empty() {
                bail!(
                    "ui.tables in {} is empty -- list at least one table or remove the key",
                    path.display()
                );
            }
            let mut seen = BTreeSet::new();
            for table in tables {
                validate_table_name(table)
                    .with_context(|| format!("ui.tables in {}", path.display()))?;
                if !seen.insert(table.trim().to_ascii_lowercase()) {
                    bail!("ui.tables in {} lists {table:?} twice", path.display());
                }
            }
        }

        if let Some(default_table) = &self.ui.default_table
            && !self
                .table_names()
                .iter()
                .any(|name| name.eq_ignore_ascii_case(default_table.trim()))
        {
            bail!(
                "ui.default_table {default_table:?} in {} is not one of ui.tables",
                path.display()
            );
        }

        if let Some(level) = &self.log.level
            && !LOG_LEVELS.contains(&level.trim().to_ascii_lowercase().as_str())
        {
            bail!(
                "log.level in {} must be one of {}, got {level:?}",
                path.display(),
                LOG_LEVELS.join(", ")
            );
        }

        Ok(())
    }

    pub fn backend_url(&self) -> Result<&str> {
        match self.backend.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Ok(url),
            _ => bail!(
                "backend.url is not set -- add it under [backend] or run with --demo to try the app"
            ),
        }
    }

    /// The configured key, falling back to `CASEBOOK_API_KEY`.
    pub fn api_key(&self) -> String {
        match self.backend.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => key.to_owned(),
            _ => env::var(API_KEY_ENV).unwrap_or_default(),
        }
    }

    pub fn timeout(&self) -> Result<Duration> {
        parse_duration(self.backend.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))
    }

    pub fn table_names(&self) -> Vec<String> {
        match &self.ui.tables {
            Some(tables) => tables.iter().map(|name| name.trim().to_owned()).collect(),
            None => DEFAULT_TABLES.iter().map(|name| (*name).to_owned()).collect(),
        }
    }

    /// One descriptor per configured table; `scope` overrides `ui.scope_id`.
    pub fn tables(&self, scope: Option<ScopeId>) -> Vec<TableDescriptor> {
        let scope = scope.or_else(|| self.ui.scope_id.clone());
        self.table_names()
            .iter()
            .map(|name| TableDescriptor::new(name).with_scope(scope.clone()))
            .collect()
    }

    pub fn default_table(&self) -> Option<&str> {
        self.ui.default_table.as_deref().map(str::trim)
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL).trim()
    }

    pub fn log_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.log.path {
            return Ok(PathBuf::from(path));
        }
        let data_root = dirs::data_local_dir().ok_or_else(|| {
            anyhow!("cannot resolve data directory; set [log].path in the config file")
        })?;
        Ok(data_root.join(APP_NAME).join("casebook.log"))
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# casebook config\n# Place this file at: {}\n\nversion = 1\n\n[backend]\n# Project URL; requests go to <url>/rest/v1/\nurl = \"https://your-project.supabase.co\"\n# Optional. Falls back to the {} environment variable.\n# api_key = \"...\"\ntimeout = \"{}\"\n\n[ui]\ntables = [{}]\n# default_table = \"students\"\n# Restrict every table to one center.\n# scope_id = 1\n\n[log]\nlevel = \"{}\"\n# path = \"/absolute/path/to/casebook.log\"\n",
            path.display(),
            API_KEY_ENV,
            DEFAULT_TIMEOUT,
            DEFAULT_TABLES
                .iter()
                .map(|name| format!("\"{name}\""))
                .collect::<Vec<_>>()
                .join(", "),
            DEFAULT_LOG_LEVEL,
        )
    }
}

fn validate_table_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        bail!("table names must not be empty");
    }
    if !trimmed
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
    {
        bail!("table name {name:?} may only contain letters, digits, and underscores");
    }
    Ok(())
}

pub fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
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

#[cfg(test)]
mod tests {
    use super::{API_KEY_ENV, Config, parse_duration};
    use anyhow::Result;
    use casebook_app::ScopeId;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    fn write_config(content: &str) -> Result<(tempfile::TempDir, PathBuf)> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, content)?;
        Ok((temp, path))
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[test]
    fn missing_config_uses_defaults() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let config = Config::load(&temp.path().join("missing.toml"))?;
        assert_eq!(config.version, 1);
        assert_eq!(config.table_names(), vec!["students", "educators", "employees"]);
        assert_eq!(config.timeout()?, Duration::from_secs(10));
        assert_eq!(config.log_level(), "info");
        assert!(config.default_table().is_none());
        Ok(())
    }

    #[test]
    fn unversioned_config_is_rejected_with_actionable_message() -> Result<()> {
        let (_temp, path) = write_config("[backend]\nurl = \"https://demo.supabase.co\"\n")?;
        let error = Config::load(&path).expect_err("unversioned config should fail");
        let message = error.to_string();
        assert!(message.contains("version = 1"));
        assert!(message.contains("[backend], [ui], and [log]"));
        Ok(())
    }

    #[test]
    fn full_config_parses() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\n[backend]\nurl = \"https://demo.supabase.co\"\napi_key = \"anon\"\ntimeout = \"500ms\"\n[ui]\ntables = [\"students\", \"educators\"]\ndefault_table = \"educators\"\nscope_id = 4\n[log]\nlevel = \"debug\"\npath = \"/tmp/casebook-test.log\"\n",
        )?;

        let config = Config::load(&path)?;
        assert_eq!(config.backend_url()?, "https://demo.supabase.co");
        assert_eq!(config.api_key(), "anon");
        assert_eq!(config.timeout()?, Duration::from_millis(500));
        assert_eq!(config.default_table(), Some("educators"));
        assert_eq!(config.log_level(), "debug");
        assert_eq!(config.log_path()?, PathBuf::from("/tmp/casebook-test.log"));

        let tables = config.tables(None);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].scope_id, Some(ScopeId::from(4)));
        Ok(())
    }

    #[test]
    fn cli_scope_overrides_configured_scope() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[ui]\nscope_id = 4\n")?;
        let config = Config::load(&path)?;
        let tables = config.tables(Some(ScopeId::from(9)));
        assert!(tables.iter().all(|table| table.scope_id == Some(ScopeId::from(9))));
        Ok(())
    }

    #[test]
    fn malformed_config_returns_parse_error() -> Result<()> {
        let (_temp, path) = write_config("{{not toml")?;
        let error = Config::load(&path).expect_err("malformed config should fail");
        assert!(error.to_string().contains("parse TOML config"));
        Ok(())
    }

    #[test]
    fn unsupported_config_version_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 2\n")?;
        let error = Config::load(&path).expect_err("v2 config should fail");
        assert!(error.to_string().contains("unsupported config version 2"));
        Ok(())
    }

    #[test]
    fn missing_url_points_at_demo_mode() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n")?;
        let config = Config::load(&path)?;
        let error = config.backend_url().expect_err("url is required");
        assert!(error.to_string().contains("--demo"));
        Ok(())
    }

    #[test]
    fn non_http_url_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[backend]\nurl = \"ftp://files\"\n")?;
        let error = Config::load(&path).expect_err("ftp url should fail");
        assert!(error.to_string().contains("http://"));
        Ok(())
    }

    #[test]
    fn table_lists_are_validated() -> Result<()> {
        for (content, expected) in [
            ("version = 1\n[ui]\ntables = []\n", "is empty"),
            (
                "version = 1\n[ui]\ntables = [\"students\", \"Students\"]\n",
                "twice",
            ),
            (
                "version = 1\n[ui]\ntables = [\"students; drop\"]\n",
                "underscores",
            ),
            (
                "version = 1\n[ui]\ntables = [\"students\"]\ndefault_table = \"employees\"\n",
                "not one of ui.tables",
            ),
        ] {
            let (_temp, path) = write_config(content)?;
            let error = Config::load(&path).expect_err("invalid tables should fail");
            let message = format!("{error:#}");
            assert!(message.contains(expected), "{message}");
        }
        Ok(())
    }

    #[test]
    fn log_level_is_validated() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[log]\nlevel = \"chatty\"\n")?;
        let error = Config::load(&path).expect_err("unknown level should fail");
        assert!(error.to_string().contains("log.level"));
        Ok(())
    }

    #[test]
    fn api_key_falls_back_to_env() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) = write_config("version = 1\n")?;
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var(API_KEY_ENV, "from-env");
        }
        let config = Config::load(&path)?;
        let key = config.api_key();
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var(API_KEY_ENV);
        }
        assert_eq!(key, "from-env");
        Ok(())
    }

    #[test]
    fn default_path_honors_env_override() -> Result<()> {
        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let override_path = temp.path().join("custom-config.toml");
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("CASEBOOK_CONFIG_PATH", &override_path);
        }
        let resolved = Config::default_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("CASEBOOK_CONFIG_PATH");
        }
        assert_eq!(resolved, override_path);
        Ok(())
    }

    #[test]
    fn timeout_parses_ms_seconds_and_minutes() -> Result<()> {
        assert_eq!(parse_duration("500ms")?, Duration::from_millis(500));
        assert_eq!(parse_duration("5s")?, Duration::from_secs(5));
        assert_eq!(parse_duration("2m")?, Duration::from_secs(120));
        Ok(())
    }

    #[test]
    fn timeout_rejects_invalid_and_zero_values() -> Result<()> {
        let error = parse_duration("oops").expect_err("invalid duration should fail");
        assert!(error.to_string().contains("invalid duration"));

        let (_temp, path) = write_config("version = 1\n[backend]\ntimeout = \"0s\"\n")?;
        let error = Config::load(&path).expect_err("zero timeout should fail");
        assert!(error.to_string().contains("must be positive"));
        Ok(())
    }

    #[test]
    fn example_config_round_trips_through_load() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        let example = Config::example_config(&path);
        assert!(example.contains("[backend]"));
        assert!(example.contains("[ui]"));
        assert!(example.contains("[log]"));

        std::fs::write(&path, example)?;
        let config = Config::load(&path)?;
        assert_eq!(config.backend_url()?, "https://your-project.supabase.co");
        Ok(())
    }
}
