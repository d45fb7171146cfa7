// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Blocking client for a PostgREST collection API (as hosted by Supabase).

pub mod import;

pub use import::{import_csv, read_csv};

use anyhow::{Context, Result, anyhow, bail};
use casebook_app::{Backend, Record, RecordId, ScopeFilter};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use url::Url;

const REST_PATH: &str = "rest/v1";

#[derive(Debug, Clone)]
pub struct Client {
    base_url: Url,
    api_key: String,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    /// `url` is the project root (`https://<ref>.supabase.co`); requests go
    /// to `<url>/rest/v1/`.
    pub fn new(url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let trimmed = url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            bail!("backend.url must not be empty -- set it to your project URL");
        }
        let root = trimmed.trim_end_matches(REST_PATH).trim_end_matches('/');
        let base_url = Url::parse(&format!("{root}/{REST_PATH}/"))
            .with_context(|| format!("backend.url {url:?} is not a valid URL"))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            bail!("backend.url {url:?} must use http or https");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            api_key: api_key.trim().to_owned(),
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Exposed tables, from the OpenAPI document.
    pub fn table_names(&self) -> Result<Vec<String>> {
        let document = self.openapi()?;
        Ok(definitions(&document)?.keys().cloned().collect())
    }

    /// Confirms the API answers and exposes `tables`.
    pub fn ping(&self, tables: &[String]) -> Result<()> {
        let available = self.table_names()?;
        let missing: Vec<&str> = tables
            .iter()
            .map(String::as_str)
            .filter(|table| !available.iter().any(|name| name == table))
            .collect();
        if !missing.is_empty() {
            bail!(
                "table(s) {} not exposed by {} -- check [ui].tables and the API schema",
                missing.join(", "),
                self.base_url
            );
        }
        Ok(())
    }

    pub fn columns(&self, table: &str) -> Result<Vec<String>> {
        let document = self.openapi()?;
        let Some(definition) = definitions(&document)?.get(table) else {
            bail!(
                "table `{table}` is not exposed by {} -- check its name and grants",
                self.base_url
            );
        };
        let properties = definition
            .get("properties")
            .and_then(Value::as_object)
            .ok_or_else(|| anyhow!("definition of `{table}` has no properties"))?;
        Ok(properties.keys().cloned().collect())
    }

    pub fn select_rows(&self, table: &str, scope: Option<&ScopeFilter>) -> Result<Vec<Record>> {
        let mut url = self.table_url(table)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("select", "*");
            if let Some(filter) = scope {
                query.append_pair(&filter.column, &format!("eq.{}", filter.value));
            }
        }
        tracing::debug!(%url, "select");
        let response = self.send(self.http.get(url.clone()), &url)?;
        response
            .json()
            .with_context(|| format!("decode rows of `{table}`"))
    }

    pub fn insert_rows(&self, table: &str, rows: &[Record]) -> Result<Vec<Record>> {
        let url = self.table_url(table)?;
        tracing::debug!(%url, rows = rows.len(), "insert");
        let request = self
            .http
            .post(url.clone())
            .header("Prefer", "return=representation")
            .json(rows);
        self.send(request, &url)?
            .json()
            .with_context(|| format!("decode rows inserted into `{table}`"))
    }

    pub fn update_row(
        &self,
        table: &str,
        id_column: &str,
        id: &RecordId,
        row: &Record,
    ) -> Result<Record> {
        let url = self.row_url(table, id_column, id)?;
        tracing::debug!(%url, "update");
        let request = self
            .http
            .patch(url.clone())
            .header("Prefer", "return=representation")
            .json(row);
        let updated: Vec<Record> = self
            .send(request, &url)?
            .json()
            .with_context(|| format!("decode updated `{table}` row"))?;
        updated.into_iter().next().ok_or_else(|| {
            anyhow!("no `{table}` row with {id_column} = {id} -- it may have been deleted")
        })
    }

    pub fn delete_row(&self, table: &str, id_column: &str, id: &RecordId) -> Result<()> {
        let url = self.row_url(table, id_column, id)?;
        tracing::debug!(%url, "delete");
        self.send(self.http.delete(url.clone()), &url)?;
        Ok(())
    }

    fn openapi(&self) -> Result<Value> {
        let response = self.send(
            self.http
                .get(self.base_url.clone())
                .header("Accept", "application/openapi+json"),
            &self.base_url,
        )?;
        response.json().context("decode OpenAPI document")
    }

    fn table_url(&self, table: &str) -> Result<Url> {
        let table = table.trim();
        if table.is_empty() || table.contains('/') {
            bail!("invalid table name {table:?}");
        }
        self.base_url
            .join(table)
            .with_context(|| format!("build URL for `{table}`"))
    }

    fn row_url(&self, table: &str, id_column: &str, id: &RecordId) -> Result<Url> {
        let mut url = self.table_url(table)?;
        url.query_pairs_mut()
            .append_pair(id_column, &format!("eq.{id}"));
        Ok(url)
    }

    fn send(&self, request: RequestBuilder, url: &Url) -> Result<Response> {
        let request = if self.api_key.is_empty() {
            request
        } else {
            request
                .header("apikey", &self.api_key)
                .bearer_auth(&self.api_key)
        };

        let response = request
            .send()
            .map_err(|error| connection_error(url, error))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }
        Ok(response)
    }
}

impl Backend for Client {
    fn fetch_columns(&mut self, table: &str) -> Result<Vec<String>> {
        self.columns(table)
    }

    fn select(&mut self, table: &str, scope: Option<&ScopeFilter>) -> Result<Vec<Record>> {
        self.select_rows(table, scope)
    }

    fn insert(&mut self, table: &str, rows: &[Record]) -> Result<Vec<Record>> {
        self.insert_rows(table, rows)
    }

    fn update(
        &mut self,
        table: &str,
        id_column: &str,
        id: &RecordId,
        row: &Record,
    ) -> Result<Record> {
        self.update_row(table, id_column, id, row)
    }

    fn delete(&mut self, table: &str, id_column: &str, id: &RecordId) -> Result<()> {
        self.delete_row(table, id_column, id)
    }
}

fn definitions(document: &Value) -> Result<&serde_json::Map<String, Value>> {
    document
        .get("definitions")
        .and_then(Value::as_object)
        .ok_or_else(|| anyhow!("OpenAPI document has no definitions -- is this a PostgREST URL?"))
}

fn connection_error(url: &Url, error: reqwest::Error) -> anyhow::Error {
    let target = match url.host_str() {
        Some(host) => format!("{}://{host}", url.scheme()),
        None => url.to_string(),
    };
    if error.is_timeout() {
        return anyhow!("{target} timed out -- raise [backend].timeout or check the network");
    }
    anyhow!("cannot reach {target} -- check [backend].url and your network ({error})")
}

/// PostgREST error body.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
    code: Option<String>,
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body)
        && let Some(message) = parsed.message.filter(|message| !message.is_empty())
    {
        let mut line = format!("server error ({}): {message}", status.as_u16());
        if let Some(code) = parsed.code.filter(|code| !code.is_empty()) {
            line.push_str(&format!(" [{code}]"));
        }
        if let Some(details) = parsed.details.filter(|details| !details.is_empty()) {
            line.push_str(&format!(" ({details})"));
        }
        if let Some(hint) = parsed.hint.filter(|hint| !hint.is_empty()) {
            line.push_str(&format!(" -- {hint}"));
        }
        return anyhow!(line);
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return anyhow!(
            "server refused the request ({}) -- check [backend].api_key or CASEBOOK_API_KEY",
            status.as_u16()
        );
    }

    if body.len() < 100 && !body.contains('{') && !body.trim().is_empty() {
        return anyhow!("server error ({}): {}", status.as_u16(), body.trim());
    }

    anyhow!("server returned {}", status.as_u16())
}

#[cfg(test)]
mod tests {
    use super::{Client, clean_error_response};
    use reqwest::StatusCode;
    use std::time::Duration;

    #[test]
    fn base_url_gains_rest_path_once() {
        for url in [
            "https://demo.supabase.co",
            "https://demo.supabase.co/",
            "https://demo.supabase.co/rest/v1",
            "https://demo.supabase.co/rest/v1/",
        ] {
            let client = Client::new(url, "key", Duration::from_secs(1)).expect("client");
            assert_eq!(client.base_url(), "https://demo.supabase.co/rest/v1/");
        }
    }

    #[test]
    fn invalid_urls_are_rejected() {
        assert!(Client::new("  ", "key", Duration::from_secs(1)).is_err());
        assert!(Client::new("not a url", "key", Duration::from_secs(1)).is_err());
        let error = Client::new("ftp://example.org", "key", Duration::from_secs(1))
            .expect_err("ftp is not http");
        assert!(error.to_string().contains("http or https"));
    }

    #[test]
    fn postgrest_envelope_is_condensed() {
        let body = r#"{"code":"23502","details":"Failing row contains (null).","hint":null,"message":"null value in column \"name\" violates not-null constraint"}"#;
        let error = clean_error_response(StatusCode::BAD_REQUEST, body);
        assert_eq!(
            error.to_string(),
            "server error (400): null value in column \"name\" violates not-null constraint [23502] (Failing row contains (null).)"
        );
    }

    #[test]
    fn hint_becomes_remediation() {
        let body = r#"{"code":"42P01","message":"relation \"public.parents\" does not exist","hint":"Perhaps you meant the table 'public.students'"}"#;
        let error = clean_error_response(StatusCode::NOT_FOUND, body);
        assert!(
            error
                .to_string()
                .ends_with("-- Perhaps you meant the table 'public.students'")
        );
    }

    #[test]
    fn auth_failures_point_at_the_key() {
        let error = clean_error_response(StatusCode::UNAUTHORIZED, "");
        assert!(error.to_string().contains("CASEBOOK_API_KEY"));
    }

    #[test]
    fn short_plain_bodies_are_kept_and_long_ones_dropped() {
        let error = clean_error_response(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(error.to_string(), "server error (502): upstream down");

        let error = clean_error_response(StatusCode::BAD_GATEWAY, &"x".repeat(200));
        assert_eq!(error.to_string(), "server returned 502");
    }
}
