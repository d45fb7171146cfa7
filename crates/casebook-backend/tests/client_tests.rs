// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use casebook_app::{Backend, ImportOutcome, RecordId, TableDescriptor, TableSchema};
use casebook_backend::{Client, import_csv};
use casebook_testkit::{MemoryBackend, center_scope, object, temp_file};
use serde_json::{Value, json};
use std::io::Read;
use std::thread;
use std::time::Duration;
use tiny_http::{Header, Method, Response, Server};

const OPENAPI: &str = r#"{
  "swagger": "2.0",
  "definitions": {
    "students": {
      "properties": {
        "id": {"type": "integer"},
        "name": {"type": "string"},
        "dob": {"type": "string", "format": "date"},
        "center_id": {"type": "integer"}
      }
    },
    "educators": {"properties": {"id": {"type": "integer"}}}
  }
}"#;

struct Seen {
    method: Method,
    url: String,
    body: String,
    apikey: Option<String>,
    authorization: Option<String>,
    prefer: Option<String>,
}

fn header(request: &tiny_http::Request, name: &'static str) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|header| header.field.equiv(name))
        .map(|header| header.value.as_str().to_owned())
}

/// Serves `replies` in order and returns what each request looked like.
fn serve(replies: Vec<(u16, &'static str)>) -> Result<(String, thread::JoinHandle<Vec<Seen>>)> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let addr = format!("http://{}", server.server_addr());

    let handle = thread::spawn(move || {
        let mut seen = Vec::new();
        for (status, body) in replies {
            let mut request = server.recv().expect("request expected");
            let mut received = String::new();
            request
                .as_reader()
                .read_to_string(&mut received)
                .expect("request body should read");
            seen.push(Seen {
                method: request.method().clone(),
                url: request.url().to_owned(),
                body: received,
                apikey: header(&request, "apikey"),
                authorization: header(&request, "Authorization"),
                prefer: header(&request, "Prefer"),
            });
            let response = Response::from_string(body)
                .with_status_code(status)
                .with_header(
                    Header::from_bytes("Content-Type", "application/json")
                        .expect("valid content type header"),
                );
            request.respond(response).expect("response should succeed");
        }
        seen
    });
    Ok((addr, handle))
}

#[test]
fn unreachable_server_error_names_the_url() {
    let mut client = Client::new("http://127.0.0.1:1", "key", Duration::from_millis(50))
        .expect("client should initialize");

    let error = client
        .fetch_columns("students")
        .expect_err("fetch should fail for unreachable endpoint");
    let message = error.to_string();
    assert!(message.contains("http://127.0.0.1"), "{message}");
    assert!(message.contains("--"), "{message}");
}

#[test]
fn columns_come_from_openapi_in_declared_order() -> Result<()> {
    let (addr, handle) = serve(vec![(200, OPENAPI), (200, OPENAPI)])?;
    let mut client = Client::new(&addr, "secret", Duration::from_secs(1))?;

    assert_eq!(
        client.fetch_columns("students")?,
        vec!["id", "name", "dob", "center_id"]
    );
    let error = client
        .fetch_columns("parents")
        .expect_err("parents is not exposed");
    assert!(error.to_string().contains("`parents` is not exposed"));

    let seen = handle.join().expect("server thread should join");
    assert_eq!(seen[0].url, "/rest/v1/");
    assert_eq!(seen[0].apikey.as_deref(), Some("secret"));
    assert_eq!(seen[0].authorization.as_deref(), Some("Bearer secret"));
    Ok(())
}

#[test]
fn select_applies_scope_as_equality_filter() -> Result<()> {
    let (addr, handle) = serve(vec![(200, r#"[{"id":1,"name":"Asha","center_id":3}]"#)])?;
    let mut client = Client::new(&addr, "key", Duration::from_secs(1))?;

    let rows = client.select("students", Some(&center_scope(3)))?;
    assert_eq!(rows, vec![object(json!({"id": 1, "name": "Asha", "center_id": 3}))]);

    let seen = handle.join().expect("server thread should join");
    assert_eq!(seen[0].method, Method::Get);
    assert_eq!(seen[0].url, "/rest/v1/students?select=*&center_id=eq.3");
    Ok(())
}

#[test]
fn insert_asks_for_representation() -> Result<()> {
    let (addr, handle) = serve(vec![(201, r#"[{"id":7,"name":"Asha"}]"#)])?;
    let mut client = Client::new(&addr, "key", Duration::from_secs(1))?;

    let stored = client.insert("students", &[object(json!({"name": "Asha"}))])?;
    assert_eq!(stored[0]["id"], json!(7));

    let seen = handle.join().expect("server thread should join");
    assert_eq!(seen[0].method, Method::Post);
    assert_eq!(seen[0].url, "/rest/v1/students");
    assert_eq!(seen[0].prefer.as_deref(), Some("return=representation"));
    let body: Value = serde_json::from_str(&seen[0].body)?;
    assert_eq!(body, json!([{"name": "Asha"}]));
    Ok(())
}

#[test]
fn update_and_delete_filter_on_identifier() -> Result<()> {
    let (addr, handle) = serve(vec![
        (200, r#"[{"student_id":"S-1","name":"Asha Rao"}]"#),
        (200, "[]"),
        (204, ""),
    ])?;
    let mut client = Client::new(&addr, "key", Duration::from_secs(1))?;
    let id = RecordId::from("S-1");
    let row = object(json!({"student_id": "S-1", "name": "Asha Rao"}));

    let updated = client.update("students", "student_id", &id, &row)?;
    assert_eq!(updated, row);

    let error = client
        .update("students", "student_id", &id, &row)
        .expect_err("no row matched");
    assert!(error.to_string().contains("may have been deleted"));

    client.delete("students", "student_id", &id)?;

    let seen = handle.join().expect("server thread should join");
    assert_eq!(seen[0].method, Method::Patch);
    assert_eq!(seen[0].url, "/rest/v1/students?student_id=eq.S-1");
    assert_eq!(seen[2].method, Method::Delete);
    assert_eq!(seen[2].url, "/rest/v1/students?student_id=eq.S-1");
    Ok(())
}

#[test]
fn server_errors_are_condensed() -> Result<()> {
    let (addr, handle) = serve(vec![(
        409,
        r#"{"code":"23505","details":"Key (id)=(1) already exists.","hint":null,"message":"duplicate key value violates unique constraint \"students_pkey\""}"#,
    )])?;
    let mut client = Client::new(&addr, "key", Duration::from_secs(1))?;

    let error = client
        .insert("students", &[object(json!({"id": 1}))])
        .expect_err("conflict");
    assert_eq!(
        error.to_string(),
        "server error (409): duplicate key value violates unique constraint \"students_pkey\" [23505] (Key (id)=(1) already exists.)"
    );

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn ping_reports_missing_tables() -> Result<()> {
    let (addr, handle) = serve(vec![(200, OPENAPI), (200, OPENAPI)])?;
    let client = Client::new(&addr, "key", Duration::from_secs(1))?;

    client.ping(&["students".to_owned(), "educators".to_owned()])?;
    let error = client
        .ping(&["students".to_owned(), "employees".to_owned()])
        .expect_err("employees missing");
    assert!(error.to_string().contains("employees not exposed"));

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn csv_import_inserts_one_batch() -> Result<()> {
    let mut backend =
        MemoryBackend::new().with_table("students", &["id", "name", "dob"], Vec::new());
    let columns = ["id", "name", "dob"].map(str::to_owned).to_vec();
    let schema = TableSchema::resolve("students", &columns, &[])?;
    let table = TableDescriptor::new("students");
    let (_dir, path) = temp_file("students.csv", "name,dob\nAsha,2010-04-01\nBob,\n")?;

    let outcome = import_csv(&mut backend, &table, &schema, &path);
    assert_eq!(outcome, ImportOutcome::Completed { inserted: 2 });
    assert_eq!(backend.calls(), &["insert students".to_owned()]);
    assert_eq!(backend.rows("students")[1]["dob"], Value::Null);
    Ok(())
}

#[test]
fn csv_import_failures_insert_nothing() -> Result<()> {
    let mut backend =
        MemoryBackend::new().with_table("students", &["id", "name", "dob"], Vec::new());
    let columns = ["id", "name", "dob"].map(str::to_owned).to_vec();
    let schema = TableSchema::resolve("students", &columns, &[])?;
    let table = TableDescriptor::new("students");

    let (_dir, path) = temp_file("bad.csv", "name,dob\nAsha,2010-04-01\nBob,tomorrow\n")?;
    let outcome = import_csv(&mut backend, &table, &schema, &path);
    assert!(matches!(outcome, ImportOutcome::Failed(message) if message.contains("line 3")));

    let (_empty_dir, empty) = temp_file("empty.csv", "name,dob\n")?;
    let outcome = import_csv(&mut backend, &table, &schema, &empty);
    assert!(matches!(outcome, ImportOutcome::Failed(message) if message.contains("no data rows")));

    let outcome = import_csv(&mut backend, &table, &schema, &empty.with_file_name("missing.csv"));
    assert!(matches!(outcome, ImportOutcome::Failed(message) if message.contains("open")));

    assert!(backend.rows("students").is_empty());
    assert!(backend.calls().is_empty());
    Ok(())
}
