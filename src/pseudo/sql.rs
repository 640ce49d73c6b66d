use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use http::header::{ACCEPT, CONTENT_TYPE};
use rusqlite::Connection;
use rusqlite::types::ValueRef;
use serde_json::{Map, Value, json};

use crate::error::TransportError;
use crate::http::compile::DATA_SOURCE_NAME;
use crate::http::{CompiledRequest, HttpMethod, Response};

const DRIVERS: [&str; 2] = ["sqlite3", "sqlite"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum RowFormat {
    Json,
    Csv,
    Plain { separator: String, header: bool },
}

impl RowFormat {
    fn from_accept(accept: Option<&str>) -> Self {
        let Some(accept) = accept else {
            return RowFormat::Json;
        };
        let mut parts = accept.split(';').map(str::trim);
        match parts.next().unwrap_or_default() {
            "text/csv" => RowFormat::Csv,
            "text/plain" => {
                let mut separator = "\t".to_string();
                let mut header = false;
                for param in parts {
                    match param.split_once('=') {
                        Some(("fieldsep", value)) if !value.is_empty() => {
                            separator = value.to_string()
                        }
                        Some(("header", value)) => header = value.eq_ignore_ascii_case("true"),
                        _ => {}
                    }
                }
                RowFormat::Plain { separator, header }
            }
            _ => RowFormat::Json,
        }
    }

    fn content_type(&self) -> &'static str {
        match self {
            RowFormat::Json => "application/json",
            RowFormat::Csv => "text/csv",
            RowFormat::Plain { .. } => "text/plain",
        }
    }
}

/// GET runs a query and serializes the rows, POST runs a statement.
pub async fn perform(request: &CompiledRequest) -> Result<Response, TransportError> {
    let driver = request.url.host_str().unwrap_or_default().to_string();
    if !DRIVERS.contains(&driver.as_str()) {
        return Err(TransportError::Database(format!(
            "unsupported database driver `{driver}`"
        )));
    }
    let dsn = request
        .header_value(DATA_SOURCE_NAME)
        .unwrap_or_default()
        .to_string();
    let query = String::from_utf8_lossy(&request.body).into_owned();
    let method = request.method;
    let format = RowFormat::from_accept(request.header_value(ACCEPT.as_str()));

    let (body, content_type) =
        tokio::task::spawn_blocking(move || execute(&dsn, &query, method, &format))
            .await
            .map_err(|err| TransportError::Database(format!("database task failed: {err}")))??;

    Ok(Response {
        url: request.url.to_string(),
        ..Response::synthetic(200, "OK", body).with_header(CONTENT_TYPE, content_type)
    })
}

fn execute(
    dsn: &str,
    query: &str,
    method: HttpMethod,
    format: &RowFormat,
) -> Result<(String, &'static str), TransportError> {
    let conn = Connection::open(dsn).map_err(database_error)?;
    if method == HttpMethod::Post {
        let affected = conn.execute(query, []).map_err(database_error)?;
        let result = json!({
            "LastInsertId": conn.last_insert_rowid(),
            "RowsAffected": affected,
        });
        return Ok((result.to_string(), "application/json"));
    }
    Ok((select(&conn, query, format)?, format.content_type()))
}

fn database_error(err: rusqlite::Error) -> TransportError {
    TransportError::Database(err.to_string())
}

fn select(conn: &Connection, query: &str, format: &RowFormat) -> Result<String, TransportError> {
    let mut statement = conn.prepare(query).map_err(database_error)?;
    let columns: Vec<String> = statement
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();

    let mut rows = statement.query([]).map_err(database_error)?;
    let mut table: Vec<Vec<Value>> = Vec::new();
    while let Some(row) = rows.next().map_err(database_error)? {
        let mut values = Vec::with_capacity(columns.len());
        for index in 0..columns.len() {
            values.push(to_json(row.get_ref(index).map_err(database_error)?));
        }
        table.push(values);
    }

    Ok(match format {
        RowFormat::Json => {
            let objects: Vec<Value> = table
                .into_iter()
                .map(|values| {
                    let object: Map<String, Value> =
                        columns.iter().cloned().zip(values).collect();
                    Value::Object(object)
                })
                .collect();
            Value::Array(objects).to_string()
        }
        RowFormat::Csv => {
            let mut out = csv_line(columns.iter().map(String::as_str));
            for values in &table {
                let fields: Vec<String> = values.iter().map(plain).collect();
                out.push_str(&csv_line(fields.iter().map(String::as_str)));
            }
            out
        }
        RowFormat::Plain { separator, header } => {
            let mut out = String::new();
            if *header {
                out.push_str(&columns.join(separator.as_str()));
                out.push('\n');
            }
            for values in &table {
                let fields: Vec<String> = values.iter().map(plain).collect();
                out.push_str(&fields.join(separator.as_str()));
                out.push('\n');
            }
            out
        }
    })
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => json!(n),
        ValueRef::Real(f) => json!(f),
        ValueRef::Text(text) => Value::String(String::from_utf8_lossy(text).into_owned()),
        ValueRef::Blob(blob) => Value::String(STANDARD.encode(blob)),
    }
}

fn plain(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn csv_line<'a>(fields: impl Iterator<Item = &'a str>) -> String {
    let quoted: Vec<String> = fields
        .map(|field| {
            if field.contains([',', '"', '\n', '\r']) {
                format!("\"{}\"", field.replace('"', "\"\""))
            } else {
                field.to_string()
            }
        })
        .collect();
    format!("{}\n", quoted.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::http::{Request, RequestCompiler};
    use crate::template::Replacer;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn compile(method: HttpMethod, driver: &str, dsn: &str, query: &str, accept: Option<&str>) -> CompiledRequest {
        let mut header = BTreeMap::new();
        header.insert(DATA_SOURCE_NAME.to_string(), dsn.to_string());
        if let Some(accept) = accept {
            header.insert("Accept".to_string(), accept.to_string());
        }
        let request = Request {
            method,
            url: format!("sql://{driver}"),
            header,
            body: query.to_string(),
            ..Default::default()
        };
        let config = EngineConfig::default();
        let mut replacer = Replacer::from_config(BTreeMap::new(), &config);
        RequestCompiler::new(Arc::new(config))
            .compile(&request, &mut replacer)
            .unwrap()
    }

    async fn seeded_db() -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let dsn = dir.path().join("test.db").display().to_string();
        for statement in [
            "CREATE TABLE people (id INTEGER PRIMARY KEY, name TEXT, note TEXT)",
            "INSERT INTO people (name, note) VALUES ('Ann', 'likes, commas')",
            "INSERT INTO people (name, note) VALUES ('Bob', NULL)",
        ] {
            perform(&compile(HttpMethod::Post, "sqlite3", &dsn, statement, None))
                .await
                .unwrap();
        }
        (dir, dsn)
    }

    #[tokio::test]
    async fn post_reports_insert_id_and_rows_affected() {
        let (_dir, dsn) = seeded_db().await;
        let response = perform(&compile(
            HttpMethod::Post,
            "sqlite",
            &dsn,
            "INSERT INTO people (name) VALUES ('Cy')",
            None,
        ))
        .await
        .unwrap();
        assert_eq!(response.body_str(), r#"{"LastInsertId":3,"RowsAffected":1}"#);
    }

    #[tokio::test]
    async fn get_serializes_json_by_default() {
        let (_dir, dsn) = seeded_db().await;
        let query = "SELECT id, name, note FROM people ORDER BY id";
        let response = perform(&compile(HttpMethod::Get, "sqlite3", &dsn, query, None))
            .await
            .unwrap();
        assert_eq!(response.content_type(), Some("application/json"));
        let rows: Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(
            rows,
            json!([
                {"id": 1, "name": "Ann", "note": "likes, commas"},
                {"id": 2, "name": "Bob", "note": null},
            ])
        );
    }

    #[tokio::test]
    async fn get_serializes_csv_and_plain_text() {
        let (_dir, dsn) = seeded_db().await;
        let query = "SELECT name, note FROM people ORDER BY id";

        let csv = perform(&compile(HttpMethod::Get, "sqlite3", &dsn, query, Some("text/csv")))
            .await
            .unwrap();
        assert_eq!(csv.body_str(), "name,note\nAnn,\"likes, commas\"\nBob,\n");

        let plain = perform(&compile(
            HttpMethod::Get,
            "sqlite3",
            &dsn,
            query,
            Some("text/plain; fieldsep=|; header=true"),
        ))
        .await
        .unwrap();
        assert_eq!(plain.body_str(), "name|note\nAnn|likes, commas\nBob|\n");
    }

    #[tokio::test]
    async fn unknown_driver_is_transport_error() {
        let request = compile(HttpMethod::Get, "oracle", "x", "SELECT 1", None);
        assert!(matches!(
            perform(&request).await.unwrap_err(),
            TransportError::Database(_)
        ));
    }

    #[test]
    fn accept_selects_format() {
        assert_eq!(RowFormat::from_accept(None), RowFormat::Json);
        assert_eq!(RowFormat::from_accept(Some("text/csv")), RowFormat::Csv);
        assert_eq!(
            RowFormat::from_accept(Some("text/plain")),
            RowFormat::Plain { separator: "\t".into(), header: false }
        );
    }
}
