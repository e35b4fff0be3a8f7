// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! `apoc.load.json` family: local files, `file://` URLs and HTTP(S)
//! with the documented request options
//!
//! Gzip payloads are detected by the `.gz` extension. A response cache
//! keyed by URL is used when `GRAFITO_APOC_CACHE_DIR` points at a
//! directory and the request is a pure GET (no headers, payload or
//! auth).

use crate::error::{GrafitoError, Result};
use crate::graph::Graph;
use crate::storage::Value;
use flate2::read::GzDecoder;
use log::debug;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming the response-cache directory
pub const CACHE_DIR_ENV: &str = "GRAFITO_APOC_CACHE_DIR";

/// Request options shared by the load procedures
#[derive(Debug, Clone)]
pub(crate) struct LoadOptions {
    method: String,
    payload: Option<String>,
    timeout: Duration,
    retry: usize,
    fail_on_error: bool,
    headers: Vec<(String, String)>,
    auth: Option<AuthSpec>,
}

#[derive(Debug, Clone)]
enum AuthSpec {
    Basic { user: String, password: String },
    Bearer(String),
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            method: "GET".to_string(),
            payload: None,
            timeout: Duration::from_secs(30),
            retry: 0,
            fail_on_error: true,
            headers: Vec::new(),
            auth: None,
        }
    }
}

impl LoadOptions {
    fn from_value(value: Option<&Value>) -> Result<Self> {
        let mut options = Self::default();
        let Some(Value::Map(map)) = value else {
            if let Some(Value::Null) | None = value {
                return Ok(options);
            }
            return Err(GrafitoError::Configuration(
                "load options must be a map".to_string(),
            ));
        };
        if let Some(Value::String(method)) = map.get("method") {
            options.method = method.to_ascii_uppercase();
        }
        if let Some(Value::String(payload)) = map.get("payload") {
            options.payload = Some(payload.clone());
        }
        match map.get("timeout") {
            Some(Value::Int(seconds)) if *seconds > 0 => {
                options.timeout = Duration::from_secs(*seconds as u64);
            }
            Some(Value::Float(seconds)) if *seconds > 0.0 => {
                options.timeout = Duration::from_secs_f64(*seconds);
            }
            _ => {}
        }
        if let Some(Value::Int(retry)) = map.get("retry") {
            options.retry = (*retry).max(0) as usize;
        }
        if let Some(Value::Bool(fail)) = map.get("failOnError") {
            options.fail_on_error = *fail;
        }
        if let Some(Value::Map(headers)) = map.get("headers") {
            for (name, value) in headers {
                options
                    .headers
                    .push((name.clone(), value.to_string()));
            }
        }
        match map.get("auth") {
            Some(Value::Map(auth)) => {
                let user = auth.get("user").and_then(Value::as_str).unwrap_or_default();
                let password = auth
                    .get("password")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                options.auth = Some(AuthSpec::Basic {
                    user: user.to_string(),
                    password: password.to_string(),
                });
            }
            Some(Value::String(token)) => {
                options.auth = Some(AuthSpec::Bearer(token.clone()));
            }
            _ => {}
        }
        Ok(options)
    }

    fn is_pure_get(&self) -> bool {
        self.method == "GET"
            && self.payload.is_none()
            && self.headers.is_empty()
            && self.auth.is_none()
    }
}

/// `apoc.load.json(source, options?)` — one row carrying the decoded
/// value; JSONL sources yield one row per line.
pub fn load_json_proc(graph: &Graph, args: &[Value]) -> Result<Vec<Vec<Value>>> {
    let (source, options) = parse_args(args, "apoc.load.json")?;
    let _ = graph;
    match fetch_text(&source, &options) {
        Ok(text) => Ok(decode_rows(&text)?.into_iter().map(|v| vec![v]).collect()),
        Err(error) if !options.fail_on_error => {
            debug!("apoc.load.json swallowed error per failOnError=false: {error}");
            Ok(Vec::new())
        }
        Err(error) => Err(error),
    }
}

/// `apoc.load.jsonArray(source, options?)` — the source must decode to
/// an array; one row per element.
pub fn load_json_array_proc(graph: &Graph, args: &[Value]) -> Result<Vec<Vec<Value>>> {
    let (source, options) = parse_args(args, "apoc.load.jsonArray")?;
    let _ = graph;
    let text = match fetch_text(&source, &options) {
        Ok(text) => text,
        Err(error) if !options.fail_on_error => {
            debug!("apoc.load.jsonArray swallowed error per failOnError=false: {error}");
            return Ok(Vec::new());
        }
        Err(error) => return Err(error),
    };
    let json: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| GrafitoError::Import(format!("malformed JSON in {source}: {e}")))?;
    match json {
        serde_json::Value::Array(items) => Ok(items
            .iter()
            .map(|item| vec![Value::from_json(item)])
            .collect()),
        _ => Err(GrafitoError::Import(format!(
            "{source} does not contain a JSON array"
        ))),
    }
}

/// `apoc.load.jsonParams(url, headers, payload, options?)`
pub fn load_json_params_proc(graph: &Graph, args: &[Value]) -> Result<Vec<Vec<Value>>> {
    if args.len() < 3 || args.len() > 4 {
        return Err(GrafitoError::QueryExecution(
            "apoc.load.jsonParams expects (url, headers, payload, options?)".to_string(),
        ));
    }
    let Some(source) = args[0].as_str() else {
        return Err(GrafitoError::QueryExecution(
            "apoc.load.jsonParams: url must be a string".to_string(),
        ));
    };
    let mut options = LoadOptions::from_value(args.get(3))?;
    if let Value::Map(headers) = &args[1] {
        for (name, value) in headers {
            options.headers.push((name.clone(), value.to_string()));
        }
    }
    match &args[2] {
        Value::Null => {}
        Value::String(payload) => {
            options.payload = Some(payload.clone());
            if options.method == "GET" {
                options.method = "POST".to_string();
            }
        }
        other => {
            // Structured payloads are serialized as JSON.
            options.payload = Some(serde_json::to_string(&other.to_json()).unwrap_or_default());
            if options.method == "GET" {
                options.method = "POST".to_string();
            }
        }
    }
    let _ = graph;
    match fetch_text(source, &options) {
        Ok(text) => Ok(decode_rows(&text)?.into_iter().map(|v| vec![v]).collect()),
        Err(error) if !options.fail_on_error => {
            debug!("apoc.load.jsonParams swallowed error per failOnError=false: {error}");
            Ok(Vec::new())
        }
        Err(error) => Err(error),
    }
}

fn parse_args(args: &[Value], name: &str) -> Result<(String, LoadOptions)> {
    if args.is_empty() || args.len() > 2 {
        return Err(GrafitoError::QueryExecution(format!(
            "{name} expects (source, options?)"
        )));
    }
    let Some(source) = args[0].as_str() else {
        return Err(GrafitoError::QueryExecution(format!(
            "{name}: source must be a string"
        )));
    };
    Ok((source.to_string(), LoadOptions::from_value(args.get(1))?))
}

/// Whole-document JSON, falling back to JSONL (one value per line)
fn decode_rows(text: &str) -> Result<Vec<Value>> {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(json) => Ok(vec![Value::from_json(&json)]),
        Err(first_error) => {
            let mut rows = Vec::new();
            for line in text.lines() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let json: serde_json::Value = serde_json::from_str(line).map_err(|_| {
                    GrafitoError::Import(format!("malformed JSON: {first_error}"))
                })?;
                rows.push(Value::from_json(&json));
            }
            if rows.is_empty() {
                return Err(GrafitoError::Import(format!(
                    "malformed JSON: {first_error}"
                )));
            }
            Ok(rows)
        }
    }
}

/// Resolve a source to text: HTTP(S), `file://`, or a filesystem path
pub(crate) fn fetch_text(source: &str, options: &LoadOptions) -> Result<String> {
    if source.starts_with("http://") || source.starts_with("https://") {
        return fetch_http(source, options);
    }
    let path = source.strip_prefix("file://").unwrap_or(source);
    let bytes = std::fs::read(path)
        .map_err(|e| GrafitoError::Import(format!("cannot read {path}: {e}")))?;
    decompress(PathBuf::from(path), bytes)
}

fn decompress(path: PathBuf, bytes: Vec<u8>) -> Result<String> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("gz") => {
            let mut decoder = GzDecoder::new(bytes.as_slice());
            let mut out = String::new();
            decoder
                .read_to_string(&mut out)
                .map_err(|e| GrafitoError::Import(format!("gzip decode failed: {e}")))?;
            Ok(out)
        }
        Some(ext @ ("bz2" | "xz" | "zip")) => Err(GrafitoError::Import(format!(
            "unsupported compression scheme: .{ext}"
        ))),
        _ => String::from_utf8(bytes)
            .map_err(|e| GrafitoError::Import(format!("source is not UTF-8: {e}"))),
    }
}

fn fetch_http(url: &str, options: &LoadOptions) -> Result<String> {
    let cache_path = cache_location(url, options);
    if let Some(path) = &cache_path {
        if let Ok(cached) = std::fs::read_to_string(path) {
            debug!("apoc.load cache hit for {url}");
            return Ok(cached);
        }
    }

    let client = reqwest::blocking::Client::builder()
        .timeout(options.timeout)
        .build()
        .map_err(|e| GrafitoError::Import(format!("http client error: {e}")))?;

    let mut last_error = None;
    for attempt in 0..=options.retry {
        let mut request = match options.method.as_str() {
            "GET" => client.get(url),
            "POST" => client.post(url),
            "PUT" => client.put(url),
            "DELETE" => client.delete(url),
            other => {
                return Err(GrafitoError::Configuration(format!(
                    "unsupported http method: {other}"
                )))
            }
        };
        for (name, value) in &options.headers {
            request = request.header(name, value);
        }
        match &options.auth {
            Some(AuthSpec::Basic { user, password }) => {
                request = request.basic_auth(user, Some(password));
            }
            Some(AuthSpec::Bearer(token)) => {
                request = request.bearer_auth(token);
            }
            None => {}
        }
        if let Some(payload) = &options.payload {
            request = request.body(payload.clone());
        }

        match request.send() {
            Ok(response) if response.status().is_success() => {
                let body = response
                    .text()
                    .map_err(|e| GrafitoError::Import(format!("http read failed: {e}")))?;
                let body = if url.ends_with(".gz") {
                    decompress(PathBuf::from(url), body.into_bytes())?
                } else {
                    body
                };
                if let Some(path) = &cache_path {
                    let _ = std::fs::write(path, &body);
                }
                return Ok(body);
            }
            Ok(response) => {
                last_error = Some(GrafitoError::Import(format!(
                    "http status {} from {url}",
                    response.status()
                )));
            }
            Err(error) => {
                last_error = Some(GrafitoError::Import(format!("http error: {error}")));
            }
        }
        debug!("apoc.load attempt {attempt} failed for {url}");
    }
    Err(last_error.unwrap_or_else(|| GrafitoError::Import(format!("request failed: {url}"))))
}

/// Cache file path when caching applies to this request
fn cache_location(url: &str, options: &LoadOptions) -> Option<PathBuf> {
    if !options.is_pure_get() {
        return None;
    }
    let dir = std::env::var(CACHE_DIR_ENV).ok()?;
    let dir = PathBuf::from(dir);
    if !dir.is_dir() {
        return None;
    }
    let mut hasher = DefaultHasher::new();
    url.hash(&mut hasher);
    Some(dir.join(format!("apoc-{:016x}.json", hasher.finish())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_local_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, r#"{"name": "x", "n": 3}"#).unwrap();
        let options = LoadOptions::default();
        let text = fetch_text(path.to_str().unwrap(), &options).unwrap();
        let rows = decode_rows(&text).unwrap();
        assert_eq!(rows.len(), 1);
        let Value::Map(entries) = &rows[0] else {
            panic!("map expected");
        };
        assert_eq!(entries.get("n"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_load_jsonl_yields_row_per_line() {
        let text = "{\"a\": 1}\n{\"a\": 2}\n";
        let rows = decode_rows(text).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_gzip_detection_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json.gz");
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"[1, 2, 3]").unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();
        let text = fetch_text(path.to_str().unwrap(), &LoadOptions::default()).unwrap();
        assert_eq!(text, "[1, 2, 3]");
    }

    #[test]
    fn test_unsupported_compression() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json.zip");
        std::fs::write(&path, b"zipzip").unwrap();
        let err = fetch_text(path.to_str().unwrap(), &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, GrafitoError::Import(_)));
    }

    #[test]
    fn test_malformed_json_is_import_error() {
        assert!(matches!(
            decode_rows("{not json"),
            Err(GrafitoError::Import(_))
        ));
    }
}
