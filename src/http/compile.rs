//! Turns a declarative [`Request`] into a [`CompiledRequest`].

use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use http::HeaderMap;
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, COOKIE, HeaderName, HeaderValue, USER_AGENT};
use rand::Rng;
use url::Url;

use super::method::HttpMethod;
use super::multipart::{self, FileValue};
use super::request::{ParamsAs, Request};
use crate::config::EngineConfig;
use crate::error::CompileError;
use crate::pseudo;
use crate::template::Replacer;

pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
/// Header naming the data source of a `sql://` request.
pub const DATA_SOURCE_NAME: &str = "Data-Source-Name";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
    File,
    Bash,
    Sql,
}

impl Scheme {
    fn parse(scheme: &str) -> Option<Self> {
        match scheme {
            "http" => Some(Scheme::Http),
            "https" => Some(Scheme::Https),
            "file" => Some(Scheme::File),
            "bash" => Some(Scheme::Bash),
            "sql" => Some(Scheme::Sql),
            _ => None,
        }
    }

    pub fn is_network(self) -> bool {
        matches!(self, Scheme::Http | Scheme::Https)
    }
}

impl Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
            Scheme::File => "file",
            Scheme::Bash => "bash",
            Scheme::Sql => "sql",
        };
        write!(f, "{label}")
    }
}

/// A fully resolved operation, including the exact body bytes to send.
#[derive(Debug, Clone)]
pub struct CompiledRequest {
    pub scheme: Scheme,
    pub method: HttpMethod,
    pub url: Url,
    pub header: HeaderMap,
    pub body: Bytes,
    /// Resolved parameters in transmission order.
    pub params: Vec<(String, String)>,
    pub follow_redirects: bool,
    pub chunked: bool,
    pub timeout: Duration,
}

impl CompiledRequest {
    pub fn request_line(&self) -> String {
        format!("{} {}", self.method, self.url)
    }

    /// Request line, headers and body as they go over the wire.
    pub fn wire_dump(&self) -> String {
        let mut out = self.request_line();
        out.push('\n');
        for (name, value) in &self.header {
            out.push_str(&format!("{name}: {}\n", value.to_str().unwrap_or("<binary>")));
        }
        if !self.body.is_empty() {
            out.push('\n');
            out.push_str(&String::from_utf8_lossy(&self.body));
        }
        out
    }

    /// Equivalent `curl` invocation.
    pub fn curl(&self) -> String {
        let mut parts = vec![
            "curl".to_string(),
            "-X".to_string(),
            self.method.to_string(),
            shell_quote(self.url.as_str()),
        ];
        for (name, value) in &self.header {
            parts.push("-H".to_string());
            parts.push(shell_quote(&format!(
                "{name}: {}",
                value.to_str().unwrap_or_default()
            )));
        }
        if !self.body.is_empty() {
            parts.push("--data-binary".to_string());
            parts.push(shell_quote(&String::from_utf8_lossy(&self.body)));
        }
        if self.follow_redirects {
            parts.push("-L".to_string());
        }
        parts.join(" ")
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.header.get(name).and_then(|value| value.to_str().ok())
    }
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Compiles requests against one engine configuration.
#[derive(Debug, Clone)]
pub struct RequestCompiler {
    config: Arc<EngineConfig>,
}

impl RequestCompiler {
    pub fn new(config: Arc<EngineConfig>) -> Self {
        Self { config }
    }

    pub fn compile<R: Rng>(
        &self,
        request: &Request,
        replacer: &mut Replacer<R>,
    ) -> Result<CompiledRequest, CompileError> {
        let raw_url = replacer.replace(&request.url)?;
        let mut url = Url::parse(&raw_url).map_err(|err| CompileError::InvalidUrl {
            url: raw_url.clone(),
            reason: err.to_string(),
        })?;
        let scheme = Scheme::parse(url.scheme()).ok_or_else(|| CompileError::InvalidUrl {
            url: raw_url.clone(),
            reason: format!("unsupported scheme `{}`", url.scheme()),
        })?;

        let method = request.method;
        if request.params_as != ParamsAs::Url {
            if method.is_bodyless() {
                return Err(CompileError::IllegalMode {
                    mode: request.params_as.to_string(),
                    method: method.to_string(),
                });
            }
            if !request.body.is_empty() {
                return Err(CompileError::BodyAndParams {
                    mode: request.params_as.to_string(),
                });
            }
        }

        let params = resolve_params(&request.params, replacer)?;

        let mut header = HeaderMap::new();
        for (name, value) in &request.header {
            append_header(&mut header, &replacer.replace(name)?, &replacer.replace(value)?)?;
        }

        let (body, content_type) = match request.params_as {
            ParamsAs::Url => {
                if !params.is_empty() {
                    url.query_pairs_mut().extend_pairs(&params);
                }
                (literal_body(&request.body, replacer)?, None)
            }
            ParamsAs::Body => {
                let encoded = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(&params)
                    .finish();
                (Bytes::from(encoded), Some(FORM_URLENCODED.to_string()))
            }
            ParamsAs::Multipart => {
                let parts = multipart::build_parts(&params, replacer)?;
                let boundary = multipart::boundary();
                (
                    Bytes::from(multipart::encode(&parts, &boundary)),
                    Some(multipart::content_type(&boundary)),
                )
            }
        };

        if let Some(content_type) = content_type {
            set_default(&mut header, CONTENT_TYPE, &content_type)?;
        }
        if scheme.is_network() {
            set_default(&mut header, ACCEPT, &self.config.accept)?;
            set_default(&mut header, USER_AGENT, &self.config.user_agent)?;
            for (name, value) in &self.config.default_headers {
                if !header.contains_key(name.as_str()) {
                    append_header(&mut header, name, value)?;
                }
            }
        }

        if !request.cookies.is_empty() {
            let mut pairs = Vec::with_capacity(request.cookies.len());
            for cookie in &request.cookies {
                pairs.push(format!(
                    "{}={}",
                    replacer.replace(&cookie.name)?,
                    replacer.replace(&cookie.value)?
                ));
            }
            append_header(&mut header, COOKIE.as_str(), &pairs.join("; "))?;
        }

        if let Some(auth) = &request.basic_auth {
            let credentials = format!(
                "{}:{}",
                replacer.replace(&auth.username)?,
                replacer.replace(&auth.password)?
            );
            set_default(
                &mut header,
                AUTHORIZATION,
                &format!("Basic {}", STANDARD.encode(credentials)),
            )?;
        }

        let compiled = CompiledRequest {
            scheme,
            method,
            url,
            header,
            body,
            params,
            follow_redirects: request.follow_redirects,
            chunked: request.chunked,
            timeout: request
                .timeout_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| self.config.timeout()),
        };
        validate_pseudo_request(&compiled)?;
        Ok(compiled)
    }
}

fn resolve_params<R: Rng>(
    params: &BTreeMap<String, Vec<String>>,
    replacer: &mut Replacer<R>,
) -> Result<Vec<(String, String)>, CompileError> {
    let mut resolved = Vec::new();
    for (name, values) in params {
        let name = replacer.replace(name)?;
        for value in values {
            resolved.push((name.clone(), replacer.replace(value)?));
        }
    }
    Ok(resolved)
}

/// Body text after substitution; `@file:` / `@vfile:` load the body from disk.
fn literal_body<R: Rng>(body: &str, replacer: &mut Replacer<R>) -> Result<Bytes, CompileError> {
    let body = replacer.replace(body)?;
    match FileValue::parse(&body)? {
        Some(file) => Ok(Bytes::from(file.load(replacer)?.data)),
        None => Ok(Bytes::from(body)),
    }
}

fn append_header(header: &mut HeaderMap, name: &str, value: &str) -> Result<(), CompileError> {
    let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|err| CompileError::Header {
        name: name.to_string(),
        reason: err.to_string(),
    })?;
    let header_value = HeaderValue::from_str(value).map_err(|err| CompileError::Header {
        name: name.to_string(),
        reason: err.to_string(),
    })?;
    header.append(header_name, header_value);
    Ok(())
}

fn set_default(header: &mut HeaderMap, name: HeaderName, value: &str) -> Result<(), CompileError> {
    if header.contains_key(&name) {
        return Ok(());
    }
    let header_value = HeaderValue::from_str(value).map_err(|err| CompileError::Header {
        name: name.to_string(),
        reason: err.to_string(),
    })?;
    header.insert(name, header_value);
    Ok(())
}

/// Local operations are checked up front so that they fail as Bogus before
/// touching the file system, the shell or a database.
fn validate_pseudo_request(request: &CompiledRequest) -> Result<(), CompileError> {
    let unsupported = || CompileError::UnsupportedMethod {
        method: request.method.to_string(),
        scheme: request.scheme.to_string(),
    };

    match request.scheme {
        Scheme::Http | Scheme::Https => Ok(()),
        Scheme::Bash => match pseudo::bash::working_dir(&request.url) {
            Some(_) => Ok(()),
            None => Err(CompileError::InvalidUrl {
                url: request.url.to_string(),
                reason: "not a local directory".to_string(),
            }),
        },
        Scheme::File => {
            if !matches!(
                request.method,
                HttpMethod::Get | HttpMethod::Put | HttpMethod::Delete
            ) {
                return Err(unsupported());
            }
            let path = request
                .url
                .to_file_path()
                .map_err(|_| CompileError::InvalidUrl {
                    url: request.url.to_string(),
                    reason: "not a local file path".to_string(),
                })?;
            if request.method == HttpMethod::Get && !path.exists() {
                return Err(CompileError::File {
                    path: path.display().to_string(),
                    reason: "no such file".to_string(),
                });
            }
            Ok(())
        }
        Scheme::Sql => {
            if !matches!(request.method, HttpMethod::Get | HttpMethod::Post) {
                return Err(unsupported());
            }
            if request.url.host_str().is_none_or(str::is_empty) {
                return Err(CompileError::MalformedPseudoQuery(
                    "missing database driver in URL host".to_string(),
                ));
            }
            if request
                .header_value(DATA_SOURCE_NAME)
                .is_none_or(|dsn| dsn.trim().is_empty())
            {
                return Err(CompileError::MalformedPseudoQuery(format!(
                    "missing {DATA_SOURCE_NAME} header"
                )));
            }
            if String::from_utf8_lossy(&request.body).trim().is_empty() {
                return Err(CompileError::MalformedPseudoQuery(
                    "missing query in body".to_string(),
                ));
            }
            Ok(())
        }
    }
}
