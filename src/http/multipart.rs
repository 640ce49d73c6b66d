//! `multipart/form-data` encoding and the `@file:` / `@vfile:` value forms.
//!
//! The body is encoded by hand (instead of through reqwest's multipart
//! support) so the exact bytes sent are known before the request leaves.

use std::fs;
use std::path::{Path, PathBuf};

use rand::Rng;

use crate::error::CompileError;
use crate::template::Replacer;

pub const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    Disk(PathBuf),
    Inline { filename: String, data: String },
}

/// A parameter or body value of the form `@file:...` or `@vfile:...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileValue {
    substitute: bool,
    source: Source,
}

/// Content of a file value after loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedFile {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl FileValue {
    /// `Ok(None)` for ordinary values.
    pub fn parse(value: &str) -> Result<Option<Self>, CompileError> {
        let (substitute, rest) = if let Some(rest) = value.strip_prefix("@vfile:") {
            (true, rest)
        } else if let Some(rest) = value.strip_prefix("@file:") {
            (false, rest)
        } else {
            return Ok(None);
        };

        let source = match rest.strip_prefix('@') {
            Some(inline) => {
                let (filename, data) =
                    inline.split_once(':').ok_or_else(|| CompileError::File {
                        path: rest.to_string(),
                        reason: "inline data must look like @<name>:<data>".to_string(),
                    })?;
                Source::Inline {
                    filename: filename.to_string(),
                    data: data.to_string(),
                }
            }
            None => Source::Disk(PathBuf::from(rest)),
        };

        Ok(Some(Self { substitute, source }))
    }

    /// Inline data is used as given; files read from disk are substituted
    /// when written as `@vfile:`.
    pub fn load<R: Rng>(&self, replacer: &mut Replacer<R>) -> Result<LoadedFile, CompileError> {
        match &self.source {
            Source::Inline { filename, data } => Ok(LoadedFile {
                filename: filename.clone(),
                content_type: OCTET_STREAM.to_string(),
                data: data.clone().into_bytes(),
            }),
            Source::Disk(path) => {
                let file_error = |reason: String| CompileError::File {
                    path: path.display().to_string(),
                    reason,
                };
                let raw = fs::read(path).map_err(|err| file_error(err.to_string()))?;
                let data = if self.substitute {
                    let text = String::from_utf8(raw)
                        .map_err(|_| file_error("@vfile content is not UTF-8".to_string()))?;
                    replacer.replace(&text)?.into_bytes()
                } else {
                    raw
                };
                Ok(LoadedFile {
                    filename: file_name(path),
                    content_type: mime_guess::from_path(path)
                        .first_raw()
                        .unwrap_or(OCTET_STREAM)
                        .to_string(),
                    data,
                })
            }
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Plain fields first, file fields after; each group keeps parameter order.
pub fn build_parts<R: Rng>(
    params: &[(String, String)],
    replacer: &mut Replacer<R>,
) -> Result<Vec<Part>, CompileError> {
    let mut fields = Vec::new();
    let mut files = Vec::new();

    for (name, value) in params {
        match FileValue::parse(value)? {
            None => fields.push(Part {
                name: name.clone(),
                filename: None,
                content_type: None,
                data: value.clone().into_bytes(),
            }),
            Some(file) => {
                let loaded = file.load(replacer)?;
                files.push(Part {
                    name: name.clone(),
                    filename: Some(loaded.filename),
                    content_type: Some(loaded.content_type),
                    data: loaded.data,
                });
            }
        }
    }

    fields.extend(files);
    Ok(fields)
}

pub fn boundary() -> String {
    format!("{:032x}", rand::random::<u128>())
}

pub fn content_type(boundary: &str) -> String {
    format!("multipart/form-data; boundary={boundary}")
}

pub fn encode(parts: &[Part], boundary: &str) -> Vec<u8> {
    let mut out = Vec::new();
    for part in parts {
        out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        let mut disposition = format!(
            "Content-Disposition: form-data; name=\"{}\"",
            escape_quotes(&part.name)
        );
        if let Some(filename) = &part.filename {
            disposition.push_str(&format!("; filename=\"{}\"", escape_quotes(filename)));
        }
        out.extend_from_slice(disposition.as_bytes());
        out.extend_from_slice(b"\r\n");
        if let Some(content_type) = &part.content_type {
            out.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&part.data);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    out
}

fn escape_quotes(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
