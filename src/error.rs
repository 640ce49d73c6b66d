//! Error types for the test engine.
//!
//! Errors keep their payloads as plain strings so that a finished [`Test`]
//! can be cloned and inspected without holding on to I/O handles.
//!
//! [`Test`]: crate::testing::Test

use thiserror::Error;

use crate::status::Status;

/// Malformed `{{NOW ...}}` or `{{RANDOM ...}}` placeholders.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("malformed NOW placeholder `{{{{{placeholder}}}}}`: {reason}")]
    MalformedNow { placeholder: String, reason: String },

    #[error("malformed RANDOM placeholder `{{{{{placeholder}}}}}`: {reason}")]
    MalformedRandom { placeholder: String, reason: String },
}

/// The declaration could not be turned into a performable operation.
///
/// A compile error makes the test Bogus and is never retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("invalid URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("parameters as {mode} are not allowed on {method} requests")]
    IllegalMode { mode: String, method: String },

    #[error("cannot send parameters as {mode} together with a literal body")]
    BodyAndParams { mode: String },

    #[error("method {method} is not supported for {scheme}:// requests")]
    UnsupportedMethod { method: String, scheme: String },

    #[error("file `{path}`: {reason}")]
    File { path: String, reason: String },

    #[error("invalid header `{name}`: {reason}")]
    Header { name: String, reason: String },

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("malformed pseudo-query: {0}")]
    MalformedPseudoQuery(String),

    #[error("check #{index} ({name}) cannot be prepared: {source}")]
    Check {
        index: usize,
        name: String,
        source: CheckError,
    },

    #[error("cannot instantiate test: {0}")]
    Instantiate(String),
}

/// Performing the compiled operation failed; checks did not run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("timed out after {0} ms")]
    Timeout(u128),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("script error: {0}")]
    Script(String),

    #[error("database error: {0}")]
    Database(String),
}

/// Outcome of a failed check.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CheckError {
    #[error("{0}")]
    Failed(String),

    #[error("malformed check: {0}")]
    Malformed(String),

    #[error("check executed before it was prepared")]
    NotPrepared,

    #[error("not found")]
    NotFound,

    #[error("found forbidden")]
    FoundForbidden,

    #[error("found {got} occurrences, want {want}")]
    WrongCount { got: usize, want: i64 },

    #[error("{}", join_errors(.0))]
    List(Vec<CheckError>),
}

impl CheckError {
    pub fn failed(message: impl Into<String>) -> Self {
        CheckError::Failed(message.into())
    }

    /// The check could not be evaluated at all.
    pub fn is_malformed(&self) -> bool {
        match self {
            CheckError::Malformed(_) | CheckError::NotPrepared => true,
            CheckError::List(errors) => errors.iter().any(CheckError::is_malformed),
            _ => false,
        }
    }

    /// Status recorded on a check result holding this error.
    pub fn status(&self) -> Status {
        if self.is_malformed() {
            Status::Bogus
        } else {
            Status::Fail
        }
    }
}

fn join_errors(errors: &[CheckError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Check registry lookups and decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown check `{name}`{}", suggest(.suggestions))]
    Unknown {
        name: String,
        suggestions: Vec<String>,
    },

    #[error("ambiguous check `{name}`, candidates: {}", .candidates.join(", "))]
    Ambiguous {
        name: String,
        candidates: Vec<String>,
    },

    #[error("missing `check` discriminator")]
    MissingDiscriminator,

    #[error("cannot decode check {name}: {reason}")]
    Decode { name: String, reason: String },
}

fn suggest(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(", did you mean {}?", suggestions.join(", "))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("nothing to extract from: {0}")]
    NotFound(String),

    #[error("malformed extractor: {0}")]
    Malformed(String),
}

/// Error recorded on a test after a run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TestError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Check(#[from] CheckError),
}

/// A test of a suite or collection that did not pass.
#[derive(Debug, Clone, PartialEq)]
pub struct TestFailure {
    pub test: String,
    pub status: Status,
    pub error: TestError,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{} test(s) did not pass: {}", .failures.len(), summarize(.failures))]
pub struct SuiteError {
    pub failures: Vec<TestFailure>,
}

fn summarize(failures: &[TestFailure]) -> String {
    failures
        .iter()
        .map(|failure| format!("{} ({}): {}", failure.test, failure.status, failure.error))
        .collect::<Vec<_>>()
        .join("; ")
}
