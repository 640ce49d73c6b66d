//! Declarative HTTP test execution.
//!
//! A [`Test`] describes a request and the checks its response must pass.
//! Tests are compiled against an [`EngineConfig`], performed over HTTP(S) or
//! one of the local pseudo-schemes (`file://`, `bash://`, `sql://`), retried
//! according to their poll policy and grouped into a [`Suite`] or a
//! concurrently executed [`Collection`].

pub mod check;
pub mod config;
pub mod error;
pub mod extract;
pub mod http;
pub mod pseudo;
pub mod status;
pub mod suite;
pub mod template;
pub mod testing;

pub use check::{Check, Condition};
pub use config::EngineConfig;
pub use error::{CheckError, CompileError, SuiteError, TestError, TransportError};
pub use extract::Extractor;
pub use crate::http::{Request, Response};
pub use status::{CheckResult, Criticality, Status};
pub use suite::{Collection, Suite};
pub use testing::{Execution, Poll, Test};
