use std::fmt::{self, Display};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CheckError;

/// Verdict of a check, a test or a suite.
///
/// The variants are ordered by severity so that aggregating statuses is a
/// plain `max`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Status {
    #[default]
    NotRun,
    Pass,
    Skipped,
    Fail,
    Error,
    Bogus,
}

impl Status {
    pub const ALL: [Status; 6] = [
        Status::NotRun,
        Status::Pass,
        Status::Skipped,
        Status::Fail,
        Status::Error,
        Status::Bogus,
    ];
}

impl Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::NotRun => "NotRun",
            Status::Pass => "Pass",
            Status::Skipped => "Skipped",
            Status::Fail => "Fail",
            Status::Error => "Error",
            Status::Bogus => "Bogus",
        };
        write!(f, "{label}")
    }
}

/// Business severity of a test. Carried along, never interpreted here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Criticality {
    #[default]
    Default,
    Ignore,
    Info,
    Warn,
    Error,
    Fatal,
}

/// Outcome of one check for one try of a test.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckResult {
    pub name: String,
    pub status: Status,
    pub duration: Duration,
    pub error: Option<CheckError>,
}

impl CheckResult {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub(crate) fn reset(&mut self) {
        self.status = Status::NotRun;
        self.duration = Duration::ZERO;
        self.error = None;
    }
}
