//! Checks validate the outcome of a test.
//!
//! The set of checks is closed: [`Check`] holds one variant per kind, and the
//! [`registry`] maps the serialized discriminator back to a variant.

mod basic;
mod combinator;
mod condition;
pub mod registry;
#[cfg(test)]
pub(crate) mod spy;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

pub use basic::{Body, ContentType, Header, NoServerError, Redirect, ResponseTime, StatusCode};
pub use combinator::{AnyOne, NoneOf};
pub use condition::{CompiledRegex, Condition};

use crate::error::CheckError;
use crate::http::Response;
use crate::testing::Test;

/// Prepare/execute contract shared by every check kind.
pub trait Verify {
    /// Validate and precompile the check before any try runs.
    fn prepare(&mut self, _test: &Test) -> Result<(), CheckError> {
        Ok(())
    }

    fn execute(&self, test: &Test) -> Result<(), CheckError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "check")]
pub enum Check {
    AnyOne(AnyOne),
    Body(Body),
    ContentType(ContentType),
    Header(Header),
    NoServerError(NoServerError),
    None(NoneOf),
    Redirect(Redirect),
    ResponseTime(ResponseTime),
    StatusCode(StatusCode),
    #[cfg(test)]
    #[serde(skip)]
    Spy(spy::Spy),
}

impl Check {
    /// The registered name of this check.
    pub fn name(&self) -> &'static str {
        match self {
            Check::AnyOne(_) => "AnyOne",
            Check::Body(_) => "Body",
            Check::ContentType(_) => "ContentType",
            Check::Header(_) => "Header",
            Check::NoServerError(_) => "NoServerError",
            Check::None(_) => "None",
            Check::Redirect(_) => "Redirect",
            Check::ResponseTime(_) => "ResponseTime",
            Check::StatusCode(_) => "StatusCode",
            #[cfg(test)]
            Check::Spy(_) => "Spy",
        }
    }

    fn inner(&self) -> &dyn Verify {
        match self {
            Check::AnyOne(check) => check,
            Check::Body(check) => check,
            Check::ContentType(check) => check,
            Check::Header(check) => check,
            Check::NoServerError(check) => check,
            Check::None(check) => check,
            Check::Redirect(check) => check,
            Check::ResponseTime(check) => check,
            Check::StatusCode(check) => check,
            #[cfg(test)]
            Check::Spy(check) => check,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Verify {
        match self {
            Check::AnyOne(check) => check,
            Check::Body(check) => check,
            Check::ContentType(check) => check,
            Check::Header(check) => check,
            Check::NoServerError(check) => check,
            Check::None(check) => check,
            Check::Redirect(check) => check,
            Check::ResponseTime(check) => check,
            Check::StatusCode(check) => check,
            #[cfg(test)]
            Check::Spy(check) => check,
        }
    }

    pub fn prepare(&mut self, test: &Test) -> Result<(), CheckError> {
        self.inner_mut().prepare(test)
    }

    pub fn execute(&self, test: &Test) -> Result<(), CheckError> {
        self.inner().execute(test)
    }

    /// True for exactly `StatusCode{expect: 200}`; prefix forms like `2` do
    /// not count.
    pub fn is_status_200(&self) -> bool {
        matches!(self, Check::StatusCode(StatusCode { expect: 200 }))
    }
}

impl<'de> Deserialize<'de> for Check {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        registry::decode(value).map_err(de::Error::custom)
    }
}

pub(crate) fn response_of(test: &Test) -> Result<&Response, CheckError> {
    test.response
        .as_ref()
        .ok_or_else(|| CheckError::failed("no response available"))
}
