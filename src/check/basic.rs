//! Checks on status, headers, body and timing of a response.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use super::condition::Condition;
use super::{Verify, response_of};
use crate::error::CheckError;
use crate::testing::Test;

fn is_false(b: &bool) -> bool {
    !*b
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

fn is_zero_u16(n: &u16) -> bool {
    *n == 0
}

/// Status code of the response.
///
/// An expectation below 10 matches the first digit only (`2` is any 2xx),
/// one below 100 the first two digits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StatusCode {
    pub expect: u16,
}

impl StatusCode {
    fn matches(&self, status: u16) -> bool {
        match self.expect {
            0..10 => status / 100 == self.expect,
            10..100 => status / 10 == self.expect,
            _ => status == self.expect,
        }
    }
}

impl Verify for StatusCode {
    fn prepare(&mut self, _test: &Test) -> Result<(), CheckError> {
        if self.expect == 0 || self.expect > 599 {
            return Err(CheckError::Malformed(format!(
                "status code {} out of range",
                self.expect
            )));
        }
        Ok(())
    }

    fn execute(&self, test: &Test) -> Result<(), CheckError> {
        let status = response_of(test)?.status;
        if self.matches(status) {
            Ok(())
        } else {
            Err(CheckError::failed(format!(
                "got {status}, want {}",
                self.expect
            )))
        }
    }
}

/// A response header, present (and optionally fulfilling a condition on its
/// first value) or absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Header {
    pub header: String,
    #[serde(flatten)]
    pub condition: Condition,
    #[serde(skip_serializing_if = "is_false")]
    pub absent: bool,
}

impl Verify for Header {
    fn prepare(&mut self, _test: &Test) -> Result<(), CheckError> {
        if self.header.trim().is_empty() {
            return Err(CheckError::Malformed("header name is empty".to_string()));
        }
        self.condition.compile()
    }

    fn execute(&self, test: &Test) -> Result<(), CheckError> {
        let response = response_of(test)?;
        let first = response.header_values(&self.header).next();
        match (first, self.absent) {
            (Some(_), true) => Err(CheckError::FoundForbidden),
            (None, true) => Ok(()),
            (None, false) => Err(CheckError::NotFound),
            (Some(value), false) => self.condition.fulfilled(value),
        }
    }
}

/// The response body as text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Body {
    #[serde(flatten)]
    pub condition: Condition,
}

impl Verify for Body {
    fn prepare(&mut self, _test: &Test) -> Result<(), CheckError> {
        self.condition.compile()
    }

    fn execute(&self, test: &Test) -> Result<(), CheckError> {
        self.condition.fulfilled(&response_of(test)?.body_str())
    }
}

/// Media type and optional charset of the response.
///
/// `is` may be a full media type (`application/json`) or just its subtype
/// (`json`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContentType {
    pub is: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub charset: String,
}

impl Verify for ContentType {
    fn prepare(&mut self, _test: &Test) -> Result<(), CheckError> {
        if self.is.trim().is_empty() {
            return Err(CheckError::Malformed("content type is empty".to_string()));
        }
        Ok(())
    }

    fn execute(&self, test: &Test) -> Result<(), CheckError> {
        let header = response_of(test)?.content_type().ok_or(CheckError::NotFound)?;
        let mut parts = header.split(';').map(str::trim);
        let media_type = parts.next().unwrap_or_default().to_ascii_lowercase();
        let want = self.is.trim().to_ascii_lowercase();

        let type_ok = if want.contains('/') {
            media_type == want
        } else {
            media_type
                .split_once('/')
                .is_some_and(|(_, subtype)| subtype == want)
        };
        if !type_ok {
            return Err(CheckError::failed(format!(
                "content type is {media_type}, want {}",
                self.is
            )));
        }

        if self.charset.is_empty() {
            return Ok(());
        }
        let charset = parts
            .filter_map(|param| param.split_once('='))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("charset"))
            .map(|(_, value)| value.trim().trim_matches('"').to_string());
        match charset {
            Some(charset) if charset.eq_ignore_ascii_case(&self.charset) => Ok(()),
            Some(charset) => Err(CheckError::failed(format!(
                "charset is {charset}, want {}",
                self.charset
            ))),
            None => Err(CheckError::failed(format!(
                "no charset, want {}",
                self.charset
            ))),
        }
    }
}

/// Response duration bounds in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResponseTime {
    #[serde(skip_serializing_if = "is_zero")]
    pub lower: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub higher: u64,
}

impl Verify for ResponseTime {
    fn prepare(&mut self, _test: &Test) -> Result<(), CheckError> {
        if self.lower == 0 && self.higher == 0 {
            return Err(CheckError::Malformed("no bound given".to_string()));
        }
        if self.lower != 0 && self.lower <= self.higher {
            return Err(CheckError::Malformed(format!(
                "lower {}ms is not above higher {}ms",
                self.lower, self.higher
            )));
        }
        Ok(())
    }

    fn execute(&self, test: &Test) -> Result<(), CheckError> {
        let took = response_of(test)?.duration;
        if self.lower != 0 && took >= Duration::from_millis(self.lower) {
            return Err(CheckError::failed(format!(
                "took {}ms, want less than {}ms",
                took.as_millis(),
                self.lower
            )));
        }
        if self.higher != 0 && took <= Duration::from_millis(self.higher) {
            return Err(CheckError::failed(format!(
                "took {}ms, want more than {}ms",
                took.as_millis(),
                self.higher
            )));
        }
        Ok(())
    }
}

/// No 5xx status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoServerError {}

impl Verify for NoServerError {
    fn execute(&self, test: &Test) -> Result<(), CheckError> {
        let status = response_of(test)?.status;
        if status >= 500 {
            return Err(CheckError::failed(format!("server error {status}")));
        }
        Ok(())
    }
}

/// A redirect to a given URL.
///
/// When redirects were followed the target must be one of the recorded
/// hops. Otherwise the response itself must be a 3xx (equal to
/// `status_code` if set) whose `Location` resolves to the target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Redirect {
    pub to: String,
    #[serde(skip_serializing_if = "is_zero_u16")]
    pub status_code: u16,
}

impl Verify for Redirect {
    fn prepare(&mut self, _test: &Test) -> Result<(), CheckError> {
        if self.to.trim().is_empty() {
            return Err(CheckError::Malformed("redirect target is empty".to_string()));
        }
        if self.status_code != 0 && !(300..400).contains(&self.status_code) {
            return Err(CheckError::Malformed(format!(
                "{} is not a redirect status",
                self.status_code
            )));
        }
        Ok(())
    }

    fn execute(&self, test: &Test) -> Result<(), CheckError> {
        let response = response_of(test)?;
        if !response.redirections.is_empty() {
            if response.redirections.iter().any(|hop| hop == &self.to) {
                return Ok(());
            }
            return Err(CheckError::failed(format!(
                "redirected via {}, not to {}",
                response.redirections.join(" -> "),
                self.to
            )));
        }

        if !(300..400).contains(&response.status) {
            return Err(CheckError::failed(format!(
                "no redirect, got status {}",
                response.status
            )));
        }
        if self.status_code != 0 && response.status != self.status_code {
            return Err(CheckError::failed(format!(
                "got status {}, want {}",
                response.status, self.status_code
            )));
        }

        let location = response.header_value("location").ok_or(CheckError::NotFound)?;
        let target = test
            .compiled
            .as_ref()
            .and_then(|compiled| compiled.url.join(location).ok())
            .map(|url| url.to_string())
            .unwrap_or_else(|| location.to_string());
        if target == self.to || Url::parse(&self.to).is_ok_and(|want| want.as_str() == target) {
            Ok(())
        } else {
            Err(CheckError::failed(format!(
                "redirected to {target}, want {}",
                self.to
            )))
        }
    }
}
