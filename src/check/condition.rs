//! A reusable string condition shared by several checks.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CheckError;

fn is_zero(n: &i64) -> bool {
    *n == 0
}

fn is_zero_usize(n: &usize) -> bool {
    *n == 0
}

/// Conditions a string must fulfill. Unset fields are not checked.
///
/// `count` applies to `contains` and `regexp`: 0 requires at least one
/// occurrence, a positive value exactly that many and a negative value
/// forbids any occurrence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Condition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equals: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub prefix: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub suffix: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub contains: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub regexp: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub count: i64,
    #[serde(skip_serializing_if = "is_zero_usize")]
    pub min: usize,
    #[serde(skip_serializing_if = "is_zero_usize")]
    pub max: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub greater_than: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub less_than: Option<f64>,

    /// Filled by [`Condition::compile`].
    #[serde(skip)]
    pub compiled: CompiledRegex,
}

/// The compiled form of [`Condition::regexp`]. Two conditions compare equal
/// regardless of whether either has been compiled.
#[derive(Debug, Clone, Default)]
pub struct CompiledRegex(Option<Regex>);

impl CompiledRegex {
    pub fn get(&self) -> Option<&Regex> {
        self.0.as_ref()
    }
}

impl PartialEq for CompiledRegex {
    fn eq(&self, _: &Self) -> bool {
        true
    }
}

impl Condition {
    pub fn contains(needle: impl Into<String>, count: i64) -> Self {
        Self {
            contains: needle.into(),
            count,
            ..Default::default()
        }
    }

    /// Compile the regular expression, if any.
    pub fn compile(&mut self) -> Result<(), CheckError> {
        if self.regexp.is_empty() {
            self.compiled = CompiledRegex(None);
            return Ok(());
        }
        let re = Regex::new(&self.regexp)
            .map_err(|err| CheckError::Malformed(format!("regexp `{}`: {err}", self.regexp)))?;
        self.compiled = CompiledRegex(Some(re));
        Ok(())
    }

    pub fn fulfilled(&self, s: &str) -> Result<(), CheckError> {
        if let Some(want) = &self.equals {
            if s != want {
                return Err(CheckError::failed(format!(
                    "unequal, was {}",
                    quote_excerpt(s)
                )));
            }
        }
        if !s.starts_with(&self.prefix) {
            return Err(CheckError::failed(format!(
                "bad prefix, got {}",
                quote_excerpt(s)
            )));
        }
        if !s.ends_with(&self.suffix) {
            return Err(CheckError::failed(format!(
                "bad suffix, got {}",
                quote_excerpt(s)
            )));
        }
        if !self.contains.is_empty() {
            check_count(s.matches(self.contains.as_str()).count(), self.count)?;
        }
        if !self.regexp.is_empty() {
            let re = self.compiled.get().ok_or(CheckError::NotPrepared)?;
            check_count(re.find_iter(s).count(), self.count)?;
        }

        let length = s.chars().count();
        if self.min > 0 && length < self.min {
            return Err(CheckError::failed(format!(
                "too short, was {length}, want at least {}",
                self.min
            )));
        }
        if self.max > 0 && length > self.max {
            return Err(CheckError::failed(format!(
                "too long, was {length}, want at most {}",
                self.max
            )));
        }

        if self.greater_than.is_some() || self.less_than.is_some() {
            let value: f64 = s
                .trim()
                .parse()
                .map_err(|_| CheckError::failed(format!("{} is not a number", quote_excerpt(s))))?;
            if let Some(bound) = self.greater_than {
                if value <= bound {
                    return Err(CheckError::failed(format!(
                        "{value} is not greater than {bound}"
                    )));
                }
            }
            if let Some(bound) = self.less_than {
                if value >= bound {
                    return Err(CheckError::failed(format!(
                        "{value} is not less than {bound}"
                    )));
                }
            }
        }
        Ok(())
    }
}

fn check_count(got: usize, want: i64) -> Result<(), CheckError> {
    match want {
        0 if got == 0 => Err(CheckError::NotFound),
        n if n < 0 && got > 0 => Err(CheckError::FoundForbidden),
        n if n > 0 && got as i64 != n => Err(CheckError::WrongCount { got, want: n }),
        _ => Ok(()),
    }
}

fn quote_excerpt(s: &str) -> String {
    const LIMIT: usize = 40;
    if s.chars().count() <= LIMIT {
        format!("{s:?}")
    } else {
        let head: String = s.chars().take(LIMIT).collect();
        format!("{head:?}...")
    }
}
