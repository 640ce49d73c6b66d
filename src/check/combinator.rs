//! Boolean combinators over lists of checks.

use serde::{Deserialize, Serialize};

use super::{Check, Verify};
use crate::error::CheckError;
use crate::testing::Test;

fn prepare_all(checks: &mut [Check], test: &Test) -> Result<(), CheckError> {
    if checks.is_empty() {
        return Err(CheckError::Malformed("no sub-checks given".to_string()));
    }
    let errors: Vec<CheckError> = checks
        .iter_mut()
        .filter_map(|check| check.prepare(test).err())
        .collect();
    into_result(errors)
}

fn into_result(mut errors: Vec<CheckError>) -> Result<(), CheckError> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(CheckError::List(errors)),
    }
}

/// Passes as soon as one of the sub-checks passes. Later sub-checks are not
/// executed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnyOne {
    pub of: Vec<Check>,
}

impl Verify for AnyOne {
    fn prepare(&mut self, test: &Test) -> Result<(), CheckError> {
        prepare_all(&mut self.of, test)
    }

    fn execute(&self, test: &Test) -> Result<(), CheckError> {
        let mut errors = Vec::with_capacity(self.of.len());
        for check in &self.of {
            match check.execute(test) {
                Ok(()) => return Ok(()),
                Err(err) => errors.push(err),
            }
        }
        Err(CheckError::List(errors))
    }
}

/// Passes only if every sub-check fails. All sub-checks are executed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoneOf {
    pub of: Vec<Check>,
}

impl Verify for NoneOf {
    fn prepare(&mut self, test: &Test) -> Result<(), CheckError> {
        prepare_all(&mut self.of, test)
    }

    fn execute(&self, test: &Test) -> Result<(), CheckError> {
        let mut first_pass = None;
        let mut malformed = Vec::new();
        for (index, check) in self.of.iter().enumerate() {
            match check.execute(test) {
                Ok(()) => {
                    first_pass.get_or_insert(index + 1);
                }
                Err(err) if err.is_malformed() => malformed.push(err),
                Err(_) => {}
            }
        }
        into_result(malformed)?;
        match first_pass {
            Some(ordinal) => Err(CheckError::failed(format!("check {ordinal} passed"))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::spy::Spy;
    use crate::check::{NoServerError, StatusCode};
    use crate::http::Response;

    fn test() -> Test {
        Test {
            response: Some(Response::synthetic(200, "OK", "")),
            ..Default::default()
        }
    }

    #[test]
    fn any_one_short_circuits_on_first_pass() {
        let (a, b) = (Spy::new(true), Spy::new(true));
        let any = AnyOne {
            of: vec![Check::Spy(a.clone()), Check::Spy(b.clone())],
        };
        assert_eq!(any.execute(&test()), Ok(()));
        assert_eq!((a.calls(), b.calls()), (1, 0));
    }

    #[test]
    fn any_one_runs_next_after_failure_and_aggregates() {
        for (pass_a, pass_b) in [(false, true), (false, false)] {
            let (a, b) = (Spy::new(pass_a), Spy::new(pass_b));
            let any = AnyOne {
                of: vec![Check::Spy(a.clone()), Check::Spy(b.clone())],
            };
            let result = any.execute(&test());
            assert_eq!((a.calls(), b.calls()), (1, 1));
            match result {
                Ok(()) => assert!(pass_b),
                Err(CheckError::List(errors)) => assert_eq!(errors.len(), 2),
                Err(other) => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn none_of_always_executes_every_check() {
        for (pass_a, pass_b) in [(true, true), (true, false), (false, true), (false, false)] {
            let (a, b) = (Spy::new(pass_a), Spy::new(pass_b));
            let none = NoneOf {
                of: vec![Check::Spy(a.clone()), Check::Spy(b.clone())],
            };
            let result = none.execute(&test());
            assert_eq!((a.calls(), b.calls()), (1, 1));
            assert_eq!(result.is_ok(), !pass_a && !pass_b);
        }
    }

    #[test]
    fn none_of_reports_first_passing_ordinal() {
        let none = NoneOf {
            of: vec![
                Check::StatusCode(StatusCode { expect: 404 }),
                Check::NoServerError(NoServerError {}),
                Check::StatusCode(StatusCode { expect: 200 }),
            ],
        };
        assert_eq!(
            none.execute(&test()),
            Err(CheckError::failed("check 2 passed"))
        );
    }

    #[test]
    fn preparation_aggregates_failures_and_rejects_empty_lists() {
        let mut any = AnyOne {
            of: vec![
                Check::StatusCode(StatusCode { expect: 0 }),
                Check::NoServerError(NoServerError {}),
                Check::StatusCode(StatusCode { expect: 1000 }),
            ],
        };
        match any.prepare(&test()) {
            Err(CheckError::List(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
        assert!(NoneOf::default().prepare(&test()).unwrap_err().is_malformed());
    }
}
