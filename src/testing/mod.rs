//! # Test state machine
//!
//! A [`Test`] is one declarative unit: a request, a list of checks and an
//! execution policy. Running it compiles the request, performs it, evaluates
//! the checks and retries according to its poll policy.
//!
//! ```text
//! NotRun -> Bogus                       (compile or preparation failure)
//! NotRun -> Skipped                     (negative poll maximum)
//! NotRun -> try 1..n -> Pass | Fail | Error
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::cookie::Jar;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::check::Check;
use crate::config::EngineConfig;
use crate::error::{CheckError, CompileError, TemplateError, TestError};
use crate::extract::Extractor;
use crate::http::{CompiledRequest, Request, RequestCompiler, Response, client};
use crate::status::{CheckResult, Criticality, Status};
use crate::template::{Replacer, substitute_variables};

/// Retry policy. A negative `max` skips the test, 0 and 1 both mean a
/// single try.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Poll {
    pub max: i32,
    pub sleep_ms: u64,
}

/// Pauses around the operation and logging detail.
///
/// Verbosity 1 logs the request line, 2 adds redirects and timings, 3 the
/// full wire dump and an equivalent curl command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Execution {
    pub pre_sleep_ms: u64,
    pub inter_sleep_ms: u64,
    pub post_sleep_ms: u64,
    pub verbosity: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Test {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub request: Request,
    pub checks: Vec<Check>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,
    pub poll: Poll,
    pub execution: Execution,
    pub criticality: Criticality,
    /// Values to capture after a passing run, keyed by variable name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub data_extraction: BTreeMap<String, Extractor>,

    #[serde(skip)]
    pub status: Status,
    #[serde(skip)]
    pub error: Option<TestError>,
    #[serde(skip)]
    pub check_results: Vec<CheckResult>,
    #[serde(skip)]
    pub response: Option<Response>,
    #[serde(skip)]
    pub compiled: Option<CompiledRequest>,
    #[serde(skip)]
    pub tries: u32,
    #[serde(skip)]
    pub duration: Duration,
    /// `checks` with this run's variables substituted, as prepared.
    #[serde(skip)]
    pub(crate) prepared: Vec<Check>,
    #[serde(skip)]
    pub(crate) jar: Option<Arc<Jar>>,
    #[serde(skip)]
    pub(crate) config: Arc<EngineConfig>,
}

async fn pause(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

fn substitute_value(value: Value, variables: &BTreeMap<String, String>) -> Value {
    match value {
        Value::String(s) => Value::String(substitute_variables(&s, variables)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| substitute_value(item, variables))
                .collect(),
        ),
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(key, item)| {
                    (
                        substitute_variables(&key, variables),
                        substitute_value(item, variables),
                    )
                })
                .collect(),
        ),
        other => other,
    }
}

fn replace_value(value: Value, replacer: &mut Replacer) -> Result<Value, TemplateError> {
    Ok(match value {
        Value::String(s) => Value::String(replacer.replace(&s)?),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| replace_value(item, replacer))
                .collect::<Result<_, TemplateError>>()?,
        ),
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(key, item)| Ok((key, replace_value(item, replacer)?)))
                .collect::<Result<_, TemplateError>>()?,
        ),
        other => other,
    })
}

/// `check` with every string field passed through `replacer`.
fn substitute_check(check: &Check, replacer: &mut Replacer) -> Result<Check, CheckError> {
    let Ok(declaration) = serde_json::to_value(check) else {
        // Only test doubles refuse to serialize; they carry no strings.
        return Ok(check.clone());
    };
    let substituted = replace_value(declaration, replacer)
        .map_err(|err| CheckError::Malformed(err.to_string()))?;
    serde_json::from_value(substituted).map_err(|err| CheckError::Malformed(err.to_string()))
}

impl Test {
    pub fn new(name: impl Into<String>, request: Request) -> Self {
        Self {
            name: name.into(),
            request,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &Arc<EngineConfig> {
        &self.config
    }

    pub fn set_config(&mut self, config: Arc<EngineConfig>) {
        self.config = config;
    }

    pub fn jar(&self) -> Option<&Arc<Jar>> {
        self.jar.as_ref()
    }

    /// Cookie store used for every request of this test.
    pub fn set_jar(&mut self, jar: Option<Arc<Jar>>) {
        self.jar = jar;
    }

    /// A fresh copy of this test with `variables` substituted into every
    /// string of the declaration. The test's own variables take precedence.
    pub fn instantiate(&self, variables: &BTreeMap<String, String>) -> Result<Test, CompileError> {
        let mut merged = variables.clone();
        merged.extend(
            self.variables
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );

        let declaration = serde_json::to_value(self)
            .map_err(|err| CompileError::Instantiate(format!("{}: {err}", self.name)))?;
        let mut test: Test = serde_json::from_value(substitute_value(declaration, &merged))
            .map_err(|err| CompileError::Instantiate(format!("{}: {err}", self.name)))?;
        test.variables = merged;
        test.config = self.config.clone();
        test.jar = self.jar.clone();
        Ok(test)
    }

    /// Run the test, leaving the outcome on its result fields.
    ///
    /// Only a broken declaration is returned as an error; the test is Bogus
    /// then. Failing checks and transport errors are recorded on `status`
    /// and `error` instead.
    pub async fn run(&mut self) -> Result<(), CompileError> {
        let started = Instant::now();
        self.reset();

        if self.poll.max < 0 {
            self.status = Status::Skipped;
            info!(test = %self.name, "skipped");
            return Ok(());
        }

        // One replacer per run: the request of every try and the checks
        // see the same NOW and RANDOM values.
        let mut replacer = Replacer::from_config(self.variables.clone(), &self.config);
        if let Err(err) = self.prepare_checks(&mut replacer) {
            return Err(self.bogus(err, started));
        }

        let max_tries = self.poll.max.max(1) as u32;
        for attempt in 1..=max_tries {
            self.tries = attempt;
            self.status = Status::NotRun;
            self.error = None;

            if let Err(err) = self.execute_try(&mut replacer).await {
                return Err(self.bogus(err, started));
            }
            if self.status == Status::Pass {
                break;
            }
            if attempt < max_tries {
                debug!(test = %self.name, attempt, status = %self.status, "retrying");
                pause(self.poll.sleep_ms).await;
            }
        }

        pause(self.execution.post_sleep_ms).await;
        self.duration = started.elapsed();
        info!(
            test = %self.name,
            status = %self.status,
            tries = self.tries,
            duration_ms = self.duration.as_millis() as u64,
            "finished"
        );
        Ok(())
    }

    /// Values named in `data_extraction`. Extractors that find nothing are
    /// logged and left out.
    pub fn extract(&self) -> BTreeMap<String, String> {
        let mut values = BTreeMap::new();
        for (variable, extractor) in &self.data_extraction {
            match extractor.extract(self) {
                Ok(value) => {
                    values.insert(variable.clone(), value);
                }
                Err(err) => {
                    warn!(test = %self.name, variable = %variable, error = %err, "extraction failed")
                }
            }
        }
        values
    }

    fn reset(&mut self) {
        self.status = Status::NotRun;
        self.error = None;
        self.check_results.clear();
        self.prepared.clear();
        self.response = None;
        self.compiled = None;
        self.tries = 0;
        self.duration = Duration::ZERO;
    }

    fn bogus(&mut self, err: CompileError, started: Instant) -> CompileError {
        warn!(test = %self.name, error = %err, "bogus test");
        self.status = Status::Bogus;
        self.error = Some(TestError::Compile(err.clone()));
        self.duration = started.elapsed();
        err
    }

    /// Substitute and prepare a copy of `checks`. On failure the offending
    /// check's result is Bogus and the later ones stay NotRun.
    fn prepare_checks(&mut self, replacer: &mut Replacer) -> Result<(), CompileError> {
        self.check_results = self
            .checks
            .iter()
            .map(|check| CheckResult::new(check.name()))
            .collect();

        let mut prepared = Vec::with_capacity(self.checks.len());
        for (index, check) in self.checks.iter().enumerate() {
            let outcome = substitute_check(check, replacer).and_then(|mut check| {
                check.prepare(self)?;
                Ok(check)
            });
            match outcome {
                Ok(check) => prepared.push(check),
                Err(source) => {
                    let result = &mut self.check_results[index];
                    result.status = Status::Bogus;
                    result.error = Some(source.clone());
                    return Err(CompileError::Check {
                        index,
                        name: check.name().to_string(),
                        source,
                    });
                }
            }
        }
        self.prepared = prepared;
        Ok(())
    }

    async fn execute_try(&mut self, replacer: &mut Replacer) -> Result<(), CompileError> {
        self.response = None;
        self.compiled = None;
        self.check_results.iter_mut().for_each(CheckResult::reset);

        let compiled = RequestCompiler::new(self.config.clone()).compile(&self.request, replacer)?;

        let verbosity = self.execution.verbosity;
        if verbosity >= 1 {
            info!(test = %self.name, try_ = self.tries, "{}", compiled.request_line());
        }
        if verbosity >= 3 {
            debug!(test = %self.name, "request:\n{}", compiled.wire_dump());
            debug!(test = %self.name, "as curl: {}", compiled.curl());
        }

        pause(self.execution.pre_sleep_ms).await;
        let outcome = client::perform(&compiled, self.jar.clone(), &self.config).await;
        self.compiled = Some(compiled);

        let response = match outcome {
            Ok(response) => response,
            Err(err) => {
                warn!(test = %self.name, try_ = self.tries, error = %err, "transport error");
                self.status = Status::Error;
                self.error = Some(TestError::Transport(err));
                return Ok(());
            }
        };

        if verbosity >= 2 {
            for hop in &response.redirections {
                info!(test = %self.name, "redirected to {hop}");
            }
            info!(
                test = %self.name,
                status = response.status,
                duration_ms = response.duration.as_millis() as u64,
                "response received"
            );
        }
        if verbosity >= 3 {
            debug!(test = %self.name, "response body:\n{}", response.body_str());
        }
        self.response = Some(response);

        pause(self.execution.inter_sleep_ms).await;
        self.execute_checks();
        Ok(())
    }

    fn execute_checks(&mut self) {
        let mut status = Status::Pass;

        for index in 0..self.prepared.len() {
            let started = Instant::now();
            let outcome = self.prepared[index].execute(self);

            let result = &mut self.check_results[index];
            result.duration = started.elapsed();
            match outcome {
                Ok(()) => result.status = Status::Pass,
                Err(err) => {
                    result.status = err.status();
                    result.error = Some(err);
                }
            }
            status = status.max(result.status);

            if index == 0 && result.status != Status::Pass && self.prepared[0].is_status_200() {
                for later in &mut self.check_results[1..] {
                    later.reset();
                    later.status = Status::Skipped;
                }
                break;
            }
        }

        let mut errors: Vec<CheckError> = self
            .check_results
            .iter()
            .filter_map(|result| result.error.clone())
            .collect();
        self.error = match errors.len() {
            0 => None,
            1 => Some(TestError::Check(errors.remove(0))),
            _ => Some(TestError::Check(CheckError::List(errors))),
        };
        self.status = status;
    }
}
