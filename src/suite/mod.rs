//! Running groups of tests.
//!
//! A [`Suite`] runs its tests one after another so that values extracted
//! from one test can feed later ones; a [`Collection`] runs independent tests
//! on a bounded worker pool.

mod collection;

use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::cookie::Jar;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub use collection::Collection;

use crate::config::EngineConfig;
use crate::error::{SuiteError, TestError, TestFailure};
use crate::status::Status;
use crate::testing::Test;

/// Overall status (the most severe test status) and the failures of every
/// test that did not pass.
pub fn aggregate(tests: &[Test]) -> (Status, Option<SuiteError>) {
    let status = tests
        .iter()
        .map(|test| test.status)
        .max()
        .unwrap_or_default();
    let failures: Vec<TestFailure> = tests
        .iter()
        .filter(|test| test.status > Status::Skipped)
        .filter_map(|test| {
            test.error.clone().map(|error| TestFailure {
                test: test.name.clone(),
                status: test.status,
                error,
            })
        })
        .collect();
    let error = (!failures.is_empty()).then_some(SuiteError { failures });
    (status, error)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Setup,
    Main,
    Teardown,
}

/// Setup, main and teardown tests run in sequence.
///
/// When a setup test does not pass the main tests are skipped; teardown
/// always runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Suite {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub setup: Vec<Test>,
    pub main: Vec<Test>,
    pub teardown: Vec<Test>,
    pub variables: BTreeMap<String, String>,
    /// Share one cookie store between all tests.
    pub keep_cookies: bool,

    #[serde(skip)]
    pub status: Status,
    #[serde(skip)]
    pub error: Option<SuiteError>,
    /// Executed instances of every test, in execution order.
    #[serde(skip)]
    pub tests: Vec<Test>,
    #[serde(skip)]
    pub config: Arc<EngineConfig>,
}

impl Suite {
    pub fn set_config(&mut self, config: Arc<EngineConfig>) {
        self.config = config;
    }

    pub async fn execute(&mut self) -> Status {
        self.tests.clear();
        let mut variables = self.variables.clone();
        let jar = self.keep_cookies.then(|| Arc::new(Jar::default()));

        let phases = [
            (Phase::Setup, self.setup.clone()),
            (Phase::Main, self.main.clone()),
            (Phase::Teardown, self.teardown.clone()),
        ];
        let mut setup_passed = true;
        for (phase, templates) in phases {
            for template in &templates {
                let test = if phase == Phase::Main && !setup_passed {
                    skipped(template)
                } else {
                    self.run_one(template, &mut variables, jar.clone()).await
                };
                if phase == Phase::Setup && test.status != Status::Pass {
                    setup_passed = false;
                }
                self.tests.push(test);
            }
        }

        let (status, error) = aggregate(&self.tests);
        self.status = status;
        self.error = error;
        info!(suite = %self.name, status = %status, tests = self.tests.len(), "suite finished");
        status
    }

    async fn run_one(
        &self,
        template: &Test,
        variables: &mut BTreeMap<String, String>,
        jar: Option<Arc<Jar>>,
    ) -> Test {
        let mut test = match template.instantiate(variables) {
            Ok(test) => test,
            Err(err) => {
                warn!(suite = %self.name, test = %template.name, error = %err, "cannot instantiate test");
                let mut broken = template.clone();
                broken.status = Status::Bogus;
                broken.error = Some(TestError::Compile(err));
                return broken;
            }
        };
        test.set_config(self.config.clone());
        test.set_jar(jar);

        // Compile errors are recorded on the test itself.
        let _ = test.run().await;
        if test.status == Status::Pass {
            variables.extend(test.extract());
        }
        test
    }
}

fn skipped(template: &Test) -> Test {
    let mut test = template.clone();
    test.status = Status::Skipped;
    test
}
