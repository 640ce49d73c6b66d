use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use reqwest::cookie::Jar;
use tokio::sync::mpsc;
use tracing::{debug, error};

use super::aggregate;
use crate::error::{SuiteError, TestError, TransportError};
use crate::status::Status;
use crate::testing::Test;

/// Tests run together, possibly concurrently, sharing one cookie store.
#[derive(Debug, Default)]
pub struct Collection {
    pub tests: Vec<Test>,
    pub jar: Option<Arc<Jar>>,
    pub status: Status,
    pub error: Option<SuiteError>,
}

impl Collection {
    pub fn new(tests: Vec<Test>) -> Self {
        Self {
            tests,
            ..Default::default()
        }
    }

    pub fn with_jar(mut self, jar: Arc<Jar>) -> Self {
        self.jar = Some(jar);
        self
    }

    /// Run every test to completion with at most `concurrency` tests in
    /// flight. Tests keep their order in `tests`.
    pub async fn execute(&mut self, concurrency: usize) -> Status {
        let total = self.tests.len();
        if total == 0 {
            self.status = Status::NotRun;
            self.error = None;
            return self.status;
        }

        let worker_count = concurrency.clamp(1, total);
        let mut originals = Vec::with_capacity(total);
        let mut queue = VecDeque::with_capacity(total);
        for (index, mut test) in std::mem::take(&mut self.tests).into_iter().enumerate() {
            if self.jar.is_some() {
                test.set_jar(self.jar.clone());
            }
            originals.push(test.clone());
            queue.push_back((index, test));
        }
        let queue = Arc::new(Mutex::new(queue));
        debug!(tests = total, workers = worker_count, "running collection");

        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let mut handles = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let queue = queue.clone();
            let done_tx = done_tx.clone();
            let handle = tokio::spawn(async move {
                loop {
                    let next = match queue.lock() {
                        Ok(mut queue) => queue.pop_front(),
                        Err(_) => None,
                    };
                    let Some((index, mut test)) = next else {
                        break;
                    };
                    // A Bogus test reports its compile error on its own fields.
                    let _ = test.run().await;
                    let _ = done_tx.send((index, test));
                }
            });
            handles.push(handle);
        }
        drop(done_tx);

        for handle in handles {
            if let Err(err) = handle.await {
                error!(error = %err, "collection worker crashed");
            }
        }

        let mut finished: Vec<Option<Test>> = (0..total).map(|_| None).collect();
        while let Some((index, test)) = done_rx.recv().await {
            finished[index] = Some(test);
        }

        self.tests = finished
            .into_iter()
            .zip(originals)
            .map(|(finished, mut original)| {
                finished.unwrap_or_else(|| {
                    original.status = Status::Error;
                    original.error = Some(TestError::Transport(TransportError::Request(
                        "test did not complete".to_string(),
                    )));
                    original
                })
            })
            .collect();

        let (status, error) = aggregate(&self.tests);
        self.status = status;
        self.error = error;
        status
    }
}
