//! A check that records how often it ran, for exercising combinators and the
//! test state machine.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::Verify;
use crate::error::CheckError;
use crate::testing::Test;

#[derive(Debug, Clone, Default)]
pub struct Spy {
    pub pass: bool,
    calls: Arc<AtomicUsize>,
}

impl PartialEq for Spy {
    fn eq(&self, other: &Self) -> bool {
        self.pass == other.pass && Arc::ptr_eq(&self.calls, &other.calls)
    }
}

impl Spy {
    pub fn new(pass: bool) -> Self {
        Self {
            pass,
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Verify for Spy {
    fn execute(&self, _test: &Test) -> Result<(), CheckError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.pass {
            Ok(())
        } else {
            Err(CheckError::failed("spy failed"))
        }
    }
}
