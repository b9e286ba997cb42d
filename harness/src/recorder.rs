//! Assertion bookkeeping and live console narration.
//!
//! Every assertion a scenario makes ends up as one [`TestResult`] in the
//! [`Recorder`], in the order it was made, and is printed immediately so an
//! operator can follow the run as it happens.

use crate::expectation::{Expectation, Verdict};
use chrono::{DateTime, Utc};
use client::Exchange;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

/// Outcome of one assertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub test_name: String,
    pub success: bool,
    pub details: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<Duration>,
    /// Scenario that was running when the result was recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
}

impl TestResult {
    pub fn new(test_name: impl Into<String>, success: bool, details: impl Into<String>) -> Self {
        Self {
            test_name: test_name.into(),
            success,
            details: details.into(),
            timestamp: Utc::now(),
            elapsed: None,
            scenario: None,
        }
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = Some(elapsed);
        self
    }

    pub fn with_scenario(mut self, scenario: impl Into<String>) -> Self {
        self.scenario = Some(scenario.into());
        self
    }

    /// `✅ PASS name | details (12 ms)`
    pub fn line(&self) -> String {
        let status = if self.success { "✅ PASS" } else { "❌ FAIL" };
        let mut line = format!("{} {}", status, self.test_name);
        if !self.details.is_empty() {
            line.push_str(" | ");
            line.push_str(&self.details);
        }
        if let Some(elapsed) = self.elapsed {
            line.push_str(&format!(" ({} ms)", elapsed.as_millis()));
        }
        line
    }
}

#[derive(Debug)]
pub struct Recorder {
    results: Mutex<Vec<TestResult>>,
    scope: Mutex<Option<String>>,
    echo: bool,
}

impl Recorder {
    /// Recorder that prints each result as it is recorded.
    pub fn new() -> Self {
        Self {
            results: Mutex::new(Vec::new()),
            scope: Mutex::new(None),
            echo: true,
        }
    }

    /// Recorder that only collects results.
    pub fn quiet() -> Self {
        Self {
            results: Mutex::new(Vec::new()),
            scope: Mutex::new(None),
            echo: false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TestResult>> {
        // A panic while holding the lock cannot leave the Vec half-pushed.
        self.results
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn scope(&self) -> MutexGuard<'_, Option<String>> {
        self.scope
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Results recorded from now on are attributed to `scenario`.
    pub fn enter_scenario(&self, scenario: &str) {
        *self.scope() = Some(scenario.to_string());
    }

    pub fn leave_scenario(&self) {
        *self.scope() = None;
    }

    pub fn push(&self, mut result: TestResult) {
        if result.scenario.is_none() {
            result.scenario = self.scope().clone();
        }
        debug!(test = %result.test_name, success = result.success, "recorded");
        if self.echo {
            println!("{}", result.line());
        }
        self.lock().push(result);
    }

    pub fn record(&self, test_name: impl Into<String>, success: bool, details: impl Into<String>) {
        self.push(TestResult::new(test_name, success, details));
    }

    pub fn record_timed(
        &self,
        test_name: impl Into<String>,
        success: bool,
        details: impl Into<String>,
        elapsed: Duration,
    ) {
        self.push(TestResult::new(test_name, success, details).with_elapsed(elapsed));
    }

    /// Evaluates `expectation` against `exchange` and records the verdict.
    pub fn check(&self, test_name: impl Into<String>, expectation: &Expectation, exchange: &Exchange) -> bool {
        let verdict = expectation.evaluate(exchange);
        let success = verdict.is_pass();
        let details = verdict.into_details();
        match exchange.response() {
            Some(response) => self.record_timed(test_name, success, details, response.elapsed),
            None => self.record(test_name, success, details),
        }
        success
    }

    /// Records an already computed verdict.
    pub fn verdict(&self, test_name: impl Into<String>, verdict: Verdict) -> bool {
        let success = verdict.is_pass();
        self.record(test_name, success, verdict.into_details());
        success
    }

    pub fn results(&self) -> Vec<TestResult> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn passed(&self) -> usize {
        self.lock().iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.lock().iter().filter(|r| !r.success).count()
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}
