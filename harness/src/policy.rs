use crate::summary::RunSummary;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_PASS_THRESHOLD: f64 = 75.0;

/// Decides whether a run as a whole passed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PassPolicy {
    pub threshold_percent: f64,
}

impl PassPolicy {
    pub fn new(threshold_percent: f64) -> Self {
        Self { threshold_percent }
    }

    /// An empty run never passes.
    pub fn passes(&self, summary: &RunSummary) -> bool {
        summary.total > 0 && summary.pass_rate >= self.threshold_percent
    }

    pub fn exit_code(&self, summary: &RunSummary) -> i32 {
        if self.passes(summary) {
            0
        } else {
            1
        }
    }
}

impl Default for PassPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_PASS_THRESHOLD)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl Grade {
    pub fn from_rate(pass_rate: f64) -> Self {
        if pass_rate >= 90.0 {
            Grade::Excellent
        } else if pass_rate >= 75.0 {
            Grade::Good
        } else if pass_rate >= 50.0 {
            Grade::Fair
        } else {
            Grade::Poor
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Grade::Excellent => "ممتاز / Excellent",
            Grade::Good => "جيد / Good",
            Grade::Fair => "مقبول / Fair",
            Grade::Poor => "ضعيف / Poor",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Grade::Excellent => "🎉",
            Grade::Good => "✅",
            Grade::Fair => "⚠️",
            Grade::Poor => "❌",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.icon(), self.label())
    }
}
