//! End-of-run summary: totals, pass rate, grade, per-area breakdown and the
//! list of failures.

use crate::policy::{Grade, PassPolicy};
use crate::recorder::TestResult;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Attributes results to a named area.
///
/// A result recorded inside a scenario belongs to the rule listing that
/// scenario. Results from unlisted scenarios, or recorded outside any
/// scenario, fall back to matching the test name against `pattern`.
#[derive(Debug, Clone)]
pub struct GroupRule {
    pub label: String,
    pub scenarios: Vec<String>,
    pub pattern: Regex,
}

impl GroupRule {
    pub fn new(label: impl Into<String>, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            label: label.into(),
            scenarios: Vec::new(),
            pattern: Regex::new(pattern)?,
        })
    }

    pub fn for_scenarios<I, S>(mut self, scenarios: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scenarios = scenarios.into_iter().map(Into::into).collect();
        self
    }

    pub fn claims(&self, result: &TestResult) -> bool {
        result
            .scenario
            .as_deref()
            .is_some_and(|scenario| self.scenarios.iter().any(|s| s == scenario))
    }

    pub fn matches(&self, test_name: &str) -> bool {
        self.pattern.is_match(test_name)
    }
}

/// Areas covered by the built-in scenarios.
pub fn default_groups() -> Vec<GroupRule> {
    [
        ("العملاء / Customers", &["customers"][..], r"(?i)customer"),
        (
            "الخزينة الرئيسية / Main treasury",
            &["main-treasury"][..],
            r"(?i)main treasury|deposit|withdraw",
        ),
        ("الخزينة / Treasury", &["treasury"][..], r"(?i)treasury|balance|transfer"),
        (
            "الفواتير / Invoices",
            &["invoices", "concurrent-invoices"][..],
            r"(?i)invoice|payment method|discount",
        ),
        (
            "المخزون / Inventory",
            &["inventory"][..],
            r"(?i)inventory|raw material|stock|deduction",
        ),
        ("المنتجات المحلية / Local products", &["local-products"][..], r"(?i)local product|supplier"),
        ("تسعير الخامات / Material pricing", &["material-pricing"][..], r"(?i)pricing|price"),
        ("النسخ الاحتياطي / Backups", &["backups"][..], r"(?i)backup"),
    ]
    .into_iter()
    .filter_map(|(label, scenarios, pattern)| {
        GroupRule::new(label, pattern)
            .ok()
            .map(|rule| rule.for_scenarios(scenarios.iter().copied()))
    })
    .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub label: String,
    pub passed: usize,
    pub total: usize,
}

impl GroupSummary {
    pub fn pass_rate(&self) -> f64 {
        rate(self.passed, self.total)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedTest {
    pub test_name: String,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Percentage, 0 for an empty run.
    pub pass_rate: f64,
    pub failed_tests: Vec<FailedTest>,
    pub groups: Vec<GroupSummary>,
}

fn rate(passed: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        passed as f64 / total as f64 * 100.0
    }
}

impl RunSummary {
    /// Each result counts toward the rule claiming its scenario, otherwise
    /// toward the first rule matching its name, if any.
    pub fn from_results(results: &[TestResult], rules: &[GroupRule]) -> Self {
        let total = results.len();
        let passed = results.iter().filter(|r| r.success).count();

        let mut groups: Vec<GroupSummary> = rules
            .iter()
            .map(|rule| GroupSummary {
                label: rule.label.clone(),
                passed: 0,
                total: 0,
            })
            .collect();
        for result in results {
            let index = rules
                .iter()
                .position(|rule| rule.claims(result))
                .or_else(|| rules.iter().position(|rule| rule.matches(&result.test_name)));
            if let Some(index) = index {
                groups[index].total += 1;
                if result.success {
                    groups[index].passed += 1;
                }
            }
        }
        groups.retain(|group| group.total > 0);

        Self {
            total,
            passed,
            failed: total - passed,
            pass_rate: rate(passed, total),
            failed_tests: results
                .iter()
                .filter(|r| !r.success)
                .map(|r| FailedTest {
                    test_name: r.test_name.clone(),
                    details: r.details.clone(),
                })
                .collect(),
            groups,
        }
    }

    pub fn grade(&self) -> Grade {
        Grade::from_rate(self.pass_rate)
    }

    pub fn render(&self, policy: &PassPolicy) -> String {
        let rule = "=".repeat(60);
        let mut out = String::new();

        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "📊 ملخص الاختبارات / TEST SUMMARY");
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "إجمالي الاختبارات / Total:  {}", self.total);
        let _ = writeln!(out, "✅ نجح / Passed:             {}", self.passed);
        let _ = writeln!(out, "❌ فشل / Failed:             {}", self.failed);
        let _ = writeln!(out, "📈 نسبة النجاح / Pass rate:  {:.1}%", self.pass_rate);
        let _ = writeln!(out, "التقييم / Grade:             {}", self.grade());

        if !self.groups.is_empty() {
            let _ = writeln!(out, "\n📋 حسب المجال / By area:");
            for group in &self.groups {
                let icon = if group.passed == group.total {
                    "✅"
                } else if group.pass_rate() >= policy.threshold_percent {
                    "⚠️"
                } else {
                    "❌"
                };
                let _ = writeln!(
                    out,
                    "  {} {}: {}/{} ({:.1}%)",
                    icon,
                    group.label,
                    group.passed,
                    group.total,
                    group.pass_rate()
                );
            }
        }

        if !self.failed_tests.is_empty() {
            let _ = writeln!(out, "\n🔍 الاختبارات الفاشلة / Failed tests:");
            for failed in &self.failed_tests {
                let _ = writeln!(out, "  ❌ {}: {}", failed.test_name, failed.details);
            }
        }

        let verdict = if policy.passes(self) {
            "✅ PASSED"
        } else {
            "❌ FAILED"
        };
        let _ = writeln!(
            out,
            "\n{} (threshold {:.1}%)",
            verdict, policy.threshold_percent
        );
        let _ = write!(out, "{}", rule);
        out
    }
}
