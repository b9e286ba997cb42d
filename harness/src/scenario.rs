use crate::expectation::{Expectation, Verdict, DEFAULT_TOLERANCE};
use crate::fixtures::Fixtures;
use crate::recorder::{Recorder, TestResult};
use crate::registry::{CleanupReport, CreatedResources, RegistryError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use client::{ApiRequest, ApiSession, Exchange};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("Setup failed at '{step}': {reason}")]
    Setup { step: String, reason: String },

    #[error("Unknown scenario '{name}'. Known scenarios: {}", known.join(", "))]
    UnknownScenario { name: String, known: Vec<String> },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

impl ScenarioError {
    pub fn setup(step: impl Into<String>, reason: impl Into<String>) -> Self {
        ScenarioError::Setup {
            step: step.into(),
            reason: reason.into(),
        }
    }
}

pub type ScenarioResult<T> = Result<T, ScenarioError>;

/// A named group of related API checks.
///
/// Assertions go through the context's recorder and never abort the run.
/// Returning an error means a prerequisite could not be established; the
/// remaining steps of that scenario are skipped.
#[async_trait]
pub trait Scenario: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    async fn run(&self, ctx: &ScenarioContext) -> ScenarioResult<()>;
}

/// Everything a running scenario may touch.
pub struct ScenarioContext {
    session: ApiSession,
    recorder: Arc<Recorder>,
    created: Arc<CreatedResources>,
    tolerance: f64,
    concurrency: usize,
}

impl ScenarioContext {
    pub fn new(session: ApiSession, recorder: Arc<Recorder>, created: Arc<CreatedResources>) -> Self {
        Self {
            session,
            recorder,
            created,
            tolerance: DEFAULT_TOLERANCE,
            concurrency: 4,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn session(&self) -> &ApiSession {
        &self.session
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn created(&self) -> &CreatedResources {
        &self.created
    }

    pub fn fixtures(&self) -> Fixtures<'_> {
        Fixtures::new(&self.session, &self.recorder, &self.created)
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Sends `request` and records it against `expectation`.
    pub async fn expect(&self, test_name: &str, request: ApiRequest, expectation: &Expectation) -> Exchange {
        let exchange = self.session.call(request).await;
        self.recorder.check(test_name, expectation, &exchange);
        exchange
    }

    pub fn verdict(&self, test_name: &str, verdict: Verdict) -> bool {
        self.recorder.verdict(test_name, verdict)
    }

    /// Numeric check with the context's tolerance.
    pub fn near(&self, test_name: &str, actual: f64, expected: f64) -> bool {
        self.verdict(test_name, Verdict::near(test_name, actual, expected, self.tolerance))
    }
}

/// Scenarios in registration order.
pub struct ScenarioRegistry {
    scenarios: Vec<Box<dyn Scenario>>,
}

impl ScenarioRegistry {
    pub fn new() -> Self {
        Self {
            scenarios: Vec::new(),
        }
    }

    /// Registry holding every built-in scenario.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        crate::scenarios::register_defaults(&mut registry);
        registry
    }

    /// Registers a scenario, replacing any existing one with the same name in place.
    pub fn register(&mut self, scenario: Box<dyn Scenario>) {
        match self
            .scenarios
            .iter()
            .position(|s| s.name() == scenario.name())
        {
            Some(index) => self.scenarios[index] = scenario,
            None => self.scenarios.push(scenario),
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Scenario> {
        self.scenarios
            .iter()
            .find(|s| s.name() == name)
            .map(|s| s.as_ref())
    }

    pub fn list(&self) -> Vec<(&str, &str)> {
        self.scenarios
            .iter()
            .map(|s| (s.name(), s.description()))
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.scenarios.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    /// Resolves `names` in registration order; an empty selection means all.
    pub fn select(&self, names: &[String]) -> ScenarioResult<Vec<&dyn Scenario>> {
        if let Some(unknown) = names.iter().find(|name| self.get(name).is_none()) {
            return Err(ScenarioError::UnknownScenario {
                name: unknown.clone(),
                known: self.names(),
            });
        }
        Ok(self
            .scenarios
            .iter()
            .filter(|s| names.is_empty() || names.iter().any(|n| n == s.name()))
            .map(|s| s.as_ref())
            .collect())
    }
}

impl Default for ScenarioRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub cleanup: bool,
    pub concurrency: usize,
    pub tolerance: f64,
    /// Print each result as it is recorded.
    pub echo: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            cleanup: true,
            concurrency: 4,
            tolerance: DEFAULT_TOLERANCE,
            echo: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub scenarios: Vec<String>,
    pub results: Vec<TestResult>,
    pub cleanup: Option<CleanupReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

pub struct Runner {
    registry: ScenarioRegistry,
    session: ApiSession,
    settings: RunSettings,
}

impl Runner {
    pub fn new(session: ApiSession, registry: ScenarioRegistry) -> Self {
        Self {
            registry,
            session,
            settings: RunSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: RunSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn registry(&self) -> &ScenarioRegistry {
        &self.registry
    }

    /// Runs the selected scenarios in order, then tears down what they created.
    pub async fn run(&self, selection: &[String]) -> ScenarioResult<RunOutcome> {
        let scenarios = self.registry.select(selection)?;
        let started_at = Utc::now();

        let recorder = Arc::new(if self.settings.echo {
            Recorder::new()
        } else {
            Recorder::quiet()
        });
        let created = Arc::new(CreatedResources::new());
        let ctx = ScenarioContext::new(self.session.clone(), recorder.clone(), created.clone())
            .with_tolerance(self.settings.tolerance)
            .with_concurrency(self.settings.concurrency);

        for scenario in &scenarios {
            info!("Running scenario {}", scenario.name());
            if self.settings.echo {
                println!("\n🔍 {}: {}", scenario.name(), scenario.description());
            }
            recorder.enter_scenario(scenario.name());
            match scenario.run(&ctx).await {
                Ok(()) => {}
                Err(ScenarioError::Setup { step, reason }) => {
                    warn!("Scenario {} stopped at setup step '{}'", scenario.name(), step);
                    recorder.record(
                        format!("{}: setup", scenario.name()),
                        false,
                        format!("{}: {}", step, reason),
                    );
                }
                Err(e) => {
                    error!("Scenario {} failed: {}", scenario.name(), e);
                    recorder.record(format!("{}: error", scenario.name()), false, e.to_string());
                }
            }
            recorder.leave_scenario();
        }

        let cleanup = if self.settings.cleanup {
            Some(created.cleanup(&self.session).await)
        } else {
            if !created.is_empty() {
                info!("Skipping cleanup of {} created resources", created.len());
            }
            None
        };

        Ok(RunOutcome {
            scenarios: scenarios.iter().map(|s| s.name().to_string()).collect(),
            results: recorder.results(),
            cleanup,
            started_at,
            finished_at: Utc::now(),
        })
    }
}
