pub mod config;
pub mod dispatch;
pub mod expectation;
pub mod fixtures;
pub mod policy;
pub mod recorder;
pub mod registry;
pub mod report;
pub mod scenario;
pub mod scenarios;
pub mod summary;

pub use config::{ConfigError, HarnessConfig, HarnessEnv};
pub use dispatch::dispatch;
pub use expectation::{approx_eq, Expectation, Shape, Verdict, DEFAULT_TOLERANCE};
pub use fixtures::{
    CustomerFixture, DiscountType, Fixture, Fixtures, InventoryItemFixture, InvoiceFixture, InvoiceItemFixture,
    LocalProductFixture, MaterialPricingFixture, MaterialType, PaymentMethod, RawMaterialFixture,
    SupplierFixture,
};
pub use policy::{Grade, PassPolicy, DEFAULT_PASS_THRESHOLD};
pub use recorder::{Recorder, TestResult};
pub use registry::{CleanupReport, CreatedResources, RegistryError, ResourceKind};
pub use report::{ReportError, RunReport};
pub use scenario::{
    RunOutcome, RunSettings, Runner, Scenario, ScenarioContext, ScenarioError, ScenarioRegistry,
    ScenarioResult,
};
pub use summary::{default_groups, GroupRule, RunSummary};
