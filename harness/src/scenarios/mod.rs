//! Built-in scenarios against the seal-shop backend.

mod backups;
mod concurrent_invoices;
mod customers;
mod inventory;
mod invoices;
mod local_products;
mod main_treasury;
mod material_pricing;
mod treasury;

pub use backups::BackupsScenario;
pub use concurrent_invoices::ConcurrentInvoicesScenario;
pub use customers::CustomersScenario;
pub use inventory::InventoryScenario;
pub use invoices::InvoicesScenario;
pub use local_products::LocalProductsScenario;
pub use main_treasury::MainTreasuryScenario;
pub use material_pricing::MaterialPricingScenario;
pub use treasury::TreasuryScenario;

use crate::expectation::{Expectation, Shape};
use crate::scenario::{ScenarioContext, ScenarioError, ScenarioRegistry, ScenarioResult};
use client::ApiRequest;
use serde_json::Value;

/// Accounts reported by `/treasury/balances`.
pub const TREASURY_ACCOUNTS: [&str; 7] = [
    "cash",
    "vodafone_elsawy",
    "vodafone_wael",
    "deferred",
    "instapay",
    "yad_elsawy",
    "main_treasury",
];

/// Password guarding invoice cancel and payment-method changes.
pub const INVOICE_OPERATIONS_PASSWORD: &str = "1462";

/// Only this user may reset the treasury.
pub const TREASURY_ADMIN: &str = "Elsawy";

pub fn register_defaults(registry: &mut ScenarioRegistry) {
    registry.register(Box::new(CustomersScenario));
    registry.register(Box::new(TreasuryScenario));
    registry.register(Box::new(MainTreasuryScenario));
    registry.register(Box::new(InvoicesScenario));
    registry.register(Box::new(InventoryScenario));
    registry.register(Box::new(LocalProductsScenario));
    registry.register(Box::new(MaterialPricingScenario));
    registry.register(Box::new(BackupsScenario::default()));
    registry.register(Box::new(ConcurrentInvoicesScenario::default()));
}

/// Snapshot of `/treasury/balances`; setup failure if unavailable.
pub(crate) async fn treasury_balances(ctx: &ScenarioContext, test_name: &str) -> ScenarioResult<Value> {
    let exchange = ctx
        .expect(
            test_name,
            ApiRequest::get("/treasury/balances"),
            &Expectation::success(Shape::fields(TREASURY_ACCOUNTS)),
        )
        .await;
    exchange
        .success_json()
        .cloned()
        .ok_or_else(|| ScenarioError::setup(test_name, exchange.summary()))
}

pub(crate) fn balance(balances: &Value, account: &str) -> f64 {
    balances.get(account).and_then(Value::as_f64).unwrap_or(0.0)
}

pub(crate) fn str_of<'a>(body: &'a Value, field: &str) -> &'a str {
    body.get(field).and_then(Value::as_str).unwrap_or_default()
}

pub(crate) fn f64_of(body: &Value, field: &str) -> f64 {
    body.get(field).and_then(Value::as_f64).unwrap_or(0.0)
}
