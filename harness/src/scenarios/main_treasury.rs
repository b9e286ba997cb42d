use super::{f64_of, str_of};
use crate::expectation::{Expectation, Shape};
use crate::scenario::{Scenario, ScenarioContext, ScenarioError, ScenarioResult};
use async_trait::async_trait;
use client::ApiRequest;
use serde_json::{json, Value};

pub const DEFAULT_MAIN_TREASURY_PASSWORD: &str = "100100";
const OPERATOR: &str = "Elsawy";
const DEPOSIT_AMOUNT: f64 = 1000.0;

/// Password gate, deposits, withdrawals and history of the main treasury.
pub struct MainTreasuryScenario;

fn movement(transaction_type: &str, amount: f64, description: &str) -> Value {
    json!({
        "transaction_type": transaction_type,
        "amount": amount,
        "description": description,
        "reference": "seal-harness",
    })
}

async fn current_balance(ctx: &ScenarioContext, test_name: &str) -> ScenarioResult<f64> {
    let exchange = ctx
        .expect(
            test_name,
            ApiRequest::get("/main-treasury/balance"),
            &Expectation::success(Shape::fields(["balance", "transaction_count"])),
        )
        .await;
    exchange
        .success_json()
        .map(|body| f64_of(body, "balance"))
        .ok_or_else(|| ScenarioError::setup(test_name, exchange.summary()))
}

#[async_trait]
impl Scenario for MainTreasuryScenario {
    fn name(&self) -> &str {
        "main-treasury"
    }

    fn description(&self) -> &str {
        "Main treasury password, balance, deposit, overdraft refusal and history"
    }

    async fn run(&self, ctx: &ScenarioContext) -> ScenarioResult<()> {
        ctx.expect(
            "Verify default main treasury password",
            ApiRequest::post("/main-treasury/verify-password")
                .with_json(json!({"password": DEFAULT_MAIN_TREASURY_PASSWORD})),
            &Expectation::success(Shape::equals("success", true)),
        )
        .await;
        ctx.expect(
            "Wrong main treasury password refused",
            ApiRequest::post("/main-treasury/verify-password").with_json(json!({"password": "000000"})),
            &Expectation::rejected([401, 403]),
        )
        .await;

        let start = current_balance(ctx, "Main treasury balance").await?;

        let deposit = ctx
            .expect(
                "Deposit to main treasury",
                ApiRequest::post("/main-treasury/deposit")
                    .with_query("username", OPERATOR)
                    .with_json(movement("deposit", DEPOSIT_AMOUNT, "إيداع اختبار")),
                &Expectation::success(
                    Shape::equals("success", true)
                        .and(Shape::non_empty("transaction_id"))
                        .and(Shape::near("new_balance", start + DEPOSIT_AMOUNT)),
                ),
            )
            .await;
        let Some(deposit) = deposit.success_json() else {
            return Err(ScenarioError::setup("Deposit to main treasury", deposit.summary()));
        };
        let transaction_id = str_of(deposit, "transaction_id").to_string();

        let after_deposit = current_balance(ctx, "Main treasury balance after deposit").await?;
        ctx.near("Deposit raises balance by amount", after_deposit - start, DEPOSIT_AMOUNT);

        ctx.expect(
            "Withdrawal beyond balance refused",
            ApiRequest::post("/main-treasury/withdrawal")
                .with_query("username", OPERATOR)
                .with_json(movement("withdrawal", after_deposit + 1_000_000.0, "سحب يتجاوز الرصيد")),
            &Expectation::rejected([400]),
        )
        .await;

        ctx.expect(
            "Deposit listed in main treasury history",
            ApiRequest::get("/main-treasury/transactions"),
            &Expectation::success(
                Shape::IsArray.and(Shape::contains("id", transaction_id.as_str())),
            ),
        )
        .await;

        ctx.expect(
            "Withdraw test deposit",
            ApiRequest::post("/main-treasury/withdrawal")
                .with_query("username", OPERATOR)
                .with_json(movement("withdrawal", DEPOSIT_AMOUNT, "عكس إيداع الاختبار")),
            &Expectation::success(Shape::near("new_balance", start)),
        )
        .await;

        Ok(())
    }
}
