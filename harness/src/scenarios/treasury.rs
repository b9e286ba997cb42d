use super::{balance, f64_of, treasury_balances, TREASURY_ADMIN};
use crate::expectation::{Expectation, Shape};
use crate::fixtures::{CustomerFixture, InvoiceFixture, InvoiceItemFixture, PaymentMethod};
use crate::scenario::{Scenario, ScenarioContext, ScenarioResult};
use async_trait::async_trait;
use client::ApiRequest;
use serde_json::json;

const TRANSFER_AMOUNT: f64 = 50.0;

/// Invoice settlement into treasury accounts, transfers and reset authorization.
pub struct TreasuryScenario;

impl TreasuryScenario {
    async fn transfer(&self, ctx: &ScenarioContext, test_name: &str, from: &str, to: &str) -> bool {
        ctx.expect(
            test_name,
            ApiRequest::post("/treasury/transfer").with_json(json!({
                "from_account": from,
                "to_account": to,
                "amount": TRANSFER_AMOUNT,
                "notes": "تحويل اختبار",
            })),
            &Expectation::success(Shape::non_empty("transfer_id")),
        )
        .await
        .is_success()
    }
}

#[async_trait]
impl Scenario for TreasuryScenario {
    fn name(&self) -> &str {
        "treasury"
    }

    fn description(&self) -> &str {
        "Cash and deferred invoices move the right account balances; transfers and reset authorization"
    }

    async fn run(&self, ctx: &ScenarioContext) -> ScenarioResult<()> {
        let customer = ctx.fixtures().create(&CustomerFixture::sample()).await?;
        let before = treasury_balances(ctx, "Treasury balances before invoices").await?;

        let cash_invoice = ctx
            .fixtures()
            .create(
                &InvoiceFixture::for_customer(&customer)
                    .with_payment_method(PaymentMethod::Cash)
                    .with_item(InvoiceItemFixture::manufactured(25.0, 35.0, 10.0, 2, 150.0)),
            )
            .await?;
        let cash_total = f64_of(&cash_invoice, "total_amount");

        let after_cash = treasury_balances(ctx, "Treasury balances after cash invoice").await?;
        ctx.near(
            "Cash balance rises by cash invoice total",
            balance(&after_cash, "cash") - balance(&before, "cash"),
            cash_total,
        );

        let deferred_invoice = ctx
            .fixtures()
            .create(
                &InvoiceFixture::for_customer(&customer)
                    .with_payment_method(PaymentMethod::Deferred)
                    .with_item(InvoiceItemFixture::manufactured(30.0, 40.0, 8.0, 3, 120.0)),
            )
            .await?;
        let deferred_total = f64_of(&deferred_invoice, "total_amount");

        let after_deferred = treasury_balances(ctx, "Treasury balances after deferred invoice").await?;
        ctx.near(
            "Cash balance unchanged by deferred invoice",
            balance(&after_deferred, "cash") - balance(&after_cash, "cash"),
            0.0,
        );
        ctx.near(
            "Deferred balance rises by deferred invoice total",
            balance(&after_deferred, "deferred") - balance(&after_cash, "deferred"),
            deferred_total,
        );

        if self
            .transfer(ctx, "Transfer cash to instapay", "cash", "instapay")
            .await
        {
            let after_transfer = treasury_balances(ctx, "Treasury balances after transfer").await?;
            ctx.near(
                "Transfer debits source account",
                balance(&after_deferred, "cash") - balance(&after_transfer, "cash"),
                TRANSFER_AMOUNT,
            );
            ctx.near(
                "Transfer credits destination account",
                balance(&after_transfer, "instapay") - balance(&after_deferred, "instapay"),
                TRANSFER_AMOUNT,
            );
            self.transfer(ctx, "Reverse test transfer", "instapay", "cash")
                .await;
        }

        ctx.expect(
            "Treasury reset refused for non-admin user",
            ApiRequest::post("/treasury/reset").with_query("username", "Root"),
            &Expectation::error([403]),
        )
        .await;
        ctx.expect(
            "Treasury reset admin check is case sensitive",
            ApiRequest::post("/treasury/reset").with_query("username", TREASURY_ADMIN.to_lowercase()),
            &Expectation::error([403]),
        )
        .await;
        ctx.expect(
            "Treasury reset requires username",
            ApiRequest::post("/treasury/reset"),
            &Expectation::error([422]),
        )
        .await;

        Ok(())
    }
}
