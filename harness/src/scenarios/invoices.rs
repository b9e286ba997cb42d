use super::{balance, f64_of, str_of, treasury_balances, INVOICE_OPERATIONS_PASSWORD, TREASURY_ADMIN};
use crate::expectation::{Expectation, Shape};
use crate::fixtures::{CustomerFixture, InvoiceFixture, InvoiceItemFixture, PaymentMethod};
use crate::registry::ResourceKind;
use crate::scenario::{Scenario, ScenarioContext, ScenarioResult};
use async_trait::async_trait;
use client::ApiRequest;
use serde_json::Value;

/// Invoice fields, password-protected cancel and payment-method change.
pub struct InvoicesScenario;

fn cancel(invoice_id: &str, password: &str) -> ApiRequest {
    ApiRequest::delete(format!("/invoices/{}/cancel", invoice_id))
        .with_query("password", password)
        .with_query("username", TREASURY_ADMIN)
}

fn change_payment_method(invoice_id: &str, method: PaymentMethod, password: &str) -> ApiRequest {
    ApiRequest::put(format!("/invoices/{}/change-payment-method", invoice_id))
        .with_query("new_payment_method", method.label())
        .with_query("password", password)
        .with_query("username", TREASURY_ADMIN)
}

impl InvoicesScenario {
    async fn check_cancel(&self, ctx: &ScenarioContext, customer: &Value) -> ScenarioResult<()> {
        let invoice = ctx
            .fixtures()
            .create(
                &InvoiceFixture::for_customer(customer)
                    .with_item(InvoiceItemFixture::manufactured(20.0, 30.0, 6.0, 1, 90.0)),
            )
            .await?;
        let id = str_of(&invoice, "id").to_string();

        ctx.expect(
            "Cancel invoice with wrong password refused",
            cancel(&id, "0000"),
            &Expectation::error([401]),
        )
        .await;

        let cancelled = ctx
            .expect(
                "Cancel invoice with operations password",
                cancel(&id, INVOICE_OPERATIONS_PASSWORD),
                &Expectation::success(Shape::equals(
                    "invoice_number",
                    str_of(&invoice, "invoice_number"),
                )),
            )
            .await;
        if !cancelled.is_success() {
            return Ok(());
        }
        ctx.created().forget(ResourceKind::Invoice, &id);
        ctx.created().register(ResourceKind::DeletedInvoice, id.clone());

        ctx.expect(
            "Cancelled invoice listed in deleted invoices",
            ApiRequest::get("/deleted-invoices"),
            &Expectation::success(Shape::IsArray.and(Shape::contains("id", id.as_str()))),
        )
        .await;
        ctx.expect(
            "Cancelled invoice no longer retrievable",
            ApiRequest::get(ResourceKind::Invoice.item_path(&id)),
            &Expectation::error([404]),
        )
        .await;
        ctx.expect(
            "Cancelling twice reports missing invoice",
            cancel(&id, INVOICE_OPERATIONS_PASSWORD),
            &Expectation::error([404]),
        )
        .await;
        Ok(())
    }

    async fn check_discounts(&self, ctx: &ScenarioContext, customer: &Value) -> ScenarioResult<()> {
        let base = InvoiceFixture::for_customer(customer)
            .with_payment_method(PaymentMethod::Deferred)
            .with_item(InvoiceItemFixture::manufactured(30.0, 45.0, 10.0, 2, 125.0))
            .with_item(InvoiceItemFixture::local("جوان مستورد", "مورد محلي", 20.0, 37.5, 2));

        for (label, fixture) in [
            ("Percentage discount", base.clone().with_percentage_discount(10.0)),
            ("Amount discount", base.with_amount_discount(25.0)),
        ] {
            let invoice = ctx.fixtures().create(&fixture).await?;
            let totals = Shape::near("subtotal", fixture.items_total())
                .and(Shape::near("discount", fixture.discount_amount()))
                .and(Shape::near("total_amount", fixture.expected_total()))
                .and(Shape::near("remaining_amount", fixture.expected_total()));
            ctx.verdict(
                &format!("{} applied to invoice total", label),
                totals.verdict(
                    &invoice,
                    format!(
                        "{} - {} = {}",
                        fixture.items_total(),
                        fixture.discount_amount(),
                        fixture.expected_total()
                    ),
                ),
            );
        }
        Ok(())
    }

    async fn check_payment_method_change(&self, ctx: &ScenarioContext, customer: &Value) -> ScenarioResult<()> {
        let invoice = ctx
            .fixtures()
            .create(
                &InvoiceFixture::for_customer(customer)
                    .with_payment_method(PaymentMethod::Cash)
                    .with_item(InvoiceItemFixture::manufactured(40.0, 55.0, 12.0, 2, 210.0)),
            )
            .await?;
        let id = str_of(&invoice, "id").to_string();
        let total = f64_of(&invoice, "total_amount");

        ctx.expect(
            "Change payment method with wrong password refused",
            change_payment_method(&id, PaymentMethod::Deferred, "0000"),
            &Expectation::error([401]),
        )
        .await;

        let before = treasury_balances(ctx, "Treasury balances before payment method change").await?;
        let changed = ctx
            .expect(
                "Change payment method cash to deferred",
                change_payment_method(&id, PaymentMethod::Deferred, INVOICE_OPERATIONS_PASSWORD),
                &Expectation::ok(),
            )
            .await;
        if !changed.is_success() {
            return Ok(());
        }
        let after = treasury_balances(ctx, "Treasury balances after payment method change").await?;

        ctx.near(
            "Cash balance drops by invoice total",
            balance(&before, "cash") - balance(&after, "cash"),
            total,
        );
        ctx.near(
            "Deferred balance rises by invoice total",
            balance(&after, "deferred") - balance(&before, "deferred"),
            total,
        );
        ctx.expect(
            "Invoice reports new payment method",
            ApiRequest::get(ResourceKind::Invoice.item_path(&id)),
            &Expectation::success(Shape::equals("payment_method", PaymentMethod::Deferred.label())),
        )
        .await;
        Ok(())
    }
}

#[async_trait]
impl Scenario for InvoicesScenario {
    fn name(&self) -> &str {
        "invoices"
    }

    fn description(&self) -> &str {
        "Invoice totals and discounts, cancel with password, deleted-invoice archive and payment method change"
    }

    async fn run(&self, ctx: &ScenarioContext) -> ScenarioResult<()> {
        let customer = ctx.fixtures().create(&CustomerFixture::sample()).await?;

        let fixture = InvoiceFixture::for_customer(&customer)
            .with_payment_method(PaymentMethod::Deferred)
            .with_item(InvoiceItemFixture::manufactured(25.0, 35.0, 10.0, 2, 150.0))
            .with_item(InvoiceItemFixture::local("جوان مستورد", "مورد محلي", 20.0, 35.0, 4))
            .with_notes("فاتورة آجلة للاختبار");
        let expected_total = fixture.items_total();
        let invoice = ctx.fixtures().create(&fixture).await?;

        let fields = Shape::non_empty("invoice_number")
            .and(Shape::equals("customer_name", fixture.customer_name.as_str()))
            .and(Shape::equals("payment_method", PaymentMethod::Deferred.label()))
            .and(Shape::near("total_amount", expected_total))
            .and(Shape::near("remaining_amount", expected_total));
        ctx.verdict(
            "Deferred invoice fields",
            fields.verdict(
                &invoice,
                format!("{} total {}", str_of(&invoice, "invoice_number"), expected_total),
            ),
        );

        self.check_discounts(ctx, &customer).await?;
        self.check_cancel(ctx, &customer).await?;
        self.check_payment_method_change(ctx, &customer).await?;
        Ok(())
    }
}
