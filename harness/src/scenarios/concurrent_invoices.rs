use super::{balance, f64_of, str_of, treasury_balances};
use crate::dispatch::dispatch;
use crate::expectation::{Expectation, Shape, Verdict};
use crate::fixtures::{CustomerFixture, Fixture, InvoiceFixture, InvoiceItemFixture, PaymentMethod};
use crate::registry::ResourceKind;
use crate::scenario::{Scenario, ScenarioContext, ScenarioResult};
use async_trait::async_trait;
use client::ApiRequest;
use std::collections::HashSet;

/// Cash invoices created in parallel: numbering and treasury postings must
/// neither collide nor double count.
pub struct ConcurrentInvoicesScenario {
    pub invoices: usize,
}

impl Default for ConcurrentInvoicesScenario {
    fn default() -> Self {
        Self { invoices: 5 }
    }
}

#[async_trait]
impl Scenario for ConcurrentInvoicesScenario {
    fn name(&self) -> &str {
        "concurrent-invoices"
    }

    fn description(&self) -> &str {
        "Parallel cash invoices receive distinct numbers and post to cash exactly once"
    }

    async fn run(&self, ctx: &ScenarioContext) -> ScenarioResult<()> {
        let customer = ctx.fixtures().create(&CustomerFixture::sample()).await?;
        let before = treasury_balances(ctx, "Treasury balances before concurrent invoices").await?;

        let requests = (0..self.invoices)
            .map(|i| -> Result<ApiRequest, serde_json::Error> {
                let fixture = InvoiceFixture::for_customer(&customer)
                    .with_payment_method(PaymentMethod::Cash)
                    .with_item(InvoiceItemFixture::manufactured(
                        20.0,
                        30.0,
                        5.0,
                        1,
                        100.0 + i as f64,
                    ))
                    .with_notes(format!("فاتورة متزامنة {}", i + 1));
                Ok(ApiRequest::post(ResourceKind::Invoice.collection()).with_json(fixture.to_body()?))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let exchanges = dispatch(ctx.session(), requests, ctx.concurrency()).await;

        let created = Expectation::success(Shape::non_empty("id").and(Shape::non_empty("invoice_number")));
        let mut numbers = HashSet::new();
        let mut posted_total = 0.0;
        let mut accepted = 0;
        for (i, exchange) in exchanges.iter().enumerate() {
            let name = format!("Concurrent invoice {} created", i + 1);
            if !ctx.recorder().check(name, &created, exchange) {
                continue;
            }
            let Some(invoice) = exchange.success_json() else {
                continue;
            };
            ctx.created().register_from(ResourceKind::Invoice, invoice)?;
            numbers.insert(str_of(invoice, "invoice_number").to_string());
            posted_total += f64_of(invoice, "total_amount");
            accepted += 1;
        }

        ctx.verdict(
            "Concurrent invoices have distinct numbers",
            Verdict::from_bool(
                numbers.len() == accepted,
                format!("{} distinct numbers for {} invoices", numbers.len(), accepted),
            ),
        );

        let after = treasury_balances(ctx, "Treasury balances after concurrent invoices").await?;
        ctx.near(
            "Cash balance rises by concurrent invoice totals once",
            balance(&after, "cash") - balance(&before, "cash"),
            posted_total,
        );

        Ok(())
    }
}
