use super::str_of;
use crate::expectation::{Expectation, Shape};
use crate::fixtures::{unique_diameters, MaterialPricingFixture, MaterialType};
use crate::registry::ResourceKind;
use crate::scenario::{Scenario, ScenarioContext, ScenarioResult};
use async_trait::async_trait;
use client::ApiRequest;

const HEIGHT: f64 = 12.0;

/// Material pricing records and the price calculator built on them.
pub struct MaterialPricingScenario;

fn calculate(material: MaterialType, inner: f64, outer: f64, client_type: u8) -> ApiRequest {
    ApiRequest::post("/calculate-price")
        .with_query("material_type", material.code())
        .with_query("inner_diameter", inner)
        .with_query("outer_diameter", outer)
        .with_query("height", HEIGHT)
        .with_query("client_type", client_type)
}

#[async_trait]
impl Scenario for MaterialPricingScenario {
    fn name(&self) -> &str {
        "material-pricing"
    }

    fn description(&self) -> &str {
        "Pricing records drive calculate-price for each client tier; unknown tiers and sizes are refused"
    }

    async fn run(&self, ctx: &ScenarioContext) -> ScenarioResult<()> {
        let fixture = MaterialPricingFixture::sample();
        let pricing = ctx.fixtures().create(&fixture).await?;
        let id = str_of(&pricing, "id").to_string();

        ctx.expect(
            "Material pricing appears in list",
            ApiRequest::get(ResourceKind::MaterialPricing.collection()),
            &Expectation::success(Shape::contains("id", id.as_str())),
        )
        .await;

        for client_type in 1..=3 {
            let Some(expected) = fixture.price_for(HEIGHT, client_type) else {
                continue;
            };
            ctx.expect(
                &format!("Calculated price for client tier {}", client_type),
                calculate(fixture.material_type, fixture.inner_diameter, fixture.outer_diameter, client_type),
                &Expectation::success(
                    Shape::near("total_price", expected).and(Shape::equals("pricing_id", id.as_str())),
                ),
            )
            .await;
        }

        ctx.expect(
            "Price for unknown client tier refused",
            calculate(fixture.material_type, fixture.inner_diameter, fixture.outer_diameter, 4),
            &Expectation::error([400]),
        )
        .await;

        let (inner, outer) = unique_diameters();
        ctx.expect(
            "Price for unpriced size not found",
            calculate(MaterialType::Bt, inner, outer, 1),
            &Expectation::error([404]),
        )
        .await;

        Ok(())
    }
}
