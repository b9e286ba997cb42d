use super::str_of;
use crate::expectation::{Expectation, Shape};
use crate::fixtures::{unique_diameters, InventoryItemFixture, MaterialType, RawMaterialFixture};
use crate::registry::ResourceKind;
use crate::scenario::{Scenario, ScenarioContext, ScenarioResult};
use async_trait::async_trait;
use client::ApiRequest;
use serde_json::Value;

const STOCK: i64 = 10;
const CUT: i64 = 3;

/// Raw material creation against inventory stock.
pub struct InventoryScenario;

/// Matches an `out` transaction for `reference_id` that removed `pieces`.
fn deduction_logged(reference_id: String, pieces: i64) -> Shape {
    Shape::custom("deduction logged", move |body| {
        let entries = body.as_array().ok_or("not an array")?;
        let found = entries.iter().any(|entry| {
            entry.get("reference_id").and_then(Value::as_str) == Some(reference_id.as_str())
                && entry.get("pieces_change").and_then(Value::as_i64) == Some(-pieces)
        });
        if found {
            Ok(())
        } else {
            Err(format!(
                "no transaction with reference_id={} and pieces_change={} among {} entries",
                reference_id,
                -pieces,
                entries.len()
            ))
        }
    })
}

#[async_trait]
impl Scenario for InventoryScenario {
    fn name(&self) -> &str {
        "inventory"
    }

    fn description(&self) -> &str {
        "Raw material creation deducts inventory pieces and refuses to exceed stock"
    }

    async fn run(&self, ctx: &ScenarioContext) -> ScenarioResult<()> {
        let item_fixture = InventoryItemFixture::sample().with_pieces(STOCK);
        let item = ctx.fixtures().create(&item_fixture).await?;
        let item_id = str_of(&item, "id").to_string();
        let item_path = ResourceKind::InventoryItem.item_path(&item_id);

        let raw = ctx
            .fixtures()
            .create(&RawMaterialFixture::from_inventory(&item_fixture, CUT))
            .await?;
        let raw_id = str_of(&raw, "id").to_string();

        ctx.expect(
            "Inventory pieces deducted by raw material",
            ApiRequest::get(item_path.as_str()),
            &Expectation::success(Shape::near("available_pieces", (STOCK - CUT) as f64)),
        )
        .await;

        ctx.expect(
            "Deduction recorded in inventory transactions",
            ApiRequest::get(format!("/inventory-transactions/{}", item_id)),
            &Expectation::success(deduction_logged(raw_id, CUT)),
        )
        .await;

        ctx.fixtures()
            .attempt(
                "Raw material beyond available stock rejected",
                &RawMaterialFixture::from_inventory(&item_fixture, STOCK * 100),
                &Expectation::error([400]),
            )
            .await?;

        ctx.expect(
            "Rejected raw material leaves stock unchanged",
            ApiRequest::get(item_path.as_str()),
            &Expectation::success(Shape::near("available_pieces", (STOCK - CUT) as f64)),
        )
        .await;

        let (inner, outer) = unique_diameters();
        let unstocked = InventoryItemFixture::new(MaterialType::Bur, inner, outer);
        ctx.fixtures()
            .attempt(
                "Raw material without inventory item rejected",
                &RawMaterialFixture::from_inventory(&unstocked, 1),
                &Expectation::error([400]),
            )
            .await?;

        Ok(())
    }
}
