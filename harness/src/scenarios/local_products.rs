use super::str_of;
use crate::expectation::{approx_eq, Expectation, Shape, DEFAULT_TOLERANCE};
use crate::fixtures::{unique_suffix, Fixture, LocalProductFixture, SupplierFixture};
use crate::registry::ResourceKind;
use crate::scenario::{Scenario, ScenarioContext, ScenarioResult};
use async_trait::async_trait;
use client::ApiRequest;
use serde_json::Value;

const PURCHASE_PRICE: f64 = 40.0;
const SELLING_PRICE: f64 = 65.0;
const UPDATED_SELLING_PRICE: f64 = 70.0;

/// Supplier-backed local products: create, list, update and delete.
pub struct LocalProductsScenario;

/// Some element of the listed products has `id` and `selling_price`.
fn listed_with_price(id: String, selling_price: f64) -> Shape {
    Shape::custom("product price", move |body| {
        let products = body.as_array().ok_or("not an array")?;
        let product = products
            .iter()
            .find(|p| p.get("id").and_then(Value::as_str) == Some(id.as_str()))
            .ok_or_else(|| format!("product {} not listed", id))?;
        match product.get("selling_price").and_then(Value::as_f64) {
            Some(price) if approx_eq(price, selling_price, DEFAULT_TOLERANCE) => Ok(()),
            other => Err(format!("selling_price {:?}, expected {}", other, selling_price)),
        }
    })
}

#[async_trait]
impl Scenario for LocalProductsScenario {
    fn name(&self) -> &str {
        "local-products"
    }

    fn description(&self) -> &str {
        "Local products take their supplier's name and can be listed, repriced and deleted"
    }

    async fn run(&self, ctx: &ScenarioContext) -> ScenarioResult<()> {
        let supplier_fixture = SupplierFixture::sample();
        let supplier = ctx.fixtures().create(&supplier_fixture).await?;
        let supplier_id = str_of(&supplier, "id").to_string();

        let fixture = LocalProductFixture::new(format!("منتج محلي {}", unique_suffix()), supplier_id.as_str())
            .with_prices(PURCHASE_PRICE, SELLING_PRICE);
        let product = ctx.fixtures().create(&fixture).await?;
        let id = str_of(&product, "id").to_string();

        ctx.verdict(
            "Local product carries supplier name",
            Shape::equals("supplier_name", supplier_fixture.name.as_str())
                .and(Shape::near("purchase_price", PURCHASE_PRICE))
                .and(Shape::near("selling_price", SELLING_PRICE))
                .verdict(&product, format!("{} from {}", fixture.name, supplier_fixture.name)),
        );

        ctx.expect(
            "Local product appears in list",
            ApiRequest::get(ResourceKind::LocalProduct.collection()),
            &Expectation::success(Shape::contains("id", id.as_str())),
        )
        .await;
        let by_supplier = format!("/local-products/supplier/{}", supplier_id);
        ctx.expect(
            "Local product listed under its supplier",
            ApiRequest::get(by_supplier.as_str()),
            &Expectation::success(Shape::contains("id", id.as_str())),
        )
        .await;

        let repriced = fixture.clone().with_prices(PURCHASE_PRICE, UPDATED_SELLING_PRICE);
        let updated = ctx
            .expect(
                "Update local product price",
                ApiRequest::put(ResourceKind::LocalProduct.item_path(&id)).with_json(repriced.to_body()?),
                &Expectation::ok(),
            )
            .await;
        if updated.is_success() {
            ctx.expect(
                "Updated local product price listed",
                ApiRequest::get(by_supplier.as_str()),
                &Expectation::success(listed_with_price(id.clone(), UPDATED_SELLING_PRICE)),
            )
            .await;
        }

        let deleted = ctx
            .expect(
                "Delete local product",
                ApiRequest::delete(ResourceKind::LocalProduct.item_path(&id)),
                &Expectation::ok(),
            )
            .await;
        if deleted.is_success() {
            ctx.created().forget(ResourceKind::LocalProduct, &id);
            ctx.expect(
                "Deleted local product no longer listed",
                ApiRequest::get(by_supplier.as_str()),
                &Expectation::success(Shape::IsArray.and(Shape::not(Shape::contains("id", id.as_str())))),
            )
            .await;
        }

        Ok(())
    }
}
