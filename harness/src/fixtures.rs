//! Request bodies for the entities scenarios create, and the factory that
//! posts them.
//!
//! Every builder starts from realistic Arabic sample data so a scenario only
//! spells out the fields its assertions depend on:
//!
//! ```rust
//! use harness::fixtures::{InvoiceFixture, InvoiceItemFixture, PaymentMethod};
//!
//! let invoice = InvoiceFixture::new("أحمد محمد")
//!     .with_payment_method(PaymentMethod::Deferred)
//!     .with_item(InvoiceItemFixture::manufactured(25.0, 35.0, 10.0, 2, 150.0));
//! assert_eq!(invoice.items_total(), 300.0);
//! ```

use crate::expectation::{Expectation, Shape};
use crate::recorder::Recorder;
use crate::registry::{CreatedResources, ResourceKind};
use crate::scenario::{ScenarioError, ScenarioResult};
use client::{ApiSession, Exchange};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Short random tag that keeps fixture names and sizes from colliding across runs.
pub fn unique_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect()
}

/// Diameter pair unlikely to match an existing inventory item.
pub fn unique_diameters() -> (f64, f64) {
    let inner = rand::thread_rng().gen_range(500..5000) as f64;
    (inner, inner + 15.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "نقدي")]
    Cash,
    #[serde(rename = "آجل")]
    Deferred,
    #[serde(rename = "فودافون 010")]
    VodafoneElsawy,
    #[serde(rename = "كاش 0100")]
    VodafoneWael,
    #[serde(rename = "انستاباي")]
    Instapay,
    #[serde(rename = "يد الصاوي")]
    YadElsawy,
}

impl PaymentMethod {
    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "نقدي",
            PaymentMethod::Deferred => "آجل",
            PaymentMethod::VodafoneElsawy => "فودافون 010",
            PaymentMethod::VodafoneWael => "كاش 0100",
            PaymentMethod::Instapay => "انستاباي",
            PaymentMethod::YadElsawy => "يد الصاوي",
        }
    }

    /// Key of the `/treasury/balances` entry this method settles into.
    pub fn account(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Deferred => "deferred",
            PaymentMethod::VodafoneElsawy => "vodafone_elsawy",
            PaymentMethod::VodafoneWael => "vodafone_wael",
            PaymentMethod::Instapay => "instapay",
            PaymentMethod::YadElsawy => "yad_elsawy",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaterialType {
    #[serde(rename = "NBR")]
    Nbr,
    #[serde(rename = "BUR")]
    Bur,
    #[serde(rename = "BT")]
    Bt,
    #[serde(rename = "VT")]
    Vt,
    #[serde(rename = "BOOM")]
    Boom,
}

impl MaterialType {
    pub fn code(&self) -> &'static str {
        match self {
            MaterialType::Nbr => "NBR",
            MaterialType::Bur => "BUR",
            MaterialType::Bt => "BT",
            MaterialType::Vt => "VT",
            MaterialType::Boom => "BOOM",
        }
    }
}

/// A request body for one creatable entity.
pub trait Fixture: Serialize {
    const KIND: ResourceKind;

    /// Human readable name used in result lines.
    fn label(&self) -> String;

    fn to_body(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerFixture {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl CustomerFixture {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone: Some("01234567890".to_string()),
            address: Some("القاهرة، مصر".to_string()),
        }
    }

    /// Customer with a run-unique name.
    pub fn sample() -> Self {
        Self::new(format!("عميل اختبار {}", unique_suffix()))
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn without_address(mut self) -> Self {
        self.address = None;
        self
    }
}

impl Fixture for CustomerFixture {
    const KIND: ResourceKind = ResourceKind::Customer;

    fn label(&self) -> String {
        format!("customer '{}'", self.name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SupplierFixture {
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl SupplierFixture {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone: Some("01098765432".to_string()),
            address: Some("الإسكندرية".to_string()),
        }
    }

    pub fn sample() -> Self {
        Self::new(format!("مورد اختبار {}", unique_suffix()))
    }
}

impl Fixture for SupplierFixture {
    const KIND: ResourceKind = ResourceKind::Supplier;

    fn label(&self) -> String {
        format!("supplier '{}'", self.name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InventoryItemFixture {
    pub material_type: MaterialType,
    pub inner_diameter: f64,
    pub outer_diameter: f64,
    pub available_pieces: i64,
    pub min_stock_level: i64,
    pub notes: Option<String>,
}

impl InventoryItemFixture {
    pub fn new(material_type: MaterialType, inner_diameter: f64, outer_diameter: f64) -> Self {
        Self {
            material_type,
            inner_diameter,
            outer_diameter,
            available_pieces: 20,
            min_stock_level: 2,
            notes: Some("عنصر جرد للاختبار".to_string()),
        }
    }

    /// NBR item with diameters no other run is likely to use.
    pub fn sample() -> Self {
        let (inner, outer) = unique_diameters();
        Self::new(MaterialType::Nbr, inner, outer)
    }

    pub fn with_pieces(mut self, pieces: i64) -> Self {
        self.available_pieces = pieces;
        self
    }
}

impl Fixture for InventoryItemFixture {
    const KIND: ResourceKind = ResourceKind::InventoryItem;

    fn label(&self) -> String {
        format!(
            "inventory item {:?} {}x{}",
            self.material_type, self.inner_diameter, self.outer_diameter
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RawMaterialFixture {
    pub material_type: MaterialType,
    pub inner_diameter: f64,
    pub outer_diameter: f64,
    pub height: f64,
    pub pieces_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_code: Option<String>,
    pub cost_per_mm: f64,
}

impl RawMaterialFixture {
    /// Raw material cut from the inventory item with the same type and diameters.
    pub fn from_inventory(item: &InventoryItemFixture, pieces_count: i64) -> Self {
        Self {
            material_type: item.material_type,
            inner_diameter: item.inner_diameter,
            outer_diameter: item.outer_diameter,
            height: 100.0,
            pieces_count,
            unit_code: None,
            cost_per_mm: 2.5,
        }
    }
}

impl Fixture for RawMaterialFixture {
    const KIND: ResourceKind = ResourceKind::RawMaterial;

    fn label(&self) -> String {
        format!(
            "raw material {:?} {}x{} ({} pcs)",
            self.material_type, self.inner_diameter, self.outer_diameter, self.pieces_count
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceItemFixture {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seal_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material_type: Option<MaterialType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inner_diameter: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outer_diameter: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    pub quantity: i64,
    pub unit_price: f64,
    pub total_price: f64,
    pub product_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selling_price: Option<f64>,
}

impl InvoiceItemFixture {
    /// RSL seal in NBR.
    pub fn manufactured(inner: f64, outer: f64, height: f64, quantity: i64, unit_price: f64) -> Self {
        Self {
            seal_type: Some("RSL".to_string()),
            material_type: Some(MaterialType::Nbr),
            inner_diameter: Some(inner),
            outer_diameter: Some(outer),
            height: Some(height),
            quantity,
            unit_price,
            total_price: quantity as f64 * unit_price,
            product_type: "manufactured".to_string(),
            product_name: None,
            supplier: None,
            purchase_price: None,
            selling_price: None,
        }
    }

    pub fn local(
        product_name: impl Into<String>,
        supplier: impl Into<String>,
        purchase_price: f64,
        selling_price: f64,
        quantity: i64,
    ) -> Self {
        Self {
            seal_type: None,
            material_type: None,
            inner_diameter: None,
            outer_diameter: None,
            height: None,
            quantity,
            unit_price: selling_price,
            total_price: quantity as f64 * selling_price,
            product_type: "local".to_string(),
            product_name: Some(product_name.into()),
            supplier: Some(supplier.into()),
            purchase_price: Some(purchase_price),
            selling_price: Some(selling_price),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    Amount,
    Percentage,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceFixture {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    pub customer_name: String,
    pub invoice_title: String,
    pub supervisor_name: String,
    pub items: Vec<InvoiceItemFixture>,
    pub payment_method: PaymentMethod,
    pub discount_type: DiscountType,
    pub discount_value: f64,
    pub notes: Option<String>,
}

impl InvoiceFixture {
    /// Cash invoice with no items.
    pub fn new(customer_name: impl Into<String>) -> Self {
        Self {
            customer_id: None,
            customer_name: customer_name.into(),
            invoice_title: "فاتورة اختبار".to_string(),
            supervisor_name: "مشرف الاختبار".to_string(),
            items: Vec::new(),
            payment_method: PaymentMethod::Cash,
            discount_type: DiscountType::Amount,
            discount_value: 0.0,
            notes: None,
        }
    }

    /// Invoice for a created customer body (`id` and `name`).
    pub fn for_customer(customer: &Value) -> Self {
        let name = customer
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("عميل اختبار");
        let mut fixture = Self::new(name);
        fixture.customer_id = customer.get("id").and_then(Value::as_str).map(str::to_string);
        fixture
    }

    pub fn with_payment_method(mut self, method: PaymentMethod) -> Self {
        self.payment_method = method;
        self
    }

    pub fn with_item(mut self, item: InvoiceItemFixture) -> Self {
        self.items.push(item);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_amount_discount(mut self, amount: f64) -> Self {
        self.discount_type = DiscountType::Amount;
        self.discount_value = amount;
        self
    }

    pub fn with_percentage_discount(mut self, percent: f64) -> Self {
        self.discount_type = DiscountType::Percentage;
        self.discount_value = percent;
        self
    }

    /// Sum of item totals before discount.
    pub fn items_total(&self) -> f64 {
        self.items.iter().map(|item| item.total_price).sum()
    }

    pub fn discount_amount(&self) -> f64 {
        match self.discount_type {
            DiscountType::Amount => self.discount_value,
            DiscountType::Percentage => self.items_total() * self.discount_value / 100.0,
        }
    }

    /// Total the backend should charge: subtotal minus discount.
    pub fn expected_total(&self) -> f64 {
        self.items_total() - self.discount_amount()
    }
}

impl Fixture for InvoiceFixture {
    const KIND: ResourceKind = ResourceKind::Invoice;

    fn label(&self) -> String {
        format!(
            "{} invoice for '{}'",
            self.payment_method.label(),
            self.customer_name
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MaterialPricingFixture {
    pub material_type: MaterialType,
    pub inner_diameter: f64,
    pub outer_diameter: f64,
    pub price_per_mm: f64,
    pub manufacturing_cost_client1: f64,
    pub manufacturing_cost_client2: f64,
    pub manufacturing_cost_client3: f64,
    pub notes: String,
}

impl MaterialPricingFixture {
    pub fn new(material_type: MaterialType, inner_diameter: f64, outer_diameter: f64) -> Self {
        Self {
            material_type,
            inner_diameter,
            outer_diameter,
            price_per_mm: 15.0,
            manufacturing_cost_client1: 10.0,
            manufacturing_cost_client2: 12.0,
            manufacturing_cost_client3: 14.0,
            notes: "تسعير اختبار".to_string(),
        }
    }

    /// NBR pricing for diameters no other run is likely to use.
    pub fn sample() -> Self {
        let (inner, outer) = unique_diameters();
        Self::new(MaterialType::Nbr, inner, outer)
    }

    /// `price_per_mm * height` plus the manufacturing cost of client tier 1, 2 or 3.
    pub fn price_for(&self, height: f64, client_type: u8) -> Option<f64> {
        let manufacturing = match client_type {
            1 => self.manufacturing_cost_client1,
            2 => self.manufacturing_cost_client2,
            3 => self.manufacturing_cost_client3,
            _ => return None,
        };
        Some(self.price_per_mm * height + manufacturing)
    }
}

impl Fixture for MaterialPricingFixture {
    const KIND: ResourceKind = ResourceKind::MaterialPricing;

    fn label(&self) -> String {
        format!(
            "pricing {:?} {}x{}",
            self.material_type, self.inner_diameter, self.outer_diameter
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LocalProductFixture {
    pub name: String,
    pub supplier_id: String,
    pub purchase_price: f64,
    pub selling_price: f64,
    pub current_stock: i64,
}

impl LocalProductFixture {
    pub fn new(name: impl Into<String>, supplier_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            supplier_id: supplier_id.into(),
            purchase_price: 50.0,
            selling_price: 75.0,
            current_stock: 10,
        }
    }

    pub fn with_prices(mut self, purchase_price: f64, selling_price: f64) -> Self {
        self.purchase_price = purchase_price;
        self.selling_price = selling_price;
        self
    }
}

impl Fixture for LocalProductFixture {
    const KIND: ResourceKind = ResourceKind::LocalProduct;

    fn label(&self) -> String {
        format!("local product '{}'", self.name)
    }
}

/// Creates fixtures through the session, recording each creation and
/// registering the new id for teardown.
pub struct Fixtures<'a> {
    session: &'a ApiSession,
    recorder: &'a Recorder,
    created: &'a CreatedResources,
}

impl<'a> Fixtures<'a> {
    pub fn new(session: &'a ApiSession, recorder: &'a Recorder, created: &'a CreatedResources) -> Self {
        Self {
            session,
            recorder,
            created,
        }
    }

    /// Creates the fixture or fails the enclosing scenario's setup.
    pub async fn create<F: Fixture>(&self, fixture: &F) -> ScenarioResult<Value> {
        let step = format!("Create {}", fixture.label());
        let exchange = self
            .session
            .post(F::KIND.collection(), fixture.to_body()?)
            .await;
        let expectation = Expectation::success(Shape::non_empty(F::KIND.id_field()));

        if !self.recorder.check(step.clone(), &expectation, &exchange) {
            return Err(ScenarioError::Setup {
                step,
                reason: exchange.summary(),
            });
        }
        let body = exchange.success_json().cloned().unwrap_or(Value::Null);
        let id = self.created.register_from(F::KIND, &body)?;
        debug!(kind = %F::KIND, %id, "fixture created");
        Ok(body)
    }

    /// Posts the fixture, records it under `test_name` against `expectation`,
    /// and registers any id the backend returns even when creation was meant
    /// to be refused.
    pub async fn attempt<F: Fixture>(
        &self,
        test_name: &str,
        fixture: &F,
        expectation: &Expectation,
    ) -> ScenarioResult<Exchange> {
        let exchange = self
            .session
            .post(F::KIND.collection(), fixture.to_body()?)
            .await;
        self.recorder.check(test_name, expectation, &exchange);
        if let Some(body) = exchange.success_json() {
            if let Err(e) = self.created.register_from(F::KIND, body) {
                warn!("{}: nothing registered for cleanup: {}", test_name, e);
            }
        }
        Ok(exchange)
    }
}
