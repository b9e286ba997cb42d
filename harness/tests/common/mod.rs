//! In-memory stand-in for the seal-shop backend.
//!
//! Implements the routes the built-in scenarios call with the status codes
//! and body shapes of the real service. `Quirks` switch on specific
//! misbehaviours so tests can show a scenario catching them.
#![allow(dead_code)]

use async_trait::async_trait;
use client::{ApiRequest, ApiResponse, ClientResult, Method, ResponseBody, Transport};
use harness::scenarios::{INVOICE_OPERATIONS_PASSWORD, TREASURY_ACCOUNTS, TREASURY_ADMIN};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

pub const STARTING_CASH: f64 = 5000.0;
pub const STARTING_MAIN_TREASURY: f64 = 20000.0;
pub const MAIN_TREASURY_PASSWORD: &str = "100100";

#[derive(Debug, Clone)]
pub struct Quirks {
    /// Every invoice gets the same number.
    pub duplicate_invoice_numbers: bool,
    /// Multiplier applied to invoice postings on the cash account.
    pub cash_sign: f64,
    /// `/backup/list` calls that miss a new backup before it shows up.
    pub backup_listed_after_polls: usize,
    /// Invoice totals ignore `discount_type`/`discount_value`.
    pub ignore_discounts: bool,
}

impl Default for Quirks {
    fn default() -> Self {
        Self {
            duplicate_invoice_numbers: false,
            cash_sign: 1.0,
            backup_listed_after_polls: 0,
            ignore_discounts: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct State {
    pub customers: BTreeMap<String, Value>,
    pub suppliers: BTreeMap<String, Value>,
    pub local_products: BTreeMap<String, Value>,
    pub material_pricing: BTreeMap<String, Value>,
    pub inventory: BTreeMap<String, Value>,
    pub raw_materials: BTreeMap<String, Value>,
    pub invoices: BTreeMap<String, Value>,
    pub deleted_invoices: BTreeMap<String, Value>,
    pub backups: BTreeMap<String, Value>,
    pub inventory_transactions: Vec<Value>,
    pub balances: BTreeMap<String, f64>,
    pub main_balance: f64,
    pub main_transactions: Vec<Value>,
    backup_polls_left: BTreeMap<String, usize>,
    invoices_created: u64,
    next_id: u64,
    /// `METHOD /path` of every request received.
    pub log: Vec<String>,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn collection(&mut self, name: &str) -> Option<&mut BTreeMap<String, Value>> {
        match name {
            "customers" => Some(&mut self.customers),
            "suppliers" => Some(&mut self.suppliers),
            "local-products" => Some(&mut self.local_products),
            "material-pricing" => Some(&mut self.material_pricing),
            "inventory" => Some(&mut self.inventory),
            "raw-materials" => Some(&mut self.raw_materials),
            "invoices" => Some(&mut self.invoices),
            "deleted-invoices" => Some(&mut self.deleted_invoices),
            _ => None,
        }
    }

    /// Nothing created by a run is left behind.
    pub fn is_clean(&self) -> bool {
        self.customers.is_empty()
            && self.suppliers.is_empty()
            && self.local_products.is_empty()
            && self.material_pricing.is_empty()
            && self.inventory.is_empty()
            && self.raw_materials.is_empty()
            && self.invoices.is_empty()
            && self.deleted_invoices.is_empty()
            && self.backups.is_empty()
    }
}

pub struct FakeBackend {
    state: Mutex<State>,
    quirks: Quirks,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::with_quirks(Quirks::default())
    }
}

fn respond(status: u16, body: Value) -> ClientResult<ApiResponse> {
    Ok(ApiResponse::new(status, ResponseBody::Json(body)))
}

fn ok(body: Value) -> ClientResult<ApiResponse> {
    respond(200, body)
}

fn fail(status: u16, detail: &str) -> ClientResult<ApiResponse> {
    respond(status, json!({ "detail": detail }))
}

fn missing_query(field: &str) -> ClientResult<ApiResponse> {
    respond(
        422,
        json!({"detail": [{"loc": ["query", field], "msg": "field required"}]}),
    )
}

fn query<'a>(request: &'a ApiRequest, key: &str) -> Option<&'a str> {
    request
        .query
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn num(body: &Value, field: &str) -> f64 {
    body.get(field).and_then(Value::as_f64).unwrap_or(0.0)
}

fn account_for(payment_method: &str) -> Option<&'static str> {
    match payment_method {
        "نقدي" => Some("cash"),
        "آجل" => Some("deferred"),
        "فودافون 010" => Some("vodafone_elsawy"),
        "كاش 0100" => Some("vodafone_wael"),
        "انستاباي" => Some("instapay"),
        "يد الصاوي" => Some("yad_elsawy"),
        _ => None,
    }
}

fn same_size(item: &Value, body: &Value) -> bool {
    item.get("material_type") == body.get("material_type")
        && num(item, "inner_diameter") == num(body, "inner_diameter")
        && num(item, "outer_diameter") == num(body, "outer_diameter")
}

impl FakeBackend {
    pub fn with_quirks(quirks: Quirks) -> Self {
        let mut state = State::default();
        for account in TREASURY_ACCOUNTS {
            state.balances.insert(account.to_string(), 0.0);
        }
        state.balances.insert("cash".to_string(), STARTING_CASH);
        state.main_balance = STARTING_MAIN_TREASURY;
        Self {
            state: Mutex::new(state),
            quirks,
        }
    }

    pub fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn requests(&self) -> Vec<String> {
        self.state().log.clone()
    }

    pub fn count(&self, line: &str) -> usize {
        self.state().log.iter().filter(|l| l.as_str() == line).count()
    }

    fn post_to_account(&self, state: &mut State, account: &str, amount: f64) {
        let amount = if account == "cash" {
            amount * self.quirks.cash_sign
        } else {
            amount
        };
        *state.balances.entry(account.to_string()).or_insert(0.0) += amount;
    }

    fn handle(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
        let mut state = self.state();
        state.log.push(format!("{} {}", request.method, request.path));
        let path = request.path.trim_matches('/').to_string();
        let segments: Vec<&str> = path.split('/').collect();
        let body = request.body.clone().unwrap_or(Value::Null);

        match (request.method, segments.as_slice()) {
            (Method::Get, ["dashboard", "stats"]) => {
                ok(json!({"total_invoices": state.invoices.len()}))
            }

            (Method::Post, ["customers"]) if body.get("name").and_then(Value::as_str).is_none() => {
                respond(
                    422,
                    json!({"detail": [{"loc": ["body", "name"], "msg": "field required"}]}),
                )
            }
            (Method::Post, [collection @ ("customers" | "suppliers" | "material-pricing")]) => {
                let id = state.next_id(collection);
                let mut created = body;
                created["id"] = json!(&id);
                if let Some(map) = state.collection(collection) {
                    map.insert(id, created.clone());
                }
                ok(created)
            }

            (Method::Post, ["local-products"]) => {
                let supplier_id = body.get("supplier_id").and_then(Value::as_str).unwrap_or_default();
                let Some(supplier_name) = state.suppliers.get(supplier_id).map(|s| s["name"].clone()) else {
                    return fail(404, "المورد غير موجود");
                };
                let id = state.next_id("local-product");
                let mut product = body;
                product["id"] = json!(&id);
                product["supplier_name"] = supplier_name;
                product["total_sold"] = json!(0);
                state.local_products.insert(id, product.clone());
                ok(product)
            }
            (Method::Get, ["local-products", "supplier", supplier_id]) => ok(Value::Array(
                state
                    .local_products
                    .values()
                    .filter(|p| p.get("supplier_id").and_then(Value::as_str) == Some(*supplier_id))
                    .cloned()
                    .collect(),
            )),
            (Method::Put, ["local-products", id]) => {
                let Some(product) = state.local_products.get_mut(*id) else {
                    return fail(404, "المنتج غير موجود");
                };
                if let (Some(target), Some(update)) = (product.as_object_mut(), body.as_object()) {
                    for (key, value) in update {
                        target.insert(key.clone(), value.clone());
                    }
                }
                ok(json!({"message": "تم تحديث المنتج بنجاح"}))
            }

            (Method::Post, ["calculate-price"]) => {
                let material = query(&request, "material_type").unwrap_or_default();
                let parse = |key: &str| query(&request, key).and_then(|v| v.parse::<f64>().ok());
                let (Some(inner), Some(outer), Some(height)) =
                    (parse("inner_diameter"), parse("outer_diameter"), parse("height"))
                else {
                    return missing_query("height");
                };
                let Some(pricing) = state.material_pricing.values().find(|p| {
                    p.get("material_type").and_then(Value::as_str) == Some(material)
                        && num(p, "inner_diameter") == inner
                        && num(p, "outer_diameter") == outer
                }) else {
                    return fail(404, "لم يتم العثور على تسعيرة مطابقة لهذه الخامة");
                };
                let manufacturing = match query(&request, "client_type") {
                    Some("1") => num(pricing, "manufacturing_cost_client1"),
                    Some("2") => num(pricing, "manufacturing_cost_client2"),
                    Some("3") => num(pricing, "manufacturing_cost_client3"),
                    _ => return fail(400, "نوع العميل يجب أن يكون 1، 2، أو 3"),
                };
                let mm_cost = num(pricing, "price_per_mm") * height;
                ok(json!({
                    "material_type": material,
                    "mm_cost": mm_cost,
                    "manufacturing_cost": manufacturing,
                    "total_price": mm_cost + manufacturing,
                    "pricing_id": pricing["id"],
                }))
            }

            (Method::Post, ["inventory"]) => {
                if state.inventory.values().any(|item| same_size(item, &body)) {
                    return fail(400, "يوجد عنصر بنفس المواصفات في الجرد");
                }
                let id = state.next_id("inventory");
                let mut item = body;
                item["id"] = json!(&id);
                state.inventory.insert(id, item.clone());
                ok(item)
            }
            (Method::Post, ["raw-materials"]) => {
                let pieces = body.get("pieces_count").and_then(Value::as_i64).unwrap_or(0);
                let Some((item_id, available)) = state
                    .inventory
                    .iter()
                    .find(|(_, item)| same_size(item, &body))
                    .map(|(id, item)| (id.clone(), item["available_pieces"].as_i64().unwrap_or(0)))
                else {
                    return fail(400, "لا يوجد مخزون متاح لهذه الخامة");
                };
                if pieces > available {
                    return fail(400, "المخزون غير كافٍ");
                }
                let raw_id = state.next_id("raw-material");
                if let Some(item) = state.inventory.get_mut(&item_id) {
                    item["available_pieces"] = json!(available - pieces);
                }
                let transaction_id = state.next_id("inventory-transaction");
                state.inventory_transactions.push(json!({
                    "id": transaction_id,
                    "inventory_item_id": item_id,
                    "transaction_type": "out",
                    "pieces_change": -pieces,
                    "reference_id": raw_id,
                }));
                let mut raw = body;
                raw["id"] = json!(&raw_id);
                state.raw_materials.insert(raw_id, raw.clone());
                ok(raw)
            }
            (Method::Get, ["inventory-transactions", item_id]) => ok(Value::Array(
                state
                    .inventory_transactions
                    .iter()
                    .filter(|t| t.get("inventory_item_id").and_then(Value::as_str) == Some(*item_id))
                    .cloned()
                    .collect(),
            )),

            (Method::Post, ["invoices"]) => {
                let method = body
                    .get("payment_method")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let Some(account) = account_for(&method) else {
                    return respond(422, json!({"detail": [{"loc": ["body", "payment_method"]}]}));
                };
                let items = body.get("items").and_then(Value::as_array).cloned().unwrap_or_default();
                let subtotal: f64 = items.iter().map(|item| num(item, "total_price")).sum();
                let discount_value = num(&body, "discount_value");
                let discount = if self.quirks.ignore_discounts {
                    0.0
                } else if body.get("discount_type").and_then(Value::as_str) == Some("percentage") {
                    subtotal * discount_value / 100.0
                } else {
                    discount_value
                };
                let total = subtotal - discount;

                state.invoices_created += 1;
                let number = if self.quirks.duplicate_invoice_numbers {
                    "INV-000001".to_string()
                } else {
                    format!("INV-{:06}", state.invoices_created)
                };
                let id = state.next_id("invoice");
                let mut invoice = body;
                invoice["id"] = json!(&id);
                invoice["invoice_number"] = json!(number);
                invoice["subtotal"] = json!(subtotal);
                invoice["discount"] = json!(discount);
                invoice["total_after_discount"] = json!(total);
                invoice["total_amount"] = json!(total);
                invoice["paid_amount"] = json!(0.0);
                invoice["remaining_amount"] = json!(if account == "deferred" { total } else { 0.0 });
                invoice["status"] = json!("انتظار");
                self.post_to_account(&mut state, account, total);
                state.invoices.insert(id, invoice.clone());
                ok(invoice)
            }
            (Method::Delete, ["invoices", id, "cancel"]) => {
                if query(&request, "password") != Some(INVOICE_OPERATIONS_PASSWORD) {
                    return fail(401, "كلمة المرور غير صحيحة");
                }
                let Some(invoice) = state.invoices.remove(*id) else {
                    return fail(404, "الفاتورة غير موجودة");
                };
                if let Some(account) = invoice["payment_method"].as_str().and_then(account_for) {
                    self.post_to_account(&mut state, account, -num(&invoice, "total_amount"));
                }
                let number = invoice["invoice_number"].clone();
                state.deleted_invoices.insert(id.to_string(), invoice);
                ok(json!({"message": "تم إلغاء الفاتورة", "invoice_number": number}))
            }
            (Method::Put, ["invoices", id, "change-payment-method"]) => {
                if query(&request, "password") != Some(INVOICE_OPERATIONS_PASSWORD) {
                    return fail(401, "كلمة المرور غير صحيحة");
                }
                let Some(new_method) = query(&request, "new_payment_method") else {
                    return missing_query("new_payment_method");
                };
                let Some(new_account) = account_for(new_method) else {
                    return fail(400, "طريقة دفع غير صالحة");
                };
                let Some(invoice) = state.invoices.get(*id).cloned() else {
                    return fail(404, "الفاتورة غير موجودة");
                };
                let total = num(&invoice, "total_amount");
                if let Some(old_account) = invoice["payment_method"].as_str().and_then(account_for) {
                    self.post_to_account(&mut state, old_account, -total);
                }
                self.post_to_account(&mut state, new_account, total);
                if let Some(stored) = state.invoices.get_mut(*id) {
                    stored["payment_method"] = json!(new_method);
                    stored["remaining_amount"] =
                        json!(if new_account == "deferred" { total } else { 0.0 });
                }
                ok(json!({"message": "تم تغيير طريقة الدفع", "new_payment_method": new_method}))
            }

            (Method::Get, ["treasury", "balances"]) => ok(json!(state.balances)),
            (Method::Post, ["treasury", "transfer"]) => {
                let from = body.get("from_account").and_then(Value::as_str).unwrap_or_default().to_string();
                let to = body.get("to_account").and_then(Value::as_str).unwrap_or_default().to_string();
                let amount = num(&body, "amount");
                if !state.balances.contains_key(&from) || !state.balances.contains_key(&to) {
                    return fail(400, "حساب غير صالح");
                }
                *state.balances.entry(from).or_insert(0.0) -= amount;
                *state.balances.entry(to).or_insert(0.0) += amount;
                let transfer_id = state.next_id("transfer");
                ok(json!({"message": "تم التحويل بنجاح", "transfer_id": transfer_id}))
            }
            (Method::Post, ["treasury", "reset"]) => match query(&request, "username") {
                None => missing_query("username"),
                Some(user) if user != TREASURY_ADMIN => fail(403, "غير مصرح لك بتنفيذ هذه العملية"),
                Some(_) => {
                    for balance in state.balances.values_mut() {
                        *balance = 0.0;
                    }
                    ok(json!({"message": "تم مسح جميع بيانات الخزينة بنجاح"}))
                }
            },

            (Method::Post, ["main-treasury", "verify-password"]) => {
                let success = body.get("password").and_then(Value::as_str) == Some(MAIN_TREASURY_PASSWORD);
                ok(json!({
                    "success": success,
                    "message": if success { "كلمة المرور صحيحة" } else { "كلمة المرور غير صحيحة" },
                }))
            }
            (Method::Get, ["main-treasury", "balance"]) => ok(json!({
                "balance": state.main_balance,
                "transaction_count": state.main_transactions.len(),
            })),
            (Method::Get, ["main-treasury", "transactions"]) => {
                ok(Value::Array(state.main_transactions.iter().rev().cloned().collect()))
            }
            (Method::Post, ["main-treasury", kind @ ("deposit" | "withdrawal")]) => {
                if query(&request, "username").is_none() {
                    return missing_query("username");
                }
                let amount = num(&body, "amount");
                if amount <= 0.0 {
                    return fail(400, "المبلغ يجب أن يكون أكبر من صفر");
                }
                let delta = if *kind == "deposit" {
                    amount
                } else {
                    if amount > state.main_balance {
                        return fail(400, "الرصيد غير كافٍ");
                    }
                    -amount
                };
                state.main_balance += delta;
                let transaction_id = state.next_id("main-transaction");
                let new_balance = state.main_balance;
                state.main_transactions.push(json!({
                    "id": &transaction_id,
                    "transaction_type": kind,
                    "amount": amount,
                    "balance_after": new_balance,
                }));
                ok(json!({
                    "success": true,
                    "message": "تمت العملية بنجاح",
                    "transaction_id": transaction_id,
                    "new_balance": new_balance,
                }))
            }

            (Method::Post, ["backup", "create"]) => {
                let backup_id = state.next_id("backup");
                state.backups.insert(
                    backup_id.clone(),
                    json!({"backup_id": &backup_id, "status": "completed", "created_by": query(&request, "username")}),
                );
                state
                    .backup_polls_left
                    .insert(backup_id.clone(), self.quirks.backup_listed_after_polls);
                ok(json!({"backup_id": backup_id, "status": "in_progress", "message": "جاري إنشاء النسخة الاحتياطية"}))
            }
            (Method::Get, ["backup", "list"]) => {
                let mut listed = Vec::new();
                let State {
                    backups,
                    backup_polls_left,
                    ..
                } = &mut *state;
                for (id, backup) in backups.iter() {
                    match backup_polls_left.get_mut(id) {
                        Some(left) if *left > 0 => *left -= 1,
                        _ => listed.push(backup.clone()),
                    }
                }
                ok(Value::Array(listed))
            }
            (Method::Delete, ["backup", id]) => {
                state.backup_polls_left.remove(*id);
                match state.backups.remove(*id) {
                    Some(_) => ok(json!({"message": "تم حذف النسخة الاحتياطية"})),
                    None => fail(404, "النسخة الاحتياطية غير موجودة"),
                }
            }

            (Method::Get, [collection]) => match state.collection(collection) {
                Some(map) => ok(Value::Array(map.values().cloned().collect())),
                None => fail(404, "Not Found"),
            },
            (Method::Get, [collection, id]) => {
                match state.collection(collection).and_then(|map| map.get(*id)) {
                    Some(found) => ok(found.clone()),
                    None => fail(404, "غير موجود"),
                }
            }
            (Method::Delete, [collection, id]) => {
                match state.collection(collection).and_then(|map| map.remove(*id)) {
                    Some(_) => ok(json!({"message": "تم الحذف بنجاح"})),
                    None => fail(404, "غير موجود"),
                }
            }
            _ => fail(404, "Not Found"),
        }
    }
}

#[async_trait]
impl Transport for FakeBackend {
    async fn send(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
        self.handle(request)
    }

    fn base_url(&self) -> &str {
        "fake://backend/api"
    }

    fn transport_name(&self) -> &'static str {
        "fake"
    }
}
