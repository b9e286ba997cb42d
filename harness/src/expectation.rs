//! Expected outcomes for API calls.
//!
//! An [`Expectation`] states up front whether a call should succeed with a
//! body of a given [`Shape`], or fail with a specific error status. The
//! recorder consumes every expectation the same way, so scenarios never
//! re-implement status-code checks inline.
//!
//! ```rust
//! use harness::expectation::{Expectation, Shape};
//!
//! let created = Expectation::success(Shape::non_empty("id"));
//! let invalid = Expectation::error([422]);
//! let wrong_password = Expectation::error([401]).with_message("كلمة المرور");
//! let unauthorized = Expectation::rejected([403]);
//! # let _ = (created, invalid, wrong_password, unauthorized);
//! ```

use client::Exchange;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Tolerance used for money and length comparisons across scenarios.
pub const DEFAULT_TOLERANCE: f64 = 0.01;

pub fn approx_eq(actual: f64, expected: f64, tolerance: f64) -> bool {
    (actual - expected).abs() < tolerance
}

/// Looks up `field` as a JSON pointer when it starts with `/`, else as a top-level key.
pub fn lookup<'a>(value: &'a Value, field: &str) -> Option<&'a Value> {
    if field.starts_with('/') {
        value.pointer(field)
    } else {
        value.get(field)
    }
}

type CustomCheck = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// Predicate over a JSON response body.
#[derive(Clone)]
pub enum Shape {
    Any,
    IsArray,
    HasFields(Vec<String>),
    FieldEquals(String, Value),
    NonEmpty(String),
    /// Root array holds an element whose `key` equals `value`.
    ArrayContains { key: String, value: Value },
    NumberNear {
        field: String,
        expected: f64,
        tolerance: f64,
    },
    Not(Box<Shape>),
    All(Vec<Shape>),
    Custom { name: String, check: CustomCheck },
}

impl Shape {
    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Shape::HasFields(fields.into_iter().map(Into::into).collect())
    }

    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Shape::FieldEquals(field.into(), value.into())
    }

    pub fn non_empty(field: impl Into<String>) -> Self {
        Shape::NonEmpty(field.into())
    }

    pub fn contains(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Shape::ArrayContains {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn near(field: impl Into<String>, expected: f64) -> Self {
        Shape::NumberNear {
            field: field.into(),
            expected,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    pub fn not(shape: Shape) -> Self {
        Shape::Not(Box::new(shape))
    }

    pub fn custom<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        Shape::Custom {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    pub fn and(self, other: Shape) -> Self {
        match self {
            Shape::All(mut shapes) => {
                shapes.push(other);
                Shape::All(shapes)
            }
            Shape::Any => other,
            shape => Shape::All(vec![shape, other]),
        }
    }

    /// Checks a body that was already fetched.
    pub fn verdict(&self, body: &Value, pass_details: impl Into<String>) -> Verdict {
        match self.check(body) {
            Ok(()) => Verdict::Pass(pass_details.into()),
            Err(reason) => Verdict::Fail(reason),
        }
    }

    pub fn check(&self, body: &Value) -> Result<(), String> {
        match self {
            Shape::Any => Ok(()),
            Shape::IsArray => {
                if body.is_array() {
                    Ok(())
                } else {
                    Err(format!("Expected a JSON array, got: {}", body))
                }
            }
            Shape::HasFields(fields) => {
                let missing: Vec<&str> = fields
                    .iter()
                    .filter(|f| lookup(body, f).is_none())
                    .map(String::as_str)
                    .collect();
                if missing.is_empty() {
                    Ok(())
                } else {
                    Err(format!("Missing fields: {:?}", missing))
                }
            }
            Shape::FieldEquals(field, expected) => match lookup(body, field) {
                Some(actual) if actual == expected => Ok(()),
                Some(actual) => Err(format!(
                    "Expected {}={}, got: {}",
                    field, expected, actual
                )),
                None => Err(format!("Missing field '{}' in: {}", field, body)),
            },
            Shape::NonEmpty(field) => match lookup(body, field) {
                None | Some(Value::Null) => Err(format!("Missing field '{}' in: {}", field, body)),
                Some(Value::String(s)) if s.is_empty() => Err(format!("Field '{}' is empty", field)),
                Some(Value::Array(a)) if a.is_empty() => Err(format!("Field '{}' is empty", field)),
                Some(_) => Ok(()),
            },
            Shape::ArrayContains { key, value } => match body.as_array() {
                Some(items) => {
                    if items.iter().any(|item| item.get(key) == Some(value)) {
                        Ok(())
                    } else {
                        Err(format!(
                            "No element with {}={} among {} items",
                            key,
                            value,
                            items.len()
                        ))
                    }
                }
                None => Err(format!("Expected a JSON array, got: {}", body)),
            },
            Shape::NumberNear {
                field,
                expected,
                tolerance,
            } => match lookup(body, field).and_then(Value::as_f64) {
                Some(actual) if approx_eq(actual, *expected, *tolerance) => Ok(()),
                Some(actual) => Err(format!(
                    "{} mismatch. Expected: {}, Got: {}",
                    field, expected, actual
                )),
                None => Err(format!("Field '{}' is not a number in: {}", field, body)),
            },
            Shape::Not(inner) => match inner.check(body) {
                Ok(()) => Err(format!("Unexpectedly matched {:?}", inner)),
                Err(_) => Ok(()),
            },
            Shape::All(shapes) => shapes.iter().try_for_each(|shape| shape.check(body)),
            Shape::Custom { name, check } => {
                check(body).map_err(|reason| format!("{}: {}", name, reason))
            }
        }
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Any => write!(f, "Any"),
            Shape::IsArray => write!(f, "IsArray"),
            Shape::HasFields(fields) => write!(f, "HasFields({:?})", fields),
            Shape::FieldEquals(field, value) => write!(f, "FieldEquals({}, {})", field, value),
            Shape::NonEmpty(field) => write!(f, "NonEmpty({})", field),
            Shape::ArrayContains { key, value } => write!(f, "ArrayContains({}={})", key, value),
            Shape::NumberNear {
                field,
                expected,
                tolerance,
            } => write!(f, "NumberNear({} ≈ {} ± {})", field, expected, tolerance),
            Shape::Not(inner) => write!(f, "Not({:?})", inner),
            Shape::All(shapes) => f.debug_list().entries(shapes).finish(),
            Shape::Custom { name, .. } => write!(f, "Custom({})", name),
        }
    }
}

/// What a single call is expected to produce.
#[derive(Debug, Clone)]
pub enum Expectation {
    /// 2xx with a JSON body matching the shape.
    Success(Shape),
    /// One of `statuses`, optionally with `message` inside the error detail.
    Error {
        statuses: Vec<u16>,
        message: Option<String>,
    },
    /// One of `statuses`, or HTTP 200 carrying `"success": false`.
    Rejected { statuses: Vec<u16> },
}

impl Expectation {
    pub fn success(shape: Shape) -> Self {
        Expectation::Success(shape)
    }

    pub fn ok() -> Self {
        Expectation::Success(Shape::Any)
    }

    pub fn error(statuses: impl IntoIterator<Item = u16>) -> Self {
        Expectation::Error {
            statuses: statuses.into_iter().collect(),
            message: None,
        }
    }

    pub fn rejected(statuses: impl IntoIterator<Item = u16>) -> Self {
        Expectation::Rejected {
            statuses: statuses.into_iter().collect(),
        }
    }

    /// Requires the error detail to contain `message`. No effect on other variants.
    pub fn with_message(self, message: impl Into<String>) -> Self {
        match self {
            Expectation::Error { statuses, .. } => Expectation::Error {
                statuses,
                message: Some(message.into()),
            },
            other => other,
        }
    }

    pub fn evaluate(&self, exchange: &Exchange) -> Verdict {
        let response = match exchange {
            Exchange::Responded(response) => response,
            Exchange::Unreachable(_) => return Verdict::Fail(exchange.summary()),
        };

        match self {
            Expectation::Success(shape) => {
                if !response.is_success() {
                    return Verdict::Fail(exchange.summary());
                }
                match (shape, response.json()) {
                    (Shape::Any, _) => Verdict::Pass(format!("HTTP {}", response.status)),
                    (_, None) => Verdict::Fail(format!(
                        "Expected a JSON body, got: {}",
                        exchange.summary()
                    )),
                    (shape, Some(body)) => match shape.check(body) {
                        Ok(()) => Verdict::Pass(format!("HTTP {}", response.status)),
                        Err(reason) => Verdict::Fail(reason),
                    },
                }
            }
            Expectation::Error { statuses, message } => {
                if !statuses.contains(&response.status) {
                    return Verdict::Fail(format!(
                        "Expected HTTP {}, got {}",
                        join_statuses(statuses),
                        exchange.summary()
                    ));
                }
                let detail = response.detail();
                match message {
                    Some(expected) if !detail.contains(expected.as_str()) => Verdict::Fail(format!(
                        "HTTP {} but detail lacks '{}': {}",
                        response.status, expected, detail
                    )),
                    _ => Verdict::Pass(format!(
                        "Correctly rejected with HTTP {}: {}",
                        response.status, detail
                    )),
                }
            }
            Expectation::Rejected { statuses } => {
                if statuses.contains(&response.status) {
                    return Verdict::Pass(format!(
                        "Correctly rejected with HTTP {}",
                        response.status
                    ));
                }
                if response.status == 200
                    && response.field("success") == Some(&Value::Bool(false))
                {
                    let message = response.str_field("message").unwrap_or("No message");
                    return Verdict::Pass(format!("Correctly rejected: {}", message));
                }
                Verdict::Fail(format!(
                    "Should have been rejected but got {}",
                    exchange.summary()
                ))
            }
        }
    }
}

fn join_statuses(statuses: &[u16]) -> String {
    statuses
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join("/")
}

/// Outcome of evaluating one expectation or numeric check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass(String),
    Fail(String),
}

impl Verdict {
    pub fn from_bool(success: bool, details: impl Into<String>) -> Self {
        if success {
            Verdict::Pass(details.into())
        } else {
            Verdict::Fail(details.into())
        }
    }

    /// Numeric comparison with the shared tolerance semantics.
    pub fn near(label: &str, actual: f64, expected: f64, tolerance: f64) -> Self {
        if approx_eq(actual, expected, tolerance) {
            Verdict::Pass(format!("{}: {} (expected {})", label, actual, expected))
        } else {
            Verdict::Fail(format!(
                "{} mismatch. Expected: {}, Got: {}",
                label, expected, actual
            ))
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass(_))
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, Verdict::Fail(_))
    }

    pub fn details(&self) -> &str {
        match self {
            Verdict::Pass(details) | Verdict::Fail(details) => details,
        }
    }

    pub fn into_details(self) -> String {
        match self {
            Verdict::Pass(details) | Verdict::Fail(details) => details,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass(details) => write!(f, "✅ PASS: {}", details),
            Verdict::Fail(details) => write!(f, "❌ FAIL: {}", details),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use client::{ApiResponse, ResponseBody, TransportFailure};
    use serde_json::json;

    fn responded(status: u16, body: Value) -> Exchange {
        Exchange::Responded(ApiResponse::new(status, ResponseBody::Json(body)))
    }

    #[test]
    fn test_success_with_shape() {
        let expectation = Expectation::success(
            Shape::non_empty("id").and(Shape::equals("name", "أحمد محمد")),
        );

        let verdict = expectation.evaluate(&responded(200, json!({"id": "c-1", "name": "أحمد محمد"})));
        assert_eq!(verdict, Verdict::Pass("HTTP 200".to_string()));

        let verdict = expectation.evaluate(&responded(200, json!({"id": "", "name": "أحمد محمد"})));
        assert_eq!(verdict, Verdict::Fail("Field 'id' is empty".to_string()));

        let verdict = expectation.evaluate(&responded(422, json!({"detail": "bad"})));
        assert!(verdict.is_fail());
        assert!(verdict.details().starts_with("HTTP 422"));
    }

    #[test]
    fn test_success_requires_json_for_shapes() {
        let exchange = Exchange::Responded(ApiResponse::new(200, ResponseBody::Text("ok".into())));
        assert!(Expectation::ok().evaluate(&exchange).is_pass());
        assert!(Expectation::success(Shape::IsArray)
            .evaluate(&exchange)
            .is_fail());
    }

    #[test]
    fn test_expected_error_status() {
        let expectation = Expectation::error([400, 404, 422]);
        assert!(expectation
            .evaluate(&responded(422, json!({"detail": [{"loc": ["body", "name"]}]})))
            .is_pass());
        let verdict = expectation.evaluate(&responded(200, json!({"id": "x"})));
        assert!(verdict.is_fail());
        assert!(verdict.details().starts_with("Expected HTTP 400/404/422"));
    }

    #[test]
    fn test_expected_error_message() {
        let expectation = Expectation::error([401]).with_message("كلمة المرور غير صحيحة");
        assert!(expectation
            .evaluate(&responded(401, json!({"detail": "كلمة المرور غير صحيحة"})))
            .is_pass());
        assert!(expectation
            .evaluate(&responded(401, json!({"detail": "Not authenticated"})))
            .is_fail());
    }

    #[test]
    fn test_rejected_accepts_status_or_success_false() {
        let expectation = Expectation::rejected([400, 403]);
        assert!(expectation.evaluate(&responded(403, json!({}))).is_pass());

        let verdict = expectation.evaluate(&responded(
            200,
            json!({"success": false, "message": "كلمة المرور غير صحيحة"}),
        ));
        assert_eq!(
            verdict,
            Verdict::Pass("Correctly rejected: كلمة المرور غير صحيحة".to_string())
        );

        assert!(expectation
            .evaluate(&responded(200, json!({"success": true, "new_balance": 500.0})))
            .is_fail());
    }

    #[test]
    fn test_unreachable_always_fails() {
        let exchange = Exchange::Unreachable(TransportFailure {
            request: "POST /customers".to_string(),
            message: "timed out".to_string(),
        });
        for expectation in [
            Expectation::ok(),
            Expectation::error([404]),
            Expectation::rejected([403]),
        ] {
            let verdict = expectation.evaluate(&exchange);
            assert!(verdict.is_fail());
            assert!(verdict.details().contains("timed out"));
        }
    }

    #[test]
    fn test_array_shapes() {
        let body = json!([{"id": "a"}, {"id": "b"}]);
        assert!(Shape::IsArray.check(&body).is_ok());
        assert!(Shape::contains("id", "b").check(&body).is_ok());
        assert!(Shape::contains("id", "c").check(&body).is_err());
        assert!(Shape::not(Shape::contains("id", "c")).check(&body).is_ok());
        assert!(Shape::contains("id", "a").check(&json!({"id": "a"})).is_err());
    }

    #[test]
    fn test_number_near_and_pointer_fields() {
        let body = json!({"summary": {"total": 299.995}, "cash": "n/a"});
        assert!(Shape::near("/summary/total", 300.0).check(&body).is_ok());
        assert!(Shape::near("/summary/total", 301.0).check(&body).is_err());
        assert!(Shape::near("cash", 0.0).check(&body).is_err());
        assert!(Shape::fields(["summary", "/summary/total"]).check(&body).is_ok());
        assert_eq!(
            Shape::fields(["summary", "invoice_count"]).check(&body),
            Err("Missing fields: [\"invoice_count\"]".to_string())
        );
    }

    #[test]
    fn test_custom_shape() {
        let shape = Shape::custom("positive balance", |body| {
            match body.get("balance").and_then(Value::as_f64) {
                Some(b) if b >= 0.0 => Ok(()),
                other => Err(format!("got {:?}", other)),
            }
        });
        assert!(shape.check(&json!({"balance": 10})).is_ok());
        assert_eq!(
            shape.check(&json!({"balance": -1})),
            Err("positive balance: got Some(-1.0)".to_string())
        );
        assert_eq!(format!("{:?}", shape), "Custom(positive balance)");
    }

    #[test]
    fn test_verdict_near_and_display() {
        assert!(Verdict::near("cash delta", 300.004, 300.0, DEFAULT_TOLERANCE).is_pass());
        let verdict = Verdict::near("cash delta", 600.0, 300.0, DEFAULT_TOLERANCE);
        assert_eq!(
            verdict.to_string(),
            "❌ FAIL: cash delta mismatch. Expected: 300, Got: 600"
        );
        assert!(approx_eq(0.1 + 0.2, 0.3, DEFAULT_TOLERANCE));
    }
}
