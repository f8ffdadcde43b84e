use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

pub const PAYMENT_METHOD_MPESA: &str = "M-Pesa";
pub const BOOKING_STATUS_CONFIRMED: &str = "Confirmed";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Completed,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Completed => "Completed",
        }
    }

    /// Anything other than `Completed` is still open for completion.
    pub fn from_db(raw: &str) -> Self {
        if raw == "Completed" {
            PaymentStatus::Completed
        } else {
            PaymentStatus::Pending
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StkPushReq {
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default)]
    pub phone_number: Option<Value>,
    #[serde(default)]
    pub account_reference: Option<Value>,
    #[serde(default)]
    pub transaction_desc: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripFlowReq {
    #[serde(default)]
    pub booking_id: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct SuccessOut {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

impl SuccessOut {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn with_message(message: &'static str) -> Self {
        Self {
            success: true,
            message: Some(message),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthOut {
    pub status: &'static str,
    pub env: String,
    pub service: &'static str,
    pub version: &'static str,
}

// Client apps and the gateway send loosely typed JSON: ids and phone numbers
// arrive as strings or numbers, amounts as numbers or numeric strings.

/// Values that count as "present" for a loosely typed field.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Scalar value rendered as text; empty results are treated as absent.
pub fn value_to_string(value: Option<&Value>) -> Option<String> {
    let s = match value? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Numeric value from a number or numeric string; anything else is absent.
pub fn value_to_decimal(value: Option<&Value>) -> Option<Decimal> {
    match value? {
        Value::Number(n) => {
            let raw = n.to_string();
            Decimal::from_str(&raw)
                .or_else(|_| Decimal::from_scientific(&raw))
                .ok()
        }
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            Decimal::from_str(s)
                .or_else(|_| Decimal::from_scientific(s))
                .ok()
        }
        _ => None,
    }
}
