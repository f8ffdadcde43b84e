//! Normalization of gateway result notifications.
//!
//! The gateway (or an operator replaying a payment by hand) posts one of two
//! shapes. Both are reduced to a [`CallbackData`] before any store access.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::ApiError;
use crate::models::{is_truthy, value_to_decimal, value_to_string};

pub const MISSING_IDS: &str = "Missing bookingId or transactionId";

/// Normalized view of one notification. Every field may still be missing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CallbackData {
    pub booking_id: Option<String>,
    pub transaction_id: Option<String>,
    pub amount: Option<Decimal>,
    pub phone_number: Option<String>,
}

/// Notification that carries both identifiers and can be reconciled.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedCallback {
    pub booking_id: String,
    pub transaction_id: String,
    pub amount: Decimal,
    pub phone_number: Option<String>,
}

impl CallbackData {
    pub fn validate(self) -> Result<ValidatedCallback, ApiError> {
        match (self.booking_id, self.transaction_id) {
            (Some(booking_id), Some(transaction_id)) => Ok(ValidatedCallback {
                booking_id,
                transaction_id,
                amount: self.amount.unwrap_or(Decimal::ZERO),
                phone_number: self.phone_number,
            }),
            _ => Err(ApiError::bad_request(MISSING_IDS)),
        }
    }
}

/// Flat shape: `{bookingId, transactionId, amount?, phoneNumber?}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectCallback {
    pub booking_id: Value,
    pub transaction_id: Value,
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default)]
    pub phone_number: Option<Value>,
}

/// Gateway-native shape found under `Body.stkCallback`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: Option<Value>,
    #[serde(rename = "CheckoutRequestID", default)]
    pub checkout_request_id: Option<Value>,
    #[serde(default)]
    pub result_code: Option<Value>,
    #[serde(default)]
    pub result_desc: Option<Value>,
    #[serde(default)]
    pub account_reference: Option<Value>,
    /// Kept untyped: one malformed `Item` entry must not hide the rest.
    #[serde(default)]
    pub callback_metadata: Option<Value>,
}

impl StkCallback {
    /// Folds the sparse `{Name, Value}` list into a lookup. Entries that are
    /// not objects or lack a non-empty string `Name` are skipped; a repeated
    /// name keeps its last value.
    pub fn metadata(&self) -> HashMap<&str, &Value> {
        let mut map = HashMap::new();
        let items = self
            .callback_metadata
            .as_ref()
            .and_then(|m| m.get("Item"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for item in items {
            let Some(name) = item
                .get("Name")
                .and_then(Value::as_str)
                .filter(|n| !n.is_empty())
            else {
                continue;
            };
            match item.get("Value") {
                Some(value) => map.insert(name, value),
                None => map.remove(name),
            };
        }
        map
    }

    pub fn result_code(&self) -> Option<i64> {
        match self.result_code.as_ref()? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn normalize(&self) -> CallbackData {
        let meta = self.metadata();
        let not_null = |v: &&Value| !v.is_null();

        let transaction_id = meta
            .get("MpesaReceiptNumber")
            .copied()
            .filter(not_null)
            .or_else(|| self.checkout_request_id.as_ref().filter(not_null));

        let phone_number = meta
            .get("PhoneNumber")
            .copied()
            .filter(|v| is_truthy(Some(*v)));

        CallbackData {
            booking_id: value_to_string(self.account_reference.as_ref()),
            transaction_id: value_to_string(transaction_id),
            amount: Some(value_to_decimal(meta.get("Amount").copied()).unwrap_or(Decimal::ZERO)),
            phone_number: value_to_string(phone_number),
        }
    }
}

#[derive(Clone, Debug)]
pub enum CallbackPayload {
    Direct(DirectCallback),
    Gateway(StkCallback),
    Unrecognized,
}

impl CallbackPayload {
    /// Flat identifiers win over a nested gateway callback; a body with
    /// neither is unrecognized.
    pub fn classify(raw: &Value) -> Self {
        if is_truthy(raw.get("bookingId")) && is_truthy(raw.get("transactionId")) {
            if let Ok(direct) = DirectCallback::deserialize(raw) {
                return Self::Direct(direct);
            }
        }

        match raw.pointer("/Body/stkCallback") {
            Some(stk @ Value::Object(_)) => match StkCallback::deserialize(stk) {
                Ok(cb) => Self::Gateway(cb),
                Err(e) => {
                    tracing::warn!(error = %e, "malformed stkCallback body");
                    Self::Unrecognized
                }
            },
            _ => Self::Unrecognized,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CallbackPayload::Direct(_) => "direct",
            CallbackPayload::Gateway(_) => "gateway",
            CallbackPayload::Unrecognized => "unrecognized",
        }
    }

    pub fn normalize(&self) -> CallbackData {
        match self {
            CallbackPayload::Direct(d) => CallbackData {
                booking_id: value_to_string(Some(&d.booking_id)),
                transaction_id: value_to_string(Some(&d.transaction_id)),
                amount: Some(value_to_decimal(d.amount.as_ref()).unwrap_or(Decimal::ZERO)),
                phone_number: d
                    .phone_number
                    .as_ref()
                    .filter(|v| is_truthy(Some(*v)))
                    .and_then(|v| value_to_string(Some(v))),
            },
            CallbackPayload::Gateway(stk) => stk.normalize(),
            CallbackPayload::Unrecognized => CallbackData::default(),
        }
    }
}
