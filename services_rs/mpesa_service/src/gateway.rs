//! Daraja (M-Pesa Express) client: OAuth token exchange and STK push.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::GatewayCredentials;

pub const TRANSACTION_TYPE_PAYBILL: &str = "CustomerPayBillOnline";

// Africa/Nairobi has no DST.
const NAIROBI_OFFSET_SECS: i32 = 3 * 3600;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{0}")]
    Token(String),
    #[error("amount {0} cannot be sent to the gateway")]
    Amount(Decimal),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("invalid gateway response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// `YYYYMMDDHHmmss` in East Africa Time, as the gateway expects.
pub fn gateway_timestamp(now: DateTime<Utc>) -> String {
    let eat = FixedOffset::east_opt(NAIROBI_OFFSET_SECS).unwrap_or_else(|| Utc.fix());
    now.with_timezone(&eat).format("%Y%m%d%H%M%S").to_string()
}

/// Shared-secret password: `base64(shortcode ++ passkey ++ timestamp)`.
pub fn stk_password(shortcode: &str, passkey: &str, timestamp: &str) -> String {
    STANDARD.encode(format!("{shortcode}{passkey}{timestamp}"))
}

/// Whole currency units, half away from zero.
pub fn whole_amount(amount: Decimal) -> Result<i64, GatewayError> {
    amount
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(GatewayError::Amount(amount))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StkPushPayload {
    pub business_short_code: String,
    pub password: String,
    pub timestamp: String,
    pub transaction_type: &'static str,
    pub amount: i64,
    pub party_a: String,
    pub party_b: String,
    pub phone_number: String,
    #[serde(rename = "CallBackURL")]
    pub call_back_url: String,
    pub account_reference: String,
    pub transaction_desc: String,
}

/// What the initiator collected from the client, already validated.
#[derive(Debug, Clone)]
pub struct StkPushRequest {
    pub amount: Decimal,
    pub phone_number: String,
    pub account_reference: String,
    pub transaction_desc: String,
}

impl StkPushPayload {
    pub fn build(
        creds: &GatewayCredentials<'_>,
        callback_url: &str,
        req: &StkPushRequest,
        now: DateTime<Utc>,
    ) -> Result<Self, GatewayError> {
        let timestamp = gateway_timestamp(now);
        Ok(Self {
            business_short_code: creds.shortcode.to_string(),
            password: stk_password(creds.shortcode, creds.passkey, &timestamp),
            timestamp,
            transaction_type: TRANSACTION_TYPE_PAYBILL,
            amount: whole_amount(req.amount)?,
            party_a: req.phone_number.clone(),
            party_b: creds.shortcode.to_string(),
            phone_number: req.phone_number.clone(),
            call_back_url: callback_url.to_string(),
            account_reference: req.account_reference.clone(),
            transaction_desc: req.transaction_desc.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Exchanges the consumer key/secret for a bearer token (HTTP basic auth).
pub async fn fetch_access_token(
    http: &Client,
    auth_url: &str,
    creds: &GatewayCredentials<'_>,
) -> Result<String, GatewayError> {
    let resp = http
        .get(auth_url)
        .basic_auth(creds.consumer_key, Some(creds.consumer_secret))
        .send()
        .await?;
    let status = resp.status();
    let body = resp.text().await?;
    let parsed = serde_json::from_str::<TokenResponse>(&body);

    if !status.is_success() {
        let detail = parsed
            .ok()
            .and_then(|t| t.error_description)
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| "Failed to get access token".to_string());
        tracing::warn!(status = %status, "gateway token exchange rejected");
        return Err(GatewayError::Token(detail));
    }

    parsed?
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| GatewayError::Token("access_token missing from gateway response".to_string()))
}

#[derive(Debug, Clone, PartialEq)]
pub enum StkPushReply {
    Accepted(Value),
    /// The gateway answered non-2xx; its body is relayed to the caller as-is.
    Rejected(Value),
}

pub async fn submit_stk_push(
    http: &Client,
    stk_url: &str,
    access_token: &str,
    payload: &StkPushPayload,
) -> Result<StkPushReply, GatewayError> {
    let resp = http
        .post(stk_url)
        .bearer_auth(access_token)
        .json(payload)
        .send()
        .await?;
    let status = resp.status();
    let body: Value = serde_json::from_slice(&resp.bytes().await?)?;

    if status.is_success() {
        Ok(StkPushReply::Accepted(body))
    } else {
        tracing::warn!(status = %status, "gateway rejected stk push");
        Ok(StkPushReply::Rejected(body))
    }
}
