use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::callback::CallbackPayload;
use crate::dispatch;
use crate::error::{ApiError, ApiResult};
use crate::gateway::{self, StkPushPayload, StkPushReply, StkPushRequest};
use crate::models::*;
use crate::reconcile::ReconcileOutcome;
use crate::state::AppState;
use crate::trip;

const DEFAULT_ACCOUNT_REFERENCE: &str = "UrbanGo";
const DEFAULT_TRANSACTION_DESC: &str = "Urban Go ride payment";

// Content type is not checked; an unreadable body answers 500.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> ApiResult<T> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::warn!(error = %e, "request body is not valid JSON");
        ApiError::internal(e.to_string())
    })
}

pub async fn health(State(state): State<AppState>) -> axum::Json<HealthOut> {
    axum::Json(HealthOut {
        status: "ok",
        env: state.env_name.clone(),
        service: "UrbanGo M-Pesa",
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn validate_stk_push(body: StkPushReq) -> ApiResult<StkPushRequest> {
    let amount = value_to_decimal(body.amount.as_ref()).unwrap_or(Decimal::ZERO);
    let phone_number = value_to_string(body.phone_number.as_ref()).unwrap_or_default();
    if amount <= Decimal::ZERO || phone_number.trim().is_empty() {
        return Err(ApiError::bad_request("Missing amount or phoneNumber"));
    }
    Ok(StkPushRequest {
        amount,
        phone_number,
        account_reference: value_to_string(body.account_reference.as_ref())
            .unwrap_or_else(|| DEFAULT_ACCOUNT_REFERENCE.to_string()),
        transaction_desc: value_to_string(body.transaction_desc.as_ref())
            .unwrap_or_else(|| DEFAULT_TRANSACTION_DESC.to_string()),
    })
}

/// Starts an M-Pesa Express (STK push) payment on the rider's phone.
pub async fn stk_push(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<(StatusCode, axum::Json<Value>)> {
    let Some(creds) = state.mpesa.credentials() else {
        return Err(ApiError::internal("Missing M-Pesa env vars"));
    };
    let Some(callback_url) = state.mpesa.callback_url.as_deref() else {
        return Err(ApiError::internal("Missing MPESA_CALLBACK_URL"));
    };

    let req = validate_stk_push(parse_body(&body)?)?;
    let payload = StkPushPayload::build(&creds, callback_url, &req, Utc::now())?;

    let token = gateway::fetch_access_token(&state.http, &state.mpesa.auth_url, &creds).await?;
    match gateway::submit_stk_push(&state.http, &state.mpesa.stk_url, &token, &payload).await? {
        StkPushReply::Accepted(reply) => {
            tracing::info!(
                checkout_request_id = ?reply.get("CheckoutRequestID"),
                account_reference = %payload.account_reference,
                amount = payload.amount,
                "stk push accepted"
            );
            Ok((StatusCode::OK, axum::Json(reply)))
        }
        StkPushReply::Rejected(reply) => Ok((StatusCode::BAD_REQUEST, axum::Json(reply))),
    }
}

/// Result notification from the gateway (or a manual replay in the flat shape).
pub async fn stk_callback(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<axum::Json<SuccessOut>> {
    let raw: Value = parse_body(&body)?;
    let payload = CallbackPayload::classify(&raw);

    if let CallbackPayload::Gateway(stk) = &payload {
        if let Some(code) = stk.result_code().filter(|c| *c != 0) {
            tracing::warn!(
                result_code = code,
                result_desc = ?stk.result_desc,
                checkout_request_id = ?stk.checkout_request_id,
                merchant_request_id = ?stk.merchant_request_id,
                "gateway reported an unsuccessful payment"
            );
        }
    }

    let cb = payload.normalize().validate().inspect_err(|_| {
        tracing::warn!(shape = payload.kind(), "callback without bookingId or transactionId");
    })?;

    match state.store.reconcile_payment(&cb, Utc::now()).await? {
        ReconcileOutcome::AlreadyCompleted => {
            tracing::info!(
                transaction_id = %cb.transaction_id,
                booking_id = %cb.booking_id,
                "callback redelivered for completed payment"
            );
            return Ok(axum::Json(SuccessOut::with_message("Already completed")));
        }
        ReconcileOutcome::Completed {
            created,
            bookings_updated,
        } => {
            if bookings_updated == 0 {
                tracing::warn!(booking_id = %cb.booking_id, "payment completed but booking not found");
            }
            tracing::info!(
                transaction_id = %cb.transaction_id,
                booking_id = %cb.booking_id,
                shape = payload.kind(),
                created,
                "payment completed"
            );
        }
    }

    if state.trip_trigger_enabled() {
        if let Some(url) = state.simulate_trip_url.clone() {
            dispatch::spawn_trip_trigger(state.http.clone(), url, cb.booking_id.clone());
        }
    }

    Ok(axum::Json(SuccessOut::ok()))
}

/// Walks a booking through the dispatch stages; responds once all are written.
pub async fn simulate_trip(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<axum::Json<SuccessOut>> {
    let req: TripFlowReq = parse_body(&body)?;
    let Some(booking_id) = value_to_string(req.booking_id.as_ref()) else {
        return Err(ApiError::bad_request("Missing bookingId"));
    };

    // Detached so a caller hanging up does not cancel a running simulation.
    let run = tokio::spawn(trip::run_simulation(state.store.clone(), booking_id));
    match run.await {
        Ok(Ok(())) => Ok(axum::Json(SuccessOut::ok())),
        Ok(Err(e)) => Err(e.into()),
        Err(e) => {
            tracing::error!(error = %e, "trip simulation task failed");
            Err(ApiError::internal(e.to_string()))
        }
    }
}
