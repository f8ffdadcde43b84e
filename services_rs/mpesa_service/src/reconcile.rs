use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::callback::ValidatedCallback;
use crate::models::{PaymentStatus, BOOKING_STATUS_CONFIRMED, PAYMENT_METHOD_MPESA};
use crate::trip::TripStage;

/// Payment row found by transaction id, as far as reconciliation cares.
#[derive(Clone, Debug, PartialEq)]
pub struct ExistingPayment {
    pub id: String,
    pub status: PaymentStatus,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcilePlan {
    /// Redelivered notification: nothing is written.
    AlreadyCompleted,
    CompleteExisting { payment_id: String },
    InsertCompleted,
}

pub fn plan(existing: Option<&ExistingPayment>) -> ReconcilePlan {
    match existing {
        Some(p) if p.status == PaymentStatus::Completed => ReconcilePlan::AlreadyCompleted,
        Some(p) => ReconcilePlan::CompleteExisting {
            payment_id: p.id.clone(),
        },
        None => ReconcilePlan::InsertCompleted,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewPayment {
    pub booking_id: String,
    pub amount: Decimal,
    pub payment_method: &'static str,
    pub status: PaymentStatus,
    pub mpesa_transaction_id: String,
    pub mpesa_phone_number: Option<String>,
    pub transaction_date: DateTime<Utc>,
}

impl NewPayment {
    pub fn from_callback(cb: &ValidatedCallback, now: DateTime<Utc>) -> Self {
        Self {
            booking_id: cb.booking_id.clone(),
            amount: cb.amount,
            payment_method: PAYMENT_METHOD_MPESA,
            status: PaymentStatus::Completed,
            mpesa_transaction_id: cb.transaction_id.clone(),
            mpesa_phone_number: cb.phone_number.clone(),
            transaction_date: now,
        }
    }
}

/// Booking columns written once a payment completes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BookingConfirmation {
    pub status: &'static str,
    pub trip_status: TripStage,
    pub payment_completed_at: DateTime<Utc>,
}

impl BookingConfirmation {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            status: BOOKING_STATUS_CONFIRMED,
            trip_status: TripStage::first(),
            payment_completed_at: now,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    AlreadyCompleted,
    Completed {
        /// A new payment row was inserted rather than an existing one updated.
        created: bool,
        bookings_updated: u64,
    },
}
