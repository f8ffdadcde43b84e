use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{RideStore, StoreError};
use crate::callback::ValidatedCallback;
use crate::models::PaymentStatus;
use crate::reconcile::{
    plan, BookingConfirmation, ExistingPayment, NewPayment, ReconcileOutcome, ReconcilePlan,
};
use crate::trip::TripStage;

/// Row of the `Payments` table.
#[derive(Clone, Debug, PartialEq)]
pub struct PaymentRecord {
    pub id: String,
    pub booking_id: Option<String>,
    pub amount: Decimal,
    pub payment_method: String,
    pub status: PaymentStatus,
    pub mpesa_transaction_id: Option<String>,
    pub mpesa_phone_number: Option<String>,
    pub transaction_date: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BookingRecord {
    pub id: String,
    pub status: String,
    pub trip_status: Option<String>,
    pub payment_completed_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Inner {
    payments: Vec<PaymentRecord>,
    bookings: HashMap<String, BookingRecord>,
    trip_history: Vec<(String, TripStage)>,
    payment_lookups: usize,
    payment_writes: usize,
    booking_writes: usize,
    rollbacks: usize,
    trip_updates_left: Option<usize>,
    fail_lookup: bool,
    fail_booking_update: bool,
}

/// In-process stand-in for the Postgres tables, with call counters and
/// injectable failures.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

fn injected() -> StoreError {
    StoreError::Database(sqlx::Error::PoolTimedOut)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_booking(&self, id: &str) {
        let mut inner = self.inner.lock().await;
        inner.bookings.insert(
            id.to_string(),
            BookingRecord {
                id: id.to_string(),
                status: "Pending".to_string(),
                trip_status: None,
                payment_completed_at: None,
            },
        );
    }

    pub async fn seed_payment(&self, booking_id: &str, transaction_id: &str, status: PaymentStatus) -> String {
        let mut inner = self.inner.lock().await;
        let id = Uuid::new_v4().to_string();
        inner.payments.push(PaymentRecord {
            id: id.clone(),
            booking_id: Some(booking_id.to_string()),
            amount: 0.into(),
            payment_method: "M-Pesa".to_string(),
            status,
            mpesa_transaction_id: Some(transaction_id.to_string()),
            mpesa_phone_number: None,
            transaction_date: None,
        });
        id
    }

    pub async fn payments(&self) -> Vec<PaymentRecord> {
        self.inner.lock().await.payments.clone()
    }

    pub async fn booking(&self, id: &str) -> Option<BookingRecord> {
        self.inner.lock().await.bookings.get(id).cloned()
    }

    pub async fn trip_history(&self) -> Vec<(String, TripStage)> {
        self.inner.lock().await.trip_history.clone()
    }

    pub async fn payment_lookups(&self) -> usize {
        self.inner.lock().await.payment_lookups
    }

    pub async fn payment_writes(&self) -> usize {
        self.inner.lock().await.payment_writes
    }

    pub async fn booking_writes(&self) -> usize {
        self.inner.lock().await.booking_writes
    }

    /// Reconciliations whose payment write was undone by a later failure.
    pub async fn rollbacks(&self) -> usize {
        self.inner.lock().await.rollbacks
    }

    /// Lets `n` trip status updates through, then fails every later one.
    pub async fn fail_trip_updates_after(&self, n: usize) {
        self.inner.lock().await.trip_updates_left = Some(n);
    }

    pub async fn fail_payment_lookup(&self) {
        self.inner.lock().await.fail_lookup = true;
    }

    /// Fails the booking confirmation after the payment write has been applied.
    pub async fn fail_booking_update(&self) {
        self.inner.lock().await.fail_booking_update = true;
    }
}

#[async_trait]
impl RideStore for MemoryStore {
    async fn reconcile_payment(
        &self,
        cb: &ValidatedCallback,
        now: DateTime<Utc>,
    ) -> Result<ReconcileOutcome, StoreError> {
        let mut inner = self.inner.lock().await;

        inner.payment_lookups += 1;
        if inner.fail_lookup {
            return Err(injected());
        }
        let existing = inner
            .payments
            .iter()
            .find(|p| p.mpesa_transaction_id.as_deref() == Some(cb.transaction_id.as_str()))
            .map(|p| ExistingPayment {
                id: p.id.clone(),
                status: p.status,
            });

        let step = plan(existing.as_ref());
        if step == ReconcilePlan::AlreadyCompleted {
            return Ok(ReconcileOutcome::AlreadyCompleted);
        }

        // Rollback point, standing in for the Postgres transaction.
        let payments_before = inner.payments.clone();
        let payment_writes_before = inner.payment_writes;

        let created = match step {
            ReconcilePlan::AlreadyCompleted => unreachable!("handled above"),
            ReconcilePlan::CompleteExisting { payment_id } => {
                if let Some(p) = inner.payments.iter_mut().find(|p| p.id == payment_id) {
                    p.status = PaymentStatus::Completed;
                    p.transaction_date = Some(now);
                }
                false
            }
            ReconcilePlan::InsertCompleted => {
                let row = NewPayment::from_callback(cb, now);
                inner.payments.push(PaymentRecord {
                    id: Uuid::new_v4().to_string(),
                    booking_id: Some(row.booking_id),
                    amount: row.amount,
                    payment_method: row.payment_method.to_string(),
                    status: row.status,
                    mpesa_transaction_id: Some(row.mpesa_transaction_id),
                    mpesa_phone_number: row.mpesa_phone_number,
                    transaction_date: Some(row.transaction_date),
                });
                true
            }
        };
        inner.payment_writes += 1;

        if inner.fail_booking_update {
            inner.payments = payments_before;
            inner.payment_writes = payment_writes_before;
            inner.rollbacks += 1;
            return Err(injected());
        }

        let confirmation = BookingConfirmation::at(now);
        let bookings_updated = match inner.bookings.get_mut(&cb.booking_id) {
            Some(b) => {
                b.status = confirmation.status.to_string();
                b.payment_completed_at = Some(confirmation.payment_completed_at);
                b.trip_status = Some(confirmation.trip_status.as_str().to_string());
                1
            }
            None => 0,
        };
        inner.booking_writes += bookings_updated as usize;

        Ok(ReconcileOutcome::Completed {
            created,
            bookings_updated,
        })
    }

    async fn set_trip_status(&self, booking_id: &str, stage: TripStage) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(left) = inner.trip_updates_left.as_mut() {
            if *left == 0 {
                return Err(injected());
            }
            *left -= 1;
        }
        inner.trip_history.push((booking_id.to_string(), stage));
        match inner.bookings.get_mut(booking_id) {
            Some(b) => {
                b.trip_status = Some(stage.as_str().to_string());
                Ok(1)
            }
            None => Ok(0),
        }
    }
}
