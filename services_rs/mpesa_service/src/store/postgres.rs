use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use super::{RideStore, StoreError};
use crate::callback::ValidatedCallback;
use crate::db::table_name;
use crate::models::PaymentStatus;
use crate::reconcile::{
    plan, BookingConfirmation, ExistingPayment, NewPayment, ReconcileOutcome, ReconcilePlan,
};
use crate::trip::TripStage;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    payments: String,
    bookings: String,
}

impl PgStore {
    pub fn new(pool: PgPool, db_schema: &Option<String>) -> Self {
        Self {
            pool,
            payments: table_name(db_schema, "Payments"),
            bookings: table_name(db_schema, "Bookings"),
        }
    }
}

// Ids are TEXT primary keys; predicates compare the column uncast.

fn find_payment_sql(payments: &str) -> String {
    format!(
        "SELECT id, payment_status FROM {payments} \
         WHERE mpesa_transaction_id=$1 LIMIT 1 FOR UPDATE"
    )
}

fn complete_payment_sql(payments: &str) -> String {
    format!("UPDATE {payments} SET payment_status=$1, transaction_date=$2 WHERE id=$3")
}

fn insert_payment_sql(payments: &str) -> String {
    format!(
        "INSERT INTO {payments} \
         (booking_id,amount,payment_method,payment_status,mpesa_transaction_id,mpesa_phone_number,transaction_date) \
         VALUES ($1,$2,$3,$4,$5,$6,$7)"
    )
}

fn confirm_booking_sql(bookings: &str) -> String {
    format!("UPDATE {bookings} SET status=$1, payment_completed_at=$2, trip_status=$3 WHERE id=$4")
}

fn trip_status_sql(bookings: &str) -> String {
    format!("UPDATE {bookings} SET trip_status=$1 WHERE id=$2")
}

#[async_trait]
impl RideStore for PgStore {
    async fn reconcile_payment(
        &self,
        cb: &ValidatedCallback,
        now: DateTime<Utc>,
    ) -> Result<ReconcileOutcome, StoreError> {
        let payments = &self.payments;
        let bookings = &self.bookings;

        let mut tx = self.pool.begin().await?;

        // Row lock serializes redeliveries of the same notification.
        let existing = sqlx::query(&find_payment_sql(payments))
            .bind(&cb.transaction_id)
            .fetch_optional(&mut *tx)
            .await?
            .map(|row| -> Result<ExistingPayment, sqlx::Error> {
                let status: Option<String> = row.try_get("payment_status")?;
                Ok(ExistingPayment {
                    id: row.try_get("id")?,
                    status: PaymentStatus::from_db(status.as_deref().unwrap_or_default()),
                })
            })
            .transpose()?;

        let created = match plan(existing.as_ref()) {
            ReconcilePlan::AlreadyCompleted => {
                tx.rollback().await?;
                return Ok(ReconcileOutcome::AlreadyCompleted);
            }
            ReconcilePlan::CompleteExisting { payment_id } => {
                sqlx::query(&complete_payment_sql(payments))
                    .bind(PaymentStatus::Completed.as_str())
                    .bind(now)
                    .bind(&payment_id)
                    .execute(&mut *tx)
                    .await?;
                false
            }
            ReconcilePlan::InsertCompleted => {
                let row = NewPayment::from_callback(cb, now);
                sqlx::query(&insert_payment_sql(payments))
                    .bind(&row.booking_id)
                    .bind(row.amount)
                    .bind(row.payment_method)
                    .bind(row.status.as_str())
                    .bind(&row.mpesa_transaction_id)
                    .bind(&row.mpesa_phone_number)
                    .bind(row.transaction_date)
                    .execute(&mut *tx)
                    .await?;
                true
            }
        };

        let confirmation = BookingConfirmation::at(now);
        let booking = sqlx::query(&confirm_booking_sql(bookings))
            .bind(confirmation.status)
            .bind(confirmation.payment_completed_at)
            .bind(confirmation.trip_status.as_str())
            .bind(&cb.booking_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(ReconcileOutcome::Completed {
            created,
            bookings_updated: booking.rows_affected(),
        })
    }

    async fn set_trip_status(&self, booking_id: &str, stage: TripStage) -> Result<u64, StoreError> {
        let res = sqlx::query(&trip_status_sql(&self.bookings))
            .bind(stage.as_str())
            .bind(booking_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }
}
