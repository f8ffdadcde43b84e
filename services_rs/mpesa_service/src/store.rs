use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::callback::ValidatedCallback;
use crate::reconcile::ReconcileOutcome;
use crate::trip::TripStage;

#[cfg(test)]
mod memory;
mod postgres;

#[cfg(test)]
pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Persistence port for the `Payments` and `Bookings` tables.
#[async_trait]
pub trait RideStore: Send + Sync {
    /// Completes the payment for `cb.transaction_id` and confirms its booking.
    ///
    /// Implementations apply the whole change atomically: either the payment
    /// and the booking are both written, or neither is.
    async fn reconcile_payment(
        &self,
        cb: &ValidatedCallback,
        now: DateTime<Utc>,
    ) -> Result<ReconcileOutcome, StoreError>;

    /// Returns the number of bookings updated.
    async fn set_trip_status(&self, booking_id: &str, stage: TripStage) -> Result<u64, StoreError>;
}
