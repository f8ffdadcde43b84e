use std::sync::Arc;
use std::time::Duration;

use crate::store::{RideStore, StoreError};

/// Dispatch stages a booking walks through after payment, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TripStage {
    DriverAssigned,
    DriverArriving,
    TripStarted,
    InProgress,
    Completed,
}

impl TripStage {
    pub const SEQUENCE: [TripStage; 5] = [
        TripStage::DriverAssigned,
        TripStage::DriverArriving,
        TripStage::TripStarted,
        TripStage::InProgress,
        TripStage::Completed,
    ];

    pub fn first() -> Self {
        Self::SEQUENCE[0]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TripStage::DriverAssigned => "driver_assigned",
            TripStage::DriverArriving => "driver_arriving",
            TripStage::TripStarted => "trip_started",
            TripStage::InProgress => "in_progress",
            TripStage::Completed => "completed",
        }
    }

    /// Pause after this stage is written, before the next one.
    pub fn hold(self) -> Duration {
        match self {
            TripStage::DriverAssigned => Duration::from_secs(30),
            TripStage::DriverArriving => Duration::from_secs(60),
            TripStage::TripStarted => Duration::from_secs(90),
            TripStage::InProgress => Duration::from_secs(180),
            TripStage::Completed => Duration::ZERO,
        }
    }
}

/// Writes every stage to the booking in order, sleeping between writes.
///
/// The first failed write ends the run; stages already written stay written.
pub async fn run_simulation(store: Arc<dyn RideStore>, booking_id: String) -> Result<(), StoreError> {
    for stage in TripStage::SEQUENCE {
        let rows = store.set_trip_status(&booking_id, stage).await?;
        if rows == 0 {
            tracing::warn!(booking_id = %booking_id, stage = stage.as_str(), "trip stage matched no booking");
        } else {
            tracing::info!(booking_id = %booking_id, stage = stage.as_str(), "trip stage applied");
        }

        let hold = stage.hold();
        if !hold.is_zero() {
            tokio::time::sleep(hold).await;
        }
    }
    Ok(())
}
