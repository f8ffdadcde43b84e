use reqwest::Client;
use serde_json::json;
use tokio::task::JoinHandle;

/// Fires `POST {bookingId}` at the trip simulation endpoint on a detached task.
///
/// The caller never awaits the result; failures only show up in the logs.
pub fn spawn_trip_trigger(http: Client, url: String, booking_id: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        let res = http
            .post(&url)
            .json(&json!({ "bookingId": booking_id }))
            .send()
            .await;
        match res {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!(booking_id = %booking_id, "trip simulation finished");
            }
            Ok(resp) => {
                tracing::warn!(booking_id = %booking_id, status = %resp.status(), "trip simulation trigger rejected");
            }
            // The simulation runs for minutes and outlives the client timeout.
            Err(e) if e.is_timeout() => {
                tracing::debug!(booking_id = %booking_id, "trip simulation still running after trigger timeout");
            }
            Err(e) => {
                tracing::warn!(booking_id = %booking_id, error = %e, "trip simulation trigger failed");
            }
        }
    })
}
