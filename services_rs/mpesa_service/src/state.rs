use reqwest::Client;
use std::sync::Arc;

use crate::config::MpesaConfig;
use crate::store::RideStore;

#[derive(Clone)]
pub struct AppState {
    pub env_name: String,
    pub store: Arc<dyn RideStore>,
    pub http: Client,
    pub mpesa: Arc<MpesaConfig>,
    pub simulate_trip_url: Option<String>,
}

impl AppState {
    pub fn trip_trigger_enabled(&self) -> bool {
        self.simulate_trip_url.as_deref().unwrap_or("").trim() != ""
    }
}
