mod callback;
mod config;
mod db;
mod dispatch;
mod error;
mod gateway;
mod handlers;
mod models;
mod reconcile;
mod routes;
mod state;
mod store;
#[cfg(test)]
mod test_support;
mod trip;

use config::Config;
use state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use store::PgStore;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let pool = match db::connect(&cfg.db_url).await {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(error = %e, "db connect failed");
            std::process::exit(2);
        }
    };

    if cfg.db_ensure_schema {
        if let Err(e) = db::ensure_schema(&pool, &cfg.db_schema).await {
            tracing::error!(error = %e, "db ensure_schema failed");
            std::process::exit(2);
        }
    }

    let http = match reqwest::Client::builder()
        .timeout(Duration::from_secs(cfg.http_timeout_secs))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "http client init failed");
            std::process::exit(2);
        }
    };

    if cfg.mpesa.credentials().is_none() {
        tracing::warn!("M-Pesa credentials incomplete; stk push requests will fail");
    }

    let state = AppState {
        env_name: cfg.env_name.clone(),
        store: Arc::new(PgStore::new(pool, &cfg.db_schema)),
        http,
        mpesa: Arc::new(cfg.mpesa.clone()),
        simulate_trip_url: cfg.simulate_trip_url.clone(),
    };
    if !state.trip_trigger_enabled() {
        tracing::info!("SIMULATE_TRIP_URL not set; paid bookings will not start a trip simulation");
    }

    let app = routes::create_routes(state, cfg.max_body_bytes);

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], cfg.port)));
    tracing::info!(%addr, env = %cfg.env_name, "starting urbango_mpesa_service");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(error = %e, %addr, "bind failed");
            std::process::exit(2);
        }
    };
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
