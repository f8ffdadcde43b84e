use sqlx::postgres::{PgPool, PgPoolOptions};

/// Quoted table reference; the app's tables use capitalized names.
pub fn table_name(schema: &Option<String>, name: &str) -> String {
    match schema {
        Some(s) => format!("{s}.\"{name}\""),
        None => format!("\"{name}\""),
    }
}

pub async fn connect(db_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(db_url)
        .await
}

/// Creates the tables for local development. Hosted deployments own their
/// schema and leave `DB_ENSURE_SCHEMA` off.
pub async fn ensure_schema(pool: &PgPool, db_schema: &Option<String>) -> Result<(), sqlx::Error> {
    if let Some(schema) = db_schema {
        let ddl = format!("CREATE SCHEMA IF NOT EXISTS {schema}");
        sqlx::query(&ddl).execute(pool).await?;
    }

    let payments = table_name(db_schema, "Payments");
    let bookings = table_name(db_schema, "Bookings");

    let ddls = [
        format!(
            "CREATE TABLE IF NOT EXISTS {bookings} (\
             id TEXT PRIMARY KEY DEFAULT gen_random_uuid()::text,\
             status VARCHAR(32) NOT NULL DEFAULT 'Pending',\
             trip_status VARCHAR(32),\
             payment_completed_at TIMESTAMPTZ\
             )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {payments} (\
             id TEXT PRIMARY KEY DEFAULT gen_random_uuid()::text,\
             booking_id TEXT,\
             amount NUMERIC(12,2) NOT NULL DEFAULT 0,\
             payment_method VARCHAR(32) NOT NULL,\
             payment_status VARCHAR(16) NOT NULL DEFAULT 'Pending',\
             mpesa_transaction_id VARCHAR(64),\
             mpesa_phone_number VARCHAR(32),\
             transaction_date TIMESTAMPTZ\
             )"
        ),
        format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_payments_mpesa_txn ON {payments}(mpesa_transaction_id)"
        ),
        format!("CREATE INDEX IF NOT EXISTS idx_payments_booking ON {payments}(booking_id)"),
    ];

    for ddl in ddls {
        if let Err(e) = sqlx::query(&ddl).execute(pool).await {
            tracing::warn!(error = %e, ddl = %ddl, "schema statement failed");
        }
    }

    Ok(())
}
