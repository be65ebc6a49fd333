//! Database schema management for the VEMAT backend.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs` (EMBP: single gateway call).

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the `nodes` registry, the `readings` table and the `alerts`
/// history. Safe to call on every startup; no-op if objects already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    // Sensor nodes, registered before they may submit readings
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS nodes (
            id        TEXT             PRIMARY KEY,
            latitude  DOUBLE PRECISION NOT NULL,
            longitude DOUBLE PRECISION NOT NULL,
            location  TEXT,
            active    BOOLEAN          NOT NULL DEFAULT TRUE
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS readings (
            id          BIGSERIAL        PRIMARY KEY,
            node_id     TEXT             NOT NULL REFERENCES nodes (id),
            timestamp   TIMESTAMPTZ      NOT NULL,
            temperature DOUBLE PRECISION NOT NULL,
            humidity    DOUBLE PRECISION NOT NULL,
            co2         DOUBLE PRECISION NOT NULL,
            acoustic    DOUBLE PRECISION NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Delivery history, one row per alert that reached the notifier
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS alerts (
            id                 UUID             PRIMARY KEY,
            node_id            TEXT             NOT NULL,
            kind               TEXT             NOT NULL,
            details            TEXT             NOT NULL,
            trigger_reading_id BIGINT           NOT NULL,
            trigger_timestamp  TIMESTAMPTZ      NOT NULL,
            avg_temperature    DOUBLE PRECISION NOT NULL,
            avg_humidity       DOUBLE PRECISION NOT NULL,
            avg_co2            DOUBLE PRECISION NOT NULL,
            avg_acoustic       DOUBLE PRECISION NOT NULL,
            state              TEXT             NOT NULL,
            attempt_count      INTEGER          NOT NULL,
            last_error         TEXT,
            message_id         TEXT,
            created_at         TIMESTAMPTZ      NOT NULL,
            sent_at            TIMESTAMPTZ      NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    for index in [
        "CREATE INDEX IF NOT EXISTS idx_readings_node_id ON readings (node_id);",
        "CREATE INDEX IF NOT EXISTS idx_readings_timestamp ON readings (timestamp);",
        "CREATE INDEX IF NOT EXISTS idx_alerts_sent_at ON alerts (sent_at);",
        "CREATE INDEX IF NOT EXISTS idx_alerts_node_state ON alerts (node_id, state);",
    ] {
        sqlx::query(index).execute(&mut *tx).await?;
    }

    tx.commit().await?;
    Ok(())
}
