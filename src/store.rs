//! Data access for nodes, readings and the alert history.
//!
//! The alerting core consumes readings through [`ReadingSource`] and writes
//! delivery outcomes through [`AlertLog`]. [`PgStore`] implements both over
//! PostgreSQL; the HTTP routes use its inherent methods for everything else.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::alert::{AlertEvent, DeliveryRecord, ALERT_KIND};
use crate::error::Result;
use crate::models::{NewReading, Node, Reading};

// ---

/// Upper bound on rows returned by list endpoints.
pub const MAX_LIST_LIMIT: i64 = 1000;

/// Read side consumed by the alert pipeline. No ordering is guaranteed.
#[async_trait]
pub trait ReadingSource: Send + Sync {
    async fn all_readings(&self) -> Result<Vec<Reading>>;

    async fn latest_reading(&self) -> Result<Option<Reading>>;

    /// Readings at or after `since`.
    async fn readings_since(&self, since: DateTime<Utc>) -> Result<Vec<Reading>>;
}

/// Sink for alert delivery outcomes.
#[async_trait]
pub trait AlertLog: Send + Sync {
    async fn record(&self, event: &AlertEvent, delivery: &DeliveryRecord) -> Result<()>;

    /// Newest trigger timestamp of a sent alert, per node.
    async fn alerted_through(&self) -> Result<Vec<(String, DateTime<Utc>)>>;
}

/// One row of the alert history.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AlertRecord {
    // ---
    pub id: Uuid,
    pub node_id: String,
    pub kind: String,
    pub details: String,
    pub trigger_reading_id: i64,
    pub trigger_timestamp: DateTime<Utc>,
    pub avg_temperature: f64,
    pub avg_humidity: f64,
    pub avg_co2: f64,
    pub avg_acoustic: f64,
    pub state: String,
    pub attempt_count: i32,
    pub last_error: Option<String>,
    pub message_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sent_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

const READING_COLUMNS: &str = r#"
    r.id, r.node_id, r.timestamp, r.temperature, r.humidity, r.co2, r.acoustic,
    n.latitude, n.longitude
"#;

impl PgStore {
    // ---
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or update a node and mark it active.
    pub async fn upsert_node(&self, node: &Node) -> Result<()> {
        // ---
        sqlx::query(
            r#"
            INSERT INTO nodes (id, latitude, longitude, location, active)
            VALUES ($1, $2, $3, $4, TRUE)
            ON CONFLICT (id) DO UPDATE SET
                latitude  = EXCLUDED.latitude,
                longitude = EXCLUDED.longitude,
                location  = COALESCE(EXCLUDED.location, nodes.location),
                active    = TRUE
            "#,
        )
        .bind(&node.id)
        .bind(node.latitude)
        .bind(node.longitude)
        .bind(&node.location)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn node_exists(&self, node_id: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM nodes WHERE id = $1)")
            .bind(node_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    /// Insert a validated reading, returning its id.
    pub async fn insert_reading(&self, reading: &NewReading) -> Result<i64> {
        // ---
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO readings (node_id, timestamp, temperature, humidity, co2, acoustic)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&reading.node_id)
        .bind(reading.timestamp)
        .bind(reading.temperature)
        .bind(reading.humidity)
        .bind(reading.co2)
        .bind(reading.acoustic)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// Newest readings first, optionally for one node.
    pub async fn recent_readings(&self, node_id: Option<&str>, limit: i64) -> Result<Vec<Reading>> {
        // ---
        let query = format!(
            r#"
            SELECT {READING_COLUMNS}
            FROM readings r
            JOIN nodes n ON n.id = r.node_id
            WHERE ($1::TEXT IS NULL OR r.node_id = $1)
            ORDER BY r.timestamp DESC
            LIMIT $2
            "#
        );

        let rows = sqlx::query_as::<_, Reading>(&query)
            .bind(node_id)
            .bind(limit.clamp(1, MAX_LIST_LIMIT))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// Every reading of one node, or of all nodes.
    pub async fn readings_for(&self, node_id: Option<&str>) -> Result<Vec<Reading>> {
        // ---
        let query = format!(
            r#"
            SELECT {READING_COLUMNS}
            FROM readings r
            JOIN nodes n ON n.id = r.node_id
            WHERE ($1::TEXT IS NULL OR r.node_id = $1)
            "#
        );

        let rows = sqlx::query_as::<_, Reading>(&query)
            .bind(node_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// Alert history, newest first.
    pub async fn alert_history(&self, node_id: Option<&str>, limit: i64) -> Result<Vec<AlertRecord>> {
        // ---
        let rows = sqlx::query_as::<_, AlertRecord>(
            r#"
            SELECT id, node_id, kind, details, trigger_reading_id, trigger_timestamp,
                   avg_temperature, avg_humidity, avg_co2, avg_acoustic,
                   state, attempt_count, last_error, message_id, created_at, sent_at
            FROM alerts
            WHERE ($1::TEXT IS NULL OR node_id = $1)
            ORDER BY sent_at DESC
            LIMIT $2
            "#,
        )
        .bind(node_id)
        .bind(limit.clamp(1, MAX_LIST_LIMIT))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

#[async_trait]
impl ReadingSource for PgStore {
    async fn all_readings(&self) -> Result<Vec<Reading>> {
        self.readings_for(None).await
    }

    async fn latest_reading(&self) -> Result<Option<Reading>> {
        Ok(self.recent_readings(None, 1).await?.into_iter().next())
    }

    async fn readings_since(&self, since: DateTime<Utc>) -> Result<Vec<Reading>> {
        // ---
        let query = format!(
            r#"
            SELECT {READING_COLUMNS}
            FROM readings r
            JOIN nodes n ON n.id = r.node_id
            WHERE r.timestamp >= $1
            "#
        );

        let rows = sqlx::query_as::<_, Reading>(&query)
            .bind(since)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }
}

#[async_trait]
impl AlertLog for PgStore {
    async fn record(&self, event: &AlertEvent, delivery: &DeliveryRecord) -> Result<()> {
        // ---
        sqlx::query(
            r#"
            INSERT INTO alerts (
                id, node_id, kind, details, trigger_reading_id, trigger_timestamp,
                avg_temperature, avg_humidity, avg_co2, avg_acoustic,
                state, attempt_count, last_error, message_id, created_at, sent_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, NOW())
            "#,
        )
        .bind(event.id)
        .bind(&event.node_id)
        .bind(ALERT_KIND)
        .bind(event.details())
        .bind(event.trigger_reading_id)
        .bind(event.trigger_timestamp)
        .bind(event.avg_temperature)
        .bind(event.avg_humidity)
        .bind(event.avg_co2)
        .bind(event.avg_acoustic)
        .bind(delivery.final_state.as_str())
        .bind(delivery.attempt_count as i32)
        .bind(&delivery.last_error)
        .bind(&delivery.message_id)
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn alerted_through(&self) -> Result<Vec<(String, DateTime<Utc>)>> {
        // ---
        let rows = sqlx::query_as::<_, (String, DateTime<Utc>)>(
            r#"
            SELECT node_id, MAX(trigger_timestamp)
            FROM alerts
            WHERE state = 'sent'
            GROUP BY node_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
