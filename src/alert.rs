//! Alert events built from qualifying windows, and their delivery records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::VematError;
use crate::scanner::{AlertWindow, Field};

// ---

/// Kind tag stored with every favorable-condition alert.
pub const ALERT_KIND: &str = "favorable_conditions";

/// Delivery state of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    Pending,
    Sent,
    Error,
}

impl DispatchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchState::Pending => "pending",
            DispatchState::Sent => "sent",
            DispatchState::Error => "error",
        }
    }
}

/// A detected sustained favorable condition for one node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvent {
    // ---
    pub id: Uuid,
    pub node_id: String,
    /// Most recent reading of the window.
    pub trigger_reading_id: i64,
    pub trigger_timestamp: DateTime<Utc>,
    pub window_start: DateTime<Utc>,
    pub reading_count: usize,
    pub avg_temperature: f64,
    pub avg_humidity: f64,
    pub avg_co2: f64,
    pub avg_acoustic: f64,
    pub created_at: DateTime<Utc>,
    pub state: DispatchState,
}

impl AlertEvent {
    // ---
    pub fn from_window(window: &AlertWindow<'_>, created_at: DateTime<Utc>) -> Self {
        // ---
        let trigger = window.last();
        let first = &window.readings[0];

        Self {
            id: Uuid::new_v4(),
            node_id: trigger.node_id.clone(),
            trigger_reading_id: trigger.id,
            trigger_timestamp: trigger.timestamp,
            window_start: first.timestamp,
            reading_count: window.readings.len(),
            avg_temperature: window.average(Field::Temperature),
            avg_humidity: window.average(Field::Humidity),
            avg_co2: window.average(Field::Co2),
            avg_acoustic: window.average(Field::Acoustic),
            created_at,
            state: DispatchState::Pending,
        }
    }

    /// One-line summary used as notification body and history detail.
    pub fn details(&self) -> String {
        format!(
            "Temp: {:.1}°C, Hum: {:.1}%, CO2: {:.1}ppm over {} readings",
            self.avg_temperature, self.avg_humidity, self.avg_co2, self.reading_count
        )
    }
}

/// Outcome of delivering one alert, retries included.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryRecord {
    // ---
    pub attempt_count: u32,
    pub last_error: Option<String>,
    pub final_state: DispatchState,
    pub message_id: Option<String>,
}

impl DeliveryRecord {
    pub fn is_sent(&self) -> bool {
        self.final_state == DispatchState::Sent
    }

    /// `DispatchExhausted` when every attempt failed.
    pub fn exhausted_error(&self) -> Option<VematError> {
        (self.final_state == DispatchState::Error).then(|| VematError::DispatchExhausted {
            attempts: self.attempt_count,
            last_error: self.last_error.clone().unwrap_or_default(),
        })
    }
}
