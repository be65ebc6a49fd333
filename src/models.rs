//! Data models for sensor nodes and their readings.
//!
//! Submissions arrive as [`RawReading`] (every field optional, numbers may be
//! strings) and are validated into a typed [`NewReading`] before anything
//! else touches them. The alerting core only ever sees [`Reading`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, VematError};

// ---

/// A stored sensor reading. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reading {
    // ---
    pub id: i64,
    pub node_id: String,
    pub timestamp: DateTime<Utc>,
    /// Degrees Celsius.
    pub temperature: f64,
    /// Relative humidity, percent.
    pub humidity: f64,
    /// CO2 concentration, ppm.
    pub co2: f64,
    /// Acoustic level reported by the node's microphone.
    pub acoustic: f64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Reading submission as posted by a sensor node.
#[derive(Debug, Default, Deserialize)]
pub struct RawReading {
    // ---
    pub node_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub temperature: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub humidity: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub co2: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub acoustic: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// A validated reading ready to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReading {
    // ---
    pub node_id: String,
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub humidity: f64,
    pub co2: f64,
    pub acoustic: f64,
}

impl RawReading {
    // ---
    /// Validate a submission, stamping it with `now` when the node sent no
    /// timestamp of its own.
    pub fn validate(self, now: DateTime<Utc>) -> Result<NewReading> {
        // ---
        let node_id = self
            .node_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| VematError::invalid("missing node_id"))?;

        Ok(NewReading {
            node_id,
            timestamp: self.timestamp.unwrap_or(now),
            temperature: require_finite("temperature", self.temperature)?,
            humidity: require_finite("humidity", self.humidity)?,
            co2: require_finite("co2", self.co2)?,
            acoustic: require_finite("acoustic", self.acoustic)?,
        })
    }
}

fn require_finite(field: &str, value: Option<f64>) -> Result<f64> {
    match value {
        Some(v) if v.is_finite() => Ok(v),
        Some(v) => Err(VematError::invalid(format!("{} is not finite: {}", field, v))),
        None => Err(VematError::invalid(format!("missing {}", field))),
    }
}

/// Accept a JSON number, a numeric string, or null.
fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    // ---
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrText {
        Num(f64),
        Text(String),
    }

    match Option::<NumOrText>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumOrText::Num(v)) => Ok(Some(v)),
        Some(NumOrText::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("not a number: '{}'", s))),
    }
}

/// A registered sensor node.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Node {
    // ---
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub location: Option<String>,
    pub active: bool,
}

/// Node registration payload.
#[derive(Debug, Deserialize)]
pub struct RawNode {
    // ---
    pub node_id: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location: Option<String>,
}

impl RawNode {
    // ---
    pub fn validate(self) -> Result<Node> {
        // ---
        let (Some(id), Some(latitude), Some(longitude)) =
            (self.node_id, self.latitude, self.longitude)
        else {
            return Err(VematError::invalid(
                "missing required fields: node_id, latitude, longitude",
            ));
        };

        if id.trim().is_empty() {
            return Err(VematError::invalid("node_id must not be empty"));
        }
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(VematError::invalid(format!(
                "coordinates out of range: ({}, {})",
                latitude, longitude
            )));
        }

        Ok(Node {
            id: id.trim().to_string(),
            latitude,
            longitude,
            location: self.location,
            active: true,
        })
    }
}
