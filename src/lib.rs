//! VEMAT: environmental surveillance backend for mosquito vectors.
//!
//! Sensor nodes post temperature, humidity, CO2 and acoustic readings. The
//! service stores them, summarizes them per epidemiological week, and raises
//! an alert when nine consecutive readings of a node show conditions
//! favorable to mosquito proliferation.
//!
//! Module boundaries follow EMBP: the pure core (`epi_week`, `aggregate`,
//! `scanner`, `alert`) has no I/O; `dispatch`, `cooldown` and `pipeline`
//! orchestrate side effects; `store`, `schema` and `routes` are the edges.

pub mod aggregate;
pub mod alert;
pub mod config;
pub mod cooldown;
pub mod dispatch;
pub mod epi_week;
pub mod error;
pub mod models;
pub mod notifier;
pub mod pipeline;
pub mod routes;
pub mod scanner;
pub mod schema;
pub mod store;

pub use config::Config;
pub use error::VematError;

// Re-exported for routes/*.rs and the binary.
pub use aggregate::{aggregate_by_epi_week, WeekSummary};
pub use models::{Node, RawNode, RawReading, Reading};
pub use pipeline::AlertPipeline;
pub use store::PgStore;
