//! One alerting cycle: fetch → sort → scan → gate → dispatch → record.
//!
//! Readings are partitioned by node before scanning so a window never mixes
//! nodes. Each node keeps a high-water mark, the trigger timestamp of its last
//! sent alert, seeded from the alert log on the first cycle. Windows at or
//! below the mark are never sent again. Of the remaining windows of a node
//! only the newest is offered to the gate, and nodes are offered oldest
//! trigger first so a busy node cannot starve the others.
//!
//! Every event that reached the notifier is written to the alert log,
//! whether it was sent or not; events held back by the cooldown are counted
//! and retried on a later cycle.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::alert::AlertEvent;
use crate::cooldown::CooldownGate;
use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::models::Reading;
use crate::scanner::{scan_for_alerts, RangePredicate};
use crate::store::{AlertLog, ReadingSource};

// ---

/// Summary of one alert cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    // ---
    pub readings_scanned: usize,
    pub nodes_scanned: usize,
    pub windows_found: usize,
    /// Windows at or before the node's last sent alert.
    pub already_alerted: usize,
    /// Unsent windows replaced by a newer window of the same node.
    pub superseded: usize,
    pub dispatched: usize,
    pub suppressed: usize,
    pub failed: usize,
    pub events: Vec<AlertEvent>,
}

/// Trigger timestamp of the last sent alert, per node.
type HighWaterMarks = HashMap<String, DateTime<Utc>>;

pub struct AlertPipeline {
    source: Arc<dyn ReadingSource>,
    log: Arc<dyn AlertLog>,
    dispatcher: Dispatcher,
    gate: CooldownGate,
    criteria: Vec<RangePredicate>,
    lookback: Option<Duration>,
    /// `None` until seeded from the alert log. Held for a whole cycle.
    marks: Mutex<Option<HighWaterMarks>>,
}

impl AlertPipeline {
    // ---
    pub fn new(
        source: Arc<dyn ReadingSource>,
        log: Arc<dyn AlertLog>,
        dispatcher: Dispatcher,
        gate: CooldownGate,
        criteria: Vec<RangePredicate>,
    ) -> Self {
        Self {
            source,
            log,
            dispatcher,
            gate,
            criteria,
            lookback: None,
            marks: Mutex::new(None),
        }
    }

    /// Only scan readings newer than `now - lookback`.
    pub fn with_lookback(mut self, lookback: Duration) -> Self {
        self.lookback = Some(lookback);
        self
    }

    pub fn criteria(&self) -> &[RangePredicate] {
        &self.criteria
    }

    pub fn gate(&self) -> &CooldownGate {
        &self.gate
    }

    pub fn notifier_kind(&self) -> &'static str {
        self.dispatcher.notifier_kind()
    }

    pub async fn run_cycle(&self) -> Result<CycleReport> {
        self.run_cycle_at(Utc::now()).await
    }

    pub async fn run_cycle_at(&self, now: DateTime<Utc>) -> Result<CycleReport> {
        // ---
        let mut marks = self.marks.lock().await;
        if marks.is_none() {
            let seeded: HighWaterMarks = self.log.alerted_through().await?.into_iter().collect();
            debug!(nodes = seeded.len(), "Seeded alert high-water marks");
            *marks = Some(seeded);
        }
        let marks = marks.get_or_insert_with(HashMap::new);

        // A horizon before the representable range means "everything"
        let since = self
            .lookback
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .and_then(|d| now.checked_sub_signed(d));

        let readings = match since {
            Some(since) => self.source.readings_since(since).await?,
            None => self.source.all_readings().await?,
        };
        let by_node = partition_by_node(readings);

        let mut report = CycleReport {
            readings_scanned: by_node.values().map(Vec::len).sum(),
            nodes_scanned: by_node.len(),
            ..CycleReport::default()
        };

        let mut candidates = Vec::new();
        for (node_id, readings) in &by_node {
            let windows = scan_for_alerts(readings, &self.criteria);
            report.windows_found += windows.len();

            let mark = marks.get(node_id).copied();
            let fresh: Vec<_> = windows
                .iter()
                .filter(|w| mark.map_or(true, |m| w.last().timestamp > m))
                .collect();
            report.already_alerted += windows.len() - fresh.len();

            let Some(newest) = fresh.last() else {
                continue;
            };
            report.superseded += fresh.len() - 1;
            info!(node_id = %node_id, windows = fresh.len(), "Favorable-condition windows found");
            candidates.push(AlertEvent::from_window(newest, now));
        }
        candidates.sort_by_key(|e| e.trigger_timestamp);

        for mut event in candidates {
            let decision = self.gate.try_dispatch_at(&event, &self.dispatcher, now).await;

            let Some(record) = decision.record else {
                report.suppressed += 1;
                report.events.push(event);
                continue;
            };

            event.state = record.final_state;
            match record.exhausted_error() {
                Some(e) => {
                    error!(alert_id = %event.id, node_id = %event.node_id, "{}", e);
                    report.failed += 1;
                }
                None => {
                    marks.insert(event.node_id.clone(), event.trigger_timestamp);
                    report.dispatched += 1;
                }
            }

            if let Err(e) = self.log.record(&event, &record).await {
                warn!(alert_id = %event.id, "Failed to record alert: {}", e);
            }
            report.events.push(event);
        }

        info!(
            readings = report.readings_scanned,
            nodes = report.nodes_scanned,
            windows = report.windows_found,
            already_alerted = report.already_alerted,
            superseded = report.superseded,
            dispatched = report.dispatched,
            suppressed = report.suppressed,
            failed = report.failed,
            "Alert cycle complete"
        );

        Ok(report)
    }

    /// Run a cycle every `period` until the task is dropped.
    pub async fn run_every(self: Arc<Self>, period: Duration) {
        // ---
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if let Err(e) = self.run_cycle().await {
                error!("Scheduled alert cycle failed: {}", e);
            }
        }
    }
}

/// Group readings by node, each group sorted by timestamp ascending.
pub fn partition_by_node(readings: Vec<Reading>) -> BTreeMap<String, Vec<Reading>> {
    // ---
    let mut by_node: BTreeMap<String, Vec<Reading>> = BTreeMap::new();
    for reading in readings {
        by_node.entry(reading.node_id.clone()).or_default().push(reading);
    }
    for group in by_node.values_mut() {
        group.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
    }
    by_node
}
