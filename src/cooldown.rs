//! Cooldown gate in front of alert dispatch.
//!
//! Holds the time of the last successful dispatch. A dispatch lock is held
//! for the whole check-dispatch-update sequence, so concurrent callers inside
//! one cooldown window produce a single send. The timestamp itself lives in a
//! `watch` channel and can be read while a dispatch is in flight. A failed
//! dispatch leaves it untouched.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tracing::debug;

use crate::alert::{AlertEvent, DeliveryRecord};
use crate::dispatch::Dispatcher;

// ---

/// Result of a gated dispatch attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateDecision {
    // ---
    pub dispatched: bool,
    /// Cooldown left; zero once dispatched or when the gate was open.
    pub remaining: Duration,
    /// Present when the dispatcher was invoked.
    pub record: Option<DeliveryRecord>,
}

pub struct CooldownGate {
    cooldown: Duration,
    dispatch_lock: Mutex<()>,
    last_sent_at: watch::Sender<Option<DateTime<Utc>>>,
}

impl CooldownGate {
    // ---
    /// New gate that has never sent.
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            dispatch_lock: Mutex::new(()),
            last_sent_at: watch::Sender::new(None),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Never waits on an in-flight dispatch.
    pub fn last_sent_at(&self) -> Option<DateTime<Utc>> {
        *self.last_sent_at.borrow()
    }

    /// Cooldown left at `now`.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Duration {
        self.remaining_since(self.last_sent_at(), now)
    }

    pub async fn try_dispatch(&self, event: &AlertEvent, dispatcher: &Dispatcher) -> GateDecision {
        self.try_dispatch_at(event, dispatcher, Utc::now()).await
    }

    pub async fn try_dispatch_at(
        &self,
        event: &AlertEvent,
        dispatcher: &Dispatcher,
        now: DateTime<Utc>,
    ) -> GateDecision {
        // ---
        let _guard = self.dispatch_lock.lock().await;

        let remaining = self.remaining_since(self.last_sent_at(), now);
        if !remaining.is_zero() {
            debug!(
                alert_id = %event.id,
                remaining_secs = remaining.as_secs(),
                "Alert suppressed by cooldown"
            );
            return GateDecision {
                dispatched: false,
                remaining,
                record: None,
            };
        }

        let record = dispatcher.deliver(event).await;
        let dispatched = record.is_sent();
        if dispatched {
            self.last_sent_at.send_replace(Some(now));
        }

        GateDecision {
            dispatched,
            remaining: Duration::ZERO,
            record: Some(record),
        }
    }

    fn remaining_since(&self, last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Duration {
        // ---
        let Some(last) = last else {
            return Duration::ZERO;
        };
        // A clock that went backwards counts as zero elapsed.
        let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
        self.cooldown.saturating_sub(elapsed)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use std::sync::Arc;

    use super::*;
    use crate::alert::DispatchState;
    use crate::dispatch::testing::{instant_policy, ScriptedNotifier};
    use crate::dispatch::{MessageId, Notifier};
    use crate::error::Result;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use tokio::sync::Notify;
    use uuid::Uuid;

    /// Blocks every send until released.
    #[derive(Default)]
    struct HeldNotifier {
        release: Notify,
    }

    #[async_trait]
    impl Notifier for HeldNotifier {
        fn kind(&self) -> &'static str {
            "held"
        }

        async fn send(&self, _event: &AlertEvent) -> Result<MessageId> {
            self.release.notified().await;
            Ok("held-1".into())
        }
    }

    fn t(min: u32, sec: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 8, min, sec).unwrap()
    }

    fn event() -> AlertEvent {
        AlertEvent {
            id: Uuid::new_v4(),
            node_id: "node-01".into(),
            trigger_reading_id: 9,
            trigger_timestamp: t(0, 0),
            window_start: t(0, 0),
            reading_count: 9,
            avg_temperature: 28.0,
            avg_humidity: 70.0,
            avg_co2: 100.0,
            avg_acoustic: 0.0,
            created_at: t(0, 0),
            state: DispatchState::Pending,
        }
    }

    fn setup(failures: u32) -> (Arc<ScriptedNotifier>, Dispatcher, CooldownGate) {
        let notifier = Arc::new(ScriptedNotifier::new(failures));
        let dispatcher = Dispatcher::new(notifier.clone(), instant_policy());
        let gate = CooldownGate::new(Duration::from_secs(600));
        (notifier, dispatcher, gate)
    }

    #[tokio::test]
    async fn test_two_attempts_within_cooldown_send_once() {
        // ---
        let (notifier, dispatcher, gate) = setup(0);

        let first = gate.try_dispatch_at(&event(), &dispatcher, t(0, 0)).await;
        let second = gate.try_dispatch_at(&event(), &dispatcher, t(4, 0)).await;

        assert!(first.dispatched);
        assert_eq!(first.remaining, Duration::ZERO);
        assert!(!second.dispatched);
        assert_eq!(second.remaining, Duration::from_secs(360));
        assert!(second.record.is_none());
        assert_eq!(notifier.calls(), 1);
        assert_eq!(gate.last_sent_at(), Some(t(0, 0)));
    }

    #[tokio::test]
    async fn test_gate_reopens_after_cooldown() {
        // ---
        let (notifier, dispatcher, gate) = setup(0);

        assert!(gate.try_dispatch_at(&event(), &dispatcher, t(0, 0)).await.dispatched);
        assert_eq!(gate.remaining_at(t(9, 59)), Duration::from_secs(1));
        assert!(gate.try_dispatch_at(&event(), &dispatcher, t(10, 0)).await.dispatched);
        assert_eq!(notifier.calls(), 2);
        assert_eq!(gate.last_sent_at(), Some(t(10, 0)));
    }

    #[tokio::test]
    async fn test_failed_dispatch_does_not_consume_cooldown() {
        // ---
        // Three failures exhaust the first delivery; the next one succeeds
        let (notifier, dispatcher, gate) = setup(3);

        let failed = gate.try_dispatch_at(&event(), &dispatcher, t(0, 0)).await;
        assert!(!failed.dispatched);
        assert_eq!(failed.remaining, Duration::ZERO);
        assert_eq!(
            failed.record.as_ref().map(|r| r.final_state),
            Some(DispatchState::Error)
        );
        assert_eq!(gate.last_sent_at(), None);

        let retried = gate.try_dispatch_at(&event(), &dispatcher, t(0, 30)).await;
        assert!(retried.dispatched);
        assert_eq!(notifier.calls(), 4);
    }

    #[tokio::test]
    async fn test_concurrent_callers_send_once() {
        // ---
        let (notifier, dispatcher, gate) = setup(0);
        let now = t(0, 0);
        let (a, b) = (event(), event());

        let (first, second) = tokio::join!(
            gate.try_dispatch_at(&a, &dispatcher, now),
            gate.try_dispatch_at(&b, &dispatcher, now),
        );

        assert_eq!([first.dispatched, second.dispatched].iter().filter(|d| **d).count(), 1);
        assert_eq!(notifier.calls(), 1);
    }

    #[tokio::test]
    async fn test_never_sent_gate_is_open() {
        // ---
        let (_, _, gate) = setup(0);
        assert_eq!(gate.remaining_at(t(0, 0)), Duration::ZERO);
        assert_eq!(gate.cooldown(), Duration::from_secs(600));
    }

    #[tokio::test]
    async fn test_status_readable_during_dispatch() {
        // ---
        let notifier = Arc::new(HeldNotifier::default());
        let dispatcher = Dispatcher::new(notifier.clone(), instant_policy());
        let gate = CooldownGate::new(Duration::from_secs(600));
        let ev = event();

        let observe = async {
            // Let the dispatch take the lock and park inside `send`
            tokio::task::yield_now().await;
            let seen = (gate.last_sent_at(), gate.remaining_at(t(0, 0)));
            notifier.release.notify_one();
            seen
        };
        let (decision, seen) = tokio::join!(gate.try_dispatch_at(&ev, &dispatcher, t(0, 0)), observe);

        assert_eq!(seen, (None, Duration::ZERO));
        assert!(decision.dispatched);
        assert_eq!(gate.last_sent_at(), Some(t(0, 0)));
        assert_eq!(gate.remaining_at(t(1, 0)), Duration::from_secs(540));
    }
}
