//! Sync watcher: poll-and-diff listener for upstream operator edits.
//!
//! Runs independently of the control cycle. Each poll fetches the remote
//! snapshot, computes a structural diff against the last-seen one, publishes
//! the corresponding change events and swaps the shared inputs. It never
//! mutates engine state directly; the control loop and schedule service
//! consume the flags on their own schedule, which keeps the two free of
//! races by construction.

use std::sync::Arc;

use tokio::sync::RwLock;

use calor_domain::error::{Phase, Severity};
use calor_domain::event::{Event, EventKind};
use calor_domain::id::RoomId;

use crate::ports::{EventPublisher, RemoteSnapshot, RemoteSync};
use crate::services::reporter::ErrorSink;

/// Structural diff between two snapshots, as change events.
#[must_use]
pub fn diff(old: &RemoteSnapshot, new: &RemoteSnapshot) -> Vec<Event> {
    let mut events = Vec::new();

    if old.tunables != new.tunables || old.switches != new.switches {
        events.push(Event::new(EventKind::ConfigChanged));
    }
    if old.overrides != new.overrides {
        events.push(Event::new(EventKind::OverridesChanged));
    }

    let mut rooms: Vec<RoomId> = Vec::new();
    for grid in [&old.weekly_cycle, &new.weekly_cycle] {
        for room in grid.rooms() {
            if !rooms.contains(&room) {
                rooms.push(room);
            }
        }
    }
    for room in rooms {
        if old.weekly_cycle.room_week(room) != new.weekly_cycle.room_week(room) {
            events.push(Event::for_room(EventKind::WeeklyCycleChanged, room));
        }
    }

    events
}

/// Background poll loop against the remote store.
pub struct SyncWatcher<R, P> {
    remote: R,
    publisher: P,
    sink: ErrorSink,
    inputs: Arc<RwLock<RemoteSnapshot>>,
    last_seen: RemoteSnapshot,
}

impl<R: RemoteSync, P: EventPublisher> SyncWatcher<R, P> {
    /// Create a watcher starting from `initial` as the last-seen snapshot.
    pub fn new(remote: R, publisher: P, sink: ErrorSink, initial: RemoteSnapshot) -> Self {
        Self {
            remote,
            publisher,
            sink,
            inputs: Arc::new(RwLock::new(initial.clone())),
            last_seen: initial,
        }
    }

    /// Handle to the shared inputs the control loop reads.
    #[must_use]
    pub fn inputs(&self) -> Arc<RwLock<RemoteSnapshot>> {
        Arc::clone(&self.inputs)
    }

    /// One poll: fetch, diff, publish, swap.
    ///
    /// A fetch failure keeps the last-good snapshot in place and reports at
    /// moderate severity; repeated operator edits are picked up on the next
    /// successful poll.
    pub async fn poll_once(&mut self) {
        let snapshot = match self.remote.fetch_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                self.sink
                    .report(Phase::Sync, Severity::Moderate, err.to_string());
                return;
            }
        };

        let events = diff(&self.last_seen, &snapshot);
        if events.is_empty() {
            return;
        }

        for event in events {
            tracing::debug!(kind = %event.kind, "upstream change detected");
            let _ = self.publisher.publish(event).await;
        }
        *self.inputs.write().await = snapshot.clone();
        self.last_seen = snapshot;
    }

    /// Poll forever at `interval`.
    pub async fn run(mut self, interval: std::time::Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.poll_once().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calor_domain::error::{CalorError, StorageError};
    use calor_domain::schedule::{Override, OverrideScope, ScheduleGrid};
    use calor_domain::state::{ControlDecision, SystemState};
    use calor_domain::switch::SwitchMode;
    use calor_domain::time::now;
    use std::future::Future;
    use std::sync::Mutex;

    use crate::event_bus::InProcessEventBus;
    use crate::ports::ErrorFlag;

    struct ScriptedRemote {
        snapshots: Mutex<Vec<Result<RemoteSnapshot, CalorError>>>,
    }

    impl ScriptedRemote {
        fn with(snapshots: Vec<Result<RemoteSnapshot, CalorError>>) -> Self {
            Self {
                snapshots: Mutex::new(snapshots),
            }
        }
    }

    impl RemoteSync for ScriptedRemote {
        fn fetch_snapshot(
            &self,
        ) -> impl Future<Output = Result<RemoteSnapshot, CalorError>> + Send {
            let mut queue = self.snapshots.lock().unwrap();
            let next = if queue.is_empty() {
                Ok(RemoteSnapshot::default())
            } else {
                queue.remove(0)
            };
            async { next }
        }
        fn push_state(
            &self,
            _state: &SystemState,
        ) -> impl Future<Output = Result<(), CalorError>> + Send {
            async { Ok(()) }
        }
        fn push_decision(
            &self,
            _decision: &ControlDecision,
        ) -> impl Future<Output = Result<(), CalorError>> + Send {
            async { Ok(()) }
        }
        fn push_schedule(
            &self,
            _grid: &ScheduleGrid,
        ) -> impl Future<Output = Result<(), CalorError>> + Send {
            async { Ok(()) }
        }
        fn push_error(
            &self,
            _flag: &ErrorFlag,
        ) -> impl Future<Output = Result<(), CalorError>> + Send {
            async { Ok(()) }
        }
    }

    #[test]
    fn should_produce_no_events_for_identical_snapshots() {
        let snapshot = RemoteSnapshot::default();
        assert!(diff(&snapshot, &snapshot.clone()).is_empty());
    }

    #[test]
    fn should_flag_config_change_on_switch_edit() {
        let old = RemoteSnapshot::default();
        let mut new = RemoteSnapshot::default();
        new.switches.system = SwitchMode::Off;

        let events = diff(&old, &new);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::ConfigChanged);
    }

    #[test]
    fn should_flag_overrides_change() {
        let old = RemoteSnapshot::default();
        let mut new = RemoteSnapshot::default();
        new.overrides.push(Override {
            scope: OverrideScope::Room(RoomId::new(1)),
            issued_at: now(),
            start: now(),
            duration_hours: 2,
            heat_on: true,
        });

        let events = diff(&old, &new);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::OverridesChanged);
    }

    #[test]
    fn should_flag_exactly_the_changed_weekly_cycle_room() {
        let mut old = RemoteSnapshot::default();
        old.weekly_cycle.set(RoomId::new(1), 1, 9, 1.0);
        old.weekly_cycle.set(RoomId::new(2), 1, 9, 1.0);

        let mut new = old.clone();
        new.weekly_cycle.set(RoomId::new(2), 1, 9, 0.0);

        let events = diff(&old, &new);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::WeeklyCycleChanged);
        assert_eq!(events[0].room, Some(RoomId::new(2)));
    }

    #[test]
    fn should_flag_newly_appearing_weekly_cycle_room() {
        let old = RemoteSnapshot::default();
        let mut new = RemoteSnapshot::default();
        new.weekly_cycle.set(RoomId::new(3), 2, 7, 1.0);

        let events = diff(&old, &new);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].room, Some(RoomId::new(3)));
    }

    #[tokio::test]
    async fn should_publish_events_and_swap_inputs_on_change() {
        let mut changed = RemoteSnapshot::default();
        changed.switches.system = SwitchMode::Off;

        let remote = ScriptedRemote::with(vec![Ok(changed.clone())]);
        let bus = InProcessEventBus::new(16);
        let mut rx = bus.subscribe();

        let mut watcher = SyncWatcher::new(
            remote,
            bus,
            ErrorSink::disconnected(),
            RemoteSnapshot::default(),
        );
        let inputs = watcher.inputs();
        watcher.poll_once().await;

        assert_eq!(rx.recv().await.unwrap().kind, EventKind::ConfigChanged);
        assert_eq!(inputs.read().await.switches.system, SwitchMode::Off);
    }

    #[tokio::test]
    async fn should_keep_last_good_inputs_on_fetch_failure() {
        let mut initial = RemoteSnapshot::default();
        initial.switches.system = SwitchMode::On;

        let remote = ScriptedRemote::with(vec![Err(StorageError::new(
            "fetch_snapshot",
            "remote unreachable",
        )
        .into())]);
        let bus = InProcessEventBus::new(16);

        let mut watcher =
            SyncWatcher::new(remote, bus, ErrorSink::disconnected(), initial.clone());
        let inputs = watcher.inputs();
        watcher.poll_once().await;

        assert_eq!(*inputs.read().await, initial);
    }

    #[tokio::test]
    async fn should_not_republish_after_settling() {
        let mut changed = RemoteSnapshot::default();
        changed.switches.system = SwitchMode::Off;

        let remote = ScriptedRemote::with(vec![Ok(changed.clone()), Ok(changed)]);
        let bus = InProcessEventBus::new(16);
        let mut rx = bus.subscribe();

        let mut watcher = SyncWatcher::new(
            remote,
            bus,
            ErrorSink::disconnected(),
            RemoteSnapshot::default(),
        );
        watcher.poll_once().await;
        watcher.poll_once().await;

        // Exactly one event from the first poll.
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}
