//! End-to-end tests for the full calord stack.
//!
//! Each test wires the real services (schedule synthesis, presence
//! enforcement, control engine) to the virtual gateway and JSON-file stores
//! in a temporary data directory, then drives control cycles by hand; no
//! timer loop is involved.

use std::path::Path;
use std::sync::Arc;

use calor_adapter_gateway_virtual::VirtualGateway;
use calor_adapter_storage_json::{
    FileRemoteSync, JsonCommandStore, JsonScheduleStore, JsonStateStore, Lockfile,
};
use calor_app::event_bus::InProcessEventBus;
use calor_app::ports::{RemoteSnapshot, RemoteSync};
use calor_app::services::enforcer::enforce;
use calor_app::services::engine::{ControlEngine, CycleOutcome};
use calor_app::services::reporter::ErrorSink;
use calor_app::services::synthesizer::{ScheduleService, SynthesisInputs};
use calor_domain::cycle::Cycle;
use calor_domain::decision::Vote;
use calor_domain::id::{CycleId, RoomId};
use calor_domain::occupancy::OccupancyState;
use calor_domain::room::{Room, WarmingParams};
use calor_domain::schedule::OccupancyPattern;
use calor_domain::switch::SwitchMode;
use calor_domain::time::now;

fn warming() -> WarmingParams {
    WarmingParams {
        a: 120.0,
        b: -4.0,
        start_factor: 1.0,
        end_factor: 1.0,
        t_min: 17.0,
        t_max: 22.0,
    }
}

fn topology() -> (Vec<Room>, Vec<Cycle>) {
    let rooms = vec![
        Room::builder()
            .id(RoomId::new(1))
            .name("Bedroom")
            .cycle(CycleId::new(1))
            .sensor("sensor-1")
            .warming(warming())
            .build()
            .unwrap(),
        Room::builder()
            .id(RoomId::new(2))
            .name("Study")
            .cycle(CycleId::new(2))
            .sensor("sensor-2")
            .presence_sensor("presence-2")
            .warming(warming())
            .build()
            .unwrap(),
    ];
    let cycles = vec![
        Cycle::builder()
            .id(CycleId::new(1))
            .name("Upstairs")
            .pump("plug-1")
            .room(RoomId::new(1))
            .build()
            .unwrap(),
        Cycle::builder()
            .id(CycleId::new(2))
            .name("Downstairs")
            .pump("plug-2")
            .room(RoomId::new(2))
            .build()
            .unwrap(),
    ];
    (rooms, cycles)
}

struct Stack {
    gateway: VirtualGateway,
    remote: FileRemoteSync,
    rooms: Vec<Room>,
    schedule: ScheduleService<JsonScheduleStore>,
    engine: ControlEngine<
        VirtualGateway,
        JsonCommandStore,
        JsonStateStore,
        FileRemoteSync,
        Arc<InProcessEventBus>,
    >,
}

/// Build a fully-wired stack on a fresh data directory.
fn stack(data_dir: &Path) -> Stack {
    let (rooms, cycles) = topology();
    let gateway = VirtualGateway::new();
    gateway.set_external_temperature(5.0);
    let remote = FileRemoteSync::new(data_dir);
    let sink = ErrorSink::disconnected();

    let schedule = ScheduleService::new(JsonScheduleStore::new(data_dir), sink.clone());
    let engine = ControlEngine::new(
        gateway.clone(),
        JsonCommandStore::new(data_dir),
        JsonStateStore::new(data_dir),
        remote.clone(),
        Arc::new(InProcessEventBus::new(64)),
        rooms.clone(),
        cycles,
        sink,
    );

    Stack {
        gateway,
        remote,
        rooms,
        schedule,
        engine,
    }
}

/// A weekly cycle declaring full presence for every hour of the week.
fn always_home(room: RoomId, snapshot: &mut RemoteSnapshot) {
    snapshot.weekly_cycle.insert_room(room, [[1.0; 24]; 7]);
}

/// One schedule-refresh → enforce → control pass, like the daemon loop.
async fn run_cycle(stack: &Stack, snapshot: &RemoteSnapshot) -> CycleOutcome {
    let at = now();
    let pattern = OccupancyPattern::new();
    let inputs = SynthesisInputs {
        rooms: &stack.rooms,
        weekly: &snapshot.weekly_cycle,
        pattern: &pattern,
        overrides: &snapshot.overrides,
        external_temp: 5.0,
        tunables: &snapshot.tunables,
    };
    let grid = stack.schedule.current(&inputs, at).await;
    let enforced = enforce(
        &stack.gateway,
        &stack.rooms,
        &grid,
        snapshot.tunables.heating_window_mins,
        at,
        &ErrorSink::disconnected(),
    )
    .await;
    stack
        .engine
        .run_cycle(
            &enforced.grid,
            &enforced.occupancy,
            &snapshot.switches,
            &snapshot.tunables,
            at,
        )
        .await
}

#[tokio::test]
async fn should_heat_cold_room_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let stack = stack(dir.path());

    let mut snapshot = RemoteSnapshot::default();
    always_home(RoomId::new(1), &mut snapshot);
    stack.gateway.set_temperature("sensor-1", 18.0, now());
    stack.gateway.set_temperature("sensor-2", 21.0, now());

    let outcome = run_cycle(&stack, &snapshot).await;

    // Room 1 is cold against its 22.0 target: its pump and the boiler start.
    assert_eq!(outcome.decision.rooms[&RoomId::new(1)].vote, Vote::On);
    assert_eq!(outcome.decision.boiler, Vote::On);
    assert!(stack.gateway.pump("plug-1"));
    assert!(stack.gateway.boiler());
    assert_eq!(outcome.executed.len(), 2);

    // Everything was persisted for the dashboards and the next pass.
    assert!(dir.path().join("condensed_schedule.json").exists());
    assert!(dir.path().join("commands.json").exists());
    assert!(dir.path().join("commands_archive.json").exists());
    assert!(dir.path().join("state.json").exists());
    assert!(dir.path().join("control.json").exists());
    assert!(dir.path().join("outbox/state.json").exists());
}

#[tokio::test]
async fn should_settle_without_new_commands_on_second_pass() {
    let dir = tempfile::tempdir().unwrap();
    let stack = stack(dir.path());

    let mut snapshot = RemoteSnapshot::default();
    always_home(RoomId::new(1), &mut snapshot);
    stack.gateway.set_temperature("sensor-1", 18.0, now());

    let first = run_cycle(&stack, &snapshot).await;
    assert!(first.issued > 0);

    // Devices now match the votes, so the second pass is a no-op.
    let second = run_cycle(&stack, &snapshot).await;
    assert_eq!(second.issued, 0);
    assert!(second.executed.is_empty());
    assert!(stack.gateway.pump("plug-1"));
}

#[tokio::test]
async fn should_shut_down_when_operator_switches_system_off() {
    let dir = tempfile::tempdir().unwrap();
    let stack = stack(dir.path());

    let mut snapshot = RemoteSnapshot::default();
    always_home(RoomId::new(1), &mut snapshot);
    stack.gateway.set_temperature("sensor-1", 18.0, now());

    run_cycle(&stack, &snapshot).await;
    assert!(stack.gateway.boiler());

    // The operator flips the system master switch off upstream.
    snapshot.switches.system = SwitchMode::Off;
    let outcome = run_cycle(&stack, &snapshot).await;

    for decision in outcome.decision.rooms.values() {
        assert_eq!(decision.vote, Vote::Off);
    }
    // The boiler stops now; the pump follows after its cooldown.
    assert!(!stack.gateway.boiler());
    assert!(stack.gateway.pump("plug-1"));
    assert!(outcome.issued > 0);
}

#[tokio::test]
async fn should_heat_for_live_presence_despite_empty_weekly_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let stack = stack(dir.path());

    // No declared presence for room 2, but someone is in there right now.
    let snapshot = RemoteSnapshot::default();
    stack.gateway.set_temperature("sensor-2", 18.0, now());
    stack
        .gateway
        .record_presence("presence-2", OccupancyState::Occupied, now());

    let outcome = run_cycle(&stack, &snapshot).await;

    assert_eq!(outcome.state.occupancy[&RoomId::new(2)], OccupancyState::Occupied);
    assert_eq!(outcome.decision.rooms[&RoomId::new(2)].vote, Vote::On);
    assert!(stack.gateway.pump("plug-2"));
}

#[tokio::test]
async fn should_pick_up_operator_snapshot_from_inbox() {
    let dir = tempfile::tempdir().unwrap();
    let stack = stack(dir.path());

    let mut edited = RemoteSnapshot::default();
    edited.switches.system = SwitchMode::Off;
    std::fs::create_dir_all(dir.path().join("inbox")).unwrap();
    std::fs::write(
        stack.remote.snapshot_path(),
        serde_json::to_string(&edited).unwrap(),
    )
    .unwrap();

    let fetched = stack.remote.fetch_snapshot().await.unwrap();
    assert_eq!(fetched.switches.system, SwitchMode::Off);
}

#[tokio::test]
async fn should_hold_single_writer_lock_while_running() {
    let dir = tempfile::tempdir().unwrap();
    let lock = Lockfile::acquire(dir.path()).unwrap();

    // A second daemon instance must be refused.
    assert!(Lockfile::acquire(dir.path()).is_err());
    drop(lock);
    assert!(Lockfile::acquire(dir.path()).is_ok());
}
