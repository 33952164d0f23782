//! # calord: the calor heating-controller daemon
//!
//! Composition root that wires the adapters together and runs the periodic
//! control loop.
//!
//! ## Responsibilities
//! - Parse configuration (TOML file, env vars) and bail out early if it is
//!   unusable; this is the only step allowed to terminate the process
//! - Acquire the data-directory lockfile (single active instance)
//! - Construct the gateway and storage adapters
//! - Construct application services, injecting adapters via port traits
//! - Spawn the error reporter and the remote sync watcher
//! - Drive refresh-schedule → enforce-presence → control-cycle on a timer
//! - Handle graceful shutdown (SIGINT)
//!
//! The virtual gateway stands in for the physical device drivers, which live
//! in their own services outside this repository.
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no control logic belongs here.

mod config;

use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use calor_adapter_gateway_virtual::VirtualGateway;
use calor_adapter_storage_json::{
    FileRemoteSync, JsonCommandStore, JsonScheduleStore, JsonStateStore, Lockfile,
};
use calor_app::event_bus::InProcessEventBus;
use calor_app::ports::{DeviceGateway, RemoteSnapshot, RemoteSync};
use calor_app::services::enforcer::enforce;
use calor_app::services::engine::ControlEngine;
use calor_app::services::reporter::{ErrorReporter, ErrorSink};
use calor_app::services::synthesizer::{ScheduleService, SynthesisInputs};
use calor_app::services::watcher::SyncWatcher;
use calor_domain::error::{Phase, Severity};
use calor_domain::event::EventKind;
use calor_domain::schedule::OccupancyPattern;
use calor_domain::time::now;

use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter)?)
        .init();

    let data_dir = Path::new(&config.paths.data_dir).to_path_buf();
    let _lock = Lockfile::acquire(&data_dir)?;

    let rooms = config.rooms()?;
    let cycles = config.cycles()?;
    tracing::info!(
        rooms = rooms.len(),
        cycles = cycles.len(),
        data_dir = %data_dir.display(),
        "calord starting"
    );

    // Adapters.
    let gateway = VirtualGateway::new();
    let command_store = JsonCommandStore::new(&data_dir);
    let schedule_store = JsonScheduleStore::new(&data_dir);
    let state_store = JsonStateStore::new(&data_dir);
    let remote = FileRemoteSync::new(&data_dir);

    // Error reporter: single consumer of the structured error channel.
    let (sink, reporter) = ErrorReporter::channel(remote.clone());
    tokio::spawn(reporter.run());

    // Event bus and sync watcher.
    let bus = Arc::new(InProcessEventBus::new(256));
    let mut change_rx = bus.subscribe();

    let initial = remote.fetch_snapshot().await.unwrap_or_else(|err| {
        sink.report(Phase::Init, Severity::Moderate, err.to_string());
        RemoteSnapshot::default()
    });
    let watcher = SyncWatcher::new(
        remote.clone(),
        Arc::clone(&bus),
        sink.clone(),
        initial,
    );
    let synced_inputs = watcher.inputs();
    tokio::spawn(watcher.run(std::time::Duration::from_secs(config.timing.sync_poll_secs)));

    // Services.
    let schedule_service = ScheduleService::new(schedule_store, sink.clone());
    let engine = ControlEngine::new(
        gateway.clone(),
        command_store,
        state_store,
        remote.clone(),
        Arc::clone(&bus),
        rooms.clone(),
        cycles,
        sink.clone(),
    );

    let pattern_path = data_dir.join("occupancy.json");
    let mut interval =
        tokio::time::interval(std::time::Duration::from_secs(config.timing.cycle_interval_secs));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown requested");
                break;
            }
        }

        // Drain change flags published by the watcher since the last pass.
        let mut schedule_dirty = false;
        while let Ok(event) = change_rx.try_recv() {
            if matches!(
                event.kind,
                EventKind::ConfigChanged
                    | EventKind::OverridesChanged
                    | EventKind::WeeklyCycleChanged
            ) {
                schedule_service.mark_stale();
                schedule_dirty = true;
            }
        }

        let at = now();
        let snapshot = synced_inputs.read().await.clone();
        let pattern = load_pattern(&pattern_path, &sink);
        let external_temp = match gateway.external_temperature().await {
            Ok(temp) => temp,
            Err(err) => {
                sink.report(Phase::Schedule, Severity::Low, err.to_string());
                0.0
            }
        };

        let inputs = SynthesisInputs {
            rooms: &rooms,
            weekly: &snapshot.weekly_cycle,
            pattern: &pattern,
            overrides: &snapshot.overrides,
            external_temp,
            tunables: &snapshot.tunables,
        };
        let grid = schedule_service.current(&inputs, at).await;
        if schedule_dirty {
            if let Err(err) = remote.push_schedule(&grid).await {
                sink.report(Phase::Schedule, Severity::Low, err.to_string());
            }
        }

        let enforced = enforce(
            &gateway,
            &rooms,
            &grid,
            snapshot.tunables.heating_window_mins,
            at,
            &sink,
        )
        .await;

        let outcome = engine
            .run_cycle(
                &enforced.grid,
                &enforced.occupancy,
                &snapshot.switches,
                &snapshot.tunables,
                at,
            )
            .await;
        tracing::info!(
            boiler = ?outcome.decision.boiler,
            issued = outcome.issued,
            executed = outcome.executed.len(),
            degraded = outcome.decision.degraded,
            "control cycle finished"
        );
    }

    Ok(())
}

/// Load the learned occupancy pattern produced by the presence logger.
///
/// The file is optional; a fresh install schedules from the weekly cycle
/// alone until enough history accumulates.
fn load_pattern(path: &Path, sink: &ErrorSink) -> OccupancyPattern {
    match std::fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(pattern) => pattern,
            Err(err) => {
                sink.report(
                    Phase::Schedule,
                    Severity::Moderate,
                    format!("occupancy pattern unreadable: {err}"),
                );
                OccupancyPattern::new()
            }
        },
        Err(_) => OccupancyPattern::new(),
    }
}
