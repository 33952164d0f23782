//! Control engine: one decide→persist→execute→export pass.
//!
//! The engine is a single-threaded, run-to-completion step invoked
//! periodically by the binary's timer loop. Each pass:
//!
//! 1. acquires a [`SystemState`] snapshot through the gateway (failures are
//!    scoped to the affected room or device and degrade, never abort),
//! 2. runs every controlled room through its control regime and aggregates
//!    votes to cycles and the boiler,
//! 3. turns vote/state differences into delayed, de-duplicated commands,
//! 4. executes due commands (latest issuance per device wins) and archives
//!    the outcome,
//! 5. exports state and decision snapshots for dashboards.
//!
//! A crash between steps is recovered automatically on the next pass because
//! the command queue is re-read from storage; nothing here is allowed to
//! terminate the process.

use std::collections::BTreeMap;

use chrono::Duration;

use calor_domain::command::{Command, CommandQueue, Device};
use calor_domain::cycle::Cycle;
use calor_domain::decision::{self, Reason, Regime, RoomVoteContext, Vote};
use calor_domain::error::{CalorError, GatewayError, Phase, Severity};
use calor_domain::event::{Event, EventKind};
use calor_domain::id::RoomId;
use calor_domain::occupancy::OccupancyState;
use calor_domain::room::Room;
use calor_domain::schedule::ScheduleGrid;
use calor_domain::state::{ControlDecision, MeasuredTemp, RoomDecision, SystemState};
use calor_domain::switch::{MasterSwitch, SwitchMode};
use calor_domain::time::{Slot, Timestamp};
use calor_domain::tunables::ControlTunables;

use crate::ports::{CommandStore, DeviceGateway, EventPublisher, RemoteSync, StateStore};
use crate::services::reporter::ErrorSink;

/// The result of one control pass, for callers and tests.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub decision: ControlDecision,
    pub state: SystemState,
    /// Commands applied during this pass.
    pub executed: Vec<Command>,
    /// Commands newly issued during this pass.
    pub issued: usize,
}

/// The decision engine and command executor.
pub struct ControlEngine<G, C, S, R, P> {
    gateway: G,
    commands: C,
    states: S,
    remote: R,
    publisher: P,
    rooms: Vec<Room>,
    cycles: Vec<Cycle>,
    sink: ErrorSink,
}

impl<G, C, S, R, P> ControlEngine<G, C, S, R, P>
where
    G: DeviceGateway,
    C: CommandStore,
    S: StateStore,
    R: RemoteSync,
    P: EventPublisher,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gateway: G,
        commands: C,
        states: S,
        remote: R,
        publisher: P,
        rooms: Vec<Room>,
        cycles: Vec<Cycle>,
        sink: ErrorSink,
    ) -> Self {
        Self {
            gateway,
            commands,
            states,
            remote,
            publisher,
            rooms,
            cycles,
            sink,
        }
    }

    /// Run one full control pass against the given resolved schedule.
    pub async fn run_cycle(
        &self,
        grid: &ScheduleGrid,
        occupancy: &BTreeMap<RoomId, OccupancyState>,
        switches: &MasterSwitch,
        tunables: &ControlTunables,
        now: Timestamp,
    ) -> CycleOutcome {
        let mut state = self.acquire_state(occupancy, now).await;
        let decision = self.vote(grid, switches, tunables, &mut state, now).await;
        let (queue, issued) = self.issue_commands(&decision, &state, tunables, now).await;
        let executed = self.execute_commands(queue, &mut state, now).await;
        self.export(&state, &decision).await;

        let _ = self
            .publisher
            .publish(Event::new(EventKind::ControlCycleCompleted))
            .await;

        CycleOutcome {
            decision,
            state,
            executed,
            issued,
        }
    }

    /// Read everything the regimes need. Device failures degrade the
    /// affected room and are reported; the pass continues.
    async fn acquire_state(
        &self,
        occupancy: &BTreeMap<RoomId, OccupancyState>,
        now: Timestamp,
    ) -> SystemState {
        let mut state = SystemState::new(now);

        match self.states.load_state().await {
            Ok(Some(previous)) => state.room_states = previous.room_states,
            Ok(None) => {}
            Err(err) => {
                self.sink
                    .report(Phase::AcquireState, Severity::Low, err.to_string());
            }
        }

        for room in &self.rooms {
            let measured = match &room.sensor {
                Some(sensor) => match self.gateway.room_climate(sensor).await {
                    Ok(reading) => reading.map(|r| MeasuredTemp {
                        value: r.temperature,
                        at: r.updated_at,
                    }),
                    Err(err) => {
                        self.sink.report(
                            Phase::AcquireState,
                            Severity::Moderate,
                            format!("room {} sensor: {err}", room.id),
                        );
                        None
                    }
                },
                None => None,
            };
            state.measured_temps.insert(room.id, measured);

            let mut openings = Vec::new();
            for valve in &room.valves {
                match self.gateway.valve_opening(valve).await {
                    Ok(Some(opening)) => openings.push(opening),
                    Ok(None) => {}
                    Err(err) => {
                        self.sink.report(
                            Phase::AcquireState,
                            Severity::Moderate,
                            format!("valve {valve}: {err}"),
                        );
                    }
                }
            }
            state.valve_openings.insert(room.id, openings);
        }
        state.occupancy = occupancy.clone();

        for cycle in &self.cycles {
            let on = match self.gateway.pump_state(&cycle.pump).await {
                Ok(on) => on,
                Err(err) => {
                    self.sink.report(
                        Phase::AcquireState,
                        Severity::Moderate,
                        format!("pump {}: {err}", cycle.pump),
                    );
                    false
                }
            };
            state.pump_states.insert(cycle.id, on);
        }
        state.boiler_state = match self.gateway.boiler_state().await {
            Ok(on) => on,
            Err(err) => {
                self.sink
                    .report(Phase::AcquireState, Severity::Moderate, err.to_string());
                false
            }
        };

        state
    }

    /// Run every controlled room through its regime and aggregate.
    async fn vote(
        &self,
        grid: &ScheduleGrid,
        switches: &MasterSwitch,
        tunables: &ControlTunables,
        state: &mut SystemState,
        now: Timestamp,
    ) -> ControlDecision {
        let mut decision = ControlDecision::new(now);
        let slot = Slot::of(now);

        for room in self.rooms.iter().filter(|r| r.controlled) {
            let prev_vote = state.prev_vote(room.id);

            let Some(cell) = grid.cell(room.id, slot) else {
                // No schedule for this room: keep its previous vote rather
                // than toggling the loop on a synthesizer gap.
                self.sink.report(
                    Phase::Voting,
                    Severity::Moderate,
                    format!("room {} has no schedule cell", room.id),
                );
                decision.degraded = true;
                decision.rooms.insert(
                    room.id,
                    RoomDecision {
                        vote: prev_vote,
                        regime: Regime::PlainHysteresis,
                        reason: Reason::Skipped,
                    },
                );
                continue;
            };

            // The system master switch bypasses everything below it.
            let cycle_switch = if switches.system == SwitchMode::Auto {
                switches.cycle(room.cycle)
            } else {
                switches.system
            };

            let measured = state.measured_temps.get(&room.id).copied().flatten();
            let valve_demand = state
                .valve_openings
                .get(&room.id)
                .filter(|o| !o.is_empty())
                .map(|o| o.iter().copied().fold(f64::MIN, f64::max));

            let ctx = RoomVoteContext {
                room,
                cell,
                cycle_switch,
                room_switch: switches.room(room.id),
                measured: measured.map(|m| m.value),
                measured_at: measured.map(|m| m.at),
                valve_demand,
                prev_vote,
                now,
            };
            let outcome = decision::decide(&ctx, tunables);

            if let Some(update) = outcome.valve {
                for valve in &room.valves {
                    if let Err(err) = self.gateway.set_valve(valve, update).await {
                        self.sink.report(
                            Phase::Voting,
                            Severity::Moderate,
                            format!("valve {valve}: {err}"),
                        );
                    }
                }
            }

            tracing::debug!(
                room = %room.id,
                vote = ?outcome.vote,
                regime = ?outcome.regime,
                reason = ?outcome.reason,
                "room voted"
            );
            decision.rooms.insert(
                room.id,
                RoomDecision {
                    vote: outcome.vote,
                    regime: outcome.regime,
                    reason: outcome.reason,
                },
            );
            state.room_states.insert(room.id, outcome.vote);
        }

        for cycle in &self.cycles {
            let votes = cycle
                .rooms
                .iter()
                .filter_map(|room| decision.rooms.get(room))
                .map(|d| d.vote);
            decision.cycles.insert(cycle.id, decision::aggregate(votes));
        }
        decision.boiler = decision::aggregate(decision.cycles.values().copied());

        tracing::info!(
            cycles = ?decision.cycles,
            boiler = ?decision.boiler,
            degraded = decision.degraded,
            "votes aggregated"
        );
        decision
    }

    /// Issue commands where votes differ from live device state.
    async fn issue_commands(
        &self,
        decision: &ControlDecision,
        state: &SystemState,
        tunables: &ControlTunables,
        now: Timestamp,
    ) -> (CommandQueue, usize) {
        let mut queue = match self.commands.load().await {
            Ok(queue) => queue,
            Err(err) => {
                self.sink
                    .report(Phase::IssueCommands, Severity::Moderate, err.to_string());
                CommandQueue::new()
            }
        };
        let mut issued = 0;

        for cycle in &self.cycles {
            let vote = decision.cycles.get(&cycle.id).copied().unwrap_or(Vote::Off);
            if state.pump_on(cycle.id) == vote.is_on() {
                continue;
            }
            // Pumps get a cooldown before switching off so a brief dip does
            // not cycle the motor.
            let delay = if vote.is_on() {
                Duration::zero()
            } else {
                Duration::minutes(tunables.pump_off_cooldown_mins)
            };
            if let Some(id) = queue.issue(Device::Pump(cycle.id), vote.is_on(), delay, now) {
                tracing::info!(command = %id, device = %Device::Pump(cycle.id), on = vote.is_on(), "command issued");
                issued += 1;
            }
        }

        if state.boiler_state != decision.boiler.is_on() {
            if let Some(id) = queue.issue(Device::Boiler, decision.boiler.is_on(), Duration::zero(), now)
            {
                tracing::info!(command = %id, device = %Device::Boiler, on = decision.boiler.is_on(), "command issued");
                issued += 1;
            }
        }

        if let Err(err) = self.commands.save(&queue).await {
            self.sink
                .report(Phase::IssueCommands, Severity::Moderate, err.to_string());
        }
        (queue, issued)
    }

    /// Apply due commands, write back the live queue, append the archive.
    async fn execute_commands(
        &self,
        queue: CommandQueue,
        state: &mut SystemState,
        now: Timestamp,
    ) -> Vec<Command> {
        let plan = queue.plan(now);
        let mut applied = Vec::new();
        let mut still_pending = Vec::new();

        for mut command in plan.due {
            match self.apply(&command).await {
                Ok(()) => {
                    command.mark_executed(now);
                    state.apply_device_state(command.device, command.on);
                    tracing::info!(device = %command.device, on = command.on, "command executed");
                    let _ = self
                        .publisher
                        .publish(Event::new(EventKind::CommandExecuted))
                        .await;
                    applied.push(command);
                }
                Err(err) => {
                    // Stays in the live queue; the next cycle re-attempts.
                    self.sink
                        .report(Phase::ExecuteCommands, Severity::High, err.to_string());
                    still_pending.push(command);
                }
            }
        }

        let mut live = plan.future;
        live.append(&mut still_pending);
        if let Err(err) = self.commands.save(&CommandQueue::from_commands(live)).await {
            self.sink
                .report(Phase::ExecuteCommands, Severity::Moderate, err.to_string());
        }

        let mut archive = plan.executed;
        archive.extend(plan.superseded);
        archive.extend(applied.iter().cloned());
        if !archive.is_empty() {
            if let Err(err) = self.commands.archive(&archive).await {
                self.sink
                    .report(Phase::ExecuteCommands, Severity::Moderate, err.to_string());
            }
        }

        applied
    }

    async fn apply(&self, command: &Command) -> Result<(), CalorError> {
        match command.device {
            Device::Pump(cycle_id) => {
                let cycle = self
                    .cycles
                    .iter()
                    .find(|c| c.id == cycle_id)
                    .ok_or_else(|| {
                        GatewayError::new(command.device.to_string(), "unknown cycle")
                    })?;
                self.gateway.set_pump(&cycle.pump, command.on).await
            }
            Device::Boiler => self.gateway.set_boiler(command.on).await,
        }
    }

    /// Persist and push the snapshot and decision for dashboards.
    async fn export(&self, state: &SystemState, decision: &ControlDecision) {
        if let Err(err) = self.states.save_state(state).await {
            self.sink
                .report(Phase::ExportState, Severity::Moderate, err.to_string());
        }
        if let Err(err) = self.states.save_decision(decision).await {
            self.sink
                .report(Phase::ExportState, Severity::Moderate, err.to_string());
        }
        if let Err(err) = self.remote.push_state(state).await {
            self.sink
                .report(Phase::ExportState, Severity::Low, err.to_string());
        }
        if let Err(err) = self.remote.push_decision(decision).await {
            self.sink
                .report(Phase::ExportState, Severity::Low, err.to_string());
        }
    }
}
