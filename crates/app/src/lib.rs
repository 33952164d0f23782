//! # calor-app
//!
//! Application layer: use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound
//!   ports):
//!   - `DeviceGateway`: sensor reads and pump/valve/boiler writes
//!   - `CommandStore`: persist and archive the command queue
//!   - `ScheduleStore`: persist the synthesized grids
//!   - `StateStore`: persist state/decision snapshots
//!   - `RemoteSync`: pull config edits inward, push state/errors outward
//! - Define **driving/inbound ports** as use-case structs:
//!   - `ControlEngine`: one decide→persist→execute→export pass
//!   - `ScheduleService`: cached schedule synthesis with stale invalidation
//!   - `SyncWatcher`: poll-and-diff listener that only ever sets flags
//!   - `ErrorReporter`: single consumer of the structured error channel
//! - Provide **in-process infrastructure** (event bus) that doesn't need IO
//! - Orchestrate domain objects without knowing *how* persistence or device
//!   IO works
//!
//! ## Dependency rule
//! Depends on `calor-domain` only (plus `tokio::sync` for channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the
//! reverse.

pub mod event_bus;
pub mod ports;
pub mod services;
