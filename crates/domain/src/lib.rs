//! # calor-domain
//!
//! Pure domain model for the calor residential heating controller.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Rooms** and **Cycles** (the water-loop topology under control)
//! - Define **Schedule grids** (per-room, per-hour target temperatures and
//!   presence probabilities) and the inputs they are built from
//! - Define **Commands** (delayed, de-duplicated device instructions) and the
//!   queue invariants around them
//! - Define **Votes**, control **Regimes** and the per-regime decision
//!   functions with their explicit precedence
//! - Define **Master switches**, occupancy aggregation, warming curves and
//!   the system-state snapshot
//! - Contain all invariant enforcement and control logic
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod command;
pub mod cycle;
pub mod decision;
pub mod event;
pub mod occupancy;
pub mod room;
pub mod schedule;
pub mod state;
pub mod switch;
pub mod tunables;
pub mod warming;
