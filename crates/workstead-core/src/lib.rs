//! Workstead Core -- the simulation engine for resource-economy games.
//!
//! This crate provides the resource catalog, containment areas, station
//! state machines, the global ledger, events, queries, and deterministic
//! fixed-point arithmetic that the goal and data layers build on.
//!
//! # Five-Phase Tick Pipeline
//!
//! Each call to [`world::World::advance`] moves the simulation forward by
//! an elapsed-time delta through the following phases:
//!
//! 1. **Apply queued mutations** -- Deferred station spawns are erected.
//! 2. **Sweep expired instances** -- Decay lifespans advance and expired
//!    instances leave their areas and despawn.
//! 3. **Tick stations** -- Aging, labor progression, consumption,
//!    production, and upgrade countdowns, in erection order.
//! 4. **Apply interpolations** -- Pull tweens move instance positions.
//! 5. **Bookkeeping** -- Buffered events are delivered and the state hash
//!    is refreshed.
//!
//! # Command Pattern
//!
//! All mutation enters through world commands: spawn/despawn, area
//! enter/exit notifications, begin/end labor, queued station spawns.
//! Deferred spawns resolve a tick later:
//!
//! ```rust,ignore
//! let pending = world.queue_station(config, pos);
//! world.advance(dt);
//! let station = world.resolve_pending(pending).unwrap();
//! ```
//!
//! # Key Types
//!
//! - [`world::World`] -- Simulation state owner and tick orchestrator.
//! - [`catalog::Catalog`] -- Immutable registry of resource kinds, station
//!   configs, and loot tables (frozen at startup).
//! - [`area::Area`] -- Containment area with multiset requirement matching
//!   and optional grid/lock/pull decorators.
//! - [`station::StationState`] -- Per-station runtime state machine.
//! - [`ledger::Ledger`] -- Global capital plus per-agent balances.
//! - [`event::EventBus`] -- Per-kind ring buffers with passive delivery.
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for deterministic math.
//! - [`query`] -- Owned snapshot views for rendering, UI, and audio.

pub mod area;
pub mod audit;
pub mod capability;
pub mod catalog;
pub mod event;
pub mod fixed;
pub mod id;
pub mod instance;
pub mod ledger;
pub mod loot;
pub mod query;
pub mod rng;
pub mod sim;
pub mod station;
pub mod stock;
pub mod tween;
pub mod world;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
