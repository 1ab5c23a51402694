//! Read-only query API for inspecting world state.
//!
//! Provides snapshot types that aggregate world state into convenient views
//! for rendering, UI, and audio consumers. All types are owned copies -- no
//! references into internal world storage.

use crate::fixed::{Fixed64, Position, Seconds};
use crate::id::{AgentId, AreaId, InstanceId, KindId, StationConfigId, StationId};

// ---------------------------------------------------------------------------
// Station snapshot
// ---------------------------------------------------------------------------

/// An aggregated, read-only view of a single station.
///
/// Carries everything the presentation layer binds to: liveness for the
/// sprite swap, the work ratio for the progress slider, the decay counter
/// and aging stage for state visuals, and the station's resource ledger.
#[derive(Debug, Clone)]
pub struct StationSnapshot {
    pub id: StationId,
    /// The config this station was erected from.
    pub config: StationConfigId,
    /// The config's name, empty if the config is missing.
    pub name: String,
    pub pos: Position,
    pub alive: bool,
    pub age: Seconds,
    /// Aging stage index, 0 when aging is not configured.
    pub stage: u32,
    /// Failed decay cycles so far.
    pub decay: u32,
    pub work_progress: Seconds,
    /// Labor progress as a 0..1 fraction. 0 when no labor is configured.
    pub work_ratio: Fixed64,
    pub is_being_worked: bool,
    pub worker_count: u32,
    pub is_inspected: bool,
    pub input_area: Option<AreaId>,
    pub output_area: Option<AreaId>,
    /// Booked production outputs as (kind, quantity) pairs.
    pub ledger: Vec<(KindId, u32)>,
}

// ---------------------------------------------------------------------------
// Area snapshot
// ---------------------------------------------------------------------------

/// An aggregated, read-only view of a single containment area.
#[derive(Debug, Clone)]
pub struct AreaSnapshot {
    pub id: AreaId,
    pub origin: Position,
    /// Members in insertion order.
    pub members: Vec<(InstanceId, KindId)>,
    /// Required kinds as a multiset; a kind repeats to mean "N of it".
    pub requirements: Vec<KindId>,
    pub requirements_met: bool,
}

// ---------------------------------------------------------------------------
// Ledger snapshot
// ---------------------------------------------------------------------------

/// An owned view of the global ledger: total capital plus every agent
/// balance, in agent id order.
#[derive(Debug, Clone)]
pub struct LedgerSnapshot {
    pub capital: i64,
    pub agents: Vec<(AgentId, i64)>,
}
