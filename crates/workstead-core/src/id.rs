use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies one live resource instance in the world registry.
    pub struct InstanceId;

    /// Identifies a containment area.
    pub struct AreaId;

    /// Identifies a station entity.
    pub struct StationId;

    /// Identifies an interpolation task in the tween arena.
    pub struct TaskId;
}

/// Identifies a resource kind in the catalog. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KindId(pub u32);

/// Identifies an immutable station configuration in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StationConfigId(pub u32);

/// Identifies a loot table in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LootTableId(pub u32);

/// Identifies an external agent (player, worker). Agents are owned by the
/// input layer; the simulation only records their ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub u32);

/// A pending station ID returned from queued world mutations. Resolves to a
/// real StationId when the queue is applied at the start of the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PendingStationId(pub u64);
