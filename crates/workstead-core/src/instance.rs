//! The live resource-instance registry.
//!
//! Every spawned unit of a resource kind gets a slot here. The registry owns
//! the instance's record (kind, owner, age, position) and keeps an
//! incremental count per kind so goal checks never rescan the arena. Spawn
//! and despawn are the only mutations; aging happens once per tick.

use crate::catalog::{Catalog, DecayPolicy};
use crate::fixed::{Position, Seconds};
use crate::id::{AgentId, InstanceId, KindId};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::collections::BTreeMap;

/// One live resource instance in the world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceInstance {
    pub kind: KindId,
    /// Agent that spawned or currently holds this instance, if any.
    pub owner: Option<AgentId>,
    /// Seconds since spawn. Drives decay expiry for `Decays` kinds.
    pub age: Seconds,
    pub pos: Position,
}

/// Arena of live instances plus per-kind counts.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct InstanceRegistry {
    instances: SlotMap<InstanceId, ResourceInstance>,
    counts: BTreeMap<KindId, u32>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a new instance of `kind` at `pos`. Age starts at zero.
    pub fn spawn(&mut self, kind: KindId, pos: Position, owner: Option<AgentId>) -> InstanceId {
        let id = self.instances.insert(ResourceInstance {
            kind,
            owner,
            age: Seconds::ZERO,
            pos,
        });
        *self.counts.entry(kind).or_insert(0) += 1;
        id
    }

    /// Remove an instance. Returns its record, or None if already gone
    /// (double-despawn is a no-op).
    pub fn despawn(&mut self, id: InstanceId) -> Option<ResourceInstance> {
        let instance = self.instances.remove(id)?;
        if let Some(count) = self.counts.get_mut(&instance.kind) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.counts.remove(&instance.kind);
            }
        }
        Some(instance)
    }

    pub fn get(&self, id: InstanceId) -> Option<&ResourceInstance> {
        self.instances.get(id)
    }

    pub fn get_mut(&mut self, id: InstanceId) -> Option<&mut ResourceInstance> {
        self.instances.get_mut(id)
    }

    pub fn contains(&self, id: InstanceId) -> bool {
        self.instances.contains_key(id)
    }

    /// Kind of an instance, if it is still live.
    pub fn kind_of(&self, id: InstanceId) -> Option<KindId> {
        self.instances.get(id).map(|i| i.kind)
    }

    /// Live instances of one kind. O(1), maintained incrementally.
    pub fn count_of(&self, kind: KindId) -> u32 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    /// All live instances.
    pub fn live_count(&self) -> usize {
        self.instances.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (InstanceId, &ResourceInstance)> {
        self.instances.iter()
    }

    /// Per-kind counts in KindId order. Used by the state hash and audit.
    pub fn counts(&self) -> impl Iterator<Item = (KindId, u32)> + '_ {
        self.counts.iter().map(|(k, c)| (*k, *c))
    }

    /// Age every instance by `dt` and collect those whose `Decays` lifespan
    /// has elapsed. Expired ids are returned, not removed; the caller
    /// despawns them after clearing containment and interpolation references.
    pub fn advance_ages(&mut self, dt: Seconds, catalog: &Catalog) -> Vec<InstanceId> {
        let mut expired = Vec::new();
        for (id, instance) in self.instances.iter_mut() {
            instance.age += dt;
            if let DecayPolicy::Decays { lifespan } = catalog.decay_policy(instance.kind)
                && instance.age >= lifespan
            {
                expired.push(id);
            }
        }
        expired
    }
}
