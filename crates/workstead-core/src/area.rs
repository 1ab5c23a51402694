//! Containment areas: spatial regions that track which resource instances
//! lie inside them and match the membership against a required multiset.
//!
//! The area itself is pure bookkeeping. Spatial detection happens outside
//! (the physics layer reports enter/exit through the world), and the side
//! effects of consumption (despawning instances, events, capital) happen in
//! the world; the area only answers "who is here" and "is the requirement
//! satisfied", and picks which members a consumption takes.

use crate::fixed::{Fixed64, Position, Seconds};
use crate::id::{InstanceId, KindId};
use crate::tween::Easing;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Arrange contained instances into a grid anchored at the area origin.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GridLayout {
    pub columns: u32,
    pub spacing: Fixed64,
}

impl GridLayout {
    /// Deterministic slot position for the member at `index`.
    pub fn slot(&self, origin: Position, index: usize) -> Position {
        let columns = self.columns.max(1) as usize;
        let col = (index % columns) as i64;
        let row = (index / columns) as i64;
        origin.offset(
            self.spacing * Fixed64::from_num(col),
            self.spacing * Fixed64::from_num(row),
        )
    }
}

/// Pull entering instances toward the area origin over a fixed duration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PullBehavior {
    /// Only instances of this kind are pulled; None pulls any resource.
    pub target_kind: Option<KindId>,
    pub duration: Seconds,
    pub easing: Easing,
}

/// Outcome of an enter call, used by the world to route notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnterOutcome {
    /// Newly added and the requirement multiset is now satisfied.
    Satisfied,
    /// Newly added but requirements remain unmet.
    Unsatisfied,
    /// Already a member; nothing changed.
    AlreadyPresent,
    /// The object does not carry the resource capability. Produced by the
    /// world's enter routing, never by [`Area::enter`] itself.
    Ignored,
}

/// A containment area.
///
/// Membership is an insertion-ordered list (so the reverse consumption walk
/// is reproducible) with a hash index for O(1) idempotence checks. The index
/// is never iterated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Area {
    pub origin: Position,
    members: Vec<(InstanceId, KindId)>,
    #[serde(skip)]
    index: HashSet<InstanceId>,
    /// Required kinds as a multiset; a kind repeats to mean "N of it".
    requirements: Vec<KindId>,
    /// Consume the matching members immediately whenever an entry satisfies
    /// the requirements (delivery pads). Station input areas leave this off
    /// and consume on their own triggers.
    pub auto_consume: bool,
    pub arrange: Option<GridLayout>,
    /// Ask the physics layer to freeze members in place.
    pub lock_contents: bool,
    pub pull: Option<PullBehavior>,
}

impl Area {
    pub fn new(origin: Position) -> Self {
        Self {
            origin,
            members: Vec::new(),
            index: HashSet::new(),
            requirements: Vec::new(),
            auto_consume: false,
            arrange: None,
            lock_contents: false,
            pull: None,
        }
    }

    pub fn with_requirements(mut self, requirements: Vec<KindId>) -> Self {
        self.requirements = requirements;
        self
    }

    pub fn requirements(&self) -> &[KindId] {
        &self.requirements
    }

    pub fn set_requirements(&mut self, requirements: Vec<KindId>) {
        self.requirements = requirements;
    }

    /// Members in insertion order.
    pub fn members(&self) -> &[(InstanceId, KindId)] {
        &self.members
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn contains(&self, id: InstanceId) -> bool {
        self.index.contains(&id)
    }

    /// Add an instance. Idempotent: re-entering a member is a no-op.
    pub fn enter(&mut self, id: InstanceId, kind: KindId) -> EnterOutcome {
        if !self.index.insert(id) {
            return EnterOutcome::AlreadyPresent;
        }
        self.members.push((id, kind));
        if self.all_requirements_met() {
            EnterOutcome::Satisfied
        } else {
            EnterOutcome::Unsatisfied
        }
    }

    /// Remove an instance. Idempotent: exiting a non-member is a no-op.
    /// Returns true if the instance was a member.
    pub fn exit(&mut self, id: InstanceId) -> bool {
        if !self.index.remove(&id) {
            return false;
        }
        if let Some(pos) = self.members.iter().position(|(m, _)| *m == id) {
            self.members.remove(pos);
        }
        true
    }

    /// True iff every required kind's multiplicity is covered by members.
    /// Pure query, recomputed on every call.
    pub fn all_requirements_met(&self) -> bool {
        let required = count_by_kind(self.requirements.iter().copied());
        if required.is_empty() {
            return true;
        }
        let held = count_by_kind(self.members.iter().map(|(_, k)| *k));
        required
            .iter()
            .all(|(kind, needed)| held.get(kind).copied().unwrap_or(0) >= *needed)
    }

    /// Select and remove the members a consumption takes.
    ///
    /// Returns None (no side effect) when requirements are unmet. Otherwise
    /// walks members newest-first, takes one member per owed requirement
    /// unit, removes them from the area, and returns them for the caller to
    /// despawn. Never takes more of a kind than its required multiplicity.
    pub fn take_matching(&mut self) -> Option<Vec<InstanceId>> {
        if !self.all_requirements_met() {
            return None;
        }

        let mut owed = count_by_kind(self.requirements.iter().copied());
        // Selection pass first, removal after: no mutation while scanning.
        let mut picked_positions = Vec::new();
        for pos in (0..self.members.len()).rev() {
            let (_, kind) = self.members[pos];
            if let Some(remaining) = owed.get_mut(&kind)
                && *remaining > 0
            {
                *remaining -= 1;
                picked_positions.push(pos);
            }
        }

        // Positions were collected in descending order, so removal by index
        // never shifts a later pick.
        let mut taken = Vec::with_capacity(picked_positions.len());
        for pos in picked_positions {
            let (id, _) = self.members.remove(pos);
            self.index.remove(&id);
            taken.push(id);
        }
        Some(taken)
    }

    /// Rebuild the hash index from the member list. Needed after
    /// deserialization, where the index is skipped.
    pub fn rebuild_index(&mut self) {
        self.index = self.members.iter().map(|(id, _)| *id).collect();
    }
}

fn count_by_kind(kinds: impl Iterator<Item = KindId>) -> BTreeMap<KindId, u32> {
    let mut counts = BTreeMap::new();
    for kind in kinds {
        *counts.entry(kind).or_insert(0) += 1;
    }
    counts
}
