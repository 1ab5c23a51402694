//! Weighted loot tables.
//!
//! Selection is a cumulative-percentage scan against a uniform draw in
//! [0, 100). Tables are not normalized: entries summing under 100 leave a
//! dead band, and any draw landing in it falls back to the last entry with
//! a valid kind. Entries past a cumulative sum of 100 are unreachable.
//! Both shapes are accepted as authored; drop rates are a content decision.

use crate::fixed::Fixed64;
use crate::id::KindId;
use crate::rng::WorldRng;
use serde::{Deserialize, Serialize};

/// One weighted entry. `kind: None` models an authored empty slot; it
/// still occupies its share of the draw range but can never be selected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LootEntry {
    pub kind: Option<KindId>,
    /// Share of the [0, 100) draw range, in percent.
    pub percent: Fixed64,
    pub quantity: u32,
}

/// A named table of weighted entries, scanned in authored order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LootTable {
    pub name: String,
    pub entries: Vec<LootEntry>,
}

/// The outcome of one draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LootDraw {
    pub kind: KindId,
    pub quantity: u32,
}

impl LootTable {
    /// Draw one entry. Returns None only when no entry has a valid kind
    /// (logged; callers treat it as "nothing dropped this attempt").
    pub fn draw(&self, rng: &mut WorldRng) -> Option<LootDraw> {
        let roll = rng.percent();
        let mut cumulative = Fixed64::ZERO;
        let mut last_valid: Option<LootDraw> = None;

        for entry in &self.entries {
            if let Some(kind) = entry.kind {
                last_valid = Some(LootDraw {
                    kind,
                    quantity: entry.quantity,
                });
            }
            cumulative += entry.percent;
            if roll < cumulative
                && let Some(kind) = entry.kind
            {
                return Some(LootDraw {
                    kind,
                    quantity: entry.quantity,
                });
            }
        }

        if last_valid.is_none() {
            log::warn!("loot table '{}' has no valid entries", self.name);
        }
        last_valid
    }
}
