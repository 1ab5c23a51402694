//! Per-entity resource bookkeeping, independent of spatial containment.
//!
//! Every station carries a [`Stockpile`] recording how many units of each
//! kind it holds as abstract quantities. Spatially spawned instances are a
//! separate concern; the stockpile is pure accounting.

use crate::id::KindId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Quantities of resource kinds held by one entity.
///
/// Backed by a BTreeMap so iteration order is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stockpile {
    amounts: BTreeMap<KindId, u32>,
}

impl Stockpile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `quantity` units of a kind.
    pub fn add(&mut self, kind: KindId, quantity: u32) {
        if quantity == 0 {
            return;
        }
        *self.amounts.entry(kind).or_insert(0) += quantity;
    }

    /// Consume up to `quantity` units of a kind. Returns the amount actually
    /// consumed, which may be less than requested.
    #[must_use]
    pub fn consume(&mut self, kind: KindId, quantity: u32) -> u32 {
        let Some(held) = self.amounts.get_mut(&kind) else {
            return 0;
        };
        let consumed = quantity.min(*held);
        *held -= consumed;
        if *held == 0 {
            self.amounts.remove(&kind);
        }
        consumed
    }

    /// Move up to `quantity` units of a kind into another stockpile.
    /// Returns the amount actually transferred.
    #[must_use]
    pub fn transfer_to(&mut self, other: &mut Stockpile, kind: KindId, quantity: u32) -> u32 {
        let moved = self.consume(kind, quantity);
        other.add(kind, moved);
        moved
    }

    /// Units held of one kind.
    pub fn amount_of(&self, kind: KindId) -> u32 {
        self.amounts.get(&kind).copied().unwrap_or(0)
    }

    /// Total units held across all kinds.
    pub fn total(&self) -> u32 {
        self.amounts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty()
    }

    /// Iterate (kind, amount) pairs in KindId order.
    pub fn iter(&self) -> impl Iterator<Item = (KindId, u32)> + '_ {
        self.amounts.iter().map(|(k, q)| (*k, *q))
    }
}
