//! Capability flags carried by world objects.
//!
//! The spatial layer reports enter/exit with the object's capabilities so
//! the simulation never inspects presentation-side tags. The set is fixed
//! and packed into a byte.

use serde::{Deserialize, Serialize};

/// One capability an object can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Capability {
    /// Counts as a resource for containment matching.
    Resource = 0,
    /// Can be picked up and carried by an agent.
    Grabbable = 1,
    /// Can receive labor (stations).
    Workable = 2,
    /// Can be opened in the inspection panel.
    Inspectable = 3,
}

pub const CAPABILITY_COUNT: usize = 4;

/// A packed set of capabilities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    /// The empty set.
    pub const NONE: Self = Self(0);

    pub fn new(caps: &[Capability]) -> Self {
        let mut set = Self::NONE;
        for cap in caps {
            set = set.with(*cap);
        }
        set
    }

    #[must_use]
    pub fn with(self, cap: Capability) -> Self {
        Self(self.0 | (1 << cap as u8))
    }

    #[must_use]
    pub fn without(self, cap: Capability) -> Self {
        Self(self.0 & !(1 << cap as u8))
    }

    pub fn has(self, cap: Capability) -> bool {
        self.0 & (1 << cap as u8) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}
