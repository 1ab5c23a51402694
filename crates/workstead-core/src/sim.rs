//! Simulation clock, tick summaries, and the desync hash.
//!
//! The world runs one tick per [`World::advance`](crate::world::World::advance)
//! call with whatever elapsed time the host passes in. There is no internal
//! fixed-timestep accumulator; interval catch-up happens inside the station
//! timers instead.

use crate::fixed::{Fixed64, Frames, Seconds};

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Session time. One frame per tick, time accumulated from the host's
/// elapsed-time values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SimClock {
    pub time: Seconds,
    pub frame: Frames,
}

impl SimClock {
    pub fn new() -> Self {
        Self {
            time: Seconds::ZERO,
            frame: 0,
        }
    }

    pub fn advance(&mut self, dt: Seconds) {
        self.time += dt;
        self.frame += 1;
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tick summary
// ---------------------------------------------------------------------------

/// Counters from one world tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdvanceResult {
    /// Frame number of the tick that produced this result.
    pub frame: Frames,
    /// Instances removed by decay timeout.
    pub expired_instances: u32,
    /// Successful production fires across all stations.
    pub productions: u32,
    /// Successful consumption fires across all stations.
    pub consumptions: u32,
    /// Stations that died this tick (decay cap or single use).
    pub stations_died: u32,
    /// Stations erected this tick (queued spawns and successors applied).
    pub stations_erected: u32,
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// A simple deterministic hash of simulation state for desync detection.
///
/// Uses FNV-1a (64-bit) for speed and simplicity. Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    /// Start a new hash.
    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    /// Feed bytes into the hash.
    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    /// Feed a u64 into the hash.
    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    /// Feed a u32 into the hash.
    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    /// Feed an i64 into the hash.
    pub fn write_i64(&mut self, v: i64) {
        self.write(&v.to_le_bytes());
    }

    /// Feed a Fixed64 into the hash.
    pub fn write_fixed64(&mut self, v: Fixed64) {
        self.write(&v.to_bits().to_le_bytes());
    }

    /// Finalize and return the hash value.
    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}
