use fixed::types::{I16F16, I32F32};

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
pub type Fixed64 = I32F32;

/// Q16.16 fixed-point for compact storage (ratios, easing weights).
pub type Fixed32 = I16F16;

/// Simulation time and durations, in seconds of Q32.32 fixed-point.
///
/// The frame loop hands `World::advance` an elapsed-time delta in this type;
/// every timer, countdown, and progress counter in the crate shares it.
pub type Seconds = Fixed64;

/// Frames are whole advance() calls since session start.
pub type Frames = u64;

/// Convert an f64 to Fixed64. Use only for initialization, never in sim loop.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// Convert Fixed64 to f64. Use only for display, never in sim loop.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// Convert an f64 to Fixed32. Use only for initialization.
#[inline]
pub fn f64_to_fixed32(v: f64) -> Fixed32 {
    Fixed32::from_num(v)
}

/// Convert Fixed32 to f64. Use only for display.
#[inline]
pub fn fixed32_to_f64(v: Fixed32) -> f64 {
    v.to_num::<f64>()
}

/// Convert a whole number of seconds to the `Seconds` domain type.
#[inline]
pub fn secs(v: i64) -> Seconds {
    Seconds::from_num(v)
}

/// Checked multiplication for Fixed64 that returns None on overflow.
#[inline]
pub fn checked_mul_64(a: Fixed64, b: Fixed64) -> Option<Fixed64> {
    a.checked_mul(b)
}

/// Checked division for Fixed64 that returns None on zero divisor.
#[inline]
pub fn checked_div_64(a: Fixed64, b: Fixed64) -> Option<Fixed64> {
    a.checked_div(b)
}

/// Ratio of `part` to `whole` clamped into [0, 1]. Zero `whole` maps to 0.
#[inline]
pub fn ratio_or_zero(part: Fixed64, whole: Fixed64) -> Fixed64 {
    match part.checked_div(whole) {
        Some(r) => r.clamp(Fixed64::ZERO, Fixed64::ONE),
        None => Fixed64::ZERO,
    }
}

/// A continuous 2D position in world units.
///
/// Fixed-point so interpolation and scatter offsets stay deterministic.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
pub struct Position {
    pub x: Fixed64,
    pub y: Fixed64,
}

impl Position {
    pub const ORIGIN: Self = Self {
        x: Fixed64::ZERO,
        y: Fixed64::ZERO,
    };

    pub fn new(x: Fixed64, y: Fixed64) -> Self {
        Self { x, y }
    }

    /// Linear blend from `self` toward `other` by `t` in [0, 1].
    pub fn lerp(self, other: Position, t: Fixed64) -> Position {
        let t = t.clamp(Fixed64::ZERO, Fixed64::ONE);
        Position {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    pub fn offset(self, dx: Fixed64, dy: Fixed64) -> Position {
        Position {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}
