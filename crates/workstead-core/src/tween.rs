//! Position interpolation tasks.
//!
//! A [`TweenSet`] owns a pool of in-flight interpolations keyed by
//! [`TaskId`]. Each task moves one resource instance from a start position
//! to an end position over a fixed duration with a chosen easing curve.
//!
//! The set never touches instance storage directly. [`TweenSet::advance`]
//! returns the computed position updates and the caller applies them,
//! skipping targets that no longer exist.

use serde::{Deserialize, Serialize};

use crate::fixed::{Fixed64, Position, Seconds, ratio_or_zero};
use crate::id::{InstanceId, TaskId};
use slotmap::SlotMap;

// ---------------------------------------------------------------------------
// Easing
// ---------------------------------------------------------------------------

/// Easing curve applied to interpolation progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Easing {
    #[default]
    Linear,
    SmoothStep,
    EaseOutCubic,
}

impl Easing {
    /// Map linear progress `t` in [0, 1] through the curve.
    /// Inputs outside the unit range are clamped first.
    pub fn apply(self, t: Fixed64) -> Fixed64 {
        let t = t.clamp(Fixed64::ZERO, Fixed64::ONE);
        match self {
            Easing::Linear => t,
            Easing::SmoothStep => {
                // t^2 * (3 - 2t)
                let three = Fixed64::from_num(3);
                let two = Fixed64::from_num(2);
                t * t * (three - two * t)
            }
            Easing::EaseOutCubic => {
                // 1 - (1 - t)^3
                let inv = Fixed64::ONE - t;
                Fixed64::ONE - inv * inv * inv
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tween tasks
// ---------------------------------------------------------------------------

/// One in-flight interpolation.
#[derive(Debug, Clone, PartialEq)]
struct Tween {
    target: InstanceId,
    start: Position,
    end: Position,
    elapsed: Seconds,
    duration: Seconds,
    easing: Easing,
}

/// A position update produced by [`TweenSet::advance`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TweenUpdate {
    pub task: TaskId,
    pub target: InstanceId,
    pub pos: Position,
    /// True when the task reached its end position this step and was removed.
    pub finished: bool,
}

/// Pool of active interpolation tasks.
#[derive(Debug, Default)]
pub struct TweenSet {
    tasks: SlotMap<TaskId, Tween>,
    /// Task ids in start order. Updates are emitted in this order.
    order: Vec<TaskId>,
}

impl TweenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new interpolation. A non-positive duration completes on the
    /// next [`advance`](Self::advance) call, snapping straight to the end.
    pub fn start(
        &mut self,
        target: InstanceId,
        start: Position,
        end: Position,
        duration: Seconds,
        easing: Easing,
    ) -> TaskId {
        let task = self.tasks.insert(Tween {
            target,
            start,
            end,
            elapsed: Seconds::ZERO,
            duration,
            easing,
        });
        self.order.push(task);
        task
    }

    /// Cancel a single task. Returns false if it was not active.
    pub fn cancel(&mut self, task: TaskId) -> bool {
        if self.tasks.remove(task).is_none() {
            return false;
        }
        self.order.retain(|t| *t != task);
        true
    }

    /// Cancel every task driving the given instance. Used when the
    /// instance is despawned mid-flight.
    pub fn cancel_for(&mut self, target: InstanceId) {
        self.order.retain(|task| {
            let keep = self
                .tasks
                .get(*task)
                .map(|t| t.target != target)
                .unwrap_or(false);
            if !keep {
                self.tasks.remove(*task);
            }
            keep
        });
    }

    pub fn is_active(&self, task: TaskId) -> bool {
        self.tasks.contains_key(task)
    }

    pub fn target_of(&self, task: TaskId) -> Option<InstanceId> {
        self.tasks.get(task).map(|t| t.target)
    }

    /// Active tasks and their targets, in start order.
    pub fn iter(&self) -> impl Iterator<Item = (TaskId, InstanceId)> + '_ {
        self.order
            .iter()
            .filter_map(|id| self.tasks.get(*id).map(|t| (*id, t.target)))
    }

    pub fn active_count(&self) -> usize {
        self.order.len()
    }

    /// Advance all tasks by `dt` and collect position updates in start
    /// order. Finished tasks are removed from the set.
    #[must_use]
    pub fn advance(&mut self, dt: Seconds) -> Vec<TweenUpdate> {
        let mut updates = Vec::with_capacity(self.order.len());

        for task in &self.order {
            let Some(tween) = self.tasks.get_mut(*task) else {
                continue;
            };

            tween.elapsed += dt;

            let finished = tween.duration <= Seconds::ZERO || tween.elapsed >= tween.duration;
            let pos = if finished {
                tween.end
            } else {
                let t = ratio_or_zero(tween.elapsed, tween.duration);
                tween.start.lerp(tween.end, tween.easing.apply(t))
            };

            updates.push(TweenUpdate {
                task: *task,
                target: tween.target,
                pos,
                finished,
            });
        }

        for update in &updates {
            if update.finished {
                self.tasks.remove(update.task);
            }
        }
        self.order.retain(|task| self.tasks.contains_key(*task));

        updates
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::{f64_to_fixed64, fixed64_to_f64, secs};
    use slotmap::SlotMap;

    fn make_instance_id() -> InstanceId {
        // Mint from one shared map: a fresh SlotMap would hand back the
        // same key on every call, and these tests need distinct instances.
        use std::cell::RefCell;
        thread_local! {
            static IDS: RefCell<SlotMap<InstanceId, ()>> =
                RefCell::new(SlotMap::with_key());
        }
        IDS.with(|ids| ids.borrow_mut().insert(()))
    }

    fn pos(x: f64, y: f64) -> Position {
        Position::new(f64_to_fixed64(x), f64_to_fixed64(y))
    }

    // -----------------------------------------------------------------------
    // Easing curves
    // -----------------------------------------------------------------------

    // 1. Linear easing is the identity on [0, 1].
    #[test]
    fn linear_is_identity() {
        for v in [0.0, 0.25, 0.5, 0.75, 1.0] {
            let t = f64_to_fixed64(v);
            assert_eq!(Easing::Linear.apply(t), t);
        }
    }

    // 2. All curves hit exactly 0 at t=0 and 1 at t=1.
    #[test]
    fn curves_pin_endpoints() {
        for easing in [Easing::Linear, Easing::SmoothStep, Easing::EaseOutCubic] {
            assert_eq!(easing.apply(Fixed64::ZERO), Fixed64::ZERO);
            assert_eq!(easing.apply(Fixed64::ONE), Fixed64::ONE);
        }
    }

    // 3. SmoothStep crosses 0.5 at the midpoint.
    #[test]
    fn smoothstep_midpoint() {
        let half = f64_to_fixed64(0.5);
        let out = Easing::SmoothStep.apply(half);
        assert!((fixed64_to_f64(out) - 0.5).abs() < 1e-6);
    }

    // 4. EaseOutCubic is ahead of linear in the middle.
    #[test]
    fn ease_out_cubic_leads_linear() {
        let half = f64_to_fixed64(0.5);
        let out = Easing::EaseOutCubic.apply(half);
        // 1 - 0.5^3 = 0.875
        assert!((fixed64_to_f64(out) - 0.875).abs() < 1e-6);
        assert!(out > half);
    }

    // 5. Inputs outside [0, 1] are clamped.
    #[test]
    fn easing_clamps_input() {
        let over = f64_to_fixed64(1.5);
        let under = f64_to_fixed64(-0.5);
        for easing in [Easing::Linear, Easing::SmoothStep, Easing::EaseOutCubic] {
            assert_eq!(easing.apply(over), Fixed64::ONE);
            assert_eq!(easing.apply(under), Fixed64::ZERO);
        }
    }

    // -----------------------------------------------------------------------
    // TweenSet lifecycle
    // -----------------------------------------------------------------------

    // 6. A tween reaches its end exactly at the duration and is removed.
    #[test]
    fn tween_finishes_at_duration() {
        let mut set = TweenSet::new();
        let target = make_instance_id();
        let end = pos(10.0, 0.0);

        let task = set.start(target, pos(0.0, 0.0), end, secs(2), Easing::Linear);
        assert!(set.is_active(task));

        let step = set.advance(secs(1));
        assert_eq!(step.len(), 1);
        assert!(!step[0].finished);
        assert!((fixed64_to_f64(step[0].pos.x) - 5.0).abs() < 1e-6);

        let step = set.advance(secs(1));
        assert_eq!(step.len(), 1);
        assert!(step[0].finished);
        assert_eq!(step[0].pos, end);
        assert!(!set.is_active(task));
        assert_eq!(set.active_count(), 0);
    }

    // 7. Overshooting the duration still lands exactly on the end position.
    #[test]
    fn overshoot_snaps_to_end() {
        let mut set = TweenSet::new();
        let target = make_instance_id();
        let end = pos(4.0, -4.0);

        set.start(target, pos(0.0, 0.0), end, secs(1), Easing::SmoothStep);
        let step = set.advance(secs(100));
        assert!(step[0].finished);
        assert_eq!(step[0].pos, end);
    }

    // 8. Zero duration completes on the first advance.
    #[test]
    fn zero_duration_is_instant() {
        let mut set = TweenSet::new();
        let target = make_instance_id();
        let end = pos(1.0, 1.0);

        set.start(target, pos(0.0, 0.0), end, Seconds::ZERO, Easing::Linear);
        let step = set.advance(secs(1));
        assert!(step[0].finished);
        assert_eq!(step[0].pos, end);
    }

    // 9. cancel removes one task, cancel_for removes all tasks of a target.
    #[test]
    fn cancel_and_cancel_for() {
        let mut set = TweenSet::new();
        let a = make_instance_id();
        let b = make_instance_id();

        let t1 = set.start(a, pos(0.0, 0.0), pos(1.0, 0.0), secs(5), Easing::Linear);
        let t2 = set.start(a, pos(0.0, 0.0), pos(2.0, 0.0), secs(5), Easing::Linear);
        let t3 = set.start(b, pos(0.0, 0.0), pos(3.0, 0.0), secs(5), Easing::Linear);

        assert!(set.cancel(t1));
        assert!(!set.cancel(t1));
        assert_eq!(set.active_count(), 2);

        set.cancel_for(a);
        assert!(!set.is_active(t2));
        assert!(set.is_active(t3));
        assert_eq!(set.active_count(), 1);
    }

    // 10. Updates come out in start order.
    #[test]
    fn updates_in_start_order() {
        let mut set = TweenSet::new();
        let a = make_instance_id();
        let b = make_instance_id();

        let t1 = set.start(a, pos(0.0, 0.0), pos(1.0, 0.0), secs(10), Easing::Linear);
        let t2 = set.start(b, pos(0.0, 0.0), pos(1.0, 0.0), secs(10), Easing::Linear);

        let step = set.advance(secs(1));
        assert_eq!(step[0].task, t1);
        assert_eq!(step[1].task, t2);
    }

    // 11. target_of reports the driven instance.
    #[test]
    fn target_of_reports_instance() {
        let mut set = TweenSet::new();
        let a = make_instance_id();
        let task = set.start(a, pos(0.0, 0.0), pos(1.0, 0.0), secs(1), Easing::Linear);
        assert_eq!(set.target_of(task), Some(a));
    }
}
