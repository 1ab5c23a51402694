//! Goal tracking and level orchestration for the Workstead simulation core.
//!
//! Time-boxed goals race a countdown against a resource target; the level
//! director schedules which goals are active and drives the session from
//! level to level.
//!
//! # Overview
//!
//! [`GoalTemplate`]s are authored per level inside a [`LevelPlan`]. At
//! runtime the [`LevelDirector`] owns the plans: [`LevelDirector::start`]
//! begins the first level, and one [`LevelDirector::advance`] call per frame
//! (after `World::advance`) drains station contributions, ticks the active
//! [`GoalRuntime`]s, retires completed and failed goals against the world
//! ledger, and releases new goals on the plan's schedule. Completions,
//! failures, and level transitions surface as [`GoalEvent`]s drained with
//! [`LevelDirector::drain_events`].
//!
//! # Release Policies
//!
//! - **Sequential**: templates release in list order, one per interval,
//!   until the list is spent; the level completes (after a short delay) once
//!   every template has been released and no goal remains active.
//! - **RandomInterval**: templates draw uniformly from the pool on the
//!   interval while under the active-goal cap; the pool never exhausts, so
//!   only the level countdown ends the level.
//!
//! Best scores persist through the [`ScoreStore`] boundary; the shipped
//! [`MemoryScoreStore`] backs tests, the embedding layer provides the
//! durable one.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use workstead_core::fixed::{Fixed64, Frames, Seconds};
use workstead_core::id::KindId;
use workstead_core::world::{Contribution, World};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Identifies one released goal instance for its whole life. Never reused
/// within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GoalId(pub u64);

/// Index of a goal template within the current level's template list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GoalTemplateId(pub u32);

// ---------------------------------------------------------------------------
// Goal templates
// ---------------------------------------------------------------------------

/// An authored goal. Immutable; released goals copy their working values
/// out of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalTemplate {
    /// Human-readable name, shown by the UI layer.
    pub name: String,

    /// The resource kind this goal watches.
    pub target_kind: KindId,

    /// Live instances of the target kind needed for the count check.
    pub required_count: u32,

    /// Time allowed before the goal fails.
    pub time_limit: Seconds,

    /// Capital credited to the global ledger on completion.
    pub reward: i64,

    /// Capital debited from the global ledger on failure. Stored positive.
    pub penalty: i64,
}

// ---------------------------------------------------------------------------
// Goal runtime
// ---------------------------------------------------------------------------

/// Where a goal is in its life. `Completed` and `Failed` are terminal:
/// no call moves a goal out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoalState {
    Active,
    Completed,
    Failed,
}

/// A live goal released from a template.
///
/// The state field is private so the terminal invariant holds by
/// construction: only [`GoalRuntime::advance`] and
/// [`GoalRuntime::contribute`] transition it, and both guard on `Active`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalRuntime {
    pub id: GoalId,
    pub template: GoalTemplateId,
    pub target_kind: KindId,
    pub required_count: u32,
    pub total_time: Seconds,
    pub remaining_time: Seconds,
    pub reward: i64,
    pub penalty: i64,
    state: GoalState,
}

impl GoalRuntime {
    /// Release a goal from a template.
    pub fn from_template(id: GoalId, template: GoalTemplateId, def: &GoalTemplate) -> Self {
        Self {
            id,
            template,
            target_kind: def.target_kind,
            required_count: def.required_count,
            total_time: def.time_limit,
            remaining_time: def.time_limit,
            reward: def.reward,
            penalty: def.penalty,
            state: GoalState::Active,
        }
    }

    pub fn state(&self) -> GoalState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state != GoalState::Active
    }

    /// One tick: burn `dt` off the clock, then resolve. The count check
    /// runs before the timeout check, so a goal that reaches its count on
    /// the deadline tick completes rather than fails. Terminal goals are
    /// frozen; this is a no-op for them.
    pub fn advance(&mut self, dt: Seconds, observed: u32) {
        if self.state != GoalState::Active {
            return;
        }
        self.remaining_time = (self.remaining_time - dt).max(Seconds::ZERO);
        if observed >= self.required_count {
            self.state = GoalState::Completed;
        } else if self.remaining_time <= Seconds::ZERO {
            self.state = GoalState::Failed;
        }
    }

    /// Direct completion from a station contribution of a matching kind,
    /// bypassing the count check. Returns whether the goal completed.
    pub fn contribute(&mut self, kind: KindId) -> bool {
        if self.state != GoalState::Active || kind != self.target_kind {
            return false;
        }
        self.state = GoalState::Completed;
        true
    }

    /// Fraction of the time budget still left, in [0, 1]. The UI color
    /// ramp reads this.
    pub fn time_ratio(&self) -> Fixed64 {
        if self.total_time <= Seconds::ZERO {
            return Fixed64::ZERO;
        }
        self.remaining_time / self.total_time
    }
}

// ---------------------------------------------------------------------------
// Level plans
// ---------------------------------------------------------------------------

/// How a level picks the next goal to release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReleasePolicy {
    /// Release templates in list order, one per interval, until the list
    /// is spent.
    Sequential,

    /// Release a uniformly-random template from the pool on each interval
    /// while under the active cap. The draw comes from the world's RNG
    /// stream, so seeded sessions replay identically.
    RandomInterval,
}

/// One authored level: its goal templates and scheduling knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelPlan {
    pub name: String,
    pub policy: ReleasePolicy,
    pub templates: Vec<GoalTemplate>,

    /// Minimum time between scheduled releases. Zero releases as fast as
    /// one goal per tick.
    pub release_interval: Seconds,

    /// Cap on simultaneously active goals. Scheduled releases hold while
    /// the floor is full and fire as soon as a slot frees.
    pub max_active_goals: usize,

    /// Level-wide countdown that forces the level to end when it reaches
    /// zero, regardless of goal state. None runs without a countdown.
    pub countdown: Option<Seconds>,

    /// Pause between the level's last goal resolving and the level being
    /// marked complete.
    pub completion_delay: Seconds,

    /// Suppress scheduled releases; goals only enter play through
    /// [`LevelDirector::release_next`]. External scripting uses this.
    pub manual_release: bool,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Notifications the director emits for the embedding layer (UI, audio).
/// Drained with [`LevelDirector::drain_events`]; not delivered through the
/// core event bus, which stays inside the world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoalEvent {
    GoalStarted {
        goal: GoalId,
        template: GoalTemplateId,
        frame: Frames,
    },
    GoalCompleted {
        goal: GoalId,
        template: GoalTemplateId,
        reward: i64,
        frame: Frames,
    },
    GoalFailed {
        goal: GoalId,
        template: GoalTemplateId,
        penalty: i64,
        frame: Frames,
    },
    LevelStarted {
        level: usize,
        frame: Frames,
    },
    LevelCompleted {
        level: usize,
        /// Global capital at the moment the level was marked complete.
        score: i64,
        new_best: bool,
        frame: Frames,
    },
    AllLevelsComplete {
        frame: Frames,
    },
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Construction-time errors. Once running, the director degrades quietly
/// per the world's error policy instead of returning errors.
#[derive(Debug, thiserror::Error)]
pub enum DirectorError {
    #[error("no level plans configured")]
    NoLevels,

    #[error("level {0} has no goal templates")]
    EmptyLevel(usize),
}

// ---------------------------------------------------------------------------
// Score store
// ---------------------------------------------------------------------------

/// Persistence boundary for per-level best scores. The director reads the
/// stored best when a level ends and writes through immediately on
/// improvement; storage format and location belong to the implementor.
pub trait ScoreStore: fmt::Debug {
    /// Stored best score for a level slot, if any.
    fn best_score(&self, level: usize) -> Option<i64>;

    /// Overwrite the stored score for a level slot.
    fn record_score(&mut self, level: usize, score: i64);
}

/// In-memory score store. Backs tests and sessions without persistence.
#[derive(Debug, Clone, Default)]
pub struct MemoryScoreStore {
    scores: HashMap<usize, i64>,
}

impl MemoryScoreStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScoreStore for MemoryScoreStore {
    fn best_score(&self, level: usize) -> Option<i64> {
        self.scores.get(&level).copied()
    }

    fn record_score(&mut self, level: usize, score: i64) {
        self.scores.insert(level, score);
    }
}

// ---------------------------------------------------------------------------
// Session phase
// ---------------------------------------------------------------------------

/// Coarse session state, for menu flow in the embedding layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    /// Constructed, not yet started.
    Idle,

    /// A level is in play.
    LevelRunning,

    /// The completion delay between a level ending and the next starting.
    BetweenLevels,

    /// Every configured level has been completed. Terminal.
    AllLevelsComplete,
}

// ---------------------------------------------------------------------------
// LevelDirector
// ---------------------------------------------------------------------------

/// The goal/level orchestrator.
///
/// Owns the level plans, the active goal set (activation-ordered), the
/// per-level scheduling timers, and the score store. Composes above the
/// world: the embedding loop calls `World::advance` then
/// [`LevelDirector::advance`] each frame.
#[derive(Debug)]
pub struct LevelDirector {
    levels: Vec<LevelPlan>,
    level_index: usize,
    phase: SessionPhase,

    /// Active goals in activation order. Contribution scans and retirement
    /// walk this in order, so "first match wins" is reproducible.
    active: Vec<GoalRuntime>,

    next_goal: u64,

    /// Templates released in the current level. The Sequential cursor.
    released: usize,

    /// Time since the last scheduled release.
    release_timer: Seconds,

    /// Remaining level countdown, when the plan has one.
    countdown: Option<Seconds>,

    /// Running completion delay; Some only while `BetweenLevels`.
    completion_timer: Option<Seconds>,

    scores: Box<dyn ScoreStore>,

    /// Events emitted since the last drain.
    events: Vec<GoalEvent>,
}

impl LevelDirector {
    /// Build a director over a non-empty list of level plans. Every plan
    /// must carry at least one template.
    pub fn new(levels: Vec<LevelPlan>, scores: Box<dyn ScoreStore>) -> Result<Self, DirectorError> {
        if levels.is_empty() {
            return Err(DirectorError::NoLevels);
        }
        for (index, plan) in levels.iter().enumerate() {
            if plan.templates.is_empty() {
                return Err(DirectorError::EmptyLevel(index));
            }
        }
        Ok(Self {
            levels,
            level_index: 0,
            phase: SessionPhase::Idle,
            active: Vec::new(),
            next_goal: 0,
            released: 0,
            release_timer: Seconds::ZERO,
            countdown: None,
            completion_timer: None,
            scores,
            events: Vec::new(),
        })
    }

    // -- Session commands --

    /// Begin the first level. No-op unless the session is `Idle`.
    pub fn start(&mut self, world: &mut World) {
        if self.phase != SessionPhase::Idle {
            return;
        }
        self.level_index = 0;
        self.begin_level(world);
    }

    /// One frame of orchestration. Call after `World::advance` with the
    /// same delta.
    pub fn advance(&mut self, dt: Seconds, world: &mut World) {
        let dt = dt.max(Seconds::ZERO);
        // Drained every frame regardless of phase so the outbox never
        // accrues; out-of-level contributions have nothing to match.
        let contributions = world.drain_contributions();
        match self.phase {
            SessionPhase::LevelRunning => self.advance_running(dt, contributions, world),
            SessionPhase::BetweenLevels => self.advance_between(dt, world),
            SessionPhase::Idle | SessionPhase::AllLevelsComplete => {}
        }
    }

    /// Force the current level to end. Active goals are destroyed without
    /// reward or penalty; the completion delay then runs as usual. No-op
    /// unless a level is running.
    pub fn end_current_level(&mut self) {
        if self.phase != SessionPhase::LevelRunning {
            return;
        }
        self.begin_level_end();
    }

    /// Manually release one goal, honoring the active cap and, for
    /// `Sequential` levels, the list cursor. Works whether or not the plan
    /// suppresses scheduled releases. None when nothing can release.
    pub fn release_next(&mut self, world: &mut World) -> Option<GoalId> {
        if self.phase != SessionPhase::LevelRunning {
            return None;
        }
        self.release_one(world)
    }

    // -- Queries --

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn level_index(&self) -> usize {
        self.level_index
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn current_plan(&self) -> &LevelPlan {
        &self.levels[self.level_index]
    }

    /// Active goals in activation order.
    pub fn active_goals(&self) -> &[GoalRuntime] {
        &self.active
    }

    /// Remaining level countdown, if the current plan has one.
    pub fn countdown_remaining(&self) -> Option<Seconds> {
        self.countdown
    }

    /// Stored best score for a level slot.
    pub fn best_score(&self, level: usize) -> Option<i64> {
        self.scores.best_score(level)
    }

    // -- Event API --

    /// Drain all pending events. Returns events and clears the internal
    /// list.
    pub fn drain_events(&mut self) -> Vec<GoalEvent> {
        std::mem::take(&mut self.events)
    }

    /// Read-only view of pending events.
    pub fn pending_events(&self) -> &[GoalEvent] {
        &self.events
    }

    // -- Snapshots --

    pub fn snapshot(&self) -> DirectorSnapshot {
        DirectorSnapshot {
            phase: self.phase,
            level: self.level_index,
            level_count: self.levels.len(),
            countdown: self.countdown,
            active_goals: self.active.len(),
        }
    }

    /// Owned snapshots of the active goals, with live observed counts.
    pub fn snapshot_goals(&self, world: &World) -> Vec<GoalSnapshot> {
        let plan = &self.levels[self.level_index];
        self.active
            .iter()
            .map(|goal| GoalSnapshot {
                id: goal.id,
                template: goal.template,
                name: plan
                    .templates
                    .get(goal.template.0 as usize)
                    .map(|t| t.name.clone())
                    .unwrap_or_default(),
                state: goal.state(),
                time_ratio: goal.time_ratio(),
                observed: world.count_of(goal.target_kind),
                required: goal.required_count,
            })
            .collect()
    }

    // -- Internal: per-tick phases --

    fn advance_running(&mut self, dt: Seconds, contributions: Vec<Contribution>, world: &mut World) {
        self.apply_contributions(contributions);

        for goal in &mut self.active {
            let observed = world.count_of(goal.target_kind);
            goal.advance(dt, observed);
        }
        self.retire_goals(world);

        self.try_scheduled_release(dt, world);

        // Sequential levels end once the list is spent and the floor is
        // clear.
        let plan = &self.levels[self.level_index];
        if plan.policy == ReleasePolicy::Sequential
            && self.released >= plan.templates.len()
            && self.active.is_empty()
        {
            self.begin_level_end();
            return;
        }

        let countdown_expired = match &mut self.countdown {
            Some(remaining) => {
                *remaining = (*remaining - dt).max(Seconds::ZERO);
                *remaining <= Seconds::ZERO
            }
            None => false,
        };
        if countdown_expired {
            self.begin_level_end();
        }
    }

    fn advance_between(&mut self, dt: Seconds, world: &mut World) {
        let Some(timer) = &mut self.completion_timer else {
            return;
        };
        *timer = (*timer - dt).max(Seconds::ZERO);
        if *timer <= Seconds::ZERO {
            self.finish_level(world);
        }
    }

    /// Match drained contributions against active goals: first matching
    /// active goal wins, in activation order.
    fn apply_contributions(&mut self, contributions: Vec<Contribution>) {
        for contribution in contributions {
            if let Some(goal) = self
                .active
                .iter_mut()
                .find(|g| g.state() == GoalState::Active && g.target_kind == contribution.kind)
            {
                goal.contribute(contribution.kind);
            }
        }
    }

    /// Retire terminal goals: completions credit their reward, failures
    /// debit their penalty, both drop off the active list.
    fn retire_goals(&mut self, world: &mut World) {
        if self.active.iter().all(|goal| !goal.is_terminal()) {
            return;
        }
        let frame = world.frame();
        let mut kept = Vec::with_capacity(self.active.len());
        for goal in self.active.drain(..) {
            match goal.state() {
                GoalState::Active => kept.push(goal),
                GoalState::Completed => {
                    world.adjust_capital(goal.reward);
                    self.events.push(GoalEvent::GoalCompleted {
                        goal: goal.id,
                        template: goal.template,
                        reward: goal.reward,
                        frame,
                    });
                }
                GoalState::Failed => {
                    world.adjust_capital(-goal.penalty);
                    self.events.push(GoalEvent::GoalFailed {
                        goal: goal.id,
                        template: goal.template,
                        penalty: goal.penalty,
                        frame,
                    });
                }
            }
        }
        self.active = kept;
    }

    /// Scheduled release: a count-up timer against the plan interval, one
    /// release per tick at most. The timer only resets when a release
    /// actually happens, so a hold at the cap fires as soon as a slot
    /// frees.
    fn try_scheduled_release(&mut self, dt: Seconds, world: &mut World) {
        let plan = &self.levels[self.level_index];
        if plan.manual_release {
            return;
        }
        let interval = plan.release_interval;
        self.release_timer += dt;
        if self.release_timer < interval {
            return;
        }
        if self.release_one(world).is_some() {
            self.release_timer = Seconds::ZERO;
        }
    }

    /// Release one goal per the plan's policy. None at the cap, past the
    /// end of a Sequential list, or (never in practice) on an empty pool.
    fn release_one(&mut self, world: &mut World) -> Option<GoalId> {
        let plan = &self.levels[self.level_index];
        if self.active.len() >= plan.max_active_goals {
            return None;
        }
        let template_index = match plan.policy {
            ReleasePolicy::Sequential => {
                if self.released >= plan.templates.len() {
                    return None;
                }
                self.released
            }
            ReleasePolicy::RandomInterval => world.rng_mut().pick_index(plan.templates.len())?,
        };
        let def = &plan.templates[template_index];
        let id = GoalId(self.next_goal);
        let template = GoalTemplateId(template_index as u32);
        let runtime = GoalRuntime::from_template(id, template, def);

        self.next_goal += 1;
        self.released += 1;
        self.active.push(runtime);
        self.events.push(GoalEvent::GoalStarted {
            goal: id,
            template,
            frame: world.frame(),
        });
        Some(id)
    }

    /// Enter a level: reset the per-level timers, announce it, and (unless
    /// the plan is manual-release) put the first goal in play immediately
    /// rather than waiting out one interval.
    fn begin_level(&mut self, world: &mut World) {
        self.phase = SessionPhase::LevelRunning;
        self.active.clear();
        self.released = 0;
        self.release_timer = Seconds::ZERO;
        self.countdown = self.levels[self.level_index].countdown;
        self.completion_timer = None;
        self.events.push(GoalEvent::LevelStarted {
            level: self.level_index,
            frame: world.frame(),
        });
        if !self.levels[self.level_index].manual_release {
            let _ = self.release_one(world);
        }
    }

    /// The level's play is over: destroy whatever is still active (no
    /// reward, no penalty) and run the completion delay.
    fn begin_level_end(&mut self) {
        self.active.clear();
        self.countdown = None;
        self.phase = SessionPhase::BetweenLevels;
        self.completion_timer = Some(self.levels[self.level_index].completion_delay);
    }

    /// Mark the level complete: write the score through on improvement,
    /// then start the next level or finish the session.
    fn finish_level(&mut self, world: &mut World) {
        self.completion_timer = None;
        let level = self.level_index;
        let score = world.capital();
        let new_best = match self.scores.best_score(level) {
            Some(best) => score > best,
            None => true,
        };
        if new_best {
            self.scores.record_score(level, score);
        }
        self.events.push(GoalEvent::LevelCompleted {
            level,
            score,
            new_best,
            frame: world.frame(),
        });

        if self.level_index + 1 < self.levels.len() {
            self.level_index += 1;
            self.begin_level(world);
        } else {
            self.phase = SessionPhase::AllLevelsComplete;
            self.events.push(GoalEvent::AllLevelsComplete {
                frame: world.frame(),
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Owned copy of one active goal for the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalSnapshot {
    pub id: GoalId,
    pub template: GoalTemplateId,
    pub name: String,
    pub state: GoalState,
    /// Remaining-time fraction in [0, 1].
    pub time_ratio: Fixed64,
    /// Live instances of the target kind right now.
    pub observed: u32,
    pub required: u32,
}

/// Owned copy of the director's coarse state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectorSnapshot {
    pub phase: SessionPhase,
    pub level: usize,
    pub level_count: usize,
    pub countdown: Option<Seconds>,
    pub active_goals: usize,
}

// ===========================================================================
// Tests
// ===========================================================================
