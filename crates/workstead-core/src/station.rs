//! Station configuration and runtime state.
//!
//! A station converts consumed resource kinds into produced kinds under
//! independently configured production and consumption triggers. The
//! immutable [`StationConfig`] lives in the catalog; the mutable
//! [`StationState`] lives in the [`StationRegistry`] arena and holds the
//! labor set, timers, decay counter, and one-tick flags.
//!
//! This module owns the per-station mechanics: labor accounting, timer
//! catch-up, aging stages, the upgrade countdown. Cross-cutting effects
//! (area consumption, instance spawning, ledger credit) are orchestrated
//! by the world tick, which calls into these methods.

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::fixed::{Fixed64, Position, Seconds, ratio_or_zero};
use crate::id::{AgentId, AreaId, KindId, LootTableId, StationConfigId, StationId};
use crate::stock::Stockpile;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// A resource kind with a quantity, used for consumption requirements and
/// production outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindAmount {
    pub kind: KindId,
    pub amount: u32,
}

/// When production or consumption fires. Configured independently for each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TriggerPolicy {
    /// Never fires.
    #[default]
    None,
    /// Fires on a fixed interval.
    Automatic,
    /// Fires when a labor cycle completes.
    WhenWorked,
    /// Production only: fires immediately after this station's own
    /// consumption succeeded in the same tick.
    WhenResourcesConsumed,
    /// Consumption only: fires on the decay cycle; an unmet cycle
    /// increments the decay counter instead.
    Cycle,
}

/// What a successful production fire creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ProductionMode {
    /// Spawn the configured output kinds as resource instances and credit
    /// the station ledger.
    #[default]
    Resource,
    /// Erect successor stations at the output location. Does not touch the
    /// resource ledger.
    Station { successors: Vec<StationConfigId> },
    /// Draw one weighted entry from a loot table; spawns and ledger updates
    /// mirror the `Resource` case.
    LootTable { table: LootTableId },
}

/// Purely observational age progression. The stage advances on a fixed
/// cadence and never gates production or consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgingConfig {
    /// Seconds between stage advances.
    pub cadence: Seconds,
    /// Number of stages. The stage index stops at `stages - 1`.
    pub stages: u32,
}

/// Replacement armed by a successful consumption. One-shot and irreversible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeConfig {
    pub target: StationConfigId,
    /// Countdown between the arming consumption and the swap.
    pub delay: Seconds,
}

/// Immutable per-station authoring data. Registered in the catalog; runtime
/// state lives in [`StationState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationConfig {
    pub name: String,

    /// Input requirements, removed from the input area on consumption.
    pub consumed: Vec<KindAmount>,
    /// Outputs created on production.
    pub produced: Vec<KindAmount>,

    pub production_trigger: TriggerPolicy,
    pub consumption_trigger: TriggerPolicy,
    pub production_mode: ProductionMode,

    /// Labor threshold for `WhenWorked` triggers.
    pub work_duration: Seconds,
    /// Period for `Automatic` production.
    pub production_interval: Seconds,
    /// Period for `Automatic` consumption.
    pub consumption_interval: Seconds,
    /// Period of the decay cycle for `Cycle` consumption.
    pub cycle_interval: Seconds,
    /// Failed decay cycles tolerated before the station dies.
    pub max_decay: u32,

    /// Die immediately after the first successful production.
    pub single_use: bool,
    /// Spawn produced kinds as world instances. When false, production only
    /// books into the station ledger.
    pub spawn_instances: bool,
    /// Scatter radius for spawns when the station has no output area.
    pub scatter_radius: Fixed64,

    /// Capital credited to the global ledger (and the current worker) per
    /// successful production fire.
    pub production_capital: i64,
    /// Capital deducted from the global ledger (and the responsible agent)
    /// per successful consumption fire.
    pub consumption_capital: i64,

    /// Report production/consumption to the goal orchestrator.
    pub goal_contributor: bool,

    /// Create an input containment area when the station is erected. The
    /// area's requirements come from `consumed`.
    pub has_input_area: bool,
    /// Create an output containment area when the station is erected.
    pub has_output_area: bool,

    pub aging: Option<AgingConfig>,
    /// Present means a successful consumption arms the upgrade countdown.
    pub upgrade: Option<UpgradeConfig>,
}

impl StationConfig {
    /// A named config with inert defaults: no kinds, `None` triggers,
    /// `Resource` mode, all timings zero.
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            consumed: Vec::new(),
            produced: Vec::new(),
            production_trigger: TriggerPolicy::None,
            consumption_trigger: TriggerPolicy::None,
            production_mode: ProductionMode::Resource,
            work_duration: Seconds::ZERO,
            production_interval: Seconds::ZERO,
            consumption_interval: Seconds::ZERO,
            cycle_interval: Seconds::ZERO,
            max_decay: 3,
            single_use: false,
            spawn_instances: true,
            scatter_radius: Fixed64::ZERO,
            production_capital: 0,
            consumption_capital: 0,
            goal_contributor: false,
            has_input_area: false,
            has_output_area: false,
            aging: None,
            upgrade: None,
        }
    }

    /// Successor configs erected by `Station` production mode. Empty for
    /// other modes.
    pub fn successors(&self) -> impl Iterator<Item = StationConfigId> + '_ {
        match &self.production_mode {
            ProductionMode::Station { successors } => successors.as_slice(),
            _ => &[],
        }
        .iter()
        .copied()
    }

    /// The loot table drawn by `LootTable` production mode.
    pub fn loot_table(&self) -> Option<LootTableId> {
        match &self.production_mode {
            ProductionMode::LootTable { table } => Some(*table),
            _ => None,
        }
    }

    /// First produced kind, the one reported as a goal contribution.
    pub fn first_produced_kind(&self) -> Option<KindId> {
        self.produced.first().map(|entry| entry.kind)
    }

    /// First consumed kind, the one reported as a goal contribution.
    pub fn first_consumed_kind(&self) -> Option<KindId> {
        self.consumed.first().map(|entry| entry.kind)
    }
}

// ---------------------------------------------------------------------------
// Runtime state
// ---------------------------------------------------------------------------

/// Mutable per-station runtime state.
#[derive(Debug, Clone)]
pub struct StationState {
    pub config: StationConfigId,
    pub pos: Position,

    /// False is terminal. No production or consumption after death.
    pub alive: bool,
    /// Total alive time.
    pub age: Seconds,
    /// Aging stage index, advanced by [`advance_aging`](Self::advance_aging).
    pub stage: u32,
    /// Failed decay cycles so far.
    pub decay: u32,
    /// Labor accumulated toward `work_duration`. Resets on completion and
    /// when the worker set empties.
    pub work_progress: Seconds,

    /// Input containment area, if any.
    pub input_area: Option<AreaId>,
    /// Output containment area, if any.
    pub output_area: Option<AreaId>,

    /// Non-spatial resource bookkeeping for this station.
    pub ledger: Stockpile,

    /// Agent charged for `Automatic` consumption.
    pub owner: Option<AgentId>,

    pub is_inspected: bool,

    /// Distinct agents currently contributing labor, in arrival order. The
    /// first entry is the current worker for credit purposes.
    workers: Vec<AgentId>,

    production_timer: Seconds,
    consumption_timer: Seconds,
    cycle_timer: Seconds,
    aging_timer: Seconds,

    /// Armed by a successful consumption when the config has an upgrade.
    upgrade_countdown: Option<Seconds>,

    // One-tick flags, cleared by `clear_tick_flags`.
    work_completed: bool,
    consumed_this_tick: bool,
}

impl StationState {
    pub fn new(config: StationConfigId, pos: Position) -> Self {
        Self {
            config,
            pos,
            alive: true,
            age: Seconds::ZERO,
            stage: 0,
            decay: 0,
            work_progress: Seconds::ZERO,
            input_area: None,
            output_area: None,
            ledger: Stockpile::new(),
            owner: None,
            is_inspected: false,
            workers: Vec::new(),
            production_timer: Seconds::ZERO,
            consumption_timer: Seconds::ZERO,
            cycle_timer: Seconds::ZERO,
            aging_timer: Seconds::ZERO,
            upgrade_countdown: None,
            work_completed: false,
            consumed_this_tick: false,
        }
    }

    // -- Labor ------------------------------------------------------------

    /// Add an agent to the worker set. Returns false if already present.
    /// Requirement gating happens in the world before this is called.
    pub fn begin_labor(&mut self, agent: AgentId) -> bool {
        if self.workers.contains(&agent) {
            return false;
        }
        self.workers.push(agent);
        true
    }

    /// Remove an agent from the worker set. When the set empties, accrued
    /// work is lost. Returns false if the agent was not working here.
    pub fn end_labor(&mut self, agent: AgentId) -> bool {
        let Some(idx) = self.workers.iter().position(|w| *w == agent) else {
            return false;
        };
        self.workers.remove(idx);
        if self.workers.is_empty() {
            self.work_progress = Seconds::ZERO;
        }
        true
    }

    /// Detach every worker at once, losing accrued progress. The death
    /// path uses this so a dead station never holds a worker set.
    pub fn drain_workers(&mut self) -> Vec<AgentId> {
        self.work_progress = Seconds::ZERO;
        std::mem::take(&mut self.workers)
    }

    pub fn is_being_worked(&self) -> bool {
        !self.workers.is_empty()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn workers(&self) -> &[AgentId] {
        &self.workers
    }

    /// The earliest-arrived agent still present. Capital credit goes here.
    pub fn current_worker(&self) -> Option<AgentId> {
        self.workers.first().copied()
    }

    /// Advance labor. Parallel workers speed completion linearly. On
    /// crossing the threshold, progress resets to zero, the one-tick
    /// completion flag is set, and this returns true.
    pub fn advance_work(&mut self, dt: Seconds, work_duration: Seconds) -> bool {
        if self.workers.is_empty() || work_duration <= Seconds::ZERO {
            return false;
        }
        let scale = Fixed64::from_num(self.workers.len() as i64);
        self.work_progress += dt * scale;
        if self.work_progress >= work_duration {
            self.work_progress = Seconds::ZERO;
            self.work_completed = true;
            return true;
        }
        false
    }

    /// Labor completion ratio in [0, 1] for progress displays.
    pub fn work_ratio(&self, work_duration: Seconds) -> Fixed64 {
        ratio_or_zero(self.work_progress, work_duration)
    }

    // -- Timers -----------------------------------------------------------

    /// Advance the automatic production timer. Returns the number of
    /// interval boundaries crossed (catch-up on a long tick).
    pub fn advance_production_timer(&mut self, dt: Seconds, interval: Seconds) -> u32 {
        Self::advance_timer(&mut self.production_timer, dt, interval)
    }

    /// Advance the automatic consumption timer.
    pub fn advance_consumption_timer(&mut self, dt: Seconds, interval: Seconds) -> u32 {
        Self::advance_timer(&mut self.consumption_timer, dt, interval)
    }

    /// Advance the decay cycle timer.
    pub fn advance_cycle_timer(&mut self, dt: Seconds, interval: Seconds) -> u32 {
        Self::advance_timer(&mut self.cycle_timer, dt, interval)
    }

    fn advance_timer(timer: &mut Seconds, dt: Seconds, interval: Seconds) -> u32 {
        if interval <= Seconds::ZERO {
            return 0;
        }
        *timer += dt;
        let mut boundaries = 0;
        while *timer >= interval {
            *timer -= interval;
            boundaries += 1;
        }
        boundaries
    }

    // -- Decay ------------------------------------------------------------

    /// Record a failed decay cycle. Returns true when the counter reaches
    /// the cap and the station dies.
    pub fn record_decay_failure(&mut self, max_decay: u32) -> bool {
        self.decay = self.decay.saturating_add(1);
        if self.decay >= max_decay {
            self.kill();
            return true;
        }
        false
    }

    /// Terminal. Idempotent; a dead station never comes back.
    pub fn kill(&mut self) {
        self.alive = false;
    }

    // -- Aging ------------------------------------------------------------

    /// Advance the aging cadence. Returns the number of stages gained this
    /// tick; the stage index stops at `stages - 1`.
    pub fn advance_aging(&mut self, dt: Seconds, aging: &AgingConfig) -> u32 {
        if aging.cadence <= Seconds::ZERO {
            return 0;
        }
        self.aging_timer += dt;
        let mut gained = 0;
        while self.aging_timer >= aging.cadence {
            self.aging_timer -= aging.cadence;
            if self.stage + 1 < aging.stages {
                self.stage += 1;
                gained += 1;
            }
        }
        gained
    }

    // -- Upgrade ----------------------------------------------------------

    /// Arm the upgrade countdown. One-shot: re-arming while armed is a no-op.
    pub fn arm_upgrade(&mut self, delay: Seconds) {
        if self.upgrade_countdown.is_none() {
            self.upgrade_countdown = Some(delay);
        }
    }

    pub fn upgrade_armed(&self) -> bool {
        self.upgrade_countdown.is_some()
    }

    /// Advance an armed countdown. Returns true exactly once, when it
    /// reaches zero.
    pub fn advance_upgrade(&mut self, dt: Seconds) -> bool {
        let Some(remaining) = self.upgrade_countdown else {
            return false;
        };
        let remaining = remaining - dt;
        if remaining <= Seconds::ZERO {
            self.upgrade_countdown = None;
            return true;
        }
        self.upgrade_countdown = Some(remaining);
        false
    }

    // -- One-tick flags ---------------------------------------------------

    pub fn work_completed_this_tick(&self) -> bool {
        self.work_completed
    }

    pub fn mark_consumed_this_tick(&mut self) {
        self.consumed_this_tick = true;
    }

    pub fn consumed_this_tick(&self) -> bool {
        self.consumed_this_tick
    }

    /// Clear the one-tick flags. Called at the end of the station's tick.
    pub fn clear_tick_flags(&mut self) {
        self.work_completed = false;
        self.consumed_this_tick = false;
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Arena of live stations. Ticks and queries walk stations in registration
/// order, which keeps results independent of hash state.
#[derive(Debug, Default)]
pub struct StationRegistry {
    stations: SlotMap<StationId, StationState>,
    order: Vec<StationId>,
}

impl StationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, state: StationState) -> StationId {
        let id = self.stations.insert(state);
        self.order.push(id);
        id
    }

    pub fn remove(&mut self, id: StationId) -> Option<StationState> {
        let state = self.stations.remove(id)?;
        self.order.retain(|s| *s != id);
        Some(state)
    }

    pub fn get(&self, id: StationId) -> Option<&StationState> {
        self.stations.get(id)
    }

    pub fn get_mut(&mut self, id: StationId) -> Option<&mut StationState> {
        self.stations.get_mut(id)
    }

    pub fn contains(&self, id: StationId) -> bool {
        self.stations.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Station ids in registration order. Cloned so the caller can mutate
    /// stations while walking.
    pub fn ids_ordered(&self) -> Vec<StationId> {
        self.order.clone()
    }

    /// Iterate stations in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (StationId, &StationState)> + '_ {
        self.order
            .iter()
            .filter_map(|id| self.stations.get(*id).map(|s| (*id, s)))
    }
}

// ===========================================================================
// Tests
// ===========================================================================
