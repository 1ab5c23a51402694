//! World orchestrator. Owns every subsystem and drives the tick.
//!
//! [`World::advance`] runs a fixed phase order:
//!
//! 1. **Apply queued mutations**: deferred station spawns requested since
//!    the last tick are erected and their handles resolved.
//! 2. **Sweep expired instances**: decay lifespans advance; instances past
//!    their lifespan leave every area and despawn.
//! 3. **Tick stations** in erection order: aging, labor progression,
//!    consumption, production, upgrade countdowns.
//! 4. **Apply interpolations**: pull tweens move instance positions.
//! 5. **Bookkeeping**: buffered events are delivered to passive
//!    subscribers and the state hash is refreshed.
//!
//! Within one station tick, consumption resolves before production so the
//! `WhenResourcesConsumed` trigger can read the same-tick flag. Across
//! stations the only ordering guarantee is erection order.
//!
//! All mutation enters through world commands (spawn, enter/exit, labor,
//! queue). Two worlds fed the same command sequence and the same seed stay
//! bit-identical, which is what the state hash checks.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::area::{Area, EnterOutcome};
use crate::capability::{Capability, CapabilitySet};
use crate::catalog::Catalog;
use crate::event::{DeathCause, Event, EventBus};
use crate::fixed::{Frames, Position, Seconds};
use crate::id::{
    AgentId, AreaId, InstanceId, KindId, LootTableId, PendingStationId, StationConfigId,
    StationId, TaskId,
};
use crate::instance::{InstanceRegistry, ResourceInstance};
use crate::ledger::Ledger;
use crate::query::{AreaSnapshot, LedgerSnapshot, StationSnapshot};
use crate::rng::WorldRng;
use crate::sim::{AdvanceResult, SimClock, StateHash};
use crate::station::{
    KindAmount, ProductionMode, StationConfig, StationRegistry, StationState, TriggerPolicy,
};
use crate::tween::TweenSet;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Command-level failures. Tick-internal faults never surface here; they
/// are logged and the offending operation is skipped for that tick.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WorldError {
    #[error("unknown station {0:?}")]
    UnknownStation(StationId),
    #[error("unknown area {0:?}")]
    UnknownArea(AreaId),
    #[error("unknown instance {0:?}")]
    UnknownInstance(InstanceId),
    #[error("unknown station config {0:?}")]
    UnknownConfig(StationConfigId),
    #[error("station {0:?} is dead")]
    StationDead(StationId),
    #[error("input requirements unmet for station {0:?}")]
    RequirementsUnmet(StationId),
    #[error("agent {1:?} is already working station {0:?}")]
    AlreadyWorking(StationId, AgentId),
    #[error("agent {1:?} is not working station {0:?}")]
    NotWorking(StationId, AgentId),
}

// ---------------------------------------------------------------------------
// Settings and auxiliary types
// ---------------------------------------------------------------------------

/// World construction parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WorldSettings {
    /// Seed for the deterministic RNG (loot draws, scatter offsets).
    pub seed: u64,
    pub initial_capital: i64,
    /// Per-kind event ring buffer capacity.
    pub event_capacity: usize,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            seed: 1,
            initial_capital: 0,
            event_capacity: 1024,
        }
    }
}

/// A goal contribution reported by a flagged station, drained by the level
/// layer once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contribution {
    pub kind: KindId,
    pub frame: Frames,
}

/// A station spawn requested mid-tick, applied at the start of the next.
#[derive(Debug, Clone, Copy)]
struct PendingSpawn {
    pending: PendingStationId,
    config: StationConfigId,
    pos: Position,
    owner: Option<AgentId>,
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// The complete simulation state.
pub struct World {
    catalog: Catalog,
    clock: SimClock,
    rng: WorldRng,

    instances: InstanceRegistry,
    areas: SlotMap<AreaId, Area>,
    /// Area iteration order. SlotMap iteration is not registration order.
    area_order: Vec<AreaId>,
    stations: StationRegistry,
    tweens: TweenSet,
    ledger: Ledger,

    /// Passive event delivery. Public so callers can subscribe, suppress
    /// kinds, and inspect buffers directly.
    pub event_bus: EventBus,

    pending_spawns: Vec<PendingSpawn>,
    next_pending: u64,
    spawn_results: BTreeMap<PendingStationId, StationId>,

    contributions: Vec<Contribution>,

    /// Instances frozen by a locking area. The physics layer polls this.
    locked: BTreeSet<InstanceId>,

    last_state_hash: u64,
}

impl World {
    // -- Construction ------------------------------------------------------

    pub fn new(catalog: Catalog, settings: WorldSettings) -> Self {
        let mut world = Self {
            catalog,
            clock: SimClock::new(),
            rng: WorldRng::new(settings.seed),
            instances: InstanceRegistry::new(),
            areas: SlotMap::with_key(),
            area_order: Vec::new(),
            stations: StationRegistry::new(),
            tweens: TweenSet::new(),
            ledger: Ledger::with_capital(settings.initial_capital),
            event_bus: EventBus::new(settings.event_capacity),
            pending_spawns: Vec::new(),
            next_pending: 0,
            spawn_results: BTreeMap::new(),
            contributions: Vec::new(),
            locked: BTreeSet::new(),
            last_state_hash: 0,
        };
        world.last_state_hash = world.compute_state_hash();
        world
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn frame(&self) -> Frames {
        self.clock.frame
    }

    pub fn time(&self) -> Seconds {
        self.clock.time
    }

    /// The world-owned random stream. External collaborators that need
    /// deterministic draws (goal pool selection) share this stream rather
    /// than seeding their own.
    pub fn rng_mut(&mut self) -> &mut WorldRng {
        &mut self.rng
    }

    // -- Instances ---------------------------------------------------------

    /// Spawn an unowned resource instance.
    pub fn spawn_instance(&mut self, kind: KindId, pos: Position) -> InstanceId {
        self.spawn_instance_at(kind, pos, None)
    }

    /// Spawn a resource instance owned by an agent.
    pub fn spawn_instance_owned(
        &mut self,
        kind: KindId,
        pos: Position,
        owner: AgentId,
    ) -> InstanceId {
        self.spawn_instance_at(kind, pos, Some(owner))
    }

    fn spawn_instance_at(
        &mut self,
        kind: KindId,
        pos: Position,
        owner: Option<AgentId>,
    ) -> InstanceId {
        let id = self.instances.spawn(kind, pos, owner);
        self.event_bus.emit(Event::InstanceSpawned {
            instance: id,
            kind,
            frame: self.clock.frame,
        });
        id
    }

    /// Remove an instance from the world: area memberships, locks, and
    /// in-flight interpolations are all detached. Returns false if the
    /// instance was not present.
    pub fn despawn_instance(&mut self, instance: InstanceId) -> bool {
        if !self.instances.contains(instance) {
            return false;
        }
        let area_ids = self.area_order.clone();
        for area_id in area_ids {
            if let Some(area) = self.areas.get_mut(area_id) {
                area.exit(instance);
            }
        }
        self.locked.remove(&instance);
        self.tweens.cancel_for(instance);
        self.instances.despawn(instance);
        true
    }

    pub fn instance(&self, id: InstanceId) -> Option<&ResourceInstance> {
        self.instances.get(id)
    }

    pub fn count_of(&self, kind: KindId) -> u32 {
        self.instances.count_of(kind)
    }

    pub fn live_instances(&self) -> usize {
        self.instances.live_count()
    }

    /// Every live instance with its record.
    pub fn instances(&self) -> impl Iterator<Item = (InstanceId, &ResourceInstance)> {
        self.instances.iter()
    }

    /// The registry's incremental per-kind counts, in kind order.
    pub fn kind_counts(&self) -> impl Iterator<Item = (KindId, u32)> + '_ {
        self.instances.counts()
    }

    pub fn is_locked(&self, instance: InstanceId) -> bool {
        self.locked.contains(&instance)
    }

    /// Currently locked instances, in id order.
    pub fn locked_instances(&self) -> impl Iterator<Item = InstanceId> + '_ {
        self.locked.iter().copied()
    }

    /// In-flight position interpolations as (task, target) pairs.
    pub fn active_tweens(&self) -> impl Iterator<Item = (TaskId, InstanceId)> + '_ {
        self.tweens.iter()
    }

    // -- Areas -------------------------------------------------------------

    pub fn add_area(&mut self, area: Area) -> AreaId {
        let id = self.areas.insert(area);
        self.area_order.push(id);
        id
    }

    /// Remove an area. Members stay alive; locked members are released.
    pub fn remove_area(&mut self, id: AreaId) -> bool {
        let Some(area) = self.areas.remove(id) else {
            return false;
        };
        for (instance, _) in area.members() {
            self.locked.remove(instance);
        }
        self.area_order.retain(|a| *a != id);
        true
    }

    pub fn area(&self, id: AreaId) -> Option<&Area> {
        self.areas.get(id)
    }

    pub fn area_mut(&mut self, id: AreaId) -> Option<&mut Area> {
        self.areas.get_mut(id)
    }

    pub fn area_ids(&self) -> &[AreaId] {
        &self.area_order
    }

    /// Spatial enter notification from the physics layer. Objects without
    /// the resource capability are ignored, not errors.
    pub fn notify_enter(
        &mut self,
        area: AreaId,
        instance: InstanceId,
        caps: CapabilitySet,
    ) -> Result<EnterOutcome, WorldError> {
        if !self.areas.contains_key(area) {
            return Err(WorldError::UnknownArea(area));
        }
        if !caps.has(Capability::Resource) {
            return Ok(EnterOutcome::Ignored);
        }
        self.route_enter(area, instance)
    }

    /// Spatial exit notification. Returns whether the instance was a
    /// member. Exiting releases any lock and cancels an in-flight pull.
    pub fn notify_exit(
        &mut self,
        area: AreaId,
        instance: InstanceId,
    ) -> Result<bool, WorldError> {
        let Some(a) = self.areas.get_mut(area) else {
            return Err(WorldError::UnknownArea(area));
        };
        let removed = a.exit(instance);
        if removed {
            self.locked.remove(&instance);
            self.tweens.cancel_for(instance);
        }
        Ok(removed)
    }

    /// Add an instance to an area and run the area's decorators: lock,
    /// grid arrangement or pull, then satisfaction notifications and
    /// auto-consumption.
    fn route_enter(
        &mut self,
        area_id: AreaId,
        instance: InstanceId,
    ) -> Result<EnterOutcome, WorldError> {
        let Some(kind) = self.instances.kind_of(instance) else {
            return Err(WorldError::UnknownInstance(instance));
        };
        let Some(area) = self.areas.get_mut(area_id) else {
            return Err(WorldError::UnknownArea(area_id));
        };
        let outcome = area.enter(instance, kind);
        if outcome == EnterOutcome::AlreadyPresent {
            return Ok(outcome);
        }

        // Copy the decorator plan out before touching other subsystems.
        let has_requirements = !area.requirements().is_empty();
        let origin = area.origin;
        let arrange = area.arrange;
        let lock = area.lock_contents;
        let pull = area.pull;
        let auto = area.auto_consume;
        let member_index = area.member_count().saturating_sub(1);

        if lock {
            self.locked.insert(instance);
            self.event_bus.emit(Event::InstanceLocked {
                area: area_id,
                instance,
                frame: self.clock.frame,
            });
        }
        if let Some(grid) = arrange {
            if let Some(inst) = self.instances.get_mut(instance) {
                inst.pos = grid.slot(origin, member_index);
            }
        } else if let Some(pull) = pull
            && (pull.target_kind.is_none() || pull.target_kind == Some(kind))
        {
            let start = self.instances.get(instance).map(|i| i.pos).unwrap_or(origin);
            self.tweens
                .start(instance, start, origin, pull.duration, pull.easing);
        }

        match outcome {
            EnterOutcome::Satisfied => {
                // Output areas have no requirements and stay silent.
                if has_requirements {
                    self.event_bus.emit(Event::AreaSatisfied {
                        area: area_id,
                        frame: self.clock.frame,
                    });
                }
                if auto {
                    self.consume_area_matching(area_id);
                }
            }
            EnterOutcome::Unsatisfied => {
                if has_requirements {
                    self.event_bus.emit(Event::AreaRejected {
                        area: area_id,
                        instance,
                        frame: self.clock.frame,
                    });
                }
            }
            EnterOutcome::AlreadyPresent | EnterOutcome::Ignored => {}
        }
        Ok(outcome)
    }

    /// Take one matching set out of the area and destroy those instances.
    /// Returns None (and does nothing) when requirements are unmet.
    fn consume_area_matching(&mut self, area_id: AreaId) -> Option<Vec<InstanceId>> {
        let taken = self.areas.get_mut(area_id)?.take_matching()?;
        let area_ids = self.area_order.clone();
        for id in &taken {
            let Some(kind) = self.instances.kind_of(*id) else {
                log::warn!("area {area_id:?} held vanished instance {id:?}");
                continue;
            };
            // A consumed instance may straddle other areas; those memberships
            // must not outlive it.
            for other in &area_ids {
                if let Some(area) = self.areas.get_mut(*other) {
                    area.exit(*id);
                }
            }
            self.locked.remove(id);
            self.tweens.cancel_for(*id);
            self.instances.despawn(*id);
            self.event_bus.emit(Event::InstanceConsumed {
                instance: *id,
                kind,
                area: area_id,
                frame: self.clock.frame,
            });
        }
        Some(taken)
    }

    // -- Stations ----------------------------------------------------------

    /// Erect a station immediately. Input/output areas are created at the
    /// station position per the config.
    pub fn erect_station(
        &mut self,
        config: StationConfigId,
        pos: Position,
    ) -> Result<StationId, WorldError> {
        self.erect_station_at(config, pos, None)
    }

    /// Erect a station with an owning agent (charged for `Automatic`
    /// consumption).
    pub fn erect_station_owned(
        &mut self,
        config: StationConfigId,
        pos: Position,
        owner: AgentId,
    ) -> Result<StationId, WorldError> {
        self.erect_station_at(config, pos, Some(owner))
    }

    fn erect_station_at(
        &mut self,
        config: StationConfigId,
        pos: Position,
        owner: Option<AgentId>,
    ) -> Result<StationId, WorldError> {
        let (has_input, has_output, requirements) = {
            let cfg = self
                .catalog
                .station_config(config)
                .ok_or(WorldError::UnknownConfig(config))?;
            (
                cfg.has_input_area,
                cfg.has_output_area,
                expand_requirements(&cfg.consumed),
            )
        };

        let mut state = StationState::new(config, pos);
        state.owner = owner;
        if has_input {
            state.input_area =
                Some(self.add_area(Area::new(pos).with_requirements(requirements)));
        }
        if has_output {
            state.output_area = Some(self.add_area(Area::new(pos)));
        }
        let id = self.stations.add(state);
        self.event_bus.emit(Event::StationErected {
            station: id,
            config,
            frame: self.clock.frame,
        });
        Ok(id)
    }

    /// Queue a station spawn for the start of the next tick. The returned
    /// handle resolves via [`resolve_pending`](Self::resolve_pending) once
    /// applied.
    pub fn queue_station(&mut self, config: StationConfigId, pos: Position) -> PendingStationId {
        let id = PendingStationId(self.next_pending);
        self.next_pending += 1;
        self.pending_spawns.push(PendingSpawn {
            pending: id,
            config,
            pos,
            owner: None,
        });
        id
    }

    pub fn resolve_pending(&self, pending: PendingStationId) -> Option<StationId> {
        self.spawn_results.get(&pending).copied()
    }

    /// Remove a station and its areas. Dead stations stay registered until
    /// removed explicitly; only single-use depletion and upgrades remove
    /// stations on their own.
    pub fn remove_station(&mut self, id: StationId) -> bool {
        if !self.stations.contains(id) {
            return false;
        }
        self.remove_station_internal(id);
        true
    }

    fn remove_station_internal(&mut self, id: StationId) {
        let Some(state) = self.stations.remove(id) else {
            return;
        };
        if let Some(area) = state.input_area {
            self.remove_area(area);
        }
        if let Some(area) = state.output_area {
            self.remove_area(area);
        }
        self.event_bus.emit(Event::StationRemoved {
            station: id,
            frame: self.clock.frame,
        });
    }

    pub fn station(&self, id: StationId) -> Option<&StationState> {
        self.stations.get(id)
    }

    pub fn station_mut(&mut self, id: StationId) -> Option<&mut StationState> {
        self.stations.get_mut(id)
    }

    pub fn stations(&self) -> impl Iterator<Item = (StationId, &StationState)> + '_ {
        self.stations.iter()
    }

    pub fn station_count(&self) -> usize {
        self.stations.len()
    }

    pub fn set_inspected(&mut self, id: StationId, inspected: bool) -> bool {
        let Some(st) = self.stations.get_mut(id) else {
            return false;
        };
        st.is_inspected = inspected;
        true
    }

    /// Fire a station's production once, outside any trigger policy. Used
    /// by scripted sequences and loot testing. Returns whether anything
    /// was produced; dead stations produce nothing.
    pub fn trigger_production(&mut self, station: StationId) -> Result<bool, WorldError> {
        let Some(st) = self.stations.get(station) else {
            return Err(WorldError::UnknownStation(station));
        };
        if !st.alive {
            return Ok(false);
        }
        let config = st.config;
        let Some(cfg) = self.catalog.station_config(config).cloned() else {
            return Err(WorldError::UnknownConfig(config));
        };
        let mut scratch = AdvanceResult::default();
        Ok(self.fire_production(station, &cfg, &mut scratch))
    }

    // -- Labor -------------------------------------------------------------

    /// Begin labor by an agent. Rejected up front when the station's input
    /// requirements are unmet, so labor cannot start and then starve.
    pub fn begin_labor(&mut self, agent: AgentId, station: StationId) -> Result<(), WorldError> {
        let Some(st) = self.stations.get(station) else {
            return Err(WorldError::UnknownStation(station));
        };
        if !st.alive {
            return Err(WorldError::StationDead(station));
        }
        let config = st.config;
        let input_area = st.input_area;
        let needs_inputs = {
            let Some(cfg) = self.catalog.station_config(config) else {
                return Err(WorldError::UnknownConfig(config));
            };
            !cfg.consumed.is_empty()
        };
        if needs_inputs {
            match input_area.and_then(|a| self.areas.get(a)) {
                Some(area) if !area.all_requirements_met() => {
                    self.event_bus.emit(Event::LaborRejected {
                        station,
                        agent,
                        frame: self.clock.frame,
                    });
                    return Err(WorldError::RequirementsUnmet(station));
                }
                Some(_) => {}
                None => {
                    log::warn!(
                        "station {station:?} consumes inputs but has no input area; labor allowed"
                    );
                }
            }
        }
        let Some(st) = self.stations.get_mut(station) else {
            return Err(WorldError::UnknownStation(station));
        };
        if !st.begin_labor(agent) {
            return Err(WorldError::AlreadyWorking(station, agent));
        }
        self.event_bus.emit(Event::LaborStarted {
            station,
            agent,
            frame: self.clock.frame,
        });
        Ok(())
    }

    /// End labor by an agent. Allowed on dead stations so workers detach
    /// during cleanup.
    pub fn end_labor(&mut self, agent: AgentId, station: StationId) -> Result<(), WorldError> {
        let Some(st) = self.stations.get_mut(station) else {
            return Err(WorldError::UnknownStation(station));
        };
        if !st.end_labor(agent) {
            return Err(WorldError::NotWorking(station, agent));
        }
        self.event_bus.emit(Event::LaborStopped {
            station,
            agent,
            frame: self.clock.frame,
        });
        Ok(())
    }

    // -- Capital and contributions ----------------------------------------

    pub fn capital(&self) -> i64 {
        self.ledger.capital()
    }

    pub fn agent_balance(&self, agent: AgentId) -> i64 {
        self.ledger.agent_balance(agent)
    }

    /// Adjust global capital and emit the change. Goal retirement uses
    /// this for rewards and penalties.
    pub fn adjust_capital(&mut self, delta: i64) {
        if delta == 0 {
            return;
        }
        let total = self.ledger.adjust(delta);
        self.event_bus.emit(Event::CapitalChanged {
            amount: delta,
            total,
            frame: self.clock.frame,
        });
    }

    /// Drain goal contributions reported since the last drain. The level
    /// layer calls this once per tick, after [`advance`](Self::advance).
    pub fn drain_contributions(&mut self) -> Vec<Contribution> {
        std::mem::take(&mut self.contributions)
    }

    // -- Tick --------------------------------------------------------------

    /// Advance the world by `dt`. Negative deltas clamp to zero; a zero
    /// delta still runs a full tick (queued mutations apply, events
    /// deliver).
    pub fn advance(&mut self, dt: Seconds) -> AdvanceResult {
        let dt = if dt < Seconds::ZERO { Seconds::ZERO } else { dt };
        self.clock.advance(dt);

        let mut result = AdvanceResult {
            frame: self.clock.frame,
            ..AdvanceResult::default()
        };

        self.phase_apply_queued(&mut result);
        self.phase_sweep_expired(dt, &mut result);
        self.phase_tick_stations(dt, &mut result);
        self.phase_apply_tweens(dt);
        self.phase_bookkeeping();

        result
    }

    pub fn state_hash(&self) -> u64 {
        self.last_state_hash
    }

    fn phase_apply_queued(&mut self, result: &mut AdvanceResult) {
        if self.pending_spawns.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut self.pending_spawns);
        for spawn in pending {
            match self.erect_station_at(spawn.config, spawn.pos, spawn.owner) {
                Ok(id) => {
                    self.spawn_results.insert(spawn.pending, id);
                    result.stations_erected += 1;
                }
                Err(err) => {
                    log::warn!("queued station spawn {:?} failed: {err}", spawn.pending);
                }
            }
        }
    }

    fn phase_sweep_expired(&mut self, dt: Seconds, result: &mut AdvanceResult) {
        let expired = self.instances.advance_ages(dt, &self.catalog);
        if expired.is_empty() {
            return;
        }
        let area_ids = self.area_order.clone();
        for instance in expired {
            let Some(kind) = self.instances.kind_of(instance) else {
                continue;
            };
            for area_id in &area_ids {
                if let Some(area) = self.areas.get_mut(*area_id) {
                    area.exit(instance);
                }
            }
            self.locked.remove(&instance);
            self.tweens.cancel_for(instance);
            self.instances.despawn(instance);
            self.event_bus.emit(Event::InstanceExpired {
                instance,
                kind,
                frame: self.clock.frame,
            });
            result.expired_instances += 1;
        }
    }

    fn phase_tick_stations(&mut self, dt: Seconds, result: &mut AdvanceResult) {
        for id in self.stations.ids_ordered() {
            self.tick_station(id, dt, result);
        }
    }

    fn phase_apply_tweens(&mut self, dt: Seconds) {
        for update in self.tweens.advance(dt) {
            // Targets destroyed mid-flight drop their updates.
            let Some(inst) = self.instances.get_mut(update.target) else {
                continue;
            };
            inst.pos = update.pos;
        }
    }

    fn phase_bookkeeping(&mut self) {
        self.event_bus.deliver();
        self.last_state_hash = self.compute_state_hash();
    }

    // -- Station tick ------------------------------------------------------

    fn tick_station(&mut self, id: StationId, dt: Seconds, result: &mut AdvanceResult) {
        let Some(state) = self.stations.get(id) else {
            return;
        };
        if !state.alive {
            return;
        }
        let Some(cfg) = self.catalog.station_config(state.config).cloned() else {
            log::warn!("station {id:?} references a missing config; skipping tick");
            return;
        };

        // Aging. Observational only, never gates the rest of the tick.
        {
            let Some(st) = self.stations.get_mut(id) else {
                return;
            };
            st.age += dt;
            if let Some(aging) = &cfg.aging
                && st.advance_aging(dt, aging) > 0
            {
                let stage = st.stage;
                self.event_bus.emit(Event::StationAged {
                    station: id,
                    stage,
                    frame: self.clock.frame,
                });
            }
        }

        // Labor progression.
        let works = cfg.production_trigger == TriggerPolicy::WhenWorked
            || cfg.consumption_trigger == TriggerPolicy::WhenWorked;
        if works {
            let Some(st) = self.stations.get_mut(id) else {
                return;
            };
            if st.advance_work(dt, cfg.work_duration) {
                self.event_bus.emit(Event::WorkCompleted {
                    station: id,
                    frame: self.clock.frame,
                });
            }
        }

        // Consumption resolves before production so WhenResourcesConsumed
        // can chain in the same tick.
        match cfg.consumption_trigger {
            TriggerPolicy::None | TriggerPolicy::WhenResourcesConsumed => {}
            TriggerPolicy::Automatic => {
                let boundaries = {
                    let Some(st) = self.stations.get_mut(id) else {
                        return;
                    };
                    st.advance_consumption_timer(dt, cfg.consumption_interval)
                };
                for _ in 0..boundaries {
                    if !self.attempt_consumption(id, &cfg, result) {
                        break;
                    }
                }
            }
            TriggerPolicy::WhenWorked => {
                let fired = self
                    .stations
                    .get(id)
                    .is_some_and(|st| st.work_completed_this_tick());
                if fired {
                    self.attempt_consumption(id, &cfg, result);
                }
            }
            TriggerPolicy::Cycle => {
                let boundaries = {
                    let Some(st) = self.stations.get_mut(id) else {
                        return;
                    };
                    st.advance_cycle_timer(dt, cfg.cycle_interval)
                };
                for _ in 0..boundaries {
                    if self.attempt_consumption(id, &cfg, result) {
                        continue;
                    }
                    let (died, decay) = {
                        let Some(st) = self.stations.get_mut(id) else {
                            return;
                        };
                        let died = st.record_decay_failure(cfg.max_decay);
                        (died, st.decay)
                    };
                    self.event_bus.emit(Event::StationDecayed {
                        station: id,
                        decay,
                        frame: self.clock.frame,
                    });
                    if died {
                        self.event_bus.emit(Event::StationDied {
                            station: id,
                            cause: DeathCause::DecayExhausted,
                            frame: self.clock.frame,
                        });
                        let detached = self
                            .stations
                            .get_mut(id)
                            .map(|st| st.drain_workers())
                            .unwrap_or_default();
                        for agent in detached {
                            self.event_bus.emit(Event::LaborStopped {
                                station: id,
                                agent,
                                frame: self.clock.frame,
                            });
                        }
                        result.stations_died += 1;
                        break;
                    }
                }
            }
        }

        // Death during consumption ends the tick.
        if !self.stations.get(id).is_some_and(|st| st.alive) {
            if let Some(st) = self.stations.get_mut(id) {
                st.clear_tick_flags();
            }
            return;
        }

        // Production. Single-use stations may remove themselves here.
        match cfg.production_trigger {
            TriggerPolicy::None | TriggerPolicy::Cycle => {}
            TriggerPolicy::Automatic => {
                let boundaries = {
                    let Some(st) = self.stations.get_mut(id) else {
                        return;
                    };
                    st.advance_production_timer(dt, cfg.production_interval)
                };
                for _ in 0..boundaries {
                    self.fire_production(id, &cfg, result);
                    if !self.stations.contains(id) {
                        return;
                    }
                }
            }
            TriggerPolicy::WhenWorked => {
                let fired = self
                    .stations
                    .get(id)
                    .is_some_and(|st| st.work_completed_this_tick());
                if fired {
                    self.fire_production(id, &cfg, result);
                    if !self.stations.contains(id) {
                        return;
                    }
                }
            }
            TriggerPolicy::WhenResourcesConsumed => {
                let fired = self
                    .stations
                    .get(id)
                    .is_some_and(|st| st.consumed_this_tick());
                if fired {
                    self.fire_production(id, &cfg, result);
                    if !self.stations.contains(id) {
                        return;
                    }
                }
            }
        }

        // Upgrade countdown, armed by a successful consumption.
        let upgrade_due = {
            let Some(st) = self.stations.get_mut(id) else {
                return;
            };
            st.advance_upgrade(dt)
        };
        if upgrade_due {
            if let Some(upgrade) = &cfg.upgrade {
                self.perform_upgrade(id, upgrade.target, result);
                return;
            }
        }

        if let Some(st) = self.stations.get_mut(id) {
            st.clear_tick_flags();
        }
    }

    /// Attempt one consumption fire. A station with nothing configured to
    /// consume succeeds vacuously (still arms upgrades and deducts
    /// capital).
    fn attempt_consumption(
        &mut self,
        id: StationId,
        cfg: &StationConfig,
        result: &mut AdvanceResult,
    ) -> bool {
        if cfg.consumed.is_empty() {
            self.finish_consumption(id, cfg, result);
            return true;
        }
        let Some(area) = self.stations.get(id).and_then(|st| st.input_area) else {
            log::warn!(
                "station {id:?} consumes {} kinds but has no input area",
                cfg.consumed.len()
            );
            return false;
        };
        if self.consume_area_matching(area).is_none() {
            return false;
        }
        self.finish_consumption(id, cfg, result);
        true
    }

    fn finish_consumption(
        &mut self,
        id: StationId,
        cfg: &StationConfig,
        result: &mut AdvanceResult,
    ) {
        let responsible = {
            let Some(st) = self.stations.get_mut(id) else {
                return;
            };
            st.mark_consumed_this_tick();
            if let Some(upgrade) = &cfg.upgrade {
                st.arm_upgrade(upgrade.delay);
            }
            if cfg.consumption_trigger == TriggerPolicy::WhenWorked {
                st.current_worker()
            } else {
                st.owner
            }
        };
        if cfg.consumption_capital != 0 {
            self.adjust_capital(-cfg.consumption_capital);
            if let Some(agent) = responsible {
                self.ledger.adjust_agent(agent, -cfg.consumption_capital);
            }
        }
        if let Some(kind) = cfg.first_consumed_kind()
            && cfg.goal_contributor
        {
            self.contributions.push(Contribution {
                kind,
                frame: self.clock.frame,
            });
        }
        self.event_bus.emit(Event::StationConsumed {
            station: id,
            frame: self.clock.frame,
        });
        result.consumptions += 1;
    }

    /// Fire one production per the station's mode. Returns whether
    /// anything was produced. Single-use stations die and are removed
    /// after a successful fire.
    fn fire_production(
        &mut self,
        id: StationId,
        cfg: &StationConfig,
        result: &mut AdvanceResult,
    ) -> bool {
        let (produced_any, contribution_kind) = match &cfg.production_mode {
            ProductionMode::Resource => self.produce_resources(id, cfg),
            ProductionMode::Station { successors } => {
                let origin = self.production_origin(id);
                let mut count = 0u32;
                for successor in successors.clone() {
                    match self.erect_station_at(successor, origin, None) {
                        Ok(_) => count += 1,
                        Err(err) => {
                            log::warn!("successor spawn failed at {id:?}: {err}");
                        }
                    }
                }
                result.stations_erected += count;
                (count > 0, None)
            }
            ProductionMode::LootTable { table } => self.produce_loot(id, cfg, *table),
        };
        if !produced_any {
            return false;
        }

        if cfg.production_capital != 0 {
            self.adjust_capital(cfg.production_capital);
            let worker = self.stations.get(id).and_then(|st| st.current_worker());
            if let Some(agent) = worker {
                self.ledger.adjust_agent(agent, cfg.production_capital);
            }
        }
        if let Some(kind) = contribution_kind
            && cfg.goal_contributor
        {
            self.contributions.push(Contribution {
                kind,
                frame: self.clock.frame,
            });
        }
        result.productions += 1;

        if cfg.single_use {
            if let Some(st) = self.stations.get_mut(id) {
                st.kill();
            }
            self.event_bus.emit(Event::StationDied {
                station: id,
                cause: DeathCause::SingleUseSpent,
                frame: self.clock.frame,
            });
            result.stations_died += 1;
            self.remove_station_internal(id);
        }
        true
    }

    fn produce_resources(&mut self, id: StationId, cfg: &StationConfig) -> (bool, Option<KindId>) {
        if cfg.produced.is_empty() {
            return (false, None);
        }
        for entry in &cfg.produced {
            if let Some(st) = self.stations.get_mut(id) {
                st.ledger.add(entry.kind, entry.amount);
            }
            self.event_bus.emit(Event::StationProduced {
                station: id,
                kind: entry.kind,
                quantity: entry.amount,
                frame: self.clock.frame,
            });
            if cfg.spawn_instances {
                for _ in 0..entry.amount {
                    self.spawn_production_output(id, cfg, entry.kind);
                }
            }
        }
        (true, cfg.first_produced_kind())
    }

    fn produce_loot(
        &mut self,
        id: StationId,
        cfg: &StationConfig,
        table_id: LootTableId,
    ) -> (bool, Option<KindId>) {
        let Some(table) = self.catalog.loot_table(table_id) else {
            log::warn!("station {id:?} rolls a missing loot table {table_id:?}");
            return (false, None);
        };
        let Some(drawn) = table.draw(&mut self.rng) else {
            return (false, None);
        };
        if let Some(st) = self.stations.get_mut(id) {
            st.ledger.add(drawn.kind, drawn.quantity);
        }
        self.event_bus.emit(Event::StationProduced {
            station: id,
            kind: drawn.kind,
            quantity: drawn.quantity,
            frame: self.clock.frame,
        });
        if cfg.spawn_instances {
            for _ in 0..drawn.quantity {
                self.spawn_production_output(id, cfg, drawn.kind);
            }
        }
        (true, Some(drawn.kind))
    }

    /// Spawn one produced unit: into the output area when present, else
    /// scattered around the station.
    fn spawn_production_output(&mut self, id: StationId, cfg: &StationConfig, kind: KindId) {
        let Some(st) = self.stations.get(id) else {
            return;
        };
        let output = st.output_area;
        let pos = st.pos;
        match output {
            Some(area) => {
                let origin = self.areas.get(area).map(|a| a.origin).unwrap_or(pos);
                let instance = self.spawn_instance_at(kind, origin, None);
                if let Err(err) = self.route_enter(area, instance) {
                    log::warn!("output routing failed for {instance:?}: {err}");
                }
            }
            None => {
                let (dx, dy) = self.rng.scatter(cfg.scatter_radius);
                self.spawn_instance_at(kind, pos.offset(dx, dy), None);
            }
        }
    }

    /// Where successor stations and area-less spawns land.
    fn production_origin(&self, id: StationId) -> Position {
        let Some(st) = self.stations.get(id) else {
            return Position::ORIGIN;
        };
        st.output_area
            .and_then(|a| self.areas.get(a))
            .map(|a| a.origin)
            .unwrap_or(st.pos)
    }

    fn perform_upgrade(
        &mut self,
        old: StationId,
        target: StationConfigId,
        result: &mut AdvanceResult,
    ) {
        let Some(st) = self.stations.get(old) else {
            return;
        };
        let pos = st.pos;
        let owner = st.owner;
        match self.erect_station_at(target, pos, owner) {
            Ok(new_id) => {
                self.event_bus.emit(Event::StationUpgraded {
                    from: old,
                    to: new_id,
                    config: target,
                    frame: self.clock.frame,
                });
                result.stations_erected += 1;
                self.remove_station_internal(old);
            }
            Err(err) => {
                log::warn!("upgrade of {old:?} failed: {err}");
            }
        }
    }

    // -- Snapshots ---------------------------------------------------------

    /// Create a snapshot of a single station.
    pub fn snapshot_station(&self, id: StationId) -> Option<StationSnapshot> {
        let st = self.stations.get(id)?;
        let (name, work_duration) = self
            .catalog
            .station_config(st.config)
            .map(|c| (c.name.clone(), c.work_duration))
            .unwrap_or_default();
        Some(StationSnapshot {
            id,
            config: st.config,
            name,
            pos: st.pos,
            alive: st.alive,
            age: st.age,
            stage: st.stage,
            decay: st.decay,
            work_progress: st.work_progress,
            work_ratio: st.work_ratio(work_duration),
            is_being_worked: st.is_being_worked(),
            worker_count: st.worker_count() as u32,
            is_inspected: st.is_inspected,
            input_area: st.input_area,
            output_area: st.output_area,
            ledger: st.ledger.iter().collect(),
        })
    }

    /// Create snapshots of all stations, in erection order.
    pub fn snapshot_all_stations(&self) -> Vec<StationSnapshot> {
        self.stations
            .iter()
            .filter_map(|(id, _)| self.snapshot_station(id))
            .collect()
    }

    /// Create a snapshot of a single containment area.
    pub fn snapshot_area(&self, id: AreaId) -> Option<AreaSnapshot> {
        let area = self.areas.get(id)?;
        Some(AreaSnapshot {
            id,
            origin: area.origin,
            members: area.members().to_vec(),
            requirements: area.requirements().to_vec(),
            requirements_met: area.all_requirements_met(),
        })
    }

    /// Snapshot the global ledger.
    pub fn snapshot_ledger(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            capital: self.ledger.capital(),
            agents: self.ledger.agents().collect(),
        }
    }

    // -- State hash --------------------------------------------------------

    /// Hash the simulation-relevant state: clock, capital, RNG, instance
    /// census, and per-station machine state, in deterministic order.
    pub fn compute_state_hash(&self) -> u64 {
        let mut h = StateHash::new();
        h.write_u64(self.clock.frame);
        h.write_fixed64(self.clock.time);
        h.write_i64(self.ledger.capital());
        h.write_u64(self.rng.state());
        h.write_u64(self.instances.live_count() as u64);
        for (kind, count) in self.instances.counts() {
            h.write_u32(kind.0);
            h.write_u32(count);
        }
        for (_, st) in self.stations.iter() {
            h.write_u32(st.config.0);
            h.write_u32(st.alive as u32);
            h.write_u32(st.decay);
            h.write_u32(st.stage);
            h.write_fixed64(st.work_progress);
            h.write_fixed64(st.age);
        }
        h.finish()
    }
}

/// Expand a consumed list into the requirement multiset: each kind
/// repeated `amount` times.
fn expand_requirements(consumed: &[KindAmount]) -> Vec<KindId> {
    let mut out = Vec::new();
    for entry in consumed {
        for _ in 0..entry.amount {
            out.push(entry.kind);
        }
    }
    out
}

// ===========================================================================
// Tests
// ===========================================================================
