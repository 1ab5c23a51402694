//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::area::Area;
use crate::capability::{Capability, CapabilitySet};
use crate::catalog::{Catalog, CatalogBuilder, DecayPolicy};
use crate::fixed::{Fixed64, Position, secs};
use crate::id::*;
use crate::station::{KindAmount, StationConfig, TriggerPolicy};
use crate::world::{World, WorldSettings};

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

pub fn at(x: f64, y: f64) -> Position {
    Position::new(fixed(x), fixed(y))
}

// ===========================================================================
// Kind constructors
// ===========================================================================

// Ids follow the registration order in `base_catalog_builder`.

pub fn wood() -> KindId {
    KindId(0)
}
pub fn stone() -> KindId {
    KindId(1)
}
pub fn ore() -> KindId {
    KindId(2)
}
pub fn bar() -> KindId {
    KindId(3)
}
pub fn grain() -> KindId {
    KindId(4)
}
pub fn gem() -> KindId {
    KindId(5)
}

/// A builder preloaded with the standard kind roster above.
pub fn base_catalog_builder() -> CatalogBuilder {
    let mut b = CatalogBuilder::new();
    b.register_kind("wood", DecayPolicy::Consumable);
    b.register_kind("stone", DecayPolicy::Static);
    b.register_kind("ore", DecayPolicy::Consumable);
    b.register_kind("bar", DecayPolicy::Static);
    b.register_kind("grain", DecayPolicy::Decays { lifespan: secs(30) });
    b.register_kind("gem", DecayPolicy::Static);
    b
}

// ===========================================================================
// Station config constructors
// ===========================================================================

/// A worked converter: consumes inputs and produces outputs when the labor
/// cycle completes. Creates both areas.
pub fn make_worked_converter(
    name: &str,
    consumed: Vec<(KindId, u32)>,
    produced: Vec<(KindId, u32)>,
    work_secs: i64,
) -> StationConfig {
    let mut cfg = StationConfig::named(name);
    cfg.consumed = kind_amounts(consumed);
    cfg.produced = kind_amounts(produced);
    cfg.production_trigger = TriggerPolicy::WhenWorked;
    cfg.consumption_trigger = TriggerPolicy::WhenWorked;
    cfg.work_duration = secs(work_secs);
    cfg.has_input_area = true;
    cfg.has_output_area = true;
    cfg
}

/// An unattended producer on a fixed interval, scattering its outputs.
pub fn make_automatic_producer(
    name: &str,
    kind: KindId,
    quantity: u32,
    interval_secs: i64,
) -> StationConfig {
    let mut cfg = StationConfig::named(name);
    cfg.produced = vec![KindAmount { kind, amount: quantity }];
    cfg.production_trigger = TriggerPolicy::Automatic;
    cfg.production_interval = secs(interval_secs);
    cfg.scatter_radius = fixed(1.0);
    cfg
}

/// A decay-cycle consumer: eats one matching set per cycle or decays.
pub fn make_cycle_consumer(
    name: &str,
    kind: KindId,
    amount: u32,
    cycle_secs: i64,
    max_decay: u32,
) -> StationConfig {
    let mut cfg = StationConfig::named(name);
    cfg.consumed = vec![KindAmount { kind, amount }];
    cfg.consumption_trigger = TriggerPolicy::Cycle;
    cfg.cycle_interval = secs(cycle_secs);
    cfg.max_decay = max_decay;
    cfg.has_input_area = true;
    cfg
}

fn kind_amounts(pairs: Vec<(KindId, u32)>) -> Vec<KindAmount> {
    pairs
        .into_iter()
        .map(|(kind, amount)| KindAmount { kind, amount })
        .collect()
}

// ===========================================================================
// World helpers
// ===========================================================================

pub fn world_with(catalog: Catalog) -> World {
    World::new(catalog, WorldSettings::default())
}

pub fn seeded_world(catalog: Catalog, seed: u64) -> World {
    World::new(
        catalog,
        WorldSettings {
            seed,
            ..WorldSettings::default()
        },
    )
}

/// Erect a station, panicking on config errors.
pub fn erect(world: &mut World, config: StationConfigId, pos: Position) -> StationId {
    world.erect_station(config, pos).unwrap()
}

/// Enter an instance into an area with the resource capability set.
pub fn enter_as_resource(world: &mut World, area: AreaId, instance: InstanceId) {
    world
        .notify_enter(
            area,
            instance,
            CapabilitySet::new(&[Capability::Resource, Capability::Grabbable]),
        )
        .unwrap();
}

/// Spawn `n` instances of `kind` and feed them into the station's input
/// area. Returns the input area id.
pub fn feed_station(world: &mut World, station: StationId, kind: KindId, n: u32) -> AreaId {
    let input = world
        .station(station)
        .and_then(|st| st.input_area)
        .expect("station has no input area");
    for _ in 0..n {
        let inst = world.spawn_instance(kind, Position::ORIGIN);
        enter_as_resource(world, input, inst);
    }
    input
}

/// Advance the world `ticks` times by `dt_secs` seconds each.
pub fn run_ticks(world: &mut World, ticks: u32, dt_secs: i64) {
    for _ in 0..ticks {
        world.advance(secs(dt_secs));
    }
}

// ===========================================================================
// World builders (for benchmarks, stress tests, and proptests)
// ===========================================================================

/// Build a homestead of `pairs` producer/consumer couples: each automatic
/// ore producer feeds nothing directly, and each cycle goat is pre-fed
/// with grain pads so the first cycles succeed.
pub fn build_homestead(pairs: usize) -> World {
    let mut b = base_catalog_builder();
    let producer = b.register_station(make_automatic_producer("quarry", ore(), 1, 2));
    let consumer = b.register_station(make_cycle_consumer("goat", grain(), 1, 3, 3));
    let catalog = b.build().unwrap();

    let mut world = world_with(catalog);
    for i in 0..pairs {
        let x = i as f64 * 4.0;
        erect(&mut world, producer, at(x, 0.0));
        let goat = erect(&mut world, consumer, at(x, 4.0));
        feed_station(&mut world, goat, grain(), 2);
    }
    world
}

/// Build a delivery field of `count` auto-consuming pads, each already
/// holding one of the two wood units it needs.
pub fn build_delivery_field(count: usize) -> World {
    let catalog = base_catalog_builder().build().unwrap();
    let mut world = world_with(catalog);
    for i in 0..count {
        let mut pad = Area::new(at(i as f64 * 2.0, 0.0)).with_requirements(vec![wood(), wood()]);
        pad.auto_consume = true;
        let area = world.add_area(pad);
        let inst = world.spawn_instance(wood(), Position::ORIGIN);
        enter_as_resource(&mut world, area, inst);
    }
    world
}
