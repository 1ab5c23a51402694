//! Property-based tests for the Workstead core world.
//!
//! Uses proptest to generate random requirement multisets and command
//! sequences, then verify matching and cross-component invariants hold.

use std::collections::BTreeMap;

use proptest::prelude::*;
use slotmap::SlotMap;
use workstead_core::area::Area;
use workstead_core::audit::audit_world;
use workstead_core::capability::{Capability, CapabilitySet};
use workstead_core::fixed::{Position, Seconds, secs};
use workstead_core::id::*;
use workstead_core::station::KindAmount;
use workstead_core::test_utils::*;
use workstead_core::world::World;

// ===========================================================================
// Generators
// ===========================================================================

/// Random kind lists drawn from a 4-kind universe.
fn arb_kinds(max: usize) -> impl Strategy<Value = Vec<KindId>> {
    proptest::collection::vec(0..4u32, 0..max).prop_map(|v| v.into_iter().map(KindId).collect())
}

/// World commands for testing command safety.
#[derive(Debug, Clone)]
enum WorldOp {
    Spawn(u8),
    Despawn(usize),
    AddPad(u8),
    Enter(usize, usize),
    Exit(usize, usize),
    Erect(u8),
    RemoveStation(usize),
    BeginLabor(u8, usize),
    EndLabor(u8, usize),
    Queue(u8),
    Advance(u8),
}

fn arb_op_sequence(max_ops: usize) -> impl Strategy<Value = Vec<WorldOp>> {
    proptest::collection::vec(
        prop_oneof![
            (0..6u8).prop_map(WorldOp::Spawn),
            (0..64usize).prop_map(WorldOp::Despawn),
            (0..4u8).prop_map(WorldOp::AddPad),
            (0..64usize, 0..64usize).prop_map(|(a, i)| WorldOp::Enter(a, i)),
            (0..64usize, 0..64usize).prop_map(|(a, i)| WorldOp::Exit(a, i)),
            (0..3u8).prop_map(WorldOp::Erect),
            (0..64usize).prop_map(WorldOp::RemoveStation),
            (0..4u8, 0..64usize).prop_map(|(ag, s)| WorldOp::BeginLabor(ag, s)),
            (0..4u8, 0..64usize).prop_map(|(ag, s)| WorldOp::EndLabor(ag, s)),
            (0..3u8).prop_map(WorldOp::Queue),
            (0..4u8).prop_map(WorldOp::Advance),
        ],
        1..=max_ops,
    )
}

fn kind_by_index(i: u8) -> KindId {
    match i % 6 {
        0 => wood(),
        1 => stone(),
        2 => ore(),
        3 => bar(),
        4 => grain(),
        _ => gem(),
    }
}

fn chaos_world() -> (World, Vec<StationConfigId>) {
    let mut b = base_catalog_builder();
    let converter = b.register_station(make_worked_converter(
        "smelter",
        vec![(ore(), 2)],
        vec![(bar(), 1)],
        3,
    ));
    let producer = b.register_station(make_automatic_producer("quarry", stone(), 1, 2));
    let consumer = b.register_station(make_cycle_consumer("goat", grain(), 1, 2, 3));
    let world = world_with(b.build().unwrap());
    (world, vec![converter, producer, consumer])
}

fn count_kinds<I: IntoIterator<Item = KindId>>(kinds: I) -> BTreeMap<KindId, u32> {
    let mut map = BTreeMap::new();
    for kind in kinds {
        *map.entry(kind).or_insert(0) += 1;
    }
    map
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Matching removes exactly the requirement multiset, never more, and
    /// leaves membership untouched on failure.
    #[test]
    fn take_matching_takes_exactly_the_requirements(
        reqs in arb_kinds(6),
        members in arb_kinds(12),
    ) {
        let mut ids: SlotMap<InstanceId, KindId> = SlotMap::with_key();
        let mut area = Area::new(Position::ORIGIN).with_requirements(reqs.clone());
        for &kind in &members {
            let id = ids.insert(kind);
            area.enter(id, kind);
        }

        let before = count_kinds(area.members().iter().map(|(_, k)| *k));
        let met = area.all_requirements_met();

        match area.take_matching() {
            Some(taken) => {
                prop_assert!(met);
                let taken_kinds = count_kinds(taken.iter().map(|id| ids[*id]));
                prop_assert_eq!(&taken_kinds, &count_kinds(reqs.iter().copied()));

                // Remaining membership is exactly before minus requirements.
                let mut expected = before.clone();
                for (kind, n) in &taken_kinds {
                    let slot = expected.get_mut(kind).unwrap();
                    *slot -= n;
                    if *slot == 0 {
                        expected.remove(kind);
                    }
                }
                let after = count_kinds(area.members().iter().map(|(_, k)| *k));
                prop_assert_eq!(after, expected);
            }
            None => {
                prop_assert!(!met);
                let after = count_kinds(area.members().iter().map(|(_, k)| *k));
                prop_assert_eq!(after, before);
            }
        }
    }

    /// Any command sequence leaves every cross-component link intact:
    /// stale handles surface as command errors, never as corruption.
    #[test]
    fn command_sequences_audit_clean(ops in arb_op_sequence(80)) {
        let (mut world, configs) = chaos_world();
        let mut instances: Vec<InstanceId> = Vec::new();
        let mut areas: Vec<AreaId> = Vec::new();
        let mut stations: Vec<StationId> = Vec::new();

        for op in ops {
            match op {
                WorldOp::Spawn(k) => {
                    let inst = world.spawn_instance(kind_by_index(k), Position::ORIGIN);
                    instances.push(inst);
                }
                WorldOp::Despawn(i) => {
                    if let Some(&inst) = pick(&instances, i) {
                        world.despawn_instance(inst);
                    }
                }
                WorldOp::AddPad(k) => {
                    let kind = kind_by_index(k);
                    let mut pad =
                        Area::new(Position::ORIGIN).with_requirements(vec![kind, kind]);
                    pad.auto_consume = k % 2 == 0;
                    areas.push(world.add_area(pad));
                }
                WorldOp::Enter(a, i) => {
                    if let (Some(&area), Some(&inst)) = (pick(&areas, a), pick(&instances, i)) {
                        let _ = world.notify_enter(
                            area,
                            inst,
                            CapabilitySet::new(&[Capability::Resource]),
                        );
                    }
                }
                WorldOp::Exit(a, i) => {
                    if let (Some(&area), Some(&inst)) = (pick(&areas, a), pick(&instances, i)) {
                        let _ = world.notify_exit(area, inst);
                    }
                }
                WorldOp::Erect(c) => {
                    let config = configs[c as usize % configs.len()];
                    if let Ok(id) = world.erect_station(config, Position::ORIGIN) {
                        if let Some(st) = world.station(id) {
                            areas.extend(st.input_area);
                            areas.extend(st.output_area);
                        }
                        stations.push(id);
                    }
                }
                WorldOp::RemoveStation(s) => {
                    if let Some(&station) = pick(&stations, s) {
                        world.remove_station(station);
                    }
                }
                WorldOp::BeginLabor(agent, s) => {
                    if let Some(&station) = pick(&stations, s) {
                        let _ = world.begin_labor(AgentId(agent as u32), station);
                    }
                }
                WorldOp::EndLabor(agent, s) => {
                    if let Some(&station) = pick(&stations, s) {
                        let _ = world.end_labor(AgentId(agent as u32), station);
                    }
                }
                WorldOp::Queue(c) => {
                    let config = configs[c as usize % configs.len()];
                    world.queue_station(config, Position::ORIGIN);
                }
                WorldOp::Advance(d) => {
                    let dt = match d % 4 {
                        0 => Seconds::ZERO,
                        1 => fixed(0.5),
                        2 => secs(1),
                        _ => secs(3),
                    };
                    world.advance(dt);
                }
            }
        }
        world.advance(secs(1));

        let report = audit_world(&world);
        prop_assert!(report.is_clean, "findings: {:?}", report.findings);
    }

    /// Two worlds built and scripted identically stay hash-identical.
    #[test]
    fn deterministic_simulation(seed in 0..100usize) {
        let pairs = 1 + seed % 8;
        let ticks = 5 + seed % 15;

        let mut world_a = build_homestead(pairs);
        let mut world_b = build_homestead(pairs);

        for _ in 0..ticks {
            world_a.advance(secs(1));
            world_b.advance(secs(1));
        }

        prop_assert_eq!(world_a.state_hash(), world_b.state_hash());
    }

    /// Requirement expansion on erected stations always mirrors the
    /// config's consumed list.
    #[test]
    fn erected_requirements_mirror_config(amounts in proptest::collection::vec(1..4u32, 1..4)) {
        let mut b = base_catalog_builder();
        let kinds = [wood(), stone(), ore(), bar()];
        let mut cfg = make_cycle_consumer("pen", wood(), 1, 5, 3);
        cfg.consumed = amounts
            .iter()
            .enumerate()
            .map(|(i, &amount)| KindAmount { kind: kinds[i], amount })
            .collect();
        let config = b.register_station(cfg);
        let mut world = world_with(b.build().unwrap());

        let station = erect(&mut world, config, Position::ORIGIN);
        let input = world.station(station).unwrap().input_area.unwrap();
        let reqs = count_kinds(world.area(input).unwrap().requirements().iter().copied());

        let expected: BTreeMap<KindId, u32> = amounts
            .iter()
            .enumerate()
            .map(|(i, &amount)| (kinds[i], amount))
            .collect();
        prop_assert_eq!(reqs, expected);
    }
}

fn pick<T>(items: &[T], index: usize) -> Option<&T> {
    if items.is_empty() {
        None
    } else {
        Some(&items[index % items.len()])
    }
}
