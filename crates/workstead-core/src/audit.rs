//! Consistency audit for cross-component invariants.
//!
//! The world's subsystems index into each other: areas hold instance ids,
//! stations hold area ids and config ids, the lock set and the tween pool
//! hold instance ids. The audit walks every link and reports the ones that
//! dangle, recounts the registry's per-kind totals, and checks station
//! runtime fields against their configured ranges. A healthy world always
//! produces a clean report; findings mean a lifecycle path forgot a detach
//! step or a bookkeeping update.

use std::collections::BTreeMap;

use crate::fixed::Seconds;
use crate::id::{AreaId, InstanceId, KindId, StationConfigId, StationId, TaskId};
use crate::world::World;

// ---------------------------------------------------------------------------
// Finding types
// ---------------------------------------------------------------------------

/// One broken cross-component link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditFinding {
    /// An area member that no longer exists in the instance registry.
    DanglingAreaMember { area: AreaId, instance: InstanceId },
    /// An area member recorded with a kind that differs from the registry.
    MemberKindMismatch {
        area: AreaId,
        instance: InstanceId,
        recorded: KindId,
        actual: KindId,
    },
    /// A station's input or output area handle that does not resolve.
    MissingStationArea { station: StationId, area: AreaId },
    /// A station referencing a config the catalog does not know.
    UnknownStationConfig {
        station: StationId,
        config: StationConfigId,
    },
    /// A locked instance that no longer exists.
    DanglingLock { instance: InstanceId },
    /// An interpolation whose target instance no longer exists.
    DanglingTween { task: TaskId, instance: InstanceId },
    /// The registry's incremental count for a kind disagrees with a full
    /// recount of live instances.
    CountMismatch {
        kind: KindId,
        tracked: u32,
        actual: u32,
    },
    /// Labor progress outside `[0, work_duration]`.
    WorkProgressOutOfRange {
        station: StationId,
        progress: Seconds,
        limit: Seconds,
    },
    /// Decay counter past the config's cap.
    DecayOutOfRange {
        station: StationId,
        decay: u32,
        max: u32,
    },
    /// A dead station still holding workers.
    DeadStationWorkers { station: StationId, workers: usize },
}

/// Full audit result.
#[derive(Debug, Clone)]
pub struct AuditReport {
    pub is_clean: bool,
    pub findings: Vec<AuditFinding>,
}

// ---------------------------------------------------------------------------
// Audit walk
// ---------------------------------------------------------------------------

/// Walk every cross-component link in the world and report broken ones.
pub fn audit_world(world: &World) -> AuditReport {
    let mut findings = Vec::new();

    // Area members must be live instances with matching kinds.
    for &area_id in world.area_ids() {
        let Some(area) = world.area(area_id) else {
            continue;
        };
        for &(instance, recorded) in area.members() {
            match world.instance(instance) {
                None => findings.push(AuditFinding::DanglingAreaMember {
                    area: area_id,
                    instance,
                }),
                Some(inst) if inst.kind != recorded => {
                    findings.push(AuditFinding::MemberKindMismatch {
                        area: area_id,
                        instance,
                        recorded,
                        actual: inst.kind,
                    });
                }
                Some(_) => {}
            }
        }
    }

    // The incremental per-kind counts must agree with a full recount.
    let mut recount: BTreeMap<KindId, u32> = BTreeMap::new();
    for (_, instance) in world.instances() {
        *recount.entry(instance.kind).or_insert(0) += 1;
    }
    for (kind, tracked) in world.kind_counts() {
        let actual = recount.remove(&kind).unwrap_or(0);
        if tracked != actual {
            findings.push(AuditFinding::CountMismatch {
                kind,
                tracked,
                actual,
            });
        }
    }
    for (kind, actual) in recount {
        findings.push(AuditFinding::CountMismatch {
            kind,
            tracked: 0,
            actual,
        });
    }

    // Station handles must resolve and runtime fields must stay in range.
    for (station, st) in world.stations() {
        for area in [st.input_area, st.output_area].into_iter().flatten() {
            if world.area(area).is_none() {
                findings.push(AuditFinding::MissingStationArea { station, area });
            }
        }
        match world.catalog().station_config(st.config) {
            None => findings.push(AuditFinding::UnknownStationConfig {
                station,
                config: st.config,
            }),
            Some(cfg) => {
                if st.work_progress < Seconds::ZERO || st.work_progress > cfg.work_duration {
                    findings.push(AuditFinding::WorkProgressOutOfRange {
                        station,
                        progress: st.work_progress,
                        limit: cfg.work_duration,
                    });
                }
                if st.decay > cfg.max_decay {
                    findings.push(AuditFinding::DecayOutOfRange {
                        station,
                        decay: st.decay,
                        max: cfg.max_decay,
                    });
                }
            }
        }
        if !st.alive && st.worker_count() > 0 {
            findings.push(AuditFinding::DeadStationWorkers {
                station,
                workers: st.worker_count(),
            });
        }
    }

    // Locks and interpolations must point at live instances.
    for instance in world.locked_instances() {
        if world.instance(instance).is_none() {
            findings.push(AuditFinding::DanglingLock { instance });
        }
    }
    for (task, target) in world.active_tweens() {
        if world.instance(target).is_none() {
            findings.push(AuditFinding::DanglingTween {
                task,
                instance: target,
            });
        }
    }

    AuditReport {
        is_clean: findings.is_empty(),
        findings,
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::Area;
    use crate::capability::{Capability, CapabilitySet};
    use crate::catalog::{Catalog, CatalogBuilder, DecayPolicy};
    use crate::fixed::{Position, secs};
    use crate::id::AgentId;
    use crate::station::{KindAmount, StationConfig, TriggerPolicy};
    use crate::world::WorldSettings;

    fn smelter_catalog() -> (Catalog, KindId, StationConfigId) {
        let mut b = CatalogBuilder::new();
        let ore = b.register_kind("ore", DecayPolicy::Consumable);
        let bar = b.register_kind("bar", DecayPolicy::Static);
        let mut smelter = StationConfig::named("smelter");
        smelter.consumed = vec![KindAmount { kind: ore, amount: 1 }];
        smelter.produced = vec![KindAmount { kind: bar, amount: 1 }];
        smelter.production_trigger = TriggerPolicy::WhenWorked;
        smelter.consumption_trigger = TriggerPolicy::WhenWorked;
        smelter.work_duration = secs(1);
        smelter.has_input_area = true;
        smelter.has_output_area = true;
        let cfg = b.register_station(smelter);
        (b.build().unwrap(), ore, cfg)
    }

    fn worked_world() -> World {
        let (catalog, ore, cfg) = smelter_catalog();
        let mut world = World::new(catalog, WorldSettings::default());
        let station = world.erect_station(cfg, Position::ORIGIN).unwrap();
        let input = world.station(station).unwrap().input_area.unwrap();
        let inst = world.spawn_instance(ore, Position::ORIGIN);
        world
            .notify_enter(input, inst, CapabilitySet::new(&[Capability::Resource]))
            .unwrap();
        world.begin_labor(AgentId(1), station).unwrap();
        world
    }

    // -----------------------------------------------------------------------
    // Test 1: A fresh world audits clean
    // -----------------------------------------------------------------------
    #[test]
    fn fresh_world_is_clean() {
        let (catalog, _, _) = smelter_catalog();
        let world = World::new(catalog, WorldSettings::default());
        let report = audit_world(&world);
        assert!(report.is_clean);
        assert!(report.findings.is_empty());
    }

    // -----------------------------------------------------------------------
    // Test 2: A world stays clean through a full production cycle
    // -----------------------------------------------------------------------
    #[test]
    fn worked_world_stays_clean() {
        let mut world = worked_world();
        for _ in 0..4 {
            world.advance(secs(1));
            let report = audit_world(&world);
            assert!(report.is_clean, "findings: {:?}", report.findings);
        }
    }

    // -----------------------------------------------------------------------
    // Test 3: A member entered after despawn is reported as dangling
    // -----------------------------------------------------------------------
    #[test]
    fn dangling_area_member_detected() {
        let (catalog, ore, _) = smelter_catalog();
        let mut world = World::new(catalog, WorldSettings::default());
        let area = world.add_area(Area::new(Position::ORIGIN));

        let stale = world.spawn_instance(ore, Position::ORIGIN);
        assert!(world.despawn_instance(stale));
        world.area_mut(area).unwrap().enter(stale, ore);

        let report = audit_world(&world);
        assert!(!report.is_clean);
        assert_eq!(
            report.findings,
            vec![AuditFinding::DanglingAreaMember {
                area,
                instance: stale
            }]
        );
    }

    // -----------------------------------------------------------------------
    // Test 4: A member recorded under the wrong kind is reported
    // -----------------------------------------------------------------------
    #[test]
    fn member_kind_mismatch_detected() {
        let (catalog, ore, _) = smelter_catalog();
        let bar = catalog.kind_id("bar").unwrap();
        let mut world = World::new(catalog, WorldSettings::default());
        let area = world.add_area(Area::new(Position::ORIGIN));

        let inst = world.spawn_instance(ore, Position::ORIGIN);
        world.area_mut(area).unwrap().enter(inst, bar);

        let report = audit_world(&world);
        assert_eq!(
            report.findings,
            vec![AuditFinding::MemberKindMismatch {
                area,
                instance: inst,
                recorded: bar,
                actual: ore
            }]
        );
    }

    // -----------------------------------------------------------------------
    // Test 5: A station pointing at a removed area is reported
    // -----------------------------------------------------------------------
    #[test]
    fn missing_station_area_detected() {
        let (catalog, _, cfg) = smelter_catalog();
        let mut world = World::new(catalog, WorldSettings::default());
        let station = world.erect_station(cfg, Position::ORIGIN).unwrap();

        let stale = world.add_area(Area::new(Position::ORIGIN));
        world.remove_area(stale);
        world.station_mut(station).unwrap().input_area = Some(stale);

        let report = audit_world(&world);
        assert_eq!(
            report.findings,
            vec![AuditFinding::MissingStationArea {
                station,
                area: stale
            }]
        );
    }

    // -----------------------------------------------------------------------
    // Test 6: A station with a forged config id is reported
    // -----------------------------------------------------------------------
    #[test]
    fn unknown_station_config_detected() {
        let (catalog, _, cfg) = smelter_catalog();
        let mut world = World::new(catalog, WorldSettings::default());
        let station = world.erect_station(cfg, Position::ORIGIN).unwrap();
        world.station_mut(station).unwrap().config = StationConfigId(999);

        let report = audit_world(&world);
        assert_eq!(
            report.findings,
            vec![AuditFinding::UnknownStationConfig {
                station,
                config: StationConfigId(999)
            }]
        );
    }

    // -----------------------------------------------------------------------
    // Test 7: Labor progress past the work duration is reported
    // -----------------------------------------------------------------------
    #[test]
    fn work_progress_out_of_range_detected() {
        let (catalog, _, cfg) = smelter_catalog();
        let mut world = World::new(catalog, WorldSettings::default());
        let station = world.erect_station(cfg, Position::ORIGIN).unwrap();
        world.station_mut(station).unwrap().work_progress = secs(99);

        let report = audit_world(&world);
        assert_eq!(
            report.findings,
            vec![AuditFinding::WorkProgressOutOfRange {
                station,
                progress: secs(99),
                limit: secs(1)
            }]
        );
    }

    // -----------------------------------------------------------------------
    // Test 8: A decay counter past the cap is reported
    // -----------------------------------------------------------------------
    #[test]
    fn decay_out_of_range_detected() {
        let (catalog, _, cfg) = smelter_catalog();
        let mut world = World::new(catalog, WorldSettings::default());
        let station = world.erect_station(cfg, Position::ORIGIN).unwrap();
        world.station_mut(station).unwrap().decay = 99;

        let report = audit_world(&world);
        assert_eq!(
            report.findings,
            vec![AuditFinding::DecayOutOfRange {
                station,
                decay: 99,
                max: 3
            }]
        );
    }

    // -----------------------------------------------------------------------
    // Test 9: A killed station that kept its workers is reported
    // -----------------------------------------------------------------------
    #[test]
    fn dead_station_with_workers_detected() {
        let mut world = worked_world();
        let station = world.stations().next().unwrap().0;
        world.station_mut(station).unwrap().kill();

        let report = audit_world(&world);
        assert_eq!(
            report.findings,
            vec![AuditFinding::DeadStationWorkers {
                station,
                workers: 1
            }]
        );
    }

    // -----------------------------------------------------------------------
    // Test 10: Registry counts survive a session of spawn/consume/despawn
    // -----------------------------------------------------------------------
    #[test]
    fn counts_agree_after_session_churn() {
        let (catalog, ore, cfg) = smelter_catalog();
        let mut world = World::new(catalog, WorldSettings::default());
        let station = world.erect_station(cfg, Position::ORIGIN).unwrap();
        let input = world.station(station).unwrap().input_area.unwrap();
        for _ in 0..3 {
            let inst = world.spawn_instance(ore, Position::ORIGIN);
            world
                .notify_enter(input, inst, CapabilitySet::new(&[Capability::Resource]))
                .unwrap();
        }
        let loose = world.spawn_instance(ore, Position::ORIGIN);
        world.begin_labor(AgentId(1), station).unwrap();

        for _ in 0..3 {
            world.advance(secs(1));
            let report = audit_world(&world);
            assert!(report.is_clean, "findings: {:?}", report.findings);
        }

        world.despawn_instance(loose);
        let report = audit_world(&world);
        assert!(report.is_clean, "findings: {:?}", report.findings);
    }
}
